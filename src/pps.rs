use crate::bitreader::BitReader;
use crate::eg::{read_se, read_ue};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct Pps {
    pub pic_parameter_set_id: u8,
    pub seq_parameter_set_id: u8,
    pub entropy_coding_mode_flag: bool,
    pub bottom_field_pic_order_in_frame_present_flag: bool,

    pub num_slice_groups_minus1: u32,
    pub slice_group_map_type: u32,
    pub run_length_minus1: Vec<u32>,
    pub top_left: Vec<u32>,
    pub bottom_right: Vec<u32>,
    pub slice_group_change_direction_flag: bool,
    pub slice_group_change_rate_minus1: u32,
    pub pic_size_in_map_units_minus1: u32,
    pub slice_group_id: Vec<u32>,

    pub num_ref_idx_l0_default_active_minus1: u8,
    pub num_ref_idx_l1_default_active_minus1: u8,
    pub weighted_pred_flag: bool,
    pub weighted_bipred_idc: u8,
    pub pic_init_qp_minus26: i8,
    pub pic_init_qs_minus26: i8,
    pub chroma_qp_index_offset: i8,
    pub deblocking_filter_control_present_flag: bool,
    pub constrained_intra_pred_flag: bool,
    pub redundant_pic_cnt_present_flag: bool,

    pub transform_8x8_mode_flag: bool,
    pub pic_scaling_matrix_present_flag: bool,
    pub second_chroma_qp_index_offset: i8,
}

impl Pps {
    pub fn parse(rbsp: &[u8]) -> Result<Self> {
        let mut reader = BitReader::new(rbsp);

        let pic_parameter_set_id = read_ue(&mut reader)?;
        if pic_parameter_set_id > 255 {
            return Err(Error::InvalidValue("pic_parameter_set_id"));
        }

        let seq_parameter_set_id = read_ue(&mut reader)?;
        if seq_parameter_set_id > 31 {
            return Err(Error::InvalidValue("seq_parameter_set_id"));
        }

        let entropy_coding_mode_flag = reader.read_flag()?;
        let bottom_field_pic_order_in_frame_present_flag = reader.read_flag()?;

        let num_slice_groups_minus1 = read_ue(&mut reader)?;
        if num_slice_groups_minus1 > 7 {
            return Err(Error::InvalidValue("num_slice_groups_minus1"));
        }
        let mut slice_group_map_type = 0;
        let mut run_length_minus1 = Vec::new();
        let mut top_left = Vec::new();
        let mut bottom_right = Vec::new();
        let mut slice_group_change_direction_flag = false;
        let mut slice_group_change_rate_minus1 = 0;
        let mut pic_size_in_map_units_minus1 = 0;
        let mut slice_group_id = Vec::new();

        if num_slice_groups_minus1 > 0 {
            slice_group_map_type = read_ue(&mut reader)?;

            match slice_group_map_type {
                0 => {
                    for _ in 0..=num_slice_groups_minus1 {
                        run_length_minus1.push(read_ue(&mut reader)?);
                    }
                }
                1 => {}
                2 => {
                    for _ in 0..num_slice_groups_minus1 {
                        top_left.push(read_ue(&mut reader)?);
                        bottom_right.push(read_ue(&mut reader)?);
                    }
                }
                3 | 4 | 5 => {
                    slice_group_change_direction_flag = reader.read_flag()?;
                    slice_group_change_rate_minus1 = read_ue(&mut reader)?;
                }
                6 => {
                    pic_size_in_map_units_minus1 = read_ue(&mut reader)?;
                    // slice_group_id is Ceil(Log2(num_slice_groups_minus1 + 1))
                    // bits wide, not a fixed single bit.
                    let id_bits = 32 - num_slice_groups_minus1.leading_zeros();
                    for _ in 0..=pic_size_in_map_units_minus1 {
                        slice_group_id.push(reader.read_bits(id_bits)?);
                    }
                }
                _ => return Err(Error::InvalidValue("slice_group_map_type")),
            }
        }

        let num_ref_idx_l0_default_active_minus1 = read_ue(&mut reader)?;
        if num_ref_idx_l0_default_active_minus1 > 31 {
            return Err(Error::InvalidValue("num_ref_idx_l0_default_active_minus1"));
        }

        let num_ref_idx_l1_default_active_minus1 = read_ue(&mut reader)?;
        if num_ref_idx_l1_default_active_minus1 > 31 {
            return Err(Error::InvalidValue("num_ref_idx_l1_default_active_minus1"));
        }

        let weighted_pred_flag = reader.read_flag()?;
        let weighted_bipred_idc = reader.read_bits(2)? as u8;

        let pic_init_qp_minus26 = read_se(&mut reader)?;
        if !(-26..=25).contains(&pic_init_qp_minus26) {
            return Err(Error::InvalidValue("pic_init_qp_minus26"));
        }

        let pic_init_qs_minus26 = read_se(&mut reader)?;
        if !(-26..=25).contains(&pic_init_qs_minus26) {
            return Err(Error::InvalidValue("pic_init_qs_minus26"));
        }

        let chroma_qp_index_offset = read_se(&mut reader)?;
        if !(-12..=12).contains(&chroma_qp_index_offset) {
            return Err(Error::InvalidValue("chroma_qp_index_offset"));
        }

        let deblocking_filter_control_present_flag = reader.read_flag()?;
        let constrained_intra_pred_flag = reader.read_flag()?;
        let redundant_pic_cnt_present_flag = reader.read_flag()?;

        let mut transform_8x8_mode_flag = false;
        let mut pic_scaling_matrix_present_flag = false;
        let mut second_chroma_qp_index_offset = chroma_qp_index_offset;

        if reader.more_rbsp_data() {
            transform_8x8_mode_flag = reader.read_flag()?;
            pic_scaling_matrix_present_flag = reader.read_flag()?;

            if pic_scaling_matrix_present_flag {
                return Err(Error::Unsupported("pic_scaling_matrix"));
            }

            second_chroma_qp_index_offset = read_se(&mut reader)?;
            if !(-12..=12).contains(&second_chroma_qp_index_offset) {
                return Err(Error::InvalidValue("second_chroma_qp_index_offset"));
            }
        }

        reader.rbsp_trailing_bits()?;

        Ok(Pps {
            pic_parameter_set_id: pic_parameter_set_id as u8,
            seq_parameter_set_id: seq_parameter_set_id as u8,
            entropy_coding_mode_flag,
            bottom_field_pic_order_in_frame_present_flag,
            num_slice_groups_minus1,
            slice_group_map_type,
            run_length_minus1,
            top_left,
            bottom_right,
            slice_group_change_direction_flag,
            slice_group_change_rate_minus1,
            pic_size_in_map_units_minus1,
            slice_group_id,
            num_ref_idx_l0_default_active_minus1: num_ref_idx_l0_default_active_minus1 as u8,
            num_ref_idx_l1_default_active_minus1: num_ref_idx_l1_default_active_minus1 as u8,
            weighted_pred_flag,
            weighted_bipred_idc,
            pic_init_qp_minus26: pic_init_qp_minus26 as i8,
            pic_init_qs_minus26: pic_init_qs_minus26 as i8,
            chroma_qp_index_offset: chroma_qp_index_offset as i8,
            deblocking_filter_control_present_flag,
            constrained_intra_pred_flag,
            redundant_pic_cnt_present_flag,
            transform_8x8_mode_flag,
            pic_scaling_matrix_present_flag,
            second_chroma_qp_index_offset: second_chroma_qp_index_offset as i8,
        })
    }
}
