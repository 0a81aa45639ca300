use crate::bitreader::BitReader;
use crate::eg::{read_se, read_ue};
use crate::nal::NalUnitType;
use crate::pps::Pps;
use crate::sps::Sps;
use crate::{Error, Result};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceType {
    P,
    B,
    I,
    Sp,
    Si,
}

impl SliceType {
    /// Normalises the coded slice_type (0..9; 5..9 mean "whole picture uses
    /// this type") to its class.
    pub fn from_value(value: u32) -> Option<Self> {
        if value > 9 {
            return None;
        }
        match value % 5 {
            0 => Some(SliceType::P),
            1 => Some(SliceType::B),
            2 => Some(SliceType::I),
            3 => Some(SliceType::Sp),
            4 => Some(SliceType::Si),
            _ => None,
        }
    }

    pub fn is_intra(&self) -> bool {
        matches!(self, SliceType::I | SliceType::Si)
    }
}

/// ref_pic_list_modification entry (clause 7.3.3.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefPicListModification {
    /// modification_of_pic_nums_idc == 0
    ShortTermSubtract { abs_diff_pic_num_minus1: u32 },
    /// modification_of_pic_nums_idc == 1
    ShortTermAdd { abs_diff_pic_num_minus1: u32 },
    /// modification_of_pic_nums_idc == 2
    LongTerm { long_term_pic_num: u32 },
}

/// memory_management_control_operation entry (clause 7.3.3.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mmco {
    UnmarkShortTerm { difference_of_pic_nums_minus1: u32 },
    UnmarkLongTerm { long_term_pic_num: u32 },
    AssignLongTermFrameIdx {
        difference_of_pic_nums_minus1: u32,
        long_term_frame_idx: u32,
    },
    SetMaxLongTermFrameIdx { max_long_term_frame_idx_plus1: u32 },
    UnmarkAll,
    MarkCurrentAsLongTerm { long_term_frame_idx: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecRefPicMarking {
    Idr {
        no_output_of_prior_pics_flag: bool,
        long_term_reference_flag: bool,
    },
    /// adaptive_ref_pic_marking_mode_flag == 0
    SlidingWindow,
    /// adaptive_ref_pic_marking_mode_flag == 1
    Adaptive(Vec<Mmco>),
}

/// pred_weight_table (clause 7.3.3.2). Entries are None when the per-ref
/// weight flag was zero.
#[derive(Debug, Clone, Default)]
pub struct PredWeightTable {
    pub luma_log2_weight_denom: u32,
    pub chroma_log2_weight_denom: u32,
    pub luma_weights_l0: Vec<Option<(i32, i32)>>,
    pub chroma_weights_l0: Vec<Option<[(i32, i32); 2]>>,
    pub luma_weights_l1: Vec<Option<(i32, i32)>>,
    pub chroma_weights_l1: Vec<Option<[(i32, i32); 2]>>,
}

#[derive(Debug, Clone)]
pub struct SliceHeader {
    pub first_mb_in_slice: u32,
    /// slice_type exactly as coded.
    pub slice_type_raw: u32,
    pub slice_type: SliceType,
    pub pic_parameter_set_id: u8,
    pub colour_plane_id: u8,
    pub frame_num: u32,
    pub field_pic_flag: bool,
    pub bottom_field_flag: bool,
    pub idr_pic_id: Option<u32>,
    pub pic_order_cnt_lsb: Option<u32>,
    pub delta_pic_order_cnt_bottom: Option<i32>,
    pub delta_pic_order_cnt: [Option<i32>; 2],
    pub redundant_pic_cnt: Option<u32>,
    pub direct_spatial_mv_pred_flag: bool,
    pub num_ref_idx_active_override_flag: bool,
    pub num_ref_idx_l0_active_minus1: u32,
    pub num_ref_idx_l1_active_minus1: u32,
    pub ref_pic_list_modification_flag_l0: bool,
    pub ref_pic_list_modifications_l0: Vec<RefPicListModification>,
    pub ref_pic_list_modification_flag_l1: bool,
    pub ref_pic_list_modifications_l1: Vec<RefPicListModification>,
    pub pred_weight_table: Option<PredWeightTable>,
    pub dec_ref_pic_marking: Option<DecRefPicMarking>,
    pub cabac_init_idc: Option<u32>,
    pub slice_qp_delta: i32,
    pub sp_for_switch_flag: bool,
    pub slice_qs_delta: Option<i32>,
    pub disable_deblocking_filter_idc: u32,
    pub slice_alpha_c0_offset_div2: i32,
    pub slice_beta_offset_div2: i32,
    pub slice_group_change_cycle: Option<u32>,
}

pub(crate) fn ceil_log2(v: u32) -> u32 {
    if v <= 1 {
        0
    } else {
        32 - (v - 1).leading_zeros()
    }
}

impl SliceHeader {
    /// Parses a slice_header from a fresh reader over the slice RBSP.
    pub fn parse(rbsp: &[u8], nal_type: NalUnitType, nal_ref_idc: u8, sps: &Sps, pps: &Pps) -> Result<Self> {
        let mut reader = BitReader::new(rbsp);
        Self::read(&mut reader, nal_type, nal_ref_idc, sps, pps)
    }

    /// Reads a slice_header (clause 7.3.3), leaving the cursor at the first
    /// bit of slice_data.
    pub fn read(
        reader: &mut BitReader,
        nal_type: NalUnitType,
        nal_ref_idc: u8,
        sps: &Sps,
        pps: &Pps,
    ) -> Result<Self> {
        let idr_pic_flag = nal_type == NalUnitType::IdrSlice;

        let first_mb_in_slice = read_ue(reader)?;

        let slice_type_raw = read_ue(reader)?;
        let slice_type = SliceType::from_value(slice_type_raw)
            .ok_or(Error::InvalidValue("slice_type"))?;

        let pic_parameter_set_id = read_ue(reader)?;
        if pic_parameter_set_id > 255 {
            return Err(Error::InvalidValue("pic_parameter_set_id"));
        }

        let mut colour_plane_id = 0;
        if sps.separate_colour_plane_flag {
            colour_plane_id = reader.read_bits(2)? as u8;
        }

        let frame_num_bits = sps.log2_max_frame_num_minus4 as u32 + 4;
        let frame_num = reader.read_bits(frame_num_bits)?;

        let mut field_pic_flag = false;
        let mut bottom_field_flag = false;

        if !sps.frame_mbs_only_flag {
            field_pic_flag = reader.read_flag()?;
            if field_pic_flag {
                bottom_field_flag = reader.read_flag()?;
            }
        }

        let mut idr_pic_id = None;
        if idr_pic_flag {
            idr_pic_id = Some(read_ue(reader)?);
        }

        let mut pic_order_cnt_lsb = None;
        let mut delta_pic_order_cnt_bottom = None;
        let mut delta_pic_order_cnt = [None, None];

        if sps.pic_order_cnt_type == 0 {
            let poc_lsb_bits = sps.log2_max_pic_order_cnt_lsb_minus4 as u32 + 4;
            pic_order_cnt_lsb = Some(reader.read_bits(poc_lsb_bits)?);

            if pps.bottom_field_pic_order_in_frame_present_flag && !field_pic_flag {
                delta_pic_order_cnt_bottom = Some(read_se(reader)?);
            }
        } else if sps.pic_order_cnt_type == 1 && !sps.delta_pic_order_always_zero_flag {
            delta_pic_order_cnt[0] = Some(read_se(reader)?);

            if pps.bottom_field_pic_order_in_frame_present_flag && !field_pic_flag {
                delta_pic_order_cnt[1] = Some(read_se(reader)?);
            }
        }

        let mut redundant_pic_cnt = None;
        if pps.redundant_pic_cnt_present_flag {
            redundant_pic_cnt = Some(read_ue(reader)?);
        }

        let mut direct_spatial_mv_pred_flag = false;
        if slice_type == SliceType::B {
            direct_spatial_mv_pred_flag = reader.read_flag()?;
        }

        let mut num_ref_idx_active_override_flag = false;
        let mut num_ref_idx_l0_active_minus1 = pps.num_ref_idx_l0_default_active_minus1 as u32;
        let mut num_ref_idx_l1_active_minus1 = pps.num_ref_idx_l1_default_active_minus1 as u32;

        if matches!(slice_type, SliceType::P | SliceType::Sp | SliceType::B) {
            num_ref_idx_active_override_flag = reader.read_flag()?;

            if num_ref_idx_active_override_flag {
                num_ref_idx_l0_active_minus1 = read_ue(reader)?;

                if slice_type == SliceType::B {
                    num_ref_idx_l1_active_minus1 = read_ue(reader)?;
                }
            }
        }

        let mut ref_pic_list_modification_flag_l0 = false;
        let mut ref_pic_list_modifications_l0 = Vec::new();
        if !slice_type.is_intra() {
            ref_pic_list_modification_flag_l0 = reader.read_flag()?;
            if ref_pic_list_modification_flag_l0 {
                ref_pic_list_modifications_l0 = read_ref_pic_list_modifications(reader)?;
            }
        }

        let mut ref_pic_list_modification_flag_l1 = false;
        let mut ref_pic_list_modifications_l1 = Vec::new();
        if slice_type == SliceType::B {
            ref_pic_list_modification_flag_l1 = reader.read_flag()?;
            if ref_pic_list_modification_flag_l1 {
                ref_pic_list_modifications_l1 = read_ref_pic_list_modifications(reader)?;
            }
        }

        let chroma_array_type = sps.chroma_array_type();
        let mut pred_weight_table = None;
        if (pps.weighted_pred_flag && matches!(slice_type, SliceType::P | SliceType::Sp))
            || (pps.weighted_bipred_idc == 1 && slice_type == SliceType::B)
        {
            pred_weight_table = Some(read_pred_weight_table(
                reader,
                slice_type,
                chroma_array_type,
                num_ref_idx_l0_active_minus1,
                num_ref_idx_l1_active_minus1,
            )?);
        }

        let mut dec_ref_pic_marking = None;
        if nal_ref_idc != 0 {
            dec_ref_pic_marking = Some(read_dec_ref_pic_marking(reader, idr_pic_flag)?);
        }

        let mut cabac_init_idc = None;
        if pps.entropy_coding_mode_flag && !slice_type.is_intra() {
            cabac_init_idc = Some(read_ue(reader)?);
        }

        let slice_qp_delta = read_se(reader)?;

        let mut sp_for_switch_flag = false;
        let mut slice_qs_delta = None;
        if matches!(slice_type, SliceType::Sp | SliceType::Si) {
            if slice_type == SliceType::Sp {
                sp_for_switch_flag = reader.read_flag()?;
            }
            slice_qs_delta = Some(read_se(reader)?);
        }

        let mut disable_deblocking_filter_idc = 0;
        let mut slice_alpha_c0_offset_div2 = 0;
        let mut slice_beta_offset_div2 = 0;
        if pps.deblocking_filter_control_present_flag {
            disable_deblocking_filter_idc = read_ue(reader)?;
            if disable_deblocking_filter_idc != 1 {
                slice_alpha_c0_offset_div2 = read_se(reader)?;
                slice_beta_offset_div2 = read_se(reader)?;
            }
        }

        let mut slice_group_change_cycle = None;
        if pps.num_slice_groups_minus1 > 0 && (3..=5).contains(&pps.slice_group_map_type) {
            let pic_width_in_mbs = sps.pic_width_in_mbs_minus1 + 1;
            let pic_size_in_map_units = pic_width_in_mbs * (sps.pic_height_in_map_units_minus1 + 1);
            let change_rate = pps.slice_group_change_rate_minus1 + 1;
            let bits = ceil_log2(pic_size_in_map_units / change_rate + 1);
            slice_group_change_cycle = Some(reader.read_bits(bits)?);
        }

        debug!(
            "slice_header: type={:?} first_mb={} frame_num={} pps={} qp_delta={}",
            slice_type, first_mb_in_slice, frame_num, pic_parameter_set_id, slice_qp_delta
        );

        Ok(SliceHeader {
            first_mb_in_slice,
            slice_type_raw,
            slice_type,
            pic_parameter_set_id: pic_parameter_set_id as u8,
            colour_plane_id,
            frame_num,
            field_pic_flag,
            bottom_field_flag,
            idr_pic_id,
            pic_order_cnt_lsb,
            delta_pic_order_cnt_bottom,
            delta_pic_order_cnt,
            redundant_pic_cnt,
            direct_spatial_mv_pred_flag,
            num_ref_idx_active_override_flag,
            num_ref_idx_l0_active_minus1,
            num_ref_idx_l1_active_minus1,
            ref_pic_list_modification_flag_l0,
            ref_pic_list_modifications_l0,
            ref_pic_list_modification_flag_l1,
            ref_pic_list_modifications_l1,
            pred_weight_table,
            dec_ref_pic_marking,
            cabac_init_idc,
            slice_qp_delta,
            sp_for_switch_flag,
            slice_qs_delta,
            disable_deblocking_filter_idc,
            slice_alpha_c0_offset_div2,
            slice_beta_offset_div2,
            slice_group_change_cycle,
        })
    }
}

/// modification_of_pic_nums_idc == 3 ends the list without operands.
fn read_ref_pic_list_modifications(
    reader: &mut BitReader,
) -> Result<Vec<RefPicListModification>> {
    let mut entries = Vec::new();
    loop {
        let idc = read_ue(reader)?;
        match idc {
            0 => entries.push(RefPicListModification::ShortTermSubtract {
                abs_diff_pic_num_minus1: read_ue(reader)?,
            }),
            1 => entries.push(RefPicListModification::ShortTermAdd {
                abs_diff_pic_num_minus1: read_ue(reader)?,
            }),
            2 => entries.push(RefPicListModification::LongTerm {
                long_term_pic_num: read_ue(reader)?,
            }),
            3 => return Ok(entries),
            _ => return Err(Error::InvalidValue("modification_of_pic_nums_idc")),
        }
    }
}

fn read_weight_entries(
    reader: &mut BitReader,
    count: usize,
    chroma_array_type: u8,
) -> Result<(Vec<Option<(i32, i32)>>, Vec<Option<[(i32, i32); 2]>>)> {
    let mut luma = Vec::with_capacity(count);
    let mut chroma = Vec::with_capacity(count);
    for _ in 0..count {
        if reader.read_flag()? {
            let weight = read_se(reader)?;
            let offset = read_se(reader)?;
            luma.push(Some((weight, offset)));
        } else {
            luma.push(None);
        }
        if chroma_array_type != 0 {
            if reader.read_flag()? {
                let mut entry = [(0, 0); 2];
                for component in &mut entry {
                    let weight = read_se(reader)?;
                    let offset = read_se(reader)?;
                    *component = (weight, offset);
                }
                chroma.push(Some(entry));
            } else {
                chroma.push(None);
            }
        }
    }
    Ok((luma, chroma))
}

fn read_pred_weight_table(
    reader: &mut BitReader,
    slice_type: SliceType,
    chroma_array_type: u8,
    num_ref_idx_l0_active_minus1: u32,
    num_ref_idx_l1_active_minus1: u32,
) -> Result<PredWeightTable> {
    let luma_log2_weight_denom = read_ue(reader)?;
    let mut chroma_log2_weight_denom = 0;
    if chroma_array_type != 0 {
        chroma_log2_weight_denom = read_ue(reader)?;
    }

    let (luma_weights_l0, chroma_weights_l0) = read_weight_entries(
        reader,
        num_ref_idx_l0_active_minus1 as usize + 1,
        chroma_array_type,
    )?;

    let (luma_weights_l1, chroma_weights_l1) = if slice_type == SliceType::B {
        read_weight_entries(
            reader,
            num_ref_idx_l1_active_minus1 as usize + 1,
            chroma_array_type,
        )?
    } else {
        (Vec::new(), Vec::new())
    };

    Ok(PredWeightTable {
        luma_log2_weight_denom,
        chroma_log2_weight_denom,
        luma_weights_l0,
        chroma_weights_l0,
        luma_weights_l1,
        chroma_weights_l1,
    })
}

/// dec_ref_pic_marking (clause 7.3.3.3); MMCO 0 ends the adaptive list.
fn read_dec_ref_pic_marking(reader: &mut BitReader, idr_pic_flag: bool) -> Result<DecRefPicMarking> {
    if idr_pic_flag {
        let no_output_of_prior_pics_flag = reader.read_flag()?;
        let long_term_reference_flag = reader.read_flag()?;
        return Ok(DecRefPicMarking::Idr {
            no_output_of_prior_pics_flag,
            long_term_reference_flag,
        });
    }

    if !reader.read_flag()? {
        return Ok(DecRefPicMarking::SlidingWindow);
    }

    let mut ops = Vec::new();
    loop {
        let op = read_ue(reader)?;
        match op {
            0 => return Ok(DecRefPicMarking::Adaptive(ops)),
            1 => ops.push(Mmco::UnmarkShortTerm {
                difference_of_pic_nums_minus1: read_ue(reader)?,
            }),
            2 => ops.push(Mmco::UnmarkLongTerm {
                long_term_pic_num: read_ue(reader)?,
            }),
            3 => ops.push(Mmco::AssignLongTermFrameIdx {
                difference_of_pic_nums_minus1: read_ue(reader)?,
                long_term_frame_idx: read_ue(reader)?,
            }),
            4 => ops.push(Mmco::SetMaxLongTermFrameIdx {
                max_long_term_frame_idx_plus1: read_ue(reader)?,
            }),
            5 => ops.push(Mmco::UnmarkAll),
            6 => ops.push(Mmco::MarkCurrentAsLongTerm {
                long_term_frame_idx: read_ue(reader)?,
            }),
            _ => return Err(Error::InvalidValue("memory_management_control_operation")),
        }
    }
}
