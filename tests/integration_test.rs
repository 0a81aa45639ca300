use hex_literal::hex;
use sha2::{Digest, Sha256};

use h264_syntax::nal::{ebsp_to_rbsp, rbsp_to_ebsp};
use h264_syntax::{
    scan_annexb, transform_annexb, Error, H264Parser, MbType, NaluPayload, SliceType,
};

/* --------------------------
   Tiny RBSP bit writer utils
   -------------------------- */

struct BitWriter {
    bytes: Vec<u8>,
    cur: u8,
    nbits: u8,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            cur: 0,
            nbits: 0,
        }
    }

    fn write_bit(&mut self, bit: bool) {
        self.cur <<= 1;
        if bit {
            self.cur |= 1;
        }
        self.nbits += 1;
        if self.nbits == 8 {
            self.bytes.push(self.cur);
            self.cur = 0;
            self.nbits = 0;
        }
    }

    fn write_bits(&mut self, n: u32, val: u32) {
        for i in (0..n).rev() {
            self.write_bit((val >> i) & 1 != 0);
        }
    }

    fn write_flag(&mut self, b: bool) {
        self.write_bit(b);
    }

    fn write_u8(&mut self, v: u8) {
        self.write_bits(8, v as u32);
    }

    fn finish_trailing_bits(mut self) -> Vec<u8> {
        // rbsp_stop_one_bit plus alignment zeros.
        self.write_bit(true);
        while self.nbits != 0 {
            self.write_bit(false);
        }
        self.bytes
    }
}

fn ue(w: &mut BitWriter, v: u32) {
    if v == 0 {
        w.write_bit(true);
        return;
    }
    let code_num = v + 1;
    let bits = 32 - code_num.leading_zeros();
    for _ in 0..bits - 1 {
        w.write_bit(false);
    }
    for i in (0..bits).rev() {
        w.write_bit((code_num >> i) & 1 != 0);
    }
}

fn se(w: &mut BitWriter, v: i32) {
    let k = if v == 0 {
        0
    } else if v > 0 {
        (v as u32) * 2 - 1
    } else {
        (-v as u32) * 2
    };
    ue(w, k);
}

fn push_start_code(dst: &mut Vec<u8>) {
    dst.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
}

fn nal_header(ref_idc: u8, nal_unit_type: u8) -> u8 {
    ((ref_idc & 0b11) << 5) | (nal_unit_type & 0b1_1111)
}

/// Baseline SPS: 4:2:0, progressive, POC type 2, `width_mbs` x `height_mbs`
/// macroblocks, frame_num in 4 bits.
fn build_sps(width_mbs: u32, height_mbs: u32) -> Vec<u8> {
    let mut rbsp = BitWriter::new();
    rbsp.write_u8(66); // profile_idc: baseline
    rbsp.write_u8(0); // constraint flags + reserved_zero_2bits
    rbsp.write_u8(30); // level_idc

    ue(&mut rbsp, 0); // seq_parameter_set_id
    ue(&mut rbsp, 0); // log2_max_frame_num_minus4
    ue(&mut rbsp, 2); // pic_order_cnt_type
    ue(&mut rbsp, 0); // max_num_ref_frames
    rbsp.write_flag(false); // gaps_in_frame_num_value_allowed_flag
    ue(&mut rbsp, width_mbs - 1); // pic_width_in_mbs_minus1
    ue(&mut rbsp, height_mbs - 1); // pic_height_in_map_units_minus1
    rbsp.write_flag(true); // frame_mbs_only_flag
    rbsp.write_flag(false); // direct_8x8_inference_flag
    rbsp.write_flag(false); // frame_cropping_flag
    rbsp.write_flag(false); // vui_parameters_present_flag

    let mut out = vec![nal_header(3, 7)];
    out.extend_from_slice(&rbsp_to_ebsp(&rbsp.finish_trailing_bits()));
    out
}

/// CAVLC PPS with no slice groups and all defaults zero.
fn build_pps() -> Vec<u8> {
    let mut rbsp = BitWriter::new();
    ue(&mut rbsp, 0); // pic_parameter_set_id
    ue(&mut rbsp, 0); // seq_parameter_set_id
    rbsp.write_flag(false); // entropy_coding_mode_flag
    rbsp.write_flag(false); // bottom_field_pic_order_in_frame_present_flag
    ue(&mut rbsp, 0); // num_slice_groups_minus1
    ue(&mut rbsp, 0); // num_ref_idx_l0_default_active_minus1
    ue(&mut rbsp, 0); // num_ref_idx_l1_default_active_minus1
    rbsp.write_flag(false); // weighted_pred_flag
    rbsp.write_bits(2, 0); // weighted_bipred_idc
    se(&mut rbsp, 0); // pic_init_qp_minus26
    se(&mut rbsp, 0); // pic_init_qs_minus26
    se(&mut rbsp, 0); // chroma_qp_index_offset
    rbsp.write_flag(false); // deblocking_filter_control_present_flag
    rbsp.write_flag(false); // constrained_intra_pred_flag
    rbsp.write_flag(false); // redundant_pic_cnt_present_flag

    let mut out = vec![nal_header(3, 8)];
    out.extend_from_slice(&rbsp_to_ebsp(&rbsp.finish_trailing_bits()));
    out
}

/// IDR slice header for an I slice (slice_type 7): frame_num 0, idr_pic_id 0,
/// dec_ref_pic_marking flags clear, slice_qp_delta 0.
fn write_idr_i_slice_header(rbsp: &mut BitWriter) {
    ue(rbsp, 0); // first_mb_in_slice
    ue(rbsp, 7); // slice_type: I (all slices)
    ue(rbsp, 0); // pic_parameter_set_id
    rbsp.write_bits(4, 0); // frame_num
    ue(rbsp, 0); // idr_pic_id
    rbsp.write_flag(false); // no_output_of_prior_pics_flag
    rbsp.write_flag(false); // long_term_reference_flag
    se(rbsp, 0); // slice_qp_delta
}

/// One I_16x16_0_0_0 macroblock whose DC block holds a single +1 at
/// coefficient 0.
fn write_i16x16_dc_macroblock(rbsp: &mut BitWriter) {
    ue(rbsp, 1); // mb_type: I_16x16_0_0_0
    ue(rbsp, 0); // intra_chroma_pred_mode
    se(rbsp, 0); // mb_qp_delta
    // DC block, nC = 0: coeff_token (TotalCoeff 1, TrailingOnes 1) = 01.
    rbsp.write_bits(2, 0b01);
    rbsp.write_flag(false); // trailing_ones_sign_flag: +1
    rbsp.write_bit(true); // total_zeros = 0
}

fn build_idr_slice_one_mb() -> Vec<u8> {
    let mut rbsp = BitWriter::new();
    write_idr_i_slice_header(&mut rbsp);
    write_i16x16_dc_macroblock(&mut rbsp);
    let mut out = vec![nal_header(3, 5)];
    out.extend_from_slice(&rbsp_to_ebsp(&rbsp.finish_trailing_bits()));
    out
}

fn assemble(parts: &[Vec<u8>]) -> Vec<u8> {
    let mut stream = Vec::new();
    for part in parts {
        push_start_code(&mut stream);
        stream.extend_from_slice(part);
    }
    stream
}

#[test]
fn test_aud_alone() {
    let data = hex!("00 00 00 01 09 10");

    let ranges = scan_annexb(&data);
    assert_eq!(ranges.len(), 1);
    assert_eq!((ranges[0].start, ranges[0].end), (4, 5));
    assert!(ranges[0].long_start_code);
    assert_eq!(ranges[0].forbidden_zero_bit, 0);
    assert_eq!(ranges[0].nal_ref_idc, 0);
    assert_eq!(ranges[0].nal_unit_type, 9);

    let nalus = H264Parser::parse_all(&data).unwrap();
    assert_eq!(nalus.len(), 1);
    match &nalus[0].payload {
        NaluPayload::Aud(aud) => assert_eq!(aud.primary_pic_type, 0),
        other => panic!("expected AUD, got {:?}", other),
    }
}

#[test]
fn test_epb_insertion_vectors() {
    assert_eq!(rbsp_to_ebsp(&hex!("00 00 00")), hex!("00 00 03 00"));
    assert_eq!(rbsp_to_ebsp(&hex!("00 00 01")), hex!("00 00 03 01"));
    assert_eq!(rbsp_to_ebsp(&hex!("00 00 02")), hex!("00 00 03 02"));
    assert_eq!(ebsp_to_rbsp(&hex!("00 00 03 00")), hex!("00 00 00"));
}

#[test]
fn test_real_sps_pps_stream() {
    let stream = hex!(
        "00 00 00 01 67 42 00 1f ac 34 c8 14 00 00 03 00"
        "04 00 00 03 00 f0 3c 60 c6 58"
        "00 00 00 01 68 ce 3c 80"
    );

    let nalus = H264Parser::parse_all(&stream).unwrap();
    assert_eq!(nalus.len(), 2);

    match &nalus[0].payload {
        NaluPayload::Sps(sps) => {
            assert_eq!(sps.profile_idc, 66);
            assert_eq!(sps.level_idc, 31);
            assert_eq!(sps.chroma_array_type(), 1);
        }
        other => panic!("expected SPS, got {:?}", other),
    }
    match &nalus[1].payload {
        NaluPayload::Pps(pps) => {
            assert!(!pps.entropy_coding_mode_flag);
        }
        other => panic!("expected PPS, got {:?}", other),
    }
}

#[test]
fn test_idr_slice_decodes_to_macroblock_residual() {
    let stream = assemble(&[build_sps(1, 1), build_pps(), build_idr_slice_one_mb()]);

    let nalus = H264Parser::parse_all(&stream).unwrap();
    assert_eq!(nalus.len(), 3);

    let slice = match &nalus[2].payload {
        NaluPayload::Slice(slice) => slice,
        other => panic!("expected slice, got {:?}", other),
    };

    assert!(slice.is_idr);
    assert_eq!(slice.header.slice_type, SliceType::I);
    assert_eq!(slice.header.slice_type_raw, 7);
    assert_eq!(slice.pic_size_in_mbs, 1);
    assert_eq!(slice.macroblocks.len(), 1);

    let mb = &slice.macroblocks[&0];
    assert_eq!(mb.mb_type, MbType::I16x16(1));
    assert_eq!(mb.coded_mb_type, 1);
    assert_eq!(mb.intra_chroma_pred_mode, Some(0));
    assert_eq!(mb.mb_qp_delta, Some(0));
    assert_eq!(mb.cbp_luma, 0);
    assert_eq!(mb.cbp_chroma, 0);

    // The DC block carries a single +1 at coefficient 0.
    assert_eq!(mb.intra16x16_dc_level[0], 1);
    assert!(mb.intra16x16_dc_level[1..].iter().all(|&c| c == 0));
    assert_eq!(mb.total_coeff[0], 1);
    assert!(mb
        .intra16x16_ac_level
        .iter()
        .all(|b| b.iter().all(|&c| c == 0)));
    assert!(mb.end_pos > mb.start_pos);
}

#[test]
fn test_idr_slice_two_macroblocks() {
    let mut rbsp = BitWriter::new();
    write_idr_i_slice_header(&mut rbsp);
    write_i16x16_dc_macroblock(&mut rbsp);
    write_i16x16_dc_macroblock(&mut rbsp);
    let mut slice_nalu = vec![nal_header(3, 5)];
    slice_nalu.extend_from_slice(&rbsp_to_ebsp(&rbsp.finish_trailing_bits()));

    let stream = assemble(&[build_sps(2, 1), build_pps(), slice_nalu]);
    let nalus = H264Parser::parse_all(&stream).unwrap();

    let slice = match &nalus[2].payload {
        NaluPayload::Slice(slice) => slice,
        other => panic!("expected slice, got {:?}", other),
    };
    assert_eq!(slice.macroblocks.len(), 2);
    assert_eq!(slice.macroblocks[&1].intra16x16_dc_level[0], 1);
    assert_eq!(slice.macroblocks[&1].total_coeff[0], 1);
}

#[test]
fn test_i_nxn_macroblock_prediction_modes() {
    let mut rbsp = BitWriter::new();
    write_idr_i_slice_header(&mut rbsp);
    ue(&mut rbsp, 0); // mb_type: I_NxN
    for _ in 0..16 {
        rbsp.write_flag(true); // prev_intra4x4_pred_mode_flag
    }
    ue(&mut rbsp, 0); // intra_chroma_pred_mode
    ue(&mut rbsp, 3); // coded_block_pattern: codeNum 3 -> intra CBP 0
    let mut slice_nalu = vec![nal_header(3, 5)];
    slice_nalu.extend_from_slice(&rbsp_to_ebsp(&rbsp.finish_trailing_bits()));

    let stream = assemble(&[build_sps(1, 1), build_pps(), slice_nalu]);
    let nalus = H264Parser::parse_all(&stream).unwrap();

    let slice = match &nalus[2].payload {
        NaluPayload::Slice(slice) => slice,
        other => panic!("expected slice, got {:?}", other),
    };
    let mb = &slice.macroblocks[&0];
    assert_eq!(mb.mb_type, MbType::INxN);
    assert!(mb.prev_intra4x4_pred_mode_flag.iter().all(|&f| f));
    assert_eq!(mb.coded_block_pattern, Some(0));
    assert_eq!(mb.mb_qp_delta, None);
}

#[test]
fn test_p_slice_skip_run() {
    let mut rbsp = BitWriter::new();
    ue(&mut rbsp, 0); // first_mb_in_slice
    ue(&mut rbsp, 5); // slice_type: P (all slices)
    ue(&mut rbsp, 0); // pic_parameter_set_id
    rbsp.write_bits(4, 1); // frame_num
    rbsp.write_flag(false); // num_ref_idx_active_override_flag
    rbsp.write_flag(false); // ref_pic_list_modification_flag_l0
    rbsp.write_flag(false); // adaptive_ref_pic_marking_mode_flag
    se(&mut rbsp, 0); // slice_qp_delta
    ue(&mut rbsp, 1); // mb_skip_run: the whole 1x1 picture
    let mut slice_nalu = vec![nal_header(2, 1)];
    slice_nalu.extend_from_slice(&rbsp_to_ebsp(&rbsp.finish_trailing_bits()));

    let stream = assemble(&[
        build_sps(1, 1),
        build_pps(),
        build_idr_slice_one_mb(),
        slice_nalu,
    ]);
    let nalus = H264Parser::parse_all(&stream).unwrap();
    assert_eq!(nalus.len(), 4);

    let slice = match &nalus[3].payload {
        NaluPayload::Slice(slice) => slice,
        other => panic!("expected slice, got {:?}", other),
    };
    assert_eq!(slice.header.slice_type, SliceType::P);
    assert!(!slice.is_idr);
    // Every macroblock was skipped, so none was recorded.
    assert!(slice.macroblocks.is_empty());
}

#[test]
fn test_missing_sps_is_reported() {
    // A PPS alone references SPS 0, which is absent: the PPS still parses,
    // but a slice then fails with MissingSps.
    let stream = assemble(&[build_pps(), build_idr_slice_one_mb()]);
    let mut parser = H264Parser::new();
    parser.push(&stream);

    let first = parser.next_nalu().unwrap().unwrap();
    assert!(matches!(first.payload, NaluPayload::Pps(_)));
    assert_eq!(parser.next_nalu().unwrap_err(), Error::MissingSps(0));
}

#[test]
fn test_transform_identity_preserves_sha256() {
    let mut stream = vec![0x00, 0x00, 0x01, 0x09, 0x10]; // 3-byte start code AUD
    stream.extend_from_slice(&assemble(&[
        build_sps(1, 1),
        build_pps(),
        build_idr_slice_one_mb(),
    ]));

    let out = transform_annexb(&stream, |payload, _, _, _| Ok(payload.to_vec())).unwrap();

    let digest_in: [u8; 32] = Sha256::digest(&stream).into();
    let digest_out: [u8; 32] = Sha256::digest(&out).into();
    assert_eq!(digest_in, digest_out);
}

#[test]
fn test_transform_slice_payloads_round_trip() {
    // XOR the body of every slice NALU, leaving the header byte alone; a
    // second pass restores the stream.
    let stream = assemble(&[build_sps(1, 1), build_pps(), build_idr_slice_one_mb()]);

    let xor_slices = |data: &[u8]| {
        transform_annexb(data, |payload, _, _, nal_unit_type| {
            let mut out = payload.to_vec();
            if matches!(nal_unit_type, 1 | 5) {
                // Work on the RBSP so no start-code pattern can appear.
                let mut rbsp = ebsp_to_rbsp(&out[1..]);
                for b in &mut rbsp {
                    *b ^= 0x5a;
                }
                out.truncate(1);
                out.extend_from_slice(&rbsp_to_ebsp(&rbsp));
            }
            Ok(out)
        })
        .unwrap()
    };

    let scrambled = xor_slices(&stream);
    assert_ne!(scrambled, stream);

    let restored = xor_slices(&scrambled);
    assert_eq!(restored, stream);
}
