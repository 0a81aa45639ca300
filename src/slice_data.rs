//! Slice body parsing: slice-group maps, the macroblock loop, prediction
//! syntax and CAVLC residual decoding (clauses 7.3.4, 7.3.5, 8.2.2, 9.2).

use crate::bitreader::BitReader;
use crate::cavlc;
use crate::eg::{read_se, read_te, read_ue};
use crate::macroblock::{
    inverse_raster_scan, read_coded_block_pattern, Macroblock, MbType, PredMode, SubMbType,
};
use crate::nal::NalUnitType;
use crate::pps::Pps;
use crate::slice::SliceHeader;
use crate::sps::Sps;
use crate::{Error, Result};
use log::{debug, trace};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Which residual array a CAVLC block decode is filling; drives the nC
/// neighbour derivation of clause 9.2.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Invoker {
    Intra16x16DcLevel,
    Intra16x16AcLevel,
    LumaLevel4x4,
    ChromaDcLevel,
    ChromaAcLevel,
    CbIntra16x16DcLevel,
    CbIntra16x16AcLevel,
    CbLevel4x4,
    CrIntra16x16DcLevel,
    CrIntra16x16AcLevel,
    CrLevel4x4,
}

/// Plane selector for residual_luma, reused for Cb/Cr when
/// ChromaArrayType == 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LumaPlane {
    Y,
    Cb,
    Cr,
}

impl LumaPlane {
    fn dc_invoker(self) -> Invoker {
        match self {
            LumaPlane::Y => Invoker::Intra16x16DcLevel,
            LumaPlane::Cb => Invoker::CbIntra16x16DcLevel,
            LumaPlane::Cr => Invoker::CrIntra16x16DcLevel,
        }
    }

    fn ac_invoker(self) -> Invoker {
        match self {
            LumaPlane::Y => Invoker::Intra16x16AcLevel,
            LumaPlane::Cb => Invoker::CbIntra16x16AcLevel,
            LumaPlane::Cr => Invoker::CrIntra16x16AcLevel,
        }
    }

    fn l4_invoker(self) -> Invoker {
        match self {
            LumaPlane::Y => Invoker::LumaLevel4x4,
            LumaPlane::Cb => Invoker::CbLevel4x4,
            LumaPlane::Cr => Invoker::CrLevel4x4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum NeighbourKind {
    A,
    B,
    C,
    D,
}

/// A parsed VCL slice: header, derived geometry, slice-group maps and the
/// macroblock records keyed by CurrMbAddr.
#[derive(Debug, Clone)]
pub struct Slice {
    pub header: SliceHeader,
    pub sps: Arc<Sps>,
    pub pps: Arc<Pps>,
    pub is_idr: bool,
    pub nal_ref_idc: u8,

    pub pic_width_in_mbs: u32,
    pub pic_height_in_mbs: u32,
    pub pic_size_in_mbs: u32,
    pub pic_size_in_map_units: u32,
    pub mbaff_frame_flag: bool,
    pub chroma_array_type: u8,
    pub sub_width_c: u32,
    pub sub_height_c: u32,
    pub mb_width_c: u32,
    pub mb_height_c: u32,
    pub bit_depth_y: u32,
    pub bit_depth_c: u32,

    pub map_unit_to_slice_group_map: Vec<u32>,
    pub mb_to_slice_group_map: Vec<u32>,

    pub macroblocks: BTreeMap<u32, Macroblock>,

    mb_field_decoding_flag: Option<bool>,
}

impl Slice {
    /// Parses a complete VCL slice from its RBSP. Parameter sets are borrowed
    /// immutably for the lifetime of the parse.
    pub fn parse(
        rbsp: &[u8],
        nal_type: NalUnitType,
        nal_ref_idc: u8,
        sps: Arc<Sps>,
        pps: Arc<Pps>,
    ) -> Result<Self> {
        let mut reader = BitReader::new(rbsp);
        let header = SliceHeader::read(&mut reader, nal_type, nal_ref_idc, &sps, &pps)?;
        debug!("slice_header end pos={}", reader.bit_position());

        let mut slice = Self::setup(header, nal_type == NalUnitType::IdrSlice, nal_ref_idc, sps, pps)?;
        slice.slice_data(&mut reader)?;
        Ok(slice)
    }

    /// Derives the slice geometry and slice-group maps (clauses 7.4.3 and
    /// 8.2.2) without consuming any slice_data bits.
    fn setup(
        header: SliceHeader,
        is_idr: bool,
        nal_ref_idc: u8,
        sps: Arc<Sps>,
        pps: Arc<Pps>,
    ) -> Result<Self> {
        let pic_width_in_mbs = sps.pic_width_in_mbs_minus1 + 1;
        let pic_height_in_map_units = sps.pic_height_in_map_units_minus1 + 1;
        let pic_size_in_map_units = pic_width_in_mbs * pic_height_in_map_units;

        let frame_height_in_mbs = (2 - sps.frame_mbs_only_flag as u32) * pic_height_in_map_units;
        let pic_height_in_mbs = frame_height_in_mbs / (1 + header.field_pic_flag as u32);
        let pic_size_in_mbs = pic_width_in_mbs * pic_height_in_mbs;

        let mbaff_frame_flag = sps.mb_adaptive_frame_field_flag && !header.field_pic_flag;
        let chroma_array_type = sps.chroma_array_type();
        let (sub_width_c, sub_height_c) = sps.sub_sampling().unwrap_or((0, 0));
        let (mb_width_c, mb_height_c) = if sub_width_c == 0 {
            (0, 0)
        } else {
            (16 / sub_width_c, 16 / sub_height_c)
        };

        let mut slice = Slice {
            header,
            sps,
            pps,
            is_idr,
            nal_ref_idc,
            pic_width_in_mbs,
            pic_height_in_mbs,
            pic_size_in_mbs,
            pic_size_in_map_units,
            mbaff_frame_flag,
            chroma_array_type,
            sub_width_c,
            sub_height_c,
            mb_width_c,
            mb_height_c,
            bit_depth_y: 0,
            bit_depth_c: 0,
            map_unit_to_slice_group_map: Vec::new(),
            mb_to_slice_group_map: Vec::new(),
            macroblocks: BTreeMap::new(),
            mb_field_decoding_flag: None,
        };
        slice.bit_depth_y = slice.sps.bit_depth_luma();
        slice.bit_depth_c = slice.sps.bit_depth_chroma();
        slice.setup_slice_group_maps()?;
        Ok(slice)
    }

    /// Clause 8.2.2: mapUnitToSliceGroupMap, then 8.2.2.8 conversion to
    /// MbToSliceGroupMap. Only map type 0 (interleaved run lengths) is
    /// decodable; a single slice group degenerates to the zero map.
    fn setup_slice_group_maps(&mut self) -> Result<()> {
        let size = self.pic_size_in_map_units as usize;
        let num_groups_minus1 = self.pps.num_slice_groups_minus1 as usize;

        let map_unit = if num_groups_minus1 == 0 {
            vec![0u32; size]
        } else if self.pps.slice_group_map_type == 0 {
            let run_length_minus1 = &self.pps.run_length_minus1;
            let mut map = vec![0u32; size];
            let mut i = 0usize;
            while i < size {
                let mut i_group = 0usize;
                while i_group <= num_groups_minus1 && i < size {
                    let run = run_length_minus1[i_group] as usize + 1;
                    let mut j = 0;
                    while j < run && i + j < size {
                        map[i + j] = i_group as u32;
                        j += 1;
                    }
                    i += run;
                    i_group += 1;
                }
            }
            map
        } else {
            return Err(Error::Unsupported("slice_group_map_type"));
        };

        let mb_count = self.pic_size_in_mbs as usize;
        let mut mb_map = vec![0u32; mb_count];
        if self.sps.frame_mbs_only_flag || self.header.field_pic_flag {
            mb_map.copy_from_slice(&map_unit[..mb_count]);
        } else if self.mbaff_frame_flag {
            for (i, entry) in mb_map.iter_mut().enumerate() {
                *entry = map_unit[i / 2];
            }
        } else {
            // Frame macroblocks in a stream that allows field coding: map
            // units cover macroblock pairs in interleaved order.
            let w = self.pic_width_in_mbs as usize;
            for (i, entry) in mb_map.iter_mut().enumerate() {
                *entry = map_unit[(i / (2 * w)) * w + i % w];
            }
        }

        self.map_unit_to_slice_group_map = map_unit;
        self.mb_to_slice_group_map = mb_map;
        Ok(())
    }

    /// NextMbAddress(n) of clause 8.2.2.8: the next macroblock in the same
    /// slice group, or PicSizeInMbs when exhausted.
    pub fn next_mb_address(&self, n: u32) -> u32 {
        let size = self.pic_size_in_mbs;
        if n >= size {
            return size;
        }
        let group = self.mb_to_slice_group_map[n as usize];
        let mut i = n + 1;
        while i < size && self.mb_to_slice_group_map[i as usize] != group {
            i += 1;
        }
        i
    }

    fn field_coding_mismatch(&self) -> bool {
        self.mb_field_decoding_flag
            .unwrap_or(self.header.field_pic_flag)
            != self.header.field_pic_flag
    }

    /// Clause 7.3.4 macroblock loop (CAVLC only).
    fn slice_data(&mut self, reader: &mut BitReader) -> Result<()> {
        if self.pps.entropy_coding_mode_flag {
            return Err(Error::Unsupported("CABAC"));
        }

        let mut curr_mb_addr = self.header.first_mb_in_slice * (1 + self.mbaff_frame_flag as u32);
        let mut more_data = true;
        let mut prev_mb_skipped = false;

        while more_data {
            if !self.header.slice_type.is_intra() {
                let mb_skip_run = read_ue(reader)?;
                prev_mb_skipped = mb_skip_run > 0;
                for _ in 0..mb_skip_run {
                    curr_mb_addr = self.next_mb_address(curr_mb_addr);
                }
                if mb_skip_run > 0 {
                    more_data = reader.more_rbsp_data();
                }
            }
            if more_data {
                if self.mbaff_frame_flag
                    && (curr_mb_addr % 2 == 0 || (curr_mb_addr % 2 == 1 && prev_mb_skipped))
                {
                    self.mb_field_decoding_flag = Some(reader.read_flag()?);
                }
                self.macroblock_layer(reader, curr_mb_addr)?;
            }
            more_data = reader.more_rbsp_data();
            curr_mb_addr = self.next_mb_address(curr_mb_addr);
        }
        Ok(())
    }

    /// Clause 7.3.5 macroblock_layer.
    fn macroblock_layer(&mut self, reader: &mut BitReader, curr_mb_addr: u32) -> Result<()> {
        if curr_mb_addr >= self.pic_size_in_mbs {
            return Err(Error::InvalidValue("CurrMbAddr"));
        }

        let coded_mb_type = read_ue(reader)?;
        let mb_type = MbType::resolve(coded_mb_type, self.header.slice_type)?;
        debug!(
            "macroblock_layer: addr={} mb_type={:?} pos={}",
            curr_mb_addr,
            mb_type,
            reader.bit_position()
        );

        let mut mb = Macroblock::new(curr_mb_addr, coded_mb_type, mb_type, self.header.slice_type);
        mb.start_pos = reader.bit_position();
        if let Some((luma, chroma)) = mb_type.intra16x16_coded_block_pattern() {
            mb.cbp_luma = luma;
            mb.cbp_chroma = chroma;
        }

        if mb_type == MbType::IPcm {
            while !reader.byte_aligned() {
                // pcm_alignment_zero_bit
                reader.read_bit()?;
            }
            let mut luma = Vec::with_capacity(256);
            for _ in 0..256 {
                luma.push(reader.read_bits(self.bit_depth_y)?);
            }
            let chroma_count = 2 * self.mb_width_c * self.mb_height_c;
            let mut chroma = Vec::with_capacity(chroma_count as usize);
            for _ in 0..chroma_count {
                chroma.push(reader.read_bits(self.bit_depth_c)?);
            }
            mb.pcm_sample_luma = Some(luma);
            mb.pcm_sample_chroma = Some(chroma);
        } else {
            let mut no_sub_mb_part_size_less_than_8x8 = true;

            if mb_type != MbType::INxN
                && mb.mb_part_pred_mode(0) != Some(PredMode::Intra16x16)
                && mb_type.num_mb_part() == Some(4)
            {
                self.sub_mb_pred(reader, &mut mb)?;
                for sub in mb.sub_mb_type.as_ref().unwrap() {
                    if *sub != SubMbType::BDirect8x8 {
                        if sub.num_sub_mb_part() > 1 {
                            no_sub_mb_part_size_less_than_8x8 = false;
                        }
                    } else if !self.header.direct_spatial_mv_pred_flag {
                        no_sub_mb_part_size_less_than_8x8 = false;
                    }
                }
            } else {
                if self.pps.transform_8x8_mode_flag && mb_type == MbType::INxN {
                    mb.transform_size_8x8_flag = reader.read_flag()?;
                }
                self.mb_pred(reader, &mut mb)?;
            }

            if mb.mb_part_pred_mode(0) != Some(PredMode::Intra16x16) {
                let intra_column = mb_type == MbType::INxN || mb_type == MbType::Si;
                let cbp = read_coded_block_pattern(reader, self.chroma_array_type, intra_column)?;
                mb.set_coded_block_pattern(cbp);

                if mb.cbp_luma > 0
                    && self.pps.transform_8x8_mode_flag
                    && mb_type != MbType::INxN
                    && no_sub_mb_part_size_less_than_8x8
                    && (mb_type != MbType::BDirect16x16 || self.sps.direct_8x8_inference_flag)
                {
                    mb.transform_size_8x8_flag = reader.read_flag()?;
                }
            }

            if mb.cbp_luma > 0
                || mb.cbp_chroma > 0
                || mb.mb_part_pred_mode(0) == Some(PredMode::Intra16x16)
            {
                mb.mb_qp_delta = Some(read_se(reader)?);
                self.residual(reader, &mut mb, 0, 15)?;
            }
        }

        mb.end_pos = reader.bit_position().saturating_sub(1);
        self.macroblocks.insert(curr_mb_addr, mb);
        Ok(())
    }

    /// Clause 7.3.5.1 mb_pred.
    fn mb_pred(&self, reader: &mut BitReader, mb: &mut Macroblock) -> Result<()> {
        let mode0 = mb.mb_part_pred_mode(0);
        match mode0 {
            Some(PredMode::Intra4x4) | Some(PredMode::Intra8x8) | Some(PredMode::Intra16x16) => {
                if mode0 == Some(PredMode::Intra4x4) {
                    for blk in 0..16 {
                        let prev = reader.read_flag()?;
                        mb.prev_intra4x4_pred_mode_flag[blk] = prev;
                        if !prev {
                            mb.rem_intra4x4_pred_mode[blk] = reader.read_bits(3)? as u8;
                        }
                    }
                }
                if mode0 == Some(PredMode::Intra8x8) {
                    for blk in 0..4 {
                        let prev = reader.read_flag()?;
                        mb.prev_intra8x8_pred_mode_flag[blk] = prev;
                        if !prev {
                            mb.rem_intra8x8_pred_mode[blk] = reader.read_bits(3)? as u8;
                        }
                    }
                }
                if matches!(self.chroma_array_type, 1 | 2) {
                    mb.intra_chroma_pred_mode = Some(read_ue(reader)?);
                }
            }
            Some(PredMode::Direct) => {}
            _ => {
                let num_parts = mb.mb_type.num_mb_part().unwrap_or(1) as usize;
                let num_l0 = self.header.num_ref_idx_l0_active_minus1;
                let num_l1 = self.header.num_ref_idx_l1_active_minus1;
                let mismatch = self.field_coding_mismatch();

                for i in 0..num_parts {
                    if (num_l0 > 0 || mismatch) && mb.mb_part_pred_mode(i) != Some(PredMode::PredL1)
                    {
                        mb.ref_idx_l0[i] = read_te(reader, num_l0)?;
                    }
                }
                for i in 0..num_parts {
                    if (num_l1 > 0 || mismatch) && mb.mb_part_pred_mode(i) != Some(PredMode::PredL0)
                    {
                        mb.ref_idx_l1[i] = read_te(reader, num_l1)?;
                    }
                }
                for i in 0..num_parts {
                    if mb.mb_part_pred_mode(i) != Some(PredMode::PredL1) {
                        for comp in 0..2 {
                            mb.mvd_l0[i][0][comp] = read_se(reader)?;
                        }
                    }
                }
                for i in 0..num_parts {
                    if mb.mb_part_pred_mode(i) != Some(PredMode::PredL0) {
                        for comp in 0..2 {
                            mb.mvd_l1[i][0][comp] = read_se(reader)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Clause 7.3.5.2 sub_mb_pred.
    fn sub_mb_pred(&self, reader: &mut BitReader, mb: &mut Macroblock) -> Result<()> {
        let class = mb.mb_type.class();
        let mut sub_types = [SubMbType::PL08x8; 4];
        for sub in &mut sub_types {
            *sub = SubMbType::resolve(read_ue(reader)?, class)?;
        }
        mb.sub_mb_type = Some(sub_types);

        let num_l0 = self.header.num_ref_idx_l0_active_minus1;
        let num_l1 = self.header.num_ref_idx_l1_active_minus1;
        let mismatch = self.field_coding_mismatch();

        for i in 0..4 {
            if (num_l0 > 0 || mismatch)
                && mb.mb_type != MbType::P8x8Ref0
                && sub_types[i] != SubMbType::BDirect8x8
                && sub_types[i].sub_mb_pred_mode() != PredMode::PredL1
            {
                mb.ref_idx_l0[i] = read_te(reader, num_l0)?;
            }
        }
        for i in 0..4 {
            if (num_l1 > 0 || mismatch)
                && sub_types[i] != SubMbType::BDirect8x8
                && sub_types[i].sub_mb_pred_mode() != PredMode::PredL0
            {
                mb.ref_idx_l1[i] = read_te(reader, num_l1)?;
            }
        }
        for i in 0..4 {
            if sub_types[i] != SubMbType::BDirect8x8
                && sub_types[i].sub_mb_pred_mode() != PredMode::PredL1
            {
                for j in 0..sub_types[i].num_sub_mb_part() as usize {
                    for comp in 0..2 {
                        mb.mvd_l0[i][j][comp] = read_se(reader)?;
                    }
                }
            }
        }
        for i in 0..4 {
            if sub_types[i] != SubMbType::BDirect8x8
                && sub_types[i].sub_mb_pred_mode() != PredMode::PredL0
            {
                for j in 0..sub_types[i].num_sub_mb_part() as usize {
                    for comp in 0..2 {
                        mb.mvd_l1[i][j][comp] = read_se(reader)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Clause 7.3.5.3 residual.
    fn residual(
        &self,
        reader: &mut BitReader,
        mb: &mut Macroblock,
        start_idx: usize,
        end_idx: usize,
    ) -> Result<()> {
        self.residual_luma(reader, mb, start_idx, end_idx, LumaPlane::Y)?;

        match self.chroma_array_type {
            1 | 2 => {
                let num_c8x8 = (4 / (self.sub_width_c * self.sub_height_c)) as usize;
                let dc_coeffs = 4 * num_c8x8;
                for icbcr in 0..2 {
                    if mb.cbp_chroma & 3 != 0 && start_idx == 0 {
                        let levels = self.residual_block_cavlc(
                            reader,
                            mb,
                            0,
                            dc_coeffs - 1,
                            dc_coeffs,
                            Invoker::ChromaDcLevel,
                            0,
                        )?;
                        mb.chroma_dc_level[icbcr][..dc_coeffs]
                            .copy_from_slice(&levels[..dc_coeffs]);
                    } else {
                        for level in &mut mb.chroma_dc_level[icbcr][..dc_coeffs] {
                            *level = 0;
                        }
                    }
                }
                for icbcr in 0..2 {
                    for i8x8 in 0..num_c8x8 {
                        for i4x4 in 0..4 {
                            let blk = i8x8 * 4 + i4x4;
                            if mb.cbp_chroma & 2 != 0 {
                                let levels = self.residual_block_cavlc(
                                    reader,
                                    mb,
                                    start_idx.saturating_sub(1),
                                    end_idx - 1,
                                    15,
                                    Invoker::ChromaAcLevel,
                                    blk,
                                )?;
                                mb.chroma_ac_level[icbcr][blk].copy_from_slice(&levels[..15]);
                            } else {
                                mb.chroma_ac_level[icbcr][blk] = [0; 15];
                            }
                        }
                    }
                }
            }
            3 => {
                self.residual_luma(reader, mb, start_idx, end_idx, LumaPlane::Cb)?;
                self.residual_luma(reader, mb, start_idx, end_idx, LumaPlane::Cr)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Clause 7.3.5.3.1 residual_luma. CAVLC always scans 4x4 blocks; with
    /// the 8x8 transform the levels are transposed into the 8x8 array.
    fn residual_luma(
        &self,
        reader: &mut BitReader,
        mb: &mut Macroblock,
        start_idx: usize,
        end_idx: usize,
        plane: LumaPlane,
    ) -> Result<()> {
        let is_intra16 = mb.mb_part_pred_mode(0) == Some(PredMode::Intra16x16);

        if start_idx == 0 && is_intra16 {
            let levels =
                self.residual_block_cavlc(reader, mb, 0, 15, 16, plane.dc_invoker(), 0)?;
            mb.intra16x16_dc_level = levels;
        }

        for i8x8 in 0..4 {
            for i4x4 in 0..4 {
                let blk = i8x8 * 4 + i4x4;
                if mb.cbp_luma & (1 << i8x8) != 0 {
                    if is_intra16 {
                        let levels = self.residual_block_cavlc(
                            reader,
                            mb,
                            start_idx.saturating_sub(1),
                            end_idx - 1,
                            15,
                            plane.ac_invoker(),
                            blk,
                        )?;
                        mb.intra16x16_ac_level[blk].copy_from_slice(&levels[..15]);
                    } else {
                        let levels = self.residual_block_cavlc(
                            reader,
                            mb,
                            start_idx,
                            end_idx,
                            16,
                            plane.l4_invoker(),
                            blk,
                        )?;
                        mb.luma_level_4x4[blk] = levels;
                    }
                } else if is_intra16 {
                    mb.intra16x16_ac_level[blk] = [0; 15];
                } else {
                    mb.luma_level_4x4[blk] = [0; 16];
                }
                if mb.transform_size_8x8_flag {
                    for i in 0..16 {
                        mb.luma_level_8x8[i8x8][4 * i + i4x4] = mb.luma_level_4x4[blk][i];
                    }
                }
            }
        }
        Ok(())
    }

    /// Clause 9.2 residual_block_cavlc. Returns the dense coefficient array;
    /// `mb.total_coeff[blk_idx]` is updated for later neighbour lookups.
    fn residual_block_cavlc(
        &self,
        reader: &mut BitReader,
        mb: &mut Macroblock,
        start_idx: usize,
        end_idx: usize,
        max_num_coeff: usize,
        invoker: Invoker,
        blk_idx: usize,
    ) -> Result<[i32; 16]> {
        let mut coeff_level = [0i32; 16];

        let nc = self.derive_nc(mb, invoker, blk_idx)?;
        let (total_coeff, trailing_ones) = cavlc::coeff_token(reader, nc)?;
        trace!(
            "coeff_token: nC={} total_coeff={} trailing_ones={} blk={}",
            nc,
            total_coeff,
            trailing_ones,
            blk_idx
        );
        mb.total_coeff[blk_idx] = total_coeff;

        if total_coeff == 0 {
            return Ok(coeff_level);
        }
        let total_coeff = total_coeff as usize;
        let trailing_ones = trailing_ones as usize;

        // 9.2.2: level information.
        let mut level_val = [0i32; 16];
        let mut suffix_length: u32 = if total_coeff > 10 && trailing_ones < 3 {
            1
        } else {
            0
        };
        for i in 0..total_coeff {
            if i < trailing_ones {
                let trailing_ones_sign_flag = reader.read_bit()?;
                level_val[i] = 1 - 2 * trailing_ones_sign_flag as i32;
            } else {
                let level_prefix = cavlc::level_prefix(reader)?;
                if level_prefix > 32 {
                    return Err(Error::InvalidValue("level_prefix"));
                }
                let level_suffix_size = if level_prefix == 14 && suffix_length == 0 {
                    4
                } else if level_prefix >= 15 {
                    level_prefix - 3
                } else {
                    suffix_length
                };

                let mut level_code = (level_prefix.min(15) as i64) << suffix_length;
                if suffix_length > 0 || level_prefix >= 14 {
                    level_code += reader.read_bits64(level_suffix_size)? as i64;
                }
                if level_prefix >= 15 && suffix_length == 0 {
                    level_code += 15;
                }
                if level_prefix >= 16 {
                    level_code += (1i64 << (level_prefix - 3)) - 4096;
                }
                if i == trailing_ones && trailing_ones < 3 {
                    level_code += 2;
                }
                level_val[i] = if level_code % 2 == 0 {
                    ((level_code + 2) >> 1) as i32
                } else {
                    ((-level_code - 1) >> 1) as i32
                };

                if suffix_length == 0 {
                    suffix_length = 1;
                }
                while level_val[i].unsigned_abs() > (3 << (suffix_length - 1))
                    && suffix_length < 6
                {
                    suffix_length += 1;
                }
            }
        }

        // 9.2.3: run information.
        let mut run_val = [0u32; 16];
        let mut zeros_left = if total_coeff < end_idx - start_idx + 1 {
            cavlc::total_zeros(reader, max_num_coeff as u32, total_coeff as u32)?
        } else {
            0
        };
        for run in run_val.iter_mut().take(total_coeff - 1) {
            if zeros_left > 0 {
                let run_before = cavlc::run_before(reader, zeros_left)?;
                if run_before > zeros_left {
                    return Err(Error::InvalidValue("run_before"));
                }
                *run = run_before;
                zeros_left -= run_before;
            }
        }
        run_val[total_coeff - 1] = zeros_left;

        // 9.2.4: combine levels and runs.
        let mut coeff_num: i64 = -1;
        for i in (0..total_coeff).rev() {
            coeff_num += run_val[i] as i64 + 1;
            let idx = start_idx as i64 + coeff_num;
            if idx as usize >= coeff_level.len() {
                return Err(Error::InvalidValue("coefficient index"));
            }
            coeff_level[idx as usize] = level_val[i];
        }
        Ok(coeff_level)
    }

    /// Clause 9.2.1.1: nC from the neighbouring blocks' coefficient counts.
    fn derive_nc(&self, mb: &Macroblock, invoker: Invoker, blk_idx: usize) -> Result<i32> {
        if invoker == Invoker::ChromaDcLevel {
            return match self.chroma_array_type {
                1 => Ok(-1),
                2 => Ok(-2),
                _ => Err(Error::InvalidValue("chroma_array_type")),
            };
        }

        let blk_idx = match invoker {
            Invoker::Intra16x16DcLevel
            | Invoker::CbIntra16x16DcLevel
            | Invoker::CrIntra16x16DcLevel => 0,
            _ => blk_idx,
        };

        let (a, b) = match invoker {
            Invoker::Intra16x16DcLevel | Invoker::Intra16x16AcLevel | Invoker::LumaLevel4x4 => {
                self.neighbouring_4x4_luma(mb.addr, blk_idx)?
            }
            Invoker::ChromaAcLevel => self.neighbouring_4x4_chroma(mb.addr, blk_idx)?,
            _ => {
                // 6.4.11.6 (ChromaArrayType 3) is outside the supported set.
                return Err(Error::Unsupported("ChromaArrayType 3 neighbour derivation"));
            }
        };

        let n_a = a.map(|(addr, blk)| self.neighbour_total_coeff(mb, addr, blk));
        let n_b = b.map(|(addr, blk)| self.neighbour_total_coeff(mb, addr, blk));

        Ok(match (n_a, n_b) {
            (Some(na), Some(nb)) => ((na + nb + 1) >> 1) as i32,
            (Some(na), None) => na as i32,
            (None, Some(nb)) => nb as i32,
            (None, None) => 0,
        })
    }

    /// nN of clause 9.2.1.1 step 6 for one neighbour record.
    fn neighbour_total_coeff(&self, current: &Macroblock, addr: u32, blk: usize) -> u32 {
        let record = if addr == current.addr {
            Some(current)
        } else {
            self.macroblocks.get(&addr)
        };
        match record {
            // No record at this address means the macroblock was skipped.
            None => 0,
            Some(m) => {
                if m.mb_type == MbType::IPcm {
                    16
                } else if m.is_ac_residual_empty() {
                    0
                } else {
                    m.total_coeff[blk]
                }
            }
        }
    }

    /// 6.4.11.4: neighbouring 4x4 luma blocks A (left) and B (above).
    fn neighbouring_4x4_luma(
        &self,
        curr_addr: u32,
        blk_idx: usize,
    ) -> Result<(Option<(u32, usize)>, Option<(u32, usize)>)> {
        let (x, y) = inverse_4x4_luma_scan(blk_idx);
        let a = self
            .neighbour_location(curr_addr, x - 1, y, true)?
            .map(|(addr, (xw, yw))| (addr, luma_4x4_blk_idx(xw, yw)));
        let b = self
            .neighbour_location(curr_addr, x, y - 1, true)?
            .map(|(addr, (xw, yw))| (addr, luma_4x4_blk_idx(xw, yw)));
        Ok((a, b))
    }

    /// 6.4.11.5: neighbouring 4x4 chroma blocks (ChromaArrayType 1 and 2).
    fn neighbouring_4x4_chroma(
        &self,
        curr_addr: u32,
        blk_idx: usize,
    ) -> Result<(Option<(u32, usize)>, Option<(u32, usize)>)> {
        let (x, y) = inverse_4x4_chroma_scan(blk_idx);
        let a = self
            .neighbour_location(curr_addr, x - 1, y, false)?
            .map(|(addr, (xw, yw))| (addr, chroma_4x4_blk_idx(xw, yw)));
        let b = self
            .neighbour_location(curr_addr, x, y - 1, false)?
            .map(|(addr, (xw, yw))| (addr, chroma_4x4_blk_idx(xw, yw)));
        Ok((a, b))
    }

    /// 6.4.12: resolve a (possibly out-of-macroblock) sample location to a
    /// neighbouring macroblock address and in-macroblock coordinates.
    fn neighbour_location(
        &self,
        curr_addr: u32,
        xn: i32,
        yn: i32,
        is_luma: bool,
    ) -> Result<Option<(u32, (u32, u32))>> {
        if self.mbaff_frame_flag {
            return Err(Error::Unsupported("MBAFF neighbour derivation"));
        }

        let (max_w, max_h) = if is_luma {
            (16i32, 16i32)
        } else {
            (self.mb_width_c as i32, self.mb_height_c as i32)
        };

        if yn >= max_h {
            return Ok(None);
        }
        if (0..max_w).contains(&xn) && (0..max_h).contains(&yn) {
            return Ok(Some((curr_addr, (xn as u32, yn as u32))));
        }

        let kind = if xn < 0 && yn < 0 {
            NeighbourKind::D
        } else if xn < 0 {
            NeighbourKind::A
        } else if yn < 0 && xn < max_w {
            NeighbourKind::B
        } else if yn < 0 {
            NeighbourKind::C
        } else {
            // xn >= max_w with yn inside the row
            return Ok(None);
        };

        let (addr, available) = self.neighbour_addr(curr_addr, kind);
        if !available {
            return Ok(None);
        }
        let xw = ((xn + max_w) % max_w) as u32;
        let yw = ((yn + max_h) % max_h) as u32;
        Ok(Some((addr as u32, (xw, yw))))
    }

    /// 6.4.9: neighbouring macroblock addresses and availability.
    fn neighbour_addr(&self, curr_addr: u32, kind: NeighbourKind) -> (i64, bool) {
        let curr = curr_addr as i64;
        let w = self.pic_width_in_mbs as i64;
        let in_range = |a: i64| a >= 0 && a <= curr;
        match kind {
            NeighbourKind::A => {
                let addr = curr - 1;
                (addr, curr % w != 0 && in_range(addr))
            }
            NeighbourKind::B => {
                let addr = curr - w;
                (addr, in_range(addr))
            }
            NeighbourKind::C => {
                let addr = curr - w + 1;
                (addr, (curr + 1) % w != 0 && in_range(addr))
            }
            NeighbourKind::D => {
                let addr = curr - w - 1;
                (addr, curr % w != 0 && in_range(addr))
            }
        }
    }
}

/// 6.4.3: inverse 4x4 luma block scanning process.
fn inverse_4x4_luma_scan(blk_idx: usize) -> (i32, i32) {
    let blk = blk_idx as u32;
    let x = inverse_raster_scan(blk / 4, 8, 8, 16, 0) + inverse_raster_scan(blk % 4, 4, 4, 8, 0);
    let y = inverse_raster_scan(blk / 4, 8, 8, 16, 1) + inverse_raster_scan(blk % 4, 4, 4, 8, 1);
    (x as i32, y as i32)
}

/// 6.4.7: inverse 4x4 chroma block scanning process.
fn inverse_4x4_chroma_scan(blk_idx: usize) -> (i32, i32) {
    let blk = blk_idx as u32;
    let x = inverse_raster_scan(blk, 4, 4, 8, 0);
    let y = inverse_raster_scan(blk, 4, 4, 8, 1);
    (x as i32, y as i32)
}

/// 6.4.13.1: 4x4 luma block index from in-macroblock coordinates.
fn luma_4x4_blk_idx(x: u32, y: u32) -> usize {
    (8 * (y / 8) + 4 * (x / 8) + 2 * ((y % 8) / 4) + (x % 8) / 4) as usize
}

/// 6.4.13.2: 4x4 chroma block index from in-macroblock coordinates.
fn chroma_4x4_blk_idx(x: u32, y: u32) -> usize {
    (2 * (y / 4) + x / 4) as usize
}
