use crate::bitreader::BitReader;
use crate::eg::read_ue;
use crate::slice::SliceType;
use crate::{Error, Result};

/// Coarse macroblock class after mb_type normalisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbClass {
    I,
    Si,
    P,
    B,
}

/// Macroblock partition prediction modes (clause 7.4.5 tables).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredMode {
    Intra4x4,
    Intra8x8,
    Intra16x16,
    PredL0,
    PredL1,
    BiPred,
    Direct,
}

/// Resolved mb_type over the unified code space of Tables 7-11..7-14.
///
/// `I16x16` carries the coded I-offset 1..=24; prediction mode and coded
/// block pattern fall out of it arithmetically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbType {
    INxN,
    I16x16(u8),
    IPcm,
    Si,
    PL016x16,
    PL0L016x8,
    PL0L08x16,
    P8x8,
    P8x8Ref0,
    PSkip,
    BDirect16x16,
    BL016x16,
    BL116x16,
    BBi16x16,
    BL0L016x8,
    BL0L08x16,
    BL1L116x8,
    BL1L18x16,
    BL0L116x8,
    BL0L18x16,
    BL1L016x8,
    BL1L08x16,
    BL0Bi16x8,
    BL0Bi8x16,
    BL1Bi16x8,
    BL1Bi8x16,
    BBiL016x8,
    BBiL08x16,
    BBiL116x8,
    BBiL18x16,
    BBiBi16x8,
    BBiBi8x16,
    B8x8,
    BSkip,
}

// Number of non-intra codes before the intra tail in P/SP and B slices.
const P_SP_LEN: u32 = 5;
const B_LEN: u32 = 23;
const SI_LEN: u32 = 1;

impl MbType {
    fn resolve_i(coded: u32) -> Result<Self> {
        match coded {
            0 => Ok(MbType::INxN),
            1..=24 => Ok(MbType::I16x16(coded as u8)),
            25 => Ok(MbType::IPcm),
            _ => Err(Error::InvalidValue("mb_type")),
        }
    }

    /// Normalises a coded mb_type for the given slice type: the I table tail
    /// follows the slice-specific codes.
    pub fn resolve(coded: u32, slice_type: SliceType) -> Result<Self> {
        match slice_type {
            SliceType::I => Self::resolve_i(coded),
            SliceType::Si => {
                if coded < SI_LEN {
                    Ok(MbType::Si)
                } else {
                    Self::resolve_i(coded - SI_LEN)
                }
            }
            SliceType::P | SliceType::Sp => match coded {
                0 => Ok(MbType::PL016x16),
                1 => Ok(MbType::PL0L016x8),
                2 => Ok(MbType::PL0L08x16),
                3 => Ok(MbType::P8x8),
                4 => Ok(MbType::P8x8Ref0),
                _ => Self::resolve_i(coded - P_SP_LEN),
            },
            SliceType::B => match coded {
                0 => Ok(MbType::BDirect16x16),
                1 => Ok(MbType::BL016x16),
                2 => Ok(MbType::BL116x16),
                3 => Ok(MbType::BBi16x16),
                4 => Ok(MbType::BL0L016x8),
                5 => Ok(MbType::BL0L08x16),
                6 => Ok(MbType::BL1L116x8),
                7 => Ok(MbType::BL1L18x16),
                8 => Ok(MbType::BL0L116x8),
                9 => Ok(MbType::BL0L18x16),
                10 => Ok(MbType::BL1L016x8),
                11 => Ok(MbType::BL1L08x16),
                12 => Ok(MbType::BL0Bi16x8),
                13 => Ok(MbType::BL0Bi8x16),
                14 => Ok(MbType::BL1Bi16x8),
                15 => Ok(MbType::BL1Bi8x16),
                16 => Ok(MbType::BBiL016x8),
                17 => Ok(MbType::BBiL08x16),
                18 => Ok(MbType::BBiL116x8),
                19 => Ok(MbType::BBiL18x16),
                20 => Ok(MbType::BBiBi16x8),
                21 => Ok(MbType::BBiBi8x16),
                22 => Ok(MbType::B8x8),
                _ => Self::resolve_i(coded - B_LEN),
            },
        }
    }

    pub fn class(&self) -> MbClass {
        match self {
            MbType::INxN | MbType::I16x16(_) | MbType::IPcm => MbClass::I,
            MbType::Si => MbClass::Si,
            MbType::PL016x16
            | MbType::PL0L016x8
            | MbType::PL0L08x16
            | MbType::P8x8
            | MbType::P8x8Ref0
            | MbType::PSkip => MbClass::P,
            _ => MbClass::B,
        }
    }

    pub fn is_intra(&self) -> bool {
        matches!(self.class(), MbClass::I | MbClass::Si)
    }

    /// MbPartPredMode(mb_type, idx). For I_NxN the mode depends on
    /// transform_size_8x8_flag.
    pub fn mb_part_pred_mode(&self, idx: usize, transform_size_8x8: bool) -> Option<PredMode> {
        if idx == 0 {
            match self {
                MbType::INxN => Some(if transform_size_8x8 {
                    PredMode::Intra8x8
                } else {
                    PredMode::Intra4x4
                }),
                MbType::I16x16(_) => Some(PredMode::Intra16x16),
                MbType::IPcm => None,
                MbType::Si => Some(PredMode::Intra4x4),
                MbType::PL016x16 | MbType::PL0L016x8 | MbType::PL0L08x16 | MbType::PSkip => {
                    Some(PredMode::PredL0)
                }
                MbType::P8x8 | MbType::P8x8Ref0 => None,
                MbType::BDirect16x16 | MbType::BSkip => Some(PredMode::Direct),
                MbType::BL016x16 => Some(PredMode::PredL0),
                MbType::BL116x16 => Some(PredMode::PredL1),
                MbType::BBi16x16 => Some(PredMode::BiPred),
                MbType::BL0L016x8 | MbType::BL0L08x16 | MbType::BL0L116x8 | MbType::BL0L18x16 => {
                    Some(PredMode::PredL0)
                }
                MbType::BL1L116x8 | MbType::BL1L18x16 | MbType::BL1L016x8 | MbType::BL1L08x16 => {
                    Some(PredMode::PredL1)
                }
                MbType::BL0Bi16x8 | MbType::BL0Bi8x16 => Some(PredMode::PredL0),
                MbType::BL1Bi16x8 | MbType::BL1Bi8x16 => Some(PredMode::PredL1),
                MbType::BBiL016x8
                | MbType::BBiL08x16
                | MbType::BBiL116x8
                | MbType::BBiL18x16
                | MbType::BBiBi16x8
                | MbType::BBiBi8x16 => Some(PredMode::BiPred),
                MbType::B8x8 => None,
            }
        } else {
            match self {
                MbType::PL0L016x8 | MbType::PL0L08x16 => Some(PredMode::PredL0),
                MbType::BL0L016x8 | MbType::BL0L08x16 => Some(PredMode::PredL0),
                MbType::BL1L116x8 | MbType::BL1L18x16 => Some(PredMode::PredL1),
                MbType::BL0L116x8 | MbType::BL0L18x16 => Some(PredMode::PredL1),
                MbType::BL1L016x8 | MbType::BL1L08x16 => Some(PredMode::PredL0),
                MbType::BL0Bi16x8 | MbType::BL0Bi8x16 => Some(PredMode::BiPred),
                MbType::BL1Bi16x8 | MbType::BL1Bi8x16 => Some(PredMode::BiPred),
                MbType::BBiL016x8 | MbType::BBiL08x16 => Some(PredMode::PredL0),
                MbType::BBiL116x8 | MbType::BBiL18x16 => Some(PredMode::PredL1),
                MbType::BBiBi16x8 | MbType::BBiBi8x16 => Some(PredMode::BiPred),
                _ => None,
            }
        }
    }

    /// NumMbPart(mb_type); None for direct/skip B types where the count is
    /// inferred.
    pub fn num_mb_part(&self) -> Option<u32> {
        match self {
            MbType::PL016x16 | MbType::PSkip => Some(1),
            MbType::PL0L016x8 | MbType::PL0L08x16 => Some(2),
            MbType::P8x8 | MbType::P8x8Ref0 => Some(4),
            MbType::BDirect16x16 | MbType::BSkip => None,
            MbType::BL016x16 | MbType::BL116x16 | MbType::BBi16x16 => Some(1),
            MbType::B8x8 => Some(4),
            t if t.class() == MbClass::B => Some(2),
            _ => None,
        }
    }

    /// (MbPartWidth, MbPartHeight) for inter types.
    pub fn mb_part_size(&self) -> Option<(u32, u32)> {
        match self {
            MbType::PL016x16 | MbType::PSkip => Some((16, 16)),
            MbType::PL0L016x8 => Some((16, 8)),
            MbType::PL0L08x16 => Some((8, 16)),
            MbType::P8x8 | MbType::P8x8Ref0 => Some((8, 8)),
            MbType::BDirect16x16 | MbType::BSkip | MbType::B8x8 => Some((8, 8)),
            MbType::BL016x16 | MbType::BL116x16 | MbType::BBi16x16 => Some((16, 16)),
            MbType::BL0L016x8
            | MbType::BL1L116x8
            | MbType::BL0L116x8
            | MbType::BL1L016x8
            | MbType::BL0Bi16x8
            | MbType::BL1Bi16x8
            | MbType::BBiL016x8
            | MbType::BBiL116x8
            | MbType::BBiBi16x8 => Some((16, 8)),
            t if t.class() == MbClass::B => Some((8, 16)),
            _ => None,
        }
    }

    /// Intra16x16PredMode for the I_16x16 rows of Table 7-11.
    pub fn intra16x16_pred_mode(&self) -> Option<u8> {
        match self {
            MbType::I16x16(n) => Some((n - 1) % 4),
            _ => None,
        }
    }

    /// (CodedBlockPatternLuma, CodedBlockPatternChroma) carried by the
    /// I_16x16 rows directly.
    pub fn intra16x16_coded_block_pattern(&self) -> Option<(u8, u8)> {
        match self {
            MbType::I16x16(n) => {
                let luma = if *n >= 13 { 15 } else { 0 };
                let chroma = ((n - 1) / 4) % 3;
                Some((luma, chroma))
            }
            _ => None,
        }
    }
}

/// Resolved sub_mb_type (Tables 7-17 and 7-18).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubMbType {
    PL08x8,
    PL08x4,
    PL04x8,
    PL04x4,
    BDirect8x8,
    BL08x8,
    BL18x8,
    BBi8x8,
    BL08x4,
    BL04x8,
    BL18x4,
    BL14x8,
    BL04x4,
    BL14x4,
    BBi8x4,
    BBi4x8,
    BBi4x4,
}

impl SubMbType {
    pub fn resolve(coded: u32, class: MbClass) -> Result<Self> {
        match class {
            MbClass::P => match coded {
                0 => Ok(SubMbType::PL08x8),
                1 => Ok(SubMbType::PL08x4),
                2 => Ok(SubMbType::PL04x8),
                3 => Ok(SubMbType::PL04x4),
                _ => Err(Error::InvalidValue("sub_mb_type")),
            },
            MbClass::B => match coded {
                0 => Ok(SubMbType::BDirect8x8),
                1 => Ok(SubMbType::BL08x8),
                2 => Ok(SubMbType::BL18x8),
                3 => Ok(SubMbType::BBi8x8),
                4 => Ok(SubMbType::BL08x4),
                5 => Ok(SubMbType::BL04x8),
                6 => Ok(SubMbType::BL18x4),
                7 => Ok(SubMbType::BL14x8),
                8 => Ok(SubMbType::BL04x4),
                9 => Ok(SubMbType::BL14x4),
                10 => Ok(SubMbType::BBi8x4),
                11 => Ok(SubMbType::BBi4x8),
                12 => Ok(SubMbType::BBi4x4),
                _ => Err(Error::InvalidValue("sub_mb_type")),
            },
            _ => Err(Error::InvalidValue("sub_mb_type")),
        }
    }

    pub fn num_sub_mb_part(&self) -> u32 {
        match self {
            SubMbType::PL08x8 | SubMbType::BL08x8 | SubMbType::BL18x8 | SubMbType::BBi8x8 => 1,
            SubMbType::PL08x4
            | SubMbType::PL04x8
            | SubMbType::BL08x4
            | SubMbType::BL04x8
            | SubMbType::BL18x4
            | SubMbType::BL14x8
            | SubMbType::BBi8x4
            | SubMbType::BBi4x8 => 2,
            SubMbType::PL04x4
            | SubMbType::BDirect8x8
            | SubMbType::BL04x4
            | SubMbType::BL14x4
            | SubMbType::BBi4x4 => 4,
        }
    }

    pub fn sub_mb_pred_mode(&self) -> PredMode {
        match self {
            SubMbType::BDirect8x8 => PredMode::Direct,
            SubMbType::PL08x8
            | SubMbType::PL08x4
            | SubMbType::PL04x8
            | SubMbType::PL04x4
            | SubMbType::BL08x8
            | SubMbType::BL08x4
            | SubMbType::BL04x8
            | SubMbType::BL04x4 => PredMode::PredL0,
            SubMbType::BL18x8
            | SubMbType::BL18x4
            | SubMbType::BL14x8
            | SubMbType::BL14x4 => PredMode::PredL1,
            SubMbType::BBi8x8 | SubMbType::BBi8x4 | SubMbType::BBi4x8 | SubMbType::BBi4x4 => {
                PredMode::BiPred
            }
        }
    }

    pub fn sub_mb_part_size(&self) -> (u32, u32) {
        match self {
            SubMbType::PL08x8 | SubMbType::BL08x8 | SubMbType::BL18x8 | SubMbType::BBi8x8 => (8, 8),
            SubMbType::BDirect8x8 => (4, 4),
            SubMbType::PL08x4 | SubMbType::BL08x4 | SubMbType::BL18x4 | SubMbType::BBi8x4 => (8, 4),
            SubMbType::PL04x8 | SubMbType::BL04x8 | SubMbType::BL14x8 | SubMbType::BBi4x8 => (4, 8),
            SubMbType::PL04x4 | SubMbType::BL04x4 | SubMbType::BL14x4 | SubMbType::BBi4x4 => (4, 4),
        }
    }
}

// coded_block_pattern me(v) mapping, Table 9-4(a): ChromaArrayType 1 or 2,
// indexed by codeNum; columns (Intra_4x4/Intra_8x8, Inter).
const CODE_NUM_MAP_TYPE_1_2: [(u8, u8); 48] = [
    (47, 0),
    (31, 16),
    (15, 1),
    (0, 2),
    (23, 4),
    (27, 8),
    (29, 32),
    (30, 3),
    (7, 5),
    (11, 10),
    (13, 12),
    (14, 15),
    (39, 47),
    (43, 7),
    (45, 11),
    (46, 13),
    (16, 14),
    (3, 6),
    (5, 9),
    (10, 31),
    (12, 35),
    (19, 37),
    (21, 42),
    (26, 44),
    (28, 33),
    (35, 34),
    (37, 36),
    (42, 40),
    (44, 39),
    (1, 43),
    (2, 45),
    (4, 46),
    (8, 17),
    (17, 18),
    (18, 20),
    (20, 24),
    (24, 19),
    (6, 21),
    (9, 26),
    (22, 28),
    (25, 23),
    (32, 27),
    (33, 29),
    (34, 30),
    (36, 22),
    (40, 25),
    (38, 38),
    (41, 41),
];

// Table 9-4(b): ChromaArrayType 0 or 3.
const CODE_NUM_MAP_TYPE_0_3: [(u8, u8); 16] = [
    (15, 0),
    (0, 1),
    (7, 2),
    (11, 4),
    (13, 8),
    (14, 3),
    (3, 5),
    (5, 10),
    (10, 12),
    (12, 15),
    (1, 7),
    (2, 11),
    (4, 13),
    (8, 14),
    (6, 6),
    (9, 9),
];

/// me(v): mapped Exp-Golomb for coded_block_pattern.
pub fn read_coded_block_pattern(
    reader: &mut BitReader,
    chroma_array_type: u8,
    is_intra_nxn: bool,
) -> Result<u32> {
    let code_num = read_ue(reader)? as usize;
    let table: &[(u8, u8)] = match chroma_array_type {
        1 | 2 => &CODE_NUM_MAP_TYPE_1_2,
        0 | 3 => &CODE_NUM_MAP_TYPE_0_3,
        _ => return Err(Error::InvalidValue("chroma_array_type")),
    };
    let entry = table
        .get(code_num)
        .ok_or(Error::InvalidValue("coded_block_pattern"))?;
    Ok(if is_intra_nxn { entry.0 } else { entry.1 } as u32)
}

/// InverseRasterScan(a, b, c, d, e) of clause 5.7.
pub fn inverse_raster_scan(a: u32, b: u32, c: u32, d: u32, e: u32) -> u32 {
    if e == 0 {
        (a % (d / b)) * b
    } else {
        (a / (d / b)) * c
    }
}

/// Everything parsed for one macroblock, keyed by CurrMbAddr in the slice.
#[derive(Debug, Clone)]
pub struct Macroblock {
    pub addr: u32,
    /// mb_type as coded in the bitstream.
    pub coded_mb_type: u32,
    pub mb_type: MbType,
    pub slice_type: SliceType,
    /// Bit range of the macroblock payload in the slice RBSP, starting after
    /// mb_type.
    pub start_pos: usize,
    pub end_pos: usize,

    pub transform_size_8x8_flag: bool,
    pub coded_block_pattern: Option<u32>,
    pub cbp_luma: u8,
    pub cbp_chroma: u8,
    pub mb_qp_delta: Option<i32>,

    pub intra_chroma_pred_mode: Option<u32>,
    pub prev_intra4x4_pred_mode_flag: [bool; 16],
    pub rem_intra4x4_pred_mode: [u8; 16],
    pub prev_intra8x8_pred_mode_flag: [bool; 4],
    pub rem_intra8x8_pred_mode: [u8; 4],

    pub sub_mb_type: Option<[SubMbType; 4]>,
    pub ref_idx_l0: [u32; 4],
    pub ref_idx_l1: [u32; 4],
    pub mvd_l0: [[[i32; 2]; 4]; 4],
    pub mvd_l1: [[[i32; 2]; 4]; 4],

    pub intra16x16_dc_level: [i32; 16],
    pub intra16x16_ac_level: [[i32; 15]; 16],
    pub luma_level_4x4: [[i32; 16]; 16],
    pub luma_level_8x8: [[i32; 64]; 4],
    pub chroma_dc_level: [[i32; 8]; 2],
    pub chroma_ac_level: [[[i32; 15]; 8]; 2],

    /// Per-4x4-block non-zero coefficient counts for neighbour nC lookups.
    pub total_coeff: [u32; 16],

    pub pcm_sample_luma: Option<Vec<u32>>,
    pub pcm_sample_chroma: Option<Vec<u32>>,
}

impl Macroblock {
    pub fn new(addr: u32, coded_mb_type: u32, mb_type: MbType, slice_type: SliceType) -> Self {
        Self {
            addr,
            coded_mb_type,
            mb_type,
            slice_type,
            start_pos: 0,
            end_pos: 0,
            transform_size_8x8_flag: false,
            coded_block_pattern: None,
            cbp_luma: 0,
            cbp_chroma: 0,
            mb_qp_delta: None,
            intra_chroma_pred_mode: None,
            prev_intra4x4_pred_mode_flag: [false; 16],
            rem_intra4x4_pred_mode: [0; 16],
            prev_intra8x8_pred_mode_flag: [false; 4],
            rem_intra8x8_pred_mode: [0; 4],
            sub_mb_type: None,
            ref_idx_l0: [0; 4],
            ref_idx_l1: [0; 4],
            mvd_l0: [[[0; 2]; 4]; 4],
            mvd_l1: [[[0; 2]; 4]; 4],
            intra16x16_dc_level: [0; 16],
            intra16x16_ac_level: [[0; 15]; 16],
            luma_level_4x4: [[0; 16]; 16],
            luma_level_8x8: [[0; 64]; 4],
            chroma_dc_level: [[0; 8]; 2],
            chroma_ac_level: [[[0; 15]; 8]; 2],
            total_coeff: [0; 16],
            pcm_sample_luma: None,
            pcm_sample_chroma: None,
        }
    }

    pub fn mb_part_pred_mode(&self, idx: usize) -> Option<PredMode> {
        self.mb_type
            .mb_part_pred_mode(idx, self.transform_size_8x8_flag)
    }

    /// Splits a decoded coded_block_pattern into its luma mask and chroma
    /// value (equation 7-35).
    pub fn set_coded_block_pattern(&mut self, cbp: u32) {
        self.coded_block_pattern = Some(cbp);
        self.cbp_luma = (cbp % 16) as u8;
        self.cbp_chroma = (cbp / 16) as u8;
    }

    /// True when every AC coefficient is zero; such neighbours contribute
    /// nN = 0 regardless of their recorded DC counts.
    pub fn is_ac_residual_empty(&self) -> bool {
        self.intra16x16_ac_level
            .iter()
            .all(|b| b.iter().all(|&c| c == 0))
            && self.luma_level_4x4.iter().all(|b| b.iter().all(|&c| c == 0))
            && self.luma_level_8x8.iter().all(|b| b.iter().all(|&c| c == 0))
            && self
                .chroma_ac_level
                .iter()
                .all(|p| p.iter().all(|b| b.iter().all(|&c| c == 0)))
    }
}
