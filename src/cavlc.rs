//! CAVLC entropy decoding (clause 9.2): coeff_token, level_prefix,
//! total_zeros and run_before.
//!
//! Tables are embedded as constants. The coeff_token tables for nC 0..8 are
//! indexed `[TrailingOnes][TotalCoeff]`, a zero length marking an absent
//! entry; the remaining tables store `(length, code)` pairs per symbol value.

use crate::bitreader::BitReader;
use crate::{Error, Result};

// Table 9-5, 0 <= nC < 2.
const COEFF_TOKEN_LEN_0_2: [[u8; 17]; 4] = [
    [1, 6, 8, 9, 10, 11, 13, 13, 13, 14, 14, 15, 15, 16, 16, 16, 16],
    [0, 2, 6, 8, 9, 10, 11, 13, 13, 14, 14, 15, 15, 15, 16, 16, 16],
    [0, 0, 3, 7, 8, 9, 10, 11, 13, 13, 14, 14, 15, 15, 16, 16, 16],
    [0, 0, 0, 5, 6, 7, 8, 9, 10, 11, 13, 14, 14, 15, 15, 16, 16],
];

const COEFF_TOKEN_CODE_0_2: [[u8; 17]; 4] = [
    [1, 5, 7, 7, 7, 7, 15, 11, 8, 15, 11, 15, 11, 15, 11, 7, 4],
    [0, 1, 4, 6, 6, 6, 6, 14, 10, 14, 10, 14, 10, 1, 14, 10, 6],
    [0, 0, 1, 5, 5, 5, 5, 5, 13, 9, 13, 9, 13, 9, 13, 9, 5],
    [0, 0, 0, 3, 3, 4, 4, 4, 4, 4, 12, 12, 8, 12, 8, 12, 8],
];

// Table 9-5, 2 <= nC < 4.
const COEFF_TOKEN_LEN_2_4: [[u8; 17]; 4] = [
    [2, 6, 6, 7, 8, 8, 9, 11, 11, 12, 12, 12, 13, 13, 13, 14, 14],
    [0, 2, 5, 6, 6, 7, 8, 9, 11, 11, 12, 12, 13, 13, 14, 14, 14],
    [0, 0, 3, 6, 6, 7, 8, 9, 11, 11, 12, 12, 13, 13, 13, 14, 14],
    [0, 0, 0, 4, 4, 5, 6, 6, 7, 9, 11, 11, 12, 13, 13, 13, 14],
];

const COEFF_TOKEN_CODE_2_4: [[u8; 17]; 4] = [
    [3, 11, 7, 7, 7, 4, 7, 15, 11, 15, 11, 8, 15, 11, 7, 9, 7],
    [0, 2, 7, 10, 6, 6, 6, 6, 14, 10, 14, 10, 14, 10, 11, 8, 6],
    [0, 0, 3, 9, 5, 5, 5, 5, 13, 9, 13, 9, 13, 9, 6, 10, 5],
    [0, 0, 0, 5, 4, 6, 8, 4, 4, 4, 12, 8, 12, 12, 8, 1, 4],
];

// Table 9-5, 4 <= nC < 8.
const COEFF_TOKEN_LEN_4_8: [[u8; 17]; 4] = [
    [4, 6, 6, 6, 7, 7, 7, 7, 8, 8, 9, 9, 9, 10, 10, 10, 10],
    [0, 4, 5, 5, 5, 5, 6, 6, 7, 8, 8, 9, 9, 9, 10, 10, 10],
    [0, 0, 4, 5, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 10],
    [0, 0, 0, 4, 4, 4, 4, 4, 5, 6, 7, 8, 8, 9, 10, 10, 10],
];

const COEFF_TOKEN_CODE_4_8: [[u8; 17]; 4] = [
    [15, 15, 11, 8, 15, 11, 9, 8, 15, 11, 15, 11, 8, 13, 9, 5, 1],
    [0, 14, 15, 12, 10, 8, 14, 10, 14, 14, 10, 14, 10, 7, 12, 8, 4],
    [0, 0, 13, 14, 11, 9, 13, 9, 13, 10, 13, 9, 13, 9, 11, 7, 3],
    [0, 0, 0, 12, 11, 10, 9, 8, 13, 12, 12, 12, 8, 12, 10, 6, 2],
];

// Table 9-5, nC == -1 (chroma DC, 4:2:0).
const COEFF_TOKEN_LEN_CHROMA_DC_420: [[u8; 5]; 4] = [
    [2, 6, 6, 6, 6],
    [0, 1, 6, 7, 8],
    [0, 0, 3, 7, 8],
    [0, 0, 0, 6, 7],
];

const COEFF_TOKEN_CODE_CHROMA_DC_420: [[u8; 5]; 4] = [
    [1, 7, 4, 3, 2],
    [0, 1, 6, 3, 3],
    [0, 0, 1, 2, 2],
    [0, 0, 0, 5, 0],
];

// Table 9-5, nC == -2 (chroma DC, 4:2:2).
const COEFF_TOKEN_LEN_CHROMA_DC_422: [[u8; 9]; 4] = [
    [1, 7, 7, 9, 9, 10, 11, 12, 13],
    [0, 2, 7, 7, 9, 10, 11, 12, 12],
    [0, 0, 3, 7, 7, 9, 10, 11, 12],
    [0, 0, 0, 5, 6, 7, 7, 10, 11],
];

const COEFF_TOKEN_CODE_CHROMA_DC_422: [[u8; 9]; 4] = [
    [1, 15, 14, 7, 6, 7, 7, 7, 7],
    [0, 1, 13, 12, 5, 6, 6, 6, 5],
    [0, 0, 1, 11, 10, 4, 5, 5, 4],
    [0, 0, 0, 1, 1, 9, 8, 4, 4],
];

// Tables 9-7 and 9-8: total_zeros for 4x4 blocks, rows tzVlcIndex 1..15,
// entries (length, code) per total_zeros value, (0, 0) when absent.
const TOTAL_ZEROS_4X4: [[(u8, u8); 16]; 15] = [
    [
        (1, 1), (3, 3), (3, 2), (4, 3), (4, 2), (5, 3), (5, 2), (6, 3),
        (6, 2), (7, 3), (7, 2), (8, 3), (8, 2), (9, 3), (9, 2), (9, 1),
    ],
    [
        (3, 7), (3, 6), (3, 5), (3, 4), (3, 3), (4, 5), (4, 4), (4, 3),
        (4, 2), (5, 3), (5, 2), (6, 3), (6, 2), (6, 1), (6, 0), (0, 0),
    ],
    [
        (4, 5), (3, 7), (3, 6), (3, 5), (4, 4), (4, 3), (3, 4), (3, 3),
        (4, 2), (5, 3), (5, 2), (6, 1), (5, 1), (6, 0), (0, 0), (0, 0),
    ],
    [
        (5, 3), (3, 7), (4, 5), (4, 4), (3, 6), (3, 5), (3, 4), (4, 3),
        (3, 3), (4, 2), (5, 2), (5, 1), (5, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (4, 5), (4, 4), (4, 3), (3, 7), (3, 6), (3, 5), (3, 4), (3, 3),
        (4, 2), (5, 1), (4, 1), (5, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (6, 1), (5, 1), (3, 7), (3, 6), (3, 5), (3, 4), (3, 3), (3, 2),
        (4, 1), (3, 1), (6, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (6, 1), (5, 1), (3, 5), (3, 4), (3, 3), (2, 3), (3, 2), (4, 1),
        (3, 1), (6, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (6, 1), (4, 1), (5, 1), (3, 3), (2, 3), (2, 2), (3, 2), (3, 1),
        (6, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (6, 1), (6, 0), (4, 1), (2, 3), (2, 2), (3, 1), (2, 1), (5, 1),
        (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (5, 1), (5, 0), (3, 1), (2, 3), (2, 2), (2, 1), (4, 1), (0, 0),
        (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (4, 0), (4, 1), (3, 1), (3, 2), (1, 1), (3, 3), (0, 0), (0, 0),
        (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (4, 0), (4, 1), (2, 1), (1, 1), (3, 1), (0, 0), (0, 0), (0, 0),
        (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (3, 0), (3, 1), (1, 1), (2, 1), (0, 0), (0, 0), (0, 0), (0, 0),
        (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (2, 0), (2, 1), (1, 1), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
        (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (1, 0), (1, 1), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
        (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
];

// Table 9-9(a): total_zeros for chroma DC 2x2 blocks, rows tzVlcIndex 1..3.
const TOTAL_ZEROS_CHROMA_DC: [[(u8, u8); 4]; 3] = [
    [(1, 1), (2, 1), (3, 1), (3, 0)],
    [(1, 1), (2, 1), (2, 0), (0, 0)],
    [(1, 1), (1, 0), (0, 0), (0, 0)],
];

// Table 9-10: run_before, rows zerosLeft 1..6 and >6.
const RUN_BEFORE: [[(u8, u8); 15]; 7] = [
    [
        (1, 1), (1, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
        (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (1, 1), (2, 1), (2, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
        (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (2, 3), (2, 2), (2, 1), (2, 0), (0, 0), (0, 0), (0, 0), (0, 0),
        (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (2, 3), (2, 2), (2, 1), (3, 1), (3, 0), (0, 0), (0, 0), (0, 0),
        (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (2, 3), (2, 2), (3, 3), (3, 2), (3, 1), (3, 0), (0, 0), (0, 0),
        (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (2, 3), (3, 0), (3, 1), (3, 3), (3, 2), (3, 5), (3, 4), (0, 0),
        (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    ],
    [
        (3, 7), (3, 6), (3, 5), (3, 4), (3, 3), (3, 2), (3, 1), (4, 1),
        (5, 1), (6, 1), (7, 1), (8, 1), (9, 1), (10, 1), (11, 1),
    ],
];

const COEFF_TOKEN_MAX_LEN: u8 = 16;

/// One bit at a time, first table hit wins; on miss past `max_len` the
/// cursor is restored and the code reported unknown.
fn scan_coeff_token(
    reader: &mut BitReader,
    lengths: &[[u8; 17]; 4],
    codes: &[[u8; 17]; 4],
) -> Result<(u32, u32)> {
    let saved = reader.bit_position();
    let mut curr_len = 0u8;
    let mut curr_val = 0u32;
    while curr_len < COEFF_TOKEN_MAX_LEN {
        curr_val = (curr_val << 1) | reader.read_bit()? as u32;
        curr_len += 1;
        for trailing_ones in 0..4 {
            for total_coeff in 0..17 {
                if lengths[trailing_ones][total_coeff] == curr_len
                    && codes[trailing_ones][total_coeff] as u32 == curr_val
                {
                    return Ok((total_coeff as u32, trailing_ones as u32));
                }
            }
        }
    }
    reader.seek(saved)?;
    Err(Error::CavlcUnknownCode)
}

fn scan_coeff_token_chroma<const N: usize>(
    reader: &mut BitReader,
    lengths: &[[u8; N]; 4],
    codes: &[[u8; N]; 4],
) -> Result<(u32, u32)> {
    let saved = reader.bit_position();
    let mut curr_len = 0u8;
    let mut curr_val = 0u32;
    while curr_len < COEFF_TOKEN_MAX_LEN {
        curr_val = (curr_val << 1) | reader.read_bit()? as u32;
        curr_len += 1;
        for trailing_ones in 0..4 {
            for total_coeff in 0..N {
                if lengths[trailing_ones][total_coeff] == curr_len
                    && codes[trailing_ones][total_coeff] as u32 == curr_val
                {
                    return Ok((total_coeff as u32, trailing_ones as u32));
                }
            }
        }
    }
    reader.seek(saved)?;
    Err(Error::CavlcUnknownCode)
}

/// coeff_token -> (TotalCoeff, TrailingOnes). `nc` selects the table: the
/// three nC ranges, the 6-bit fixed-length fast path for nC >= 8, and the
/// chroma DC pseudo-values -1 (4:2:0) and -2 (4:2:2).
pub fn coeff_token(reader: &mut BitReader, nc: i32) -> Result<(u32, u32)> {
    if nc >= 8 {
        let code = reader.read_bits(6)?;
        if code == 3 {
            return Ok((0, 0));
        }
        // Table 9-5 lays the fixed codes out as 4*(TotalCoeff-1)+TrailingOnes.
        return Ok((code / 4 + 1, code % 4));
    }
    match nc {
        0..=1 => scan_coeff_token(reader, &COEFF_TOKEN_LEN_0_2, &COEFF_TOKEN_CODE_0_2),
        2..=3 => scan_coeff_token(reader, &COEFF_TOKEN_LEN_2_4, &COEFF_TOKEN_CODE_2_4),
        4..=7 => scan_coeff_token(reader, &COEFF_TOKEN_LEN_4_8, &COEFF_TOKEN_CODE_4_8),
        -1 => scan_coeff_token_chroma(
            reader,
            &COEFF_TOKEN_LEN_CHROMA_DC_420,
            &COEFF_TOKEN_CODE_CHROMA_DC_420,
        ),
        -2 => scan_coeff_token_chroma(
            reader,
            &COEFF_TOKEN_LEN_CHROMA_DC_422,
            &COEFF_TOKEN_CODE_CHROMA_DC_422,
        ),
        _ => Err(Error::InvalidValue("nC")),
    }
}

/// level_prefix (9.2.2.1): leading zeros up to and including the
/// terminating 1 bit.
pub fn level_prefix(reader: &mut BitReader) -> Result<u32> {
    let mut leading_zeros = 0;
    while !reader.read_bit()? {
        leading_zeros += 1;
    }
    Ok(leading_zeros)
}

fn scan_symbol_table(
    reader: &mut BitReader,
    row: &[(u8, u8)],
    max_len: u8,
) -> Result<u32> {
    let saved = reader.bit_position();
    let mut curr_len = 0u8;
    let mut curr_val = 0u32;
    while curr_len < max_len {
        curr_val = (curr_val << 1) | reader.read_bit()? as u32;
        curr_len += 1;
        for (value, &(len, code)) in row.iter().enumerate() {
            if len == curr_len && code as u32 == curr_val {
                return Ok(value as u32);
            }
        }
    }
    reader.seek(saved)?;
    Err(Error::CavlcUnknownCode)
}

/// total_zeros: the chroma DC 2x2 table for maxNumCoeff 4, the general 4x4
/// table otherwise. maxNumCoeff 8 (4:2:2 chroma DC) is not supported.
pub fn total_zeros(reader: &mut BitReader, max_num_coeff: u32, tz_vlc_index: u32) -> Result<u32> {
    match max_num_coeff {
        4 => {
            if !(1..=3).contains(&tz_vlc_index) {
                return Err(Error::InvalidValue("tzVlcIndex"));
            }
            scan_symbol_table(reader, &TOTAL_ZEROS_CHROMA_DC[tz_vlc_index as usize - 1], 3)
        }
        8 => Err(Error::Unsupported("4:2:2 chroma DC total_zeros")),
        _ => {
            if !(1..=15).contains(&tz_vlc_index) {
                return Err(Error::InvalidValue("tzVlcIndex"));
            }
            scan_symbol_table(reader, &TOTAL_ZEROS_4X4[tz_vlc_index as usize - 1], 9)
        }
    }
}

/// run_before for the given zerosLeft; the >6 column handles runs up to 14.
pub fn run_before(reader: &mut BitReader, zeros_left: u32) -> Result<u32> {
    if zeros_left == 0 {
        return Ok(0);
    }
    if zeros_left > 6 {
        scan_symbol_table(reader, &RUN_BEFORE[6], 11)
    } else {
        let max_len = if zeros_left <= 3 { 2 } else { 3 };
        scan_symbol_table(reader, &RUN_BEFORE[zeros_left as usize - 1], max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_at(data: &[u8]) -> BitReader<'_> {
        BitReader::new(data)
    }

    #[test]
    fn test_coeff_token_nc0() {
        for nc in 0..2 {
            let data = [0xff];
            let mut r = reader_at(&data);
            assert_eq!(coeff_token(&mut r, nc).unwrap(), (0, 0));
            assert_eq!(r.bit_position(), 1);

            // (4, 3): 000011
            let data = [0x0f, 0xff];
            let mut r = reader_at(&data);
            assert_eq!(coeff_token(&mut r, nc).unwrap(), (4, 3));
            assert_eq!(r.bit_position(), 6);

            // (6, 2): 0000000101
            let data = [0x01, 0x4f, 0xff];
            let mut r = reader_at(&data);
            assert_eq!(coeff_token(&mut r, nc).unwrap(), (6, 2));
            assert_eq!(r.bit_position(), 10);
        }
    }

    #[test]
    fn test_coeff_token_nc2() {
        for nc in 2..4 {
            let data = [0xff, 0xff];
            let mut r = reader_at(&data);
            assert_eq!(coeff_token(&mut r, nc).unwrap(), (0, 0));
            assert_eq!(r.bit_position(), 2);

            // (2, 2): 011
            let data = [0x77, 0xff];
            let mut r = reader_at(&data);
            assert_eq!(coeff_token(&mut r, nc).unwrap(), (2, 2));
            assert_eq!(r.bit_position(), 3);

            // (7, 0): 00000001111
            let data = [0x01, 0xfe, 0xff];
            let mut r = reader_at(&data);
            assert_eq!(coeff_token(&mut r, nc).unwrap(), (7, 0));
            assert_eq!(r.bit_position(), 11);
        }
    }

    #[test]
    fn test_coeff_token_nc4() {
        for nc in 4..8 {
            let data = [0xff, 0xff];
            let mut r = reader_at(&data);
            assert_eq!(coeff_token(&mut r, nc).unwrap(), (0, 0));
            assert_eq!(r.bit_position(), 4);

            // (2, 2): 1101
            let data = [0xdf, 0xff];
            let mut r = reader_at(&data);
            assert_eq!(coeff_token(&mut r, nc).unwrap(), (2, 2));
            assert_eq!(r.bit_position(), 4);

            // (7, 0): 0001000
            let data = [0x10, 0xfe, 0xff];
            let mut r = reader_at(&data);
            assert_eq!(coeff_token(&mut r, nc).unwrap(), (7, 0));
            assert_eq!(r.bit_position(), 7);
        }
    }

    #[test]
    fn test_coeff_token_nc8_fast_path() {
        // (0, 0): 000011
        let data = [0x0f, 0xff];
        let mut r = reader_at(&data);
        assert_eq!(coeff_token(&mut r, 8).unwrap(), (0, 0));
        assert_eq!(r.bit_position(), 6);

        // (2, 2): 000110
        let data = [0x18, 0xff];
        let mut r = reader_at(&data);
        assert_eq!(coeff_token(&mut r, 8).unwrap(), (2, 2));
        assert_eq!(r.bit_position(), 6);

        // (7, 0): 011000
        let data = [0x60, 0x00, 0xff];
        let mut r = reader_at(&data);
        assert_eq!(coeff_token(&mut r, 9).unwrap(), (7, 0));
        assert_eq!(r.bit_position(), 6);

        // (16, 3): 111111
        let data = [0xff, 0x00, 0xff];
        let mut r = reader_at(&data);
        assert_eq!(coeff_token(&mut r, 15).unwrap(), (16, 3));
        assert_eq!(r.bit_position(), 6);

        // (1, 0) and (1, 1) at the top of the fixed-length table.
        let data = [0x00];
        let mut r = reader_at(&data);
        assert_eq!(coeff_token(&mut r, 8).unwrap(), (1, 0));
        let data = [0x04];
        let mut r = reader_at(&data);
        assert_eq!(coeff_token(&mut r, 8).unwrap(), (1, 1));
    }

    #[test]
    fn test_coeff_token_chroma_dc() {
        // nC == -1: (0,0) is 01, (1,1) is 1, (4,3) is 0000000.
        let data = [0b01000000];
        let mut r = reader_at(&data);
        assert_eq!(coeff_token(&mut r, -1).unwrap(), (0, 0));
        assert_eq!(r.bit_position(), 2);

        let data = [0b10000000];
        let mut r = reader_at(&data);
        assert_eq!(coeff_token(&mut r, -1).unwrap(), (1, 1));
        assert_eq!(r.bit_position(), 1);

        let data = [0b00000001];
        let mut r = reader_at(&data);
        assert_eq!(coeff_token(&mut r, -1).unwrap(), (4, 3));
        assert_eq!(r.bit_position(), 7);

        // nC == -2: (0,0) is 1, (1,1) is 01.
        let data = [0b10000000];
        let mut r = reader_at(&data);
        assert_eq!(coeff_token(&mut r, -2).unwrap(), (0, 0));
        assert_eq!(r.bit_position(), 1);

        let data = [0b01000000];
        let mut r = reader_at(&data);
        assert_eq!(coeff_token(&mut r, -2).unwrap(), (1, 1));
        assert_eq!(r.bit_position(), 2);
    }

    #[test]
    fn test_coeff_token_unknown_code_restores_position() {
        // 17 zero bits cannot match any nC 0..2 code.
        let data = [0x00, 0x00, 0x00];
        let mut r = reader_at(&data);
        assert_eq!(coeff_token(&mut r, 0), Err(Error::CavlcUnknownCode));
        assert_eq!(r.bit_position(), 0);
    }

    #[test]
    fn test_coeff_token_coverage() {
        // Every (TotalCoeff, TrailingOnes) pair with T1 <= min(TC, 3) must be
        // decodable from its own table, and decoding must consume exactly the
        // code length.
        let tables: [(i32, &[[u8; 17]; 4], &[[u8; 17]; 4]); 3] = [
            (0, &COEFF_TOKEN_LEN_0_2, &COEFF_TOKEN_CODE_0_2),
            (2, &COEFF_TOKEN_LEN_2_4, &COEFF_TOKEN_CODE_2_4),
            (4, &COEFF_TOKEN_LEN_4_8, &COEFF_TOKEN_CODE_4_8),
        ];
        for (nc, lens, codes) in tables {
            for t1 in 0..4usize {
                for tc in 0..17usize {
                    if t1 > tc.min(3) {
                        assert_eq!(lens[t1][tc], 0);
                        continue;
                    }
                    let len = lens[t1][tc];
                    assert!(len > 0, "missing code for tc={} t1={}", tc, t1);
                    let code = codes[t1][tc] as u32;
                    let data = ((code << (16 - len)) as u16).to_be_bytes();
                    let mut r = reader_at(&data);
                    assert_eq!(
                        coeff_token(&mut r, nc).unwrap(),
                        (tc as u32, t1 as u32),
                        "nC={} tc={} t1={}",
                        nc,
                        tc,
                        t1
                    );
                    assert_eq!(r.bit_position(), len as usize);
                }
            }
        }
    }

    #[test]
    fn test_level_prefix() {
        let data = [0x01];
        let mut r = reader_at(&data);
        assert_eq!(level_prefix(&mut r).unwrap(), 7);
        assert_eq!(r.bit_position(), 8);

        let data = [0x00, 0x20];
        let mut r = reader_at(&data);
        assert_eq!(level_prefix(&mut r).unwrap(), 10);
        assert_eq!(r.bit_position(), 11);
    }

    #[test]
    fn test_total_zeros_general() {
        // tzVlcIndex 1, bits 011 -> 1
        let data = [0x61, 0x11];
        let mut r = reader_at(&data);
        assert_eq!(total_zeros(&mut r, 7, 1).unwrap(), 1);
        assert_eq!(r.bit_position(), 3);

        // tzVlcIndex 3, bits 00011 -> 9
        let data = [0x18, 0x12];
        let mut r = reader_at(&data);
        assert_eq!(total_zeros(&mut r, 3, 3).unwrap(), 9);
        assert_eq!(r.bit_position(), 5);

        // tzVlcIndex 1, bit 1 -> 0
        let data = [0x80];
        let mut r = reader_at(&data);
        assert_eq!(total_zeros(&mut r, 16, 1).unwrap(), 0);
        assert_eq!(r.bit_position(), 1);
    }

    #[test]
    fn test_total_zeros_chroma_dc() {
        let data = [0xff];
        let mut r = reader_at(&data);
        assert_eq!(total_zeros(&mut r, 4, 1).unwrap(), 0);
        assert_eq!(r.bit_position(), 1);

        let data = [0x00];
        let mut r = reader_at(&data);
        assert_eq!(total_zeros(&mut r, 4, 2).unwrap(), 2);
        assert_eq!(r.bit_position(), 2);
    }

    #[test]
    fn test_total_zeros_422_unsupported() {
        let data = [0xff];
        let mut r = reader_at(&data);
        assert!(matches!(
            total_zeros(&mut r, 8, 1),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_run_before() {
        let data = [0x00];
        let mut r = reader_at(&data);
        assert_eq!(run_before(&mut r, 1).unwrap(), 1);
        assert_eq!(r.bit_position(), 1);

        let data = [0x01];
        let mut r = reader_at(&data);
        assert_eq!(run_before(&mut r, 3).unwrap(), 3);
        assert_eq!(r.bit_position(), 2);

        let data = [0x81];
        let mut r = reader_at(&data);
        assert_eq!(run_before(&mut r, 6).unwrap(), 6);
        assert_eq!(r.bit_position(), 3);

        // zerosLeft >= 7 uses the long column: 0000000001 -> 13.
        let data = [0x00, 0x44];
        let mut r = reader_at(&data);
        assert_eq!(run_before(&mut r, 8).unwrap(), 13);
        assert_eq!(r.bit_position(), 10);
    }

    #[test]
    fn test_run_before_zero_zeros_left_reads_nothing() {
        let data = [0xff];
        let mut r = reader_at(&data);
        assert_eq!(run_before(&mut r, 0).unwrap(), 0);
        assert_eq!(r.bit_position(), 0);
    }
}
