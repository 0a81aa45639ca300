//! Selective encryption of slice payloads in an Annex B stream.
//!
//! Slice NALUs (types 1 and 5) are decoded to RBSP, everything past the
//! first `CLEAR_PREFIX_LEN` bytes is run through AES-128-CTR, and the result
//! is re-protected with emulation-prevention bytes so the start-code framing
//! of the stream survives. Running the same pass twice restores the input;
//! the demo verifies that with SHA-256.

use aes::cipher::{KeyIvInit, StreamCipher};
use h264_syntax::nal::{ebsp_to_rbsp, rbsp_to_ebsp};
use h264_syntax::transform_annexb;
use sha2::{Digest, Sha256};
use std::fs;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// Header byte plus the slice-header prefix left in the clear so that
/// downstream parsers still recognise the NALU.
const CLEAR_PREFIX_LEN: usize = 10;

const KEY: [u8; 16] = [
    0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f,
    0x3c,
];
const IV: [u8; 16] = [
    0xf0, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa, 0xfb, 0xfc, 0xfd, 0xfe,
    0xff,
];

fn crypt_slices(data: &[u8]) -> h264_syntax::Result<Vec<u8>> {
    transform_annexb(data, |payload, _fzb, _nri, nal_unit_type| {
        if !matches!(nal_unit_type, 1 | 5) || payload.len() <= CLEAR_PREFIX_LEN {
            return Ok(payload.to_vec());
        }

        // Work on the RBSP so the keystream is not disturbed by
        // emulation-prevention bytes, then re-encode.
        let mut rbsp = ebsp_to_rbsp(&payload[CLEAR_PREFIX_LEN..]);
        let mut cipher = Aes128Ctr::new(&KEY.into(), &IV.into());
        cipher.apply_keystream(&mut rbsp);

        let mut out = payload[..CLEAR_PREFIX_LEN].to_vec();
        out.extend_from_slice(&rbsp_to_ebsp(&rbsp));
        Ok(out)
    })
}

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <input.h264> <output.h264>", args[0]);
        return Ok(());
    }

    let input = fs::read(&args[1])?;

    let encrypted = crypt_slices(&input)?;
    fs::write(&args[2], &encrypted)?;
    println!(
        "encrypted {} -> {} ({} -> {} bytes)",
        args[1],
        args[2],
        input.len(),
        encrypted.len()
    );

    // CTR is an involution here, so a second pass must restore the stream.
    let decrypted = crypt_slices(&encrypted)?;
    if sha256(&decrypted) == sha256(&input) {
        println!("round-trip OK");
    } else {
        eprintln!("round-trip MISMATCH");
        std::process::exit(1);
    }

    Ok(())
}
