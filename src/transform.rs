//! Per-NALU stream rewriting: every byte outside NALU payload ranges
//! (prologue, start codes, stray gaps) is carried through verbatim, and each
//! payload is replaced by whatever the callback returns.

use crate::bytescan::scan_annexb;
use crate::Result;

/// Rewrites an Annex B stream through `f(payload, forbidden_zero_bit,
/// nal_ref_idc, nal_unit_type)`. The payload slice starts at the NAL header
/// byte; the callback may change its length. With an identity callback the
/// output equals the input byte for byte.
pub fn transform_annexb<F>(data: &[u8], mut f: F) -> Result<Vec<u8>>
where
    F: FnMut(&[u8], u8, u8, u8) -> Result<Vec<u8>>,
{
    let ranges = scan_annexb(data);
    let mut out = Vec::with_capacity(data.len());
    let mut copied_to = 0usize;

    for range in &ranges {
        if range.start > copied_to {
            out.extend_from_slice(&data[copied_to..range.start]);
        }
        let transformed = f(
            range.payload(data),
            range.forbidden_zero_bit,
            range.nal_ref_idc,
            range.nal_unit_type,
        )?;
        out.extend_from_slice(&transformed);
        copied_to = range.end + 1;
    }

    if copied_to < data.len() {
        out.extend_from_slice(&data[copied_to..]);
    }

    Ok(out)
}
