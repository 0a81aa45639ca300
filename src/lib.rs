pub mod bitreader;
pub mod bytescan;
pub mod cavlc;
pub mod eg;
pub mod macroblock;
pub mod nal;
pub mod parser;
pub mod pps;
pub mod slice;
pub mod slice_data;
pub mod sps;
pub mod transform;

pub use bytescan::{scan_annexb, NaluRange};
pub use macroblock::{Macroblock, MbClass, MbType};
pub use nal::{Nal, NalUnitType};
pub use parser::{Aud, H264Parser, NaluPayload, ParsedNalu};
pub use pps::Pps;
pub use slice::{SliceHeader, SliceType};
pub use slice_data::Slice;
pub use sps::Sps;
pub use transform::transform_annexb;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unexpected end of bitstream")]
    Truncated,
    #[error("invalid value for {0}")]
    InvalidValue(&'static str),
    #[error("unsupported feature: {0}")]
    Unsupported(&'static str),
    #[error("no matching CAVLC code")]
    CavlcUnknownCode,
    #[error("missing SPS with id {0}")]
    MissingSps(u8),
    #[error("missing PPS with id {0}")]
    MissingPps(u8),
}

pub type Result<T> = std::result::Result<T, Error>;
