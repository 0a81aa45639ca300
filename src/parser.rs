use crate::bitreader::BitReader;
use crate::bytescan::StartCodeScanner;
use crate::eg::read_ue;
use crate::nal::{Nal, NalUnitType};
use crate::pps::Pps;
use crate::slice_data::Slice;
use crate::sps::Sps;
use crate::{Error, Result};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// Access unit delimiter payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aud {
    pub primary_pic_type: u8,
}

impl Aud {
    pub fn parse(rbsp: &[u8]) -> Result<Self> {
        let mut reader = BitReader::new(rbsp);
        let primary_pic_type = reader.read_bits(3)? as u8;
        Ok(Aud { primary_pic_type })
    }
}

/// Decoded payload of one NALU. Types without a parser in this crate are
/// framed transparently as `Other`.
#[derive(Debug, Clone)]
pub enum NaluPayload {
    Aud(Aud),
    Sps(Arc<Sps>),
    Pps(Arc<Pps>),
    Slice(Box<Slice>),
    Other,
}

#[derive(Debug, Clone)]
pub struct ParsedNalu {
    pub nal: Nal,
    pub payload: NaluPayload,
}

/// Push-based Annex B parser. Parameter sets install into per-stream maps as
/// they arrive and stay valid for all later slices referencing them; a failed
/// NALU aborts only itself.
pub struct H264Parser {
    scanner: StartCodeScanner,
    sps_map: HashMap<u8, Arc<Sps>>,
    pps_map: HashMap<u8, Arc<Pps>>,
}

impl H264Parser {
    pub fn new() -> Self {
        Self {
            scanner: StartCodeScanner::new(),
            sps_map: HashMap::new(),
            pps_map: HashMap::new(),
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.scanner.push(data);
    }

    pub fn sps(&self, id: u8) -> Option<&Arc<Sps>> {
        self.sps_map.get(&id)
    }

    pub fn pps(&self, id: u8) -> Option<&Arc<Pps>> {
        self.pps_map.get(&id)
    }

    /// Parses the next framed NALU. A payload parse error is fatal to that
    /// NALU only; the scanner has already advanced, so the caller may keep
    /// iterating.
    pub fn next_nalu(&mut self) -> Result<Option<ParsedNalu>> {
        let span = match self.scanner.next_nal_unit()? {
            Some(span) => span,
            None => return Ok(None),
        };
        let nal_data = self.scanner.nal_bytes(&span).to_vec();
        let nal = Nal::parse(span.start_code_len, &nal_data)?;
        debug!("nal: type={:?} ref_idc={}", nal.nal_type, nal.ref_idc);

        let payload = match nal.nal_type {
            NalUnitType::Aud => NaluPayload::Aud(Aud::parse(&nal.to_rbsp())?),
            NalUnitType::Sps => {
                let sps = Arc::new(Sps::parse(&nal.to_rbsp())?);
                self.sps_map.insert(sps.seq_parameter_set_id, sps.clone());
                NaluPayload::Sps(sps)
            }
            NalUnitType::Pps => {
                let pps = Arc::new(Pps::parse(&nal.to_rbsp())?);
                self.pps_map.insert(pps.pic_parameter_set_id, pps.clone());
                NaluPayload::Pps(pps)
            }
            NalUnitType::NonIdrSlice | NalUnitType::IdrSlice => {
                let rbsp = nal.to_rbsp();
                let pps_id = peek_pps_id(&rbsp)?;
                let pps = self
                    .pps_map
                    .get(&pps_id)
                    .cloned()
                    .ok_or(Error::MissingPps(pps_id))?;
                let sps = self
                    .sps_map
                    .get(&pps.seq_parameter_set_id)
                    .cloned()
                    .ok_or(Error::MissingSps(pps.seq_parameter_set_id))?;
                let slice = Slice::parse(&rbsp, nal.nal_type, nal.ref_idc, sps, pps)?;
                NaluPayload::Slice(Box::new(slice))
            }
            _ => NaluPayload::Other,
        };

        Ok(Some(ParsedNalu { nal, payload }))
    }

    /// One-shot convenience: frames and parses a whole buffer, stopping at
    /// the first error.
    pub fn parse_all(data: &[u8]) -> Result<Vec<ParsedNalu>> {
        let mut parser = Self::new();
        parser.push(data);
        let mut nalus = Vec::new();
        while let Some(nalu) = parser.next_nalu()? {
            nalus.push(nalu);
        }
        Ok(nalus)
    }

    pub fn reset(&mut self) {
        self.scanner.reset();
        self.sps_map.clear();
        self.pps_map.clear();
    }
}

impl Default for H264Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal slice_header pre-read: first_mb_in_slice, slice_type, then the
/// PPS id that selects the parameter-set context.
fn peek_pps_id(rbsp: &[u8]) -> Result<u8> {
    let mut reader = BitReader::new(rbsp);

    let _first_mb_in_slice = read_ue(&mut reader)?;
    let _slice_type = read_ue(&mut reader)?;
    let pic_parameter_set_id = read_ue(&mut reader)?;

    if pic_parameter_set_id > 255 {
        return Err(Error::InvalidValue("pic_parameter_set_id"));
    }

    Ok(pic_parameter_set_id as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_creation() {
        let parser = H264Parser::new();
        assert_eq!(parser.sps_map.len(), 0);
        assert_eq!(parser.pps_map.len(), 0);
    }

    #[test]
    fn test_aud_parse() {
        // primary_pic_type 0, then rbsp trailing bits.
        let aud = Aud::parse(&[0x10]).unwrap();
        assert_eq!(aud.primary_pic_type, 0);

        let aud = Aud::parse(&[0xf0]).unwrap();
        assert_eq!(aud.primary_pic_type, 7);
    }

    #[test]
    fn test_parser_installs_parameter_sets() {
        let mut parser = H264Parser::new();

        let sps_data = vec![
            0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1f, 0xac, 0x34, 0xc8, 0x14, 0x00, 0x00,
            0x03, 0x00, 0x04, 0x00, 0x00, 0x03, 0x00, 0xf0, 0x3c, 0x60, 0xc6, 0x58,
        ];
        parser.push(&sps_data);

        let pps_data = vec![0x00, 0x00, 0x00, 0x01, 0x68, 0xce, 0x3c, 0x80];
        parser.push(&pps_data);
        // A trailing AUD terminates the PPS NALU in the byte stream.
        parser.push(&[0x00, 0x00, 0x00, 0x01, 0x09, 0x10]);

        let first = parser.next_nalu().unwrap().unwrap();
        assert!(matches!(first.payload, NaluPayload::Sps(_)));
        assert!(parser.sps(0).is_some());

        let second = parser.next_nalu().unwrap().unwrap();
        assert!(matches!(second.payload, NaluPayload::Pps(_)));
        assert!(parser.pps(0).is_some());
    }

    #[test]
    fn test_slice_without_parameter_sets_is_missing_pps() {
        let mut parser = H264Parser::new();
        // IDR slice NALU referencing pps 0: header 0x65, then
        // first_mb=0, slice_type=7 (I), pps_id=0 and filler.
        parser.push(&[0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x00]);
        parser.push(&[0x00, 0x00, 0x01, 0x09, 0x10]);

        assert_eq!(parser.next_nalu().unwrap_err(), Error::MissingPps(0));
        // The failed slice does not poison the stream.
        let next = parser.next_nalu().unwrap().unwrap();
        assert!(matches!(next.payload, NaluPayload::Aud(_)));
    }
}
