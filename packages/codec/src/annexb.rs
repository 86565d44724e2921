//! H.264 Annex B helpers.
//!
//! Encoded payloads leave the pump as a plain concatenation of codec-native
//! access units. For H.264 that is an Annex B byte stream: NAL units
//! separated by 3-byte (0x000001) or 4-byte (0x00000001) start codes.

/// H.264 NAL unit type constants.
pub mod nal_unit_type {
    /// Non-IDR slice (P/B frame)
    pub const NON_IDR_SLICE: u8 = 1;
    /// IDR slice (keyframe)
    pub const IDR_SLICE: u8 = 5;
    /// Supplemental enhancement information
    pub const SEI: u8 = 6;
    /// Sequence parameter set
    pub const SPS: u8 = 7;
    /// Picture parameter set
    pub const PPS: u8 = 8;
    /// Access unit delimiter
    pub const AUD: u8 = 9;
}

const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// A single H.264 NAL unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NalUnit {
    /// The raw NAL unit data (without start code).
    pub data: Vec<u8>,
    /// NAL unit type (from first byte & 0x1F).
    pub nal_type: u8,
}

impl NalUnit {
    /// Wrap raw NAL data (without start code).
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        let nal_type = data.first().map_or(0, |b| b & 0x1F);
        Self { data, nal_type }
    }

    /// Returns true if this NAL unit is an IDR (keyframe) slice.
    pub fn is_idr(&self) -> bool {
        self.nal_type == nal_unit_type::IDR_SLICE
    }

    /// Returns true if this NAL unit is an SPS.
    pub fn is_sps(&self) -> bool {
        self.nal_type == nal_unit_type::SPS
    }

    /// Returns true if this NAL unit is a PPS.
    pub fn is_pps(&self) -> bool {
        self.nal_type == nal_unit_type::PPS
    }

    /// Returns true if this NAL unit is a video slice (IDR or non-IDR).
    pub fn is_slice(&self) -> bool {
        self.nal_type == nal_unit_type::IDR_SLICE || self.nal_type == nal_unit_type::NON_IDR_SLICE
    }

    /// Convert NAL unit to Annex B format (with 0x00000001 start code).
    pub fn to_annex_b(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(START_CODE.len() + self.data.len());
        result.extend_from_slice(&START_CODE);
        result.extend_from_slice(&self.data);
        result
    }
}

/// Length of the start code at the beginning of `data`, if any.
fn start_code_len(data: &[u8]) -> Option<usize> {
    if data.starts_with(&START_CODE) {
        Some(4)
    } else if data.starts_with(&START_CODE[1..]) {
        Some(3)
    } else {
        None
    }
}

/// Returns true if `data` begins with a start code followed by at least one
/// NAL header byte whose forbidden-zero bit is clear.
#[must_use]
pub fn starts_with_start_code(data: &[u8]) -> bool {
    match start_code_len(data) {
        Some(len) => data.get(len).is_some_and(|header| header & 0x80 == 0),
        None => false,
    }
}

/// Split an Annex B byte stream into NAL units.
///
/// Bytes before the first start code are ignored, as are empty NAL units
/// between back-to-back start codes.
pub fn split_nal_units(data: &[u8]) -> Vec<NalUnit> {
    // (start code position, payload start) for every start code
    let mut boundaries = Vec::new();
    let mut i = 0;
    while i + 3 <= data.len() {
        match start_code_len(&data[i..]) {
            Some(len) => {
                boundaries.push((i, i + len));
                i += len;
            }
            None => i += 1,
        }
    }

    let mut nals = Vec::with_capacity(boundaries.len());
    for (idx, &(_, start)) in boundaries.iter().enumerate() {
        let end = boundaries
            .get(idx + 1)
            .map_or(data.len(), |&(next_code, _)| next_code);
        if start < end {
            nals.push(NalUnit::new(data[start..end].to_vec()));
        }
    }
    nals
}
