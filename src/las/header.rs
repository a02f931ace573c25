//! LAS public header block

use serde::{Deserialize, Serialize};

use crate::error::{LasError, LasResult, Result};
use crate::getter::Getter;

/// Header length of LAS 1.0-1.2 files, the smallest header that can be decoded
pub const MIN_LEGACY_HEADER_LENGTH: usize = 227;
/// Header length of LAS 1.4 files, and the only one COPC allows
pub const LAS14_HEADER_LENGTH: usize = 375;
/// Global encoding bit signalling WKT coordinate reference systems
pub const WKT_GLOBAL_ENCODING_BIT: u16 = 1 << 4;

/// Decoded LAS public header block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub file_signature: String,
    pub file_source_id: u16,
    pub global_encoding: u16,
    pub major_version: u8,
    pub minor_version: u8,
    pub system_identifier: String,
    pub generating_software: String,
    pub creation_day: u16,
    pub creation_year: u16,
    pub header_length: u16,
    pub point_data_offset: u32,
    pub vlr_count: u32,
    pub point_data_record_format: u8,
    pub point_data_record_length: u16,
    pub legacy_point_count: u32,
    pub legacy_point_count_by_return: [u32; 5],
    pub scale: [f64; 3],
    pub offset: [f64; 3],
    pub min: [f64; 3],
    pub max: [f64; 3],
    pub waveform_data_offset: u64,
    pub evlr_offset: u64,
    pub evlr_count: u32,
    pub point_count: u64,
    pub point_count_by_return: [u64; 15],
}

impl Header {
    /// Read and decode the header of a LAS file
    pub async fn read(getter: &dyn Getter) -> Result<Self> {
        let prefix = getter.get(0, MIN_LEGACY_HEADER_LENGTH as u64).await?;
        check_prefix(&prefix)?;

        let header_length = u16_at(&prefix, 94) as u64;
        let bytes = if header_length as usize > MIN_LEGACY_HEADER_LENGTH {
            let wanted = header_length.min(LAS14_HEADER_LENGTH as u64);
            getter.get(0, wanted).await?
        } else {
            prefix
        };

        Ok(Self::parse(&bytes)?)
    }

    /// Decode a header from its raw bytes.
    ///
    /// The 1.4 fields are read whenever the declared header length covers
    /// them, independently of the minor version.
    pub fn parse(bytes: &[u8]) -> LasResult<Self> {
        check_prefix(bytes)?;

        let header_length = u16_at(bytes, 94);
        if (header_length as usize) < MIN_LEGACY_HEADER_LENGTH {
            return Err(LasError::HeaderTooShort {
                length: header_length as usize,
                minimum: MIN_LEGACY_HEADER_LENGTH,
            });
        }

        let legacy_point_count = u32_at(bytes, 107);
        let mut legacy_point_count_by_return = [0u32; 5];
        for (i, count) in legacy_point_count_by_return.iter_mut().enumerate() {
            *count = u32_at(bytes, 111 + i * 4);
        }

        let has_las14_fields =
            header_length as usize >= LAS14_HEADER_LENGTH && bytes.len() >= LAS14_HEADER_LENGTH;
        let waveform_data_offset = if header_length >= 235 && bytes.len() >= 235 {
            u64_at(bytes, 227)
        } else {
            0
        };

        let (evlr_offset, evlr_count, point_count, point_count_by_return) = if has_las14_fields {
            let mut by_return = [0u64; 15];
            for (i, count) in by_return.iter_mut().enumerate() {
                *count = u64_at(bytes, 255 + i * 8);
            }
            (u64_at(bytes, 235), u32_at(bytes, 243), u64_at(bytes, 247), by_return)
        } else {
            let mut by_return = [0u64; 15];
            for (wide, legacy) in by_return.iter_mut().zip(legacy_point_count_by_return) {
                *wide = legacy as u64;
            }
            (0, 0, legacy_point_count as u64, by_return)
        };

        Ok(Self {
            file_signature: ascii_at(bytes, 0, 4),
            file_source_id: u16_at(bytes, 4),
            global_encoding: u16_at(bytes, 6),
            major_version: bytes[24],
            minor_version: bytes[25],
            system_identifier: ascii_at(bytes, 26, 32),
            generating_software: ascii_at(bytes, 58, 32),
            creation_day: u16_at(bytes, 90),
            creation_year: u16_at(bytes, 92),
            header_length,
            point_data_offset: u32_at(bytes, 96),
            vlr_count: u32_at(bytes, 100),
            point_data_record_format: bytes[104] & 0x3f,
            point_data_record_length: u16_at(bytes, 105),
            legacy_point_count,
            legacy_point_count_by_return,
            scale: [f64_at(bytes, 131), f64_at(bytes, 139), f64_at(bytes, 147)],
            offset: [f64_at(bytes, 155), f64_at(bytes, 163), f64_at(bytes, 171)],
            max: [f64_at(bytes, 179), f64_at(bytes, 195), f64_at(bytes, 211)],
            min: [f64_at(bytes, 187), f64_at(bytes, 203), f64_at(bytes, 219)],
            waveform_data_offset,
            evlr_offset,
            evlr_count,
            point_count,
            point_count_by_return,
        })
    }

    pub fn has_wkt_bit(&self) -> bool {
        self.global_encoding & WKT_GLOBAL_ENCODING_BIT != 0
    }
}

fn check_prefix(bytes: &[u8]) -> LasResult<()> {
    if bytes.len() < MIN_LEGACY_HEADER_LENGTH {
        return Err(LasError::HeaderTooShort {
            length: bytes.len(),
            minimum: MIN_LEGACY_HEADER_LENGTH,
        });
    }
    if &bytes[0..4] != b"LASF" {
        return Err(LasError::InvalidSignature {
            found: String::from_utf8_lossy(&bytes[0..4]).into_owned(),
        });
    }
    // Any 1.x minor version decodes; the rules judge it
    let (major, minor) = (bytes[24], bytes[25]);
    if major != 1 {
        return Err(LasError::UnsupportedVersion { major, minor });
    }
    Ok(())
}

pub(crate) fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

pub(crate) fn u32_at(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

pub(crate) fn i32_at(bytes: &[u8], at: usize) -> i32 {
    u32_at(bytes, at) as i32
}

pub(crate) fn u64_at(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

pub(crate) fn f64_at(bytes: &[u8], at: usize) -> f64 {
    f64::from_bits(u64_at(bytes, at))
}

/// NUL-terminated fixed-width ASCII field
pub(crate) fn ascii_at(bytes: &[u8], at: usize, width: usize) -> String {
    let field = &bytes[at..at + width];
    let end = field.iter().position(|&b| b == 0).unwrap_or(width);
    String::from_utf8_lossy(&field[..end]).into_owned()
}
