//! Byte-level fallback parsing
//!
//! When the decoder rejects a file these readers pull the header and VLR
//! fields out by hand, so the rules can say *why* it was rejected. They rely
//! on nothing but fixed offsets and never stop at the first surprise: a
//! record that cannot be read is noted and the walk ends there.

use serde::Serialize;

use crate::error::{LasError, Result};
use crate::getter::Getter;
use crate::las::header::{LAS14_HEADER_LENGTH, ascii_at, u16_at, u32_at, u64_at};
use crate::las::vlr::{EVLR_HEADER_LENGTH, VLR_HEADER_LENGTH};

/// Bytes the manual header parser needs before it will decode anything
pub const MIN_HEADER_LENGTH: usize = LAS14_HEADER_LENGTH;

/// Header fields read straight from their offsets
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualHeader {
    pub file_signature: String,
    pub major_version: u8,
    pub minor_version: u8,
    pub header_length: u16,
    pub point_data_offset: u32,
    pub vlr_count: u32,
    pub point_data_record_format: u8,
    pub point_data_record_length: u16,
    pub evlr_offset: u64,
    pub evlr_count: u32,
}

impl ManualHeader {
    pub async fn read(getter: &dyn Getter) -> Result<Self> {
        let bytes = getter.get(0, MIN_HEADER_LENGTH as u64).await?;
        Ok(Self::parse(&bytes)?)
    }

    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, LasError> {
        if bytes.len() < MIN_HEADER_LENGTH {
            return Err(LasError::HeaderTooShort {
                length: bytes.len(),
                minimum: MIN_HEADER_LENGTH,
            });
        }

        Ok(Self {
            file_signature: String::from_utf8_lossy(&bytes[0..4]).into_owned(),
            major_version: bytes[24],
            minor_version: bytes[25],
            header_length: u16_at(bytes, 94),
            point_data_offset: u32_at(bytes, 96),
            vlr_count: u32_at(bytes, 100),
            point_data_record_format: bytes[104] & 0x3f,
            point_data_record_length: u16_at(bytes, 105),
            evlr_offset: u64_at(bytes, 235),
            evlr_count: u32_at(bytes, 243),
        })
    }
}

/// A VLR or EVLR header found by the raw walk
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVlr {
    pub offset: u64,
    pub user_id: String,
    pub record_id: u16,
    pub content_length: u64,
}

impl RawVlr {
    pub fn is(&self, user_id: &str, record_id: u16) -> bool {
        self.user_id == user_id && self.record_id == record_id
    }

    /// First byte past this record's content, `None` when the declared
    /// length overflows
    pub fn end(&self, header_length: u64) -> Option<u64> {
        self.offset
            .checked_add(header_length)?
            .checked_add(self.content_length)
    }
}

/// Result of walking the VLR and EVLR chains declared by a [`ManualHeader`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVlrWalk {
    pub header: ManualHeader,
    pub vlrs: Vec<RawVlr>,
    pub vlr_error: Option<String>,
    pub evlrs: Vec<RawVlr>,
    pub evlr_error: Option<String>,
}

impl RawVlrWalk {
    /// Read the header by hand, then walk both chains
    pub async fn read(getter: &dyn Getter) -> Result<Self> {
        let header = ManualHeader::read(getter).await?;
        Ok(Self::walk(getter, header).await)
    }

    pub async fn walk(getter: &dyn Getter, header: ManualHeader) -> Self {
        let (vlrs, vlr_error) = walk_chain(
            getter,
            header.header_length as u64,
            header.vlr_count,
            false,
        )
        .await;
        let (evlrs, evlr_error) =
            walk_chain(getter, header.evlr_offset, header.evlr_count, true).await;

        Self {
            header,
            vlrs,
            vlr_error,
            evlrs,
            evlr_error,
        }
    }
}

async fn walk_chain(
    getter: &dyn Getter,
    start: u64,
    count: u32,
    is_extended: bool,
) -> (Vec<RawVlr>, Option<String>) {
    let (kind, header_length) = if is_extended {
        ("EVLR", EVLR_HEADER_LENGTH)
    } else {
        ("VLR", VLR_HEADER_LENGTH)
    };

    let mut records = Vec::new();
    let mut offset = start;
    for index in 0..count {
        let Some(header_end) = offset.checked_add(header_length) else {
            return (
                records,
                Some(format!("{} {} offset {} overflows", kind, index, offset)),
            );
        };
        let bytes = match getter.get(offset, header_end).await {
            Ok(bytes) => bytes,
            Err(error) => {
                return (
                    records,
                    Some(format!("{} {} at offset {}: {}", kind, index, offset, error)),
                );
            }
        };

        let content_length = if is_extended {
            u64_at(&bytes, 20)
        } else {
            u16_at(&bytes, 20) as u64
        };
        let record = RawVlr {
            offset,
            user_id: ascii_at(&bytes, 2, 16),
            record_id: u16_at(&bytes, 18),
            content_length,
        };
        let end = record.end(header_length);
        records.push(record);
        match end {
            Some(end) => offset = end,
            None => {
                return (
                    records,
                    Some(format!(
                        "{} {} at offset {}: content length {} overflows",
                        kind, index, offset, content_length
                    )),
                );
            }
        }
    }

    (records, None)
}

/// Point counts as stored, legacy 32-bit fields next to the 64-bit ones
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyCounts {
    pub point_data_record_format: u8,
    pub legacy_point_count: u32,
    pub legacy_point_count_by_return: [u32; 5],
    pub point_count: u64,
    pub point_count_by_return: [u64; 5],
}

impl LegacyCounts {
    pub async fn read(getter: &dyn Getter) -> Result<Self> {
        let bytes = getter.get(0, MIN_HEADER_LENGTH as u64).await?;
        Ok(Self::parse(&bytes)?)
    }

    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, LasError> {
        if bytes.len() < MIN_HEADER_LENGTH {
            return Err(LasError::HeaderTooShort {
                length: bytes.len(),
                minimum: MIN_HEADER_LENGTH,
            });
        }

        let mut legacy_point_count_by_return = [0u32; 5];
        let mut point_count_by_return = [0u64; 5];
        for i in 0..5 {
            legacy_point_count_by_return[i] = u32_at(bytes, 111 + i * 4);
            point_count_by_return[i] = u64_at(bytes, 255 + i * 8);
        }

        Ok(Self {
            point_data_record_format: bytes[104] & 0x3f,
            legacy_point_count: u32_at(bytes, 107),
            legacy_point_count_by_return,
            point_count: u64_at(bytes, 247),
            point_count_by_return,
        })
    }
}
