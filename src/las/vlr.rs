//! Variable length records

use serde::{Deserialize, Serialize};

use crate::error::{LasError, LasResult, Result};
use crate::getter::Getter;
use crate::las::header::{Header, ascii_at, u16_at, u64_at};

pub const VLR_HEADER_LENGTH: u64 = 54;
pub const EVLR_HEADER_LENGTH: u64 = 60;

/// A VLR or EVLR. VLR contents are loaded; EVLR contents are not, since the
/// hierarchy they usually carry can be large and is read page by page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vlr {
    pub user_id: String,
    pub record_id: u16,
    pub description: String,
    pub content_offset: u64,
    pub content_length: u64,
    pub is_extended: bool,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Vlr {
    pub fn is(&self, user_id: &str, record_id: u16) -> bool {
        self.user_id == user_id && self.record_id == record_id
    }

    /// Walk every VLR and EVLR the header declares
    pub async fn walk(getter: &dyn Getter, header: &Header) -> Result<Vec<Vlr>> {
        let mut vlrs = Vec::new();

        let mut offset = header.header_length as u64;
        for _ in 0..header.vlr_count {
            let raw = getter
                .get(offset, span_end(offset, VLR_HEADER_LENGTH)?)
                .await?;
            let mut vlr = Self::parse_header(&raw, offset, false)?;
            let content_end = span_end(vlr.content_offset, vlr.content_length)?;
            vlr.data = getter.get(vlr.content_offset, content_end).await?;
            offset = content_end;
            vlrs.push(vlr);
        }

        let mut offset = header.evlr_offset;
        for _ in 0..header.evlr_count {
            let raw = getter
                .get(offset, span_end(offset, EVLR_HEADER_LENGTH)?)
                .await?;
            let vlr = Self::parse_header(&raw, offset, true)?;
            offset = span_end(vlr.content_offset, vlr.content_length)?;
            vlrs.push(vlr);
        }

        Ok(vlrs)
    }

    /// Decode a 54-byte VLR or 60-byte EVLR header found at `offset`
    pub fn parse_header(bytes: &[u8], offset: u64, is_extended: bool) -> Result<Vlr> {
        let header_length = if is_extended {
            EVLR_HEADER_LENGTH
        } else {
            VLR_HEADER_LENGTH
        };
        if (bytes.len() as u64) < header_length {
            return Err(LasError::InvalidVlr {
                offset,
                details: format!("header is {} bytes, expected {}", bytes.len(), header_length),
            }
            .into());
        }

        let (content_length, description_at) = if is_extended {
            (u64_at(bytes, 20), 28)
        } else {
            (u16_at(bytes, 20) as u64, 22)
        };

        Ok(Vlr {
            user_id: ascii_at(bytes, 2, 16),
            record_id: u16_at(bytes, 18),
            description: ascii_at(bytes, description_at, 32),
            content_offset: span_end(offset, header_length)?,
            content_length,
            is_extended,
            data: Vec::new(),
        })
    }
}

/// End of the `length` bytes starting at `offset`, rejecting spans that
/// overflow the file address space
pub fn span_end(offset: u64, length: u64) -> LasResult<u64> {
    offset.checked_add(length).ok_or_else(|| LasError::InvalidVlr {
        offset,
        details: format!("length {} runs past the end of the address space", length),
    })
}

/// Find the VLRs or EVLRs with the given identity
pub fn find<'a>(vlrs: &'a [Vlr], user_id: &str, record_id: u16) -> Vec<&'a Vlr> {
    vlrs.iter().filter(|vlr| vlr.is(user_id, record_id)).collect()
}
