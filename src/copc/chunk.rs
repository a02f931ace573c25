//! Point chunk decoding
//!
//! A COPC node's point data is one LAZ chunk. Files without a `laszip encoded`
//! VLR are read as plain fixed-length records instead.

use std::io::Cursor;
use std::ops::ControlFlow;

use laz::LazVlr;
use laz::record::{LayeredPointRecordDecompressor, RecordDecompressor};

use crate::error::{CopcError, LasError};
use crate::las::point::{PointLayout, PointRecord};

/// Decode up to `limit` points of one chunk, handing each to `visit`.
///
/// Stops early when `visit` breaks. Returns the number of points visited.
pub fn for_each_point<F>(
    bytes: &[u8],
    layout: &PointLayout,
    laz_vlr: Option<&LazVlr>,
    limit: u64,
    mut visit: F,
) -> Result<u64, CopcError>
where
    F: FnMut(&PointRecord) -> ControlFlow<()>,
{
    let record_length = layout.record_length as usize;
    if record_length == 0 {
        return Err(CopcError::Laz("point data record length is 0".to_string()));
    }

    let mut visited = 0u64;
    match laz_vlr {
        Some(vlr) => {
            let mut decompressor = LayeredPointRecordDecompressor::new(Cursor::new(bytes));
            decompressor
                .set_fields_from(vlr.items())
                .map_err(|e| CopcError::Laz(e.to_string()))?;

            let mut record = vec![0u8; decompressor.record_size()];
            while visited < limit {
                decompressor
                    .decompress_next(&mut record)
                    .map_err(|e| CopcError::Laz(e.to_string()))?;
                let point = PointRecord::parse(&record, layout).map_err(laz_error)?;
                visited += 1;
                if visit(&point).is_break() {
                    break;
                }
            }
        }
        None => {
            let available = (bytes.len() / record_length) as u64;
            if available < limit {
                return Err(CopcError::Laz(format!(
                    "chunk holds {} records, {} expected",
                    available, limit
                )));
            }
            for record in bytes.chunks_exact(record_length).take(limit as usize) {
                let point = PointRecord::parse(record, layout).map_err(laz_error)?;
                visited += 1;
                if visit(&point).is_break() {
                    break;
                }
            }
        }
    }

    Ok(visited)
}

/// Parse the `laszip encoded` VLR payload
pub fn parse_laz_vlr(data: &[u8]) -> Result<LazVlr, CopcError> {
    LazVlr::from_buffer(data).map_err(|e| CopcError::Laz(e.to_string()))
}

fn laz_error(error: LasError) -> CopcError {
    CopcError::Laz(error.to_string())
}
