//! VLR rules: the decoded VLR set and the raw byte-level walk

use futures::FutureExt;

use crate::check::{Status, complex_check};
use crate::copc::info::COPC_INFO_LENGTH;
use crate::copc::{
    COPC_HIERARCHY_RECORD_ID, COPC_INFO_RECORD_ID, COPC_USER_ID, LAZ_RECORD_ID, LAZ_USER_ID,
};
use crate::error::Result;
use crate::fallback::RawVlrWalk;
use crate::getter::SharedGetter;
use crate::las::Vlr;
use crate::las::vlr::{self, VLR_HEADER_LENGTH};
use crate::suite::Suite;

pub const WKT_USER_ID: &str = "LASF_Projection";
pub const WKT_RECORD_ID: u16 = 2112;

/// Decoded VLRs plus the reader, for EVLR contents that were not loaded
pub struct VlrSet {
    pub getter: SharedGetter,
    pub vlrs: Vec<Vlr>,
}

pub fn vlr_suite() -> Suite<VlrSet> {
    Suite::<VlrSet>::new()
        .check("copc-info", |set| {
            let found = vlr::find(&set.vlrs, COPC_USER_ID, COPC_INFO_RECORD_ID);
            match found.as_slice() {
                [] => Status::fail("Missing copc info VLR"),
                [info] => complex_check(info.content_length, |l| *l == COPC_INFO_LENGTH as u64)
                    .on_failure(format!(
                        "copc info VLR is {} bytes, expected {}",
                        info.content_length, COPC_INFO_LENGTH
                    ))
                    .status(),
                many => Status::fail(format!("Found {} copc info VLRs", many.len())),
            }
        })
        .check("copc-hierarchy", |set| {
            let count = vlr::find(&set.vlrs, COPC_USER_ID, COPC_HIERARCHY_RECORD_ID).len();
            complex_check(count, |c| *c == 1)
                .on_failure(format!("Expected 1 copc hierarchy VLR, found {}", count))
                .status()
        })
        .check("laszip-encoded", |set| {
            complex_check(&set.vlrs, |vlrs| {
                !vlr::find(vlrs, LAZ_USER_ID, LAZ_RECORD_ID).is_empty()
            })
            .warning()
            .on_failure("Missing laszip VLR, point data is read as uncompressed records")
            .status()
        })
        .check_async("wkt", |set| async move { wkt(&set).await }.boxed())
}

async fn wkt(set: &VlrSet) -> Result<Status> {
    let Some(found) = vlr::find(&set.vlrs, WKT_USER_ID, WKT_RECORD_ID).first().copied() else {
        return Ok(Status::warn("Missing WKT VLR"));
    };

    let data = if found.is_extended {
        set.getter
            .get(
                found.content_offset,
                vlr::span_end(found.content_offset, found.content_length)?,
            )
            .await?
    } else {
        found.data.clone()
    };

    let trimmed = match data.iter().rposition(|&b| b != 0) {
        Some(last) => &data[..=last],
        None => return Ok(Status::fail("WKT VLR is empty")),
    };
    Ok(match std::str::from_utf8(trimmed) {
        Ok(_) => Status::pass(),
        Err(error) => Status::fail(format!("WKT VLR is not valid UTF-8: {}", error)),
    })
}

/// Rules over the byte-level VLR walk
pub fn raw_vlr_suite() -> Suite<RawVlrWalk> {
    Suite::<RawVlrWalk>::new()
        .check("vlrCount", |walk| {
            complex_check(walk, |w| w.vlrs.len() as u64 == w.header.vlr_count as u64)
                .on_failure(walk.vlr_error.clone().unwrap_or_else(|| {
                    format!(
                        "Read {} of {} VLRs",
                        walk.vlrs.len(),
                        walk.header.vlr_count
                    )
                }))
                .status()
        })
        .check("vlrsBeforePointData", |walk| {
            let point_data_offset = walk.header.point_data_offset as u64;
            let overlapping: Vec<String> = walk
                .vlrs
                .iter()
                .filter(|v| v.end(VLR_HEADER_LENGTH).is_none_or(|end| end > point_data_offset))
                .map(|v| format!("{}/{}", v.user_id, v.record_id))
                .collect();
            complex_check(&overlapping, |o| o.is_empty())
                .on_failure(format!(
                    "VLRs extend past point data offset {}: [ {} ]",
                    point_data_offset,
                    overlapping.join(", ")
                ))
                .status()
        })
        .check("copcInfoFirst", |walk| match walk.vlrs.first() {
            Some(first) if first.is(COPC_USER_ID, COPC_INFO_RECORD_ID) => {
                complex_check(first.offset, |o| *o == walk.header.header_length as u64)
                    .on_failure(format!(
                        "copc info VLR starts at {}, expected {}",
                        first.offset, walk.header.header_length
                    ))
                    .status()
            }
            Some(first) => Status::fail(format!(
                "First VLR is {}/{}, expected copc/1",
                first.user_id, first.record_id
            )),
            None => Status::fail("No VLRs"),
        })
        .check("evlrCount", |walk| {
            complex_check(walk, |w| w.evlrs.len() as u64 == w.header.evlr_count as u64)
                .on_failure(walk.evlr_error.clone().unwrap_or_else(|| {
                    format!(
                        "Read {} of {} EVLRs",
                        walk.evlrs.len(),
                        walk.header.evlr_count
                    )
                }))
                .status()
        })
        .check("evlrsAfterPointData", |walk| {
            let point_data_offset = walk.header.point_data_offset as u64;
            let early: Vec<String> = walk
                .evlrs
                .iter()
                .filter(|e| e.offset < point_data_offset)
                .map(|e| format!("{}/{}@{}", e.user_id, e.record_id, e.offset))
                .collect();
            complex_check(&early, |e| e.is_empty())
                .on_failure(format!(
                    "EVLRs start before point data offset {}: [ {} ]",
                    point_data_offset,
                    early.join(", ")
                ))
                .status()
        })
}
