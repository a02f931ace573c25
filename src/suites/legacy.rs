//! Legacy 32-bit point count rules

use crate::check::{CheckStatus, Status};
use crate::fallback::LegacyCounts;
use crate::suite::Suite;

pub fn legacy_suite() -> Suite<LegacyCounts> {
    Suite::<LegacyCounts>::new()
        .check("legacyPointCount", |counts| {
            legacy_count_status(
                counts.point_data_record_format,
                counts.legacy_point_count,
                counts.point_count,
            )
        })
        .check("legacyPointCountByReturn", |counts| {
            let format = counts.point_data_record_format;
            let per_return: Vec<Status> = counts
                .legacy_point_count_by_return
                .iter()
                .zip(counts.point_count_by_return)
                .map(|(&legacy, wide)| legacy_count_status(format, legacy, wide))
                .collect();

            let worst = per_return
                .iter()
                .map(|s| s.status)
                .max()
                .unwrap_or(CheckStatus::Pass);
            if worst == CheckStatus::Pass {
                return Status::pass();
            }

            let offending: Vec<String> = per_return
                .iter()
                .enumerate()
                .filter(|(_, s)| s.status == worst)
                .map(|(i, _)| (i + 1).to_string())
                .collect();
            Status {
                status: worst,
                info: Some(format!(
                    "Legacy point count by return mismatched for returns: [ {} ]",
                    offending.join(", ")
                )),
            }
        })
}

/// Compare a legacy 32-bit count with its 64-bit counterpart.
///
/// Formats 6 and up are not legacy compatible, so the legacy field should be
/// 0; a copy of the 64-bit count is tolerated with a warning. Older formats
/// must carry the 64-bit count, or 0 when it does not fit.
pub fn legacy_count_status(format: u8, legacy: u32, wide: u64) -> Status {
    if format >= 6 {
        if legacy == 0 {
            Status::pass()
        } else if legacy as u64 == wide {
            Status::warn(format!(
                "Legacy count {} is populated for non-legacy format {}",
                legacy, format
            ))
        } else {
            Status::fail(format!(
                "Legacy count {} should be 0 for format {} (count is {})",
                legacy, format, wide
            ))
        }
    } else {
        let expected = u32::try_from(wide).unwrap_or(0);
        if legacy == expected {
            Status::pass()
        } else {
            Status::fail(format!("Legacy count {}, expected {}", legacy, expected))
        }
    }
}
