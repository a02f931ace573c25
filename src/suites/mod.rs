//! Rule suites and the parsers that feed them

pub mod header;
pub mod legacy;
pub mod vlrs;

pub use header::{header_suite, manual_header_suite};
pub use legacy::legacy_suite;
pub use vlrs::{VlrSet, raw_vlr_suite, vlr_suite};

use crate::fallback::{LegacyCounts, ManualHeader, RawVlrWalk};
use crate::getter::SharedGetter;
use crate::suite::{Parser, parser};

/// Re-read the legacy count fields from raw header bytes
pub fn legacy_parser(getter: SharedGetter) -> Parser {
    parser(async move {
        let counts = LegacyCounts::read(getter.as_ref()).await?;
        Ok(legacy_suite().with_source(counts))
    })
}

/// Walk the VLR and EVLR chains byte by byte
pub fn raw_vlr_parser(getter: SharedGetter) -> Parser {
    parser(async move {
        let walk = RawVlrWalk::read(getter.as_ref()).await?;
        Ok(raw_vlr_suite().with_source(walk))
    })
}

/// Hand-parse the header region
pub fn manual_header_parser(getter: SharedGetter) -> Parser {
    parser(async move {
        let header = ManualHeader::read(getter.as_ref()).await?;
        Ok(manual_header_suite().with_source(header))
    })
}
