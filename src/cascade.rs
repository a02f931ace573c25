//! Diagnostic cascade
//!
//! Decide what a file is and which rules apply, even when decoding fails
//! partway through:
//! 1. decode as COPC and run every suite, point data included
//! 2. otherwise decode as plain LAS and run the header and VLR suites
//! 3. otherwise parse the header region by hand and run what still applies
//!
//! Each stage ends in a [`Report`]; only a source that cannot be opened at all
//! is an error, and that is raised before the cascade starts.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};

use crate::check::Check;
use crate::copc::Copc;
use crate::getter::SharedGetter;
use crate::las::Las;
use crate::report::{Classification, ParsedMetadata, Report, ScanInfo};
use crate::scanner::{NodeScanner, ScanOptions, point_data_parser};
use crate::suite::{Collection, invoke_collection};
use crate::suites::{
    VlrSet, header_suite, legacy_parser, manual_header_parser, raw_vlr_parser, vlr_suite,
};

/// `error` of reports for files that decode as LAS but not as COPC
pub const LAS_FALLBACK_MESSAGE: &str = "not a valid COPC file, validated as LAS";

/// Outcome of the decode stages, before any rule has run
pub enum Stage {
    Copc(Box<Copc>),
    Las {
        las: Las,
        copc_error: String,
    },
    Unknown {
        las_error: String,
        copc_error: String,
    },
}

impl Stage {
    /// Try COPC, then LAS; never fails
    pub async fn detect(getter: &SharedGetter) -> Self {
        let copc_error = match Copc::read(getter.as_ref()).await {
            Ok(copc) => return Stage::Copc(Box::new(copc)),
            Err(error) => error.to_string(),
        };
        debug!("COPC decode failed: {}", copc_error);

        match Las::read(getter.as_ref()).await {
            Ok(las) => Stage::Las { las, copc_error },
            Err(error) => {
                let las_error = error.to_string();
                debug!("LAS decode failed: {}", las_error);
                Stage::Unknown {
                    las_error,
                    copc_error,
                }
            }
        }
    }

    pub fn classification(&self) -> Classification {
        match self {
            Stage::Copc(_) => Classification::Copc,
            Stage::Las { .. } => Classification::Las,
            Stage::Unknown { .. } => Classification::Unknown,
        }
    }
}

/// Runs the cascade over one source
pub struct Cascade {
    getter: SharedGetter,
    options: ScanOptions,
    mini: bool,
}

impl Cascade {
    pub fn new(getter: SharedGetter, options: ScanOptions, mini: bool) -> Self {
        Self {
            getter,
            options,
            mini,
        }
    }

    pub async fn run(self, name: impl Into<String>) -> Report {
        let name = name.into();
        let start = Utc::now();
        let timer = Instant::now();

        let stage = Stage::detect(&self.getter).await;
        let classification = stage.classification();
        debug!("{} classified as {}", name, classification);

        let (checks, error, copc_error, parsed_metadata) = self.validate(stage).await;

        let report = Report {
            name,
            scan: ScanInfo {
                classification,
                mode: self.options.mode,
                start,
                end: Utc::now(),
                duration_ms: timer.elapsed().as_millis() as u64,
            },
            checks,
            error,
            copc_error,
            parsed_metadata: if self.mini { None } else { parsed_metadata },
        };

        let counts = report.counts();
        info!(
            "{}: {} ({} pass, {} warn, {} fail)",
            report.name, classification, counts.pass, counts.warn, counts.fail
        );
        report
    }

    async fn validate(
        &self,
        stage: Stage,
    ) -> (
        Vec<Check>,
        Option<String>,
        Option<String>,
        Option<ParsedMetadata>,
    ) {
        let getter = &self.getter;
        match stage {
            Stage::Copc(copc) => {
                let collection = Collection::new()
                    .suite(header_suite().with_source(copc.header.clone()))
                    .suite(vlr_suite().with_source(VlrSet {
                        getter: Arc::clone(getter),
                        vlrs: copc.vlrs.clone(),
                    }))
                    .parser(legacy_parser(Arc::clone(getter)))
                    .parser(raw_vlr_parser(Arc::clone(getter)))
                    .parser(point_data_parser(NodeScanner::new(
                        Arc::clone(getter),
                        &copc,
                        self.options.clone(),
                    )));
                let checks = invoke_collection(collection).await;
                let Copc {
                    header, vlrs, info, ..
                } = *copc;
                (
                    checks,
                    None,
                    None,
                    Some(ParsedMetadata::Copc { header, vlrs, info }),
                )
            }
            Stage::Las { las, copc_error } => {
                let collection = Collection::new()
                    .suite(header_suite().with_source(las.header.clone()))
                    .suite(vlr_suite().with_source(VlrSet {
                        getter: Arc::clone(getter),
                        vlrs: las.vlrs.clone(),
                    }))
                    .parser(legacy_parser(Arc::clone(getter)))
                    .parser(raw_vlr_parser(Arc::clone(getter)));
                let checks = invoke_collection(collection).await;
                let Las { header, vlrs } = las;
                (
                    checks,
                    Some(LAS_FALLBACK_MESSAGE.to_string()),
                    Some(copc_error),
                    Some(ParsedMetadata::Las { header, vlrs }),
                )
            }
            Stage::Unknown {
                las_error,
                copc_error,
            } => {
                let collection = Collection::new()
                    .parser(manual_header_parser(Arc::clone(getter)))
                    .parser(raw_vlr_parser(Arc::clone(getter)));
                let checks = invoke_collection(collection).await;
                let copc_error = (copc_error != las_error).then_some(copc_error);
                (checks, Some(las_error), copc_error, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckStatus;
    use crate::getter::MemoryGetter;
    use crate::las::header::tests::las14_header_bytes;

    fn getter(bytes: Vec<u8>) -> SharedGetter {
        Arc::new(MemoryGetter::new("cascade", bytes))
    }

    #[tokio::test]
    async fn test_plain_las_is_classified_las() {
        let report = Cascade::new(getter(las14_header_bytes()), ScanOptions::default(), false)
            .run("plain.las")
            .await;

        assert_eq!(report.scan.classification, Classification::Las);
        assert_eq!(report.error.as_deref(), Some(LAS_FALLBACK_MESSAGE));
        assert!(report.copc_error.as_deref().unwrap().contains("Missing copc info VLR"));
        assert!(matches!(report.parsed_metadata, Some(ParsedMetadata::Las { .. })));
        assert_eq!(report.check("copc-info").unwrap().status, CheckStatus::Fail);
        assert!(report.check("rgb").is_none());
    }

    #[tokio::test]
    async fn test_truncated_file_is_unknown() {
        let mut bytes = las14_header_bytes();
        bytes.truncate(100);
        let report = Cascade::new(getter(bytes), ScanOptions::default(), false)
            .run("truncated.las")
            .await;

        assert_eq!(report.scan.classification, Classification::Unknown);
        assert!(report.copc_error.is_none());
        assert!(report.error.as_deref().unwrap().contains("only 100 bytes long"));
        assert!(report.parsed_metadata.is_none());
        let ids: Vec<&str> = report.checks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "parser 0: failed to read source",
                "parser 1: failed to read source"
            ]
        );
    }

    #[tokio::test]
    async fn test_bad_signature_runs_manual_suite() {
        let mut bytes = las14_header_bytes();
        bytes[0..4].copy_from_slice(b"LASX");
        let report = Cascade::new(getter(bytes), ScanOptions::default(), true)
            .run("bad.las")
            .await;

        assert_eq!(report.scan.classification, Classification::Unknown);
        assert!(report.error.as_deref().unwrap().contains("Invalid file signature"));
        assert_eq!(report.check("fileSignature").unwrap().status, CheckStatus::Fail);
        assert_eq!(report.check("minorVersion").unwrap().status, CheckStatus::Pass);
        assert_eq!(report.check("vlrCount").unwrap().status, CheckStatus::Pass);
    }

    #[tokio::test]
    async fn test_empty_source_is_unknown() {
        let report = Cascade::new(getter(Vec::new()), ScanOptions::default(), false)
            .run("empty.laz")
            .await;
        assert_eq!(report.scan.classification, Classification::Unknown);
        assert!(report.has_failures());
    }
}
