//! # copc-validator Library
//!
//! Validates point-cloud files against the Cloud-Optimized Point Cloud (COPC)
//! specification. A file is decoded as COPC when possible, as plain LAS when
//! not, and by hand when even that fails; every stage produces a report of
//! independent pass/warn/fail checks.

pub mod cascade;
pub mod check;
pub mod cli;
pub mod config;
pub mod copc;
pub mod error;
pub mod fallback;
pub mod getter;
pub mod http_client;
pub mod las;
pub mod output;
pub mod report;
pub mod scanner;
pub mod suite;
pub mod suites;
pub mod validator;

pub use cascade::{Cascade, LAS_FALLBACK_MESSAGE, Stage};
pub use check::{Check, CheckStatus, Status};
pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager};
pub use copc::{Copc, CopcInfo, Hierarchy, Node, VoxelKey};
pub use error::{CopcError, LasError, Result, ValidationError};
pub use getter::{FileGetter, Getter, MemoryGetter, SharedGetter, create_getter};
pub use http_client::{HttpGetter, HttpGetterConfig};
pub use las::{Header, Las, Vlr};
pub use output::Output;
pub use report::{CheckCounts, Classification, ParsedMetadata, Report, ScanInfo};
pub use scanner::{
    NodeScanner, ProgressCallback, ProgressUnit, ScanMode, ScanOptions, ScanProgress,
};
pub use suite::{Collection, Suite, invoke_collection};
pub use validator::{ValidationConfig, ValidationEngine};
