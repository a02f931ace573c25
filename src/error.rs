use thiserror::Error;

/// Main application error type that encompasses all possible failure modes
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status error: {status} for {url} - {message}")]
    HttpStatus {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Request timeout: {url} after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error(
        "Requested bytes {begin}..{end} of {source_name} but it is only {length} bytes long"
    )]
    OutOfRange {
        source_name: String,
        begin: u64,
        end: u64,
        length: u64,
    },

    #[error("Invalid source: {source_name} - {reason}")]
    InvalidSource { source_name: String, reason: String },

    #[error("LAS decode error: {0}")]
    Las(#[from] LasError),

    #[error("COPC decode error: {0}")]
    Copc(#[from] CopcError),

    #[error("Check failed to evaluate: {0}")]
    Check(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },
}

/// LAS header, VLR and point record decode errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LasError {
    #[error("Invalid file signature: expected \"LASF\", found {found:?}")]
    InvalidSignature { found: String },

    #[error("Unsupported LAS version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("Header too short: {length} bytes, at least {minimum} required")]
    HeaderTooShort { length: usize, minimum: usize },

    #[error("Invalid VLR at offset {offset}: {details}")]
    InvalidVlr { offset: u64, details: String },

    #[error("Unsupported point data record format {format}")]
    UnsupportedPointFormat { format: u8 },

    #[error("Point record too short: {length} bytes, format {format} needs {minimum}")]
    PointRecordTooShort {
        format: u8,
        length: usize,
        minimum: usize,
    },
}

/// COPC-specific decode errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CopcError {
    #[error("Missing copc info VLR")]
    MissingInfo,

    #[error("Invalid copc info VLR: expected 160 bytes, found {length}")]
    InvalidInfoLength { length: usize },

    #[error("Missing copc hierarchy VLR")]
    MissingHierarchy,

    #[error("Invalid hierarchy page at offset {offset}: {details}")]
    InvalidHierarchyPage { offset: u64, details: String },

    #[error("Invalid hierarchy entry {key}: {details}")]
    InvalidHierarchyEntry { key: String, details: String },

    #[error("LAZ error: {0}")]
    Laz(String),

    #[error("Node {key} data is invalid: {details}")]
    InvalidNodeData { key: String, details: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ValidationError>;

/// LAS decode result type alias
pub type LasResult<T> = std::result::Result<T, LasError>;
