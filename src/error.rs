use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("invalid product id pattern: {0:?}")]
    InvalidQuery(String),

    #[error("max workers must be a positive integer, got {0}")]
    InvalidWorkerCount(usize),

    #[error("catalog request failed: {0}")]
    #[diagnostic(help("check the network connection or the catalog endpoint"))]
    CatalogUnavailable(String),

    #[error("malformed catalog response: {0}")]
    MalformedResponse(String),

    #[error("no product found")]
    NoProductFound,

    #[error("{0}: only FRT, HRL and HRS are implemented")]
    UnknownInstrument(String),

    #[error("{0}: unrecognized observation id")]
    UnrecognizedObservationId(String),

    #[error("{0}: does not match any product type")]
    UnmatchedProductType(String),

    #[error("download of {url} failed: {message}")]
    DownloadHttp { url: String, message: String },

    #[error("download of {url} returned status {status}")]
    DownloadStatus { url: String, status: u16 },

    #[error("failed to read metadata ledger at {0}")]
    LedgerRead(PathBuf),

    #[error("failed to parse metadata ledger: {0}")]
    #[diagnostic(help("the ledger must be a JSON array; fix or move it before re-running"))]
    LedgerParse(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("interrupted before all files were downloaded")]
    #[diagnostic(help("re-run the same command to resume; finished files are kept"))]
    Interrupted,
}
