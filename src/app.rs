use std::fs;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{CatalogClient, ProductFileClient};
use crate::domain::ProductQuery;
use crate::downloader::{CancelToken, DownloadReport, Downloader};
use crate::error::FetchError;
use crate::ledger::{LedgerUpdate, MetadataLedger, merge_ledger};
use crate::parser::parse_response;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: Utf8PathBuf,
    pub max_workers: usize,
    pub cancel: CancelToken,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchSummary {
    pub query: String,
    pub output_dir: String,
    pub products: usize,
    pub urls: usize,
    pub ledger: Option<LedgerUpdate>,
    pub downloads: DownloadReport,
}

impl FetchSummary {
    pub fn completed(&self) -> usize {
        self.downloads.attempted
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Clone)]
pub struct App<C: CatalogClient, F: ProductFileClient> {
    catalog: C,
    files: F,
}

impl<C: CatalogClient, F: ProductFileClient> App<C, F> {
    pub fn new(catalog: C, files: F) -> Self {
        Self { catalog, files }
    }

    pub fn run(
        &self,
        query: &ProductQuery,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchSummary, FetchError> {
        info!(
            %query,
            max_workers = options.max_workers,
            output_dir = %options.output_dir,
            "starting"
        );
        let downloader = Downloader::new(&self.files, &options.output_dir, options.max_workers)?
            .with_cancel(options.cancel.clone());
        let mut summary = FetchSummary {
            query: query.to_string(),
            output_dir: options.output_dir.to_string(),
            products: 0,
            urls: 0,
            ledger: None,
            downloads: DownloadReport::default(),
        };

        sink.event(ProgressEvent {
            message: format!("phase=Resolve; querying catalog for {query}"),
            elapsed: None,
        });
        let response = self.catalog.query(query)?;
        let listing = match parse_response(&response) {
            Ok(listing) => listing,
            Err(FetchError::NoProductFound) => {
                info!(%query, "No product found");
                return Ok(summary);
            }
            Err(err) => return Err(err),
        };
        summary.products = listing.records.len();
        summary.urls = listing.urls.len();
        if options.cancel.is_cancelled() {
            warn!(%query, "interrupted before saving metadata");
            return Err(FetchError::Interrupted);
        }

        sink.event(ProgressEvent {
            message: "phase=Store; saving metadata".to_string(),
            elapsed: None,
        });
        fs::create_dir_all(options.output_dir.as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        let ledger_path = MetadataLedger::path_in(&options.output_dir);
        summary.ledger = Some(merge_ledger(&ledger_path, listing.records)?);

        sink.event(ProgressEvent {
            message: format!("phase=Fetch; {} files listed", listing.urls.len()),
            elapsed: None,
        });
        summary.downloads = downloader.download(&listing.urls, sink);
        info!(
            downloaded = summary.downloads.downloaded,
            failed = summary.downloads.failed,
            already_present = summary.downloads.already_present,
            rejected = summary.downloads.rejected,
            "Total number of downloaded files : {}",
            summary.downloads.downloaded
        );
        if summary.downloads.interrupted {
            return Err(FetchError::Interrupted);
        }
        Ok(summary)
    }
}
