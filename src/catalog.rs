use std::io::Write;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::ProductQuery;
use crate::error::FetchError;

pub const DEFAULT_ENDPOINT: &str = "https://oderest.rsl.wustl.edu/live2/default.aspx";

pub trait CatalogClient: Send + Sync {
    fn query(&self, query: &ProductQuery) -> Result<Value, FetchError>;
}

pub trait ProductFileClient: Send + Sync {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError>;
}

#[derive(Clone)]
pub struct OdeHttpClient {
    client: Client,
    endpoint: String,
}

impl OdeHttpClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("planetary-fetch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| FetchError::CatalogUnavailable(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::CatalogUnavailable(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    // The pattern goes in as-is; the URL parser escapes what it must.
    pub fn request_url(endpoint: &str, query: &ProductQuery) -> String {
        format!(
            "{endpoint}?query=product&results=copmf&output=json&pdsid={}",
            query.as_str()
        )
    }
}

impl CatalogClient for OdeHttpClient {
    fn query(&self, query: &ProductQuery) -> Result<Value, FetchError> {
        let url = Self::request_url(&self.endpoint, query);
        info!(%url, "querying catalog");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| FetchError::CatalogUnavailable(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "catalog request failed".to_string());
            return Err(FetchError::CatalogUnavailable(format!(
                "status {status}: {message}"
            )));
        }
        response
            .json()
            .map_err(|err| FetchError::CatalogUnavailable(err.to_string()))
    }
}

impl ProductFileClient for OdeHttpClient {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
        debug!(url, "fetching file");
        let mut response = self.client.get(url).send().map_err(|err| FetchError::DownloadHttp {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(FetchError::DownloadStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        std::io::copy(&mut response, sink).map_err(|err| FetchError::DownloadHttp {
            url: url.to_string(),
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_url_substitutes_pattern() {
        let query: ProductQuery = "frt0000*_07_if*".parse().unwrap();
        assert_eq!(
            OdeHttpClient::request_url(DEFAULT_ENDPOINT, &query),
            "https://oderest.rsl.wustl.edu/live2/default.aspx?query=product&results=copmf&output=json&pdsid=frt0000*_07_if*"
        );
    }
}
