use std::fmt;
use std::str::FromStr;

use crate::error::FetchError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductQuery(String);

impl ProductQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProductQuery {
    type Err = FetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(FetchError::InvalidQuery(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    Frt,
    Hrl,
    Hrs,
}

impl Instrument {
    pub const ALL: [Instrument; 3] = [Instrument::Frt, Instrument::Hrl, Instrument::Hrs];

    pub fn code(self) -> &'static str {
        match self {
            Instrument::Frt => "frt",
            Instrument::Hrl => "hrl",
            Instrument::Hrs => "hrs",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code().to_uppercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductType {
    Data,
    Ddr,
}

impl ProductType {
    pub fn dir_name(self) -> &'static str {
        match self {
            ProductType::Data => "DATA",
            ProductType::Ddr => "DDR",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub filename: String,
}

impl DownloadTask {
    pub fn from_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            filename: filename_from_url(url).to_string(),
        }
    }
}

// Query strings and fragments are not part of the stored name.
pub fn filename_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_query_trims() {
        let query: ProductQuery = "  frt0000*  ".parse().unwrap();
        assert_eq!(query.as_str(), "frt0000*");
    }

    #[test]
    fn parse_query_empty() {
        let err = "   ".parse::<ProductQuery>().unwrap_err();
        assert_matches!(err, FetchError::InvalidQuery(_));
    }

    #[test]
    fn filename_is_last_segment() {
        let url = "https://pds.example.org/mro/crism/trdr/FRT00009876_07_IF123_TRR3.IMG";
        assert_eq!(filename_from_url(url), "FRT00009876_07_IF123_TRR3.IMG");
        assert_eq!(
            filename_from_url("https://host/a/b/file.lbl?token=1#frag"),
            "file.lbl"
        );
    }

    #[test]
    fn task_from_url() {
        let task = DownloadTask::from_url("https://host/dir/HRL000123_DE45_DDR1.LBL");
        assert_eq!(task.filename, "HRL000123_DE45_DDR1.LBL");
        assert_eq!(task.url, "https://host/dir/HRL000123_DE45_DDR1.LBL");
    }
}
