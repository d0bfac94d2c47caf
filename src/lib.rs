pub mod app;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod domain;
pub mod downloader;
pub mod error;
pub mod fs_util;
pub mod ledger;
pub mod output;
pub mod parser;
