//! Eurostat CLI Library
//!
//! Fetches Eurostat JSON-stat datasets through a time-bounded disk cache and
//! decodes them into per-indicator time series.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod decode;
pub mod export;
pub mod filter;
pub mod query;
pub mod service;

#[cfg(test)]
mod test_support;
