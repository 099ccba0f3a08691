//! Configuration module for Evidence-Crawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use evidence_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawler.toml")).unwrap();
//! println!("Cache file: {}", config.cache.path.display());
//! ```

mod parser;
mod types;
mod validation;

pub use types::{CacheConfig, Config, CrawlerConfig, FetcherConfig, UserAgentConfig};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
