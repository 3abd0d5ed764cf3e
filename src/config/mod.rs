//! Configuration module for Sumi-Trawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sumi_trawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("trawl.toml")).unwrap();
//! let request = config.to_request();
//! println!("Crawling {} to depth {}", request.url, request.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ChunkingConfig, ClientConfig, Config, CrawlConfig, ExtractionConfig, FetchConfig,
    OutputConfig, RetryConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
