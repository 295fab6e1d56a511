//! Configuration module for flathunt
//!
//! Handles loading, parsing, and validating TOML configuration files.

mod parser;
mod types;
mod validation;

pub use types::{
    BackendsConfig, Config, DirectBackendConfig, ManagedBackendConfig, OutputConfig,
    RateLimitConfig, RetryConfig, SearchConfig, SeedEntry,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
