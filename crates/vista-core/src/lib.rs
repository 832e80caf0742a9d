//! # vista-core
//!
//! Configuration types shared across all Data Vista crates.

pub mod config;

pub use config::{
    ConfigError, ExecutionConfig, GuardConfig, LimitPolicy, SchemaCacheConfig, SqlDialect,
    UpstreamConfig, VistaConfig,
};
