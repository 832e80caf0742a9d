//! Data Vista schema sources
//!
//! Where table allow-lists come from, and how long they are trusted.
//!
//! - [`SchemaSource`] resolves the allowed tables for one data source
//! - [`TtlCache`] keeps values until their expiry, measured by an injected [`Clock`]
//! - [`CachedSchemaSource`] puts the two together

pub mod cache;
pub mod source;

pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use source::{CachedSchemaSource, SchemaSource, StaticSchemaSource};
