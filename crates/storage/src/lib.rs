//! Table providers feeding the tdf execution engine.
//!
//! Architecture role:
//! - defines the [`TableProvider`] contract the scan operator drives
//! - implements the bounded partition fan-out shared by providers
//! - ships a parquet file provider and a versioned in-memory provider
//!
//! Key modules:
//! - [`provider`]
//! - [`fanout`]
//! - [`parquet_provider`]
//! - [`memory_provider`]

pub mod fanout;
pub mod memory_provider;
pub mod parquet_provider;
pub mod provider;

pub use memory_provider::MemTableProvider;
pub use parquet_provider::ParquetTableProvider;
pub use provider::*;
