//! Core engine for moving statistical host datasets through Parquet.
//!
//! The engine writes the host's current dataset to a Parquet file and reads
//! it back without losing what Parquet does not model natively: column
//! labels, the declared width of text columns, notes and value labels kept
//! in the host's auxiliary frames, and the host's missing-value sentinel.
//!
//! - [`host`]: the [`Host`](host::Host) trait the engine drives, plus an
//!   in-memory implementation.
//! - [`types`]: storage and physical types and the mapping between them.
//! - [`metadata`]: the versioned metadata document and the codec that moves
//!   it in and out of the auxiliary frames.
//! - [`schema`]: Arrow schema construction and field annotations.
//! - [`transfer`]: the chunked export and import streams.
//! - [`storage`]: staged writes, atomic commit and the orphan sweep.
//! - [`options`]: caller-facing configuration.
//!
//! Higher-level callers are expected to go through the `dtparquet` facade
//! crate rather than these module paths.
#![deny(missing_docs)]
pub mod host;
pub mod metadata;
pub mod options;
pub mod schema;
pub mod storage;
pub mod transfer;
pub mod types;
