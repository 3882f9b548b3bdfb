//! The dataset metadata document carried in a file's schema metadata.
//!
//! Labels, notes and other host-side annotations live in four auxiliary
//! frames of the host (`_dtvars`, `_dtlabel`, `_dtnotes`, `_dtinfo`). On
//! export they are snapshotted column-major into a single JSON document
//! stored under [`METADATA_KEY`]; on import the document is decoded and the
//! frames are recreated.
//!
//! The document is versioned. Decoding is two-phase: a small version header
//! is read first and a document whose `min_reader_version` exceeds
//! [`READER_VERSION`] is rejected with [`MetadataError::VersionMismatch`]
//! before anything else is interpreted. Only after that is the full
//! structure decoded.
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "min_reader_version": 1,
//!   "frames": {
//!     "_dtnotes": {
//!       "colnames": ["varname", "note"],
//!       "types": ["str32", "strL"],
//!       "data": [["price"], ["Nominal, not inflation adjusted"]]
//!     }
//!   }
//! }
//! ```
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use snafu::prelude::*;

use crate::{
    host::{Cell, HostError},
    types::StorageType,
};

pub mod codec;

pub use codec::{TypeOverrides, apply, apply_document, extract};

/// Schema-level metadata key holding the encoded document.
pub const METADATA_KEY: &str = "dtparquet.dtmeta";

/// Version of the document layout this engine writes.
pub const SCHEMA_VERSION: u32 = 1;

/// Highest `min_reader_version` this engine can honor.
pub const READER_VERSION: u32 = 1;

/// Variable catalogue frame.
pub const FRAME_VARS: &str = "_dtvars";
/// Value-label catalogue frame.
pub const FRAME_LABELS: &str = "_dtlabel";
/// Notes frame.
pub const FRAME_NOTES: &str = "_dtnotes";
/// Dataset-info frame.
pub const FRAME_INFO: &str = "_dtinfo";

/// The recognized auxiliary frames, in extraction order.
pub const WELL_KNOWN_FRAMES: [&str; 4] = [FRAME_VARS, FRAME_LABELS, FRAME_NOTES, FRAME_INFO];

/// Errors from encoding, decoding or applying the metadata document.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MetadataError {
    /// The document requires a newer reader than this engine.
    #[snafu(display(
        "Metadata requires reader version {required}, this engine supports {supported}"
    ))]
    VersionMismatch {
        /// `min_reader_version` declared by the document.
        required: u32,
        /// [`READER_VERSION`].
        supported: u32,
    },

    /// The document is not valid JSON or does not have the expected shape.
    #[snafu(display("Failed to decode metadata document: {source}"))]
    Decode {
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The document could not be serialized.
    #[snafu(display("Failed to encode metadata document: {source}"))]
    Encode {
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// A frame snapshot has inconsistent column counts or lengths.
    #[snafu(display("Malformed frame {frame}: {detail}"))]
    MalformedFrame {
        /// Frame name.
        frame: String,
        /// What is inconsistent.
        detail: String,
    },

    /// The host rejected an operation while reading or restoring a frame.
    #[snafu(display("Host error in frame {frame}: {source}"))]
    Host {
        /// Frame being processed.
        frame: String,
        /// Underlying host error.
        source: HostError,
    },
}

fn lenient_types<'de, D>(deserializer: D) -> Result<Vec<StorageType>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Vec::<String>::deserialize(deserializer)?;
    Ok(names
        .iter()
        .map(|n| StorageType::parse_lenient(n))
        .collect())
}

/// Column-major snapshot of one auxiliary frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    /// Column names, in frame order.
    pub colnames: Vec<String>,
    /// Storage type per column.
    #[serde(deserialize_with = "lenient_types")]
    pub types: Vec<StorageType>,
    /// One vector of cells per column; `None` is a missing numeric value.
    pub data: Vec<Vec<Option<Cell>>>,
}

impl FrameSnapshot {
    /// Number of observations in the snapshot.
    pub fn row_count(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }

    /// Check that names, types and data columns line up.
    pub fn validate(&self, frame: &str) -> Result<(), MetadataError> {
        ensure!(
            self.colnames.len() == self.types.len() && self.types.len() == self.data.len(),
            MalformedFrameSnafu {
                frame,
                detail: format!(
                    "{} names, {} types, {} data columns",
                    self.colnames.len(),
                    self.types.len(),
                    self.data.len()
                ),
            }
        );
        let rows = self.row_count();
        if let Some((i, _)) = self
            .data
            .iter()
            .enumerate()
            .find(|(_, col)| col.len() != rows)
        {
            return MalformedFrameSnafu {
                frame,
                detail: format!("column {} has a different length", self.colnames[i]),
            }
            .fail();
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct VersionHeader {
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    #[serde(default)]
    min_reader_version: Option<u32>,
}

fn default_schema_version() -> u32 {
    1
}

/// The versioned metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadataDocument {
    /// Layout version the document was written with.
    pub schema_version: u32,
    /// Lowest reader version able to interpret the document.
    #[serde(default = "default_schema_version")]
    pub min_reader_version: u32,
    /// Snapshots keyed by frame name. Empty frames are never stored.
    #[serde(default)]
    pub frames: BTreeMap<String, FrameSnapshot>,
}

impl Default for DatasetMetadataDocument {
    fn default() -> Self {
        DatasetMetadataDocument {
            schema_version: SCHEMA_VERSION,
            min_reader_version: READER_VERSION,
            frames: BTreeMap::new(),
        }
    }
}

impl DatasetMetadataDocument {
    /// True when no frame is carried.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Reject documents that need a newer reader.
    pub fn check_version(&self) -> Result<(), MetadataError> {
        ensure_reader_version(self.min_reader_version)
    }

    /// Encode as compact JSON. Frames are keyed in sorted order, so equal
    /// documents always encode to identical bytes.
    pub fn to_json(&self) -> Result<String, MetadataError> {
        serde_json::to_string(self).context(EncodeSnafu)
    }

    /// Decode, enforcing the reader-version guard before the full decode.
    ///
    /// Documents written without `min_reader_version` are treated as
    /// requiring their `schema_version`.
    pub fn from_json(json: &str) -> Result<Self, MetadataError> {
        let header: VersionHeader = serde_json::from_str(json).context(DecodeSnafu)?;
        let required = header.min_reader_version.unwrap_or(header.schema_version);
        ensure_reader_version(required)?;

        let mut doc: DatasetMetadataDocument = serde_json::from_str(json).context(DecodeSnafu)?;
        doc.min_reader_version = required;
        Ok(doc)
    }
}

fn ensure_reader_version(required: u32) -> Result<(), MetadataError> {
    ensure!(
        required <= READER_VERSION,
        VersionMismatchSnafu {
            required,
            supported: READER_VERSION,
        }
    );
    Ok(())
}
