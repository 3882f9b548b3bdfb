//! Storage and physical type definitions, and the mapping between them.
//!
//! The host declares a *storage type* per column (`byte`, `int`, `long`,
//! `float`, `double`, `strN`, `strL`). Parquet files are written through
//! Arrow, so the file side is described by a small [`PhysicalType`]
//! classification of Arrow data types.
//!
//! - [`to_physical`] is total and deterministic: every storage type has one
//!   physical type.
//! - [`from_physical`] is lossy and policy-driven. Anything the engine does
//!   not recognize becomes `strL` instead of failing, so files from
//!   producers we have never seen can still be loaded.
use std::{fmt, str::FromStr};

use arrow::datatypes::{DataType, TimeUnit};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Widest fixed-width text column the host supports.
pub const MAX_STR_WIDTH: u16 = 2045;

/// Per-column storage type as declared by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StorageType {
    /// 1-byte signed integer.
    Byte,
    /// 2-byte signed integer.
    Int,
    /// 4-byte signed integer.
    Long,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Fixed-width text of the given width (1..=[`MAX_STR_WIDTH`]).
    Str(u16),
    /// Variable-length text.
    StrL,
}

/// Error returned when a storage type name cannot be parsed strictly.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
pub enum ParseStorageTypeError {
    /// The name is not one of the host's storage type names.
    #[snafu(display("Unknown storage type {name:?}"))]
    UnknownName {
        /// The name that failed to parse.
        name: String,
    },

    /// A `strN` name carried a width outside 1..=2045.
    #[snafu(display("Invalid text width in {name:?} (expected 1..={MAX_STR_WIDTH})"))]
    InvalidWidth {
        /// The name that failed to parse.
        name: String,
    },
}

impl StorageType {
    /// True for both fixed-width and variable-length text.
    pub fn is_text(self) -> bool {
        matches!(self, StorageType::Str(_) | StorageType::StrL)
    }

    /// Parse a storage type name the way annotations read from files are
    /// interpreted: a `strN` whose width is unusable becomes `str1` (clamped
    /// into range when numeric), and any other unknown name becomes `strL`.
    pub fn parse_lenient(name: &str) -> StorageType {
        if let Ok(t) = name.parse() {
            return t;
        }
        match name.strip_prefix("str") {
            Some(width) => match width.parse::<u32>() {
                Ok(w) => StorageType::Str(w.clamp(1, MAX_STR_WIDTH as u32) as u16),
                Err(_) => StorageType::Str(1),
            },
            None => StorageType::StrL,
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::Byte => write!(f, "byte"),
            StorageType::Int => write!(f, "int"),
            StorageType::Long => write!(f, "long"),
            StorageType::Float => write!(f, "float"),
            StorageType::Double => write!(f, "double"),
            StorageType::Str(width) => write!(f, "str{width}"),
            StorageType::StrL => write!(f, "strL"),
        }
    }
}

impl FromStr for StorageType {
    type Err = ParseStorageTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "byte" => Ok(StorageType::Byte),
            "int" => Ok(StorageType::Int),
            "long" => Ok(StorageType::Long),
            "float" => Ok(StorageType::Float),
            "double" => Ok(StorageType::Double),
            "strL" => Ok(StorageType::StrL),
            other => {
                let width = other
                    .strip_prefix("str")
                    .context(UnknownNameSnafu { name: other })?;
                let width: u16 = width
                    .parse()
                    .ok()
                    .context(UnknownNameSnafu { name: other })?;
                ensure!(
                    (1..=MAX_STR_WIDTH).contains(&width),
                    InvalidWidthSnafu { name: other }
                );
                Ok(StorageType::Str(width))
            }
        }
    }
}

impl TryFrom<String> for StorageType {
    type Error = ParseStorageTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StorageType> for String {
    fn from(value: StorageType) -> Self {
        value.to_string()
    }
}

/// Width of the index array of a dictionary-encoded column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexWidth {
    /// 8-bit signed indices.
    W8,
    /// 16-bit signed indices.
    W16,
    /// 32-bit signed indices.
    W32,
}

impl IndexWidth {
    fn to_arrow(self) -> DataType {
        match self {
            IndexWidth::W8 => DataType::Int8,
            IndexWidth::W16 => DataType::Int16,
            IndexWidth::W32 => DataType::Int32,
        }
    }
}

/// Classification of the Arrow types a Parquet column can surface as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicalType {
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// UTF-8 text (any Arrow string layout).
    Utf8,
    /// Raw bytes (any Arrow binary layout).
    Binary,
    /// Dictionary-encoded text with the given index width.
    Dictionary(IndexWidth),
    /// Days since 1970-01-01.
    Date,
    /// Timestamp since 1970-01-01 in the given unit.
    Timestamp(TimeUnit),
    /// Anything else; carried verbatim.
    Other(DataType),
}

impl PhysicalType {
    /// Classify an Arrow data type.
    pub fn from_arrow(data_type: &DataType) -> PhysicalType {
        match data_type {
            DataType::Int8 => PhysicalType::Int8,
            DataType::Int16 => PhysicalType::Int16,
            DataType::Int32 => PhysicalType::Int32,
            DataType::Int64 => PhysicalType::Int64,
            DataType::Float32 => PhysicalType::Float32,
            DataType::Float64 => PhysicalType::Float64,
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => PhysicalType::Utf8,
            DataType::Binary
            | DataType::LargeBinary
            | DataType::BinaryView
            | DataType::FixedSizeBinary(_) => PhysicalType::Binary,
            DataType::Dictionary(key, _) => match key.as_ref() {
                DataType::Int8 => PhysicalType::Dictionary(IndexWidth::W8),
                DataType::Int16 => PhysicalType::Dictionary(IndexWidth::W16),
                DataType::Int32 => PhysicalType::Dictionary(IndexWidth::W32),
                _ => PhysicalType::Other(data_type.clone()),
            },
            DataType::Date32 | DataType::Date64 => PhysicalType::Date,
            DataType::Timestamp(unit, _) => PhysicalType::Timestamp(*unit),
            other => PhysicalType::Other(other.clone()),
        }
    }

    /// The Arrow data type written for this physical type.
    pub fn to_arrow(&self) -> DataType {
        match self {
            PhysicalType::Int8 => DataType::Int8,
            PhysicalType::Int16 => DataType::Int16,
            PhysicalType::Int32 => DataType::Int32,
            PhysicalType::Int64 => DataType::Int64,
            PhysicalType::Float32 => DataType::Float32,
            PhysicalType::Float64 => DataType::Float64,
            PhysicalType::Utf8 => DataType::Utf8,
            PhysicalType::Binary => DataType::Binary,
            PhysicalType::Dictionary(width) => {
                DataType::Dictionary(Box::new(width.to_arrow()), Box::new(DataType::Utf8))
            }
            PhysicalType::Date => DataType::Date32,
            PhysicalType::Timestamp(unit) => DataType::Timestamp(*unit, None),
            PhysicalType::Other(dt) => dt.clone(),
        }
    }

    /// True for the temporal types that are epoch-shifted on foreign files.
    pub fn is_temporal(&self) -> bool {
        matches!(self, PhysicalType::Date | PhysicalType::Timestamp(_))
    }
}

/// How 64-bit integers are brought into the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WideIntegerPolicy {
    /// Load as `double` (exact only below 2^53).
    #[default]
    Numeric,
    /// Load as `strL`, keeping every digit.
    Text,
}

/// Knobs for the physical -> storage direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypePolicy {
    /// Handling of 64-bit integer columns.
    pub wide_integers: WideIntegerPolicy,
}

impl TypePolicy {
    /// Policy that loads 64-bit integers as text.
    pub fn wide_integers_as_text() -> Self {
        TypePolicy {
            wide_integers: WideIntegerPolicy::Text,
        }
    }
}

/// Map a host storage type to the physical type it is written as.
pub fn to_physical(storage: StorageType) -> PhysicalType {
    match storage {
        StorageType::Byte => PhysicalType::Int8,
        StorageType::Int => PhysicalType::Int16,
        StorageType::Long => PhysicalType::Int32,
        StorageType::Float => PhysicalType::Float32,
        StorageType::Double => PhysicalType::Float64,
        StorageType::Str(_) | StorageType::StrL => PhysicalType::Utf8,
    }
}

/// Infer the host storage type for a physical type.
///
/// Dictionary columns map through their index width; dates become `long`
/// and timestamps `double` since the host has no temporal storage.
pub fn from_physical(physical: &PhysicalType, policy: &TypePolicy) -> StorageType {
    match physical {
        PhysicalType::Int8 | PhysicalType::Dictionary(IndexWidth::W8) => StorageType::Byte,
        PhysicalType::Int16 | PhysicalType::Dictionary(IndexWidth::W16) => StorageType::Int,
        PhysicalType::Int32 | PhysicalType::Dictionary(IndexWidth::W32) => StorageType::Long,
        PhysicalType::Int64 => match policy.wide_integers {
            WideIntegerPolicy::Numeric => StorageType::Double,
            WideIntegerPolicy::Text => StorageType::StrL,
        },
        PhysicalType::Float32 => StorageType::Float,
        PhysicalType::Float64 => StorageType::Double,
        PhysicalType::Date => StorageType::Long,
        PhysicalType::Timestamp(_) => StorageType::Double,
        PhysicalType::Utf8 | PhysicalType::Binary | PhysicalType::Other(_) => StorageType::StrL,
    }
}
