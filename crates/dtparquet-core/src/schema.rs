//! Building the Arrow schema written for a host dataset, and reading the
//! engine's annotations back out of a file's schema.
//!
//! Per-field metadata carries two keys:
//!
//! - [`LABEL_KEY`]: the column's label, when non-empty.
//! - [`TYPE_KEY`]: the declared storage type of text columns. Both `strN`
//!   and `strL` are written as plain UTF-8, so without it a fixed width
//!   could not be recovered on load.
//!
//! The schema-level [`METADATA_KEY`] holds the encoded metadata document.
//! With label preservation off none of these keys are written at all.
use std::collections::HashMap;

use arrow::datatypes::{Field, Schema};

use crate::{
    host::Column,
    metadata::{DatasetMetadataDocument, METADATA_KEY, MetadataError},
    types::{StorageType, to_physical},
};

/// Field-level key holding the column label.
pub const LABEL_KEY: &str = "stata.label";

/// Field-level key holding the declared storage type of text columns.
pub const TYPE_KEY: &str = "stata.type";

fn field_for(column: &Column, preserve_labels: bool) -> Field {
    let field = Field::new(&column.name, to_physical(column.storage).to_arrow(), true);
    if !preserve_labels {
        return field;
    }

    let mut meta = HashMap::new();
    if !column.label.is_empty() {
        meta.insert(LABEL_KEY.to_string(), column.label.clone());
    }
    if column.storage.is_text() {
        meta.insert(TYPE_KEY.to_string(), column.storage.to_string());
    }
    field.with_metadata(meta)
}

/// One nullable field per column, in catalogue order.
pub fn build_schema(columns: &[Column], preserve_labels: bool) -> Schema {
    Schema::new(
        columns
            .iter()
            .map(|c| field_for(c, preserve_labels))
            .collect::<Vec<_>>(),
    )
}

/// Embed `document` under [`METADATA_KEY`].
pub fn attach_document(
    schema: Schema,
    document: &DatasetMetadataDocument,
) -> Result<Schema, MetadataError> {
    let json = document.to_json()?;
    let mut meta = schema.metadata().clone();
    meta.insert(METADATA_KEY.to_string(), json);
    Ok(schema.with_metadata(meta))
}

/// The encoded metadata document, if the schema carries one.
pub fn document_json(schema: &Schema) -> Option<&str> {
    schema.metadata().get(METADATA_KEY).map(String::as_str)
}

/// The label annotation of `field`, if any.
pub fn field_label(field: &Field) -> Option<&str> {
    field
        .metadata()
        .get(LABEL_KEY)
        .map(String::as_str)
        .filter(|l| !l.is_empty())
}

/// The storage type annotation of `field`, parsed leniently.
pub fn field_storage_type(field: &Field) -> Option<StorageType> {
    field
        .metadata()
        .get(TYPE_KEY)
        .filter(|t| !t.is_empty())
        .map(|t| StorageType::parse_lenient(t))
}

/// Whether the file was written by this engine.
///
/// A schema is native when it carries the metadata document or any field
/// carries a storage type annotation.
pub fn is_native(schema: &Schema) -> bool {
    document_json(schema).is_some()
        || schema
            .fields()
            .iter()
            .any(|f| f.metadata().contains_key(TYPE_KEY))
}
