//! Moving the metadata document in and out of the host's auxiliary frames.
//!
//! Both directions switch the host's current frame through
//! [`FrameGuard`], so the caller's frame is restored whatever happens.
//! Metadata is an enhancement on top of the raw data: extraction and
//! application swallow (and log) their failures, except for the reader
//! version guard, which is the one failure allowed to surface.
use std::collections::HashMap;

use log::{debug, warn};
use snafu::prelude::*;

use super::{
    DatasetMetadataDocument, FRAME_VARS, FrameSnapshot, HostSnafu, MetadataError,
    WELL_KNOWN_FRAMES,
};
use crate::{
    host::{FrameGuard, Host, fit_cell},
    types::StorageType,
};

/// Variable name -> storage type overrides recovered from `_dtvars`.
pub type TypeOverrides = HashMap<String, StorageType>;

fn snapshot_frame<H: Host + ?Sized>(
    host: &mut H,
    frame: &str,
) -> Result<Option<FrameSnapshot>, MetadataError> {
    let guard = FrameGuard::enter(host, frame).context(HostSnafu { frame })?;

    let nobs = guard.observation_count();
    if nobs == 0 {
        return Ok(None);
    }

    let columns = guard.columns().context(HostSnafu { frame })?;
    let sentinel = guard.missing_sentinel();
    let rows = guard
        .read_cells(0..columns.len(), 0..nobs)
        .context(HostSnafu { frame })?;

    let mut data: Vec<Vec<_>> = vec![Vec::with_capacity(nobs); columns.len()];
    for row in rows {
        for (col, cell) in data.iter_mut().zip(row) {
            col.push((!cell.is_missing(sentinel)).then_some(cell));
        }
    }

    Ok(Some(FrameSnapshot {
        colnames: columns.iter().map(|c| c.name.clone()).collect(),
        types: columns.iter().map(|c| c.storage).collect(),
        data,
    }))
}

/// Snapshot the well-known auxiliary frames.
///
/// Frames that are absent or empty are skipped. A frame that cannot be
/// read is skipped with a warning; this never fails.
pub fn extract<H: Host + ?Sized>(host: &mut H) -> DatasetMetadataDocument {
    let mut doc = DatasetMetadataDocument::default();
    for frame in WELL_KNOWN_FRAMES {
        if !host.has_frame(frame) {
            continue;
        }
        match snapshot_frame(host, frame) {
            Ok(Some(snapshot)) => {
                doc.frames.insert(frame.to_string(), snapshot);
            }
            Ok(None) => debug!("frame {frame} is empty; not carried"),
            Err(e) => warn!("skipping metadata frame {frame}: {e}"),
        }
    }
    doc
}

fn restore_frame<H: Host + ?Sized>(
    host: &mut H,
    frame: &str,
    snapshot: &FrameSnapshot,
) -> Result<(), MetadataError> {
    snapshot.validate(frame)?;

    if host.has_frame(frame) {
        host.drop_frame(frame).context(HostSnafu { frame })?;
    }
    host.create_frame(frame).context(HostSnafu { frame })?;

    let mut guard = FrameGuard::enter(host, frame).context(HostSnafu { frame })?;
    let nobs = snapshot.row_count();
    let sentinel = guard.missing_sentinel();
    guard.add_observations(nobs).context(HostSnafu { frame })?;

    for (i, ((name, storage), values)) in snapshot
        .colnames
        .iter()
        .zip(&snapshot.types)
        .zip(&snapshot.data)
        .enumerate()
    {
        guard.add_column(*storage, name).context(HostSnafu { frame })?;
        let cells = values
            .iter()
            .map(|v| fit_cell(v.clone(), *storage, sentinel))
            .collect();
        guard.write_cells(i, 0..nobs, cells).context(HostSnafu { frame })?;
    }
    Ok(())
}

/// Recreate every recognized frame of `doc` in the host, strictly.
///
/// Pre-existing frames of the same name are dropped first. Returns the type
/// overrides carried by the variable catalogue frame: each of its column
/// names paired with that column's storage type.
pub fn apply_document<H: Host + ?Sized>(
    host: &mut H,
    doc: &DatasetMetadataDocument,
) -> Result<TypeOverrides, MetadataError> {
    doc.check_version()?;

    let mut overrides = TypeOverrides::new();
    for (frame, snapshot) in &doc.frames {
        if !WELL_KNOWN_FRAMES.contains(&frame.as_str()) {
            warn!("ignoring unrecognized metadata frame {frame}");
            continue;
        }
        restore_frame(host, frame, snapshot)?;
        if frame == FRAME_VARS {
            overrides = snapshot
                .colnames
                .iter()
                .cloned()
                .zip(snapshot.types.iter().copied())
                .collect();
        }
    }
    Ok(overrides)
}

/// Decode `encoded` and recreate its frames in the host.
///
/// Absent input, undecodable input and host failures all yield empty
/// overrides (logged). Only [`MetadataError::VersionMismatch`] is returned
/// as an error.
pub fn apply<H: Host + ?Sized>(
    host: &mut H,
    encoded: Option<&str>,
) -> Result<TypeOverrides, MetadataError> {
    let Some(json) = encoded else {
        return Ok(TypeOverrides::new());
    };

    let outcome =
        DatasetMetadataDocument::from_json(json).and_then(|doc| apply_document(host, &doc));
    match outcome {
        Ok(overrides) => Ok(overrides),
        Err(e @ MetadataError::VersionMismatch { .. }) => Err(e),
        Err(e) => {
            warn!("metadata document not applied: {e}");
            Ok(TypeOverrides::new())
        }
    }
}
