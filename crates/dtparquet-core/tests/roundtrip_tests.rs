#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{TestResult, add_notes, dir_entries, every_type_host, file_schema, snapshot};
use dtparquet_core::{
    host::{Cell, Column, Host, memory::MemoryHost},
    metadata::{DatasetMetadataDocument, FRAME_NOTES, METADATA_KEY},
    options::{ExportOptions, ImportOptions},
    schema::{LABEL_KEY, TYPE_KEY},
    transfer::{ExportStream, TransferError, export_dataset, import_dataset},
    types::StorageType,
};
use tempfile::TempDir;

#[test]
fn every_storage_type_round_trips() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("every.parquet");
    let mut source = every_type_host()?;
    export_dataset(&mut source, &path, &ExportOptions::default())?;

    let mut target = MemoryHost::new();
    let rows = import_dataset(&mut target, &path, &ImportOptions::default())?;

    assert_eq!(rows, 3);
    assert_eq!(snapshot(&target)?, snapshot(&source)?);
    Ok(())
}

#[test]
fn three_column_scenario_keeps_sentinel_width_and_label() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("scenario.parquet");

    let mut source = MemoryHost::new();
    let m = source.missing_sentinel();
    source.push_column(
        "id",
        StorageType::Int,
        "",
        vec![Cell::Num(1.0), Cell::Num(m), Cell::Num(3.0)],
    )?;
    source.push_column(
        "code",
        StorageType::Str(4),
        "",
        vec![
            Cell::Str("abcd".into()),
            Cell::Str("ef".into()),
            Cell::Str("g".into()),
        ],
    )?;
    source.push_column(
        "price",
        StorageType::Double,
        "Price (1978 dollars)",
        vec![Cell::Num(4099.0), Cell::Num(4749.0), Cell::Num(3799.0)],
    )?;
    export_dataset(&mut source, &path, &ExportOptions::default())?;

    let schema = file_schema(&path)?;
    assert_eq!(
        schema.field(1).metadata().get(TYPE_KEY).map(String::as_str),
        Some("str4")
    );
    assert_eq!(
        schema.field(2).metadata().get(LABEL_KEY).map(String::as_str),
        Some("Price (1978 dollars)")
    );

    let mut target = MemoryHost::new();
    import_dataset(&mut target, &path, &ImportOptions::default())?;

    assert_eq!(target.column_cells(0)?[1], Cell::Num(target.missing_sentinel()));
    assert_eq!(target.column_storage_type(1)?, StorageType::Str(4));
    assert_eq!(target.column_label(2)?, "Price (1978 dollars)");
    Ok(())
}

#[test]
fn repeated_export_is_byte_identical_and_leaves_no_temp_file() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("auto.parquet");
    let mut host = every_type_host()?;
    add_notes(&mut host)?;

    export_dataset(&mut host, &path, &ExportOptions::default())?;
    let first = std::fs::read(&path)?;
    export_dataset(&mut host, &path, &ExportOptions::default())?;
    let second = std::fs::read(&path)?;

    assert_eq!(first, second);
    assert_eq!(dir_entries(dir.path())?, vec!["auto.parquet".to_string()]);
    Ok(())
}

#[test]
fn disabling_labels_writes_no_metadata_at_all() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("bare.parquet");
    let mut host = every_type_host()?;
    add_notes(&mut host)?;

    export_dataset(
        &mut host,
        &path,
        &ExportOptions::default().preserve_labels(false),
    )?;

    let schema = file_schema(&path)?;
    assert!(schema.metadata().is_empty());
    assert!(schema.fields().iter().all(|f| f.metadata().is_empty()));

    let mut target = MemoryHost::new();
    import_dataset(&mut target, &path, &ImportOptions::default())?;
    assert_eq!(target.column_storage_type(5)?, StorageType::StrL);
    assert!(target.columns()?.iter().all(|c| c.label.is_empty()));
    assert!(!target.has_frame(FRAME_NOTES));
    Ok(())
}

#[test]
fn notes_frame_travels_with_the_file() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("notes.parquet");
    let mut host = every_type_host()?;
    add_notes(&mut host)?;
    export_dataset(&mut host, &path, &ExportOptions::default())?;

    let schema = file_schema(&path)?;
    let json = schema.metadata().get(METADATA_KEY).expect("document");
    let doc = DatasetMetadataDocument::from_json(json)?;
    assert_eq!(doc.frames.keys().collect::<Vec<_>>(), vec![FRAME_NOTES]);

    let mut target = MemoryHost::new();
    import_dataset(&mut target, &path, &ImportOptions::default())?;
    assert_eq!(target.current_frame(), MemoryHost::DEFAULT_FRAME);

    target.set_current_frame(FRAME_NOTES)?;
    assert_eq!(target.column_storage_type(0)?, StorageType::Str(8));
    assert_eq!(target.column_cells(1)?[0], Cell::Str("Collected in 1978".into()));
    Ok(())
}

#[test]
fn importing_without_labels_forces_labels_empty() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("labels.parquet");
    let mut host = every_type_host()?;
    add_notes(&mut host)?;
    export_dataset(&mut host, &path, &ExportOptions::default())?;

    let mut target = MemoryHost::new();
    import_dataset(
        &mut target,
        &path,
        &ImportOptions::default().preserve_labels(false),
    )?;
    assert!(target.columns()?.iter().all(|c| c.label.is_empty()));
    assert_eq!(target.column_storage_type(5)?, StorageType::Str(4));
    assert!(!target.has_frame(FRAME_NOTES));
    Ok(())
}

#[test]
fn chunk_size_does_not_change_the_result() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("chunks.parquet");

    let mut source = MemoryHost::new();
    let m = source.missing_sentinel();
    let n = 23;
    source.push_column(
        "k",
        StorageType::Long,
        "key",
        (0..n)
            .map(|i| if i % 5 == 0 { Cell::Num(m) } else { Cell::Num(f64::from(i)) })
            .collect(),
    )?;
    source.push_column(
        "s",
        StorageType::Str(6),
        "",
        (0..n).map(|i| Cell::Str(format!("row{i}"))).collect(),
    )?;
    export_dataset(
        &mut source,
        &path,
        &ExportOptions::default().chunk_size(4),
    )?;

    let mut states = Vec::new();
    for chunk in [1, 7, 50_000] {
        let mut target = MemoryHost::new();
        let rows = import_dataset(
            &mut target,
            &path,
            &ImportOptions::default().chunk_size(chunk),
        )?;
        assert_eq!(rows, n as usize);
        states.push(snapshot(&target)?);
    }

    assert_eq!(states[0], states[1]);
    assert_eq!(states[1], states[2]);
    assert_eq!(states[2], snapshot(&source)?);
    Ok(())
}

#[test]
fn import_replaces_existing_data_and_resizes() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("small.parquet");
    let mut source = MemoryHost::new();
    source.push_column("x", StorageType::Byte, "", vec![Cell::Num(1.0), Cell::Num(2.0)])?;
    export_dataset(&mut source, &path, &ExportOptions::default())?;

    let mut target = MemoryHost::new();
    target.push_column(
        "old",
        StorageType::Double,
        "",
        (0..10).map(|i| Cell::Num(f64::from(i))).collect(),
    )?;
    import_dataset(&mut target, &path, &ImportOptions::default())?;

    assert_eq!(target.observation_count(), 2);
    assert_eq!(target.columns()?, vec![Column::new("x", StorageType::Byte)]);
    Ok(())
}

#[test]
fn empty_dataset_produces_schema_only_file() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("empty.parquet");

    let mut source = MemoryHost::new();
    source.add_column(StorageType::Int, "a")?;
    source.add_column(StorageType::Str(3), "b")?;

    let mut stream = ExportStream::init(&path, ExportOptions::default())?;
    stream.finalize(&mut source)?;
    assert!(path.exists());

    let mut target = MemoryHost::new();
    let rows = import_dataset(&mut target, &path, &ImportOptions::default())?;
    assert_eq!(rows, 0);
    assert_eq!(target.observation_count(), 0);
    assert_eq!(
        target.columns()?,
        vec![
            Column::new("a", StorageType::Int),
            Column::new("b", StorageType::Str(3)),
        ]
    );
    Ok(())
}

#[test]
fn projection_keeps_file_order() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("proj.parquet");
    let mut source = every_type_host()?;
    export_dataset(&mut source, &path, &ExportOptions::default())?;

    let mut target = MemoryHost::new();
    import_dataset(
        &mut target,
        &path,
        &ImportOptions::default().columns(["s", "b"]),
    )?;

    let names: Vec<_> = target.columns()?.into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["b", "s"]);
    assert_eq!(target.column_storage_type(1)?, StorageType::Str(4));
    assert_eq!(target.column_label(0)?, "tiny");
    assert_eq!(target.column_cells(0)?, source.column_cells(0)?);
    Ok(())
}

#[test]
fn unknown_projected_column_leaves_host_alone() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("proj.parquet");
    let mut source = every_type_host()?;
    export_dataset(&mut source, &path, &ExportOptions::default())?;

    let mut target = every_type_host()?;
    let before = snapshot(&target)?;
    let err = import_dataset(
        &mut target,
        &path,
        &ImportOptions::default().columns(["b", "nope"]),
    )
    .expect_err("unknown column");

    assert!(matches!(err, TransferError::UnknownColumn { ref column, .. } if column == "nope"));
    assert_eq!(snapshot(&target)?, before);
    Ok(())
}

#[test]
fn zero_chunk_size_is_rejected_on_import() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("x.parquet");
    let mut source = every_type_host()?;
    export_dataset(&mut source, &path, &ExportOptions::default())?;

    let mut target = MemoryHost::new();
    let err = import_dataset(&mut target, &path, &ImportOptions::default().chunk_size(0))
        .expect_err("chunk size");
    assert!(matches!(err, TransferError::InvalidChunkSize));
    Ok(())
}
