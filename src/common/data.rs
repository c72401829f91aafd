use std::{fs::File, io::{BufReader, BufWriter, Write}, path::Path};

use anyhow::{Context, Result};
use geo::MultiPolygon;
use polars::{frame::DataFrame, io::{SerReader, SerWriter}, prelude::{CsvReadOptions, CsvWriter}};
use serde::{Serialize, de::DeserializeOwned};
use shapefile::{Reader, dbase::{self, FieldValue}};
use tempfile::NamedTempFile;

use super::{ensure_dir_exists, polygon::shape_to_multipolygon};

/// Name dBase readers give the hidden deletion-flag column.
const DELETION_FLAG: &str = "DeletionFlag";

/// Geometry of one shapefile row plus its attribute values in column order.
pub(crate) type ShapeRow = (MultiPolygon<f64>, Vec<String>);

/// Reads all shapes + attribute rows from a given `.shp` file path.
/// Attribute values are rendered as trimmed text in the order of the dBase columns,
/// so callers can address them by base-zero column index.
pub(crate) fn read_shapefile(path: &Path) -> Result<Vec<ShapeRow>> {
    let dbf_path = path.with_extension("dbf");
    let fields = dbase::Reader::from_path(&dbf_path)
        .with_context(|| format!("Failed to open attribute table: {}", dbf_path.display()))?
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .filter(|name| name != DELETION_FLAG)
        .collect::<Vec<_>>();

    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {}", path.display()))?;

    let mut items = Vec::with_capacity(reader.shape_count()?);
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.context("Error reading shape+record")?;
        let values = fields.iter()
            .map(|field| record.get(field).and_then(field_to_string).unwrap_or_default())
            .collect();
        let geometry = shape_to_multipolygon(shape)
            .with_context(|| format!("Error converting shape in shapefile: {}", path.display()))?;
        items.push((geometry, values));
    }

    log::debug!("read {} rows ({} columns) from {}", items.len(), fields.len(), path.display());
    Ok(items)
}

/// Render a dBase field as text. Integral numbers lose their trailing `.0`.
fn field_to_string(value: &FieldValue) -> Option<String> {
    fn number(n: f64) -> String {
        if n.fract() == 0.0 && n.abs() < 1e15 { format!("{}", n as i64) } else { n.to_string() }
    }

    match value {
        FieldValue::Character(s) => s.as_ref().map(|s| s.trim().to_string()),
        FieldValue::Numeric(n) => n.map(number),
        FieldValue::Float(f) => f.map(|f| number(f as f64)),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Double(d) => Some(number(*d)),
        FieldValue::Currency(c) => Some(number(*c)),
        FieldValue::Logical(b) => b.map(|b| b.to_string()),
        FieldValue::Memo(m) => Some(m.trim().to_string()),
        _ => None,
    }
}

/// Reads a CSV file from `path` into a Polars DataFrame with every column kept as text.
pub(crate) fn read_csv_strings(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("[common::data] Failed to open CSV file: {}", path.display()))?;
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()
        .with_context(|| format!("[common::data] Failed to read CSV from {:?}", path))
}

/// Writes a DataFrame to a CSV file, replacing `path` only once the write has completed.
pub(crate) fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    write_atomic(path, |writer| {
        CsvWriter::new(writer)
            .finish(df)
            .with_context(|| format!("[common::data] Failed to write CSV to {:?}", path))
    })
}

/// Serializes `value` as pretty JSON, replacing `path` only once the write has completed.
pub fn write_json_atomic<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    write_atomic(path, |writer| {
        serde_json::to_writer_pretty(writer, value)
            .with_context(|| format!("[common::data] Failed to write JSON to {:?}", path))
    })
}

/// Reads a JSON file into any deserializable structure.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .with_context(|| format!("Failed to read JSON file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Write through a temporary file in the destination directory, then rename it into place.
fn write_atomic(path: &Path, write: impl FnOnce(&mut BufWriter<&mut File>) -> Result<()>) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir_exists(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(path)
        .with_context(|| format!("Failed to move output into place at {}", path.display()))?;
    Ok(())
}
