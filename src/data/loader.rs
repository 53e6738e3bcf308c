use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, AsArray, Float32Array, Float64Array, LargeListArray, ListArray};
use arrow::datatypes::DataType;
use log::info;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Spectrum, SpectrumCollection, SpectrumMeta};
use crate::fits::header::Header;
use crate::fits::FITS_FILE_EXTS;
use crate::format::purpose::PurposeGroup;
use crate::format::units::Unit;
use crate::marz;
use crate::registry::FormatRegistry;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load every spectrum in a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.fits` / `.fit` / `.fts` – any registered FITS format; `format` names
///   one, otherwise the registry picks
/// * `.json` – a MARZ spectrum, or an array of MARZ templates
/// * `.parquet` / `.csv` – tables written by [`super::export`]
pub fn load_file(
    registry: &FormatRegistry,
    path: &Path,
    format: Option<&str>,
) -> Result<SpectrumCollection> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let collection = match ext.as_str() {
        e if FITS_FILE_EXTS.contains(&e) => registry
            .read(path, format)
            .with_context(|| format!("reading {}", path.display()))?,
        "json" if format.is_none() && is_json_array(path)? => load_templates(path)?,
        "json" => registry
            .read(path, format)
            .with_context(|| format!("reading {}", path.display()))?,
        "parquet" | "pq" => load_parquet(path)?,
        "csv" => load_csv(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };
    info!("{}: {} spectra", path.display(), collection.len());
    Ok(collection)
}

fn is_json_array(path: &Path) -> Result<bool> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;
    Ok(root.is_array())
}

fn load_templates(path: &Path) -> Result<SpectrumCollection> {
    let templates = marz::read_template_file(path).context("reading template file")?;
    Ok(SpectrumCollection::from_spectra(templates))
}

/// Rebuild one spectrum from an exported table row.
fn table_row(
    x: Vec<f64>,
    y: Vec<f64>,
    label: Option<&str>,
    purpose: &str,
    wavelength_unit: &str,
    flux_unit: &str,
    row: usize,
) -> Result<Spectrum> {
    let purpose: PurposeGroup = purpose
        .parse()
        .with_context(|| format!("Row {row}: bad purpose"))?;
    let mut meta = SpectrumMeta::new(purpose, Header::new());
    meta.label = label.filter(|l| !l.is_empty()).map(str::to_string);
    let spectrum = Spectrum::new(
        x,
        Unit::parse(wavelength_unit).with_context(|| format!("Row {row}: bad wavelength unit"))?,
        y,
        Unit::parse(flux_unit).with_context(|| format!("Row {row}: bad flux unit"))?,
        meta,
    )
    .with_context(|| format!("Row {row}"))?;
    Ok(spectrum)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names.
/// `x` and `y` columns contain semicolon-separated floats:
///   `"4000.0;4001.0;4002.0"`, `"0.12;0.14;0.11"`
fn load_csv(path: &Path) -> Result<SpectrumCollection> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers = reader.headers().context("reading CSV headers")?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("CSV missing '{name}' column"))
    };
    let x_idx = column("x")?;
    let y_idx = column("y")?;
    let label_idx = column("label")?;
    let purpose_idx = column("purpose")?;
    let wunit_idx = column("wavelength_unit")?;
    let funit_idx = column("flux_unit")?;

    let mut spectra = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let field = |idx: usize| record.get(idx).unwrap_or("");

        spectra.push(table_row(
            parse_semicolon_floats(field(x_idx), row_no, "x")?,
            parse_semicolon_floats(field(y_idx), row_no, "y")?,
            Some(field(label_idx)),
            field(purpose_idx),
            field(wunit_idx),
            field(funit_idx),
            row_no,
        )?);
    }

    Ok(SpectrumCollection::from_spectra(spectra))
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file in the layout of [`super::export::spectra_schema`].
/// `x` and `y` may be List or LargeList of Float64 or Float32.
fn load_parquet(path: &Path) -> Result<SpectrumCollection> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut spectra = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let column = |name: &str| {
            batch
                .column_by_name(name)
                .with_context(|| format!("Parquet file missing '{name}' column"))
        };
        let x_col = column("x")?;
        let y_col = column("y")?;
        let label = string_column(column("label")?, "label")?;
        let purpose = string_column(column("purpose")?, "purpose")?;
        let wunit = string_column(column("wavelength_unit")?, "wavelength_unit")?;
        let funit = string_column(column("flux_unit")?, "flux_unit")?;

        for row in 0..batch.num_rows() {
            let x = extract_f64_list(x_col, row)
                .with_context(|| format!("Row {row}: failed to read 'x'"))?;
            let y = extract_f64_list(y_col, row)
                .with_context(|| format!("Row {row}: failed to read 'y'"))?;
            let label = (!label.is_null(row)).then(|| label.value(row));
            spectra.push(table_row(
                x,
                y,
                label,
                purpose.value(row),
                wunit.value(row),
                funit.value(row),
                row,
            )?);
        }
    }

    Ok(SpectrumCollection::from_spectra(spectra))
}

// -- Parquet / Arrow helpers --

fn string_column<'a>(col: &'a Arc<dyn Array>, name: &str) -> Result<&'a arrow::array::StringArray> {
    col.as_string_opt::<i32>()
        .with_context(|| format!("'{name}' is {:?}, expected Utf8", col.data_type()))
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    // The inner array can be Float64 or Float32
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::export::{write_csv, write_parquet};

    fn collection() -> SpectrumCollection {
        let mut meta = SpectrumMeta::new(PurposeGroup::Combined, Header::new());
        meta.label = Some("NGC 253".into());
        SpectrumCollection::from_spectra(vec![Spectrum::new(
            vec![4000.0, 4000.5],
            Unit::angstrom(),
            vec![0.25, -1.5],
            Unit::parse("10^-17 erg/s/cm^2/A").unwrap(),
            meta,
        )
        .unwrap()])
    }

    #[test]
    fn exported_tables_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FormatRegistry::with_builtin_formats();
        for name in ["spectra.parquet", "spectra.csv"] {
            let path = dir.path().join(name);
            if name.ends_with("csv") {
                write_csv(&collection(), &path).unwrap();
            } else {
                write_parquet(&collection(), &path).unwrap();
            }
            let loaded = load_file(&registry, &path, None).unwrap();
            assert_eq!(loaded.len(), 1, "{name}");
            let s = &loaded[0];
            assert_eq!(s.wavelength(), &[4000.0, 4000.5]);
            assert_eq!(s.flux(), &[0.25, -1.5]);
            assert_eq!(s.label(), Some("NGC 253"));
            assert_eq!(s.purpose(), PurposeGroup::Combined);
            assert_eq!(s.flux_unit(), collection()[0].flux_unit());
        }
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let registry = FormatRegistry::new();
        let err = load_file(&registry, Path::new("spectrum.txt"), None).unwrap_err();
        assert!(err.to_string().contains(".txt"));
    }
}
