use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Float64Builder, Int64Array, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use super::model::SpectrumCollection;

// ---------------------------------------------------------------------------
// Table layout
// ---------------------------------------------------------------------------

/// One row per spectrum:
/// - `x`: List<Float64> – wavelengths
/// - `y`: List<Float64> – flux
/// - `label`, `purpose`, `wavelength_unit`, `flux_unit`: Utf8
pub fn spectra_schema() -> Arc<Schema> {
    let list = || DataType::List(Arc::new(Field::new("item", DataType::Float64, true)));
    Arc::new(Schema::new(vec![
        Field::new("x", list(), false),
        Field::new("y", list(), false),
        Field::new("label", DataType::Utf8, true),
        Field::new("purpose", DataType::Utf8, false),
        Field::new("wavelength_unit", DataType::Utf8, false),
        Field::new("flux_unit", DataType::Utf8, false),
    ]))
}

fn list_column<'a>(rows: impl Iterator<Item = &'a [f64]>) -> arrow::array::ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        builder.values().append_slice(row);
        builder.append(true);
    }
    builder.finish()
}

pub fn to_record_batch(collection: &SpectrumCollection) -> Result<RecordBatch> {
    let x = list_column(collection.iter().map(|s| s.wavelength()));
    let y = list_column(collection.iter().map(|s| s.flux()));
    let label = StringArray::from(collection.labels());
    let purpose = StringArray::from_iter_values(collection.iter().map(|s| s.purpose().as_str()));
    let wavelength_unit =
        StringArray::from_iter_values(collection.iter().map(|s| s.wavelength_unit().to_string()));
    let flux_unit = StringArray::from_iter_values(collection.iter().map(|s| s.flux_unit().to_string()));

    RecordBatch::try_new(
        spectra_schema(),
        vec![
            Arc::new(x),
            Arc::new(y),
            Arc::new(label),
            Arc::new(purpose),
            Arc::new(wavelength_unit),
            Arc::new(flux_unit),
        ],
    )
    .context("building spectrum record batch")
}

/// Per-spectrum overview: label, purpose, point count and wavelength span.
pub fn summary_batch(collection: &SpectrumCollection) -> Result<RecordBatch> {
    let span = |values: &[f64], pick: fn(f64, f64) -> f64| {
        values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(pick)
            .unwrap_or(f64::NAN)
    };

    let schema = Arc::new(Schema::new(vec![
        Field::new("label", DataType::Utf8, true),
        Field::new("purpose", DataType::Utf8, false),
        Field::new("points", DataType::Int64, false),
        Field::new("wavelength_min", DataType::Float64, false),
        Field::new("wavelength_max", DataType::Float64, false),
        Field::new("wavelength_unit", DataType::Utf8, false),
        Field::new("uncertainty", DataType::Utf8, true),
    ]));

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(collection.labels())),
            Arc::new(StringArray::from_iter_values(
                collection.iter().map(|s| s.purpose().as_str()),
            )),
            Arc::new(Int64Array::from_iter_values(collection.iter().map(|s| s.len() as i64))),
            Arc::new(Float64Array::from_iter_values(
                collection.iter().map(|s| span(s.wavelength(), f64::min)),
            )),
            Arc::new(Float64Array::from_iter_values(
                collection.iter().map(|s| span(s.wavelength(), f64::max)),
            )),
            Arc::new(StringArray::from_iter_values(
                collection.iter().map(|s| s.wavelength_unit().to_string()),
            )),
            Arc::new(StringArray::from(
                collection
                    .iter()
                    .map(|s| s.uncertainty().map(|u| format!("{:?}", u.kind)))
                    .collect::<Vec<_>>(),
            )),
        ],
    )
    .context("building summary record batch")
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

pub fn write_parquet(collection: &SpectrumCollection, path: &Path) -> Result<()> {
    let batch = to_record_batch(collection)?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn join_floats(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

/// CSV with `x` and `y` as semicolon-separated floats, one spectrum per row.
pub fn write_csv(collection: &SpectrumCollection, path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["x", "y", "label", "purpose", "wavelength_unit", "flux_unit"])?;
    for spectrum in collection {
        writer
            .write_record([
                join_floats(spectrum.wavelength()),
                join_floats(spectrum.flux()),
                spectrum.label().unwrap_or_default().to_string(),
                spectrum.purpose().to_string(),
                spectrum.wavelength_unit().to_string(),
                spectrum.flux_unit().to_string(),
            ])
            .context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}
