//! Interop with the MARZ redshifting tool: its single-spectrum JSON layout
//! and its template files.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::data::model::{Spectrum, SpectrumCollection, SpectrumMeta, Uncertainty};
use crate::error::{Result, SpectraError};
use crate::fits::header::Header;
use crate::format::purpose::{PurposeGroup, UncertaintyKind};
use crate::format::units::Unit;
use crate::registry::Probe;
use crate::transform;

pub const MARZ_JSON_LABEL: &str = "MARZJSON";

// ---------------------------------------------------------------------------
// MARZ JSON
// ---------------------------------------------------------------------------

/// Parallel arrays, `null` where a point is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarzSpectrum {
    pub wavelength: Vec<Option<f64>>,
    pub intensity: Vec<Option<f64>>,
    #[serde(default)]
    pub sky: Vec<Option<f64>>,
    #[serde(default)]
    pub variance: Vec<Option<f64>>,
}

fn nullable(value: f64) -> Option<f64> {
    (!value.is_nan()).then_some(value)
}

/// `values` cut or padded with nulls to `len` points.
fn column<I: IntoIterator<Item = f64>>(values: I, len: usize) -> Vec<Option<f64>> {
    let mut out: Vec<Option<f64>> = values.into_iter().take(len).map(nullable).collect();
    out.resize(len, None);
    out
}

/// The first reduced spectrum of `collection`, with the first sky spectrum
/// alongside. Wavelengths are written in Angstrom and errors as variance.
pub fn to_marz_json(collection: &SpectrumCollection) -> Result<MarzSpectrum> {
    let reduced = collection
        .first(PurposeGroup::Reduced)
        .ok_or_else(|| SpectraError::config("MARZ JSON needs a reduced spectrum"))?;
    let len = reduced.len();

    let factor = reduced
        .wavelength_unit()
        .conversion_factor(&Unit::angstrom())
        .ok_or_else(|| SpectraError::InvalidUnit {
            unit: reduced.wavelength_unit().to_string(),
            reason: "not a wavelength".into(),
        })?;

    let sky = match collection.first(PurposeGroup::Sky) {
        Some(sky) => column(sky.flux().iter().copied(), len),
        None => vec![None; len],
    };
    let variance = match reduced.uncertainty() {
        Some(uncertainty) => column(transform::variance(uncertainty), len),
        None => vec![None; len],
    };

    Ok(MarzSpectrum {
        wavelength: column(reduced.wavelength().iter().map(|w| w * factor), len),
        intensity: column(reduced.flux().iter().copied(), len),
        sky,
        variance,
    })
}

/// A reduced spectrum, with variance when any is given, and a sky
/// spectrum when any sky value is present.
pub fn from_marz_json(marz: &MarzSpectrum) -> Result<SpectrumCollection> {
    let wavelength: Vec<f64> = marz
        .wavelength
        .iter()
        .enumerate()
        .map(|(i, w)| w.ok_or_else(|| SpectraError::config(format!("wavelength {i} is null"))))
        .collect::<Result<_>>()?;
    let values = |column: &[Option<f64>]| -> Vec<f64> {
        column.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
    };

    let meta = |purpose| SpectrumMeta::new(purpose, Header::new());
    let mut reduced = Spectrum::new(
        wavelength.clone(),
        Unit::angstrom(),
        values(&marz.intensity),
        Unit::count(),
        meta(PurposeGroup::Reduced),
    )?;
    if marz.variance.iter().any(Option::is_some) {
        reduced = reduced.with_uncertainty(Uncertainty {
            kind: UncertaintyKind::Variance,
            values: values(&marz.variance),
            unit: Unit::count(),
        })?;
    }

    let mut spectra = vec![reduced];
    if marz.sky.iter().any(Option::is_some) {
        spectra.push(Spectrum::new(
            wavelength,
            Unit::angstrom(),
            values(&marz.sky),
            Unit::count(),
            meta(PurposeGroup::Sky),
        )?);
    }
    Ok(SpectrumCollection::from_spectra(spectra))
}

pub fn read_marz_json(path: &Path) -> Result<SpectrumCollection> {
    let reader = BufReader::new(File::open(path)?);
    let marz: MarzSpectrum = serde_json::from_reader(reader)?;
    debug!("{}: {} MARZ points", path.display(), marz.wavelength.len());
    from_marz_json(&marz)
}

pub fn write_marz_json(collection: &SpectrumCollection, path: &Path) -> Result<()> {
    let marz = to_marz_json(collection)?;
    if collection.by_purpose(PurposeGroup::Reduced).nth(1).is_some() {
        warn!("{}: only the first reduced spectrum is written", path.display());
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &marz)?;
    Ok(())
}

/// `.json` files holding a MARZ spectrum object.
pub fn identify_marz_json(probe: &Probe) -> bool {
    probe.extension() == Some("json")
        && probe
            .json()
            .and_then(|json| json.as_object())
            .is_some_and(|object| object.contains_key("wavelength") && object.contains_key("intensity"))
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct Template {
    spec: Vec<f64>,
    start_lambda: f64,
    end_lambda: f64,
    log_linear: bool,
    name: String,
}

/// `n` evenly spaced points from `start` to `end` inclusive.
fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Read a MARZ template file: a JSON array of templates, each spanning
/// `start_lambda..=end_lambda` (in log10 when `log_linear`).
pub fn read_template_file(path: &Path) -> Result<Vec<Spectrum>> {
    let reader = BufReader::new(File::open(path)?);
    let templates: Vec<Template> = serde_json::from_reader(reader)?;

    templates
        .into_iter()
        .map(|template| {
            let mut axis = linspace(template.start_lambda, template.end_lambda, template.spec.len());
            if template.log_linear {
                axis.iter_mut().for_each(|x| *x = 10f64.powf(*x));
            }
            let mut meta = SpectrumMeta::new(PurposeGroup::Reduced, Header::new());
            meta.label = Some(template.name);
            Spectrum::new(axis, Unit::angstrom(), template.spec, Unit::count(), meta)
        })
        .collect()
}
