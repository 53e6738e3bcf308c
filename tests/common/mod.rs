#![allow(dead_code)]

use std::path::{Path, PathBuf};

use fits_spectra::fits::header::HeaderValue;
use fits_spectra::fits::{FitsFile, Hdu, ImageData};

pub fn text(value: &str) -> HeaderValue {
    HeaderValue::String(value.to_string())
}

pub fn float(value: f64) -> HeaderValue {
    HeaderValue::Float(value)
}

/// Linear wavelength grid in Angstrom starting at pixel 1.
pub fn grid(start: f64, step: f64) -> Vec<(&'static str, HeaderValue)> {
    vec![
        ("CRPIX1", float(1.0)),
        ("CRVAL1", float(start)),
        ("CDELT1", float(step)),
        ("CTYPE1", text("WAVE")),
    ]
}

pub fn image(cards: Vec<(&str, HeaderValue)>, values: Vec<f64>) -> Hdu {
    Hdu::new(cards.into_iter().collect(), Some(ImageData::vector(values)))
}

/// A 2-D array whose rows are stacked spectra.
pub fn rows(cards: Vec<(&str, HeaderValue)>, rows: &[Vec<f64>]) -> Hdu {
    Hdu::new(cards.into_iter().collect(), Some(ImageData::rows_of(rows).unwrap()))
}

pub fn with(mut cards: Vec<(&'static str, HeaderValue)>, extra: &[(&'static str, HeaderValue)]) -> Vec<(&'static str, HeaderValue)> {
    cards.extend(extra.iter().cloned());
    cards
}

pub fn write(dir: &Path, name: &str, hdus: Vec<Hdu>) -> PathBuf {
    let path = dir.join(name);
    FitsFile::new(hdus).write_to_path(&path).unwrap();
    path
}
