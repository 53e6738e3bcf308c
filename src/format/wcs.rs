use log::debug;
use serde::Deserialize;

use super::units::Unit;
use crate::error::{Result, SpectraError};
use crate::fits::header::Header;

// ---------------------------------------------------------------------------
// Linear dispersion solution
// ---------------------------------------------------------------------------

/// One-dimensional linear wavelength solution. Pixels are 1-based, as in
/// FITS: array index `i` sits at pixel `i + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearWcs {
    pub reference_pixel: f64,
    pub reference_value: f64,
    pub pixel_width: f64,
    pub unit: Unit,
}

/// `CTYPE1` values that imply a wavelength axis in Angstrom when `CUNIT1`
/// is absent.
const WAVELENGTH_CTYPES: &[&str] = &["WAVE", "AWAV", "LINEAR", "LAMBDA"];

impl LinearWcs {
    pub fn world(&self, pixel: f64) -> f64 {
        self.reference_value + (pixel - self.reference_pixel) * self.pixel_width
    }

    pub fn pixel(&self, world: f64) -> f64 {
        (world - self.reference_value) / self.pixel_width + self.reference_pixel
    }

    /// Wavelength of every array element of an axis of length `len`.
    pub fn spectral_axis(&self, len: usize) -> Vec<f64> {
        (0..len).map(|i| self.world((i + 1) as f64)).collect()
    }

    /// The coordinate system a header declares about itself: `CRPIX1`,
    /// `CRVAL1`, `CDELT1` (or `CD1_1`) and `CUNIT1`.
    pub fn from_header(header: &Header) -> Result<Self> {
        let number = |keyword: &str, default: f64| -> Result<f64> {
            match header.get(keyword) {
                None => Ok(default),
                Some(value) => value.as_f64().ok_or_else(|| {
                    SpectraError::fits(format!("{keyword} is not numeric: {value}"))
                }),
            }
        };

        let pixel_width = if header.contains("CDELT1") {
            number("CDELT1", 1.0)?
        } else {
            number("CD1_1", 1.0)?
        };

        let unit = match header.get_str("CUNIT1") {
            Some(text) => Unit::parse(text)?,
            None => {
                let ctype = header.get_str("CTYPE1").unwrap_or("").trim().to_ascii_uppercase();
                if WAVELENGTH_CTYPES.iter().any(|t| ctype.starts_with(t)) {
                    Unit::angstrom()
                } else {
                    Unit::pixel()
                }
            }
        };

        Ok(Self {
            reference_pixel: number("CRPIX1", 0.0)?,
            reference_value: number("CRVAL1", 0.0)?,
            pixel_width,
            unit,
        })
    }
}

// ---------------------------------------------------------------------------
// Keyword-driven parameters
// ---------------------------------------------------------------------------

/// Where to find each term of the dispersion solution: a literal value, or
/// the header keyword holding it. Literals win over keywords.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WcsParams {
    pub wavelength_unit_keyword: Option<String>,
    pub wavelength_unit: Option<String>,
    pub pixel_reference_point_keyword: Option<String>,
    pub pixel_reference_point: Option<f64>,
    pub pixel_reference_point_value_keyword: Option<String>,
    pub pixel_reference_point_value: Option<f64>,
    pub pixel_width_keyword: Option<String>,
    pub pixel_width: Option<f64>,
}

impl WcsParams {
    pub fn is_empty(&self) -> bool {
        *self == WcsParams::default()
    }

    /// `self` with every field `overrides` sets replaced.
    pub fn merged(&self, overrides: &WcsParams) -> WcsParams {
        fn pick<T: Clone>(base: &Option<T>, over: &Option<T>) -> Option<T> {
            over.clone().or_else(|| base.clone())
        }
        WcsParams {
            wavelength_unit_keyword: pick(&self.wavelength_unit_keyword, &overrides.wavelength_unit_keyword),
            wavelength_unit: pick(&self.wavelength_unit, &overrides.wavelength_unit),
            pixel_reference_point_keyword: pick(
                &self.pixel_reference_point_keyword,
                &overrides.pixel_reference_point_keyword,
            ),
            pixel_reference_point: pick(&self.pixel_reference_point, &overrides.pixel_reference_point),
            pixel_reference_point_value_keyword: pick(
                &self.pixel_reference_point_value_keyword,
                &overrides.pixel_reference_point_value_keyword,
            ),
            pixel_reference_point_value: pick(
                &self.pixel_reference_point_value,
                &overrides.pixel_reference_point_value,
            ),
            pixel_width_keyword: pick(&self.pixel_width_keyword, &overrides.pixel_width_keyword),
            pixel_width: pick(&self.pixel_width, &overrides.pixel_width),
        }
    }

    /// Check every term has a literal or a keyword.
    pub fn validate(&self) -> Result<()> {
        let terms = [
            ("wavelength_unit", self.wavelength_unit.is_some(), self.wavelength_unit_keyword.is_some()),
            (
                "pixel_reference_point",
                self.pixel_reference_point.is_some(),
                self.pixel_reference_point_keyword.is_some(),
            ),
            (
                "pixel_reference_point_value",
                self.pixel_reference_point_value.is_some(),
                self.pixel_reference_point_value_keyword.is_some(),
            ),
            ("pixel_width", self.pixel_width.is_some(), self.pixel_width_keyword.is_some()),
        ];
        for (name, literal, keyword) in terms {
            if !literal && !keyword {
                return Err(not_provided(name));
            }
        }
        Ok(())
    }
}

fn header_number(header: &Header, keyword: &str) -> Result<f64> {
    let value = header.get(keyword).ok_or_else(|| SpectraError::missing(keyword))?;
    value
        .as_f64()
        .ok_or_else(|| SpectraError::fits(format!("{keyword} is not numeric: {value}")))
}

fn not_provided(name: &str) -> SpectraError {
    SpectraError::config(format!("either {name} or {name}_keyword must be provided"))
}

fn number_term(
    header: &Header,
    name: &str,
    literal: Option<f64>,
    keyword: Option<&str>,
) -> Result<f64> {
    match (literal, keyword) {
        (Some(value), _) => Ok(value),
        (None, Some(keyword)) => header_number(header, keyword),
        (None, None) => Err(not_provided(name)),
    }
}

/// Build the dispersion solution of one unit from explicit parameters.
pub fn compute_wcs(header: &Header, params: &WcsParams) -> Result<LinearWcs> {
    let unit = match (&params.wavelength_unit, &params.wavelength_unit_keyword) {
        (Some(literal), _) => Unit::parse(literal)?,
        (None, Some(keyword)) => {
            let value = header.get(keyword).ok_or_else(|| SpectraError::missing(keyword))?;
            Unit::parse(value.to_string().trim())?
        }
        (None, None) => return Err(not_provided("wavelength_unit")),
    };

    let reference_pixel = number_term(
        header,
        "pixel_reference_point",
        params.pixel_reference_point,
        params.pixel_reference_point_keyword.as_deref(),
    )?;
    let reference_value = number_term(
        header,
        "pixel_reference_point_value",
        params.pixel_reference_point_value,
        params.pixel_reference_point_value_keyword.as_deref(),
    )?;

    // Some survey pipelines only ever write CDELT1.
    let mut width_keyword = params.pixel_width_keyword.as_deref();
    if let Some(keyword) = width_keyword {
        if !header.contains(keyword) && header.contains("CDELT1") {
            debug!("{keyword} missing, using CDELT1 for the pixel width");
            width_keyword = Some("CDELT1");
        }
    }
    let pixel_width = number_term(header, "pixel_width", params.pixel_width, width_keyword)?;

    Ok(LinearWcs {
        reference_pixel,
        reference_value,
        pixel_width,
        unit,
    })
}

// ---------------------------------------------------------------------------
// Flux units
// ---------------------------------------------------------------------------

/// Where to find the flux unit and its optional scale factor.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitParams {
    pub flux_unit_keyword: Option<String>,
    pub flux_unit: Option<String>,
    pub flux_scale_keyword: Option<String>,
    pub flux_scale: Option<f64>,
}

impl UnitParams {
    /// Read the unit from the standard `BUNIT` keyword.
    pub fn standard() -> Self {
        Self {
            flux_unit_keyword: Some("BUNIT".into()),
            ..Default::default()
        }
    }

    pub fn has_flux_unit(&self) -> bool {
        self.flux_unit.is_some() || self.flux_unit_keyword.is_some()
    }

    pub fn merged(&self, overrides: &UnitParams) -> UnitParams {
        UnitParams {
            flux_unit_keyword: overrides
                .flux_unit_keyword
                .clone()
                .or_else(|| self.flux_unit_keyword.clone()),
            flux_unit: overrides.flux_unit.clone().or_else(|| self.flux_unit.clone()),
            flux_scale_keyword: overrides
                .flux_scale_keyword
                .clone()
                .or_else(|| self.flux_scale_keyword.clone()),
            flux_scale: overrides.flux_scale.or(self.flux_scale),
        }
    }
}

/// Resolve `scale × unit` for the flux of one unit. The scale defaults to 1.
pub fn compute_flux_unit(header: &Header, params: &UnitParams) -> Result<Unit> {
    let unit = match (&params.flux_unit, &params.flux_unit_keyword) {
        (Some(literal), _) => Unit::parse(literal)?,
        (None, Some(keyword)) => {
            let value = header.get(keyword).ok_or_else(|| SpectraError::missing(keyword))?;
            Unit::parse(value.to_string().trim())?
        }
        (None, None) => {
            return Err(SpectraError::config(
                "either flux_unit or flux_unit_keyword must be provided",
            ))
        }
    };

    let scale = match (params.flux_scale, &params.flux_scale_keyword) {
        (Some(literal), _) => literal,
        (None, Some(keyword)) => header_number(header, keyword)?,
        (None, None) => 1.0,
    };
    Ok(unit.scaled(scale))
}
