//! Derived copies of spectra: shifted, rescaled, smoothed or with the
//! uncertainty expressed another way. The input spectrum is never changed.

use crate::data::model::{Spectrum, Uncertainty};
use crate::error::{Result, SpectraError};
use crate::format::purpose::UncertaintyKind;

// ---------------------------------------------------------------------------
// Wavelength
// ---------------------------------------------------------------------------

/// Add `offset` (in the spectrum's wavelength unit) to every wavelength.
pub fn offset_wavelength(spectrum: &Spectrum, offset: f64) -> Spectrum {
    let mut out = spectrum.clone();
    out.wavelength.iter_mut().for_each(|w| *w += offset);
    if let Some(wcs) = out.wcs.as_mut() {
        wcs.reference_value += offset;
    }
    out
}

/// Multiply every wavelength by `factor`, typically `1 + z`.
pub fn redshift_wavelength(spectrum: &Spectrum, factor: f64) -> Spectrum {
    let mut out = spectrum.clone();
    out.wavelength.iter_mut().for_each(|w| *w *= factor);
    if let Some(wcs) = out.wcs.as_mut() {
        wcs.reference_value *= factor;
        wcs.pixel_width *= factor;
    }
    out
}

// ---------------------------------------------------------------------------
// Flux
// ---------------------------------------------------------------------------

pub fn offset_flux(spectrum: &Spectrum, offset: f64) -> Spectrum {
    let mut out = spectrum.clone();
    out.flux.iter_mut().for_each(|f| *f += offset);
    out
}

/// Smallest and largest flux, ignoring NaN. `None` when no value is finite.
pub fn flux_range(spectrum: &Spectrum) -> Option<(f64, f64)> {
    spectrum
        .flux
        .iter()
        .copied()
        .filter(|f| !f.is_nan())
        .fold(None, |range, f| match range {
            None => Some((f, f)),
            Some((lo, hi)) => Some((lo.min(f), hi.max(f))),
        })
}

/// Rescale flux linearly onto `[0, max_value]`. Uncertainties scale with it.
pub fn normalise_flux(spectrum: &Spectrum, max_value: f64) -> Result<Spectrum> {
    let (lo, hi) = flux_range(spectrum)
        .ok_or_else(|| SpectraError::config("cannot normalise a spectrum without flux values"))?;
    if hi == lo {
        return Err(SpectraError::config("cannot normalise a constant spectrum"));
    }
    let k = max_value / (hi - lo);

    let mut out = spectrum.clone();
    out.flux.iter_mut().for_each(|f| *f = (*f - lo) * k);
    if let Some(uncertainty) = out.uncertainty.as_mut() {
        let factor = match uncertainty.kind {
            UncertaintyKind::StdDev => k.abs(),
            UncertaintyKind::Variance => k * k,
            UncertaintyKind::InverseVariance => 1.0 / (k * k),
        };
        uncertainty.values.iter_mut().for_each(|v| *v *= factor);
    }
    Ok(out)
}

/// Signal-to-noise above which a point is taken to be spurious.
pub const SPURIOUS_SNR: f64 = 50.0;

/// Blank every point whose signal-to-noise exceeds `max_snr`. Spectra
/// without usable errors come back unchanged.
pub fn remove_spurious_points(spectrum: &Spectrum, max_snr: f64) -> Spectrum {
    let mut out = spectrum.clone();
    let Some(uncertainty) = spectrum.uncertainty.as_ref() else {
        return out;
    };
    if uncertainty.values.iter().all(|v| v.is_nan()) {
        return out;
    }
    let stdev = convert_uncertainty(uncertainty, UncertaintyKind::StdDev).values;
    for (flux, sigma) in out.flux.iter_mut().zip(stdev) {
        if *flux / sigma > max_snr {
            *flux = f64::NAN;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Smoothing
// ---------------------------------------------------------------------------

/// Window of `width` points around `i`, cut short at the array edges.
fn window(len: usize, i: usize, width: usize) -> std::ops::Range<usize> {
    let before = width / 2;
    let after = (width - 1) / 2;
    i.saturating_sub(before)..(i + after + 1).min(len)
}

fn smooth(spectrum: &Spectrum, width: usize, reduce: impl Fn(&mut Vec<f64>) -> f64) -> Result<Spectrum> {
    if width == 0 {
        return Err(SpectraError::config("smoothing width must be at least 1"));
    }
    let flux = &spectrum.flux;
    let mut scratch = Vec::with_capacity(width);
    let smoothed: Vec<f64> = (0..flux.len())
        .map(|i| {
            scratch.clear();
            scratch.extend(flux[window(flux.len(), i, width)].iter().filter(|f| !f.is_nan()));
            if scratch.is_empty() {
                f64::NAN
            } else {
                reduce(&mut scratch)
            }
        })
        .collect();

    let mut out = spectrum.clone();
    out.flux = smoothed;
    // Errors are not propagated through smoothing.
    out.uncertainty = None;
    Ok(out)
}

/// Running mean over `width` points. NaN points are left out of each mean.
pub fn box_smooth(spectrum: &Spectrum, width: usize) -> Result<Spectrum> {
    smooth(spectrum, width, |values| {
        values.iter().sum::<f64>() / values.len() as f64
    })
}

/// Running median over `width` points. NaN points are left out.
pub fn median_smooth(spectrum: &Spectrum, width: usize) -> Result<Spectrum> {
    smooth(spectrum, width, |values| {
        values.sort_by(f64::total_cmp);
        let mid = values.len() / 2;
        if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        }
    })
}

// ---------------------------------------------------------------------------
// Uncertainty representation
// ---------------------------------------------------------------------------

/// The same errors expressed as `kind`. The unit stays that of the unit
/// the errors were read from.
pub fn convert_uncertainty(uncertainty: &Uncertainty, kind: UncertaintyKind) -> Uncertainty {
    use UncertaintyKind::*;

    if uncertainty.kind == kind {
        return uncertainty.clone();
    }
    let convert = |v: f64| -> f64 {
        let variance = match uncertainty.kind {
            StdDev => v * v,
            Variance => v,
            InverseVariance => 1.0 / v,
        };
        match kind {
            StdDev => variance.sqrt(),
            Variance => variance,
            InverseVariance => 1.0 / variance,
        }
    };

    Uncertainty {
        kind,
        values: uncertainty.values.iter().copied().map(convert).collect(),
        unit: uncertainty.unit.clone(),
    }
}

/// Variance values of whatever uncertainty is attached.
pub fn variance(uncertainty: &Uncertainty) -> Vec<f64> {
    convert_uncertainty(uncertainty, UncertaintyKind::Variance).values
}

/// `spectrum` with its uncertainty re-expressed as `kind`.
pub fn with_uncertainty_kind(spectrum: &Spectrum, kind: UncertaintyKind) -> Spectrum {
    let mut out = spectrum.clone();
    if let Some(uncertainty) = out.uncertainty.as_mut() {
        *uncertainty = convert_uncertainty(uncertainty, kind);
    }
    out
}
