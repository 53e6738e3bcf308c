use std::collections::BTreeSet;
use std::ops::Index;

use crate::error::{Result, SpectraError};
use crate::fits::header::Header;
use crate::format::purpose::{PurposeGroup, UncertaintyKind};
use crate::format::units::Unit;
use crate::format::wcs::LinearWcs;

// ---------------------------------------------------------------------------
// Uncertainty – per-point errors attached to a spectrum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Uncertainty {
    pub kind: UncertaintyKind,
    /// Same length as the spectrum's flux.
    pub values: Vec<f64>,
    /// Unit of the error unit these values were read from.
    pub unit: Unit,
}

// ---------------------------------------------------------------------------
// SpectrumMeta – what survives from the source file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumMeta {
    pub purpose: PurposeGroup,
    /// Header of the unit the spectrum was built from.
    pub header: Header,
    pub label: Option<String>,
    /// Header of the unit the uncertainty came from.
    pub uncertainty_header: Option<Header>,
}

impl SpectrumMeta {
    pub fn new(purpose: PurposeGroup, header: Header) -> Self {
        Self {
            purpose,
            header,
            label: None,
            uncertainty_header: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Spectrum – one physically meaningful trace
// ---------------------------------------------------------------------------

/// Wavelength/flux pairs with units, optional uncertainty and source
/// metadata. `wavelength`, `flux` and `uncertainty.values` always have the
/// same length.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub(crate) wavelength: Vec<f64>,
    pub(crate) wavelength_unit: Unit,
    pub(crate) flux: Vec<f64>,
    pub(crate) flux_unit: Unit,
    pub(crate) uncertainty: Option<Uncertainty>,
    /// Dispersion solution the wavelengths were computed from, if any.
    pub(crate) wcs: Option<LinearWcs>,
    pub meta: SpectrumMeta,
}

impl Spectrum {
    pub fn new(
        wavelength: Vec<f64>,
        wavelength_unit: Unit,
        flux: Vec<f64>,
        flux_unit: Unit,
        meta: SpectrumMeta,
    ) -> Result<Self> {
        check_len(wavelength.len(), flux.len())?;
        Ok(Self {
            wavelength,
            wavelength_unit,
            flux,
            flux_unit,
            uncertainty: None,
            wcs: None,
            meta,
        })
    }

    /// A spectrum whose axis is generated from `wcs`.
    pub fn from_wcs(wcs: LinearWcs, flux: Vec<f64>, flux_unit: Unit, meta: SpectrumMeta) -> Self {
        Self {
            wavelength: wcs.spectral_axis(flux.len()),
            wavelength_unit: wcs.unit.clone(),
            flux,
            flux_unit,
            uncertainty: None,
            wcs: Some(wcs),
            meta,
        }
    }

    pub fn with_uncertainty(mut self, uncertainty: Uncertainty) -> Result<Self> {
        self.set_uncertainty(uncertainty)?;
        Ok(self)
    }

    pub(crate) fn set_uncertainty(&mut self, uncertainty: Uncertainty) -> Result<()> {
        check_len(self.flux.len(), uncertainty.values.len())?;
        self.uncertainty = Some(uncertainty);
        Ok(())
    }

    pub fn wavelength(&self) -> &[f64] {
        &self.wavelength
    }

    pub fn wavelength_unit(&self) -> &Unit {
        &self.wavelength_unit
    }

    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    pub fn flux_unit(&self) -> &Unit {
        &self.flux_unit
    }

    pub fn uncertainty(&self) -> Option<&Uncertainty> {
        self.uncertainty.as_ref()
    }

    pub fn wcs(&self) -> Option<&LinearWcs> {
        self.wcs.as_ref()
    }

    pub fn label(&self) -> Option<&str> {
        self.meta.label.as_deref()
    }

    pub fn purpose(&self) -> PurposeGroup {
        self.meta.purpose
    }

    pub fn len(&self) -> usize {
        self.flux.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flux.is_empty()
    }
}

fn check_len(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(SpectraError::LengthMismatch { expected, found });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SpectrumCollection – everything read from one file
// ---------------------------------------------------------------------------

/// Spectra in output order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrumCollection {
    pub spectra: Vec<Spectrum>,
}

impl SpectrumCollection {
    pub fn from_spectra(spectra: Vec<Spectrum>) -> Self {
        Self { spectra }
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Spectrum> {
        self.spectra.iter()
    }

    pub fn first(&self, purpose: PurposeGroup) -> Option<&Spectrum> {
        self.spectra.iter().find(|s| s.purpose() == purpose)
    }

    pub fn by_purpose(&self, purpose: PurposeGroup) -> impl Iterator<Item = &Spectrum> {
        self.spectra.iter().filter(move |s| s.purpose() == purpose)
    }

    /// The purpose groups present, in output order.
    pub fn purposes(&self) -> BTreeSet<PurposeGroup> {
        self.spectra.iter().map(Spectrum::purpose).collect()
    }

    pub fn labels(&self) -> Vec<Option<&str>> {
        self.spectra.iter().map(Spectrum::label).collect()
    }
}

impl Index<usize> for SpectrumCollection {
    type Output = Spectrum;

    fn index(&self, index: usize) -> &Spectrum {
        &self.spectra[index]
    }
}

impl<'a> IntoIterator for &'a SpectrumCollection {
    type Item = &'a Spectrum;
    type IntoIter = std::slice::Iter<'a, Spectrum>;

    fn into_iter(self) -> Self::IntoIter {
        self.spectra.iter()
    }
}

impl IntoIterator for SpectrumCollection {
    type Item = Spectrum;
    type IntoIter = std::vec::IntoIter<Spectrum>;

    fn into_iter(self) -> Self::IntoIter {
        self.spectra.into_iter()
    }
}

impl FromIterator<Spectrum> for SpectrumCollection {
    fn from_iter<I: IntoIterator<Item = Spectrum>>(iter: I) -> Self {
        Self::from_spectra(iter.into_iter().collect())
    }
}
