use std::collections::BTreeMap;

use log::{debug, warn};

use super::config::{FormatConfig, HduConfig};
use super::purpose::{classify, Action, Purpose, PurposeGroup, PurposeRequest};
use super::wcs::{compute_flux_unit, compute_wcs, LinearWcs};
use crate::data::model::{Spectrum, SpectrumCollection, SpectrumMeta, Uncertainty};
use crate::error::{Result, SpectraError};
use crate::fits::header::Header;

// ---------------------------------------------------------------------------
// SpectraMap – spectra grouped by coarse purpose while a file is walked
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SpectraMap {
    groups: BTreeMap<PurposeGroup, Vec<Spectrum>>,
}

impl SpectraMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recently created spectrum of `group`.
    pub fn last_mut(&mut self, group: PurposeGroup) -> Option<&mut Spectrum> {
        self.groups.get_mut(&group).and_then(|v| v.last_mut())
    }

    fn push(&mut self, spectrum: Spectrum) {
        self.groups.entry(spectrum.purpose()).or_default().push(spectrum);
    }

    /// Flatten group by group (combined, reduced, unreduced, sky), keeping
    /// traversal order inside each group.
    pub fn into_collection(self) -> SpectrumCollection {
        self.groups.into_values().flatten().collect()
    }
}

// ---------------------------------------------------------------------------
// Single-unit builder
// ---------------------------------------------------------------------------

/// One unit (an HDU, or a row of one) as seen by the builder.
#[derive(Debug, Clone, Copy)]
pub struct UnitInput<'a> {
    pub header: &'a Header,
    pub data: &'a [f64],
    /// Per-unit overrides from the format's HDU map.
    pub config: Option<&'a HduConfig>,
    /// 1-based row number for multi-line files.
    pub index: Option<usize>,
}

/// Decide what a unit is, from the format config or its header.
pub fn classify_unit(
    config: &FormatConfig,
    header: &Header,
    unit: Option<&HduConfig>,
    index: Option<usize>,
) -> Result<Purpose> {
    classify(
        header,
        &PurposeRequest {
            purpose: unit.and_then(|u| u.purpose),
            purpose_prefix: config.purpose_prefix.as_deref(),
            all_keywords: config.all_keywords,
            index,
        },
    )
}

/// Classify one unit and add it to `map`: a new spectrum, an uncertainty
/// for the latest spectrum of its group, or nothing for `skip`.
pub fn add_single_spectrum(map: &mut SpectraMap, config: &FormatConfig, input: UnitInput<'_>) -> Result<()> {
    let purpose = classify_unit(config, input.header, input.config, input.index)?;
    add_classified(map, config, purpose, input)
}

/// [`add_single_spectrum`] for a unit whose purpose is already known.
pub fn add_classified(
    map: &mut SpectraMap,
    config: &FormatConfig,
    purpose: Purpose,
    input: UnitInput<'_>,
) -> Result<()> {
    let Some(group) = purpose.group() else {
        debug!("skipping unit (row {:?})", input.index);
        return Ok(());
    };

    let params = config.wcs_for(input.config);
    let wcs = if config.valid_wcs || params.is_empty() {
        LinearWcs::from_header(input.header)?
    } else {
        compute_wcs(input.header, &params)?
    };
    let flux_unit = compute_flux_unit(input.header, &config.units_for(input.config))?;
    debug!("{purpose}: {} points, wavelength in {}, flux in {flux_unit}", input.data.len(), wcs.unit);

    match purpose.action() {
        Action::Discard => {}
        Action::Create => {
            let meta = SpectrumMeta::new(group, input.header.clone());
            map.push(Spectrum::from_wcs(wcs, input.data.to_vec(), flux_unit, meta));
        }
        Action::Attach(kind) => {
            // At most one error unit per spectrum.
            let target = map
                .last_mut(group)
                .filter(|target| target.uncertainty().is_none())
                .ok_or(SpectraError::Association { purpose })?;
            let values = align_to(&wcs, input.data, target);
            target.set_uncertainty(Uncertainty {
                kind,
                values,
                unit: flux_unit,
            })?;
            target.meta.uncertainty_header = Some(input.header.clone());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Error alignment
// ---------------------------------------------------------------------------

/// Resample `values`, laid out on `source`, onto the pixels of `target`.
/// Points outside the source range become NaN.
pub fn align_to(source: &LinearWcs, values: &[f64], target: &Spectrum) -> Vec<f64> {
    let n = target.len();
    let Some(grid) = target.wcs() else {
        return positional(values, n);
    };
    if grid == source && values.len() == n {
        return values.to_vec();
    }
    let Some(factor) = grid.unit.conversion_factor(&source.unit) else {
        warn!(
            "cannot map {} onto {}, aligning errors by position",
            source.unit, grid.unit
        );
        return positional(values, n);
    };

    (0..n)
        .map(|i| {
            let world = grid.world((i + 1) as f64) * factor;
            interpolate(values, source.pixel(world) - 1.0)
        })
        .collect()
}

fn positional(values: &[f64], n: usize) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().take(n).collect();
    out.resize(n, f64::NAN);
    out
}

/// Linear interpolation at fractional array position `x`.
fn interpolate(values: &[f64], x: f64) -> f64 {
    const SNAP: f64 = 1e-9;
    if values.is_empty() || !x.is_finite() {
        return f64::NAN;
    }
    let nearest = x.round();
    let x = if (x - nearest).abs() < SNAP { nearest } else { x };
    let last = (values.len() - 1) as f64;
    if x < 0.0 || x > last {
        return f64::NAN;
    }
    let i = x.floor() as usize;
    let frac = x - i as f64;
    if frac == 0.0 {
        return values[i];
    }
    values[i] + frac * (values[i + 1] - values[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::config::HduMap;
    use crate::format::units::Unit;
    use crate::format::wcs::{UnitParams, WcsParams};

    fn header(crval: f64, cdelt: f64) -> Header {
        [("CRPIX1", 1.0), ("CRVAL1", crval), ("CDELT1", cdelt)]
            .into_iter()
            .collect()
    }

    fn config() -> FormatConfig {
        FormatConfig {
            hdus: Some(HduMap::new([
                (0, HduConfig::purpose(Purpose::Science)),
                (1, HduConfig::purpose(Purpose::ErrorVariance)),
                (2, HduConfig::purpose(Purpose::Skip)),
            ])),
            wcs: Some(WcsParams {
                pixel_reference_point_keyword: Some("CRPIX1".into()),
                pixel_reference_point_value_keyword: Some("CRVAL1".into()),
                pixel_width_keyword: Some("CDELT1".into()),
                wavelength_unit: Some("Angstrom".into()),
                ..Default::default()
            }),
            units: Some(UnitParams {
                flux_unit: Some("count".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn add(map: &mut SpectraMap, config: &FormatConfig, index: usize, header: &Header, data: &[f64]) -> Result<()> {
        add_single_spectrum(
            map,
            config,
            UnitInput {
                header,
                data,
                config: config.unit(index),
                index: None,
            },
        )
    }

    #[test]
    fn science_error_skip_yields_one_spectrum() {
        let config = config();
        let h = header(5000.0, 2.0);
        let mut map = SpectraMap::new();
        add(&mut map, &config, 0, &h, &[1.0, 2.0, 3.0]).unwrap();
        add(&mut map, &config, 1, &h, &[0.1, 0.2, 0.3]).unwrap();
        add(&mut map, &config, 2, &h, &[9.0, 9.0, 9.0]).unwrap();

        let collection = map.into_collection();
        assert_eq!(collection.len(), 1);
        let spectrum = &collection[0];
        assert_eq!(spectrum.purpose(), PurposeGroup::Reduced);
        assert_eq!(spectrum.wavelength(), &[5000.0, 5002.0, 5004.0]);
        assert_eq!(spectrum.flux_unit(), &Unit::count());
        let uncertainty = spectrum.uncertainty().unwrap();
        assert_eq!(uncertainty.kind, crate::format::purpose::UncertaintyKind::Variance);
        assert_eq!(uncertainty.values, vec![0.1, 0.2, 0.3]);
        assert!(spectrum.meta.uncertainty_header.is_some());
    }

    #[test]
    fn error_first_is_an_association_error() {
        let config = config();
        let mut map = SpectraMap::new();
        let err = add(&mut map, &config, 1, &header(0.0, 1.0), &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            SpectraError::Association {
                purpose: Purpose::ErrorVariance
            }
        ));
    }

    #[test]
    fn second_error_unit_is_rejected() {
        let mut config = config();
        config.hdus = Some(HduMap::new([
            (0, HduConfig::purpose(Purpose::Science)),
            (1, HduConfig::purpose(Purpose::ErrorVariance)),
            (2, HduConfig::purpose(Purpose::ErrorStdev)),
        ]));
        let h = header(0.0, 1.0);
        let mut map = SpectraMap::new();
        add(&mut map, &config, 0, &h, &[1.0, 2.0]).unwrap();
        add(&mut map, &config, 1, &h, &[0.25, 0.25]).unwrap();
        let err = add(&mut map, &config, 2, &h, &[0.9, 0.9]).unwrap_err();
        assert!(matches!(
            err,
            SpectraError::Association {
                purpose: Purpose::ErrorStdev
            }
        ));
    }

    #[test]
    fn errors_only_attach_within_their_group() {
        let mut config = config();
        config.hdus = Some(HduMap::new([
            (0, HduConfig::purpose(Purpose::Science)),
            (1, HduConfig::purpose(Purpose::CombinedErrorStdev)),
        ]));
        let h = header(0.0, 1.0);
        let mut map = SpectraMap::new();
        add(&mut map, &config, 0, &h, &[1.0]).unwrap();
        let err = add(&mut map, &config, 1, &h, &[1.0]).unwrap_err();
        assert!(matches!(err, SpectraError::Association { .. }));
    }

    #[test]
    fn groups_flatten_in_fixed_order() {
        let mut config = config();
        config.hdus = Some(HduMap::new([
            (0, HduConfig::purpose(Purpose::Sky)),
            (1, HduConfig::purpose(Purpose::Science)),
            (2, HduConfig::purpose(Purpose::CombinedScience)),
        ]));
        let h = header(0.0, 1.0);
        let mut map = SpectraMap::new();
        for i in 0..3 {
            add(&mut map, &config, i, &h, &[i as f64]).unwrap();
        }
        let purposes: Vec<_> = map.into_collection().iter().map(Spectrum::purpose).collect();
        assert_eq!(
            purposes,
            vec![PurposeGroup::Combined, PurposeGroup::Reduced, PurposeGroup::Sky]
        );
    }

    #[test]
    fn shifted_error_grid_is_interpolated() {
        let config = config();
        let mut map = SpectraMap::new();
        add(&mut map, &config, 0, &header(100.0, 1.0), &[0.0; 4]).unwrap();
        // error grid starts half a pixel later
        add(&mut map, &config, 1, &header(100.5, 1.0), &[10.0, 20.0, 30.0, 40.0]).unwrap();
        let collection = map.into_collection();
        let values = &collection[0].uncertainty().unwrap().values;
        assert!(values[0].is_nan());
        assert_eq!(&values[1..], &[15.0, 25.0, 35.0]);
    }

    #[test]
    fn error_grid_in_other_length_unit_is_converted() {
        let source = LinearWcs {
            reference_pixel: 1.0,
            reference_value: 500.0,
            pixel_width: 0.1,
            unit: Unit::parse("nm").unwrap(),
        };
        let target = Spectrum::from_wcs(
            LinearWcs {
                reference_pixel: 1.0,
                reference_value: 5000.0,
                pixel_width: 2.0,
                unit: Unit::angstrom(),
            },
            vec![0.0; 2],
            Unit::count(),
            SpectrumMeta::new(PurposeGroup::Reduced, Header::new()),
        );
        let aligned = align_to(&source, &[1.0, 2.0, 3.0, 4.0], &target);
        assert_eq!(aligned, vec![1.0, 3.0]);
    }
}
