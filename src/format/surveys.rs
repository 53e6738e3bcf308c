//! Survey dialects shipped with the crate. Each one is a static
//! [`FormatConfig`] for one of the two traversal layouts, plus an optional
//! predicate that recognises the survey's files.

use super::config::{FormatConfig, HduConfig, HduMap, Layout};
use super::purpose::Purpose;
use super::wcs::{UnitParams, WcsParams};
use super::{MULTILINE_SINGLE_LABEL, SINGLE_SPLIT_LABEL};
use crate::fits::header::Header;
use crate::registry::{FormatSpec, Probe};

pub const GALAH_LABEL: &str = "GALAH";
pub const OZDES_LABEL: &str = "OzDES";
pub const MARZ_LABEL: &str = "MARZ";
pub const WCS1D_LABEL: &str = "wcs1d-fits";

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

/// Linear WCS read from `CRPIX*`, `CRVAL*` and the given width keyword, in
/// Angstrom.
fn keyword_wcs(suffix: &str, width_keyword: &str) -> Option<WcsParams> {
    Some(WcsParams {
        pixel_reference_point_keyword: Some(format!("CRPIX{suffix}")),
        pixel_reference_point_value_keyword: Some(format!("CRVAL{suffix}")),
        pixel_width_keyword: Some(width_keyword.to_string()),
        wavelength_unit: Some("Angstrom".into()),
        ..Default::default()
    })
}

fn counts() -> Option<UnitParams> {
    Some(UnitParams {
        flux_unit: Some("count".into()),
        ..Default::default()
    })
}

fn hdus(entries: &[(usize, Purpose)]) -> HduMap {
    HduMap::new(
        entries
            .iter()
            .map(|&(index, purpose)| (index, HduConfig::purpose(purpose))),
    )
}

/// A config that guesses every purpose from `EXTNAME`/`HDUNAME`.
fn guessed(width_keyword: &str) -> FormatConfig {
    FormatConfig {
        wcs: keyword_wcs("1", width_keyword),
        units: counts(),
        all_keywords: true,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Survey configs
// ---------------------------------------------------------------------------

pub fn galah_config() -> FormatConfig {
    FormatConfig {
        hdus: Some(hdus(&[
            (0, Purpose::Science),
            (1, Purpose::ErrorStdev),
            (2, Purpose::UnreducedScience),
            (3, Purpose::UnreducedErrorStdev),
            (4, Purpose::Skip),
        ])),
        wcs: keyword_wcs("1", "CDELT1"),
        units: counts(),
        ..Default::default()
    }
}

/// A combined spectrum followed by one science/variance/bad-pixel triple
/// per exposure.
pub fn ozdes_config() -> FormatConfig {
    let triple = [
        (0, Purpose::Science),
        (1, Purpose::ErrorVariance),
        (2, Purpose::Skip),
    ];
    FormatConfig {
        hdus: Some(
            hdus(&[
                (0, Purpose::CombinedScience),
                (1, Purpose::CombinedErrorVariance),
                (2, Purpose::Skip),
            ])
            .with_cycle(triple.map(|(i, p)| (i, HduConfig::purpose(p)))),
        ),
        all_standard_units: true,
        valid_wcs: true,
        ..Default::default()
    }
}

pub fn marz_config() -> FormatConfig {
    let mut map = hdus(&[(1, Purpose::ErrorVariance), (2, Purpose::Sky), (3, Purpose::Skip)]);
    map.by_index.insert(
        0,
        HduConfig::purpose(Purpose::Science).with_flux_unit("10^-17 erg/s/cm^2/A"),
    );
    FormatConfig {
        hdus: Some(map),
        wcs: keyword_wcs("1", "CDELT1"),
        units: counts(),
        ..Default::default()
    }
}

/// The GAMA spectral database re-publishes several older surveys, each in
/// its own layout. `GAMA`, `GAMA-2dFGRS` and `GAMA-MGC` stack their
/// spectra as rows of one primary array, so their map keys are row numbers.
pub fn gama_configs() -> Vec<(&'static str, Layout, FormatConfig)> {
    let mut gama = hdus(&[
        (2, Purpose::ErrorStdev),
        (3, Purpose::UnreducedScience),
        (4, Purpose::UnreducedErrorStdev),
        (5, Purpose::Sky),
    ]);
    gama.by_index.insert(
        1,
        HduConfig::purpose(Purpose::Science).with_flux_unit("10^-17 erg/s/cm^2/A"),
    );

    vec![
        (
            "GAMA",
            Layout::MultilineSingle,
            FormatConfig {
                hdus: Some(gama),
                wcs: keyword_wcs("1", "CD1_1"),
                units: counts(),
                ..Default::default()
            },
        ),
        ("GAMA-2QZ", Layout::SingleSplit, guessed("CD1_1")),
        ("GAMA-2SLAQ-QSO", Layout::SingleSplit, guessed("CDELT1")),
        (
            "GAMA-LT",
            Layout::SingleSplit,
            FormatConfig {
                hdus: Some(hdus(&[(0, Purpose::Science)])),
                wcs: keyword_wcs("", "CDELT"),
                units: counts(),
                ..Default::default()
            },
        ),
        (
            "GAMA-WiggleZ",
            Layout::SingleSplit,
            FormatConfig {
                hdus: Some(hdus(&[
                    (0, Purpose::Science),
                    (1, Purpose::ErrorVariance),
                    (2, Purpose::Skip),
                ])),
                wcs: keyword_wcs("1", "CDELT1"),
                units: counts(),
                ..Default::default()
            },
        ),
        ("GAMA-2dFGRS", Layout::MultilineSingle, guessed("CDELT1")),
        ("GAMA-MGC", Layout::MultilineSingle, guessed("CD1_1")),
    ]
}

/// A one-dimensional primary array with its own WCS and `BUNIT`; every
/// further HDU is ignored.
pub fn wcs1d_config() -> FormatConfig {
    FormatConfig {
        hdus: Some(hdus(&[(0, Purpose::Science)]).with_cycle([(0, HduConfig::purpose(Purpose::Skip))])),
        all_standard_units: true,
        valid_wcs: true,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Case-sensitive substring match on a header value's text.
fn text_contains(header: &Header, keyword: &str, needle: &str) -> bool {
    header
        .get(keyword)
        .is_some_and(|value| value.to_string().contains(needle))
}

pub fn identify_galah(probe: &Probe) -> bool {
    probe
        .primary_header()
        .is_some_and(|h| text_contains(h, "REFERENC", "galah"))
}

pub fn identify_ozdes(probe: &Probe) -> bool {
    probe
        .primary_header()
        .is_some_and(|h| text_contains(h, "REFERENC", "ozdes"))
}

pub fn identify_marz(probe: &Probe) -> bool {
    probe.primary_header().is_some_and(|h| {
        (text_contains(h, "INSTRUME", "AAOMEGA-2dF") && h.get_i64("NAXIS") == Some(1))
            || text_contains(h, "SOURCE", "Combined")
    })
}

pub fn identify_wcs1d(probe: &Probe) -> bool {
    let Some(primary) = probe.fits().and_then(|f| f.primary()) else {
        return false;
    };
    let h = &primary.header;
    primary.data.is_some()
        && h.get_i64("NAXIS") == Some(1)
        && h.contains("CRVAL1")
        && h.contains("BUNIT")
}

/// Every format registered by default, lowest preference first: when
/// several recognise a file the last candidate wins.
pub fn builtin_formats() -> Vec<FormatSpec> {
    let mut formats = vec![
        FormatSpec::fits(WCS1D_LABEL, Layout::SingleSplit, wcs1d_config()).identified_by(identify_wcs1d),
        FormatSpec::generic(SINGLE_SPLIT_LABEL, Layout::SingleSplit),
        FormatSpec::generic(MULTILINE_SINGLE_LABEL, Layout::MultilineSingle),
        FormatSpec::fits(GALAH_LABEL, Layout::SingleSplit, galah_config()).identified_by(identify_galah),
        FormatSpec::fits(OZDES_LABEL, Layout::SingleSplit, ozdes_config()).identified_by(identify_ozdes),
        FormatSpec::fits(MARZ_LABEL, Layout::SingleSplit, marz_config()).identified_by(identify_marz),
    ];
    formats.extend(
        gama_configs()
            .into_iter()
            .map(|(name, layout, config)| FormatSpec::fits(name, layout, config)),
    );
    formats.push(FormatSpec::marz_json());
    formats
}
