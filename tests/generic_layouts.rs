mod common;

use common::{grid, image, text, with, write};
use fits_spectra::fits::{FitsFile, Hdu, ImageData};
use fits_spectra::format::purpose::{Purpose, PurposeGroup, UncertaintyKind};
use fits_spectra::format::{FormatConfig, Layout, MULTILINE_SINGLE_LABEL, SINGLE_SPLIT_LABEL};
use fits_spectra::registry::{FormatRegistry, FormatSpec, Probe};
use fits_spectra::SpectraError;

const SCIENCE_ERROR_SKIP: &str = r#"{
    "hdus": {
        "0": {"purpose": "science"},
        "1": {"purpose": "error_stdev"},
        "2": {"purpose": "skip"}
    },
    "wcs": {
        "pixel_reference_point_keyword": "CRPIX1",
        "pixel_reference_point_value_keyword": "CRVAL1",
        "pixel_width_keyword": "CDELT1",
        "wavelength_unit": "Angstrom"
    },
    "units": {"flux_unit": "count"},
    "all_standard_units": false,
    "all_keywords": false,
    "valid_wcs": false
}"#;

#[test]
fn science_error_skip_reads_as_one_spectrum() {
    let dir = tempfile::tempdir().unwrap();
    let cards = grid(6000.0, 1.0);
    let path = write(
        dir.path(),
        "triple.fits",
        vec![
            image(with(cards.clone(), &[("OBJECT", text("target"))]), vec![1.0, 2.0, 3.0]),
            image(cards.clone(), vec![0.5, 0.5, 0.5]),
            image(cards, vec![0.0, 1.0, 0.0]),
        ],
    );

    let registry = FormatRegistry::with_builtin_formats();
    let config = FormatConfig::from_json(SCIENCE_ERROR_SKIP).unwrap();
    let spectra = registry
        .read_with_config(&path, SINGLE_SPLIT_LABEL, &config)
        .unwrap();

    assert_eq!(spectra.len(), 1);
    let spectrum = &spectra[0];
    assert_eq!(spectrum.purpose(), PurposeGroup::Reduced);
    assert_eq!(spectrum.wavelength(), &[6000.0, 6001.0, 6002.0]);
    assert_eq!(spectrum.flux(), &[1.0, 2.0, 3.0]);
    assert_eq!(spectrum.label(), Some("target"));
    let uncertainty = spectrum.uncertainty().unwrap();
    assert_eq!(uncertainty.kind, UncertaintyKind::StdDev);
    assert_eq!(uncertainty.values, vec![0.5; 3]);
    assert!(spectrum.meta.uncertainty_header.is_some());
}

#[test]
fn generic_layouts_need_a_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "one.fits", vec![image(grid(1.0, 1.0), vec![1.0])]);
    let registry = FormatRegistry::with_builtin_formats();
    assert!(matches!(
        registry.read(&path, Some(SINGLE_SPLIT_LABEL)),
        Err(SpectraError::Configuration(_))
    ));
}

#[test]
fn error_before_spectrum_fails_the_whole_file() {
    let dir = tempfile::tempdir().unwrap();
    let cards = grid(6000.0, 1.0);
    let path = write(
        dir.path(),
        "backwards.fits",
        vec![image(cards.clone(), vec![0.5; 2]), image(cards, vec![1.0; 2])],
    );
    let config = FormatConfig::from_json(
        r#"{"hdus": {"0": {"purpose": "error_variance"}, "1": {"purpose": "science"}},
            "units": {"flux_unit": "count"}, "valid_wcs": true}"#,
    )
    .unwrap();

    let registry = FormatRegistry::with_builtin_formats();
    let err = registry
        .read_with_config(&path, SINGLE_SPLIT_LABEL, &config)
        .unwrap_err();
    assert!(matches!(
        err,
        SpectraError::Association {
            purpose: Purpose::ErrorVariance
        }
    ));
}

#[test]
fn one_error_unit_per_spectrum() {
    let dir = tempfile::tempdir().unwrap();
    let cards = grid(6000.0, 1.0);
    let path = write(
        dir.path(),
        "two_errors.fits",
        vec![
            image(cards.clone(), vec![1.0; 3]),
            image(cards.clone(), vec![0.25; 3]),
            image(cards, vec![0.9; 3]),
        ],
    );
    let config = FormatConfig::from_json(
        r#"{"hdus": {"0": {"purpose": "science"}, "1": {"purpose": "error_variance"},
                     "2": {"purpose": "error_stdev"}},
            "units": {"flux_unit": "count"}, "valid_wcs": true}"#,
    )
    .unwrap();

    let registry = FormatRegistry::with_builtin_formats();
    assert!(matches!(
        registry.read_with_config(&path, SINGLE_SPLIT_LABEL, &config),
        Err(SpectraError::Association {
            purpose: Purpose::ErrorStdev
        })
    ));
}

#[test]
fn keyword_guessing_rejects_unnamed_extensions() {
    let dir = tempfile::tempdir().unwrap();
    let cards = grid(6000.0, 1.0);
    let path = write(
        dir.path(),
        "unnamed.fits",
        vec![image(cards.clone(), vec![1.0; 2]), image(cards, vec![0.1; 2])],
    );
    let config = FormatConfig::from_json(
        r#"{"all_keywords": true, "units": {"flux_unit": "count"}, "valid_wcs": true}"#,
    )
    .unwrap();
    let registry = FormatRegistry::with_builtin_formats();
    assert!(matches!(
        registry.read_with_config(&path, SINGLE_SPLIT_LABEL, &config),
        Err(SpectraError::PurposeResolution(_))
    ));
}

#[test]
fn multiline_rows_share_one_header() {
    let dir = tempfile::tempdir().unwrap();
    let mut header: fits_spectra::fits::header::Header = grid(5000.0, 2.0).into_iter().collect();
    header.insert("OBJECT", "field 7");
    header.insert("ROW1", "spectrum");
    header.insert("ROW2", "variance");
    header.insert("ROW3", "spectrum");
    header.insert("ROW4", "sky");
    let rows = [
        vec![1.0, 2.0],
        vec![0.1, 0.1],
        vec![3.0, 4.0],
        vec![9.0, 9.0],
    ];
    let path = dir.path().join("multiline.fits");
    FitsFile::new(vec![Hdu::new(header, Some(ImageData::rows_of(&rows).unwrap()))])
        .write_to_path(&path)
        .unwrap();

    let config = FormatConfig::from_json(
        r#"{"all_keywords": true, "units": {"flux_unit": "count"}, "label_with_purpose": true}"#,
    )
    .unwrap();
    let registry = FormatRegistry::with_builtin_formats();
    let spectra = registry
        .read_with_config(&path, MULTILINE_SINGLE_LABEL, &config)
        .unwrap();

    assert_eq!(spectra.len(), 3);
    assert_eq!(spectra[0].wavelength(), &[5000.0, 5002.0]);
    assert_eq!(
        spectra[0].uncertainty().map(|u| u.kind),
        Some(UncertaintyKind::Variance)
    );
    assert!(spectra[1].uncertainty().is_none());
    assert_eq!(spectra[2].purpose(), PurposeGroup::Sky);
    assert_eq!(
        spectra.labels(),
        vec![
            Some("field 7 (reduced) #1"),
            Some("field 7 (reduced) #2"),
            Some("field 7 (sky) #3"),
        ]
    );
}

#[test]
fn collision_only_suffixes() {
    let dir = tempfile::tempdir().unwrap();
    let cards = grid(6000.0, 1.0);
    let path = write(
        dir.path(),
        "pair.fits",
        vec![
            image(with(cards.clone(), &[("OBJECT", text("a"))]), vec![1.0]),
            image(with(cards.clone(), &[("OBJECT", text("a"))]), vec![2.0]),
            image(with(cards, &[("OBJECT", text("b"))]), vec![3.0]),
        ],
    );
    let config = FormatConfig::from_json(
        r#"{"hdus": {"cycle": {"0": {"purpose": "science"}}},
            "units": {"flux_unit": "count"}, "valid_wcs": true,
            "label_strategy": "suffix_collisions"}"#,
    )
    .unwrap();
    let registry = FormatRegistry::with_builtin_formats();
    let spectra = registry
        .read_with_config(&path, SINGLE_SPLIT_LABEL, &config)
        .unwrap();
    assert_eq!(spectra.labels(), vec![Some("a #1"), Some("a #2"), Some("b")]);
}

#[test]
fn user_formats_join_identification() {
    let dir = tempfile::tempdir().unwrap();
    let cards = with(
        grid(6000.0, 1.0),
        &[("TELESCOP", text("UKST")), ("BUNIT", text("count"))],
    );
    let path = write(dir.path(), "sixdf.fits", vec![image(cards, vec![1.0, 2.0])]);

    let mut registry = FormatRegistry::with_builtin_formats();
    let config = FormatConfig::from_json(
        r#"{"hdus": {"0": {"purpose": "combined_science"}}, "all_standard_units": true, "valid_wcs": true}"#,
    )
    .unwrap();
    registry
        .register(
            FormatSpec::fits("6dF", Layout::SingleSplit, config).identified_by(|probe: &Probe| {
                probe
                    .primary_header()
                    .and_then(|h| h.get_str("TELESCOP"))
                    .is_some_and(|t| t == "UKST")
            }),
        )
        .unwrap();

    assert_eq!(registry.best_format(&path).unwrap(), "6dF");
    let spectra = registry.read(&path, None).unwrap();
    assert_eq!(spectra[0].purpose(), PurposeGroup::Combined);

    let bad = FormatConfig {
        all_keywords: true,
        ..FormatConfig::default()
    };
    assert!(matches!(
        registry.register(FormatSpec::fits("broken", Layout::SingleSplit, bad)),
        Err(SpectraError::Configuration(_))
    ));
}
