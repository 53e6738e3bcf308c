mod common;

use std::path::Path;

use common::{grid, image, text, with, write};
use fits_spectra::data::{export, filter, loader};
use fits_spectra::format::purpose::{PurposeGroup, UncertaintyKind};
use fits_spectra::format::surveys::MARZ_LABEL;
use fits_spectra::marz::{self, MARZ_JSON_LABEL};
use fits_spectra::registry::FormatRegistry;
use fits_spectra::{transform, SpectraError};

/// A MARZ-layout FITS file: science, variance, sky and a skipped unit.
fn marz_fits(dir: &Path) -> std::path::PathBuf {
    let cards = grid(3800.0, 1.0);
    write(
        dir,
        "marz.fits",
        vec![
            image(
                with(
                    cards.clone(),
                    &[("SOURCE", text("Combined spectra")), ("OBJECT", text("QSO 1"))],
                ),
                vec![1.0, f64::NAN, 3.0],
            ),
            image(cards.clone(), vec![0.25, 0.25, 0.25]),
            image(cards.clone(), vec![7.0, 8.0, 9.0]),
            image(cards, vec![0.0; 3]),
        ],
    )
}

#[test]
fn marz_fits_to_json_and_back() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FormatRegistry::with_builtin_formats();
    let fits = marz_fits(dir.path());

    assert_eq!(registry.best_format(&fits).unwrap(), MARZ_LABEL);
    let spectra = registry.read(&fits, None).unwrap();
    assert_eq!(spectra.purposes().len(), 2);

    let json = dir.path().join("qso.json");
    registry.write(&spectra, &json, None).unwrap();
    assert_eq!(registry.best_format(&json).unwrap(), MARZ_JSON_LABEL);

    let back = registry.read(&json, None).unwrap();
    assert_eq!(back.len(), 2);
    let reduced = back.first(PurposeGroup::Reduced).unwrap();
    assert_eq!(reduced.wavelength(), &[3800.0, 3801.0, 3802.0]);
    assert!(reduced.flux()[1].is_nan());
    let variance = reduced.uncertainty().unwrap();
    assert_eq!(variance.kind, UncertaintyKind::Variance);
    assert_eq!(variance.values, vec![0.25; 3]);
    assert_eq!(back.first(PurposeGroup::Sky).unwrap().flux(), &[7.0, 8.0, 9.0]);
}

#[test]
fn only_marz_json_is_writable() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FormatRegistry::with_builtin_formats();
    let spectra = registry.read(&marz_fits(dir.path()), None).unwrap();
    assert!(matches!(
        registry.write(&spectra, &dir.path().join("out.fits"), None),
        Err(SpectraError::NoMatchingFormat(_))
    ));
    assert!(registry
        .write(&spectra, &dir.path().join("out.json"), Some(MARZ_LABEL))
        .is_err());
}

#[test]
fn template_file_through_the_loader() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("templates.json");
    std::fs::write(
        &path,
        r#"[{"spec": [1, 2, 3], "start_lambda": 0, "end_lambda": 2, "log_linear": false, "name": "Test"}]"#,
    )
    .unwrap();

    let registry = FormatRegistry::with_builtin_formats();
    let templates = loader::load_file(&registry, &path, None).unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].wavelength(), &[0.0, 1.0, 2.0]);
    assert_eq!(templates[0].flux(), &[1.0, 2.0, 3.0]);
    assert_eq!(templates[0].label(), Some("Test"));

    assert!(registry.whatformat(&path, None).unwrap().is_empty());
    assert_eq!(marz::read_template_file(&path).unwrap().len(), 1);
}

#[test]
fn read_filter_transform_export() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FormatRegistry::with_builtin_formats();
    let spectra = loader::load_file(&registry, &marz_fits(dir.path()), None).unwrap();

    let shown = filter::filter_spectra(&spectra, true);
    assert_eq!(shown.len(), 1);
    let rest_frame = transform::redshift_wavelength(shown[0], 0.5);
    assert_eq!(rest_frame.wavelength(), &[1900.0, 1900.5, 1901.0]);
    assert_eq!(spectra[0].wavelength()[0], 3800.0);

    let table = dir.path().join("spectra.parquet");
    export::write_parquet(&spectra, &table).unwrap();
    let loaded = loader::load_file(&registry, &table, None).unwrap();
    assert_eq!(loaded.labels(), spectra.labels());
    assert_eq!(loaded[1].flux(), spectra[1].flux());
}
