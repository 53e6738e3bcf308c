use std::path::Path;

use fitrs::Fits;

use super::header::{Header, HeaderValue};
use super::{FitsFile, Hdu};
use crate::error::{Result, SpectraError};

/// Keywords fitrs generates itself; copies in user headers are dropped.
const STRUCTURAL: &[&str] = &[
    "SIMPLE", "XTENSION", "BITPIX", "NAXIS", "EXTEND", "PCOUNT", "GCOUNT", "BSCALE", "BZERO",
    "BLANK", "END",
];

fn is_structural(keyword: &str) -> bool {
    STRUCTURAL.contains(&keyword)
        || keyword
            .strip_prefix("NAXIS")
            .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
}

impl FitsFile {
    /// Write every HDU as 64-bit float data. The first HDU becomes the
    /// primary array, the rest `IMAGE` extensions.
    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        let mut hdus = self.iter().map(to_fitrs);
        let primary = hdus
            .next()
            .ok_or_else(|| SpectraError::fits("a FITS file needs a primary HDU"))?;
        let failed = |e: std::io::Error| SpectraError::fits(format!("writing {}: {e}", path.display()));

        let mut fits = Fits::create(path, primary).map_err(failed)?;
        for hdu in hdus {
            fits.push(hdu).map_err(failed)?;
        }
        Ok(())
    }
}

fn to_fitrs(hdu: &Hdu) -> fitrs::Hdu {
    let mut out = match &hdu.data {
        Some(data) => fitrs::Hdu::new(&data.shape, data.values.clone()),
        None => fitrs::Hdu::empty(),
    };
    copy_cards(&hdu.header, &mut out);
    out
}

fn copy_cards(header: &Header, out: &mut fitrs::Hdu) {
    for card in header.cards().filter(|c| !is_structural(&c.keyword)) {
        let keyword = card.keyword.as_str();
        match &card.value {
            HeaderValue::String(s) => out.insert(keyword, s.as_str()),
            HeaderValue::Integer(i) => match i32::try_from(*i) {
                Ok(i) => out.insert(keyword, i),
                Err(_) => out.insert(keyword, *i as f64),
            },
            HeaderValue::Float(f) => out.insert(keyword, *f),
            HeaderValue::Logical(b) => out.insert(keyword, fitrs::HeaderValue::Logical(*b)),
            HeaderValue::Undefined => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::ImageData;

    #[test]
    fn structural_keywords_are_regenerated() {
        assert!(is_structural("NAXIS2"));
        assert!(is_structural("BITPIX"));
        assert!(!is_structural("NAXISX"));
        assert!(!is_structural("CRVAL1"));
    }

    #[test]
    fn header_only_primary_keeps_its_cards() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("header_only.fits");
        let mut header = Header::new();
        header.insert("ORIGIN", "test");
        header.insert("NAXIS", 5i64);
        let mut science = Header::new();
        science.insert("EXPTIME", 1200i64);
        FitsFile::new(vec![
            Hdu::new(header, None),
            Hdu::new(science, Some(ImageData::vector(vec![1.0, 2.0]))),
        ])
        .write_to_path(&path)
        .unwrap();

        let file = FitsFile::open(&path).unwrap();
        let primary = file.primary().unwrap();
        assert_eq!(primary.header.get_str("ORIGIN"), Some("test"));
        assert!(primary.data.is_none());
        assert_eq!(file.get(1).unwrap().header.get_i64("EXPTIME"), Some(1200));
    }

    #[test]
    fn empty_files_cannot_be_written() {
        let dir = tempfile::tempdir().unwrap();
        let err = FitsFile::default()
            .write_to_path(&dir.path().join("empty.fits"))
            .unwrap_err();
        assert!(matches!(err, SpectraError::Fits(_)));
    }
}
