/// FITS container layer: the HDUs of a survey spectrum file, decoded by
/// `fitrs` into an owned header map and `f64` image data.
///
/// FITS format:
/// - 2880-byte blocks
/// - Header made of 80-character keyword records, terminated by `END`
/// - Data in big-endian format, padded to the next block
///
/// Only the primary array and `IMAGE` extensions are decoded; table
/// extensions are kept header-only.
pub mod header;
pub mod writer;

use std::io::Read;
use std::path::Path;

use fitrs::{Fits, FitsData};
use log::debug;

use crate::error::{Result, SpectraError};
use header::{Header, HeaderValue};

pub const BLOCK_SIZE: usize = 2880;
pub const CARD_SIZE: usize = 80;

/// File extensions recognised as FITS.
pub const FITS_FILE_EXTS: &[&str] = &["fit", "fits", "fts"];

/// Reserved keywords that carry no value of their own.
const COMMENTARY: &[&str] = &["", "COMMENT", "HISTORY", "CONTINUE", "END"];

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

/// Decoded image data, scaled by `BSCALE`/`BZERO`. `shape[0]` is `NAXIS1`,
/// the fastest-varying axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

impl ImageData {
    pub fn new(shape: Vec<usize>, values: Vec<f64>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(SpectraError::fits(format!(
                "shape {shape:?} needs {expected} values, got {}",
                values.len()
            )));
        }
        Ok(Self { shape, values })
    }

    /// A one-dimensional array.
    pub fn vector(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            values,
        }
    }

    /// A two-dimensional array of equally long rows.
    pub fn rows_of(rows: &[Vec<f64>]) -> Result<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != width) {
            return Err(SpectraError::fits("rows of unequal length"));
        }
        Ok(Self {
            shape: vec![width, rows.len()],
            values: rows.concat(),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Length of one row (`NAXIS1`).
    pub fn row_len(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Rows along `NAXIS1`; a 1-D array is a single row.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks(self.row_len().max(1))
    }

    /// The values as a vector, if every axis past the first is degenerate.
    pub fn as_vector(&self) -> Option<&[f64]> {
        if self.shape.iter().skip(1).all(|&n| n == 1) {
            Some(&self.values)
        } else {
            None
        }
    }
}

/// One header/data unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Hdu {
    pub header: Header,
    pub data: Option<ImageData>,
}

impl Hdu {
    pub fn new(header: Header, data: Option<ImageData>) -> Self {
        Self { header, data }
    }

    /// `EXTNAME` (or `HDUNAME`) if present.
    pub fn name(&self) -> Option<&str> {
        self.header
            .get_str("EXTNAME")
            .or_else(|| self.header.get_str("HDUNAME"))
    }
}

/// An opened FITS file: every HDU, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitsFile {
    hdus: Vec<Hdu>,
}

impl FitsFile {
    pub fn new(hdus: Vec<Hdu>) -> Self {
        Self { hdus }
    }

    /// Read and decode a FITS file from disk. I/O failures surface unchanged;
    /// anything that is not FITS is rejected before `fitrs` sees it.
    pub fn open(path: &Path) -> Result<Self> {
        if !is_fits_file(path)? {
            return Err(SpectraError::fits("missing SIMPLE card"));
        }
        let file_len = std::fs::metadata(path)?.len();
        let fits = Fits::open(path)
            .map_err(|e| SpectraError::fits(format!("{}: {e}", path.display())))?;

        let mut hdus = Vec::new();
        for (index, hdu) in fits.iter().enumerate() {
            let header = read_header(&hdu);
            let data_len = data_size(&header)?;
            if u64::try_from(data_len).map_or(true, |n| n > file_len) {
                return Err(SpectraError::fits(format!(
                    "HDU {index} declares {data_len} data bytes, the file has {file_len}"
                )));
            }
            let data = if is_image(&header) && data_len > 0 {
                Some(read_image(&header, hdu.read_data())?)
            } else {
                None
            };
            hdus.push(Hdu { header, data });
        }

        if hdus.is_empty() {
            return Err(SpectraError::fits("file holds no HDU"));
        }
        debug!("{}: {} HDUs", path.display(), hdus.len());
        Ok(Self { hdus })
    }

    pub fn primary(&self) -> Option<&Hdu> {
        self.hdus.first()
    }

    pub fn get(&self, index: usize) -> Option<&Hdu> {
        self.hdus.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Hdu> {
        self.hdus.iter()
    }

    pub fn push(&mut self, hdu: Hdu) {
        self.hdus.push(hdu);
    }

    pub fn len(&self) -> usize {
        self.hdus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hdus.is_empty()
    }
}

impl<'a> IntoIterator for &'a FitsFile {
    type Item = &'a Hdu;
    type IntoIter = std::slice::Iter<'a, Hdu>;

    fn into_iter(self) -> Self::IntoIter {
        self.hdus.iter()
    }
}

/// Cheap check for the mandatory first card.
pub fn looks_like_fits(bytes: &[u8]) -> bool {
    bytes.starts_with(b"SIMPLE  =")
}

/// Whether the file at `path` starts with a FITS primary header.
pub fn is_fits_file(path: &Path) -> Result<bool> {
    let mut head = Vec::with_capacity(CARD_SIZE);
    std::fs::File::open(path)?
        .take(CARD_SIZE as u64)
        .read_to_end(&mut head)?;
    Ok(looks_like_fits(&head))
}

// ---------------------------------------------------------------------------
// fitrs adapter
// ---------------------------------------------------------------------------

fn read_header(hdu: &fitrs::Hdu) -> Header {
    let mut header = Header::new();
    for (keyword, _) in hdu.iter() {
        let keyword = keyword.to_string();
        if COMMENTARY.contains(&keyword.trim()) || header.contains(&keyword) {
            continue;
        }
        let value = hdu
            .value(&keyword)
            .map_or(HeaderValue::Undefined, HeaderValue::from);
        header.insert(&keyword, value);
    }
    header
}

fn is_image(header: &Header) -> bool {
    match header.get_str("XTENSION") {
        None => true,
        Some(kind) => kind.trim() == "IMAGE",
    }
}

fn axes(header: &Header) -> Result<Vec<usize>> {
    let naxis = header
        .get_i64("NAXIS")
        .ok_or_else(|| SpectraError::missing("NAXIS"))?;
    (1..=naxis)
        .map(|i| {
            let key = format!("NAXIS{i}");
            header
                .get_i64(&key)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or(SpectraError::MissingKeyword { keyword: key })
        })
        .collect()
}

/// Bytes of data the header declares. Header values are untrusted, so any
/// overflow is a malformed file.
fn data_size(header: &Header) -> Result<usize> {
    let axes = axes(header)?;
    if axes.is_empty() {
        return Ok(0);
    }
    let overflow = || SpectraError::fits("NAXISn/PCOUNT/GCOUNT overflow the data size");
    let bitpix = header
        .get_i64("BITPIX")
        .ok_or_else(|| SpectraError::missing("BITPIX"))?;
    let width = usize::try_from(bitpix.unsigned_abs() / 8).map_err(|_| overflow())?;
    let count = |keyword: &str, default: i64| {
        usize::try_from(header.get_i64(keyword).unwrap_or(default).max(0)).map_err(|_| overflow())
    };
    let pcount = count("PCOUNT", 0)?;
    let gcount = count("GCOUNT", 1)?;

    axes.iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .and_then(|values| values.checked_add(pcount))
        .and_then(|values| values.checked_mul(gcount))
        .and_then(|values| values.checked_mul(width))
        .ok_or_else(overflow)
}

fn read_image(header: &Header, data: impl std::borrow::Borrow<FitsData>) -> Result<ImageData> {
    let (shape, values, scaled): (Vec<usize>, Vec<f64>, bool) = match data.borrow() {
        FitsData::FloatingPoint64(array) => (array.shape.clone(), array.data.clone(), true),
        FitsData::FloatingPoint32(array) => (
            array.shape.clone(),
            array.data.iter().map(|&v| f64::from(v)).collect(),
            true,
        ),
        FitsData::IntegersI32(array) => (
            array.shape.clone(),
            array
                .data
                .iter()
                .map(|v| v.map_or(f64::NAN, f64::from))
                .collect(),
            true,
        ),
        // fitrs already shifted these by BZERO
        FitsData::IntegersU32(array) => (
            array.shape.clone(),
            array
                .data
                .iter()
                .map(|v| v.map_or(f64::NAN, f64::from))
                .collect(),
            false,
        ),
        _ => return Err(SpectraError::fits("character arrays hold no spectrum")),
    };

    let values = if scaled {
        apply_scaling(
            values,
            header.get_f64("BSCALE").unwrap_or(1.0),
            header.get_f64("BZERO").unwrap_or(0.0),
        )
    } else {
        values
    };
    ImageData::new(shape, values)
}

fn apply_scaling(mut values: Vec<f64>, bscale: f64, bzero: f64) -> Vec<f64> {
    if bscale != 1.0 || bzero != 0.0 {
        for v in values.iter_mut() {
            *v = *v * bscale + bzero;
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> FitsFile {
        let mut primary = Header::new();
        primary.insert("OBJECT", "NGC 1234");
        primary.insert("CRVAL1", 4000.0);
        let mut ext = Header::new();
        ext.insert("EXTNAME", "VARIANCE");
        FitsFile::new(vec![
            Hdu::new(primary, Some(ImageData::vector(vec![1.0, 2.0, 3.0]))),
            Hdu::new(
                ext,
                Some(ImageData::rows_of(&[vec![0.5, 0.5], vec![0.25, 0.25]]).unwrap()),
            ),
        ])
    }

    #[test]
    fn written_files_decode_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.fits");
        sample_file().write_to_path(&path).unwrap();

        let decoded = FitsFile::open(&path).unwrap();
        assert_eq!(decoded.len(), 2);
        let primary = decoded.primary().unwrap();
        assert_eq!(primary.header.get_str("OBJECT"), Some("NGC 1234"));
        assert_eq!(primary.header.get_f64("CRVAL1"), Some(4000.0));
        assert_eq!(primary.data.as_ref().unwrap().values, vec![1.0, 2.0, 3.0]);

        let ext = decoded.get(1).unwrap();
        assert!(ext.header.is_extension());
        assert_eq!(ext.name(), Some("VARIANCE"));
        let rows: Vec<&[f64]> = ext.data.as_ref().unwrap().rows().collect();
        assert_eq!(rows, vec![&[0.5, 0.5][..], &[0.25, 0.25][..]]);
    }

    #[test]
    fn integer_data_is_scaled() {
        assert_eq!(apply_scaling(vec![4.0, -2.0], 0.5, 10.0), vec![12.0, 9.0]);
        assert_eq!(apply_scaling(vec![4.0], 1.0, 0.0), vec![4.0]);
    }

    #[test]
    fn rejects_non_fits_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spectrum.json");
        std::fs::write(&path, b"{\"wavelength\": []}").unwrap();
        let err = FitsFile::open(&path).unwrap_err();
        assert!(matches!(err, SpectraError::Fits(_)));
    }

    #[test]
    fn missing_files_are_io_errors() {
        let err = FitsFile::open(Path::new("/nonexistent/spectrum.fits")).unwrap_err();
        assert!(matches!(err, SpectraError::Io(_)));
    }

    #[test]
    fn oversized_axes_are_malformed_not_a_panic() {
        let header: Header = [
            ("BITPIX", HeaderValue::Integer(-64)),
            ("NAXIS", HeaderValue::Integer(2)),
            ("NAXIS1", HeaderValue::Integer(4_611_686_018_427_387_904)),
            ("NAXIS2", HeaderValue::Integer(8)),
        ]
        .into_iter()
        .collect();
        assert!(matches!(data_size(&header), Err(SpectraError::Fits(_))));

        let header: Header = [
            ("BITPIX", HeaderValue::Integer(8)),
            ("NAXIS", HeaderValue::Integer(1)),
            ("NAXIS1", HeaderValue::Integer(10)),
            ("PCOUNT", HeaderValue::Integer(i64::MAX)),
            ("GCOUNT", HeaderValue::Integer(4)),
        ]
        .into_iter()
        .collect();
        assert!(matches!(data_size(&header), Err(SpectraError::Fits(_))));
    }

    #[test]
    fn data_size_counts_every_axis() {
        let header: Header = [
            ("BITPIX", -32i64),
            ("NAXIS", 2),
            ("NAXIS1", 100),
            ("NAXIS2", 3),
        ]
        .into_iter()
        .collect();
        assert_eq!(data_size(&header).unwrap(), 1200);
        assert!(is_image(&header));
    }
}
