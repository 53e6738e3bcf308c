use log::debug;

use super::builder::{add_single_spectrum, SpectraMap, UnitInput};
use super::config::FormatConfig;
use crate::data::model::SpectrumCollection;
use crate::error::{Result, SpectraError};
use crate::fits::FitsFile;

/// Read the rows of the primary array as separate spectra sharing one
/// header. Rows are numbered from 1, matching `ROW<n>` / `ARRAY<n>` style
/// keywords and the keys of the format's HDU map.
pub fn read(file: &FitsFile, config: &FormatConfig) -> Result<SpectrumCollection> {
    let hdu = file
        .primary()
        .ok_or_else(|| SpectraError::fits("file has no primary HDU"))?;
    let data = hdu
        .data
        .as_ref()
        .ok_or_else(|| SpectraError::fits("primary HDU holds no data"))?;
    debug!("reading {} rows of {} points", data.len() / data.row_len().max(1), data.row_len());

    let mut map = SpectraMap::new();
    for (i, row) in data.rows().enumerate() {
        let index = i + 1;
        add_single_spectrum(
            &mut map,
            config,
            UnitInput {
                header: &hdu.header,
                data: row,
                config: config.unit(index),
                index: Some(index),
            },
        )?;
    }
    Ok(map.into_collection())
}
