use log::debug;

use super::builder::{add_classified, classify_unit, SpectraMap, UnitInput};
use super::config::FormatConfig;
use crate::data::model::SpectrumCollection;
use crate::error::{Result, SpectraError};
use crate::fits::FitsFile;

/// Walk every HDU in file order, one spectrum (or uncertainty) per HDU.
/// HDUs without image data are passed over.
pub fn read(file: &FitsFile, config: &FormatConfig) -> Result<SpectrumCollection> {
    let mut map = SpectraMap::new();

    for (index, hdu) in file.iter().enumerate() {
        let Some(data) = &hdu.data else {
            debug!("HDU {index} has no image data");
            continue;
        };
        let unit = config.unit(index);
        let purpose = classify_unit(config, &hdu.header, unit, None)?;
        if purpose.group().is_none() {
            debug!("HDU {index} skipped");
            continue;
        }
        let values = data.as_vector().ok_or_else(|| {
            SpectraError::fits(format!(
                "HDU {index} holds {:?} data, expected a single spectrum",
                data.shape
            ))
        })?;
        add_classified(
            &mut map,
            config,
            purpose,
            UnitInput {
                header: &hdu.header,
                data: values,
                config: unit,
                index: None,
            },
        )?;
    }

    Ok(map.into_collection())
}
