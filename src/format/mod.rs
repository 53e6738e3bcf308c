//! Reading FITS files through a declarative format config.
//!
//! A [`FormatConfig`] says what each HDU (or row) holds; a [`Layout`] says
//! how to walk the file. Survey dialects in [`surveys`] are just configs.

pub mod builder;
pub mod config;
pub mod labels;
pub mod multiline;
pub mod purpose;
pub mod single_split;
pub mod surveys;
pub mod units;
pub mod wcs;

use log::debug;

pub use config::{FormatConfig, HduConfig, HduMap, Layout};

use crate::data::model::SpectrumCollection;
use crate::error::Result;
use crate::fits::FitsFile;

pub const SINGLE_SPLIT_LABEL: &str = "Data Central Single-Split";
pub const MULTILINE_SINGLE_LABEL: &str = "Data Central Multiline-Single";

/// Build every spectrum in `file` and label them when the config asks to.
pub fn read_fits(file: &FitsFile, layout: Layout, config: &FormatConfig) -> Result<SpectrumCollection> {
    let mut collection = match layout {
        Layout::SingleSplit => single_split::read(file, config)?,
        Layout::MultilineSingle => multiline::read(file, config)?,
    };
    if config.label {
        let report = labels::add_labels(&mut collection, config.label_with_purpose, config.label_strategy);
        debug!(
            "labelled {} spectra, {} without a label",
            collection.len() - report.unlabeled,
            report.unlabeled
        );
    }
    Ok(collection)
}
