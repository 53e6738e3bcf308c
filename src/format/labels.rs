use std::collections::{BTreeMap, BTreeSet};

use log::warn;
use serde::Deserialize;

use crate::data::model::SpectrumCollection;
use crate::fits::header::Header;

/// Header keywords tried in order when naming a spectrum.
pub const HEADER_LABEL_KEYWORDS: &[&str] = &[
    "OBJECT", "OBJNAME", "OBS_ID", "EXTNAME", "HDUNAME", "TITLE", "ORIGIN", "ROOTNAME",
    "FILENAME", "AUTHOR", "OBSERVER", "CREATOR", "INSTRUME", "PROGRAM",
];

/// How duplicate labels are made unique.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStrategy {
    /// Any duplicate suffixes every labelled spectrum with ` #<position>`.
    #[default]
    SuffixAll,
    /// Only spectra sharing a label get the suffix.
    SuffixCollisions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelReport {
    pub unlabeled: usize,
    pub collisions: bool,
}

pub fn guess_label(header: &Header) -> Option<String> {
    HEADER_LABEL_KEYWORDS
        .iter()
        .find_map(|keyword| header.get(keyword))
        .map(|value| value.to_string())
}

/// Name every spectrum from its header, optionally followed by its purpose
/// in parentheses. Positions in suffixes are 1-based.
pub fn add_labels(
    collection: &mut SpectrumCollection,
    use_purpose: bool,
    strategy: LabelStrategy,
) -> LabelReport {
    let mut unlabeled = 0;
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for spectrum in &mut collection.spectra {
        let label = guess_label(&spectrum.meta.header).map(|label| {
            if use_purpose {
                format!("{label} ({})", spectrum.meta.purpose)
            } else {
                label
            }
        });
        match &label {
            Some(label) => *counts.entry(label.clone()).or_default() += 1,
            None => unlabeled += 1,
        }
        spectrum.meta.label = label;
    }

    let collisions = counts.len() + unlabeled < collection.len();
    if collisions {
        let shared: BTreeSet<&String> = counts
            .iter()
            .filter(|(_, n)| **n > 1)
            .map(|(label, _)| label)
            .collect();
        warn!(
            "{} spectrum label(s) used more than once, adding position suffixes",
            shared.len()
        );
        for (i, spectrum) in collection.spectra.iter_mut().enumerate() {
            let Some(label) = spectrum.meta.label.as_mut() else {
                continue;
            };
            if strategy == LabelStrategy::SuffixAll || shared.contains(&*label) {
                label.push_str(&format!(" #{}", i + 1));
            }
        }
    }

    LabelReport {
        unlabeled,
        collisions,
    }
}
