use std::collections::{BTreeMap, BTreeSet};

use super::model::{Spectrum, SpectrumCollection};
use crate::fits::header::HeaderValue;
use crate::format::purpose::PurposeGroup;

// ---------------------------------------------------------------------------
// Header predicates: which values are selected per keyword
// ---------------------------------------------------------------------------

/// Per-keyword selection state: maps keyword → set of selected values.
/// Keywords absent from the map are not filtered on.
pub type FilterState = BTreeMap<String, BTreeSet<HeaderValue>>;

/// Every value each header keyword takes across `collection`.
pub fn unique_values(collection: &SpectrumCollection) -> FilterState {
    let mut values = FilterState::new();
    for spectrum in collection {
        for card in spectrum.meta.header.cards() {
            values
                .entry(card.keyword.clone())
                .or_default()
                .insert(card.value.clone());
        }
    }
    values
}

/// A [`FilterState`] with every value selected (i.e., show everything).
pub fn init_filter_state(collection: &SpectrumCollection) -> FilterState {
    unique_values(collection)
}

/// Indices of spectra that pass all active filters.
///
/// A spectrum passes a keyword filter when:
/// * The filter set for that keyword is empty → nothing selected → fails
/// * Its header value for the keyword is in the selected set → passes
/// * Its header lacks the keyword → passes only if `Undefined` is selected
pub fn filtered_indices(collection: &SpectrumCollection, filters: &FilterState) -> Vec<usize> {
    let all = unique_values(collection);
    collection
        .iter()
        .enumerate()
        .filter(|(_, spectrum)| {
            filters.iter().all(|(keyword, selected)| {
                if selected.is_empty() {
                    return false;
                }
                if all.get(keyword).is_some_and(|values| values.is_subset(selected)) {
                    return true;
                }
                match spectrum.meta.header.get(keyword) {
                    Some(value) => selected.contains(value),
                    None => selected.contains(&HeaderValue::Undefined),
                }
            })
        })
        .map(|(i, _)| i)
        .collect()
}

// ---------------------------------------------------------------------------
// Purpose-based selection
// ---------------------------------------------------------------------------

/// Spectra worth showing by default. Preferring combined data stops at the
/// first combined spectrum and never yields sky or unreduced ones.
pub fn filter_spectra(collection: &SpectrumCollection, prefer_combined: bool) -> Vec<&Spectrum> {
    let mut selected = Vec::new();
    for spectrum in collection {
        if prefer_combined {
            match spectrum.purpose() {
                PurposeGroup::Combined => {
                    selected.push(spectrum);
                    break;
                }
                PurposeGroup::Sky | PurposeGroup::Unreduced => continue,
                PurposeGroup::Reduced => {}
            }
        }
        selected.push(spectrum);
    }
    selected
}
