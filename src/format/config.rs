use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::labels::LabelStrategy;
use super::purpose::Purpose;
use super::wcs::{UnitParams, WcsParams};
use crate::error::{Result, SpectraError};

// ---------------------------------------------------------------------------
// Layout – how a file's units map onto spectra
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// One spectrum per HDU.
    SingleSplit,
    /// Several spectra stored as the rows of one HDU.
    MultilineSingle,
}

// ---------------------------------------------------------------------------
// Per-unit configuration
// ---------------------------------------------------------------------------

/// Overrides for one HDU (or one 1-based row, for multi-line files).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HduConfig {
    #[serde(default)]
    pub purpose: Option<Purpose>,
    #[serde(default)]
    pub wcs: Option<WcsParams>,
    #[serde(default)]
    pub units: Option<UnitParams>,
}

impl HduConfig {
    pub fn purpose(purpose: Purpose) -> Self {
        Self {
            purpose: Some(purpose),
            ..Default::default()
        }
    }

    pub fn with_flux_unit(mut self, unit: &str) -> Self {
        self.units = Some(UnitParams {
            flux_unit: Some(unit.to_string()),
            ..Default::default()
        });
        self
    }
}

/// Unit index → configuration, with an optional repeating pattern.
///
/// JSON keys are decimal indices plus the special key `"cycle"`, whose
/// entries apply to every unit past the explicitly listed ones, repeating
/// with the length of the pattern.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, JsonValue>")]
pub struct HduMap {
    pub by_index: BTreeMap<usize, HduConfig>,
    pub cycle: Option<BTreeMap<usize, HduConfig>>,
}

impl HduMap {
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (usize, HduConfig)>,
    {
        Self {
            by_index: entries.into_iter().collect(),
            cycle: None,
        }
    }

    pub fn with_cycle<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (usize, HduConfig)>,
    {
        self.cycle = Some(entries.into_iter().collect());
        self
    }

    /// Configuration for unit `index`. Cycle positions count from the
    /// first unit not listed explicitly.
    pub fn lookup(&self, index: usize) -> Option<&HduConfig> {
        if let Some(config) = self.by_index.get(&index) {
            return Some(config);
        }
        let cycle = self.cycle.as_ref().filter(|c| !c.is_empty())?;
        let start = self.by_index.len();
        if index < start {
            return None;
        }
        cycle.get(&((index - start) % cycle.len()))
    }

    /// Every configured entry, explicit ones first.
    pub fn entries(&self) -> impl Iterator<Item = &HduConfig> {
        self.by_index
            .values()
            .chain(self.cycle.iter().flat_map(|c| c.values()))
    }

    fn validate(&self) -> Result<()> {
        if let Some(cycle) = &self.cycle {
            if cycle.is_empty() {
                return Err(SpectraError::config("cycle must list at least one entry"));
            }
            if cycle.keys().copied().ne(0..cycle.len()) {
                return Err(SpectraError::config(
                    "cycle entries must be numbered 0, 1, 2, ... without gaps",
                ));
            }
        }
        Ok(())
    }
}

impl TryFrom<BTreeMap<String, JsonValue>> for HduMap {
    type Error = SpectraError;

    fn try_from(raw: BTreeMap<String, JsonValue>) -> Result<Self> {
        fn index(key: &str) -> Result<usize> {
            key.trim()
                .parse()
                .map_err(|_| SpectraError::config(format!("'{key}' is not an HDU index")))
        }

        let mut map = HduMap::default();
        for (key, value) in raw {
            if key == "cycle" {
                let entries: BTreeMap<String, HduConfig> = serde_json::from_value(value)?;
                let cycle = entries
                    .into_iter()
                    .map(|(k, v)| Ok((index(&k)?, v)))
                    .collect::<Result<_>>()?;
                map.cycle = Some(cycle);
            } else {
                map.by_index.insert(index(&key)?, serde_json::from_value(value)?);
            }
        }
        Ok(map)
    }
}

// ---------------------------------------------------------------------------
// FormatConfig – one survey dialect
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// Static description of one file dialect, fed to a traversal [`Layout`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatConfig {
    #[serde(default, alias = "hdu")]
    pub hdus: Option<HduMap>,
    #[serde(default)]
    pub wcs: Option<WcsParams>,
    #[serde(default)]
    pub units: Option<UnitParams>,
    /// Take the flux unit from `BUNIT` instead of `units`.
    #[serde(default)]
    pub all_standard_units: bool,
    /// Guess every unit's purpose from its header.
    #[serde(default)]
    pub all_keywords: bool,
    /// Trust the coordinate system embedded in each header.
    #[serde(default)]
    pub valid_wcs: bool,
    /// Header keyword (suffixed with the row for multi-line files) holding
    /// the purpose name.
    #[serde(default)]
    pub purpose_prefix: Option<String>,
    #[serde(default = "default_true")]
    pub label: bool,
    #[serde(default)]
    pub label_with_purpose: bool,
    #[serde(default)]
    pub label_strategy: LabelStrategy,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            hdus: None,
            wcs: None,
            units: None,
            all_standard_units: false,
            all_keywords: false,
            valid_wcs: false,
            purpose_prefix: None,
            label: true,
            label_with_purpose: false,
            label_strategy: LabelStrategy::default(),
        }
    }
}

impl FormatConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: FormatConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Per-unit configuration for `index`, if the config lists one.
    pub fn unit(&self, index: usize) -> Option<&HduConfig> {
        self.hdus.as_ref().and_then(|h| h.lookup(index))
    }

    /// Base WCS parameters overlaid with the unit's own.
    pub fn wcs_for(&self, unit: Option<&HduConfig>) -> WcsParams {
        let base = self.wcs.clone().unwrap_or_default();
        match unit.and_then(|u| u.wcs.as_ref()) {
            Some(overrides) => base.merged(overrides),
            None => base,
        }
    }

    /// Base unit parameters overlaid with the unit's own; `BUNIT` when
    /// standard units are requested.
    pub fn units_for(&self, unit: Option<&HduConfig>) -> UnitParams {
        if self.all_standard_units {
            return UnitParams::standard();
        }
        let base = self.units.clone().unwrap_or_default();
        match unit.and_then(|u| u.units.as_ref()) {
            Some(overrides) => base.merged(overrides),
            None => base,
        }
    }

    /// Reject combinations that could never read a file.
    pub fn validate(&self) -> Result<()> {
        if let Some(hdus) = &self.hdus {
            hdus.validate()?;
        }
        if self.hdus.is_none() && self.purpose_prefix.is_none() && !self.all_keywords {
            return Err(SpectraError::config(
                "a format needs an HDU map, a purpose prefix or keyword guessing",
            ));
        }

        let entries: Vec<Option<&HduConfig>> = match &self.hdus {
            Some(hdus) if !self.all_keywords => hdus.entries().map(Some).collect(),
            _ => vec![None],
        };
        for entry in entries {
            if !self.units_for(entry).has_flux_unit() {
                return Err(SpectraError::config("no source for the flux unit"));
            }
            let wcs = self.wcs_for(entry);
            if !self.valid_wcs && !wcs.is_empty() {
                wcs.validate()?;
            }
        }
        Ok(())
    }
}
