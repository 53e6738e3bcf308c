use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectraError};
use crate::fits::header::Header;

// ---------------------------------------------------------------------------
// Purpose – the semantic role of one data unit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Skip,
    Science,
    ErrorStdev,
    ErrorVariance,
    ErrorInversevariance,
    Sky,
    CombinedScience,
    CombinedErrorStdev,
    CombinedErrorVariance,
    CombinedErrorInversevariance,
    UnreducedScience,
    UnreducedErrorStdev,
    UnreducedErrorVariance,
    UnreducedErrorInversevariance,
}

/// Coarse grouping stored in spectrum metadata. Declaration order is the
/// order groups appear in a read collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurposeGroup {
    Combined,
    Reduced,
    Unreduced,
    Sky,
}

/// How an uncertainty array is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyKind {
    StdDev,
    Variance,
    InverseVariance,
}

/// What a unit of a given purpose does to the spectrum map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Discard,
    Create,
    Attach(UncertaintyKind),
}

/// One row of the purpose lookup table.
#[derive(Debug, Clone, Copy)]
pub struct PurposeInfo {
    pub purpose: Purpose,
    pub name: &'static str,
    pub group: Option<PurposeGroup>,
    pub action: Action,
}

const fn row(
    purpose: Purpose,
    name: &'static str,
    group: Option<PurposeGroup>,
    action: Action,
) -> PurposeInfo {
    PurposeInfo {
        purpose,
        name,
        group,
        action,
    }
}

use Action::{Attach, Create, Discard};
use PurposeGroup::{Combined, Reduced, Sky, Unreduced};
use UncertaintyKind::{InverseVariance, StdDev, Variance};

/// Indexed by `Purpose as usize`.
pub const PURPOSE_TABLE: [PurposeInfo; 14] = [
    row(Purpose::Skip, "skip", None, Discard),
    row(Purpose::Science, "science", Some(Reduced), Create),
    row(Purpose::ErrorStdev, "error_stdev", Some(Reduced), Attach(StdDev)),
    row(Purpose::ErrorVariance, "error_variance", Some(Reduced), Attach(Variance)),
    row(
        Purpose::ErrorInversevariance,
        "error_inversevariance",
        Some(Reduced),
        Attach(InverseVariance),
    ),
    row(Purpose::Sky, "sky", Some(Sky), Create),
    row(Purpose::CombinedScience, "combined_science", Some(Combined), Create),
    row(
        Purpose::CombinedErrorStdev,
        "combined_error_stdev",
        Some(Combined),
        Attach(StdDev),
    ),
    row(
        Purpose::CombinedErrorVariance,
        "combined_error_variance",
        Some(Combined),
        Attach(Variance),
    ),
    row(
        Purpose::CombinedErrorInversevariance,
        "combined_error_inversevariance",
        Some(Combined),
        Attach(InverseVariance),
    ),
    row(Purpose::UnreducedScience, "unreduced_science", Some(Unreduced), Create),
    row(
        Purpose::UnreducedErrorStdev,
        "unreduced_error_stdev",
        Some(Unreduced),
        Attach(StdDev),
    ),
    row(
        Purpose::UnreducedErrorVariance,
        "unreduced_error_variance",
        Some(Unreduced),
        Attach(Variance),
    ),
    row(
        Purpose::UnreducedErrorInversevariance,
        "unreduced_error_inversevariance",
        Some(Unreduced),
        Attach(InverseVariance),
    ),
];

impl Purpose {
    pub const ALL: [Purpose; 14] = [
        Purpose::Skip,
        Purpose::Science,
        Purpose::ErrorStdev,
        Purpose::ErrorVariance,
        Purpose::ErrorInversevariance,
        Purpose::Sky,
        Purpose::CombinedScience,
        Purpose::CombinedErrorStdev,
        Purpose::CombinedErrorVariance,
        Purpose::CombinedErrorInversevariance,
        Purpose::UnreducedScience,
        Purpose::UnreducedErrorStdev,
        Purpose::UnreducedErrorVariance,
        Purpose::UnreducedErrorInversevariance,
    ];

    pub fn info(self) -> &'static PurposeInfo {
        &PURPOSE_TABLE[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.info().name
    }

    /// `None` only for [`Purpose::Skip`].
    pub fn group(self) -> Option<PurposeGroup> {
        self.info().group
    }

    pub fn action(self) -> Action {
        self.info().action
    }

    pub fn creates_spectrum(self) -> bool {
        self.action() == Action::Create
    }

    pub fn uncertainty_kind(self) -> Option<UncertaintyKind> {
        match self.action() {
            Action::Attach(kind) => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Purpose {
    type Err = SpectraError;

    fn from_str(s: &str) -> Result<Self> {
        PURPOSE_TABLE
            .iter()
            .find(|info| info.name == s)
            .map(|info| info.purpose)
            .ok_or_else(|| SpectraError::purpose(format!("'{s}' is not a valid purpose")))
    }
}

impl PurposeGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            Combined => "combined",
            Reduced => "reduced",
            Unreduced => "unreduced",
            Sky => "sky",
        }
    }
}

impl fmt::Display for PurposeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurposeGroup {
    type Err = SpectraError;

    fn from_str(s: &str) -> Result<Self> {
        [Combined, Reduced, Unreduced, Sky]
            .into_iter()
            .find(|group| group.as_str() == s)
            .ok_or_else(|| SpectraError::purpose(format!("'{s}' is not a purpose group")))
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Keywords whose value names the role of a whole HDU, in priority order.
pub const HEADER_PURPOSE_KEYWORDS: &[&str] = &["EXTNAME", "HDUNAME"];
/// Keyword stems that, suffixed with a row number, name the role of a row.
pub const HEADER_INDEX_PURPOSE_KEYWORDS: &[&str] = &["ROW", "ARRAY"];

/// Map a lower-cased, trimmed header value to a purpose.
pub fn guess_from_text(text: &str) -> Option<Purpose> {
    match text {
        "badpix" | "" => Some(Purpose::Skip),
        "sky" => Some(Purpose::Sky),
        "stdev" | "sigma" => Some(Purpose::ErrorStdev),
        "variance" => Some(Purpose::ErrorVariance),
        "spectrum" => Some(Purpose::Science),
        _ => None,
    }
}

/// Inputs for [`classify`]. Explicit configuration is consulted only when
/// keyword guessing is off.
#[derive(Debug, Clone, Copy, Default)]
pub struct PurposeRequest<'a> {
    pub purpose: Option<Purpose>,
    pub purpose_prefix: Option<&'a str>,
    pub all_keywords: bool,
    /// 1-based row number for units holding several spectra.
    pub index: Option<usize>,
}

pub fn classify(header: &Header, request: &PurposeRequest<'_>) -> Result<Purpose> {
    let purpose = if request.all_keywords {
        match request.index {
            None => guess_unit_purpose(header)?,
            Some(index) => guess_row_purpose(header, index)?,
        }
    } else if let Some(purpose) = request.purpose {
        purpose
    } else if let Some(prefix) = request.purpose_prefix {
        let keyword = match request.index {
            None => prefix.to_string(),
            Some(index) => format!("{prefix}{index}"),
        };
        let value = header
            .get(&keyword)
            .ok_or_else(|| SpectraError::purpose(format!("header has no '{keyword}'")))?;
        value.to_string().trim().parse::<Purpose>()?
    } else {
        return Err(SpectraError::config(
            "either keyword guessing must be enabled, or a purpose or purpose prefix given",
        ));
    };
    debug!("classified unit (row {:?}) as {purpose}", request.index);
    Ok(purpose)
}

fn guess_unit_purpose(header: &Header) -> Result<Purpose> {
    let first_present = HEADER_PURPOSE_KEYWORDS
        .iter()
        .find_map(|keyword| header.get(keyword));
    if let Some(purpose) =
        first_present.and_then(|value| guess_from_text(&value.to_string().trim().to_lowercase()))
    {
        return Ok(purpose);
    }
    if !header.is_extension() {
        // primary HDU
        return Ok(Purpose::Science);
    }
    Err(SpectraError::purpose(
        "extension header carries no recognised purpose keyword",
    ))
}

fn guess_row_purpose(header: &Header, index: usize) -> Result<Purpose> {
    HEADER_INDEX_PURPOSE_KEYWORDS
        .iter()
        .find_map(|stem| header.get(&format!("{stem}{index}")))
        .and_then(|value| guess_from_text(&value.to_string().trim().to_lowercase()))
        .ok_or_else(|| SpectraError::purpose(format!("row {index} has no recognised purpose keyword")))
}
