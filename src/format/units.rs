use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{Result, SpectraError};

/// A physical unit: a numeric scale times a product of named units raised
/// to integer powers, e.g. `1e-17 erg s-1 cm-2 A-1`.
#[derive(Debug, Clone)]
pub struct Unit {
    scale: f64,
    terms: Vec<(&'static str, i32)>,
}

/// Symbols accepted verbatim (case-sensitive).
const SYMBOLS: &[&str] = &[
    "ct", "Angstrom", "nm", "um", "mm", "cm", "m", "km", "erg", "J", "W", "s", "Hz", "Jy", "mJy",
    "uJy", "A", "adu", "electron", "photon", "pix", "sr", "arcsec", "deg", "rad", "mag", "eV",
    "keV", "Ry", "yr", "d", "h", "min", "g", "kg",
];

/// Spellings matched case-insensitively.
const ALIASES: &[(&str, &str)] = &[
    ("count", "ct"),
    ("counts", "ct"),
    ("cts", "ct"),
    ("angstrom", "Angstrom"),
    ("angstroms", "Angstrom"),
    ("ang", "Angstrom"),
    ("aa", "Angstrom"),
    ("micron", "um"),
    ("microns", "um"),
    ("pixel", "pix"),
    ("pixels", "pix"),
    ("electrons", "electron"),
    ("photons", "photon"),
    ("sec", "s"),
    ("jansky", "Jy"),
];

const LENGTHS_IN_METRES: &[(&str, f64)] = &[
    ("Angstrom", 1e-10),
    ("nm", 1e-9),
    ("um", 1e-6),
    ("mm", 1e-3),
    ("cm", 1e-2),
    ("m", 1.0),
    ("km", 1e3),
];

fn canonical(name: &str) -> Option<&'static str> {
    if let Some(symbol) = SYMBOLS.iter().find(|s| **s == name) {
        return Some(*symbol);
    }
    let lower = name.to_ascii_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, symbol)| *symbol)
}

impl Unit {
    pub fn dimensionless() -> Self {
        Self {
            scale: 1.0,
            terms: Vec::new(),
        }
    }

    fn named(symbol: &'static str) -> Self {
        Self {
            scale: 1.0,
            terms: vec![(symbol, 1)],
        }
    }

    pub fn count() -> Self {
        Self::named("ct")
    }

    pub fn angstrom() -> Self {
        Self::named("Angstrom")
    }

    pub fn pixel() -> Self {
        Self::named("pix")
    }

    /// Parse a unit string as written in survey headers and format configs:
    /// `count`, `Angstrom`, `10^-17 erg/s/cm^2/A`, `1e-17 erg s-1 cm-2`,
    /// `count/Angstrom`. A `/` divides by the next factor only. The empty
    /// string is dimensionless.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |reason: &str| SpectraError::InvalidUnit {
            unit: text.to_string(),
            reason: reason.to_string(),
        };

        let mut unit = Unit::dimensionless();
        let mut chars = text.char_indices().peekable();
        let mut divide_next = false;

        while let Some(&(start, c)) = chars.peek() {
            if c.is_whitespace() || c == '*' || c == '.' {
                chars.next();
                continue;
            }
            if c == '/' {
                if divide_next {
                    return Err(invalid("dangling '/'"));
                }
                divide_next = true;
                chars.next();
                continue;
            }
            let sign = if divide_next { -1 } else { 1 };
            divide_next = false;

            if c.is_ascii_digit() || c == '+' || c == '-' {
                let end = scan_number(&mut chars, text.len());
                let base: f64 = text[start..end]
                    .parse()
                    .map_err(|_| invalid("bad numeric factor"))?;
                let power = scan_power(&mut chars, text, false).map_err(|r| invalid(r))? * sign;
                // 10^n is taken literally so it compares equal to a written 1en
                unit.scale *= if base == 10.0 {
                    format!("1e{power}").parse().unwrap_or_else(|_| base.powi(power))
                } else {
                    base.powi(power)
                };
            } else if c.is_ascii_alphabetic() {
                let mut end = start;
                while let Some(&(i, ch)) = chars.peek() {
                    if ch.is_ascii_alphabetic() || ch == '_' {
                        end = i + ch.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let name = &text[start..end];
                let symbol = canonical(name).ok_or_else(|| invalid(&format!("unknown unit '{name}'")))?;
                let power = scan_power(&mut chars, text, true).map_err(|r| invalid(r))?;
                unit.push_term(symbol, power * sign);
            } else {
                return Err(invalid(&format!("unexpected character '{c}'")));
            }
        }

        if divide_next {
            return Err(invalid("dangling '/'"));
        }
        Ok(unit)
    }

    fn push_term(&mut self, symbol: &'static str, power: i32) {
        match self.terms.iter_mut().find(|(s, _)| *s == symbol) {
            Some((_, p)) => *p += power,
            None => self.terms.push((symbol, power)),
        }
        self.terms.retain(|(_, p)| *p != 0);
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn is_dimensionless(&self) -> bool {
        self.terms.is_empty()
    }

    /// `factor` × this unit.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            scale: self.scale * factor,
            terms: self.terms.clone(),
        }
    }

    pub fn powi(&self, n: i32) -> Self {
        Self {
            scale: self.scale.powi(n),
            terms: self
                .terms
                .iter()
                .filter(|_| n != 0)
                .map(|(s, p)| (*s, p * n))
                .collect(),
        }
    }

    /// Size of this unit in metres, when it is a plain length.
    pub fn in_metres(&self) -> Option<f64> {
        match self.terms.as_slice() {
            [(symbol, 1)] => LENGTHS_IN_METRES
                .iter()
                .find(|(s, _)| s == symbol)
                .map(|(_, metres)| metres * self.scale),
            _ => None,
        }
    }

    /// Factor converting a value in `self` into `other`, for length units.
    pub fn conversion_factor(&self, other: &Unit) -> Option<f64> {
        if self == other {
            return Some(1.0);
        }
        Some(self.in_metres()? / other.in_metres()?)
    }

    fn sorted_terms(&self) -> Vec<(&'static str, i32)> {
        let mut terms = self.terms.clone();
        terms.sort();
        terms
    }
}

/// Read the extent of a numeric literal (with optional `e` exponent).
fn scan_number(chars: &mut Peekable<CharIndices<'_>>, len: usize) -> usize {
    let mut end = len;
    let mut previous: Option<char> = None;
    let mut first = true;
    while let Some(&(i, c)) = chars.peek() {
        let accept = c.is_ascii_digit()
            || c == '.'
            || ((c == '+' || c == '-') && (first || matches!(previous, Some('e' | 'E'))))
            || ((c == 'e' || c == 'E') && matches!(previous, Some(p) if p.is_ascii_digit()));
        if !accept {
            end = i;
            break;
        }
        previous = Some(c);
        first = false;
        chars.next();
    }
    end
}

/// Read an optional `^n`, `**n` or (for names) bare `n` exponent.
fn scan_power(
    chars: &mut Peekable<CharIndices<'_>>,
    text: &str,
    allow_bare: bool,
) -> std::result::Result<i32, &'static str> {
    let explicit = match chars.peek() {
        Some(&(_, '^')) => {
            chars.next();
            true
        }
        Some(&(i, '*')) if text[i..].starts_with("**") => {
            chars.next();
            chars.next();
            true
        }
        _ => false,
    };

    let start = match chars.peek() {
        Some(&(i, c)) if c.is_ascii_digit() || c == '-' || c == '+' => {
            if !explicit && !allow_bare {
                return Ok(1);
            }
            i
        }
        _ if explicit => return Err("missing exponent"),
        _ => return Ok(1),
    };

    let mut end = text.len();
    let mut first = true;
    while let Some(&(i, c)) = chars.peek() {
        if c.is_ascii_digit() || (first && (c == '-' || c == '+')) {
            first = false;
            chars.next();
        } else {
            end = i;
            break;
        }
    }
    text[start..end].parse().map_err(|_| "bad exponent")
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.scale == other.scale && self.sorted_terms() == other.sorted_terms()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.scale != 1.0 || self.terms.is_empty() {
            parts.push(format!("{}", self.scale));
        }
        for (symbol, power) in &self.terms {
            if *power == 1 {
                parts.push(symbol.to_string());
            } else {
                parts.push(format!("{symbol}{power}"));
            }
        }
        f.write_str(&parts.join(" "))
    }
}

impl std::str::FromStr for Unit {
    type Err = SpectraError;

    fn from_str(s: &str) -> Result<Self> {
        Unit::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("count", Unit::count())]
    #[case("Counts", Unit::count())]
    #[case("Angstrom", Unit::angstrom())]
    #[case("", Unit::dimensionless())]
    fn parses_plain_names(#[case] text: &str, #[case] expected: Unit) {
        assert_eq!(Unit::parse(text).unwrap(), expected);
    }

    #[test]
    fn scaled_flux_density() {
        let unit = Unit::parse("10^-17 erg/s/cm^2/A").unwrap();
        let same = Unit::parse("1e-17 erg s-1 cm-2 A-1").unwrap();
        assert_eq!(unit, same);
        assert_eq!(unit.scale(), 1e-17);
        assert!(same.to_string().ends_with("erg s-1 cm-2 A-1"));
    }

    #[test]
    fn division_applies_to_the_next_factor_only() {
        let unit = Unit::parse("count/Angstrom").unwrap();
        assert_ne!(unit, Unit::count());
        let expected = Unit::parse("ct Angstrom**-1").unwrap();
        assert_eq!(unit, expected);
    }

    #[test]
    fn unknown_names_are_rejected() {
        let err = Unit::parse("furlong").unwrap_err();
        assert!(matches!(err, SpectraError::InvalidUnit { .. }));
        assert!(Unit::parse("erg/").is_err());
        assert!(Unit::parse("cm^").is_err());
    }

    #[test]
    fn length_conversion() {
        let nm = Unit::parse("nm").unwrap();
        let factor = nm.conversion_factor(&Unit::angstrom()).unwrap();
        assert!((factor - 10.0).abs() < 1e-9);
        assert_eq!(Unit::count().conversion_factor(&Unit::angstrom()), None);
    }

    #[test]
    fn squared_units() {
        let variance = Unit::parse("2 ct").unwrap().powi(2);
        assert_eq!(variance, Unit::parse("4 ct^2").unwrap());
        assert_eq!(Unit::count().powi(0), Unit::dimensionless());
    }
}
