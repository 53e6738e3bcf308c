use std::fmt;

// ---------------------------------------------------------------------------
// HeaderValue – the value field of one header card
// ---------------------------------------------------------------------------

/// A dynamically-typed header value, one per FITS value type.
/// Labels and purpose guesses are built from these, so `HeaderValue` is `Ord`
/// and hashable for use in sets.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    String(String),
    Integer(i64),
    Float(f64),
    Logical(bool),
    /// A card with `=` but an empty value field.
    Undefined,
}

impl Eq for HeaderValue {}

impl PartialOrd for HeaderValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeaderValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use HeaderValue::*;
        fn discriminant(v: &HeaderValue) -> u8 {
            match v {
                Undefined => 0,
                Logical(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Undefined, Undefined) => std::cmp::Ordering::Equal,
            (Logical(a), Logical(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for HeaderValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            HeaderValue::String(s) => s.hash(state),
            HeaderValue::Integer(i) => i.hash(state),
            HeaderValue::Float(f) => f.to_bits().hash(state),
            HeaderValue::Logical(b) => b.hash(state),
            HeaderValue::Undefined => {}
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::String(s) => write!(f, "{s}"),
            HeaderValue::Integer(i) => write!(f, "{i}"),
            HeaderValue::Float(v) => write!(f, "{v}"),
            HeaderValue::Logical(true) => write!(f, "T"),
            HeaderValue::Logical(false) => write!(f, "F"),
            HeaderValue::Undefined => Ok(()),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::String(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::String(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Integer(value)
    }
}

impl From<f64> for HeaderValue {
    fn from(value: f64) -> Self {
        HeaderValue::Float(value)
    }
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        HeaderValue::Logical(value)
    }
}

impl HeaderValue {
    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Float(v) => Some(*v),
            HeaderValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&fitrs::HeaderValue> for HeaderValue {
    fn from(value: &fitrs::HeaderValue) -> Self {
        match value {
            fitrs::HeaderValue::CharacterString(s) => HeaderValue::String(s.trim_end().to_string()),
            fitrs::HeaderValue::Logical(b) => HeaderValue::Logical(*b),
            fitrs::HeaderValue::IntegerNumber(i) => HeaderValue::Integer(i64::from(*i)),
            fitrs::HeaderValue::RealFloatingNumber(f) => HeaderValue::Float(*f),
            // Complex values never carry spectrum metadata.
            _ => HeaderValue::Undefined,
        }
    }
}

// ---------------------------------------------------------------------------
// Header – ordered keyword → value cards of one HDU
// ---------------------------------------------------------------------------

/// One `KEYWORD = value` card.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub keyword: String,
    pub value: HeaderValue,
}

/// The header of one HDU. Keywords are upper-cased and unique; card order is
/// preserved for writing back out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, keyword: &str) -> Option<&HeaderValue> {
        let keyword = keyword.to_ascii_uppercase();
        self.cards
            .iter()
            .find(|card| card.keyword == keyword)
            .map(|card| &card.value)
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(HeaderValue::as_f64)
    }

    pub fn get_i64(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(HeaderValue::as_i64)
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(HeaderValue::as_str)
    }

    /// Insert or replace a card, keeping the position of an existing one.
    pub fn insert(&mut self, keyword: &str, value: impl Into<HeaderValue>) {
        let card = Card {
            keyword: keyword.to_ascii_uppercase(),
            value: value.into(),
        };
        match self.cards.iter_mut().find(|c| c.keyword == card.keyword) {
            Some(existing) => *existing = card,
            None => self.cards.push(card),
        }
    }

    pub fn remove(&mut self, keyword: &str) -> Option<HeaderValue> {
        let keyword = keyword.to_ascii_uppercase();
        let pos = self.cards.iter().position(|c| c.keyword == keyword)?;
        Some(self.cards.remove(pos).value)
    }

    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Whether this is an extension header (carries `XTENSION`).
    pub fn is_extension(&self) -> bool {
        self.contains("XTENSION")
    }
}

impl<K: AsRef<str>, V: Into<HeaderValue>> FromIterator<(K, V)> for Header {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut header = Header::new();
        for (k, v) in iter {
            header.insert(k.as_ref(), v);
        }
        header
    }
}
