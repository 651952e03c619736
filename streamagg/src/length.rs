use std::fmt;
use std::ops::Add;

/// Byte count of a source or of the whole aggregate, if known in advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Length {
    Known(u64),
    Unknown,
}

impl Length {
    #[must_use]
    pub fn known(self) -> Option<u64> {
        match self {
            Length::Known(n) => Some(n),
            Length::Unknown => None,
        }
    }

    /// Signed form with `-1` for unknown, as used for `Content-Length`-style fields
    #[must_use]
    pub fn as_i64(self) -> i64 {
        match self {
            Length::Known(n) => i64::try_from(n).unwrap_or(i64::MAX),
            Length::Unknown => -1,
        }
    }
}

impl Default for Length {
    fn default() -> Self {
        Length::Known(0)
    }
}

impl From<Option<u64>> for Length {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Length::Unknown, Length::Known)
    }
}

/// Unknown absorbs everything
impl Add for Length {
    type Output = Length;

    fn add(self, rhs: Length) -> Length {
        match (self, rhs) {
            (Length::Known(a), Length::Known(b)) => Length::Known(a.saturating_add(b)),
            _ => Length::Unknown,
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Known(n) => write!(f, "{n}"),
            Length::Unknown => write!(f, "unknown"),
        }
    }
}
