use std::fmt;

/// Special search mode of an interpretation.
///
/// The discriminant doubles as a tie-breaker when ordering states of equal
/// rank: plain name searches sort before special searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Operator {
    #[default]
    None = 0,
    /// Places of a type near the named place.
    Near = 1,
    /// Places of a type inside the named place.
    In = 2,
    /// The named place itself must be of the type.
    Name = 3,
    /// All places of the type in the search area.
    Type = 4,
    /// The postcode is the primary search term.
    Postcode = 5,
}

impl Operator {
    pub const fn sort_weight(self) -> u32 {
        self as u32
    }

    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Near => "near",
            Self::In => "in",
            Self::Name => "name",
            Self::Type => "type",
            Self::Postcode => "postcode",
        };
        f.write_str(s)
    }
}
