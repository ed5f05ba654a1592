use crate::{index::RankRange, phrase::PhraseType};

/// Address ranks a structured field asks for, plus extra ranks accepted
/// regardless of the range.
struct FieldRanks {
    range: RankRange,
    allowed: &'static [u8],
}

const fn field_ranks(field: PhraseType) -> FieldRanks {
    let (min, max, allowed): (u8, u8, &'static [u8]) = match field {
        PhraseType::Amenity | PhraseType::Street => (26, 30, &[]),
        PhraseType::City => (14, 24, &[]),
        PhraseType::County => (9, 13, &[]),
        PhraseType::State => (8, 8, &[]),
        PhraseType::Postalcode => (5, 11, &[5, 11]),
        PhraseType::Country => (4, 4, &[]),
        PhraseType::Untyped => (0, 30, &[]),
    };
    FieldRanks {
        range: RankRange::new(min, max),
        allowed,
    }
}

/// Fields dropped one at a time when a structured search finds nothing.
const RELAX_ORDER: [PhraseType; 5] = [
    PhraseType::Postalcode,
    PhraseType::Street,
    PhraseType::City,
    PhraseType::County,
    PhraseType::State,
];

/// An address given field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredQuery {
    amenity: Option<String>,
    street: Option<String>,
    city: Option<String>,
    county: Option<String>,
    state: Option<String>,
    postalcode: Option<String>,
    country: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

impl StructuredQuery {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn amenity(mut self, value: &str) -> Self {
        self.amenity = non_empty(value);
        self
    }

    #[must_use]
    pub fn street(mut self, value: &str) -> Self {
        self.street = non_empty(value);
        self
    }

    #[must_use]
    pub fn city(mut self, value: &str) -> Self {
        self.city = non_empty(value);
        self
    }

    #[must_use]
    pub fn county(mut self, value: &str) -> Self {
        self.county = non_empty(value);
        self
    }

    #[must_use]
    pub fn state(mut self, value: &str) -> Self {
        self.state = non_empty(value);
        self
    }

    #[must_use]
    pub fn postalcode(mut self, value: &str) -> Self {
        self.postalcode = non_empty(value);
        self
    }

    #[must_use]
    pub fn country(mut self, value: &str) -> Self {
        self.country = non_empty(value);
        self
    }

    /// Set a field by its name. Returns false for unknown names.
    pub fn set(&mut self, field: &str, value: &str) -> bool {
        let slot = match field {
            "amenity" => &mut self.amenity,
            "street" => &mut self.street,
            "city" => &mut self.city,
            "county" => &mut self.county,
            "state" => &mut self.state,
            "postalcode" => &mut self.postalcode,
            "country" => &mut self.country,
            _ => return false,
        };
        *slot = non_empty(value);
        true
    }

    fn slot(&self, field: PhraseType) -> Option<&str> {
        match field {
            PhraseType::Amenity => self.amenity.as_deref(),
            PhraseType::Street => self.street.as_deref(),
            PhraseType::City => self.city.as_deref(),
            PhraseType::County => self.county.as_deref(),
            PhraseType::State => self.state.as_deref(),
            PhraseType::Postalcode => self.postalcode.as_deref(),
            PhraseType::Country => self.country.as_deref(),
            PhraseType::Untyped => None,
        }
    }

    fn clear(&mut self, field: PhraseType) {
        match field {
            PhraseType::Amenity => self.amenity = None,
            PhraseType::Street => self.street = None,
            PhraseType::City => self.city = None,
            PhraseType::County => self.county = None,
            PhraseType::State => self.state = None,
            PhraseType::Postalcode => self.postalcode = None,
            PhraseType::Country => self.country = None,
            PhraseType::Untyped => {}
        }
    }

    /// Present fields in query order: amenity, street, city, county, state,
    /// postcode, country.
    pub fn fields(&self) -> Vec<(PhraseType, &str)> {
        [
            PhraseType::Amenity,
            PhraseType::Street,
            PhraseType::City,
            PhraseType::County,
            PhraseType::State,
            PhraseType::Postalcode,
            PhraseType::Country,
        ]
        .into_iter()
        .filter_map(|field| self.slot(field).map(|value| (field, value)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    pub fn amenity_value(&self) -> Option<&str> {
        self.amenity.as_deref()
    }

    /// The rank range of the first present field, and the extra ranks
    /// accepted from any field.
    pub fn rank_restriction(&self) -> (RankRange, Vec<u8>) {
        let fields = self.fields();
        let range = fields
            .first()
            .map_or(RankRange::FULL, |(field, _)| field_ranks(*field).range);
        let allowed = fields
            .iter()
            .flat_map(|(field, _)| field_ranks(*field).allowed.iter().copied())
            .collect();
        (range, allowed)
    }

    /// The same query without its most specific field, or `None` when there
    /// is nothing left to drop.
    pub fn relax(&self) -> Option<Self> {
        if self.fields().len() <= 1 {
            return None;
        }
        let field = RELAX_ORDER.into_iter().find(|f| self.slot(*f).is_some())?;
        let mut relaxed = self.clone();
        relaxed.clear(field);
        Some(relaxed)
    }

    /// All fields joined with commas, for logging.
    pub fn joined(&self) -> String {
        self.fields().into_iter().map(|(_, v)| v).collect::<Vec<_>>().join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order_and_trim() {
        let q = StructuredQuery::new()
            .country("us")
            .city(" Springfield ")
            .street("")
            .postalcode("62701");
        let fields = q.fields();
        assert_eq!(
            fields,
            [
                (PhraseType::City, "Springfield"),
                (PhraseType::Postalcode, "62701"),
                (PhraseType::Country, "us"),
            ]
        );
        assert_eq!(q.joined(), "Springfield, 62701, us");
    }

    #[test]
    fn test_rank_restriction_from_first_field() {
        let q = StructuredQuery::new().city("Bonn").postalcode("53111");
        let (range, allowed) = q.rank_restriction();
        assert_eq!(range, RankRange::new(14, 24));
        assert_eq!(allowed, [5, 11]);

        let (range, _) = StructuredQuery::new().state("Bavaria").rank_restriction();
        assert_eq!(range, RankRange::new(8, 8));
        assert!(StructuredQuery::new().rank_restriction().0.is_full());
    }

    #[test]
    fn test_relax_order() {
        let q = StructuredQuery::new()
            .street("Main Street")
            .city("Springfield")
            .state("Illinois")
            .postalcode("62701");

        let q = q.relax().unwrap();
        assert!(q.fields().iter().all(|(f, _)| *f != PhraseType::Postalcode));
        let q = q.relax().unwrap();
        assert_eq!(q.fields()[0].0, PhraseType::City);
        let q = q.relax().unwrap();
        assert_eq!(q.fields(), [(PhraseType::State, "Illinois")]);
        assert!(q.relax().is_none());
    }

    #[test]
    fn test_relax_keeps_country() {
        let q = StructuredQuery::new().amenity("pub").country("gb");
        assert!(q.relax().is_none());
    }

    #[test]
    fn test_set_by_name() {
        let mut q = StructuredQuery::new();
        assert!(q.set("county", "Kent"));
        assert!(!q.set("planet", "Earth"));
        assert_eq!(q.fields(), [(PhraseType::County, "Kent")]);
    }
}
