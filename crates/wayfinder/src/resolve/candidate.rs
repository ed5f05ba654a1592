use std::fmt;

use ahash::AHashMap;

/// Where a candidate place id lives in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SourceTable {
    /// Regular places: areas, streets, POIs and addressed buildings.
    Primary,
    Postcode,
    /// Interpolation lines between two addressed points.
    Interpolation,
    /// Address ranges from parcel data.
    Parcel,
}

impl SourceTable {
    /// Interpolated tables carry house-level addresses only.
    pub const fn is_interpolated(self) -> bool {
        matches!(self, Self::Interpolation | Self::Parcel)
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Primary => "primary",
            Self::Postcode => "postcode",
            Self::Interpolation => "interpolation",
            Self::Parcel => "parcel",
        };
        f.write_str(name)
    }
}

/// A place found for one interpretation of the query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CandidateReference {
    pub table: SourceTable,
    pub place_id: u64,
    /// Set for interpolated results, the number looked up or computed.
    pub house_number: Option<u32>,
    /// How many full words of the query occur in the place's address.
    pub exact_matches: u32,
    /// Quality of the match, lower is better. 0 is an exact match.
    pub result_rank: u32,
    /// The place's own address rank when the index reported it.
    pub address_rank: Option<u8>,
}

impl CandidateReference {
    pub const fn new(table: SourceTable, place_id: u64) -> Self {
        Self {
            table,
            place_id,
            house_number: None,
            exact_matches: 0,
            result_rank: 0,
            address_rank: None,
        }
    }

    pub const fn primary(place_id: u64) -> Self {
        Self::new(SourceTable::Primary, place_id)
    }

    #[must_use]
    pub const fn with_house_number(mut self, house_number: u32) -> Self {
        self.house_number = Some(house_number);
        self
    }

    #[must_use]
    pub const fn with_address_rank(mut self, rank: u8) -> Self {
        self.address_rank = Some(rank);
        self
    }

    #[must_use]
    pub const fn with_exact_matches(mut self, count: u32) -> Self {
        self.exact_matches = count;
        self
    }

    #[must_use]
    pub const fn with_result_rank(mut self, rank: u32) -> Self {
        self.result_rank = rank;
        self
    }

    pub const fn key(&self) -> (SourceTable, u64) {
        (self.table, self.place_id)
    }

    /// Address rank as far as known. Interpolated entries are house level.
    pub fn effective_address_rank(&self) -> Option<u8> {
        if self.table.is_interpolated() {
            Some(30)
        } else {
            self.address_rank
        }
    }
}

impl fmt::Display for CandidateReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.place_id)?;
        if let Some(hn) = self.house_number {
            write!(f, "#{hn}")?;
        }
        write!(f, " (rank {})", self.result_rank)
    }
}

/// Candidates in insertion order, unique per table and place id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    entries: Vec<CandidateReference>,
    positions: AHashMap<(SourceTable, u64), usize>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a candidate. A place seen before keeps whichever occurrence has
    /// the lower result rank, at the position it was first seen.
    pub fn insert(&mut self, candidate: CandidateReference) {
        if let Some(&pos) = self.positions.get(&candidate.key()) {
            if self.entries[pos].result_rank > candidate.result_rank {
                self.entries[pos] = candidate;
            }
        } else {
            self.positions.insert(candidate.key(), self.entries.len());
            self.entries.push(candidate);
        }
    }

    /// Add a candidate, replacing any earlier occurrence of the same place.
    pub fn replace(&mut self, candidate: CandidateReference) {
        if let Some(&pos) = self.positions.get(&candidate.key()) {
            self.entries[pos] = candidate;
        } else {
            self.positions.insert(candidate.key(), self.entries.len());
            self.entries.push(candidate);
        }
    }

    pub fn get_mut(&mut self, table: SourceTable, place_id: u64) -> Option<&mut CandidateReference> {
        self.positions
            .get(&(table, place_id))
            .map(|&pos| &mut self.entries[pos])
    }

    pub fn contains(&self, table: SourceTable, place_id: u64) -> bool {
        self.positions.contains_key(&(table, place_id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateReference> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CandidateReference> {
        self.entries.iter_mut()
    }

    /// Place ids of one table, in insertion order.
    pub fn ids_in(&self, table: SourceTable) -> Vec<u64> {
        self.entries
            .iter()
            .filter(|c| c.table == table)
            .map(|c| c.place_id)
            .collect()
    }

    pub fn retain(&mut self, keep: impl FnMut(&CandidateReference) -> bool) {
        self.entries.retain(keep);
        self.reindex();
    }

    pub fn into_vec(self) -> Vec<CandidateReference> {
        self.entries
    }

    fn reindex(&mut self) {
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, c)| (c.key(), pos))
            .collect();
    }
}

impl Extend<CandidateReference> for CandidateSet {
    fn extend<I: IntoIterator<Item = CandidateReference>>(&mut self, iter: I) {
        for candidate in iter {
            self.insert(candidate);
        }
    }
}

impl FromIterator<CandidateReference> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = CandidateReference>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl IntoIterator for CandidateSet {
    type Item = CandidateReference;
    type IntoIter = std::vec::IntoIter<CandidateReference>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Split candidates into the ones sharing the best result rank (head) and
/// all others (tail).
///
/// Whenever a better rank shows up, the head collected so far moves to the
/// end of the tail, so the tail keeps the order in which entries were
/// demoted rather than the input order.
pub fn split_results<I>(candidates: I) -> (Vec<CandidateReference>, Vec<CandidateReference>)
where
    I: IntoIterator<Item = CandidateReference>,
{
    let mut head: Vec<CandidateReference> = Vec::new();
    let mut tail: Vec<CandidateReference> = Vec::new();
    let mut min_rank = u32::MAX;

    for candidate in candidates {
        match candidate.result_rank.cmp(&min_rank) {
            std::cmp::Ordering::Less => {
                min_rank = candidate.result_rank;
                tail.append(&mut head);
                head.push(candidate);
            }
            std::cmp::Ordering::Equal => head.push(candidate),
            std::cmp::Ordering::Greater => tail.push(candidate),
        }
    }
    (head, tail)
}
