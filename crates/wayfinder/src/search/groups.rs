use std::collections::{BTreeMap, btree_map};

/// Items bucketed by rank. Iteration runs from the best (lowest) rank to the
/// worst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedGroups<T> {
    groups: BTreeMap<u32, Vec<T>>,
}

impl<T> Default for RankedGroups<T> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }
}

impl<T> RankedGroups<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket `items` by the rank returned from `rank_of`, keeping their
    /// relative order inside each bucket.
    pub fn from_ranked<I, F>(items: I, rank_of: F) -> Self
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> u32,
    {
        let mut groups = Self::new();
        for item in items {
            groups.push(rank_of(&item), item);
        }
        groups
    }

    pub fn push(&mut self, rank: u32, item: T) {
        self.groups.entry(rank).or_default().push(item);
    }

    /// Append the buckets of `other`, concatenating buckets of equal rank.
    pub fn merge(&mut self, other: Self) {
        for (rank, items) in other.groups {
            self.groups.entry(rank).or_default().extend(items);
        }
    }

    /// Total number of items over all buckets.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(Vec::is_empty)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn ranks(&self) -> impl Iterator<Item = u32> + '_ {
        self.groups.keys().copied()
    }

    pub fn get(&self, rank: u32) -> &[T] {
        self.groups.get(&rank).map_or(&[], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[T])> {
        self.groups.iter().map(|(rank, items)| (*rank, items.as_slice()))
    }

    /// All items in rank order.
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.groups.values().flatten()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        for items in self.groups.values_mut() {
            items.retain(&mut keep);
        }
        self.groups.retain(|_, items| !items.is_empty());
    }

    /// Apply `f` to every bucket, e.g. to re-sort its content.
    pub fn for_each_group(&mut self, mut f: impl FnMut(&mut Vec<T>)) {
        for items in self.groups.values_mut() {
            f(items);
        }
    }
}

impl<T> IntoIterator for RankedGroups<T> {
    type Item = (u32, Vec<T>);
    type IntoIter = btree_map::IntoIter<u32, Vec<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

impl<T> FromIterator<(u32, T)> for RankedGroups<T> {
    fn from_iter<I: IntoIterator<Item = (u32, T)>>(iter: I) -> Self {
        let mut groups = Self::new();
        for (rank, item) in iter {
            groups.push(rank, item);
        }
        groups
    }
}
