use tracing::trace;

use super::WordSet;

/// Maximum number of parts in a single word set.
pub const MAX_WORDSET_LEN: usize = 20;
/// Maximum number of word sets kept per phrase.
pub const MAX_WORDSETS: usize = 100;
/// A partial bucket is cut back to `MAX_WORDSETS` once it grows past this.
const BUCKET_OVERFLOW: usize = 2 * MAX_WORDSETS;

/// Split `words` into every grouping whose parts are all known vocabulary.
///
/// `contains_any` answers whether a space-joined run of words exists in the
/// vocabulary either as a full word or as a partial term. The result holds at
/// most [`MAX_WORDSETS`] sets ordered by ascending number of parts.
pub fn segment<S, F>(words: &[S], contains_any: F) -> Vec<WordSet>
where
    S: AsRef<str>,
    F: Fn(&str) -> bool,
{
    let Some(first) = words.first() else {
        return Vec::new();
    };

    // cache[i] holds all groupings of words[0..=i]
    let mut cache: Vec<Vec<Vec<String>>> = Vec::with_capacity(words.len());
    let first = first.as_ref();
    cache.push(if contains_any(first) {
        vec![vec![first.to_owned()]]
    } else {
        Vec::new()
    });

    for i in 1..words.len() {
        let mut bucket: Vec<Vec<String>> = Vec::new();
        for j in (1..=i).rev() {
            if cache[j - 1].is_empty() {
                continue;
            }
            let part = join(&words[j..=i]);
            if !contains_any(&part) {
                continue;
            }
            for prefix in &cache[j - 1] {
                if prefix.len() < MAX_WORDSET_LEN {
                    let mut set = prefix.clone();
                    set.push(part.clone());
                    bucket.push(set);
                }
            }
            if bucket.len() > BUCKET_OVERFLOW {
                trim(&mut bucket);
            }
        }

        let whole = join(&words[..=i]);
        if contains_any(&whole) {
            bucket.push(vec![whole]);
        }
        cache.push(bucket);
    }

    let mut result = cache.pop().unwrap_or_default();
    trim(&mut result);
    trace!(words = words.len(), sets = result.len(), "Segmented phrase");
    result.into_iter().map(WordSet::new).collect()
}

fn trim(bucket: &mut Vec<Vec<String>>) {
    bucket.sort_by_key(Vec::len);
    bucket.truncate(MAX_WORDSETS);
}

fn join<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ")
}
