//! Fuzzy matching for did-you-mean suggestions.
//!
//! Backs both registry lookups (unknown node types) and template
//! diagnostics (unknown context heads). Substring matches rank ahead of
//! edit-distance matches.

/// Classic two-row Levenshtein distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(prev[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}

/// Top-`k` candidates closest to `query`.
///
/// Substring containment (either direction, case-insensitive) always
/// qualifies; otherwise the edit distance must stay within a third of the
/// longer string, so unrelated names do not surface as suggestions.
pub fn suggestions<'a, I>(query: &str, candidates: I, k: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let query_lower = query.to_lowercase();
    let mut scored: Vec<(usize, String)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let candidate_lower = candidate.to_lowercase();
            if candidate_lower == query_lower {
                return Some((0, candidate.to_string()));
            }
            if candidate_lower.contains(&query_lower) || query_lower.contains(&candidate_lower) {
                return Some((1, candidate.to_string()));
            }
            let distance = levenshtein(&query_lower, &candidate_lower);
            let ceiling = (query_lower.len().max(candidate_lower.len())).div_ceil(3);
            (distance <= ceiling).then(|| (1 + distance, candidate.to_string()))
        })
        .collect();
    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    scored.truncate(k);
    scored.into_iter().map(|(_, name)| name).collect()
}
