//! Search term counter (spec §4.3): counts non-overlapping literal-term
//! occurrences, auto-selecting a naive scan or an Aho-Corasick prepass
//! depending on term count and content size.

use aho_corasick::AhoCorasick;
use rustc_hash::FxHashMap;

const NAIVE_TERM_THRESHOLD: usize = 8;
const NAIVE_SIZE_THRESHOLD: usize = 4096;

/// Deduplicates and trims `terms`, preserving first-seen order.
pub fn normalize_terms(terms: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for t in terms {
        let trimmed = t.trim();
        if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}

/// Count of non-overlapping occurrences of each term in `content`,
/// identical to a naive `bytes::count` per term.
pub fn count(content: &[u8], terms: &[String]) -> FxHashMap<String, usize> {
    let terms = normalize_terms(terms);
    if terms.is_empty() {
        return FxHashMap::default();
    }
    if terms.len() < NAIVE_TERM_THRESHOLD || content.len() < NAIVE_SIZE_THRESHOLD {
        return naive_count(content, &terms);
    }

    let candidates = match AhoCorasick::new(terms.iter().map(|t| t.as_bytes())) {
        Ok(ac) => {
            let mut hit: Vec<bool> = vec![false; terms.len()];
            for m in ac.find_overlapping_iter(content) {
                hit[m.pattern().as_usize()] = true;
            }
            terms
                .iter()
                .zip(hit)
                .filter(|(_, h)| *h)
                .map(|(t, _)| t.clone())
                .collect::<Vec<_>>()
        }
        Err(_) => terms.clone(),
    };
    let confirmed = naive_count(content, &candidates);
    let mut result = FxHashMap::default();
    for term in &terms {
        result.insert(term.clone(), confirmed.get(term).copied().unwrap_or(0));
    }
    result
}

fn naive_count(content: &[u8], terms: &[String]) -> FxHashMap<String, usize> {
    let mut result = FxHashMap::default();
    for term in terms {
        let needle = term.as_bytes();
        if needle.is_empty() {
            continue;
        }
        let mut occurrences = 0usize;
        let mut pos = 0usize;
        while pos + needle.len() <= content.len() {
            if &content[pos..pos + needle.len()] == needle {
                occurrences += 1;
                pos += needle.len();
            } else {
                pos += 1;
            }
        }
        result.insert(term.clone(), occurrences);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_non_overlapping_occurrences() {
        let content = b"abcabcabc";
        let terms = vec!["abc".to_string()];
        let result = count(content, &terms);
        assert_eq!(result["abc"], 3);
    }

    #[test]
    fn overlapping_term_counted_non_overlapping() {
        let content = b"aaaa";
        let terms = vec!["aa".to_string()];
        let result = count(content, &terms);
        assert_eq!(result["aa"], 2);
    }

    #[test]
    fn aho_corasick_path_matches_naive_path() {
        let terms: Vec<String> = (0..10).map(|i| format!("needle{i}")).collect();
        let mut content = "x".repeat(5000);
        content.push_str("needle3 needle3 needle7");
        let result = count(content.as_bytes(), &terms);
        assert_eq!(result["needle3"], 2);
        assert_eq!(result["needle7"], 1);
        assert_eq!(result["needle0"], 0);
    }

    #[test]
    fn normalize_dedups_and_trims() {
        let terms = vec![" a ".to_string(), "a".to_string(), "".to_string(), "b".to_string()];
        let normalized = normalize_terms(&terms);
        assert_eq!(normalized, vec!["a".to_string(), "b".to_string()]);
    }
}
