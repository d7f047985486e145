//! Bag-of-words title similarity.
//!
//! Both measures tokenize with [`crate::text::tokenize`] (lowercase,
//! punctuation split, stop words kept). Counts are accumulated as integers,
//! so `score(a, b) == score(b, a)` holds exactly.

use ahash::{AHashMap, AHashSet};

use crate::config::SimilarityKind;
use crate::text::tokenize;

/// Similarity of two titles in `[0, 1]`.
pub fn score(title_a: &str, title_b: &str, kind: SimilarityKind) -> f64 {
    match kind {
        SimilarityKind::Jaccard => jaccard(title_a, title_b),
        SimilarityKind::Cosine => cosine(title_a, title_b),
    }
}

/// Shared tokens over all distinct tokens; 0 when both titles are empty.
pub fn jaccard(title_a: &str, title_b: &str) -> f64 {
    let a: AHashSet<String> = tokenize(title_a).into_iter().collect();
    let b: AHashSet<String> = tokenize(title_b).into_iter().collect();

    let common = a.intersection(&b).count();
    let union = a.len() + b.len() - common;
    if union == 0 {
        return 0.0;
    }

    ratio(common as u64, union as u64)
}

/// Cosine of the term-frequency vectors; 0 when either title has no tokens.
pub fn cosine(title_a: &str, title_b: &str) -> f64 {
    let a = term_frequencies(title_a);
    let b = term_frequencies(title_b);

    let dot: u64 = a
        .iter()
        .filter_map(|(term, fa)| b.get(term).map(|fb| fa * fb))
        .sum();
    let norm_a = squared_norm(&a);
    let norm_b = squared_norm(&b);
    if norm_a == 0 || norm_b == 0 {
        return 0.0;
    }

    let denominator = to_f64(norm_a).sqrt() * to_f64(norm_b).sqrt();
    (to_f64(dot) / denominator).min(1.0)
}

fn term_frequencies(title: &str) -> AHashMap<String, u64> {
    let mut frequencies = AHashMap::new();
    for token in tokenize(title) {
        *frequencies.entry(token).or_insert(0) += 1;
    }
    frequencies
}

fn squared_norm(frequencies: &AHashMap<String, u64>) -> u64 {
    frequencies.values().map(|f| f * f).sum()
}

#[allow(clippy::cast_precision_loss)]
fn to_f64(n: u64) -> f64 {
    n as f64
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    to_f64(numerator) / to_f64(denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_jaccard_identical() {
        let t = "Efficient Algorithms for Graph Coloring";
        assert!((score(t, t, SimilarityKind::Jaccard) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_jaccard_ignores_case_and_punctuation() {
        let s = jaccard("Graph Theory!", "graph theory");
        assert!((s - 1.0).abs() < EPS);
    }

    #[test]
    fn test_jaccard_partial_overlap() {
        // {graph, theory} vs {graph, algorithms}: 1 shared of 3
        let s = jaccard("Graph Theory", "Graph Algorithms");
        assert!((s - 1.0 / 3.0).abs() < EPS);
    }

    #[test]
    fn test_jaccard_disjoint_and_empty() {
        assert_eq!(jaccard("graph theory", "protein folding"), 0.0);
        assert_eq!(jaccard("", ""), 0.0);
        assert_eq!(jaccard("", "graph"), 0.0);
    }

    #[test]
    fn test_cosine_identical() {
        let t = "the theory of the graph";
        assert!((score(t, t, SimilarityKind::Cosine) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_cosine_uses_term_frequency() {
        // a = (graph:2, theory:1), b = (graph:1) -> 2 / (sqrt(5) * 1)
        let s = cosine("graph graph theory", "graph");
        assert!((s - 2.0 / 5f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn test_cosine_zero_norm() {
        assert_eq!(cosine("", "graph"), 0.0);
        assert_eq!(cosine("...", "..."), 0.0);
    }

    #[test]
    fn test_symmetry_both_kinds() {
        let pairs = [
            ("Graph Theory and Its Applications", "Applications of graph theory"),
            ("A note on A", "a note"),
            ("Deep Learning", "Shallow Learning, Revisited"),
        ];
        for kind in [SimilarityKind::Jaccard, SimilarityKind::Cosine] {
            for (a, b) in pairs {
                assert_eq!(score(a, b, kind), score(b, a, kind));
            }
        }
    }

    #[test]
    fn test_range_both_kinds() {
        let titles = ["graph", "graph graph", "graph theory", "theory of graphs", ""];
        for kind in [SimilarityKind::Jaccard, SimilarityKind::Cosine] {
            for a in titles {
                for b in titles {
                    let s = score(a, b, kind);
                    assert!((0.0..=1.0).contains(&s), "{kind:?} {a:?} {b:?} -> {s}");
                }
            }
        }
    }
}
