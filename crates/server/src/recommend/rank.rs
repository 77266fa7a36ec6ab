//! Scoring products against a query.
//!
//! `final_score = visual_score * 10 + keyword_matches * 2`, where
//! `visual_score` is the cosine similarity between the query embedding and
//! the product embedding, and `keyword_matches` counts keywords found as
//! substrings of the product's lowercased text.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::catalog::Product;

/// Weight applied to cosine similarity.
pub const VISUAL_WEIGHT: f32 = 10.0;

/// Points per matched keyword.
pub const KEYWORD_WEIGHT: f32 = 2.0;

/// Default number of results.
pub const DEFAULT_TOP_K: usize = 10;

/// Largest number of results a caller may ask for.
pub const MAX_TOP_K: usize = 50;

/// A product with its transient scores.
#[derive(Debug, Clone, Copy)]
pub struct RankedProduct<'a> {
    pub product: &'a Product,
    pub visual_score: f32,
    pub final_score: f32,
}

/// Clamp a requested result count to `1..=MAX_TOP_K`, defaulting when absent.
#[must_use]
pub fn clamp_top_k(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_TOP_K).clamp(1, MAX_TOP_K)
}

/// Cosine similarity of two vectors.
///
/// Returns `None` when either vector is empty or the lengths differ, and
/// `Some(0.0)` when either vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0_f32, 0.0_f32, 0.0_f32), |(dot, na, nb), (x, y)| {
            (x.mul_add(*y, dot), x.mul_add(*x, na), y.mul_add(*y, nb))
        });

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        return Some(0.0);
    }
    Some(dot / denominator)
}

/// Count keywords occurring in `text` (already lowercased).
fn keyword_matches(text: &str, keywords: &BTreeSet<String>) -> usize {
    keywords
        .iter()
        .filter(|k| !k.is_empty() && text.contains(k.as_str()))
        .count()
}

fn descending(a: f32, b: f32) -> Ordering {
    b.total_cmp(&a)
}

/// Rank `products` and return the best `top_k`.
///
/// With a query embedding, the `2 * top_k` most visually similar products
/// (among those with a comparable embedding) form the candidate pool. If no
/// similarity could be computed, every product is a candidate with a visual
/// score of zero. Sorting is stable, so ties keep catalog (or similarity)
/// order.
#[must_use]
pub fn rank<'a>(
    products: &'a [Product],
    query_embedding: Option<&[f32]>,
    keywords: &BTreeSet<String>,
    top_k: usize,
) -> Vec<RankedProduct<'a>> {
    let mut visual: Vec<(&Product, f32)> = query_embedding
        .map(|query| {
            products
                .iter()
                .filter_map(|p| {
                    let embedding = p.embedding.as_deref()?;
                    cosine_similarity(query, embedding).map(|s| (p, s))
                })
                .collect()
        })
        .unwrap_or_default();

    let pool: Vec<(&Product, f32)> = if visual.is_empty() {
        products.iter().map(|p| (p, 0.0)).collect()
    } else {
        visual.sort_by(|a, b| descending(a.1, b.1));
        visual.truncate(top_k.saturating_mul(2));
        visual
    };

    let mut ranked: Vec<RankedProduct<'a>> = pool
        .into_iter()
        .map(|(product, visual_score)| {
            let matches = keyword_matches(&product.search_text(), keywords);
            #[allow(clippy::cast_precision_loss)] // keyword sets are tiny
            let text_score = matches as f32 * KEYWORD_WEIGHT;
            RankedProduct {
                product,
                visual_score,
                final_score: visual_score.mul_add(VISUAL_WEIGHT, text_score),
            }
        })
        .collect();

    ranked.sort_by(|a, b| descending(a.final_score, b.final_score));
    ranked.truncate(top_k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(id: &str, name: &str, embedding: Option<Vec<f32>>) -> Product {
        let mut p: Product =
            serde_json::from_value(json!({"id": id, "name": name})).expect("product");
        p.embedding = embedding;
        p
    }

    fn keywords(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| (*w).to_string()).collect()
    }

    fn ids(ranked: &[RankedProduct<'_>]) -> Vec<String> {
        ranked.iter().map(|r| r.product.id.to_string()).collect()
    }

    #[test]
    fn test_cosine_similarity() {
        let s = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).expect("same dims");
        assert!((s - 1.0).abs() < 1e-6);
        let s = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).expect("same dims");
        assert!(s.abs() < 1e-6);
        let s = cosine_similarity(&[1.0, 1.0], &[-1.0, -1.0]).expect("same dims");
        assert!((s + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), None);
        assert_eq!(cosine_similarity(&[], &[]), None);
    }

    #[test]
    fn test_clamp_top_k() {
        assert_eq!(clamp_top_k(None), DEFAULT_TOP_K);
        assert_eq!(clamp_top_k(Some(0)), 1);
        assert_eq!(clamp_top_k(Some(500)), MAX_TOP_K);
        assert_eq!(clamp_top_k(Some(7)), 7);
    }

    #[test]
    fn test_keywords_only_orders_by_matches_then_catalog_order() {
        let products = vec![
            product("1", "Plain Mug", None),
            product("2", "Red Dress", None),
            product("3", "Red Floral Dress", None),
            product("4", "Blue Dress", None),
        ];
        let ranked = rank(&products, None, &keywords(&["red", "dress", "floral"]), 3);
        assert_eq!(ids(&ranked), ["3", "2", "4"]);
        assert!((ranked[0].final_score - 6.0).abs() < 1e-6);
        assert!(ranked.iter().all(|r| r.visual_score == 0.0));
    }

    #[test]
    fn test_no_signal_degrades_to_catalog_order() {
        let products = vec![
            product("a", "One", None),
            product("b", "Two", None),
            product("c", "Three", None),
        ];
        let ranked = rank(&products, None, &BTreeSet::new(), 2);
        assert_eq!(ids(&ranked), ["a", "b"]);
    }

    #[test]
    fn test_visual_pool_is_two_k() {
        let products = vec![
            product("far", "Far", Some(vec![0.0, 1.0])),
            product("near", "Near", Some(vec![1.0, 0.1])),
            product("mid", "Mid Red Wool", Some(vec![1.0, 1.0])),
            product("none", "No Embedding Red", None),
            product("odd", "Wrong Dims", Some(vec![1.0, 0.0, 0.0])),
        ];
        // top_k 1 -> pool of the 2 most similar: near, mid
        let ranked = rank(&products, Some(&[1.0, 0.0]), &keywords(&["red"]), 1);
        assert_eq!(ids(&ranked), ["near"]);

        // Keyword matches can reorder inside the pool
        let ranked = rank(&products, Some(&[1.0, 0.0]), &keywords(&["red", "wool"]), 1);
        assert_eq!(ids(&ranked), ["mid"]);
    }

    #[test]
    fn test_embedding_without_catalog_vectors_uses_full_catalog() {
        let products = vec![product("x", "Red Scarf", None), product("y", "Hat", None)];
        let ranked = rank(&products, Some(&[1.0, 0.0]), &keywords(&["hat"]), 5);
        assert_eq!(ids(&ranked), ["y", "x"]);
    }

    #[test]
    fn test_deterministic() {
        let products: Vec<Product> = (0..20)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let v = vec![1.0, i as f32 / 10.0];
                product(&i.to_string(), "Item", Some(v))
            })
            .collect();
        let first = ids(&rank(&products, Some(&[1.0, 0.5]), &keywords(&["item"]), 5));
        let second = ids(&rank(&products, Some(&[1.0, 0.5]), &keywords(&["item"]), 5));
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }
}
