//! Property-based tests for the plain/original position mapper.
//!
//! The binary-search mapper in `AnnotatedText::original_offset` is checked
//! against a naive linear scan with the same bracketing rules, and against
//! structural invariants (monotonicity, exactness of anchor hits) on
//! randomly built documents.

use proptest::prelude::*;
use prosetex_annotate::{Anchor, AnnotatedText, AnnotatedTextBuilder};

/// Reference mapper: finds the bracketing anchors by linear scan instead
/// of binary search, then applies the same tie-group and interpolation
/// rules.
fn linear_original_offset(anchors: &[Anchor], plain: usize) -> Option<usize> {
    if anchors.is_empty() {
        return None;
    }
    if anchors.len() == 1 {
        return Some(anchors[0].original);
    }

    let i = anchors
        .iter()
        .position(|anchor| anchor.plain > plain)
        .unwrap_or(anchors.len())
        .clamp(1, anchors.len() - 1);

    let lower = *anchors[..i]
        .iter()
        .rev()
        .take_while(|anchor| anchor.plain == anchors[i - 1].plain)
        .last()
        .unwrap();
    let upper = *anchors[i..]
        .iter()
        .take_while(|anchor| anchor.plain == anchors[i].plain)
        .last()
        .unwrap();

    if lower.plain == plain {
        return Some(lower.original);
    }

    let t = (plain as f64 - lower.plain as f64) / (upper.plain as f64 - lower.plain as f64);
    let interpolated = (1.0 - t) * lower.original as f64 + t * upper.original as f64;
    Some(interpolated.round().max(0.0) as usize)
}

/// A random but well-formed document build: a sequence of text, markup,
/// and interpreted-markup parts.
fn parts_strategy() -> impl Strategy<Value = Vec<(u8, String, String)>> {
    prop::collection::vec(
        (0u8..3, "[a-z ]{1,8}", prop_oneof!["Dummy[0-9]", " ", ""]),
        1..30,
    )
}

fn build(parts: &[(u8, String, String)]) -> AnnotatedText {
    let mut builder = AnnotatedTextBuilder::new();
    for (kind, body, interpretation) in parts {
        match kind {
            0 => {
                builder.add_text(body);
            }
            1 => {
                builder.add_markup(body);
            }
            _ => {
                builder.add_markup_interpreted_as(body, interpretation);
            }
        }
    }
    builder.build()
}

proptest! {
    #[test]
    fn test_binary_search_matches_linear_scan(parts in parts_strategy(), plain in 0usize..300) {
        let annotated_text = build(&parts);
        match linear_original_offset(annotated_text.anchors(), plain) {
            Some(original) => prop_assert_eq!(annotated_text.original_offset(plain).unwrap(), original),
            None => prop_assert!(annotated_text.original_offset(plain).is_err()),
        }
    }

    #[test]
    fn test_mapping_is_monotonic(parts in parts_strategy()) {
        let annotated_text = build(&parts);
        if annotated_text.anchors().is_empty() {
            return Ok(());
        }
        let limit = annotated_text.plain_text().len() + 10;
        let mut last = 0;
        for plain in 0..limit {
            let original = annotated_text.original_offset(plain).unwrap();
            prop_assert!(original >= last, "regressed at plain offset {}", plain);
            last = original;
        }
    }

    #[test]
    fn test_anchor_hits_resolve_to_first_of_tie_group(parts in parts_strategy()) {
        let annotated_text = build(&parts);
        for anchor in annotated_text.anchors() {
            let first = annotated_text
                .anchors()
                .iter()
                .find(|a| a.plain == anchor.plain)
                .unwrap();
            prop_assert_eq!(
                annotated_text.original_offset(anchor.plain).unwrap(),
                first.original
            );
        }
    }

    #[test]
    fn test_original_text_round_trips(parts in parts_strategy()) {
        let annotated_text = build(&parts);
        let original: String = parts.iter().map(|(_, body, _)| body.as_str()).collect();
        prop_assert_eq!(annotated_text.original_text(), original);
    }

    #[test]
    fn test_invert_is_an_involution_on_anchors(parts in parts_strategy()) {
        let annotated_text = build(&parts);
        let twice = annotated_text.invert().invert();
        prop_assert_eq!(twice.anchors(), annotated_text.anchors());
    }

    #[test]
    fn test_inverse_mapping_recovers_anchored_offsets(parts in parts_strategy()) {
        let annotated_text = build(&parts);
        let inverse = annotated_text.invert();
        for anchor in annotated_text.anchors() {
            let first = annotated_text
                .anchors()
                .iter()
                .find(|a| a.original == anchor.original)
                .unwrap();
            prop_assert_eq!(inverse.original_offset(anchor.original).unwrap(), first.plain);
        }
    }
}
