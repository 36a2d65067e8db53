//! Property-based tests for garbage collection
//!
//! Collection only discards state that can no longer change the outcome, so the delivered
//! tags must not depend on how often it runs.

use proptest::prelude::*;
use std::collections::BTreeMap;
use tagscan_engine::syntax::*;
use tagscan_engine::{
    search_text, tokenize, MatchedTag, PatternSet, PatternSetBuilder, SearchContext,
    SearchOptions, SearchResult,
};

fn pattern_set() -> PatternSet {
    let mut builder = PatternSetBuilder::new();
    builder.add("Span", any_span(text("a"), text("b")));
    builder.add("Pair", word_seq([text("a"), text("x")]));
    builder.add("Bounded", word_span(text("x"), 0, Some(1), text("b")));
    builder.add("Within", inside(text("x"), pattern("Span")));
    builder.add("Choice", any_of([text("b"), except(text("b ."))]));
    builder.build().expect("pattern set to build")
}

/// Short texts over a small vocabulary, so that patterns actually overlap.
fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(vec!["a", "b", "x", ".", "\n"]), 0..24)
        .prop_map(|words| words.join(" "))
}

fn flatten(result: &SearchResult) -> Vec<(String, usize, usize, String)> {
    result
        .tags
        .iter()
        .flat_map(|(name, tags)| {
            tags.iter().map(move |tag| {
                (
                    name.clone(),
                    tag.range.start.token_number,
                    tag.range.end.token_number,
                    tag.text.clone(),
                )
            })
        })
        .collect()
}

/// First-match-only tags handed to a callback, as (start, end) per pattern.
fn first_matches(
    set: &PatternSet,
    input: &str,
    interval: usize,
) -> BTreeMap<String, Vec<(usize, usize)>> {
    let options = SearchOptions {
        first_match_only: true,
        token_count_between_garbage_collections: interval,
        ..SearchOptions::default()
    };
    let mut delivered: BTreeMap<String, Vec<(usize, usize)>> = BTreeMap::new();
    {
        let mut context = SearchContext::new(set, options).with_callback(|_, tag: &MatchedTag| {
            delivered
                .entry(tag.pattern_name.clone())
                .or_default()
                .push((tag.range.start.token_number, tag.range.end.token_number));
        });
        for token in tokenize(input) {
            context.process_token(&token, input);
        }
        context.complete(input);
    }
    delivered
}

/// The earliest (then longest) of every match, per pattern.
fn earliest_matches(set: &PatternSet, input: &str) -> BTreeMap<String, Vec<(usize, usize)>> {
    let options = SearchOptions {
        self_overlapping_tags_in_results: true,
        ..SearchOptions::default()
    };
    let result = search_text(set, input, options);
    result
        .tags
        .iter()
        .filter_map(|(name, tags)| {
            tags.iter()
                .map(|tag| (tag.range.start.token_number, tag.range.end.token_number))
                .min_by_key(|&(start, end)| (start, std::cmp::Reverse(end)))
                .map(|first| (name.clone(), vec![first]))
        })
        .collect()
}

#[cfg(test)]
mod proptest_tests {
    use super::*;

    proptest! {
        #[test]
        fn test_collection_interval_does_not_change_results(
            input in text_strategy(),
            interval in 1usize..6,
        ) {
            let set = pattern_set();
            let baseline = search_text(&set, &input, SearchOptions::default());
            let options = SearchOptions {
                token_count_between_garbage_collections: interval,
                ..SearchOptions::default()
            };
            let collected = search_text(&set, &input, options);
            prop_assert_eq!(flatten(&baseline), flatten(&collected), "input: {:?}", input);
        }

        #[test]
        fn test_first_match_only_delivers_the_earliest_match(input in text_strategy()) {
            let set = pattern_set();
            let expected = earliest_matches(&set, &input);
            let eager = first_matches(&set, &input, 1);
            let lazy = first_matches(&set, &input, 1_000_000);
            prop_assert_eq!(&eager, &expected, "input: {:?}", input);
            prop_assert_eq!(&lazy, &expected, "input: {:?}", input);
        }

        #[test]
        fn test_forced_cleanup_does_not_change_results(input in text_strategy()) {
            let set = pattern_set();
            let baseline = search_text(&set, &input, SearchOptions::default());
            let options = SearchOptions {
                max_pending_tags_before_forced_cleanup: 1,
                waiting_token_count_threshold_for_incremental_cleanup: 1,
                ..SearchOptions::default()
            };
            let collected = search_text(&set, &input, options);
            prop_assert_eq!(flatten(&baseline), flatten(&collected), "input: {:?}", input);
        }
    }
}
