//! End to end matching of the core operators: text, variations with exceptions, word spans,
//! conjunctions and field extraction.

use rstest::rstest;
use tagscan_engine::syntax::*;
use tagscan_engine::{search_text, CharCase, PatternSet, PatternSetBuilder, SearchOptions, Syntax};

fn single(body: Syntax) -> PatternSet {
    let mut builder = PatternSetBuilder::new();
    builder.add("P", body);
    builder.build().expect("pattern set to build")
}

fn texts(set: &PatternSet, input: &str) -> Vec<String> {
    search_text(set, input, SearchOptions::default())
        .tags_of("P")
        .iter()
        .map(|tag| tag.text.clone())
        .collect()
}

#[rstest]
#[case("I use Google Drive daily", vec![])]
#[case("I use Google search", vec!["Google"])]
#[case("Google, then Google Drive, then google", vec!["Google", "google"])]
fn test_exception_suppresses_the_longer_phrase(#[case] input: &str, #[case] expected: Vec<&str>) {
    let set = single(any_of([text("Google"), except(text("Google Drive"))]));
    assert_eq!(texts(&set, input), expected);
}

#[rstest]
#[case("a b", vec!["a b"])]
#[case("a x y b", vec!["a x y b"])]
#[case("a x y z b", vec![])]
#[case("a b. a x b. a x y z b", vec!["a b", "a x b"])]
fn test_word_span_bounds(#[case] input: &str, #[case] expected: Vec<&str>) {
    let set = single(word_span(text("a"), 0, Some(2), text("b")));
    assert_eq!(texts(&set, input), expected);
}

#[test]
fn test_word_span_minimum_skips_close_right_sides() {
    let set = single(word_span(text("a"), 2, None, text("b")));
    assert_eq!(texts(&set, "a b x y b"), vec!["a b x y b"]);
}

#[test]
fn test_conjunction_accepts_any_order() {
    let set = single(all_of([text("a"), kind(tagscan_engine::TokenKind::Space), text("b")]));
    assert_eq!(texts(&set, "a b, b a, a a"), vec!["a b", "b a"]);
}

#[test]
fn test_repetition_is_greedy_in_results() {
    let set = single(word_seq([text("very"), repeat(text("very"), 0, None), text("good")]));
    assert_eq!(texts(&set, "it is very very good"), vec!["very very good"]);
}

#[test]
fn test_standard_patterns_resolve_by_name() {
    let set = single(word_seq([pattern("Num"), text("km")]));
    assert_eq!(texts(&set, "ran 42 km, not km"), vec!["42 km"]);
}

#[test]
fn test_field_extraction_ranges() {
    let set = single(word_seq([
        text("Mr"),
        text("."),
        field("Name", word_case(CharCase::TitleCase)),
    ]));
    let input = "Hello Mr. Smith and mr. jones";
    let result = search_text(&set, input, SearchOptions::default());
    let tags = result.tags_of("P");
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].text, "Mr. Smith");

    let name = tags[0].extractions["Name"][0];
    assert_eq!(&input[name.start.offset..name.end.offset], "Smith");
}

#[test]
fn test_field_reference_matches_the_captured_text() {
    let set = single(word_seq([
        field("Tag", kind(tagscan_engine::TokenKind::Word)),
        text("..."),
        field_ref("Tag"),
    ]));
    assert_eq!(texts(&set, "red ... RED, red ... blue"), vec!["red ... RED"]);
}

#[test]
fn test_pattern_reference_is_inlined() {
    let mut builder = PatternSetBuilder::new();
    builder.add_helper("Color", any_of([text("red"), text("blue")]));
    builder.add("P", word_seq([pattern("Color"), text("car")]));
    let set = builder.build().expect("pattern set to build");

    let result = search_text(&set, "a blue car and a red bike", SearchOptions::default());
    assert!(result.tags_of("Color").is_empty());
    assert_eq!(result.summary(), vec!["P: blue car"]);
}
