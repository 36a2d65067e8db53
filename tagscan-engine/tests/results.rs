//! Result modes, limits and result serialization.

use insta::assert_snapshot;
use rstest::rstest;
use tagscan_engine::syntax::*;
use tagscan_engine::{
    search_text, CharCase, MatchedTag, PatternSet, PatternSetBuilder, SearchContext,
    SearchOptions, Syntax,
};

fn single(body: Syntax) -> PatternSet {
    let mut builder = PatternSetBuilder::new();
    builder.add("P", body);
    builder.build().expect("pattern set to build")
}

#[rstest]
#[case(false, vec!["a a b"])]
#[case(true, vec!["a a b", "a b"])]
fn test_overlap_modes(#[case] self_overlapping: bool, #[case] expected: Vec<&str>) {
    let set = single(any_span(text("a"), text("b")));
    let options = SearchOptions {
        self_overlapping_tags_in_results: self_overlapping,
        ..SearchOptions::default()
    };
    let result = search_text(&set, "a a b", options);
    let texts: Vec<&str> = result.tags_of("P").iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, expected);
}

#[rstest]
#[case("a b c d e", vec!["b c d e"])]
#[case("a b c d", vec!["a b c d"])]
#[case("a b c, b c d e", vec!["a b c", "b c d e"])]
fn test_overlap_keeps_the_match_ending_last(#[case] input: &str, #[case] expected: Vec<&str>) {
    let set = single(any_of([
        word_seq([text("a"), text("b"), text("c")]),
        word_seq([text("a"), text("b"), text("c"), text("d")]),
        word_seq([text("b"), text("c"), text("d"), text("e")]),
    ]));
    for interval in [1, 1_000] {
        let options = SearchOptions {
            token_count_between_garbage_collections: interval,
            ..SearchOptions::default()
        };
        let result = search_text(&set, input, options);
        let texts: Vec<&str> = result.tags_of("P").iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, expected, "interval {}", interval);
    }
}

#[test]
fn test_first_match_only_keeps_the_earliest() {
    let set = single(text("a"));
    let options = SearchOptions {
        first_match_only: true,
        ..SearchOptions::default()
    };
    let result = search_text(&set, "b a a", options);
    let tags = result.tags_of("P");
    assert_eq!(tags.len(), 1);
    // Start 0, b 1, space 2, a 3
    assert_eq!(tags[0].range.start.token_number, 3);
}

#[test]
fn test_pattern_limit_flags_the_pattern() {
    let set = single(any_span(text("a"), text("b")));
    let options = SearchOptions {
        pattern_candidate_limit: 1,
        ..SearchOptions::default()
    };
    let result = search_text(&set, "a a b", options);
    assert_eq!(result.summary(), vec!["P: a a b"]);
    assert_eq!(result.exceeded_limit, vec!["P".to_string()]);
}

#[test]
fn test_unlimited_search_flags_nothing() {
    let set = single(any_span(text("a"), text("b")));
    let result = search_text(&set, "a a b", SearchOptions::default());
    assert!(result.exceeded_limit.is_empty());
}

#[test]
fn test_callback_sees_tags_in_text_order() {
    let set = single(word_seq([text("to"), kind(tagscan_engine::TokenKind::Word)]));
    let mut seen = Vec::new();
    {
        let mut context = SearchContext::new(&set, SearchOptions::default())
            .with_callback(|_, tag: &MatchedTag| seen.push(tag.text.clone()));
        let input = "go to town, to sea";
        for token in tagscan_engine::tokenize(input) {
            context.process_token(&token, input);
        }
        assert_eq!(context.complete(input).tag_count(), 0);
    }
    assert_eq!(seen, vec!["to town", "to sea"]);
}

#[test]
fn test_summary_of_several_patterns() {
    let mut builder = PatternSetBuilder::new();
    builder.add(
        "Greeting",
        word_seq([
            any_of([text("hello"), text("hi")]),
            field("Who", word_case(CharCase::TitleCase)),
        ]),
    );
    builder.add("Number", pattern("Num"));
    let set = builder.build().expect("pattern set to build");

    let result = search_text(
        &set,
        "hello Alice, hi Bob and hello there at 10 past 9",
        SearchOptions::default(),
    );
    assert_snapshot!(result.summary().join("\n"), @r"
    Greeting: hello Alice
    Greeting: hi Bob
    Number: 10
    Number: 9
    ");
}

#[test]
fn test_json_lists_ranges_and_fields() {
    let set = single(word_seq([text("hi"), field("Who", word_case(CharCase::TitleCase))]));
    let result = search_text(&set, "hi Bob", SearchOptions::default());
    let json: serde_json::Value =
        serde_json::from_str(&result.to_json().expect("result to serialize"))
            .expect("valid json");

    let tag = &json["tags"]["P"][0];
    assert_eq!(tag["text"], "hi Bob");
    assert_eq!(tag["range"]["start"]["token_number"], 1);
    assert_eq!(tag["range"]["end"]["token_number"], 4);
    assert_eq!(tag["extractions"]["Who"][0]["start"]["offset"], 3);
    assert!(json.get("debug_candidates").is_none());
}
