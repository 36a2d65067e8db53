//! Search options
//!
//!     The knobs of one search context. Missing keys take their defaults when deserialized, so
//!     a partial table (from `tagscan-config` or inline JSON) is enough.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Live candidates across all patterns. Reaching it resets the context's progress.
    pub candidate_limit: usize,
    /// Live root candidates of one pattern. Reaching it only stops new starts of that pattern.
    pub pattern_candidate_limit: usize,
    /// Deliver only the first (earliest, then longest) match of each target.
    pub first_match_only: bool,
    /// Deliver overlapping matches of the same pattern instead of keeping the longest.
    pub self_overlapping_tags_in_results: bool,
    pub token_count_between_garbage_collections: usize,
    /// Stale waiting entries tolerated before the waiting index is compacted.
    pub waiting_token_count_threshold_for_incremental_cleanup: usize,
    /// Undelivered tags of one pattern that force a collection at the end of the token.
    pub max_pending_tags_before_forced_cleanup: usize,
    /// List the candidates still alive at the end of the stream in the result.
    pub debug_mode: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            candidate_limit: 100_000,
            pattern_candidate_limit: 10_000,
            first_match_only: false,
            self_overlapping_tags_in_results: false,
            token_count_between_garbage_collections: 1_000,
            waiting_token_count_threshold_for_incremental_cleanup: 1_000,
            max_pending_tags_before_forced_cleanup: 1_000,
            debug_mode: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_table_keeps_defaults() {
        let options: SearchOptions =
            serde_json::from_str(r#"{"first_match_only": true, "candidate_limit": 50}"#).unwrap();
        assert!(options.first_match_only);
        assert_eq!(options.candidate_limit, 50);
        assert_eq!(options.pattern_candidate_limit, 10_000);
        assert_eq!(options.token_count_between_garbage_collections, 1_000);
    }
}
