//! Result emission
//!
//!     Finished pattern matches become [MatchedTag]s. Only target patterns produce tags. What
//!     happens to a tag depends on the overlap mode:
//!
//!     - Non-overlapping (default): tags are retained per pattern, sorted by start and then
//!       longest first. Tags starting before the pattern's cleaning token number (the earliest
//!       start of a match still to come) are walked in that order against a head tag: a tag
//!       overlapping the head replaces it when it ends later and is dropped otherwise, a tag
//!       past the head makes the head final. A head ending at or before the cleaning token
//!       number is final as well. Walking in text order rather than completion order keeps the
//!       outcome independent of how often collection runs.
//!     - Self-overlapping: every distinct match is delivered as soon as it is final.
//!     - First-match-only: one tag per pattern is kept, the earliest (then longest). It is
//!       replaced by better matches until it is delivered, under the same cleaning rule.
//!
//!     Delivery calls the context's callback when one is installed and otherwise appends to the
//!     aggregate handed out by `complete()`.

use crate::expression::PatternId;
use crate::search::SearchOptions;
use crate::token::TextRange;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

/// Identity of a search context, passed to result callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ContextId(u64);

impl ContextId {
    pub(crate) fn next() -> Self {
        ContextId(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Receives every delivered tag.
pub type TagCallback<'a> = Box<dyn FnMut(ContextId, &MatchedTag) + 'a>;

/// One occurrence of a target pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedTag {
    pub pattern_id: PatternId,
    pub pattern_name: String,
    pub range: TextRange,
    pub text: String,
    /// Field name to the ranges it extracted, in match order
    pub extractions: BTreeMap<String, Vec<TextRange>>,
    /// Creation order within the context
    pub timestamp: u64,
    pub delivered: bool,
}

impl MatchedTag {
    fn order_key(&self) -> (usize, Reverse<usize>, u64) {
        (
            self.range.start.token_number,
            Reverse(self.range.end.token_number),
            self.timestamp,
        )
    }
}

/// Aggregate result of a finished search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    /// Delivered tags per pattern name, in text order. Empty when a callback took them.
    pub tags: BTreeMap<String, Vec<MatchedTag>>,
    /// Patterns that hit a candidate limit; their tags may be incomplete
    pub exceeded_limit: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub debug_candidates: Vec<String>,
}

impl SearchResult {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn tags_of(&self, pattern: &str) -> &[MatchedTag] {
        self.tags.get(pattern).map_or(&[], Vec::as_slice)
    }

    pub fn tag_count(&self) -> usize {
        self.tags.values().map(Vec::len).sum()
    }

    /// `name: text` per tag, in pattern name then text order.
    pub fn summary(&self) -> Vec<String> {
        self.tags
            .iter()
            .flat_map(|(name, tags)| tags.iter().map(move |tag| format!("{}: {}", name, tag.text)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OverlapMode {
    NonOverlapping,
    SelfOverlapping,
    FirstMatchOnly,
}

impl OverlapMode {
    pub fn from_options(options: &SearchOptions) -> Self {
        if options.first_match_only {
            OverlapMode::FirstMatchOnly
        } else if options.self_overlapping_tags_in_results {
            OverlapMode::SelfOverlapping
        } else {
            OverlapMode::NonOverlapping
        }
    }
}

pub(crate) struct ResultCollector<'a> {
    context: ContextId,
    mode: OverlapMode,
    /// Per pattern: undelivered tags (first-match-only: the one kept tag)
    retained: Vec<Vec<MatchedTag>>,
    /// Per pattern, non-overlapping mode: the walked tag later overlaps may still replace
    head: Vec<Option<MatchedTag>>,
    /// Per pattern, self-overlapping mode: ranges delivered that could still repeat
    seen: Vec<Vec<TextRange>>,
    aggregate: BTreeMap<String, Vec<MatchedTag>>,
    callback: Option<TagCallback<'a>>,
}

impl<'a> ResultCollector<'a> {
    pub fn new(context: ContextId, mode: OverlapMode, pattern_count: usize) -> Self {
        ResultCollector {
            context,
            mode,
            retained: vec![Vec::new(); pattern_count],
            head: vec![None; pattern_count],
            seen: vec![Vec::new(); pattern_count],
            aggregate: BTreeMap::new(),
            callback: None,
        }
    }

    pub fn set_callback(&mut self, callback: TagCallback<'a>) {
        self.callback = Some(callback);
    }

    pub fn add(&mut self, tag: MatchedTag) {
        let pattern = tag.pattern_id;
        match self.mode {
            OverlapMode::NonOverlapping => {
                if self.head[pattern]
                    .as_ref()
                    .map_or(false, |head| head.range == tag.range)
                {
                    return;
                }
                let list = &mut self.retained[pattern];
                if list.iter().any(|t| t.range == tag.range) {
                    return;
                }
                let key = tag.order_key();
                let at = list.partition_point(|t| t.order_key() < key);
                list.insert(at, tag);
            }
            OverlapMode::SelfOverlapping => {
                if self.seen[pattern].contains(&tag.range) {
                    return;
                }
                self.seen[pattern].push(tag.range);
                self.deliver(tag);
            }
            OverlapMode::FirstMatchOnly => {
                let slot = &mut self.retained[pattern];
                let replace = match slot.first() {
                    None => true,
                    Some(kept) => !kept.delivered && tag.order_key() < kept.order_key(),
                };
                if replace {
                    slot.clear();
                    slot.push(tag);
                }
            }
        }
    }

    /// Deliver what became final. `cleaning[p]` is the earliest token number a match of `p`
    /// could still start at. Returns the number of delivered tags.
    pub fn flush(&mut self, cleaning: &[usize]) -> usize {
        let mut ready = Vec::new();
        for (pattern, limit) in cleaning.iter().enumerate() {
            match self.mode {
                OverlapMode::NonOverlapping => {
                    let list = &mut self.retained[pattern];
                    let head = &mut self.head[pattern];
                    let count = list
                        .iter()
                        .take_while(|t| t.range.start.token_number < *limit)
                        .count();
                    for tag in list.drain(..count) {
                        let longer = match head.as_ref() {
                            Some(current) if current.range.overlaps(&tag.range) => {
                                Some(tag.range.end > current.range.end)
                            }
                            _ => None,
                        };
                        match longer {
                            Some(true) => *head = Some(tag),
                            Some(false) => {}
                            None => ready.extend(head.replace(tag)),
                        }
                    }
                    let settled = head
                        .as_ref()
                        .map_or(false, |current| current.range.end.token_number <= *limit);
                    if settled {
                        ready.extend(head.take());
                    }
                }
                OverlapMode::SelfOverlapping => {
                    self.seen[pattern].retain(|range| range.start.token_number >= *limit);
                }
                OverlapMode::FirstMatchOnly => {
                    if let Some(kept) = self.retained[pattern].first_mut() {
                        if !kept.delivered && kept.range.end.token_number <= *limit {
                            kept.delivered = true;
                            ready.push(kept.clone());
                        }
                    }
                }
            }
        }
        let count = ready.len();
        for tag in ready {
            self.deliver(tag);
        }
        count
    }

    /// Deliver everything retained, at the end of the stream.
    pub fn flush_all(&mut self) -> usize {
        let cleaning = vec![usize::MAX; self.retained.len()];
        self.flush(&cleaning)
    }

    /// Some pattern holds more undelivered tags than `max`.
    pub fn needs_cleanup(&self, max: usize) -> bool {
        (0..self.retained.len()).any(|pattern| self.undelivered(pattern) > max)
    }

    pub fn retained_count(&self) -> usize {
        (0..self.retained.len())
            .map(|pattern| self.undelivered(pattern))
            .sum()
    }

    fn undelivered(&self, pattern: usize) -> usize {
        let retained = self.retained[pattern].iter().filter(|t| !t.delivered).count();
        retained + usize::from(self.head[pattern].is_some())
    }

    /// Hand out the aggregate, each list in text order.
    pub fn take_aggregate(&mut self) -> BTreeMap<String, Vec<MatchedTag>> {
        let mut aggregate = std::mem::take(&mut self.aggregate);
        for tags in aggregate.values_mut() {
            tags.sort_by_key(MatchedTag::order_key);
        }
        aggregate
    }

    /// Forget every tag. The callback stays installed.
    pub fn clear(&mut self) {
        self.retained.iter_mut().for_each(Vec::clear);
        self.head.iter_mut().for_each(|head| *head = None);
        self.seen.iter_mut().for_each(Vec::clear);
        self.aggregate.clear();
    }

    fn deliver(&mut self, mut tag: MatchedTag) {
        tag.delivered = true;
        match &mut self.callback {
            Some(callback) => callback(self.context, &tag),
            None => self
                .aggregate
                .entry(tag.pattern_name.clone())
                .or_default()
                .push(tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TextPosition;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn tag(start: usize, end: usize, timestamp: u64) -> MatchedTag {
        MatchedTag {
            pattern_id: 0,
            pattern_name: "P".to_string(),
            range: TextRange::new(TextPosition::new(start, start), TextPosition::new(end, end)),
            text: format!("{}-{}", start, end),
            extractions: BTreeMap::new(),
            timestamp,
            delivered: false,
        }
    }

    fn delivered(collector: &mut ResultCollector) -> Vec<(usize, usize)> {
        collector.take_aggregate()["P"]
            .iter()
            .map(|t| (t.range.start.token_number, t.range.end.token_number))
            .collect()
    }

    #[test]
    fn test_non_overlapping_keeps_earliest_longest() {
        let mut collector = ResultCollector::new(ContextId(0), OverlapMode::NonOverlapping, 1);
        collector.add(tag(2, 4, 0));
        collector.add(tag(0, 3, 1));
        collector.add(tag(0, 5, 2));
        collector.add(tag(6, 7, 3));
        collector.add(tag(6, 7, 4));
        assert_eq!(collector.flush_all(), 2);
        assert_eq!(delivered(&mut collector), vec![(0, 5), (6, 7)]);
    }

    #[test]
    fn test_later_longer_overlap_replaces_head() {
        let mut collector = ResultCollector::new(ContextId(0), OverlapMode::NonOverlapping, 1);
        collector.add(tag(0, 3, 0));
        collector.add(tag(2, 6, 1));
        assert_eq!(collector.flush(&[3]), 0);
        collector.add(tag(4, 5, 2));
        collector.add(tag(6, 8, 3));
        assert_eq!(collector.flush_all(), 2);
        assert_eq!(delivered(&mut collector), vec![(2, 6), (6, 8)]);
    }

    #[test]
    fn test_flush_waits_for_cleaning() {
        let mut collector = ResultCollector::new(ContextId(0), OverlapMode::NonOverlapping, 1);
        collector.add(tag(0, 3, 0));
        collector.add(tag(4, 9, 1));
        assert_eq!(collector.flush(&[5]), 1);
        assert_eq!(collector.retained_count(), 1);
        collector.add(tag(5, 6, 2));
        assert_eq!(collector.flush_all(), 1);
        assert_eq!(delivered(&mut collector), vec![(0, 3), (4, 9)]);
    }

    #[test]
    fn test_self_overlapping_delivers_distinct_ranges() {
        let mut collector = ResultCollector::new(ContextId(0), OverlapMode::SelfOverlapping, 1);
        collector.add(tag(0, 3, 0));
        collector.add(tag(1, 4, 1));
        collector.add(tag(0, 3, 2));
        assert_eq!(delivered(&mut collector), vec![(0, 3), (1, 4)]);
    }

    #[test]
    fn test_first_match_only_replaces_until_delivered() {
        let mut collector = ResultCollector::new(ContextId(0), OverlapMode::FirstMatchOnly, 1);
        collector.add(tag(3, 4, 0));
        collector.add(tag(1, 2, 1));
        collector.add(tag(1, 3, 2));
        assert_eq!(collector.flush(&[10]), 1);
        collector.add(tag(0, 1, 3));
        assert_eq!(collector.flush_all(), 0);
        assert_eq!(delivered(&mut collector), vec![(1, 3)]);
    }

    #[test]
    fn test_callback_takes_tags_instead_of_aggregate() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut collector = ResultCollector::new(ContextId(7), OverlapMode::NonOverlapping, 1);
        collector.set_callback(Box::new(move |context: ContextId, tag: &MatchedTag| {
            sink.borrow_mut().push((context.get(), tag.text.clone(), tag.delivered));
        }));
        collector.add(tag(0, 2, 0));
        collector.flush_all();

        assert_eq!(*seen.borrow(), vec![(7, "0-2".to_string(), true)]);
        assert!(collector.take_aggregate().is_empty());
    }

    #[test]
    fn test_needs_cleanup_counts_undelivered_tags() {
        let mut collector = ResultCollector::new(ContextId(0), OverlapMode::NonOverlapping, 1);
        collector.add(tag(0, 1, 0));
        collector.add(tag(2, 3, 1));
        assert!(collector.needs_cleanup(1));
        collector.flush(&[2]);
        assert!(!collector.needs_cleanup(1));
    }
}
