//! Field reference handler
//!
//!     `$Name` matches the tokens an earlier `Name: ...` extraction consumed, compared
//!     case-insensitively one token at a time. The first token is matched like any leaf (see
//!     `select_expected`); when the capture is longer, a field reference frame tracks how much of
//!     it has been matched and this handler advances it.

use super::context::SearchContext;
use crate::candidate::{CandidateId, Frame, Response};
use crate::error::Overflow;
use crate::token::TokenProbe;

impl<'p> SearchContext<'p> {
    pub(super) fn advance_field_reference(
        &mut self,
        id: CandidateId,
        probe: &TokenProbe,
    ) -> Result<Response, Overflow> {
        let set = self.set;
        let Some(candidate) = self.arena.get_mut(id) else {
            return Ok(Response::Reject);
        };
        let Some(&Frame::FieldReference { field, offset, .. }) = candidate.frames.last() else {
            return Ok(Response::Ignore);
        };
        let capture = candidate.capture(field);
        let matched = capture.get(offset).map(String::as_str) == Some(probe.folded.as_str());
        let remaining = capture.len() > offset + 1;

        if !matched {
            // Blanks between captured words are skipped like in the enclosing word sequence
            let skip = probe.kind().is_blank()
                && candidate
                    .frames
                    .iter()
                    .rev()
                    .nth(1)
                    .map_or(false, |frame| frame.skips_blanks(set));
            if skip {
                self.active.push(id);
                return Ok(Response::Ignore);
            }
            self.reject(id);
            return Ok(Response::Reject);
        }

        candidate.consume(probe.token.end(), &probe.folded);
        if remaining {
            if let Some(Frame::FieldReference { offset, .. }) = candidate.frames.last_mut() {
                *offset += 1;
            }
            self.active.push(id);
            return Ok(Response::UpdateObserver);
        }
        candidate.frames.pop();
        self.ascend(id, probe)?;
        Ok(self.response_of(id))
    }
}

#[cfg(test)]
mod tests {
    use crate::expression::syntax::*;
    use crate::expression::PatternSetBuilder;
    use crate::search::{search_text, SearchOptions};
    use rstest::rstest;

    #[rstest]
    #[case("red = red", vec!["red = red"])]
    #[case("red = Red", vec!["red = Red"])]
    #[case("red = blue", vec![])]
    #[case("big red = big red", vec!["big red = big red"])]
    #[case("big red = big blue", vec![])]
    fn test_reference_repeats_captured_tokens(#[case] input: &str, #[case] expected: Vec<&str>) {
        let mut builder = PatternSetBuilder::new();
        builder.add(
            "Same",
            seq([
                field("X", any_of([text("red"), text("big red"), text("blue")])),
                text(" = "),
                field_ref("X"),
            ]),
        );
        let set = builder.build().unwrap();
        let result = search_text(&set, input, SearchOptions::default());
        let texts: Vec<&str> = result.tags_of("Same").iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, expected);
    }
}
