//! Root handler
//!
//!     Starts new matches. Every token is looked up in the root index, which covers the first
//!     region of every searched pattern except the conditional having operands. Those live in
//!     their own index and are only searched while a having frame that needs them is open: a
//!     having operand can only matter inside the outer match it constrains.
//!
//!     Creating roots can open further having frames, which enable further operands at the
//!     same token. The conditional index is searched again for the newly enabled operands until
//!     no new one shows up.

use super::context::SearchContext;
use super::local_handler::Base;
use crate::error::Overflow;
use crate::index::{Anchor, PatternFlags, Selection};
use crate::token::TokenProbe;

impl<'p> SearchContext<'p> {
    pub(super) fn create_roots(&mut self, probe: &TokenProbe) -> Result<(), Overflow> {
        let set = self.set;
        let mut selection = Selection::new();
        set.root_index()
            .select(probe, set, &self.excluded, Anchor::PatternBody, &mut selection);
        if !selection.is_empty() {
            self.expand(Base::Root, probe, selection)?;
        }

        if set.conditional_index().is_empty() {
            return Ok(());
        }
        let all = PatternFlags::all(set.pattern_count());
        let mut searched = PatternFlags::new();
        loop {
            let fresh = self.enabled.difference(&searched);
            if fresh.is_empty() {
                return Ok(());
            }
            searched.union_with(&fresh);
            let mut exclude = all.difference(&fresh);
            exclude.union_with(&self.excluded);

            let mut selection = Selection::new();
            set.conditional_index()
                .select(probe, set, &exclude, Anchor::PatternBody, &mut selection);
            if !selection.is_empty() {
                self.expand(Base::Root, probe, selection)?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::expression::syntax::*;
    use crate::expression::PatternSetBuilder;
    use crate::search::{SearchContext, SearchOptions};
    use crate::token::tokenize;

    #[test]
    fn test_conditional_operand_starts_only_inside_outer() {
        let mut builder = PatternSetBuilder::new();
        builder.add(
            "P",
            having(seq([text("a"), text(" "), text("b")]), text("b")),
        );
        let set = builder.build().unwrap();
        let operand = set.pattern(0).references[0].1;

        let mut context = SearchContext::new(&set, SearchOptions::default());
        let text = "b a b";
        let tokens = tokenize(text);
        // `b` before any `a`: nothing enables the operand
        context.process_token(&tokens[0], text);
        context.process_token(&tokens[1], text);
        assert_eq!(context.live_roots[operand], 0);

        for token in &tokens[2..] {
            context.process_token(token, text);
        }
        let result = context.complete(text);
        assert_eq!(result.tags_of("P").len(), 1);
        assert_eq!(result.tags_of("P")[0].text, "a b");
    }
}
