//! Compiled expression tree
//!
//!     A [PatternSet] is the immutable input of the matching engine. It holds every expression
//!     node of every pattern in one arena, addressed by [ExprId], plus per-pattern metadata and the
//!     two top level indices the engine queries for new matches.
//!
//! Tree Shape
//!
//!     Each pattern owns a tree rooted at its body. Ordinary references to other patterns are
//!     inlined by the builder (an [ExpressionKind::Embedded] node over a private copy of the
//!     referenced body), so every node has exactly one parent and walking parent pointers from a
//!     leaf always leads back to the owning pattern's body.
//!
//!     Containment operands (`@having`, `@inside`, `@outside`) are not inlined. They are
//!     [ExpressionKind::PatternReference] nodes naming a pattern that is searched on its own; the
//!     engine joins the two through its pending queues.
//!
//! Node Metadata
//!
//!     Every node carries:
//!     - `nullable`: whether it can match an empty token sequence.
//!     - `index`: the [ExpressionIndex] of its first region, i.e. the leaves that can consume the
//!       first token of a match of this node.
//!
//!     Leaves also carry the variations-with-exceptions enclosing them (`variation_chain`) and the
//!     exception branch they sit in, if any. Both are only used to link exception candidates to
//!     the alternatives they may cancel.
//!
//! Construction
//!
//!     Pattern sets are built with [PatternSetBuilder] from [Syntax] values. Standard patterns
//!     (`Word`, `Punct`, `Blank`, ...) are available by name, see [standard].

pub mod builder;
pub mod standard;
pub mod syntax;
mod token_expression;

pub use builder::PatternSetBuilder;
pub use syntax::Syntax;
pub use token_expression::{TextMatch, TokenExpression};

use crate::index::ExpressionIndex;
use std::collections::HashMap;
use std::fmt;

/// Dense pattern number, assigned from 0 in declaration order.
pub type PatternId = usize;

/// Index into the field table of a [PatternSet].
pub type FieldId = usize;

/// Address of a node in a [PatternSet].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub(crate) u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The three containment constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Having,
    Inside,
    Outside,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::Having => write!(f, "having"),
            ConstraintKind::Inside => write!(f, "inside"),
            ConstraintKind::Outside => write!(f, "outside"),
        }
    }
}

/// `Left .. Right` and `Left .. [min-max] .. Right`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapExpression {
    pub left: ExprId,
    pub right: ExprId,
    /// Bounds on the number of word tokens between the two sides
    pub min_words: usize,
    pub max_words: Option<usize>,
    /// A skipped token matching this rejects the wait
    pub exclusion: Option<TokenExpression>,
    /// Field receiving the range between the two sides
    pub field: Option<FieldId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionKind {
    Token(TokenExpression),
    /// Operand of a containment constraint
    PatternReference {
        pattern: PatternId,
    },
    /// Inlined copy of another pattern's body
    Embedded {
        pattern: PatternId,
        body: ExprId,
    },
    Sequence {
        elements: Vec<ExprId>,
        /// Blanks between elements are skipped
        word_sequence: bool,
    },
    Variation {
        elements: Vec<ExprId>,
        exceptions: Vec<ExprId>,
    },
    Span {
        element: ExprId,
        min: usize,
        max: Option<usize>,
    },
    AnySpan(GapExpression),
    WordSpan(GapExpression),
    /// Every element once, adjacent, in any order
    Conjunction {
        elements: Vec<ExprId>,
    },
    Having {
        outer: ExprId,
        inner: ExprId,
    },
    Inside {
        body: ExprId,
        outer: ExprId,
    },
    Outside {
        body: ExprId,
        exception: ExprId,
    },
    Extraction {
        field: FieldId,
        body: ExprId,
    },
    FieldReference {
        field: FieldId,
    },
}

impl ExpressionKind {
    /// Direct children, in matching order.
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            ExpressionKind::Token(_)
            | ExpressionKind::PatternReference { .. }
            | ExpressionKind::FieldReference { .. } => Vec::new(),
            ExpressionKind::Embedded { body, .. } | ExpressionKind::Extraction { body, .. } => {
                vec![*body]
            }
            ExpressionKind::Sequence { elements, .. } | ExpressionKind::Conjunction { elements } => {
                elements.clone()
            }
            ExpressionKind::Variation {
                elements,
                exceptions,
            } => elements.iter().chain(exceptions).copied().collect(),
            ExpressionKind::Span { element, .. } => vec![*element],
            ExpressionKind::AnySpan(gap) | ExpressionKind::WordSpan(gap) => {
                vec![gap.left, gap.right]
            }
            ExpressionKind::Having { outer, inner } => vec![*outer, *inner],
            ExpressionKind::Inside { body, outer } => vec![*body, *outer],
            ExpressionKind::Outside { body, exception } => vec![*body, *exception],
        }
    }

    /// For containment nodes: the kind, the matched body and the reference operand.
    pub fn constraint(&self) -> Option<(ConstraintKind, ExprId, ExprId)> {
        match self {
            ExpressionKind::Having { outer, inner } => Some((ConstraintKind::Having, *outer, *inner)),
            ExpressionKind::Inside { body, outer } => Some((ConstraintKind::Inside, *body, *outer)),
            ExpressionKind::Outside { body, exception } => {
                Some((ConstraintKind::Outside, *body, *exception))
            }
            _ => None,
        }
    }

    pub fn gap(&self) -> Option<&GapExpression> {
        match self {
            ExpressionKind::AnySpan(gap) | ExpressionKind::WordSpan(gap) => Some(gap),
            _ => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            ExpressionKind::Token(_) | ExpressionKind::FieldReference { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub id: ExprId,
    pub parent: Option<ExprId>,
    /// The pattern whose tree this node belongs to
    pub pattern: PatternId,
    pub kind: ExpressionKind,
    pub nullable: bool,
    pub index: ExpressionIndex,
    /// Enclosing variations with exceptions, innermost first. Stops at an exception branch.
    pub variation_chain: Vec<ExprId>,
    /// Root of the nearest exception branch containing this node
    pub exception_branch: Option<ExprId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub id: FieldId,
    pub pattern: PatternId,
    pub name: String,
    /// Some field reference reads this field, so its tokens must be captured
    pub referenced: bool,
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub id: PatternId,
    pub name: String,
    /// Results are reported for targets only
    pub is_target: bool,
    pub body: ExprId,
    pub fields: Vec<FieldId>,
    /// Searched independently: a target or a containment operand
    pub searched: bool,
    /// Referenced only through `@having` and not a target; searched only while some having
    /// frame is open
    pub conditional: bool,
    /// Containment constraints anywhere in this pattern's tree
    pub references: Vec<(ConstraintKind, PatternId)>,
    /// Patterns with a containment constraint on this one
    pub referrers: Vec<PatternId>,
}

impl Pattern {
    pub fn is_referenced(&self) -> bool {
        !self.referrers.is_empty()
    }
}

/// Immutable compiled pattern set shared by any number of search contexts.
#[derive(Debug, Clone)]
pub struct PatternSet {
    pub(crate) expressions: Vec<Expression>,
    pub(crate) patterns: Vec<Pattern>,
    pub(crate) fields: Vec<Field>,
    pub(crate) names: HashMap<String, PatternId>,
    pub(crate) root_index: ExpressionIndex,
    pub(crate) conditional_index: ExpressionIndex,
}

impl PatternSet {
    pub fn expr(&self, id: ExprId) -> &Expression {
        &self.expressions[id.index()]
    }

    pub fn kind(&self, id: ExprId) -> &ExpressionKind {
        &self.expressions[id.index()].kind
    }

    pub fn parent(&self, id: ExprId) -> Option<ExprId> {
        self.expressions[id.index()].parent
    }

    pub fn is_nullable(&self, id: ExprId) -> bool {
        self.expressions[id.index()].nullable
    }

    pub fn index(&self, id: ExprId) -> &ExpressionIndex {
        &self.expressions[id.index()].index
    }

    pub fn token_expression(&self, id: ExprId) -> Option<&TokenExpression> {
        match &self.expressions[id.index()].kind {
            ExpressionKind::Token(expr) => Some(expr),
            _ => None,
        }
    }

    /// The pattern named by a containment operand.
    pub fn referenced_pattern(&self, id: ExprId) -> Option<PatternId> {
        match self.kind(id) {
            ExpressionKind::PatternReference { pattern } => Some(*pattern),
            _ => None,
        }
    }

    pub fn expression_count(&self) -> usize {
        self.expressions.len()
    }

    pub fn pattern(&self, id: PatternId) -> &Pattern {
        &self.patterns[id]
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn pattern_id(&self, name: &str) -> Option<PatternId> {
        self.names.get(name).copied()
    }

    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id]
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Index of every searched, unconditional pattern body.
    pub fn root_index(&self) -> &ExpressionIndex {
        &self.root_index
    }

    /// Index of the conditional having operands.
    pub fn conditional_index(&self) -> &ExpressionIndex {
        &self.conditional_index
    }

    /// Render the tree of one node, for diagnostics.
    pub fn describe(&self, id: ExprId) -> String {
        let mut out = String::new();
        self.describe_into(id, &mut out);
        out
    }

    fn describe_into(&self, id: ExprId, out: &mut String) {
        let list = |this: &Self, items: &[ExprId], sep: &str, out: &mut String| {
            for (n, item) in items.iter().enumerate() {
                if n > 0 {
                    out.push_str(sep);
                }
                this.describe_into(*item, out);
            }
        };
        match self.kind(id) {
            ExpressionKind::Token(expr) => out.push_str(&expr.to_string()),
            ExpressionKind::PatternReference { pattern } | ExpressionKind::Embedded { pattern, .. } => {
                out.push_str(&self.patterns[*pattern].name)
            }
            ExpressionKind::Sequence {
                elements,
                word_sequence,
            } => {
                out.push('(');
                list(self, elements, if *word_sequence { " _ " } else { " + " }, out);
                out.push(')');
            }
            ExpressionKind::Variation {
                elements,
                exceptions,
            } => {
                out.push('{');
                list(self, elements, ", ", out);
                for exception in exceptions {
                    out.push_str(", ~");
                    self.describe_into(*exception, out);
                }
                out.push('}');
            }
            ExpressionKind::Span { element, min, max } => {
                match max {
                    Some(max) => out.push_str(&format!("[{}-{}] ", min, max)),
                    None => out.push_str(&format!("[{}+] ", min)),
                }
                self.describe_into(*element, out);
            }
            ExpressionKind::AnySpan(gap) => {
                self.describe_into(gap.left, out);
                out.push_str(" .. ");
                self.describe_into(gap.right, out);
            }
            ExpressionKind::WordSpan(gap) => {
                self.describe_into(gap.left, out);
                match gap.max_words {
                    Some(max) => out.push_str(&format!(" .. [{}-{}] .. ", gap.min_words, max)),
                    None => out.push_str(&format!(" .. [{}+] .. ", gap.min_words)),
                }
                self.describe_into(gap.right, out);
            }
            ExpressionKind::Conjunction { elements } => {
                out.push('{');
                list(self, elements, " & ", out);
                out.push('}');
            }
            ExpressionKind::Having { outer: a, inner: b }
            | ExpressionKind::Inside { body: a, outer: b }
            | ExpressionKind::Outside {
                body: a,
                exception: b,
            } => {
                let kind = match self.kind(id).constraint() {
                    Some((kind, _, _)) => kind,
                    None => return,
                };
                self.describe_into(*a, out);
                out.push_str(&format!(" @{} ", kind));
                self.describe_into(*b, out);
            }
            ExpressionKind::Extraction { field, body } => {
                out.push_str(&self.fields[*field].name);
                out.push_str(": ");
                self.describe_into(*body, out);
            }
            ExpressionKind::FieldReference { field } => {
                out.push('$');
                out.push_str(&self.fields[*field].name);
            }
        }
    }
}
