//! Pattern syntax
//!
//!     [Syntax] is the uncompiled form of a pattern body, built with the constructor functions
//!     in this module. The notation in the docs follows the usual pattern language:
//!
//!         text("Google Drive")                  'Google Drive'
//!         seq([a, b])                           a + b
//!         word_seq([a, b])                      a _ b
//!         any_of([a, except(b)])                {a, ~b}
//!         repeat(a, 1, Some(3))                 [1-3] a
//!         any_span(a, b)                        a .. b
//!         word_span(a, 0, Some(2), b)           a .. [0-2] .. b
//!         all_of([a, b])                        {a & b}
//!         having(a, b)                          a @having b
//!         field("Name", a) / field_ref("Name")  Name: a / $Name
//!
//!     A text literal is split into tokens when compiled, so `text("Google Drive")` matches the
//!     word `Google`, one space token and the word `Drive`, case-insensitively.

use super::TokenExpression;
use crate::token::{CharCase, TokenKind, WordClass};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Syntax {
    Token(TokenExpression),
    Text {
        text: String,
        case_sensitive: bool,
    },
    /// Reference by name to a declared or standard pattern
    Pattern(String),
    Sequence {
        elements: Vec<Syntax>,
        word_sequence: bool,
    },
    Variation(Vec<Syntax>),
    /// Only valid as an element of a variation
    Exception(Box<Syntax>),
    Span {
        element: Box<Syntax>,
        min: usize,
        max: Option<usize>,
    },
    AnySpan {
        left: Box<Syntax>,
        right: Box<Syntax>,
        exclusion: Option<TokenExpression>,
        field: Option<String>,
    },
    WordSpan {
        left: Box<Syntax>,
        right: Box<Syntax>,
        min: usize,
        max: Option<usize>,
        exclusion: Option<TokenExpression>,
        field: Option<String>,
    },
    Conjunction(Vec<Syntax>),
    Having {
        outer: Box<Syntax>,
        inner: Box<Syntax>,
    },
    Inside {
        body: Box<Syntax>,
        outer: Box<Syntax>,
    },
    Outside {
        body: Box<Syntax>,
        exception: Box<Syntax>,
    },
    Field {
        name: String,
        body: Box<Syntax>,
    },
    FieldRef(String),
}

impl Syntax {
    /// Reject a span wait when a skipped token matches `exclusion`. No effect on other syntax.
    pub fn excluding(mut self, exclusion: TokenExpression) -> Self {
        match &mut self {
            Syntax::AnySpan { exclusion: slot, .. } | Syntax::WordSpan { exclusion: slot, .. } => {
                *slot = Some(exclusion)
            }
            _ => {}
        }
        self
    }

    /// Extract the skipped range of a span into a field. No effect on other syntax.
    pub fn gap_field(mut self, name: &str) -> Self {
        match &mut self {
            Syntax::AnySpan { field, .. } | Syntax::WordSpan { field, .. } => {
                *field = Some(name.to_string())
            }
            _ => {}
        }
        self
    }
}

/// Case-insensitive text, split into tokens when compiled.
pub fn text(text: &str) -> Syntax {
    Syntax::Text {
        text: text.to_string(),
        case_sensitive: false,
    }
}

pub fn text_exact(text: &str) -> Syntax {
    Syntax::Text {
        text: text.to_string(),
        case_sensitive: true,
    }
}

/// A word starting with `text`, case-insensitively.
pub fn prefix(text: &str) -> Syntax {
    Syntax::Token(TokenExpression::prefix(text, false))
}

pub fn token(expr: TokenExpression) -> Syntax {
    Syntax::Token(expr)
}

pub fn kind(kind: TokenKind) -> Syntax {
    Syntax::Token(TokenExpression::of_kind(kind))
}

pub fn word_class(class: WordClass) -> Syntax {
    Syntax::Token(TokenExpression::word_class(class))
}

pub fn word_case(case: CharCase) -> Syntax {
    Syntax::Token(TokenExpression::of_kind(TokenKind::Word).with_case(case))
}

pub fn pattern(name: &str) -> Syntax {
    Syntax::Pattern(name.to_string())
}

pub fn seq(elements: impl IntoIterator<Item = Syntax>) -> Syntax {
    Syntax::Sequence {
        elements: elements.into_iter().collect(),
        word_sequence: false,
    }
}

pub fn word_seq(elements: impl IntoIterator<Item = Syntax>) -> Syntax {
    Syntax::Sequence {
        elements: elements.into_iter().collect(),
        word_sequence: true,
    }
}

pub fn any_of(elements: impl IntoIterator<Item = Syntax>) -> Syntax {
    Syntax::Variation(elements.into_iter().collect())
}

pub fn except(body: Syntax) -> Syntax {
    Syntax::Exception(Box::new(body))
}

pub fn repeat(element: Syntax, min: usize, max: Option<usize>) -> Syntax {
    Syntax::Span {
        element: Box::new(element),
        min,
        max,
    }
}

pub fn optional(element: Syntax) -> Syntax {
    repeat(element, 0, Some(1))
}

pub fn any_span(left: Syntax, right: Syntax) -> Syntax {
    Syntax::AnySpan {
        left: Box::new(left),
        right: Box::new(right),
        exclusion: None,
        field: None,
    }
}

pub fn word_span(left: Syntax, min: usize, max: Option<usize>, right: Syntax) -> Syntax {
    Syntax::WordSpan {
        left: Box::new(left),
        right: Box::new(right),
        min,
        max,
        exclusion: None,
        field: None,
    }
}

pub fn all_of(elements: impl IntoIterator<Item = Syntax>) -> Syntax {
    Syntax::Conjunction(elements.into_iter().collect())
}

pub fn having(outer: Syntax, inner: Syntax) -> Syntax {
    Syntax::Having {
        outer: Box::new(outer),
        inner: Box::new(inner),
    }
}

pub fn inside(body: Syntax, outer: Syntax) -> Syntax {
    Syntax::Inside {
        body: Box::new(body),
        outer: Box::new(outer),
    }
}

pub fn outside(body: Syntax, exception: Syntax) -> Syntax {
    Syntax::Outside {
        body: Box::new(body),
        exception: Box::new(exception),
    }
}

pub fn field(name: &str, body: Syntax) -> Syntax {
    Syntax::Field {
        name: name.to_string(),
        body: Box::new(body),
    }
}

pub fn field_ref(name: &str) -> Syntax {
    Syntax::FieldRef(name.to_string())
}
