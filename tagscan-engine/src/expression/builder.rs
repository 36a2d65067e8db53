//! Pattern set builder
//!
//!     Lowers [Syntax] into a [PatternSet]. The work happens in four passes:
//!
//!     1. Declaration: names get dense ids in declaration order, fields are collected per
//!        pattern. Anonymous patterns created for containment operands are appended later.
//!     2. Lowering: each pattern body becomes a tree of [Expression] nodes. Ordinary pattern
//!        references are inlined, text literals are split into tokens, containment operands
//!        become references to searched patterns.
//!     3. Analysis: searched and conditional patterns, referrers, reference cycles.
//!     4. Indexing: leaf metadata and the first-region index of every node, in post-order
//!        (children always have lower ids than their parent), then the two top level indices.

use super::standard::standard;
use super::{
    ConstraintKind, ExprId, Expression, ExpressionKind, Field, FieldId, GapExpression, Pattern,
    PatternId, PatternSet, Syntax, TokenExpression,
};
use crate::error::PatternSetError;
use crate::index::{ExpressionIndex, IndexPart};
use crate::token::{tokenize, TokenKind};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct Definition {
    name: String,
    body: Syntax,
    is_target: bool,
}

/// Collects pattern definitions and compiles them into a [PatternSet].
#[derive(Debug, Clone, Default)]
pub struct PatternSetBuilder {
    definitions: Vec<Definition>,
}

impl PatternSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a target pattern: its matches are reported.
    pub fn add(&mut self, name: &str, body: Syntax) -> &mut Self {
        self.definitions.push(Definition {
            name: name.to_string(),
            body,
            is_target: true,
        });
        self
    }

    /// Declare a pattern that is only used by other patterns.
    pub fn add_helper(&mut self, name: &str, body: Syntax) -> &mut Self {
        self.definitions.push(Definition {
            name: name.to_string(),
            body,
            is_target: false,
        });
        self
    }

    pub fn build(&self) -> Result<PatternSet, PatternSetError> {
        let mut compiler = Compiler::new(self.definitions.clone())?;
        compiler.lower_all()?;
        compiler.finish()
    }
}

struct Node {
    parent: Option<ExprId>,
    pattern: PatternId,
    kind: ExpressionKind,
    nullable: bool,
}

struct Compiler {
    definitions: Vec<Definition>,
    names: HashMap<String, PatternId>,
    nodes: Vec<Node>,
    fields: Vec<Field>,
    field_ids: HashMap<(PatternId, String), FieldId>,
    bodies: Vec<Option<ExprId>>,
    references: Vec<Vec<(ConstraintKind, PatternId)>>,
    inline_stack: Vec<PatternId>,
}

impl Compiler {
    fn new(definitions: Vec<Definition>) -> Result<Self, PatternSetError> {
        let mut compiler = Compiler {
            definitions: Vec::new(),
            names: HashMap::new(),
            nodes: Vec::new(),
            fields: Vec::new(),
            field_ids: HashMap::new(),
            bodies: Vec::new(),
            references: Vec::new(),
            inline_stack: Vec::new(),
        };
        for definition in definitions {
            if compiler.names.contains_key(&definition.name) {
                return Err(PatternSetError::DuplicatePattern(definition.name));
            }
            compiler.declare(definition);
        }
        Ok(compiler)
    }

    fn declare(&mut self, definition: Definition) -> PatternId {
        let id = self.definitions.len();
        self.names.insert(definition.name.clone(), id);
        let body = definition.body.clone();
        self.definitions.push(definition);
        self.bodies.push(None);
        self.references.push(Vec::new());
        self.declare_fields(id, &body);
        id
    }

    fn declare_fields(&mut self, pattern: PatternId, syntax: &Syntax) {
        let declare = |this: &mut Self, name: &str| {
            let key = (pattern, name.to_string());
            if !this.field_ids.contains_key(&key) {
                let id = this.fields.len();
                this.fields.push(Field {
                    id,
                    pattern,
                    name: name.to_string(),
                    referenced: false,
                });
                this.field_ids.insert(key, id);
            }
        };
        match syntax {
            Syntax::Field { name, body } => {
                declare(self, name);
                self.declare_fields(pattern, body);
            }
            Syntax::AnySpan {
                left, right, field, ..
            }
            | Syntax::WordSpan {
                left, right, field, ..
            } => {
                if let Some(name) = field {
                    declare(self, name);
                }
                self.declare_fields(pattern, left);
                self.declare_fields(pattern, right);
            }
            Syntax::Sequence { elements, .. }
            | Syntax::Variation(elements)
            | Syntax::Conjunction(elements) => {
                for element in elements {
                    self.declare_fields(pattern, element);
                }
            }
            Syntax::Exception(body) | Syntax::Span { element: body, .. } => {
                self.declare_fields(pattern, body)
            }
            // Operands become patterns of their own
            Syntax::Having { outer: body, .. }
            | Syntax::Inside { body, .. }
            | Syntax::Outside { body, .. } => self.declare_fields(pattern, body),
            Syntax::Token(_) | Syntax::Text { .. } | Syntax::Pattern(_) | Syntax::FieldRef(_) => {}
        }
    }

    fn lower_all(&mut self) -> Result<(), PatternSetError> {
        // Lowering may append anonymous operand patterns
        let mut next = 0;
        while next < self.definitions.len() {
            let body = self.definitions[next].body.clone();
            self.inline_stack = vec![next];
            let root = self.lower(&body, next, next)?;
            self.bodies[next] = Some(root);
            next += 1;
        }
        Ok(())
    }

    fn name(&self, pattern: PatternId) -> String {
        self.definitions[pattern].name.clone()
    }

    fn push(&mut self, pattern: PatternId, kind: ExpressionKind) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        let nullable = self.nullable(&kind);
        for child in kind.children() {
            self.nodes[child.index()].parent = Some(id);
        }
        self.nodes.push(Node {
            parent: None,
            pattern,
            kind,
            nullable,
        });
        id
    }

    fn is_nullable(&self, id: ExprId) -> bool {
        self.nodes[id.index()].nullable
    }

    fn nullable(&self, kind: &ExpressionKind) -> bool {
        match kind {
            ExpressionKind::Token(_)
            | ExpressionKind::PatternReference { .. }
            | ExpressionKind::FieldReference { .. }
            | ExpressionKind::AnySpan(_)
            | ExpressionKind::WordSpan(_) => false,
            ExpressionKind::Embedded { body, .. } | ExpressionKind::Extraction { body, .. } => {
                self.is_nullable(*body)
            }
            ExpressionKind::Sequence { elements, .. } | ExpressionKind::Conjunction { elements } => {
                elements.iter().all(|e| self.is_nullable(*e))
            }
            ExpressionKind::Variation { elements, .. } => {
                elements.iter().any(|e| self.is_nullable(*e))
            }
            ExpressionKind::Span { element, min, .. } => *min == 0 || self.is_nullable(*element),
            ExpressionKind::Having { outer: body, .. }
            | ExpressionKind::Inside { body, .. }
            | ExpressionKind::Outside { body, .. } => self.is_nullable(*body),
        }
    }

    fn non_nullable(
        &self,
        id: ExprId,
        owner: PatternId,
        operand: &'static str,
    ) -> Result<ExprId, PatternSetError> {
        if self.is_nullable(id) {
            return Err(PatternSetError::NullableOperand {
                pattern: self.name(owner),
                operand,
            });
        }
        Ok(id)
    }

    /// Lower `syntax` into the tree of `owner`. Field names resolve in `scope`, which differs
    /// from `owner` inside inlined patterns.
    fn lower(
        &mut self,
        syntax: &Syntax,
        owner: PatternId,
        scope: PatternId,
    ) -> Result<ExprId, PatternSetError> {
        match syntax {
            Syntax::Token(expr) => Ok(self.push(owner, ExpressionKind::Token(expr.clone()))),
            Syntax::Text {
                text,
                case_sensitive,
            } => self.lower_text(text, *case_sensitive, owner),
            Syntax::Pattern(name) => self.lower_reference(name, owner, scope),
            Syntax::Sequence {
                elements,
                word_sequence,
            } => {
                if elements.is_empty() {
                    return Err(PatternSetError::EmptySequence(self.name(owner)));
                }
                let elements = self.lower_all_of(elements, owner, scope)?;
                Ok(self.push(
                    owner,
                    ExpressionKind::Sequence {
                        elements,
                        word_sequence: *word_sequence,
                    },
                ))
            }
            Syntax::Variation(items) => {
                let mut elements = Vec::new();
                let mut exceptions = Vec::new();
                for item in items {
                    match item {
                        Syntax::Exception(body) => {
                            let branch = self.lower(body, owner, scope)?;
                            exceptions.push(self.non_nullable(branch, owner, "exception")?);
                        }
                        _ => elements.push(self.lower(item, owner, scope)?),
                    }
                }
                if elements.is_empty() {
                    return Err(PatternSetError::EmptyVariation(self.name(owner)));
                }
                Ok(self.push(
                    owner,
                    ExpressionKind::Variation {
                        elements,
                        exceptions,
                    },
                ))
            }
            Syntax::Exception(_) => Err(PatternSetError::MisplacedException(self.name(owner))),
            Syntax::Span { element, min, max } => {
                if let Some(max) = *max {
                    if max == 0 || max < *min {
                        return Err(PatternSetError::InvalidSpanBounds {
                            pattern: self.name(owner),
                            min: *min,
                            max,
                        });
                    }
                }
                let element = self.lower(element, owner, scope)?;
                let element = self.non_nullable(element, owner, "repeated element")?;
                Ok(self.push(
                    owner,
                    ExpressionKind::Span {
                        element,
                        min: *min,
                        max: *max,
                    },
                ))
            }
            Syntax::AnySpan {
                left,
                right,
                exclusion,
                field,
            } => {
                let gap = self.lower_gap(left, right, 0, None, exclusion, field, owner, scope)?;
                Ok(self.push(owner, ExpressionKind::AnySpan(gap)))
            }
            Syntax::WordSpan {
                left,
                right,
                min,
                max,
                exclusion,
                field,
            } => {
                if let Some(max) = *max {
                    if max < *min {
                        return Err(PatternSetError::InvalidSpanBounds {
                            pattern: self.name(owner),
                            min: *min,
                            max,
                        });
                    }
                }
                let gap =
                    self.lower_gap(left, right, *min, *max, exclusion, field, owner, scope)?;
                Ok(self.push(owner, ExpressionKind::WordSpan(gap)))
            }
            Syntax::Conjunction(items) => {
                if items.is_empty() {
                    return Err(PatternSetError::EmptySequence(self.name(owner)));
                }
                if items.len() > 64 {
                    return Err(PatternSetError::ConjunctionTooLarge {
                        pattern: self.name(owner),
                        count: items.len(),
                    });
                }
                let elements = self.lower_all_of(items, owner, scope)?;
                Ok(self.push(owner, ExpressionKind::Conjunction { elements }))
            }
            Syntax::Having { outer, inner } => {
                let outer = self.lower(outer, owner, scope)?;
                let outer = self.non_nullable(outer, owner, "having body")?;
                let inner = self.lower_operand(inner, ConstraintKind::Having, owner)?;
                Ok(self.push(owner, ExpressionKind::Having { outer, inner }))
            }
            Syntax::Inside { body, outer } => {
                let body = self.lower(body, owner, scope)?;
                let body = self.non_nullable(body, owner, "inside body")?;
                let outer = self.lower_operand(outer, ConstraintKind::Inside, owner)?;
                Ok(self.push(owner, ExpressionKind::Inside { body, outer }))
            }
            Syntax::Outside { body, exception } => {
                let body = self.lower(body, owner, scope)?;
                let body = self.non_nullable(body, owner, "outside body")?;
                let exception = self.lower_operand(exception, ConstraintKind::Outside, owner)?;
                Ok(self.push(owner, ExpressionKind::Outside { body, exception }))
            }
            Syntax::Field { name, body } => {
                let body = self.lower(body, owner, scope)?;
                let field = self.field(scope, name)?;
                Ok(self.push(owner, ExpressionKind::Extraction { field, body }))
            }
            Syntax::FieldRef(name) => {
                let field = self.field(scope, name)?;
                self.fields[field].referenced = true;
                Ok(self.push(owner, ExpressionKind::FieldReference { field }))
            }
        }
    }

    fn lower_all_of(
        &mut self,
        items: &[Syntax],
        owner: PatternId,
        scope: PatternId,
    ) -> Result<Vec<ExprId>, PatternSetError> {
        items
            .iter()
            .map(|item| self.lower(item, owner, scope))
            .collect()
    }

    fn lower_text(
        &mut self,
        text: &str,
        case_sensitive: bool,
        owner: PatternId,
    ) -> Result<ExprId, PatternSetError> {
        let mut elements = Vec::new();
        for token in tokenize(text) {
            let expr = match token.kind {
                TokenKind::Start | TokenKind::End => continue,
                TokenKind::Space | TokenKind::LineBreak => TokenExpression::of_kind(token.kind),
                kind => TokenExpression::text(kind, &token.text, case_sensitive),
            };
            elements.push(self.push(owner, ExpressionKind::Token(expr)));
        }
        match elements.len() {
            0 => Err(PatternSetError::EmptyText(self.name(owner))),
            1 => Ok(elements[0]),
            _ => Ok(self.push(
                owner,
                ExpressionKind::Sequence {
                    elements,
                    word_sequence: false,
                },
            )),
        }
    }

    fn lower_reference(
        &mut self,
        name: &str,
        owner: PatternId,
        scope: PatternId,
    ) -> Result<ExprId, PatternSetError> {
        if let Some(&pattern) = self.names.get(name) {
            if self.inline_stack.contains(&pattern) {
                return Err(PatternSetError::RecursiveReference(name.to_string()));
            }
            let body = self.definitions[pattern].body.clone();
            self.inline_stack.push(pattern);
            let body = self.lower(&body, owner, pattern);
            self.inline_stack.pop();
            let body = body?;
            return Ok(self.push(owner, ExpressionKind::Embedded { pattern, body }));
        }
        match standard(name) {
            Some(syntax) => self.lower(syntax, owner, scope),
            None => Err(PatternSetError::UnknownPattern {
                name: name.to_string(),
                from: self.name(owner),
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_gap(
        &mut self,
        left: &Syntax,
        right: &Syntax,
        min_words: usize,
        max_words: Option<usize>,
        exclusion: &Option<TokenExpression>,
        field: &Option<String>,
        owner: PatternId,
        scope: PatternId,
    ) -> Result<GapExpression, PatternSetError> {
        let left = self.lower(left, owner, scope)?;
        let left = self.non_nullable(left, owner, "span start")?;
        let right = self.lower(right, owner, scope)?;
        let right = self.non_nullable(right, owner, "span end")?;
        let field = match field {
            Some(name) => Some(self.field(scope, name)?),
            None => None,
        };
        Ok(GapExpression {
            left,
            right,
            min_words,
            max_words,
            exclusion: exclusion.clone(),
            field,
        })
    }

    /// A containment operand: a declared pattern by name, or an anonymous pattern.
    fn lower_operand(
        &mut self,
        syntax: &Syntax,
        kind: ConstraintKind,
        owner: PatternId,
    ) -> Result<ExprId, PatternSetError> {
        let pattern = match syntax {
            Syntax::Pattern(name) if self.names.contains_key(name) => self.names[name],
            _ => {
                let name = format!(
                    "{}@{}#{}",
                    self.name(owner),
                    kind,
                    self.references[owner].len()
                );
                self.declare(Definition {
                    name,
                    body: syntax.clone(),
                    is_target: false,
                })
            }
        };
        self.references[owner].push((kind, pattern));
        Ok(self.push(owner, ExpressionKind::PatternReference { pattern }))
    }

    fn field(&self, scope: PatternId, name: &str) -> Result<FieldId, PatternSetError> {
        self.field_ids
            .get(&(scope, name.to_string()))
            .copied()
            .ok_or_else(|| PatternSetError::UndeclaredField {
                pattern: self.name(scope),
                field: name.to_string(),
            })
    }

    fn finish(self) -> Result<PatternSet, PatternSetError> {
        let count = self.definitions.len();
        let mut bodies = Vec::with_capacity(count);
        for (id, body) in self.bodies.iter().enumerate() {
            let body = body.ok_or_else(|| PatternSetError::UnknownPattern {
                name: self.name(id),
                from: self.name(id),
            })?;
            if self.is_nullable(body) {
                return Err(PatternSetError::NullableBody(self.name(id)));
            }
            bodies.push(body);
        }

        let mut referrers: Vec<Vec<PatternId>> = vec![Vec::new(); count];
        let mut having_only = vec![true; count];
        for (from, references) in self.references.iter().enumerate() {
            for (kind, to) in references {
                if !referrers[*to].contains(&from) {
                    referrers[*to].push(from);
                }
                if *kind != ConstraintKind::Having {
                    having_only[*to] = false;
                }
            }
        }
        self.check_cycles()?;

        let mut searched = vec![false; count];
        let mut stack: Vec<PatternId> = (0..count)
            .filter(|p| self.definitions[*p].is_target)
            .collect();
        while let Some(pattern) = stack.pop() {
            if searched[pattern] {
                continue;
            }
            searched[pattern] = true;
            stack.extend(self.references[pattern].iter().map(|(_, to)| *to));
        }
        let conditional: Vec<bool> = (0..count)
            .map(|p| {
                searched[p]
                    && !self.definitions[p].is_target
                    && !referrers[p].is_empty()
                    && having_only[p]
            })
            .collect();

        let (metadata, indices) = self.index_nodes(&conditional);

        let mut expressions = Vec::with_capacity(self.nodes.len());
        for ((n, node), (index, (chain, branch))) in self
            .nodes
            .into_iter()
            .enumerate()
            .zip(indices.into_iter().zip(metadata))
        {
            expressions.push(Expression {
                id: ExprId(n as u32),
                parent: node.parent,
                pattern: node.pattern,
                kind: node.kind,
                nullable: node.nullable,
                index,
                variation_chain: chain,
                exception_branch: branch,
            });
        }

        let mut patterns = Vec::with_capacity(count);
        for (id, definition) in self.definitions.into_iter().enumerate() {
            let body = bodies[id];
            if let Some(reference) = expressions[body.index()].index.field_references.first() {
                if let ExpressionKind::FieldReference { field } = expressions[reference.index()].kind
                {
                    return Err(PatternSetError::MisplacedFieldReference {
                        pattern: definition.name,
                        field: self.fields[field].name.clone(),
                    });
                }
            }
            patterns.push(Pattern {
                id,
                name: definition.name,
                is_target: definition.is_target,
                body,
                fields: self
                    .fields
                    .iter()
                    .filter(|f| f.pattern == id)
                    .map(|f| f.id)
                    .collect(),
                searched: searched[id],
                conditional: conditional[id],
                references: self.references[id].clone(),
                referrers: referrers[id].clone(),
            });
        }

        let mut root_index = ExpressionIndex::default();
        let mut conditional_index = ExpressionIndex::default();
        for pattern in patterns.iter().filter(|p| p.searched) {
            let body = &expressions[pattern.body.index()].index;
            if pattern.conditional {
                conditional_index.merge(body);
            } else {
                root_index.merge(body);
            }
        }

        debug!(
            patterns = patterns.len(),
            expressions = expressions.len(),
            searched = patterns.iter().filter(|p| p.searched).count(),
            "compiled pattern set"
        );

        Ok(PatternSet {
            expressions,
            names: self.names,
            patterns,
            fields: self.fields,
            root_index,
            conditional_index,
        })
    }

    /// Containment references must not loop back to the referring pattern.
    fn check_cycles(&self) -> Result<(), PatternSetError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Open,
            Done,
        }
        let count = self.definitions.len();
        let mut marks = vec![Mark::New; count];
        for start in 0..count {
            if marks[start] != Mark::New {
                continue;
            }
            // (pattern, next reference to visit)
            let mut stack = vec![(start, 0usize)];
            marks[start] = Mark::Open;
            while let Some((pattern, next)) = stack.last_mut() {
                let references = &self.references[*pattern];
                if *next == references.len() {
                    marks[*pattern] = Mark::Done;
                    stack.pop();
                    continue;
                }
                let (_, to) = references[*next];
                *next += 1;
                match marks[to] {
                    Mark::Open => return Err(PatternSetError::RecursiveReference(self.name(to))),
                    Mark::New => {
                        marks[to] = Mark::Open;
                        stack.push((to, 0));
                    }
                    Mark::Done => {}
                }
            }
        }
        Ok(())
    }

    /// Leaf metadata and per-node indices.
    #[allow(clippy::type_complexity)]
    fn index_nodes(
        &self,
        conditional: &[bool],
    ) -> (Vec<(Vec<ExprId>, Option<ExprId>)>, Vec<ExpressionIndex>) {
        let mut metadata = Vec::with_capacity(self.nodes.len());
        for n in 0..self.nodes.len() {
            let id = ExprId(n as u32);
            if self.nodes[n].kind.is_leaf() {
                metadata.push(self.leaf_metadata(id));
            } else {
                metadata.push((Vec::new(), None));
            }
        }

        let mut built: Vec<ExpressionIndex> = Vec::with_capacity(self.nodes.len());
        for n in 0..self.nodes.len() {
            let id = ExprId(n as u32);
            let mut index = ExpressionIndex::default();
            match &self.nodes[n].kind {
                ExpressionKind::Token(expr) => index.required.tokens.insert(expr.index_key(), id),
                ExpressionKind::FieldReference { .. } => index.field_references.push(id),
                ExpressionKind::PatternReference { .. } => {}
                ExpressionKind::Embedded { body, .. } | ExpressionKind::Extraction { body, .. } => {
                    absorb(&mut index, &built[body.index()], Region::First, false)
                }
                ExpressionKind::Sequence { elements, .. } => {
                    let mut first_region = true;
                    for (position, element) in elements.iter().enumerate() {
                        let region = if first_region {
                            Region::First
                        } else {
                            Region::ReferencesOnly
                        };
                        absorb(&mut index, &built[element.index()], region, position > 0);
                        if !self.is_nullable(*element) {
                            first_region = false;
                        }
                    }
                }
                ExpressionKind::Variation {
                    elements,
                    exceptions,
                } => {
                    for element in elements {
                        absorb(&mut index, &built[element.index()], Region::First, false);
                    }
                    for exception in exceptions {
                        absorb(
                            &mut index,
                            &built[exception.index()],
                            Region::Exception,
                            false,
                        );
                    }
                }
                ExpressionKind::Span { element, min, .. } => {
                    absorb(&mut index, &built[element.index()], Region::First, *min == 0)
                }
                ExpressionKind::AnySpan(gap) | ExpressionKind::WordSpan(gap) => {
                    absorb(&mut index, &built[gap.left.index()], Region::First, false);
                    absorb(
                        &mut index,
                        &built[gap.right.index()],
                        Region::ReferencesOnly,
                        false,
                    );
                }
                ExpressionKind::Conjunction { elements } => {
                    for element in elements {
                        absorb(&mut index, &built[element.index()], Region::First, false);
                    }
                }
                ExpressionKind::Having { outer, inner } => {
                    absorb(&mut index, &built[outer.index()], Region::First, false);
                    if let ExpressionKind::PatternReference { pattern } =
                        self.nodes[inner.index()].kind
                    {
                        let part = if conditional[pattern] {
                            &mut index.optional
                        } else {
                            &mut index.required
                        };
                        part.references.insert(pattern, *inner);
                    }
                }
                ExpressionKind::Inside { body, outer } => {
                    absorb(&mut index, &built[body.index()], Region::First, false);
                    if let ExpressionKind::PatternReference { pattern } =
                        self.nodes[outer.index()].kind
                    {
                        index.required.references.insert(pattern, *outer);
                    }
                }
                ExpressionKind::Outside { body, exception } => {
                    absorb(&mut index, &built[body.index()], Region::First, false);
                    if let ExpressionKind::PatternReference { pattern } =
                        self.nodes[exception.index()].kind
                    {
                        index.required.exception_references.insert(pattern, *exception);
                    }
                }
            }
            built.push(index);
        }
        (metadata, built)
    }

    fn leaf_metadata(&self, leaf: ExprId) -> (Vec<ExprId>, Option<ExprId>) {
        let mut chain = Vec::new();
        let mut branch = None;
        let mut child = leaf;
        while let Some(parent) = self.nodes[child.index()].parent {
            if let ExpressionKind::Variation { exceptions, .. } = &self.nodes[parent.index()].kind {
                if exceptions.contains(&child) {
                    if branch.is_none() {
                        branch = Some(child);
                    }
                } else if !exceptions.is_empty() && branch.is_none() {
                    chain.push(parent);
                }
            }
            child = parent;
        }
        (chain, branch)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Region {
    /// Tokens and references
    First,
    /// Tokens move to the exception buckets
    Exception,
    /// Past the first region: only the subtree's references
    ReferencesOnly,
}

fn absorb(target: &mut ExpressionIndex, source: &ExpressionIndex, region: Region, optional: bool) {
    let exception = region == Region::Exception;
    for (source_part, source_optional) in [(&source.required, false), (&source.optional, true)] {
        let part: &mut IndexPart = if optional || source_optional {
            &mut target.optional
        } else {
            &mut target.required
        };
        if region != Region::ReferencesOnly {
            if exception {
                part.exception_tokens.merge(&source_part.tokens);
            } else {
                part.tokens.merge(&source_part.tokens);
            }
            part.exception_tokens.merge(&source_part.exception_tokens);
        }
        if exception {
            part.exception_references.merge(&source_part.references);
        } else {
            part.references.merge(&source_part.references);
        }
        part.exception_references
            .merge(&source_part.exception_references);
    }
    if region == Region::First {
        for reference in &source.field_references {
            if !target.field_references.contains(reference) {
                target.field_references.push(*reference);
            }
        }
    }
}
