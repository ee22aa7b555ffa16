//! Scope-aware semantic validation.
//!
//! A depth-first walk over the syntax tree with an explicit stack of
//! declaration frames. Assignments declare names in the innermost frame;
//! `ALL`/`ANY` quantifiers push a frame holding their bound names and pop
//! it on exit, so a quantified name never leaks past its construct.
//! Diagnostics reflect declaration order: a reference is only valid if
//! its declaration was already visited.

use std::collections::HashSet;

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};

use crate::parser::tree::{SourcePos, SyntaxNode};

/// Built-in operations callable from arch sources.
pub const BUILTIN_FUNCTIONS: [&str; 5] = ["route", "cross", "union", "failure_point", "instance"];

/// Diagnostic source tag for scope errors.
pub const DIAGNOSTIC_SOURCE: &str = "semantic";

struct ScopeStack {
    frames: Vec<HashSet<String>>,
}

impl ScopeStack {
    fn new() -> Self {
        Self {
            frames: vec![HashSet::new()],
        }
    }

    fn declare(&mut self, name: String) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name);
        }
    }

    fn is_declared(&self, name: &str) -> bool {
        self.frames.iter().rev().any(|frame| frame.contains(name))
    }

    fn push(&mut self, names: impl IntoIterator<Item = String>) {
        self.frames.push(names.into_iter().collect());
    }

    fn pop(&mut self) {
        self.frames.pop();
    }
}

/// Validate a tree, returning diagnostics in traversal order.
///
/// Read-only and re-entrant: every call gets a fresh frame stack, so
/// trees of different documents can be validated concurrently.
pub fn analyze(tree: &SyntaxNode) -> Vec<Diagnostic> {
    let mut scopes = ScopeStack::new();
    let mut diagnostics = Vec::new();
    walk(tree, &mut scopes, &mut diagnostics);
    diagnostics
}

fn walk(node: &SyntaxNode, scopes: &mut ScopeStack, diagnostics: &mut Vec<Diagnostic>) {
    match node {
        SyntaxNode::Assignment {
            name, expression, ..
        } => {
            // Declared before the right-hand side is visited, matching
            // the language's self-reference semantics.
            if let Some(name) = name {
                scopes.declare(name.clone());
            }
            if let Some(expression) = expression {
                walk(expression, scopes, diagnostics);
            }
        }
        SyntaxNode::Quantifier {
            bound,
            source,
            predicate,
            ..
        } => {
            scopes.push(bound.iter().cloned());
            if let Some(source) = source {
                walk(source, scopes, diagnostics);
            }
            if let Some(predicate) = predicate {
                walk(predicate, scopes, diagnostics);
            }
            scopes.pop();
        }
        SyntaxNode::Variable { name, pos } => {
            if let Some(name) = name {
                if !scopes.is_declared(name) {
                    diagnostics.push(error(*pos, format!("Uninitialized variable: {name}")));
                }
            }
        }
        SyntaxNode::Call { name, pos, .. } => {
            if let Some(name) = name {
                if !BUILTIN_FUNCTIONS.contains(&name.as_str()) {
                    diagnostics.push(error(*pos, format!("Unknown function: {name}")));
                }
            }
        }
        SyntaxNode::Keyword { .. } | SyntaxNode::Leaf => {}
        SyntaxNode::Block { statements, .. } => {
            for statement in statements {
                walk(statement, scopes, diagnostics);
            }
        }
        SyntaxNode::Tagged { children, .. } | SyntaxNode::Opaque { children, .. } => {
            for child in children {
                walk(child, scopes, diagnostics);
            }
        }
        SyntaxNode::List(items) => {
            for item in items {
                walk(item, scopes, diagnostics);
            }
        }
    }
}

fn error(pos: Option<SourcePos>, message: String) -> Diagnostic {
    // Positionless nodes anchor at the document start so every
    // diagnostic carries a valid range.
    let (line, column, length) = match pos {
        Some(pos) => (pos.line, pos.column, pos.length),
        None => (0, 0, 1),
    };
    Diagnostic {
        range: Range {
            start: Position::new(line, column),
            end: Position::new(line, column + length),
        },
        severity: Some(DiagnosticSeverity::ERROR),
        source: Some(DIAGNOSTIC_SOURCE.to_owned()),
        message,
        ..Default::default()
    }
}
