//! Semantic token classification for editor highlighting.
//!
//! Classification is independent of error checking: it only looks at
//! node kinds and recorded spans. The token legend is closed; `superset`
//! is the historical wire name of the keyword/quantifier category and is
//! kept for compatibility with existing editor themes.

use tower_lsp::lsp_types::{
    SemanticToken, SemanticTokenType, SemanticTokensLegend,
};

use crate::parser::tree::{SourcePos, SyntaxNode};

/// Legend index of the `variable` category.
pub const TOKEN_VARIABLE: u32 = 0;
/// Legend index of the `function` category.
pub const TOKEN_FUNCTION: u32 = 1;
/// Legend index of the `superset` (keyword/quantifier) category.
pub const TOKEN_SUPERSET: u32 = 2;

/// The token legend advertised in the server capabilities. Index order
/// must match the `TOKEN_*` constants.
pub fn legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: vec![
            SemanticTokenType::VARIABLE,
            SemanticTokenType::FUNCTION,
            SemanticTokenType::new("superset"),
        ],
        token_modifiers: vec![],
    }
}

/// A classified token at an absolute document position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsoluteToken {
    pub line: u32,
    pub column: u32,
    pub length: u32,
    pub token_type: u32,
}

/// Classify a tree into highlight tokens, sorted by position.
///
/// The sort is mandatory: the LSP delta encoding assumes a
/// monotonically increasing stream, and traversal order does not
/// guarantee document order. Nodes without a recorded span emit nothing.
pub fn classify(tree: &SyntaxNode) -> Vec<AbsoluteToken> {
    let mut tokens = Vec::new();
    collect(tree, &mut tokens);
    tokens.sort_by_key(|token| (token.line, token.column));
    tokens
}

fn collect(node: &SyntaxNode, out: &mut Vec<AbsoluteToken>) {
    match node {
        SyntaxNode::Variable { pos, .. } => push_token(out, *pos, TOKEN_VARIABLE),
        SyntaxNode::Call { args, pos, .. } => {
            push_token(out, *pos, TOKEN_FUNCTION);
            for arg in args {
                collect(arg, out);
            }
        }
        SyntaxNode::Keyword { pos, .. } => push_token(out, *pos, TOKEN_SUPERSET),
        SyntaxNode::Quantifier {
            source,
            predicate,
            pos,
            ..
        } => {
            push_token(out, *pos, TOKEN_SUPERSET);
            if let Some(source) = source {
                collect(source, out);
            }
            if let Some(predicate) = predicate {
                collect(predicate, out);
            }
        }
        SyntaxNode::Assignment { expression, .. } => {
            if let Some(expression) = expression {
                collect(expression, out);
            }
        }
        SyntaxNode::Block { statements, .. } => {
            for statement in statements {
                collect(statement, out);
            }
        }
        SyntaxNode::Tagged { children, .. } | SyntaxNode::Opaque { children, .. } => {
            for child in children {
                collect(child, out);
            }
        }
        SyntaxNode::List(items) => {
            for item in items {
                collect(item, out);
            }
        }
        SyntaxNode::Leaf => {}
    }
}

fn push_token(out: &mut Vec<AbsoluteToken>, pos: Option<SourcePos>, token_type: u32) {
    if let Some(pos) = pos {
        out.push(AbsoluteToken {
            line: pos.line,
            column: pos.column,
            length: pos.length,
            token_type,
        });
    }
}

/// Delta-encode a position-sorted token list for the LSP wire format.
pub fn encode(tokens: &[AbsoluteToken]) -> Vec<SemanticToken> {
    let mut prev_line = 0;
    let mut prev_column = 0;
    tokens
        .iter()
        .map(|token| {
            let delta_line = token.line - prev_line;
            let delta_start = if delta_line == 0 {
                token.column - prev_column
            } else {
                token.column
            };
            prev_line = token.line;
            prev_column = token.column;
            SemanticToken {
                delta_line,
                delta_start,
                length: token.length,
                token_type: token.token_type,
                token_modifiers_bitset: 0,
            }
        })
        .collect()
}
