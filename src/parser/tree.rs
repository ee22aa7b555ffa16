//! Syntax tree model for arch parser output.
//!
//! The external parser emits one JSON document per parse. Node objects
//! carry a `type` tag plus kind-specific fields; position metadata, when
//! present, lives in a `node` sub-object with 1-based `line`/`column`
//! and an optional `length`.
//!
//! Decoding is total: every JSON value maps to some [`SyntaxNode`].
//! Shapes the decoder does not recognize degrade to generic traversal
//! instead of failing, so parser drift can never crash an analysis pass.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Child slots recognized on tagged nodes, in traversal order.
const CHILD_SLOTS: [&str; 15] = [
    "children",
    "blocks",
    "statements",
    "args",
    "statement",
    "expression",
    "quantifier",
    "cond",
    "then",
    "else",
    "source",
    "predicate",
    "left",
    "right",
    "operand",
];

/// Source position of a node. Line and column are 0-based here; the
/// parser emits 1-based values and the decoder shifts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
    /// Length of the covered text, at least 1.
    pub length: u32,
}

/// Quantifier flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantifierKind {
    All,
    Any,
}

impl QuantifierKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ALL" => Some(Self::All),
            "ANY" => Some(Self::Any),
            _ => None,
        }
    }
}

/// A decoded parser node.
///
/// Kinds the analyses care about get explicit variants; every other
/// tagged node becomes [`SyntaxNode::Tagged`] with its children gathered
/// from the recognized child slots, and tagless objects become
/// [`SyntaxNode::Opaque`] with all their values as children.
#[derive(Debug, Clone)]
pub enum SyntaxNode {
    /// `name = expression`, declaring `name` in the current scope.
    Assignment {
        name: Option<String>,
        expression: Option<Box<SyntaxNode>>,
        pos: Option<SourcePos>,
    },
    /// `ALL`/`ANY` construct binding fresh names over its source and
    /// predicate sub-trees.
    Quantifier {
        kind: QuantifierKind,
        bound: Vec<String>,
        source: Option<Box<SyntaxNode>>,
        predicate: Option<Box<SyntaxNode>>,
        pos: Option<SourcePos>,
    },
    /// Reference to a declared name.
    Variable {
        name: Option<String>,
        pos: Option<SourcePos>,
    },
    /// Call of a named operation.
    Call {
        name: Option<String>,
        args: Vec<SyntaxNode>,
        pos: Option<SourcePos>,
    },
    /// Reserved word in expression position.
    Keyword {
        name: Option<String>,
        pos: Option<SourcePos>,
    },
    /// Statement sequence.
    Block {
        statements: Vec<SyntaxNode>,
        pos: Option<SourcePos>,
    },
    /// Any other tagged node, children taken from the recognized slots.
    Tagged {
        tag: String,
        children: Vec<SyntaxNode>,
        pos: Option<SourcePos>,
    },
    /// Object with no `type` tag; children are all of its values.
    Opaque {
        children: Vec<SyntaxNode>,
        pos: Option<SourcePos>,
    },
    /// JSON array.
    List(Vec<SyntaxNode>),
    /// Scalar with no analysis significance.
    Leaf,
}

/// Raw position record as the parser writes it (1-based).
#[derive(Debug, Deserialize)]
struct RawPos {
    line: i64,
    column: i64,
    length: Option<i64>,
}

impl RawPos {
    fn into_pos(self) -> Option<SourcePos> {
        if self.line < 1 || self.column < 1 {
            return None;
        }
        let length = self
            .length
            .and_then(|len| u32::try_from(len).ok())
            .filter(|len| *len > 0)
            .unwrap_or(1);
        Some(SourcePos {
            line: u32::try_from(self.line - 1).ok()?,
            column: u32::try_from(self.column - 1).ok()?,
            length,
        })
    }
}

fn decode_pos(obj: &Map<String, Value>) -> Option<SourcePos> {
    // Preferred shape is a `node` sub-object; some node kinds carry the
    // fields inline instead.
    let raw: RawPos = match obj.get("node") {
        Some(node) => serde_json::from_value(node.clone()).ok()?,
        None => RawPos {
            line: obj.get("line").and_then(Value::as_i64)?,
            column: obj.get("column").and_then(Value::as_i64)?,
            length: obj.get("length").and_then(Value::as_i64),
        },
    };
    raw.into_pos()
}

impl SyntaxNode {
    /// Decode any parser JSON value. Never fails.
    pub fn from_value(value: &Value) -> SyntaxNode {
        match value {
            Value::Array(items) => {
                SyntaxNode::List(items.iter().map(SyntaxNode::from_value).collect())
            }
            Value::Object(obj) => Self::from_object(obj),
            _ => SyntaxNode::Leaf,
        }
    }

    fn from_object(obj: &Map<String, Value>) -> SyntaxNode {
        let pos = decode_pos(obj);
        let tag = obj.get("type").and_then(Value::as_str);

        // The serializer writes calls with the tag under `expression`
        // rather than `type`; accept either spelling.
        let is_call = tag == Some("call")
            || (tag.is_none() && obj.get("expression").and_then(Value::as_str) == Some("call"));
        if is_call {
            return SyntaxNode::Call {
                name: string_field(obj, "name"),
                args: obj
                    .get("args")
                    .and_then(Value::as_array)
                    .map(|items| items.iter().map(SyntaxNode::from_value).collect())
                    .unwrap_or_default(),
                pos,
            };
        }

        let Some(tag) = tag else {
            return SyntaxNode::Opaque {
                children: obj.values().map(SyntaxNode::from_value).collect(),
                pos,
            };
        };

        if let Some(kind) = QuantifierKind::from_tag(tag) {
            return Self::quantifier_from_object(kind, obj, pos);
        }

        match tag {
            "assignment" => SyntaxNode::Assignment {
                name: string_field(obj, "name"),
                expression: obj
                    .get("expression")
                    .map(|value| Box::new(SyntaxNode::from_value(value))),
                pos,
            },
            "variable" => SyntaxNode::Variable {
                name: string_field(obj, "variable"),
                pos,
            },
            "keyword" => SyntaxNode::Keyword {
                name: string_field(obj, "keyword"),
                pos,
            },
            "block" => SyntaxNode::Block {
                statements: obj
                    .get("statements")
                    .and_then(Value::as_array)
                    .map(|items| items.iter().map(SyntaxNode::from_value).collect())
                    .unwrap_or_default(),
                pos,
            },
            _ => SyntaxNode::Tagged {
                tag: tag.to_owned(),
                children: CHILD_SLOTS
                    .iter()
                    .filter_map(|slot| obj.get(*slot))
                    .map(SyntaxNode::from_value)
                    .collect(),
                pos,
            },
        }
    }

    /// Decode an `ALL`/`ANY` node.
    ///
    /// The parser either flattens the bound-identifier list, `source`
    /// and `predicate` onto the quantifier node itself, or wraps them
    /// one level down in its selection-statement `expression` child.
    fn quantifier_from_object(
        kind: QuantifierKind,
        obj: &Map<String, Value>,
        pos: Option<SourcePos>,
    ) -> SyntaxNode {
        let body = obj.get("expression").and_then(Value::as_object);
        let field = |name: &str| obj.get(name).or_else(|| body.and_then(|b| b.get(name)));

        // Non-string entries in the argument list carry no binding.
        let bound = field("args")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        SyntaxNode::Quantifier {
            kind,
            bound,
            source: field("source").map(|value| Box::new(SyntaxNode::from_value(value))),
            predicate: field("predicate").map(|value| Box::new(SyntaxNode::from_value(value))),
            pos,
        }
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_assignment() {
        let node = SyntaxNode::from_value(&json!({
            "type": "assignment",
            "name": "a",
            "expression": {"type": "variable", "variable": "b"},
        }));
        match node {
            SyntaxNode::Assignment {
                name, expression, ..
            } => {
                assert_eq!(name.as_deref(), Some("a"));
                assert!(matches!(
                    expression.as_deref(),
                    Some(SyntaxNode::Variable { .. })
                ));
            }
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn decodes_call_with_either_tag_spelling() {
        for tree in [
            json!({"type": "call", "name": "route", "args": []}),
            json!({"expression": "call", "name": "route", "args": []}),
        ] {
            match SyntaxNode::from_value(&tree) {
                SyntaxNode::Call { name, .. } => assert_eq!(name.as_deref(), Some("route")),
                other => panic!("expected call, got {other:?}"),
            }
        }
    }

    #[test]
    fn decodes_flat_quantifier() {
        let node = SyntaxNode::from_value(&json!({
            "type": "ALL",
            "args": ["x", {"not": "a string"}, "y"],
            "source": {"type": "variable", "variable": "nodes"},
            "predicate": {"type": "variable", "variable": "x"},
        }));
        match node {
            SyntaxNode::Quantifier {
                kind,
                bound,
                source,
                predicate,
                ..
            } => {
                assert_eq!(kind, QuantifierKind::All);
                assert_eq!(bound, vec!["x".to_string(), "y".to_string()]);
                assert!(source.is_some());
                assert!(predicate.is_some());
            }
            other => panic!("expected quantifier, got {other:?}"),
        }
    }

    #[test]
    fn decodes_wrapped_quantifier() {
        // Bound names and sub-trees nested in the selection-statement child.
        let node = SyntaxNode::from_value(&json!({
            "type": "ANY",
            "expression": {
                "type": "statement",
                "args": ["n"],
                "source": {"type": "variable", "variable": "nodes"},
                "predicate": {"type": "variable", "variable": "n"},
            },
        }));
        match node {
            SyntaxNode::Quantifier {
                kind,
                bound,
                source,
                predicate,
                ..
            } => {
                assert_eq!(kind, QuantifierKind::Any);
                assert_eq!(bound, vec!["n".to_string()]);
                assert!(source.is_some());
                assert!(predicate.is_some());
            }
            other => panic!("expected quantifier, got {other:?}"),
        }
    }

    #[test]
    fn converts_position_to_zero_based_with_default_length() {
        let node = SyntaxNode::from_value(&json!({
            "type": "variable",
            "variable": "x",
            "node": {"line": 3, "column": 7},
        }));
        match node {
            SyntaxNode::Variable { pos, .. } => {
                assert_eq!(
                    pos,
                    Some(SourcePos {
                        line: 2,
                        column: 6,
                        length: 1
                    })
                );
            }
            other => panic!("expected variable, got {other:?}"),
        }
    }

    #[test]
    fn accepts_inline_position_fields() {
        let node = SyntaxNode::from_value(&json!({
            "type": "variable",
            "variable": "x",
            "line": 1,
            "column": 2,
            "length": 4,
        }));
        match node {
            SyntaxNode::Variable { pos, .. } => {
                assert_eq!(
                    pos,
                    Some(SourcePos {
                        line: 0,
                        column: 1,
                        length: 4
                    })
                );
            }
            other => panic!("expected variable, got {other:?}"),
        }
    }

    #[test]
    fn rejects_out_of_range_positions() {
        let node = SyntaxNode::from_value(&json!({
            "type": "variable",
            "variable": "x",
            "node": {"line": 0, "column": 0},
        }));
        match node {
            SyntaxNode::Variable { pos, .. } => assert_eq!(pos, None),
            other => panic!("expected variable, got {other:?}"),
        }
    }

    #[test]
    fn tagless_objects_become_opaque() {
        let node = SyntaxNode::from_value(&json!({
            "expression": "set",
            "set": [{"type": "variable", "variable": "a"}],
        }));
        match node {
            SyntaxNode::Opaque { children, .. } => assert_eq!(children.len(), 2),
            other => panic!("expected opaque, got {other:?}"),
        }
    }

    #[test]
    fn unknown_tags_keep_slot_children() {
        let node = SyntaxNode::from_value(&json!({
            "type": "if-then-else",
            "cond": {"type": "variable", "variable": "c"},
            "then": {"type": "variable", "variable": "t"},
            "else": {"type": "variable", "variable": "e"},
            "irrelevant": "ignored",
        }));
        match node {
            SyntaxNode::Tagged { tag, children, .. } => {
                assert_eq!(tag, "if-then-else");
                assert_eq!(children.len(), 3);
            }
            other => panic!("expected tagged, got {other:?}"),
        }
    }

    #[test]
    fn scalars_and_arrays_decode_without_error() {
        assert!(matches!(SyntaxNode::from_value(&json!(42)), SyntaxNode::Leaf));
        assert!(matches!(
            SyntaxNode::from_value(&json!(null)),
            SyntaxNode::Leaf
        ));
        assert!(matches!(
            SyntaxNode::from_value(&json!(["a", 1, {}])),
            SyntaxNode::List(items) if items.len() == 3
        ));
    }
}
