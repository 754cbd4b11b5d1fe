//! Untyped document tree built from rendered chart output.
//!
//! The renderer emits a multi-document YAML stream with no fixed schema.
//! Each document is parsed into a [`Node`] tree that only distinguishes
//! documents, mappings, sequences and scalars. Parsed trees are acyclic.
//!
//! The tree is built from parser events rather than decoded values, so a
//! scalar keeps the exact text it was written with: `1.10` stays `1.10`,
//! `0x1F` stays `0x1F`, and integers of any width are just text.

use std::collections::HashMap;

use secure_import_core::error::{ImportError, Result};
use yaml_rust2::parser::{Event, EventReceiver, Parser};
use yaml_rust2::scanner::TScalarStyle;

/// A node of a parsed configuration document.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// One document of the stream, holding its root node.
    Document(Vec<Node>),
    /// Key/value pairs in source order. Keys are nodes too.
    Mapping(Vec<(Node, Node)>),
    /// Ordered items.
    Sequence(Vec<Node>),
    /// Source text of a scalar. Plain nulls are empty.
    Scalar(String),
}

impl Node {
    /// Scalar text, if this is a scalar.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Node::Scalar(text) => Some(text),
            _ => None,
        }
    }

    /// Direct children in document order (mapping keys precede their values).
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Document(items) | Node::Sequence(items) => items.iter().collect(),
            Node::Mapping(pairs) => pairs.iter().flat_map(|(k, v)| [k, v]).collect(),
            Node::Scalar(_) => Vec::new(),
        }
    }
}

/// A collection still being filled while its events arrive.
enum Frame {
    Document(Vec<Node>),
    Sequence {
        anchor: usize,
        items: Vec<Node>,
    },
    Mapping {
        anchor: usize,
        pairs: Vec<(Node, Node)>,
        key: Option<Node>,
    },
}

/// Assembles [`Node`] trees from the parser's event stream.
#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Frame>,
    documents: Vec<Node>,
    anchors: HashMap<usize, Node>,
}

impl TreeBuilder {
    /// Hand a finished node to the enclosing collection.
    fn attach(&mut self, node: Node, anchor: usize) {
        if anchor > 0 {
            self.anchors.insert(anchor, node.clone());
        }
        match self.stack.last_mut() {
            Some(Frame::Document(items)) | Some(Frame::Sequence { items, .. }) => items.push(node),
            Some(Frame::Mapping { pairs, key, .. }) => match key.take() {
                Some(k) => pairs.push((k, node)),
                None => *key = Some(node),
            },
            None => {}
        }
    }
}

fn is_plain_null(text: &str, style: TScalarStyle) -> bool {
    style == TScalarStyle::Plain && matches!(text, "" | "~" | "null" | "Null" | "NULL")
}

impl EventReceiver for TreeBuilder {
    fn on_event(&mut self, event: Event) {
        match event {
            Event::DocumentStart { .. } => self.stack.push(Frame::Document(Vec::new())),
            Event::DocumentEnd { .. } => {
                if let Some(Frame::Document(items)) = self.stack.pop() {
                    self.documents.push(Node::Document(items));
                }
            }
            Event::SequenceStart(anchor, ..) => self.stack.push(Frame::Sequence {
                anchor,
                items: Vec::new(),
            }),
            Event::SequenceEnd { .. } => {
                if let Some(Frame::Sequence { anchor, items }) = self.stack.pop() {
                    self.attach(Node::Sequence(items), anchor);
                }
            }
            Event::MappingStart(anchor, ..) => self.stack.push(Frame::Mapping {
                anchor,
                pairs: Vec::new(),
                key: None,
            }),
            Event::MappingEnd { .. } => {
                if let Some(Frame::Mapping { anchor, pairs, .. }) = self.stack.pop() {
                    self.attach(Node::Mapping(pairs), anchor);
                }
            }
            Event::Scalar(text, style, anchor, ..) => {
                let text = if is_plain_null(&text, style) {
                    String::new()
                } else {
                    text
                };
                self.attach(Node::Scalar(text), anchor);
            }
            Event::Alias(id) => {
                // Unknown anchors cannot occur in a stream the parser accepted.
                let node = self
                    .anchors
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| Node::Scalar(String::new()));
                self.attach(node, 0);
            }
            _ => {}
        }
    }
}

/// Parse a YAML stream into one [`Node::Document`] per document.
pub fn parse_documents(text: &str) -> Result<Vec<Node>> {
    let mut builder = TreeBuilder::default();
    Parser::new_from_str(text)
        .load(&mut builder, true)
        .map_err(|e| ImportError::DiscoveryError(format!("failed to decode YAML: {}", e)))?;
    Ok(builder.documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(s: &str) -> Node {
        Node::Scalar(s.to_string())
    }

    #[test]
    fn test_parse_single_document() {
        let docs = parse_documents("image:\n  repository: my-repo/app\n  tag: v1\n").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(
            docs[0],
            Node::Document(vec![Node::Mapping(vec![(
                scalar("image"),
                Node::Mapping(vec![
                    (scalar("repository"), scalar("my-repo/app")),
                    (scalar("tag"), scalar("v1")),
                ])
            )])])
        );
    }

    #[test]
    fn test_parse_multiple_documents() {
        let docs = parse_documents("---\na: 1\n---\nb: [x, y]\n").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(
            docs[1],
            Node::Document(vec![Node::Mapping(vec![(
                scalar("b"),
                Node::Sequence(vec![scalar("x"), scalar("y")])
            )])])
        );
    }

    #[test]
    fn test_scalar_forms() {
        let docs = parse_documents("n: 13\nb: true\nz: ~\ns: \"  text  \"\n").unwrap();
        let Node::Document(ref roots) = docs[0] else {
            panic!("expected document");
        };
        let Node::Mapping(ref pairs) = roots[0] else {
            panic!("expected mapping");
        };
        let values: Vec<&str> = pairs.iter().filter_map(|(_, v)| v.as_scalar()).collect();
        assert_eq!(values, vec!["13", "true", "", "  text  "]);
    }

    #[test]
    fn test_tagged_value_is_unwrapped() {
        let docs = parse_documents("image: !custom my-repo/app:v1\n").unwrap();
        let Node::Document(ref roots) = docs[0] else {
            panic!("expected document");
        };
        assert_eq!(
            roots[0],
            Node::Mapping(vec![(scalar("image"), scalar("my-repo/app:v1"))])
        );
    }

    #[test]
    fn test_invalid_yaml_is_discovery_error() {
        let err = parse_documents("image:\n  tag: v1\n  invalid: [\n").unwrap_err();
        assert!(matches!(err, ImportError::DiscoveryError(_)));
    }

    fn mapping_values(docs: &[Node]) -> Vec<&str> {
        let Node::Document(ref roots) = docs[0] else {
            panic!("expected document");
        };
        let Node::Mapping(ref pairs) = roots[0] else {
            panic!("expected mapping");
        };
        pairs.iter().filter_map(|(_, v)| v.as_scalar()).collect()
    }

    #[test]
    fn test_numeric_scalars_keep_source_text() {
        let docs =
            parse_documents("a: 1.10\nb: 0x1F\nc: 20240101123456789012\nd: 1e3\ne: 007\n").unwrap();
        assert_eq!(
            mapping_values(&docs),
            vec!["1.10", "0x1F", "20240101123456789012", "1e3", "007"]
        );
    }

    #[test]
    fn test_quoted_null_words_are_text() {
        let docs = parse_documents("a: \"~\"\nb: 'null'\nc: null\n").unwrap();
        assert_eq!(mapping_values(&docs), vec!["~", "null", ""]);
    }

    #[test]
    fn test_alias_resolves_to_anchored_node() {
        let docs = parse_documents(
            "base: &img\n  repository: my-repo/app\n  tag: v1\ncopy: *img\n",
        )
        .unwrap();
        let Node::Document(ref roots) = docs[0] else {
            panic!("expected document");
        };
        let Node::Mapping(ref pairs) = roots[0] else {
            panic!("expected mapping");
        };
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].1, pairs[1].1);
    }

    #[test]
    fn test_empty_stream_has_no_documents() {
        assert!(parse_documents("").unwrap().is_empty());
    }

    #[test]
    fn test_children_include_keys() {
        let node = Node::Mapping(vec![(scalar("k"), scalar("v"))]);
        assert_eq!(node.children(), vec![&scalar("k"), &scalar("v")]);
        assert!(scalar("x").children().is_empty());
    }
}
