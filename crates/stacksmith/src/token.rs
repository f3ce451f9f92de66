//! deferred value model
//!
//! An attribute declared on a resource holds an [Expr]: either a literal
//! [Value], a [Token] standing in for a value that only exists once another
//! resource is resolved, or an array/object that may contain tokens at any
//! depth.
//!
//! Tokens are immutable, pure expressions over other tokens and literals.
//! Building one records no ordering information - the transitive set of
//! [Token::AttributeRef] leaves is what ties a resource into the dependency
//! graph (see [crate::graph::Composition]).
use crate::value::Value;

/// An attribute value before resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Fully literal value
    Value(Value),
    /// Deferred until resolution
    Token(Token),
    /// Array with possibly-deferred elements
    Array(Vec<Expr>),
    /// Object with possibly-deferred values
    Object(indexmap::IndexMap<String, Expr>),
}

/// A deferred value
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// The eventual value of another resource's named attribute
    AttributeRef { node: String, attribute: String },
    /// A checked operation over other expressions
    Derived(Derived),
}

/// A checked string operation applied during resolution
///
/// Operand type mismatches and out-of-bounds indexes fail resolution, they
/// never fall back to a placeholder or empty value.
#[derive(Debug, Clone, PartialEq)]
pub enum Derived {
    /// Split a string into an array of strings
    Split { input: Box<Expr>, separator: String },
    /// Pick one element out of an array
    Select { input: Box<Expr>, index: usize },
    /// Join an array of strings with a separator
    Join { list: Box<Expr>, separator: String },
    /// Concatenate strings
    Concat(Vec<Expr>),
}

impl Token {
    pub fn attribute_ref(node: impl Into<String>, attribute: impl Into<String>) -> Self {
        Token::AttributeRef {
            node: node.into(),
            attribute: attribute.into(),
        }
    }

    pub fn split(input: impl Into<Expr>, separator: impl Into<String>) -> Self {
        Token::Derived(Derived::Split {
            input: Box::new(input.into()),
            separator: separator.into(),
        })
    }

    pub fn select(input: impl Into<Expr>, index: usize) -> Self {
        Token::Derived(Derived::Select {
            input: Box::new(input.into()),
            index,
        })
    }

    pub fn join(list: impl Into<Expr>, separator: impl Into<String>) -> Self {
        Token::Derived(Derived::Join {
            list: Box::new(list.into()),
            separator: separator.into(),
        })
    }

    pub fn concat(parts: impl IntoIterator<Item = Expr>) -> Self {
        Token::Derived(Derived::Concat(parts.into_iter().collect()))
    }
}

impl Expr {
    /// Append the ids of all resources this expression refers to
    ///
    /// Transitive: derived tokens contribute the references of their
    /// operands. Ids appear in expression order and may repeat.
    pub fn collect_references<'e>(&'e self, references: &mut Vec<&'e str>) {
        match self {
            Expr::Value(_) => {}
            Expr::Token(Token::AttributeRef { node, .. }) => references.push(node),
            Expr::Token(Token::Derived(derived)) => match derived {
                Derived::Split { input, .. } | Derived::Select { input, .. } => {
                    input.collect_references(references)
                }
                Derived::Join { list, .. } => list.collect_references(references),
                Derived::Concat(parts) => {
                    for part in parts {
                        part.collect_references(references);
                    }
                }
            },
            Expr::Array(elements) => {
                for element in elements {
                    element.collect_references(references);
                }
            }
            Expr::Object(entries) => {
                for value in entries.values() {
                    value.collect_references(references);
                }
            }
        }
    }
}

impl From<Token> for Expr {
    fn from(value: Token) -> Self {
        Expr::Token(value)
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Value(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Value(value.into())
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Value(value.into())
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Value(value.into())
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Value(value.into())
    }
}
