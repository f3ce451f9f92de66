//! token resolution
//!
//! Processes nodes strictly in scheduled order. By the time a node is
//! reached, everything it references has resolved values, so evaluation is a
//! single substitution pass - no fixpoint iteration, no retries.
//!
//! A reference to an attribute the referenced node never declares is not an
//! error: it names a value that only exists once the resource is actually
//! provisioned (an ARN, an endpoint), and resolves to the placeholder string
//! `${node.attribute}` for the apply-time executor. A derived operation over
//! such a placeholder *is* an error - there is no way to check a split or
//! select over a value synthesis never sees, and unchecked evaluation is
//! exactly what this engine refuses to do.
use crate::graph::{Composition, SynthError};
use crate::token::{Derived, Expr, Token};
use crate::value::Value;
use indexmap::IndexMap;

/// Resolved attribute values of a single resource
pub type ResolvedAttributes = IndexMap<String, Value>;

/// Result of evaluating one expression
enum Evaluated {
    /// Known at synthesis time
    Known(Value),
    /// Only known at apply time; carries the reference for the placeholder
    Deferred { node: String, attribute: String },
}

impl Evaluated {
    fn into_value(self) -> Value {
        match self {
            Evaluated::Known(value) => value,
            Evaluated::Deferred { node, attribute } => {
                Value::String(format!("${{{node}.{attribute}}}"))
            }
        }
    }
}

/// Resolve every node's attributes, in scheduled order
pub fn resolve(
    order: &[String],
    composition: &Composition,
) -> Result<IndexMap<String, ResolvedAttributes>, SynthError> {
    let mut resolved: IndexMap<String, ResolvedAttributes> = IndexMap::new();

    for id in order {
        let node = composition.node(id).ok_or_else(|| SynthError::NoSuchNode {
            id: id.to_string(),
        })?;

        let mut attributes = ResolvedAttributes::new();
        for (name, expr) in node.attributes() {
            let value = evaluate(expr, &resolved, id, name)?.into_value();
            attributes.insert(name.clone(), value);
        }

        tracing::trace!(%id, "resolved");
        resolved.insert(id.clone(), attributes);
    }

    Ok(resolved)
}

/// Evaluate one expression against already-resolved upstream values
///
/// `node` and `attribute` label the evaluation site for error reporting.
pub(crate) fn evaluate_value(
    expr: &Expr,
    resolved: &IndexMap<String, ResolvedAttributes>,
    node: &str,
    attribute: &str,
) -> Result<Value, SynthError> {
    evaluate(expr, resolved, node, attribute).map(Evaluated::into_value)
}

fn evaluate(
    expr: &Expr,
    resolved: &IndexMap<String, ResolvedAttributes>,
    node: &str,
    attribute: &str,
) -> Result<Evaluated, SynthError> {
    let error = |reason: String| SynthError::TokenEvaluationError {
        node: node.to_string(),
        attribute: attribute.to_string(),
        reason,
    };

    match expr {
        Expr::Value(value) => Ok(Evaluated::Known(value.clone())),
        Expr::Array(elements) => {
            let mut values = Vec::with_capacity(elements.len());
            for element in elements {
                values.push(evaluate(element, resolved, node, attribute)?.into_value());
            }
            Ok(Evaluated::Known(Value::Array(values)))
        }
        Expr::Object(entries) => {
            let mut values = IndexMap::new();
            for (key, value) in entries {
                values.insert(
                    key.clone(),
                    evaluate(value, resolved, node, attribute)?.into_value(),
                );
            }
            Ok(Evaluated::Known(Value::Object(values)))
        }
        Expr::Token(Token::AttributeRef {
            node: referenced,
            attribute: referenced_attribute,
        }) => {
            let upstream = resolved.get(referenced).ok_or_else(|| {
                // scheduling guarantees the referenced node precedes this one
                error(format!("resource {referenced:?} is not resolved yet"))
            })?;

            match upstream.get(referenced_attribute) {
                Some(value) => Ok(Evaluated::Known(value.clone())),
                None => Ok(Evaluated::Deferred {
                    node: referenced.clone(),
                    attribute: referenced_attribute.clone(),
                }),
            }
        }
        Expr::Token(Token::Derived(derived)) => {
            let value = match derived {
                Derived::Split { input, separator } => {
                    let input = string_operand(
                        evaluate(input, resolved, node, attribute)?,
                        "split",
                    )
                    .map_err(error)?;

                    Value::Array(
                        input
                            .split(separator.as_str())
                            .map(|part| Value::String(part.to_string()))
                            .collect(),
                    )
                }
                Derived::Select { input, index } => {
                    let list = array_operand(
                        evaluate(input, resolved, node, attribute)?,
                        "select",
                    )
                    .map_err(error)?;

                    if *index >= list.len() {
                        return Err(error(format!(
                            "select index {index} out of bounds for {} elements",
                            list.len()
                        )));
                    }
                    list[*index].clone()
                }
                Derived::Join { list, separator } => {
                    let list = array_operand(
                        evaluate(list, resolved, node, attribute)?,
                        "join",
                    )
                    .map_err(error)?;

                    let mut parts = Vec::with_capacity(list.len());
                    for element in &list {
                        let Value::String(part) = element else {
                            return Err(error(format!(
                                "join expects an array of strings, found {} element",
                                element.type_name()
                            )));
                        };
                        parts.push(part.as_str());
                    }
                    Value::String(parts.join(separator))
                }
                Derived::Concat(operands) => {
                    let mut joined = String::new();
                    for operand in operands {
                        let part = string_operand(
                            evaluate(operand, resolved, node, attribute)?,
                            "concat",
                        )
                        .map_err(error)?;
                        joined.push_str(&part);
                    }
                    Value::String(joined)
                }
            };

            Ok(Evaluated::Known(value))
        }
    }
}

fn string_operand(evaluated: Evaluated, operation: &str) -> Result<String, String> {
    match evaluated {
        Evaluated::Known(Value::String(value)) => Ok(value),
        Evaluated::Known(other) => Err(format!(
            "{operation} expects a string operand, found {}",
            other.type_name()
        )),
        Evaluated::Deferred { node, attribute } => Err(format!(
            "{operation} operand {node}.{attribute} is not known until deploy time"
        )),
    }
}

fn array_operand(evaluated: Evaluated, operation: &str) -> Result<Vec<Value>, String> {
    match evaluated {
        Evaluated::Known(Value::Array(value)) => Ok(value),
        Evaluated::Known(other) => Err(format!(
            "{operation} expects an array operand, found {}",
            other.type_name()
        )),
        Evaluated::Deferred { node, attribute } => Err(format!(
            "{operation} operand {node}.{attribute} is not known until deploy time"
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schedule;
    use crate::token::Token;
    use pretty_assertions::assert_eq;

    fn resolve_single(attribute: Expr) -> Result<Value, SynthError> {
        let mut composition = Composition::new();
        composition
            .add_node("node", "kind", Default::default())
            .unwrap();
        composition.add_attribute("node", "out", attribute).unwrap();

        let order = schedule::schedule(&composition)?;
        let resolved = resolve(&order, &composition)?;
        Ok(resolved["node"]["out"].clone())
    }

    #[test]
    fn split_then_select() {
        // the deploy-id derivation pattern: take one segment of a path-ish id
        let value = resolve_single(
            Token::select(Expr::Token(Token::split("prefix-123-abc", "-")), 2).into(),
        )
        .unwrap();

        assert_eq!(value, Value::String("abc".to_string()));
    }

    #[test]
    fn select_out_of_bounds_fails() {
        let err = resolve_single(
            Token::select(Expr::Token(Token::split("prefix-123-abc", "-")), 5).into(),
        )
        .unwrap_err();

        let SynthError::TokenEvaluationError {
            node,
            attribute,
            reason,
        } = err
        else {
            panic!("expected evaluation error");
        };
        assert_eq!(node, "node");
        assert_eq!(attribute, "out");
        assert_eq!(reason, "select index 5 out of bounds for 3 elements");
    }

    #[test]
    fn split_rejects_non_string_input() {
        let err = resolve_single(Expr::Token(Token::split(Expr::Value(42.into()), "-")))
            .unwrap_err();

        assert!(matches!(
            err,
            SynthError::TokenEvaluationError { reason, .. }
                if reason == "split expects a string operand, found integer"
        ));
    }

    #[test]
    fn join_and_concat() {
        let joined = resolve_single(
            Token::join(
                Expr::Array(vec!["a".into(), "b".into(), "c".into()]),
                ".",
            )
            .into(),
        )
        .unwrap();
        assert_eq!(joined, Value::String("a.b.c".to_string()));

        let concatenated = resolve_single(
            Token::concat(vec!["survey".into(), "-".into(), "prod".into()]).into(),
        )
        .unwrap();
        assert_eq!(concatenated, Value::String("survey-prod".to_string()));
    }

    #[test]
    fn declared_attribute_reference_substitutes_the_value() {
        let mut composition = Composition::new();
        composition
            .add_node("role", "iam_role", Default::default())
            .unwrap();
        composition
            .add_attribute("role", "arn", Expr::Value("arn:demo".into()))
            .unwrap();
        composition
            .add_node("function", "lambda_function", Default::default())
            .unwrap();
        composition
            .add_attribute("function", "role_arn", Token::attribute_ref("role", "arn").into())
            .unwrap();

        let order = schedule::schedule(&composition).unwrap();
        let resolved = resolve(&order, &composition).unwrap();
        assert_eq!(
            resolved["function"]["role_arn"],
            Value::String("arn:demo".to_string())
        );
    }

    #[test]
    fn undeclared_attribute_reference_becomes_a_placeholder() {
        let mut composition = Composition::new();
        composition
            .add_node("bucket", "s3_bucket", Default::default())
            .unwrap();
        composition
            .add_node("function", "lambda_function", Default::default())
            .unwrap();
        composition
            .add_attribute(
                "function",
                "bucket_arn",
                Token::attribute_ref("bucket", "arn").into(),
            )
            .unwrap();

        let order = schedule::schedule(&composition).unwrap();
        let resolved = resolve(&order, &composition).unwrap();
        assert_eq!(
            resolved["function"]["bucket_arn"],
            Value::String("${bucket.arn}".to_string())
        );
    }

    #[test]
    fn derived_over_placeholder_fails() {
        let mut composition = Composition::new();
        composition
            .add_node("stack", "stack_metadata", Default::default())
            .unwrap();
        composition
            .add_node("pool", "user_pool", Default::default())
            .unwrap();
        composition
            .add_attribute(
                "pool",
                "domain_prefix",
                Token::select(
                    Expr::Token(Token::split(
                        Token::attribute_ref("stack", "deploy_id"),
                        "/",
                    )),
                    2,
                )
                .into(),
            )
            .unwrap();

        let order = schedule::schedule(&composition).unwrap();
        let err = resolve(&order, &composition).unwrap_err();
        assert!(matches!(
            err,
            SynthError::TokenEvaluationError { reason, .. }
                if reason == "split operand stack.deploy_id is not known until deploy time"
        ));
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut composition = Composition::new();
        composition
            .add_node("role", "iam_role", Default::default())
            .unwrap();
        composition
            .add_attribute("role", "arn", Expr::Value("arn:demo".into()))
            .unwrap();
        composition
            .add_node("function", "lambda_function", Default::default())
            .unwrap();
        composition
            .add_attribute("function", "role_arn", Token::attribute_ref("role", "arn").into())
            .unwrap();

        let order = schedule::schedule(&composition).unwrap();
        let first = resolve(&order, &composition).unwrap();
        let second = resolve(&order, &composition).unwrap();
        assert_eq!(first, second);
    }
}
