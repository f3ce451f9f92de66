//! translate manifest documents into a [Composition]
//!
//! Two block types are recognized at the document root:
//!
//! ```hcl
//! resource "<kind>" "<id>" {
//!   attribute  = "literal or ${resource.other.attr} template"
//!   reference  = resource.other.attr
//!   derived    = select(2, split("-", resource.other.attr))
//!   depends_on = [resource.other]
//! }
//!
//! output "<name>" {
//!   value       = resource.other.attr
//!   description = "optional"
//! }
//! ```
//!
//! `resource.<id>.<attribute>` traversals become [Token::AttributeRef]s,
//! string templates and the `split`/`select`/`join`/`concat` functions become
//! [Derived] tokens, and the reserved `depends_on` attribute becomes explicit
//! dependency edges. Everything else is a literal.
//!
//! Problems are collected as [Issue]s pointing at block indices (see
//! [crate::manifest]); composition fails with the complete list rather than
//! the first finding.
use crate::graph::Composition;
use crate::manifest::ManifestDocuments;
use crate::token::{Derived, Expr, Token};
use crate::value::Value;
use hcl::expr::FuncCall;
use hcl::template::Element;
use hcl::{Expression, ObjectKey, Template, Traversal, TraversalOperator};
use indexmap::IndexMap;

/// Reserved resource attribute holding ordering hints
const DEPENDS_ON: &str = "depends_on";

pub fn compose(documents: &ManifestDocuments) -> Result<Composition, ComposeErrors> {
    let mut errors = ComposeErrors::new();
    let mut composition = Composition::new();
    let mut resource_blocks: std::collections::HashMap<String, usize> = Default::default();

    for (index, _source, _attribute) in documents.attributes() {
        errors.log(Issue::RootAttribute(index));
    }

    for (index, _source, block) in documents.blocks() {
        match block.ident.value().as_str() {
            "resource" => {
                if block.labels.len() != 2 {
                    errors.log(Issue::ResourceLabels(index));
                    continue;
                }

                let kind = block.labels[0].as_str().to_string();
                let id = hcl::Identifier::sanitized(block.labels[1].as_str()).to_string();

                if let Some(existing) = resource_blocks.get(&id) {
                    errors.log(Issue::DuplicateResourceId {
                        existing: *existing,
                        new: index,
                    });
                    continue;
                }
                resource_blocks.insert(id.clone(), index);

                for _nested in block.body.blocks() {
                    errors.log(Issue::NestedBlock(index));
                }

                let mut attributes = IndexMap::new();
                let mut dependencies = vec![];
                for attribute in block.body.attributes() {
                    let name = attribute.key.value().as_str().to_string();
                    let expression: Expression = attribute.value.clone().into();

                    if name == DEPENDS_ON {
                        match translate_depends_on(&expression) {
                            Ok(ids) => dependencies = ids,
                            Err(reason) => errors.log(Issue::BadDependsOn {
                                block: index,
                                reason,
                            }),
                        }
                        continue;
                    }

                    match translate_expression(&expression) {
                        Ok(expr) => {
                            attributes.insert(name, expr);
                        }
                        Err(reason) => errors.log(Issue::BadExpression {
                            block: index,
                            attribute: name,
                            reason,
                        }),
                    }
                }

                tracing::trace!(%id, %kind, "add resource");
                assert!(
                    composition.add_node(&id, kind, attributes).is_ok(),
                    "resource id collision slipped past the block check: {id:?}",
                );
                for dependency in dependencies {
                    assert!(
                        composition.add_explicit_dependency(&id, &dependency).is_ok(),
                        "dependency source {id:?} must exist",
                    );
                }
            }
            "output" => {
                if block.labels.len() != 1 {
                    errors.log(Issue::OutputLabels(index));
                    continue;
                }

                let name = hcl::Identifier::sanitized(block.labels[0].as_str()).to_string();
                let mut value = None;
                let mut description = None;

                for attribute in block.body.attributes() {
                    let attribute_name = attribute.key.value().as_str();
                    let expression: Expression = attribute.value.clone().into();

                    match attribute_name {
                        "value" => match translate_expression(&expression) {
                            Ok(expr) => value = Some(expr),
                            Err(reason) => errors.log(Issue::BadExpression {
                                block: index,
                                attribute: "value".to_string(),
                                reason,
                            }),
                        },
                        "description" => match expression {
                            Expression::String(text) => description = Some(text),
                            _ => errors.log(Issue::BadExpression {
                                block: index,
                                attribute: "description".to_string(),
                                reason: "description must be a literal string".to_string(),
                            }),
                        },
                        other => errors.log(Issue::BadExpression {
                            block: index,
                            attribute: other.to_string(),
                            reason: "unsupported output attribute".to_string(),
                        }),
                    }
                }

                match value {
                    Some(expr) => composition.add_output(name, expr, description),
                    None => errors.log(Issue::MissingOutputValue(index)),
                }
            }
            _ => errors.log(Issue::UnknownBlockType(index)),
        }
    }

    if !errors.issues.is_empty() {
        return Err(errors);
    }

    Ok(composition)
}

fn translate_expression(expression: &Expression) -> Result<Expr, String> {
    match expression {
        Expression::Bool(value) => Ok(Expr::Value(Value::Boolean(*value))),
        Expression::Number(number) => Ok(Expr::Value(Value::from(number.clone()))),
        Expression::String(text) => Ok(Expr::Value(Value::String(text.clone()))),
        Expression::Array(elements) => elements
            .iter()
            .map(translate_expression)
            .collect::<Result<Vec<_>, _>>()
            .map(Expr::Array),
        Expression::Object(object) => {
            let mut entries = IndexMap::new();
            for (key, value) in object {
                entries.insert(object_key(key)?, translate_expression(value)?);
            }
            Ok(Expr::Object(entries))
        }
        Expression::Traversal(traversal) => translate_reference(traversal).map(Expr::Token),
        Expression::Variable(variable) => Err(format!(
            "bare variable {:?}; references take the form resource.<id>.<attribute>",
            variable.as_str()
        )),
        Expression::TemplateExpr(template) => translate_template(template),
        Expression::FuncCall(call) => translate_func_call(call),
        Expression::Parenthesis(inner) => translate_expression(inner),
        Expression::Null => Err("null is not a value".to_string()),
        _ => Err("unsupported expression".to_string()),
    }
}

fn object_key(key: &ObjectKey) -> Result<String, String> {
    match key {
        ObjectKey::Identifier(identifier) => Ok(identifier.as_str().to_string()),
        ObjectKey::Expression(Expression::String(text)) => Ok(text.clone()),
        _ => Err("object keys must be identifiers or strings".to_string()),
    }
}

fn translate_reference(traversal: &Traversal) -> Result<Token, String> {
    let path = reference_path(traversal)?;

    match path.len() {
        2 => {
            let mut path = path;
            let attribute = path.pop().expect("length checked");
            let node = path.pop().expect("length checked");
            Ok(Token::AttributeRef { node, attribute })
        }
        1 => Err("reference is missing an attribute (resource.<id>.<attribute>)".to_string()),
        _ => Err("references reach exactly one attribute deep".to_string()),
    }
}

/// The `<id>[.<attribute>...]` path of a `resource.`-rooted traversal
fn reference_path(traversal: &Traversal) -> Result<Vec<String>, String> {
    let Expression::Variable(root) = &traversal.expr else {
        return Err("references must start with resource.".to_string());
    };

    if root.as_str() != "resource" {
        return Err(format!(
            "unknown reference root {:?}; references take the form resource.<id>.<attribute>",
            root.as_str()
        ));
    }

    let mut path = vec![];
    for operator in &traversal.operators {
        let TraversalOperator::GetAttr(identifier) = operator else {
            return Err("only attribute access is supported in references".to_string());
        };
        path.push(identifier.as_str().to_string());
    }

    if path.is_empty() {
        return Err("reference names no resource".to_string());
    }

    Ok(path)
}

fn translate_depends_on(expression: &Expression) -> Result<Vec<String>, String> {
    let Expression::Array(elements) = expression else {
        return Err("depends_on must be an array of resource references".to_string());
    };

    let mut ids = vec![];
    for element in elements {
        let Expression::Traversal(traversal) = element else {
            return Err("depends_on entries take the form resource.<id>".to_string());
        };

        let mut path = reference_path(traversal)?;
        if path.len() != 1 {
            return Err("depends_on entries take the form resource.<id>".to_string());
        }
        ids.push(path.pop().expect("length checked"));
    }

    Ok(ids)
}

fn translate_template(template: &hcl::TemplateExpr) -> Result<Expr, String> {
    let template = Template::from_expr(template).map_err(|error| format!("invalid template: {error}"))?;

    let mut parts: Vec<Expr> = vec![];
    for element in template.elements() {
        match element {
            Element::Literal(text) => {
                if !text.is_empty() {
                    parts.push(Expr::Value(Value::String(text.clone())));
                }
            }
            Element::Interpolation(interpolation) => {
                parts.push(translate_expression(&interpolation.expr)?);
            }
            Element::Directive(_) => {
                return Err("template directives are not supported".to_string());
            }
        }
    }

    match parts.len() {
        0 => Ok(Expr::Value(Value::String(String::new()))),
        1 => Ok(parts.remove(0)),
        _ => Ok(Expr::Token(Token::Derived(Derived::Concat(parts)))),
    }
}

fn translate_func_call(call: &FuncCall) -> Result<Expr, String> {
    let name = call.name.to_string();
    match name.as_str() {
        "split" => {
            expect_args(&call.args, 2, "split(separator, string)")?;
            let separator = literal_string(&call.args[0], "split separator")?;
            let input = translate_expression(&call.args[1])?;
            Ok(Expr::Token(Token::Derived(Derived::Split {
                input: Box::new(input),
                separator,
            })))
        }
        "select" => {
            expect_args(&call.args, 2, "select(index, array)")?;
            let index = literal_index(&call.args[0])?;
            let input = translate_expression(&call.args[1])?;
            Ok(Expr::Token(Token::Derived(Derived::Select {
                input: Box::new(input),
                index,
            })))
        }
        "join" => {
            expect_args(&call.args, 2, "join(separator, array)")?;
            let separator = literal_string(&call.args[0], "join separator")?;
            let list = translate_expression(&call.args[1])?;
            Ok(Expr::Token(Token::Derived(Derived::Join {
                list: Box::new(list),
                separator,
            })))
        }
        "concat" => {
            if call.args.is_empty() {
                return Err("concat needs at least one argument".to_string());
            }
            let parts = call
                .args
                .iter()
                .map(translate_expression)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::Token(Token::Derived(Derived::Concat(parts))))
        }
        other => Err(format!(
            "unknown function {other:?}; supported: split, select, join, concat"
        )),
    }
}

fn expect_args(args: &[Expression], count: usize, usage: &str) -> Result<(), String> {
    if args.len() != count {
        return Err(format!(
            "{usage} takes {count} arguments, found {}",
            args.len()
        ));
    }
    Ok(())
}

fn literal_string(expression: &Expression, what: &str) -> Result<String, String> {
    match expression {
        Expression::String(text) => Ok(text.clone()),
        _ => Err(format!("{what} must be a literal string")),
    }
}

fn literal_index(expression: &Expression) -> Result<usize, String> {
    let Expression::Number(number) = expression else {
        return Err("select index must be a literal non-negative integer".to_string());
    };

    number
        .as_u64()
        .map(|index| index as usize)
        .ok_or_else(|| "select index must be a literal non-negative integer".to_string())
}

#[derive(derive_new::new, Debug)]
pub struct ComposeErrors {
    #[new(default)]
    issues: Vec<Issue>,
}

impl ComposeErrors {
    pub fn log(&mut self, issue: Issue) {
        tracing::trace!(?issue, "issue found");
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }
}

impl std::error::Error for ComposeErrors {}

impl std::fmt::Display for ComposeErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (position, issue) in self.issues.iter().enumerate() {
            if position > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue:?}")?;
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
pub enum Issue {
    RootAttribute(usize),
    UnknownBlockType(usize),
    ResourceLabels(usize),
    OutputLabels(usize),
    DuplicateResourceId { existing: usize, new: usize },
    NestedBlock(usize),
    BadExpression {
        block: usize,
        attribute: String,
        reason: String,
    },
    BadDependsOn { block: usize, reason: String },
    MissingOutputValue(usize),
}
