//! resource graph and builder
//!
//! A [Composition] accumulates resource declarations during the build phase.
//! Attribute expressions are scanned for [crate::token::Token::AttributeRef]s
//! as they are registered, so by the time [Composition::validate] runs, every
//! dependency edge - implicit or explicit - is known.
//!
//! The graph is mutable only while building. Scheduling and resolution take
//! `&Composition`, so no late edge insertion can happen once an order has
//! been computed.
use crate::emit::{self, Artifact};
use crate::registry::{AnyKind, KindRegistry};
use crate::resolve;
use crate::schedule;
use crate::token::Expr;
use indexmap::IndexMap;

/// A declared unit of infrastructure
#[derive(Debug)]
pub struct ResourceNode {
    id: String,
    kind: String,
    attributes: IndexMap<String, Expr>,
    explicit_dependencies: Vec<String>,
}

impl ResourceNode {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Opaque tag naming the external resource type
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn attributes(&self) -> &IndexMap<String, Expr> {
        &self.attributes
    }

    /// Ordering hints declared independently of attribute references
    pub fn explicit_dependencies(&self) -> &[String] {
        &self.explicit_dependencies
    }

    /// Ids this node depends on: attribute references in declaration order,
    /// then explicit dependencies, first occurrence wins
    pub fn dependencies(&self) -> Vec<&str> {
        let mut references = vec![];
        for expr in self.attributes.values() {
            expr.collect_references(&mut references);
        }
        for dependency in &self.explicit_dependencies {
            references.push(dependency);
        }

        let mut seen = std::collections::HashSet::new();
        references.retain(|id| seen.insert(*id));
        references
    }
}

/// A named, described value exposed by the emitted artifact
#[derive(Debug)]
pub struct Output {
    pub name: String,
    pub value: Expr,
    pub description: Option<String>,
}

/// All declared resources and outputs of one synthesis run
#[derive(Debug, Default)]
pub struct Composition {
    nodes: IndexMap<String, ResourceNode>,
    outputs: Vec<Output>,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource
    ///
    /// Ids are stable identity; redeclaring one is an error.
    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        kind: impl Into<String>,
        attributes: IndexMap<String, Expr>,
    ) -> Result<(), SynthError> {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            return Err(SynthError::DuplicateId { id });
        }

        tracing::trace!(%id, "add node");
        self.nodes.insert(
            id.clone(),
            ResourceNode {
                id,
                kind: kind.into(),
                attributes,
                explicit_dependencies: vec![],
            },
        );
        Ok(())
    }

    /// Declare a resource scoped under a parent
    ///
    /// Containment is a namespaced id (`parent.name`) plus an ordinary
    /// dependency edge on the parent - there is no construct tree.
    ///
    /// Returns the child's id.
    pub fn add_child_node(
        &mut self,
        parent: &str,
        name: &str,
        kind: impl Into<String>,
        attributes: IndexMap<String, Expr>,
    ) -> Result<String, SynthError> {
        if !self.nodes.contains_key(parent) {
            return Err(SynthError::NoSuchNode {
                id: parent.to_string(),
            });
        }

        let id = format!("{parent}.{name}");
        self.add_node(id.clone(), kind, attributes)?;
        self.add_explicit_dependency(&id, parent)?;
        Ok(id)
    }

    /// Add an attribute to an already-declared resource
    pub fn add_attribute(
        &mut self,
        id: &str,
        name: impl Into<String>,
        expr: Expr,
    ) -> Result<(), SynthError> {
        let node = self.nodes.get_mut(id).ok_or_else(|| SynthError::NoSuchNode {
            id: id.to_string(),
        })?;

        node.attributes.insert(name.into(), expr);
        Ok(())
    }

    /// Record that `from` must not resolve before `to`
    ///
    /// `to` may be declared later; [Composition::validate] checks that it
    /// eventually is.
    pub fn add_explicit_dependency(&mut self, from: &str, to: &str) -> Result<(), SynthError> {
        let node = self
            .nodes
            .get_mut(from)
            .ok_or_else(|| SynthError::NoSuchNode {
                id: from.to_string(),
            })?;

        let to = to.to_string();
        if !node.explicit_dependencies.contains(&to) {
            node.explicit_dependencies.push(to);
        }
        Ok(())
    }

    /// Expose a resolved value in the artifact
    ///
    /// Name collisions are detected at emission, not here.
    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        value: Expr,
        description: Option<String>,
    ) {
        self.outputs.push(Output {
            name: name.into(),
            value,
            description,
        });
    }

    pub fn node(&self, id: &str) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    /// Nodes in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Check reference integrity
    ///
    /// Every attribute reference, explicit dependency, and output reference
    /// must name a declared resource. Runs before scheduling so neither cycle
    /// detection nor resolution has to special-case absent nodes.
    pub fn validate(&self) -> Result<(), SynthError> {
        for node in self.nodes.values() {
            for referenced in node.dependencies() {
                if !self.nodes.contains_key(referenced) {
                    return Err(SynthError::UnresolvedReference {
                        node: node.id.clone(),
                        missing: referenced.to_string(),
                    });
                }
            }
        }

        for output in &self.outputs {
            let mut references = vec![];
            output.value.collect_references(&mut references);
            for referenced in references {
                if !self.nodes.contains_key(referenced) {
                    return Err(SynthError::UnresolvedReference {
                        node: format!("output {:?}", output.name),
                        missing: referenced.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Run the full pipeline: validate, schedule, resolve, emit
    pub fn synthesize(&self) -> Result<Artifact, SynthError> {
        self.synthesize_with(&AnyKind)
    }

    /// [Composition::synthesize] with resource kinds checked against a registry
    pub fn synthesize_with(&self, registry: &dyn KindRegistry) -> Result<Artifact, SynthError> {
        for node in self.nodes.values() {
            if !registry.recognizes(&node.kind) {
                return Err(SynthError::UnknownKind {
                    node: node.id.clone(),
                    kind: node.kind.clone(),
                });
            }
        }

        self.validate()?;
        let order = schedule::schedule(self)?;
        let resolved = resolve::resolve(&order, self)?;
        emit::emit(&order, resolved, self)
    }
}

/// Terminal synthesis errors
///
/// All fatal: the first error halts synthesis and no partial artifact is
/// returned.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SynthError {
    #[error("duplicate resource id {id:?}")]
    DuplicateId { id: String },

    #[error("{node} references undeclared resource {missing:?}")]
    UnresolvedReference { node: String, missing: String },

    #[error("cyclic dependency: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("failed to evaluate {node}.{attribute}: {reason}")]
    TokenEvaluationError {
        node: String,
        attribute: String,
        reason: String,
    },

    #[error("duplicate output name {name:?}")]
    DuplicateOutputName { name: String },

    #[error("resource {node} has unrecognized kind {kind:?}")]
    UnknownKind { node: String, kind: String },

    #[error("no resource with id {id:?}")]
    NoSuchNode { id: String },
}
