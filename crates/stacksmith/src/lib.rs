//! # stacksmith - dependency-ordered stack synthesis
//!
//! Turns a set of resource declarations with cross-references into a
//! deployable, dependency-ordered template.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `stacksmith` works internally.
//!
//! ### The problem
//!
//! A stack declares resources whose concrete values (ARNs, endpoints,
//! generated names) do not exist until deployment. Declarations still need
//! to reference them: a function needs "this role's ARN", a delivery stream
//! needs "this bucket's ARN". Synthesis has to
//! - work out which resource must be provisioned before which,
//! - refuse impossible (cyclic) declarations with a usable diagnosis,
//! - substitute everything that *is* known at synthesis time,
//! - and emit placeholders for everything that is not.
//!
//! ### Loading manifests
//!
//! A manifest is plain HCL. [manifest::ManifestDocuments] stores the root
//! blocks of all loaded documents and tracks their original source path, so
//! error messages can point at them. Each block gets a stable numeric index.
//! At this point the documents only have to be valid HCL to be accepted.
//!
//! ```hcl
//! resource "iam_role" "role" {
//!   arn = "arn:demo:role/app"
//! }
//!
//! resource "lambda_function" "function" {
//!   role_arn   = resource.role.arn
//!   depends_on = [resource.bucket]
//! }
//!
//! resource "s3_bucket" "bucket" {}
//!
//! output "bucket_name" {
//!   value       = resource.bucket.name
//!   description = "Bucket to upload to"
//! }
//! ```
//!
//! ### Composing
//!
//! see [compose::compose]
//!
//! `resource` and `output` blocks are translated into a [graph::Composition]
//! - a flat graph of nodes keyed by id, no construct tree. Attribute
//! expressions become [token::Expr] values: literals stay literal,
//! `resource.<id>.<attribute>` traversals become
//! [token::Token::AttributeRef], templates and
//! `split`/`select`/`join`/`concat` calls become checked
//! [token::Derived] operations. Every reference found while registering
//! attributes is an implicit dependency edge; `depends_on` adds explicit
//! ones.
//!
//! The same graph can be built programmatically through
//! [graph::Composition]'s builder methods - the manifest surface is sugar
//! over it.
//!
//! ### Synthesis
//!
//! see [graph::Composition::synthesize]
//!
//! Four passes, each pure, over the now-frozen graph:
//!
//! 1. [graph::Composition::validate] - every reference names a declared
//!    resource ([graph::SynthError::UnresolvedReference] otherwise).
//! 2. [schedule::schedule] - cycle detection with a full-loop diagnosis,
//!    then a deterministic topological order (ties break by declaration
//!    order, so re-synthesizing identical input is byte-identical - emitted
//!    artifacts get diffed between deployments).
//! 3. [resolve::resolve] - nodes are resolved strictly in order; derived
//!    operations are checked and fail synthesis rather than producing a
//!    wrong but valid-looking value.
//! 4. [emit::emit] - the ordered, resolved graph plus named outputs becomes
//!    the serializable [emit::Artifact].
//!
//! Synthesis returns the artifact or the first terminal error - never a
//! partial artifact.
pub mod compose;
pub mod emit;
pub mod graph;
pub mod manifest;
pub mod registry;
pub mod resolve;
pub mod schedule;
pub mod token;
pub mod value;
