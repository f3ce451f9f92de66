//! resource kind registry seam
//!
//! Resource kinds are opaque to the engine; what counts as a valid kind is
//! the deployment target's business. The registry is the seam where a caller
//! plugs that knowledge in - [crate::graph::Composition::synthesize_with]
//! turns an unrecognized kind into a typed error instead of deploying a
//! resource nothing can provision.

/// Supplies knowledge of valid resource kinds
pub trait KindRegistry {
    fn recognizes(&self, kind: &str) -> bool;
}

/// Accepts every kind; the default when no registry is supplied
#[derive(Debug, Default)]
pub struct AnyKind;

impl KindRegistry for AnyKind {
    fn recognizes(&self, _kind: &str) -> bool {
        true
    }
}

/// A fixed set of recognized kinds
#[derive(Debug)]
pub struct KnownKinds {
    kinds: std::collections::HashSet<String>,
}

impl KnownKinds {
    pub fn new<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kinds: kinds.into_iter().map(Into::into).collect(),
        }
    }
}

impl KindRegistry for KnownKinds {
    fn recognizes(&self, kind: &str) -> bool {
        self.kinds.contains(kind)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::{Composition, SynthError};

    #[test]
    fn unknown_kind_is_a_typed_error() {
        let mut composition = Composition::new();
        composition
            .add_node("bucket", "s3_bucket", Default::default())
            .unwrap();
        composition
            .add_node("mystery", "quantum_bucket", Default::default())
            .unwrap();

        let registry = KnownKinds::new(["s3_bucket", "iam_role"]);
        let err = composition.synthesize_with(&registry).unwrap_err();
        assert_eq!(
            err,
            SynthError::UnknownKind {
                node: "mystery".to_string(),
                kind: "quantum_bucket".to_string()
            }
        );
    }

    #[test]
    fn any_kind_accepts_everything() {
        assert!(AnyKind.recognizes("anything_at_all"));
    }
}
