//! artifact emission
//!
//! The artifact is the serialized end of synthesis: resources in scheduled
//! order with resolved attributes, plus the named outputs. Downstream
//! executors apply the resource list front to back and need no dependency
//! analysis of their own - the ordering guarantee is part of the format.
use crate::graph::{Composition, SynthError};
use crate::resolve::{self, ResolvedAttributes};
use crate::value::Value;
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::Serializer;

/// Fully resolved synthesis result
///
/// Serializes as
/// `{"resources": [{"id", "kind", "attributes"}, ...], "outputs": {name: {"value", "description"}}}`.
#[derive(Debug, PartialEq)]
pub struct Artifact {
    pub resources: Vec<ResourceRecord>,
    pub outputs: IndexMap<String, OutputRecord>,
}

/// One resource, resolved, in its deployment position
#[derive(Debug, PartialEq)]
pub struct ResourceRecord {
    pub id: String,
    pub kind: String,
    pub attributes: ResolvedAttributes,
}

/// One named output value
#[derive(Debug, PartialEq)]
pub struct OutputRecord {
    pub value: Value,
    pub description: Option<String>,
}

/// Serialize the ordered, resolved graph
///
/// `resolved` is consumed; emission is the last stage and the engine holds
/// no state past it.
pub fn emit(
    order: &[String],
    mut resolved: IndexMap<String, ResolvedAttributes>,
    composition: &Composition,
) -> Result<Artifact, SynthError> {
    let mut outputs = IndexMap::new();
    for output in composition.outputs() {
        if outputs.contains_key(&output.name) {
            return Err(SynthError::DuplicateOutputName {
                name: output.name.clone(),
            });
        }

        let value = resolve::evaluate_value(
            &output.value,
            &resolved,
            &format!("output {:?}", output.name),
            "value",
        )?;

        outputs.insert(
            output.name.clone(),
            OutputRecord {
                value,
                description: output.description.clone(),
            },
        );
    }

    let mut resources = Vec::with_capacity(order.len());
    for id in order {
        let node = composition.node(id).ok_or_else(|| SynthError::NoSuchNode {
            id: id.to_string(),
        })?;
        let attributes = resolved
            .shift_remove(id)
            .ok_or_else(|| SynthError::NoSuchNode { id: id.to_string() })?;

        resources.push(ResourceRecord {
            id: id.clone(),
            kind: node.kind().to_string(),
            attributes,
        });
    }

    tracing::debug!(
        resources = resources.len(),
        outputs = outputs.len(),
        "artifact emitted"
    );
    Ok(Artifact { resources, outputs })
}

impl serde::ser::Serialize for Artifact {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut ser = serializer.serialize_map(Some(2))?;
        ser.serialize_entry("resources", &self.resources)?;
        ser.serialize_entry("outputs", &Outputs(&self.outputs))?;
        ser.end()
    }
}

impl serde::ser::Serialize for ResourceRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut ser = serializer.serialize_map(Some(3))?;
        ser.serialize_entry("id", &self.id)?;
        ser.serialize_entry("kind", &self.kind)?;
        ser.serialize_entry("attributes", &Attributes(&self.attributes))?;
        ser.end()
    }
}

impl serde::ser::Serialize for OutputRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = 1 + usize::from(self.description.is_some());
        let mut ser = serializer.serialize_map(Some(len))?;
        ser.serialize_entry("value", &self.value)?;
        if let Some(description) = &self.description {
            ser.serialize_entry("description", description)?;
        }
        ser.end()
    }
}

struct Attributes<'a>(&'a ResolvedAttributes);

impl serde::ser::Serialize for Attributes<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut ser = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0 {
            ser.serialize_entry(name, value)?;
        }
        ser.end()
    }
}

struct Outputs<'a>(&'a IndexMap<String, OutputRecord>);

impl serde::ser::Serialize for Outputs<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut ser = serializer.serialize_map(Some(self.0.len()))?;
        for (name, record) in self.0 {
            ser.serialize_entry(name, record)?;
        }
        ser.end()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schedule;
    use crate::token::Token;

    #[test]
    fn duplicate_output_names_fail_at_emission() {
        let mut composition = Composition::new();
        composition
            .add_node("bucket", "s3_bucket", Default::default())
            .unwrap();
        composition.add_output(
            "bucket_name",
            Token::attribute_ref("bucket", "name").into(),
            None,
        );
        composition.add_output("bucket_name", "other".into(), None);

        let order = schedule::schedule(&composition).unwrap();
        let resolved = crate::resolve::resolve(&order, &composition).unwrap();
        let err = emit(&order, resolved, &composition).unwrap_err();
        assert_eq!(
            err,
            SynthError::DuplicateOutputName {
                name: "bucket_name".to_string()
            }
        );
    }

    #[test]
    fn resources_appear_in_scheduled_order() {
        let mut composition = Composition::new();
        composition
            .add_node("function", "lambda_function", Default::default())
            .unwrap();
        composition
            .add_node("role", "iam_role", Default::default())
            .unwrap();
        composition
            .add_attribute("function", "role_arn", Token::attribute_ref("role", "arn").into())
            .unwrap();

        let artifact = composition.synthesize().unwrap();
        let ids: Vec<_> = artifact
            .resources
            .iter()
            .map(|record| record.id.as_str())
            .collect();
        assert_eq!(ids, vec!["role", "function"]);
    }
}
