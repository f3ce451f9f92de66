//! End-to-end synthesis scenarios
//!
//! Each test parses an inline manifest, composes it, and runs the full
//! synthesize pipeline.

use pretty_assertions::assert_eq;
use stacksmith::compose::compose;
use stacksmith::emit::Artifact;
use stacksmith::graph::SynthError;
use stacksmith::manifest_documents;
use stacksmith::value::Value;

fn synthesize(manifest: &str) -> Result<Artifact, SynthError> {
    let documents = manifest_documents! { manifest };
    let composition = compose(&documents).expect("manifest must compose");
    composition.synthesize()
}

const ROLE_BUCKET_FUNCTION: &str = r#"
resource "iam_role" "role" {
  arn = "arn:demo:role/app"
}

resource "s3_bucket" "bucket" {
  name = "survey-uploads"
}

resource "lambda_function" "function" {
  role_arn   = resource.role.arn
  depends_on = [resource.bucket]
}
"#;

#[test]
fn dependencies_deploy_first_and_references_substitute() {
    let artifact = synthesize(ROLE_BUCKET_FUNCTION).unwrap();

    let ids: Vec<_> = artifact
        .resources
        .iter()
        .map(|record| record.id.as_str())
        .collect();
    // role and bucket keep their declaration order; function comes last
    assert_eq!(ids, vec!["role", "bucket", "function"]);

    assert_eq!(
        artifact.resources[2].attributes["role_arn"],
        Value::String("arn:demo:role/app".to_string())
    );
}

#[test]
fn synthesis_is_deterministic() {
    let first = serde_json::to_string(&synthesize(ROLE_BUCKET_FUNCTION).unwrap()).unwrap();
    let second = serde_json::to_string(&synthesize(ROLE_BUCKET_FUNCTION).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn synthesizing_the_same_composition_twice_is_idempotent() {
    let documents = manifest_documents! { ROLE_BUCKET_FUNCTION };
    let composition = compose(&documents).unwrap();

    assert_eq!(composition.synthesize().unwrap(), composition.synthesize().unwrap());
}

#[test]
fn out_of_bounds_select_halts_synthesis() {
    let err = synthesize(
        r#"
        resource "user_pool" "pool" {
          suffix = select(5, split("-", "prefix-123-abc"))
        }
        "#,
    )
    .unwrap_err();

    assert_eq!(
        err,
        SynthError::TokenEvaluationError {
            node: "pool".to_string(),
            attribute: "suffix".to_string(),
            reason: "select index 5 out of bounds for 3 elements".to_string(),
        }
    );
}

#[test]
fn cycles_are_reported_with_the_full_loop() {
    let err = synthesize(
        r#"
        resource "kind" "a" { upstream = resource.b.out }
        resource "kind" "b" { upstream = resource.c.out }
        resource "kind" "c" { upstream = resource.a.out }
        "#,
    )
    .unwrap_err();

    let SynthError::CyclicDependency { path } = err else {
        panic!("expected a cycle, got {err:?}");
    };
    assert_eq!(path, vec!["a", "b", "c"]);
}

#[test]
fn undeclared_references_fail_before_any_resolution() {
    let err = synthesize(
        r#"
        resource "lambda_function" "function" {
          role_arn = resource.role.arn
        }
        "#,
    )
    .unwrap_err();

    assert_eq!(
        err,
        SynthError::UnresolvedReference {
            node: "function".to_string(),
            missing: "role".to_string(),
        }
    );
}

#[test]
fn duplicate_output_names_fail() {
    let err = synthesize(
        r#"
        resource "s3_bucket" "bucket" {
          name = "survey-uploads"
        }

        output "bucket_name" { value = resource.bucket.name }
        output "bucket_name" { value = "other" }
        "#,
    )
    .unwrap_err();

    assert_eq!(
        err,
        SynthError::DuplicateOutputName {
            name: "bucket_name".to_string(),
        }
    );
}

#[test]
fn deploy_id_suffix_derivation() {
    // the checked rendition of deriving a unique domain suffix from a
    // deploy-time identifier of the form arn:.../stack-name/uuid
    let artifact = synthesize(
        r#"
        resource "stack_metadata" "stack" {
          deploy_id = "arn:demo:stack/survey/06b321d6-b6e2-47d0-9a71-c1a9a2b3c4d5"
        }

        resource "user_pool" "pool" {
          domain_prefix = concat("surveys-", select(4, split("-", select(2, split("/", resource.stack.deploy_id)))))
        }
        "#,
    )
    .unwrap();

    assert_eq!(
        artifact.resources[1].attributes["domain_prefix"],
        Value::String("surveys-c1a9a2b3c4d5".to_string())
    );
}

#[test]
fn environment_maps_resolve_embedded_references() {
    let artifact = synthesize(
        r#"
        resource "lambda_function" "textract" {
          environment = {
            DYNAMODB_TABLENAME = resource.questions.name
            SURVEY_KEY         = "survey"
            FIREHOSE_STREAM    = resource.firehose.stream_name
          }
        }

        resource "dynamodb_table" "questions" {
          name = "survey-questions"
        }

        resource "delivery_stream" "firehose" {
          stream_name = "survey-firehose"
        }
        "#,
    )
    .unwrap();

    let ids: Vec<_> = artifact
        .resources
        .iter()
        .map(|record| record.id.as_str())
        .collect();
    assert_eq!(ids, vec!["questions", "firehose", "textract"]);

    let Value::Object(environment) = &artifact.resources[2].attributes["environment"] else {
        panic!("environment must resolve to an object");
    };
    assert_eq!(
        environment["DYNAMODB_TABLENAME"],
        Value::String("survey-questions".to_string())
    );
    assert_eq!(
        environment["FIREHOSE_STREAM"],
        Value::String("survey-firehose".to_string())
    );
}

#[test]
fn policy_attachments_order_after_their_subjects() {
    // permission attachment as a first-class resource: references to the
    // role and the policy are ordinary edges
    let artifact = synthesize(
        r#"
        resource "policy_attachment" "textract_access" {
          role       = resource.role.name
          policy_arn = "arn:demo:policy/TextractFullAccess"
        }

        resource "iam_role" "role" {
          name = "survey-textract"
        }
        "#,
    )
    .unwrap();

    let ids: Vec<_> = artifact
        .resources
        .iter()
        .map(|record| record.id.as_str())
        .collect();
    assert_eq!(ids, vec!["role", "textract_access"]);
}

#[test]
fn artifact_serialization() {
    let artifact = synthesize(
        r#"
        resource "s3_bucket" "bucket" {
          name = "survey-uploads"
        }

        resource "lambda_function" "function" {
          bucket_arn = resource.bucket.arn
        }

        output "bucket_name" {
          value       = resource.bucket.name
          description = "Bucket to upload surveys to"
        }
        "#,
    )
    .unwrap();

    let json = serde_json::to_string_pretty(&artifact).unwrap();
    insta::assert_snapshot!(json, @r#"
{
  "resources": [
    {
      "id": "bucket",
      "kind": "s3_bucket",
      "attributes": {
        "name": "survey-uploads"
      }
    },
    {
      "id": "function",
      "kind": "lambda_function",
      "attributes": {
        "bucket_arn": "${bucket.arn}"
      }
    }
  ],
  "outputs": {
    "bucket_name": {
      "value": "survey-uploads",
      "description": "Bucket to upload surveys to"
    }
  }
}
"#);
}

#[test]
fn error_displays_read_well() {
    let cycle = SynthError::CyclicDependency {
        path: vec!["a".to_string(), "b".to_string(), "c".to_string()],
    };
    insta::assert_snapshot!(cycle.to_string(), @"cyclic dependency: a -> b -> c");

    let evaluation = SynthError::TokenEvaluationError {
        node: "pool".to_string(),
        attribute: "suffix".to_string(),
        reason: "select index 5 out of bounds for 3 elements".to_string(),
    };
    insta::assert_snapshot!(
        evaluation.to_string(),
        @"failed to evaluate pool.suffix: select index 5 out of bounds for 3 elements"
    );
}
