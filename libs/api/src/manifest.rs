//! YAML manifest parsing.
//!
//! Manifests are multi-document YAML streams (documents separated by `---`).
//! Each document is decoded twice: once to read its `kind`, then into the
//! concrete resource type. An empty `apiVersion` defaults to
//! [`API_VERSION`](crate::API_VERSION); an empty `metadata.name` or an
//! unknown `kind` is a validation error.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::types::{AgentPod, AgentPool, DevTask, Object, Project, Resource, TypeMeta};
use crate::API_VERSION;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("reading manifest {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("decoding yaml document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown resource kind: {0:?}")]
    UnknownKind(String),

    #[error("{kind} name must not be empty")]
    MissingName { kind: &'static str },
}

/// Parse a YAML manifest file into typed resources.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<Resource>, ManifestError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| ManifestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_bytes(&data)
}

/// Parse raw YAML bytes into typed resources.
pub fn parse_bytes(data: &[u8]) -> Result<Vec<Resource>, ManifestError> {
    parse_str(&String::from_utf8_lossy(data))
}

/// Parse a YAML string into typed resources.
pub fn parse_str(input: &str) -> Result<Vec<Resource>, ManifestError> {
    let mut resources = Vec::new();

    for document in serde_yaml::Deserializer::from_str(input) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }

        let meta: TypeMeta = serde_yaml::from_value(value.clone())?;
        if meta.kind.is_empty() && meta.api_version.is_empty() {
            continue;
        }

        resources.push(decode_resource(&meta.kind, value)?);
    }

    Ok(resources)
}

fn decode_resource(kind: &str, value: serde_yaml::Value) -> Result<Resource, ManifestError> {
    match kind {
        Project::KIND => {
            let resource: Project = serde_yaml::from_value(value)?;
            Ok(Resource::Project(finalize(resource)?))
        }
        AgentPod::KIND => {
            let resource: AgentPod = serde_yaml::from_value(value)?;
            Ok(Resource::AgentPod(finalize(resource)?))
        }
        AgentPool::KIND => {
            let resource: AgentPool = serde_yaml::from_value(value)?;
            Ok(Resource::AgentPool(finalize(resource)?))
        }
        DevTask::KIND => {
            let resource: DevTask = serde_yaml::from_value(value)?;
            Ok(Resource::DevTask(finalize(resource)?))
        }
        other => Err(ManifestError::UnknownKind(other.to_string())),
    }
}

/// Default the apiVersion and validate required fields.
fn finalize<T: Object>(mut resource: T) -> Result<T, ManifestError> {
    let type_meta = resource.type_meta_mut();
    if type_meta.api_version.is_empty() {
        type_meta.api_version = API_VERSION.to_string();
    }
    type_meta.kind = T::KIND.to_string();

    if resource.metadata().name.is_empty() {
        return Err(ManifestError::MissingName { kind: T::KIND });
    }
    Ok(resource)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTI_DOC: &str = r#"
apiVersion: orca.dev/v1alpha1
kind: Project
metadata:
  name: demo
spec:
  description: "demo project"
---
kind: AgentPool
metadata:
  name: demo-pool
  project: demo
spec:
  replicas: 2
  selector:
    app: demo
  template:
    metadata:
      labels:
        app: demo
    spec:
      model: claude-sonnet
      capabilities:
        - code-generation
      maxConcurrency: 1
      restartPolicy: Always
---
kind: DevTask
metadata:
  name: build-feature
  project: demo
spec:
  prompt: "Implement the feature"
  dependsOn:
    - design-feature
"#;

    #[test]
    fn parses_multi_document_stream() {
        let resources = parse_str(MULTI_DOC).expect("parse");
        assert_eq!(resources.len(), 3);
        assert_eq!(resources[0].kind(), "Project");
        assert_eq!(resources[1].kind(), "AgentPool");
        assert_eq!(resources[2].kind(), "DevTask");

        match &resources[1] {
            Resource::AgentPool(pool) => {
                assert_eq!(pool.spec.replicas, 2);
                assert_eq!(pool.spec.template.spec.model, "claude-sonnet");
                assert_eq!(pool.metadata.project, "demo");
            }
            other => panic!("expected AgentPool, got {other:?}"),
        }
    }

    #[test]
    fn defaults_api_version() {
        let resources = parse_str("kind: Project\nmetadata:\n  name: p\n").expect("parse");
        match &resources[0] {
            Resource::Project(p) => assert_eq!(p.type_meta.api_version, API_VERSION),
            other => panic!("expected Project, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = parse_str("kind: Widget\nmetadata:\n  name: w\n").unwrap_err();
        assert!(matches!(err, ManifestError::UnknownKind(k) if k == "Widget"));
    }

    #[test]
    fn rejects_missing_name() {
        let err = parse_str("kind: DevTask\nmetadata:\n  project: p\nspec:\n  prompt: hi\n")
            .unwrap_err();
        assert!(matches!(err, ManifestError::MissingName { kind: "DevTask" }));
    }

    #[test]
    fn skips_empty_documents() {
        let resources =
            parse_str("---\n\n---\nkind: Project\nmetadata:\n  name: p\n---\n").expect("parse");
        assert_eq!(resources.len(), 1);
    }

    #[test]
    fn depends_on_parses() {
        let resources = parse_str(MULTI_DOC).expect("parse");
        match &resources[2] {
            Resource::DevTask(task) => {
                assert_eq!(task.spec.depends_on, vec!["design-feature".to_string()]);
            }
            other => panic!("expected DevTask, got {other:?}"),
        }
    }
}
