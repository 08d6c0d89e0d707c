//! The artifact value type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Broad category of an artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// A field snapshot or interpolation frame.
    Frame,
    /// A particle cloud.
    Particles,
    /// Scalar diagnostics.
    Metrics,
    /// Tabular data (CSV, traces, matrices).
    Table,
}

/// Artifact payload.
#[derive(Clone, Debug, PartialEq)]
pub enum ArtifactData {
    /// Raw binary.
    Bytes(Vec<u8>),
    /// UTF-8 text (CSV or JSON documents).
    Text(String),
    /// A JSON object.
    Map(Map<String, Value>),
}

/// A named, immutable solver output.
///
/// Fields are private; an artifact can only be built through
/// [`Artifact::new`] or the encoders and never changes afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Artifact {
    kind: ArtifactKind,
    name: String,
    content_type: &'static str,
    data: ArtifactData,
}

/// Wire description of an artifact: `{ name, path, contentType }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRef {
    /// File-style name, e.g. `V.csv`.
    pub name: String,
    /// `memory://<job>/<name>`.
    pub path: String,
    /// MIME type.
    pub content_type: Option<String>,
}

impl Artifact {
    /// Assemble an artifact.
    pub fn new(
        kind: ArtifactKind,
        name: impl Into<String>,
        content_type: &'static str,
        data: ArtifactData,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            content_type,
            data,
        }
    }

    /// Category.
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// File-style name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// MIME type.
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Payload.
    pub fn data(&self) -> &ArtifactData {
        &self.data
    }

    /// Payload size in bytes; maps are measured as compact JSON.
    pub fn byte_len(&self) -> usize {
        match &self.data {
            ArtifactData::Bytes(b) => b.len(),
            ArtifactData::Text(t) => t.len(),
            ArtifactData::Map(m) => Value::Object(m.clone()).to_string().len(),
        }
    }

    /// Address of this artifact within a job.
    pub fn path(&self, job_id: &str) -> String {
        format!("memory://{job_id}/{}", self.name)
    }

    /// Wire description for `job_id`.
    pub fn describe(&self, job_id: &str) -> ArtifactRef {
        ArtifactRef {
            name: self.name.clone(),
            path: self.path(job_id),
            content_type: Some(self.content_type.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_and_description() {
        let a = Artifact::new(
            ArtifactKind::Table,
            "V.csv",
            "text/csv",
            ArtifactData::Text("x0,value\n".into()),
        );
        assert_eq!(a.path("job-1"), "memory://job-1/V.csv");
        let d = a.describe("job-1");
        assert_eq!(d.content_type.as_deref(), Some("text/csv"));
        let wire = serde_json::to_value(&d).unwrap();
        assert_eq!(wire["contentType"], "text/csv");
        assert_eq!(a.byte_len(), 9);
    }

    #[test]
    fn kinds_serialise_lowercase() {
        assert_eq!(
            serde_json::to_string(&ArtifactKind::Particles).unwrap(),
            "\"particles\""
        );
    }
}
