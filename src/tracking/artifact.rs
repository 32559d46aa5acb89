use crate::error::{CleaningError, Result};
use crate::tracking::reference::validate_name;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An artifact being assembled for publishing.
#[derive(Debug, Clone)]
pub struct Artifact {
    name: String,
    artifact_type: String,
    description: String,
    files: Vec<ArtifactFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactFile {
    /// Name inside the artifact
    pub name: String,
    pub local_path: PathBuf,
}

impl Artifact {
    pub fn new(name: &str, artifact_type: &str, description: &str) -> Result<Self> {
        validate_name(name).map_err(CleaningError::InvalidArtifact)?;
        if artifact_type.trim().is_empty() {
            return Err(CleaningError::InvalidArtifact(format!(
                "artifact '{}' needs a type",
                name
            )));
        }
        Ok(Self {
            name: name.to_string(),
            artifact_type: artifact_type.to_string(),
            description: description.to_string(),
            files: Vec::new(),
        })
    }

    /// Attach a local file under its base name.
    pub fn add_file(&mut self, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                CleaningError::InvalidArtifact(format!("'{}' has no usable file name", path.display()))
            })?
            .to_string();
        if self.files.iter().any(|f| f.name == name) {
            return Err(CleaningError::InvalidArtifact(format!(
                "artifact '{}' already contains a file named '{}'",
                self.name, name
            )));
        }
        self.files.push(ArtifactFile {
            name,
            local_path: path.to_path_buf(),
        });
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn artifact_type(&self) -> &str {
        &self.artifact_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn files(&self) -> &[ArtifactFile] {
        &self.files
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub blob_ref: String,
}

/// A published, immutable artifact version as recorded by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub project: String,
    pub name: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub description: String,
    pub version: u32,
    pub digest: String,
    pub files: Vec<ManifestEntry>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl ArtifactManifest {
    /// `name:vN`, as shown to users.
    pub fn qualified_name(&self) -> String {
        format!("{}:v{}", self.name, self.version)
    }
}

/// One artifact version touched by a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactVersionRef {
    pub project: String,
    pub name: String,
    pub version: u32,
    pub digest: String,
}

impl From<&ArtifactManifest> for ArtifactVersionRef {
    fn from(m: &ArtifactManifest) -> Self {
        Self {
            project: m.project.clone(),
            name: m.name.clone(),
            version: m.version,
            digest: m.digest.clone(),
        }
    }
}

/// Materialized files of a used artifact.
#[derive(Debug, Clone)]
pub struct ArtifactHandle {
    pub manifest: ArtifactManifest,
    pub dir: PathBuf,
}

impl ArtifactHandle {
    /// Local path of the artifact's only file.
    pub fn file(&self) -> Result<PathBuf> {
        match self.manifest.files.as_slice() {
            [entry] => Ok(self.dir.join(&entry.path)),
            files => Err(CleaningError::UnexpectedFileCount {
                artifact: self.manifest.qualified_name(),
                count: files.len(),
            }),
        }
    }
}
