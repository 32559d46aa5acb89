//! Filesystem-backed artifact store.
//!
//! Layout under the root:
//!
//! ```text
//! blobs/sha256/ab/cd/<hex>             file contents, content-addressed
//! artifacts/<project>/<name>/v<N>.json manifests
//! artifacts/<project>/<name>/aliases.json
//! runs/<run_id>.json                   run records
//! events.ndjson                        append-only event log
//! ```

use crate::error::{CleaningError, Result};
use crate::tracking::artifact::{Artifact, ArtifactManifest, ManifestEntry};
use crate::tracking::reference::{ArtifactRef, VersionSelector, LATEST_ALIAS};
use crate::tracking::run::RunRecord;
use crate::tracking::ArtifactStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BLOB_REF_PREFIX: &str = "cas:sha256:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreEventKind {
    Publish,
    PublishUnchanged,
    Use,
    Run,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEvent {
    pub at: DateTime<Utc>,
    pub kind: StoreEventKind,
    pub project: String,
    pub artifact: Option<String>,
    pub version: Option<u32>,
    pub run_id: Option<String>,
    pub detail: Option<String>,
}

pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_dir(&self, project: &str, name: &str) -> PathBuf {
        self.root.join("artifacts").join(project).join(name)
    }

    fn blob_path(&self, hex: &str) -> PathBuf {
        self.root
            .join("blobs")
            .join("sha256")
            .join(&hex[0..2])
            .join(&hex[2..4])
            .join(hex)
    }

    fn events_path(&self) -> PathBuf {
        self.root.join("events.ndjson")
    }

    /// Store bytes under their sha256 and return `(hex, blob_ref)`.
    fn write_blob(&self, bytes: &[u8]) -> Result<(String, String)> {
        let hex = sha256_hex(bytes);
        let path = self.blob_path(&hex);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        if !path.exists() {
            fs::write(&path, bytes)?;
        }
        let blob_ref = format!("{}{}", BLOB_REF_PREFIX, hex);
        Ok((hex, blob_ref))
    }

    fn versions(&self, dir: &Path) -> Result<Vec<u32>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut versions = Vec::new();
        for entry in fs::read_dir(dir)? {
            let name = entry?.file_name();
            let version = name
                .to_str()
                .and_then(|n| n.strip_prefix('v'))
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|n| n.parse::<u32>().ok());
            if let Some(v) = version {
                versions.push(v);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    fn load_aliases(&self, dir: &Path) -> Result<BTreeMap<String, u32>> {
        let path = dir.join("aliases.json");
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save_aliases(&self, dir: &Path, aliases: &BTreeMap<String, u32>) -> Result<()> {
        fs::write(dir.join("aliases.json"), serde_json::to_string_pretty(aliases)?)?;
        Ok(())
    }

    fn load_manifest(&self, dir: &Path, version: u32, display: &str) -> Result<ArtifactManifest> {
        let path = dir.join(format!("v{}.json", version));
        if !path.exists() {
            return Err(CleaningError::ArtifactNotFound(display.to_string()));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn append_event(&self, event: &StoreEvent) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.events_path())?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// All events recorded so far, oldest first.
    pub fn events(&self) -> Result<Vec<StoreEvent>> {
        let path = self.events_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path)?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(CleaningError::from))
            .collect()
    }

    /// Previously persisted record of a run, if any.
    pub fn load_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        let path = self.root.join("runs").join(format!("{}.json", run_id));
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn resolve(&self, project: &str, reference: &ArtifactRef) -> Result<ArtifactManifest> {
        let display = format!("{}/{}:{}", project, reference.name, reference.version);
        let dir = self.artifact_dir(project, &reference.name);
        if !dir.exists() {
            return Err(CleaningError::ArtifactNotFound(display));
        }

        let version = match &reference.version {
            VersionSelector::Index(n) => *n,
            VersionSelector::Alias(alias) => *self
                .load_aliases(&dir)?
                .get(alias)
                .ok_or_else(|| CleaningError::ArtifactNotFound(display.clone()))?,
        };
        let manifest = self.load_manifest(&dir, version, &display)?;
        debug!(artifact = %manifest.qualified_name(), "Resolved artifact");
        Ok(manifest)
    }

    fn download(&self, manifest: &ArtifactManifest, dest_root: &Path) -> Result<PathBuf> {
        let dest = dest_root
            .join(&manifest.project)
            .join(format!("{}-v{}", manifest.name, manifest.version));
        fs::create_dir_all(&dest)?;

        for entry in &manifest.files {
            let corrupt = |reason: String| CleaningError::CorruptArtifact {
                artifact: manifest.qualified_name(),
                reason,
            };
            if Path::new(&entry.path).file_name().and_then(|n| n.to_str()) != Some(entry.path.as_str()) {
                return Err(corrupt(format!("file entry '{}' is not a plain file name", entry.path)));
            }
            if !is_sha256_hex(&entry.sha256) {
                return Err(corrupt(format!(
                    "file entry '{}' has malformed digest '{}'",
                    entry.path, entry.sha256
                )));
            }

            let target = dest.join(&entry.path);
            if target.exists() && sha256_hex(&fs::read(&target)?) == entry.sha256 {
                debug!(file = %target.display(), "Cached copy is current");
                continue;
            }

            let blob = self.blob_path(&entry.sha256);
            if !blob.exists() {
                return Err(corrupt(format!("missing blob for '{}'", entry.path)));
            }
            let bytes = fs::read(&blob)?;
            if sha256_hex(&bytes) != entry.sha256 {
                return Err(corrupt(format!("checksum mismatch for '{}'", entry.path)));
            }
            fs::write(&target, &bytes)?;
        }

        Ok(dest)
    }

    fn publish(&self, project: &str, artifact: &Artifact, run_id: &str) -> Result<ArtifactManifest> {
        if artifact.files().is_empty() {
            return Err(CleaningError::InvalidArtifact(format!(
                "artifact '{}' has no files",
                artifact.name()
            )));
        }

        let mut files = Vec::with_capacity(artifact.files().len());
        for file in artifact.files() {
            let bytes = fs::read(&file.local_path)?;
            let (sha256, blob_ref) = self.write_blob(&bytes)?;
            files.push(ManifestEntry {
                path: file.name.clone(),
                sha256,
                size_bytes: bytes.len() as u64,
                blob_ref,
            });
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        let digest = manifest_digest(&files);

        let dir = self.artifact_dir(project, artifact.name());
        fs::create_dir_all(&dir)?;
        let mut aliases = self.load_aliases(&dir)?;

        if let Some(&latest) = aliases.get(LATEST_ALIAS) {
            let current = self.load_manifest(&dir, latest, artifact.name())?;
            if current.artifact_type != artifact.artifact_type() {
                return Err(CleaningError::InvalidArtifact(format!(
                    "artifact '{}' has type '{}', cannot publish it as '{}'",
                    artifact.name(),
                    current.artifact_type,
                    artifact.artifact_type()
                )));
            }
            if current.digest == digest && current.description == artifact.description() {
                info!(
                    artifact = %current.qualified_name(),
                    "Content unchanged, keeping existing version"
                );
                self.append_event(&StoreEvent {
                    at: Utc::now(),
                    kind: StoreEventKind::PublishUnchanged,
                    project: project.to_string(),
                    artifact: Some(current.name.clone()),
                    version: Some(current.version),
                    run_id: Some(run_id.to_string()),
                    detail: None,
                })?;
                return Ok(current);
            }
        }

        let version = self.versions(&dir)?.last().map_or(0, |v| v + 1);
        let manifest = ArtifactManifest {
            project: project.to_string(),
            name: artifact.name().to_string(),
            artifact_type: artifact.artifact_type().to_string(),
            description: artifact.description().to_string(),
            version,
            digest,
            files,
            created_at: Utc::now(),
            created_by: Some(run_id.to_string()),
        };
        fs::write(
            dir.join(format!("v{}.json", version)),
            serde_json::to_string_pretty(&manifest)?,
        )?;
        aliases.insert(LATEST_ALIAS.to_string(), version);
        self.save_aliases(&dir, &aliases)?;

        self.append_event(&StoreEvent {
            at: manifest.created_at,
            kind: StoreEventKind::Publish,
            project: project.to_string(),
            artifact: Some(manifest.name.clone()),
            version: Some(version),
            run_id: Some(run_id.to_string()),
            detail: Some(manifest.artifact_type.clone()),
        })?;
        info!(artifact = %manifest.qualified_name(), digest = %manifest.digest, "Published artifact");
        Ok(manifest)
    }

    fn record_usage(&self, manifest: &ArtifactManifest, run_id: &str) -> Result<()> {
        self.append_event(&StoreEvent {
            at: Utc::now(),
            kind: StoreEventKind::Use,
            project: manifest.project.clone(),
            artifact: Some(manifest.name.clone()),
            version: Some(manifest.version),
            run_id: Some(run_id.to_string()),
            detail: None,
        })
    }

    fn record_run(&self, record: &RunRecord) -> Result<()> {
        let dir = self.root.join("runs");
        fs::create_dir_all(&dir)?;
        fs::write(
            dir.join(format!("{}.json", record.id)),
            serde_json::to_string_pretty(record)?,
        )?;
        self.append_event(&StoreEvent {
            at: Utc::now(),
            kind: StoreEventKind::Run,
            project: record.project.clone(),
            artifact: None,
            version: None,
            run_id: Some(record.id.to_string()),
            detail: Some(record.status.to_string()),
        })
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Exactly 64 lowercase hex characters.
fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Digest over `(path, sha256)` pairs; entries must already be sorted.
fn manifest_digest(entries: &[ManifestEntry]) -> String {
    let mut hasher = Sha256::new();
    for entry in entries {
        hasher.update(entry.path.as_bytes());
        hasher.update(b":");
        hasher.update(entry.sha256.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
