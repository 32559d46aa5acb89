//! Artifact tracking: versioned artifact storage plus run bookkeeping.

pub mod artifact;
pub mod reference;
pub mod run;
pub mod store_fs;

pub use artifact::{Artifact, ArtifactHandle, ArtifactManifest, ArtifactVersionRef, ManifestEntry};
pub use reference::{ArtifactRef, VersionSelector};
pub use run::{Run, RunRecord, RunStatus};
pub use store_fs::FsArtifactStore;

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Storage backend for artifacts and run records.
pub trait ArtifactStore: Send + Sync {
    /// Find the manifest a reference points at within `project`.
    fn resolve(&self, project: &str, reference: &ArtifactRef) -> Result<ArtifactManifest>;

    /// Materialize every file of `manifest` below `dest_root`; returns the
    /// directory holding them.
    fn download(&self, manifest: &ArtifactManifest, dest_root: &Path) -> Result<PathBuf>;

    /// Store a new version of `artifact`, or return the current one when the
    /// content is unchanged.
    fn publish(&self, project: &str, artifact: &Artifact, run_id: &str) -> Result<ArtifactManifest>;

    fn record_usage(&self, manifest: &ArtifactManifest, run_id: &str) -> Result<()>;

    fn record_run(&self, record: &RunRecord) -> Result<()>;
}
