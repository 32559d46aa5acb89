use crate::config::TrackingSettings;
use crate::error::{CleaningError, Result};
use crate::tracking::artifact::{Artifact, ArtifactHandle, ArtifactManifest, ArtifactVersionRef};
use crate::tracking::reference::ArtifactRef;
use crate::tracking::ArtifactStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Failed => "failed",
        })
    }
}

/// Persisted state of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub project: String,
    pub entity: Option<String>,
    pub job_type: String,
    pub status: RunStatus,
    pub config: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub used_artifacts: Vec<ArtifactVersionRef>,
    pub logged_artifacts: Vec<ArtifactVersionRef>,
    pub error: Option<String>,
}

/// One unit of tracked work.
///
/// Created by [`Run::start`] and released by [`Run::finish`] or [`Run::fail`],
/// which persist the final record.
pub struct Run {
    record: RunRecord,
    store: Arc<dyn ArtifactStore>,
    cache_dir: PathBuf,
}

impl Run {
    pub fn start(store: Arc<dyn ArtifactStore>, settings: &TrackingSettings, job_type: &str) -> Result<Self> {
        let record = RunRecord {
            id: Uuid::new_v4(),
            project: settings.project.clone(),
            entity: settings.entity.clone(),
            job_type: job_type.to_string(),
            status: RunStatus::Running,
            config: serde_json::Value::Object(serde_json::Map::new()),
            started_at: Utc::now(),
            finished_at: None,
            used_artifacts: Vec::new(),
            logged_artifacts: Vec::new(),
            error: None,
        };
        store.record_run(&record)?;
        info!(run_id = %record.id, project = %record.project, job_type, "Started run");

        Ok(Self {
            record,
            store,
            cache_dir: settings.cache_dir.clone(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.record.id
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Merge the fields of `config` into the run's configuration.
    pub fn update_config<T: Serialize>(&mut self, config: &T) -> Result<()> {
        let value = serde_json::to_value(config)?;
        let serde_json::Value::Object(fields) = value else {
            return Err(CleaningError::Config(
                "run configuration must serialize to an object".to_string(),
            ));
        };
        if let serde_json::Value::Object(existing) = &mut self.record.config {
            existing.extend(fields);
        }
        self.store.record_run(&self.record)
    }

    /// Resolve and download an input artifact, recording its use.
    pub fn use_artifact(&mut self, reference: &str) -> Result<ArtifactHandle> {
        let reference = ArtifactRef::parse(reference)?;
        let project = reference
            .project
            .clone()
            .unwrap_or_else(|| self.record.project.clone());

        let manifest = self.store.resolve(&project, &reference)?;
        let dir = self.store.download(&manifest, &self.cache_dir)?;
        self.store.record_usage(&manifest, &self.record.id.to_string())?;
        self.record.used_artifacts.push(ArtifactVersionRef::from(&manifest));
        self.store.record_run(&self.record)?;

        Ok(ArtifactHandle { manifest, dir })
    }

    /// Publish an output artifact under the run's project.
    pub fn log_artifact(&mut self, artifact: &Artifact) -> Result<ArtifactManifest> {
        let manifest = self
            .store
            .publish(&self.record.project, artifact, &self.record.id.to_string())?;
        self.record.logged_artifacts.push(ArtifactVersionRef::from(&manifest));
        self.store.record_run(&self.record)?;
        Ok(manifest)
    }

    pub fn finish(mut self) -> Result<RunRecord> {
        self.close(RunStatus::Finished, None)?;
        info!(run_id = %self.record.id, "Run finished");
        Ok(self.record)
    }

    pub fn fail(mut self, reason: &dyn fmt::Display) -> Result<RunRecord> {
        self.close(RunStatus::Failed, Some(reason.to_string()))?;
        error!(run_id = %self.record.id, error = %reason, "Run failed");
        Ok(self.record)
    }

    fn close(&mut self, status: RunStatus, error: Option<String>) -> Result<()> {
        self.record.status = status;
        self.record.error = error;
        self.record.finished_at = Some(Utc::now());
        self.store.record_run(&self.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::FsArtifactStore;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn start_run(root: &std::path::Path) -> (Arc<FsArtifactStore>, Run) {
        let store = Arc::new(FsArtifactStore::new(root));
        let settings = TrackingSettings::at_root(root);
        let run = Run::start(store.clone(), &settings, "basic_cleaning").unwrap();
        (store, run)
    }

    #[test]
    fn test_config_is_merged_and_persisted() {
        let root = tempdir().unwrap();
        let (store, mut run) = start_run(root.path());

        run.update_config(&json!({"min_price": 10.0})).unwrap();
        run.update_config(&json!({"max_price": 350.0})).unwrap();
        assert!(run.update_config(&json!([1, 2])).is_err());

        let stored = store.load_run(&run.id().to_string()).unwrap().unwrap();
        assert_eq!(stored.config, json!({"min_price": 10.0, "max_price": 350.0}));
        assert_eq!(stored.status, RunStatus::Running);
    }

    #[test]
    fn test_use_and_log_artifacts_are_recorded() {
        let root = tempdir().unwrap();
        let work = tempdir().unwrap();
        let (store, mut run) = start_run(root.path());

        let path = work.path().join("sample.csv");
        fs::write(&path, "price\n10\n").unwrap();
        let mut artifact = Artifact::new("sample.csv", "raw_data", "raw").unwrap();
        artifact.add_file(&path).unwrap();
        let published = run.log_artifact(&artifact).unwrap();

        let handle = run.use_artifact("sample.csv:latest").unwrap();
        assert_eq!(handle.manifest, published);
        assert_eq!(fs::read_to_string(handle.file().unwrap()).unwrap(), "price\n10\n");

        let record = run.finish().unwrap();
        assert_eq!(record.status, RunStatus::Finished);
        assert!(record.finished_at.is_some());
        assert_eq!(record.used_artifacts.len(), 1);
        assert_eq!(record.logged_artifacts[0].version, 0);
        assert_eq!(store.load_run(&record.id.to_string()).unwrap().unwrap(), record);
    }

    #[test]
    fn test_fail_keeps_error_message() {
        let root = tempdir().unwrap();
        let (store, mut run) = start_run(root.path());

        let err = run.use_artifact("nope.csv:v0").unwrap_err();
        let record = run.fail(&err).unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert!(record.error.as_deref().unwrap().contains("nope.csv"));
        assert_eq!(store.load_run(&record.id.to_string()).unwrap().unwrap().status, RunStatus::Failed);
    }
}
