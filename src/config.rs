use crate::error::{CleaningError, Result};
use crate::tracking::reference::validate_name;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const TRACKING_CONFIG_FILE: &str = "tracking.toml";
pub const DEFAULT_TRACKING_ROOT: &str = ".tracking";
pub const DEFAULT_PROJECT: &str = "basic_cleaning";

/// Arguments of one cleaning run. Every field is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningArgs {
    pub input_artifact: String,
    pub output_artifact: String,
    pub output_type: String,
    pub output_description: String,
    pub min_price: f64,
    pub max_price: f64,
}

/// Where the artifact store lives and which project runs are filed under.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSettings {
    pub root: PathBuf,
    pub project: String,
    pub entity: Option<String>,
    pub cache_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct TrackingFile {
    #[serde(default)]
    tracking: TrackingSection,
}

#[derive(Debug, Default, Deserialize)]
struct TrackingSection {
    root: Option<PathBuf>,
    project: Option<String>,
    entity: Option<String>,
    cache_dir: Option<PathBuf>,
}

impl TrackingSettings {
    /// Load from `tracking.toml` in the working directory (if any), then apply
    /// `TRACKING_*` environment overrides.
    pub fn load() -> Result<Self> {
        let path = Path::new(TRACKING_CONFIG_FILE);
        let file = if path.exists() {
            Self::read_file(path)?
        } else {
            TrackingFile::default()
        };
        Self::resolve(file.tracking, |key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let file = Self::read_file(path)?;
        Self::resolve(file.tracking, |key| std::env::var(key).ok())
    }

    /// Settings rooted at `root` with defaults for everything else.
    pub fn at_root<P: Into<PathBuf>>(root: P) -> Self {
        let root = root.into();
        Self {
            cache_dir: root.join("cache"),
            root,
            project: DEFAULT_PROJECT.to_string(),
            entity: None,
        }
    }

    fn read_file(path: &Path) -> Result<TrackingFile> {
        let content = fs::read_to_string(path).map_err(|e| {
            CleaningError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }

    fn resolve<F>(section: TrackingSection, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let root = non_empty("TRACKING_ROOT")
            .map(PathBuf::from)
            .or(section.root)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TRACKING_ROOT));
        let project = non_empty("TRACKING_PROJECT")
            .or(section.project)
            .unwrap_or_else(|| DEFAULT_PROJECT.to_string());
        let entity = non_empty("TRACKING_ENTITY").or(section.entity);
        let cache_dir = non_empty("TRACKING_CACHE_DIR")
            .map(PathBuf::from)
            .or(section.cache_dir)
            .unwrap_or_else(|| root.join("cache"));

        validate_name(&project)
            .map_err(|reason| CleaningError::Config(format!("tracking project {}", reason)))?;
        if let Some(entity) = &entity {
            validate_name(entity)
                .map_err(|reason| CleaningError::Config(format!("tracking entity {}", reason)))?;
        }

        Ok(Self {
            root,
            project,
            entity,
            cache_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let settings = TrackingSettings::resolve(TrackingSection::default(), env_of(&[])).unwrap();
        assert_eq!(settings.root, PathBuf::from(DEFAULT_TRACKING_ROOT));
        assert_eq!(settings.project, DEFAULT_PROJECT);
        assert_eq!(settings.entity, None);
        assert_eq!(settings.cache_dir, PathBuf::from(".tracking/cache"));
    }

    #[test]
    fn test_env_overrides_file() {
        let section: TrackingFile = toml::from_str(
            r#"
            [tracking]
            root = "/srv/artifacts"
            project = "nyc_airbnb"
            "#,
        )
        .unwrap();
        let settings = TrackingSettings::resolve(
            section.tracking,
            env_of(&[("TRACKING_PROJECT", "override"), ("TRACKING_ENTITY", "team")]),
        )
        .unwrap();
        assert_eq!(settings.root, PathBuf::from("/srv/artifacts"));
        assert_eq!(settings.project, "override");
        assert_eq!(settings.entity.as_deref(), Some("team"));
        assert_eq!(settings.cache_dir, PathBuf::from("/srv/artifacts/cache"));
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let settings = TrackingSettings::resolve(
            TrackingSection::default(),
            env_of(&[("TRACKING_ROOT", "  ")]),
        )
        .unwrap();
        assert_eq!(settings.root, PathBuf::from(DEFAULT_TRACKING_ROOT));
    }

    #[test]
    fn test_project_and_entity_must_be_plain_names() {
        for env in [
            env_of(&[("TRACKING_PROJECT", "..")]),
            env_of(&[("TRACKING_PROJECT", "../elsewhere")]),
            env_of(&[("TRACKING_ENTITY", "team/other")]),
        ] {
            assert!(matches!(
                TrackingSettings::resolve(TrackingSection::default(), env),
                Err(CleaningError::Config(_))
            ));
        }
    }

    #[test]
    fn test_from_file_reports_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TRACKING_CONFIG_FILE);
        fs::write(&path, "[tracking\nroot = ").unwrap();
        assert!(matches!(
            TrackingSettings::from_file(&path),
            Err(CleaningError::Toml(_))
        ));
    }
}
