use crate::error::{CleaningError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const LATEST_ALIAS: &str = "latest";

/// Which version of an artifact a reference points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionSelector {
    /// `v0`, `v1`, ...
    Index(u32),
    /// Any other alias, e.g. `latest` or `reference`.
    Alias(String),
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Index(n) => write!(f, "v{}", n),
            VersionSelector::Alias(a) => f.write_str(a),
        }
    }
}

/// `[entity/][project/]name[:version]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub entity: Option<String>,
    pub project: Option<String>,
    pub name: String,
    pub version: VersionSelector,
}

impl ArtifactRef {
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| CleaningError::InvalidReference {
            reference: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("reference is empty"));
        }

        let (path, version) = match trimmed.rsplit_once(':') {
            Some((_, "")) => return Err(invalid("version after ':' is empty")),
            Some((path, version)) => (path, parse_version(version)),
            None => (trimmed, VersionSelector::Alias(LATEST_ALIAS.to_string())),
        };

        let segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty path segment"));
        }
        let (entity, project, name) = match segments.as_slice() {
            [name] => (None, None, *name),
            [project, name] => (None, Some(*project), *name),
            [entity, project, name] => (Some(*entity), Some(*project), *name),
            _ => return Err(invalid("expected at most entity/project/name")),
        };
        for (kind, segment) in [("entity", entity), ("project", project), ("artifact", Some(name))] {
            if let Some(segment) = segment {
                validate_name(segment)
                    .map_err(|reason| invalid(format!("{} {}", kind, reason).as_str()))?;
            }
        }

        Ok(Self {
            entity: entity.map(str::to_string),
            project: project.map(str::to_string),
            name: name.to_string(),
            version,
        })
    }
}

fn parse_version(raw: &str) -> VersionSelector {
    raw.strip_prefix('v')
        .and_then(|digits| digits.parse::<u32>().ok())
        .map(VersionSelector::Index)
        .unwrap_or_else(|| VersionSelector::Alias(raw.to_string()))
}

/// Entity, project and artifact names double as directory names in the store.
pub fn validate_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("name is empty".to_string());
    }
    if name == "." || name == ".." {
        return Err(format!("name '{}' is reserved", name));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(*c, '.' | '_' | '-')))
    {
        return Err(format!("name '{}' contains invalid character '{}'", name, bad));
    }
    Ok(())
}

impl FromStr for ArtifactRef {
    type Err = CleaningError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(entity) = &self.entity {
            write!(f, "{}/", entity)?;
        }
        if let Some(project) = &self.project {
            write!(f, "{}/", project)?;
        }
        write!(f, "{}:{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_name_means_latest() {
        let r = ArtifactRef::parse("sample.csv").unwrap();
        assert_eq!(r.name, "sample.csv");
        assert_eq!(r.version, VersionSelector::Alias("latest".into()));
        assert_eq!(r.to_string(), "sample.csv:latest");
    }

    #[test]
    fn test_full_reference() {
        let r = ArtifactRef::parse("team/nyc_airbnb/sample.csv:v3").unwrap();
        assert_eq!(r.entity.as_deref(), Some("team"));
        assert_eq!(r.project.as_deref(), Some("nyc_airbnb"));
        assert_eq!(r.version, VersionSelector::Index(3));
        assert_eq!(r.to_string(), "team/nyc_airbnb/sample.csv:v3");
    }

    #[test]
    fn test_project_segment_error_names_the_segment() {
        match ArtifactRef::parse("../sample.csv:v0") {
            Err(CleaningError::InvalidReference { reason, .. }) => {
                assert!(reason.starts_with("project "), "{}", reason)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_v_is_an_alias() {
        let r: ArtifactRef = "clean_sample.csv:vfinal".parse().unwrap();
        assert_eq!(r.version, VersionSelector::Alias("vfinal".into()));
    }

    #[test]
    fn test_rejects_malformed_references() {
        for bad in [
            "",
            "name:",
            "a/b/c/d:v0",
            "/name:v0",
            "bad name:v1",
            "..:v0",
            "../sample.csv:v0",
            "../proj/sample.csv:v0",
            "team/./sample.csv:latest",
        ] {
            assert!(
                matches!(ArtifactRef::parse(bad), Err(CleaningError::InvalidReference { .. })),
                "expected '{}' to be rejected",
                bad
            );
        }
    }
}
