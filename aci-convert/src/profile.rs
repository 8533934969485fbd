use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::analysis::Severity;

/// Filter settings applied to audit findings before reporting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuditProfile {
    #[serde(default)]
    pub min_severity: Option<Severity>,
    #[serde(default)]
    pub disabled_categories: Vec<String>,
}

impl AuditProfile {
    /// Whether a finding with this severity and category survives the profile.
    pub fn includes(&self, severity: Severity, category: &str) -> bool {
        if let Some(floor) = self.min_severity {
            if severity < floor {
                return false;
            }
        }
        !self.disabled_categories.iter().any(|c| c == category)
    }
}

pub fn load_profile(name: &str) -> Option<AuditProfile> {
    load_profile_with_source(name, None).map(|(profile, _)| profile)
}

pub fn load_profile_with_source(
    name: &str,
    profiles_dir: Option<&Path>,
) -> Option<(AuditProfile, String)> {
    let file_name = format!("{}.toml", name.trim());

    if let Some(dir) = profiles_dir {
        let path = dir.join(&file_name);
        if let Ok(profile) = load_profile_file(&path) {
            return Some((profile, format!("file:{}", path.display())));
        }
    }
    if let Some(profile) = load_embedded_profile(&file_name) {
        return Some((profile, "embedded".to_string()));
    }

    None
}

fn load_embedded_profile(name: &str) -> Option<AuditProfile> {
    let raw = match name {
        "default.toml" => Some(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/profiles/default.toml"
        ))),
        "strict.toml" => Some(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/profiles/strict.toml"
        ))),
        _ => None,
    }?;

    parse_profile(raw).ok()
}

/// Errors returned when loading a profile file from an explicit path.
#[derive(Debug, Error)]
pub enum ProfileLoadError {
    #[error("failed to read profile file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse profile file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Load a profile from a TOML file.
pub fn load_profile_file(path: &Path) -> Result<AuditProfile, ProfileLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| ProfileLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_profile(&raw).map_err(|source| ProfileLoadError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn parse_profile(raw: &str) -> Result<AuditProfile, toml::de::Error> {
    toml::from_str::<AuditProfile>(raw)
}

#[cfg(test)]
mod tests {
    use super::{load_embedded_profile, load_profile, load_profile_with_source};
    use crate::analysis::Severity;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn default_profile_reports_everything() {
        let profile = load_profile("default").expect("profile");
        assert!(profile.includes(Severity::Low, "NO_SUBNET"));
        assert!(profile.includes(Severity::Critical, "OVERLAP_SAME_VRF"));
    }

    #[test]
    fn strict_profile_drops_low_findings() {
        let profile = load_profile("strict").expect("profile");
        assert!(!profile.includes(Severity::Low, "MISSING_DENY"));
        assert!(profile.includes(Severity::Medium, "BROAD_PORT_RANGE"));
        assert!(profile.includes(Severity::High, "ANY_ANY"));
    }

    #[test]
    fn unknown_profile_is_none() {
        assert!(load_profile("not-a-profile").is_none());
    }

    #[test]
    fn embedded_profile_loads() {
        let profile = load_embedded_profile("strict.toml").expect("embedded profile");
        assert_eq!(profile.min_severity, Some(Severity::Medium));
    }

    #[test]
    fn profile_source_reports_embedded() {
        let (_, source) = load_profile_with_source("default", None).expect("embedded profile");
        assert_eq!(source, "embedded");
    }

    #[test]
    fn profile_source_reports_override_dir() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("quiet.toml");
        fs::write(
            &path,
            r#"
min_severity = "LOW"
disabled_categories = ["MISSING_DENY", "EPG_NO_CONTRACT"]
"#,
        )
        .expect("write profile");

        let (profile, source) =
            load_profile_with_source("quiet", Some(dir.path())).expect("profile");
        assert!(source.starts_with("file:"));
        assert!(!profile.includes(Severity::Low, "MISSING_DENY"));
        assert!(profile.includes(Severity::Low, "NO_SUBNET"));
    }
}
