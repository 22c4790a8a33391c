use crate::error::SettingsError;
use crate::sheet_config::parse_version;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const CONFIG_VERSION_ENV: &str = "SAMPLESHEETS_CONFIG_VERSION";
pub const MIN_CONFIG_VERSION_ENV: &str = "SAMPLESHEETS_MIN_CONFIG_VERSION";

/// Engine settings. Every field has a default so a partial JSON file works.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Stamped onto newly built sheet configurations.
    pub config_version: String,
    /// Stored configurations below this are rebuilt.
    pub min_config_version: String,
    /// Ontology fields restricted to `allow_list_ontologies`, matched
    /// case-insensitively.
    pub ontology_allow_list_fields: Vec<String>,
    pub allow_list_ontologies: Vec<String>,
    pub name_columns_editable: bool,
    /// Collapse study rows that repeat an earlier source..sample walk.
    pub study_dedup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_version: "0.8.0".to_string(),
            min_config_version: "0.8.0".to_string(),
            ontology_allow_list_fields: vec!["organism".to_string()],
            allow_list_ontologies: vec!["NCBITAXON".to_string()],
            name_columns_editable: false,
            study_dedup: true,
        }
    }
}

impl Settings {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let reader = BufReader::new(File::open(path)?);
        let settings: Settings = serde_json::from_reader(reader)?;
        settings.check()?;
        Ok(settings)
    }

    /// Defaults overlaid with the version environment variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        let mut settings = Settings::default();
        if let Ok(v) = env::var(CONFIG_VERSION_ENV) {
            settings.config_version = v;
        }
        if let Ok(v) = env::var(MIN_CONFIG_VERSION_ENV) {
            settings.min_config_version = v;
        }
        settings.check()?;
        Ok(settings)
    }

    /// Both versions must parse, and newly stamped configurations must not
    /// fall below the minimum, or every load would rebuild them.
    pub fn check(&self) -> Result<(), SettingsError> {
        let config = parse_version(&self.config_version).ok_or_else(|| SettingsError::Version {
            key: "config_version",
            value: self.config_version.clone(),
        })?;
        let min = parse_version(&self.min_config_version).ok_or_else(|| SettingsError::Version {
            key: "min_config_version",
            value: self.min_config_version.clone(),
        })?;
        if config < min {
            return Err(SettingsError::VersionOrder {
                config: self.config_version.clone(),
                min: self.min_config_version.clone(),
            });
        }
        Ok(())
    }

    pub fn is_allow_list_field(&self, name: &str) -> bool {
        self.ontology_allow_list_fields
            .iter()
            .any(|f| f.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"min_config_version": "0.5"}}"#).unwrap();
        let settings = Settings::from_json_file(file.path()).unwrap();
        assert_eq!(settings.min_config_version, "0.5");
        assert_eq!(settings.config_version, "0.8.0");
        assert!(settings.study_dedup);
    }

    #[test]
    fn bad_version_is_rejected() {
        let settings = Settings {
            config_version: "latest".to_string(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.check(),
            Err(SettingsError::Version {
                key: "config_version",
                ..
            })
        ));
    }

    #[test]
    fn stamp_below_minimum_is_rejected() {
        let settings = Settings {
            config_version: "0.1".to_string(),
            min_config_version: "0.8".to_string(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.check(),
            Err(SettingsError::VersionOrder { .. })
        ));
        let equal = Settings {
            config_version: "0.8".to_string(),
            min_config_version: "0.8.0".to_string(),
            ..Settings::default()
        };
        assert!(equal.check().is_ok());
    }

    #[test]
    fn allow_list_match_ignores_case() {
        let settings = Settings::default();
        assert!(settings.is_allow_list_field("Organism"));
        assert!(!settings.is_allow_list_field("organism part"));
    }
}
