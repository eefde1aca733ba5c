//! XML settings documents.
//!
//! A settings file is a flat list of options under a `<settings>` root:
//!
//! ```xml
//! <settings>
//!     <procarve_chunkdir>chunks/</procarve_chunkdir>
//!     <procarve_resolution>0.0125</procarve_resolution>
//! </settings>
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Expected root element of a settings document.
pub const SETTINGS_ROOT: &str = "settings";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file {} does not exist", .0.display())]
    Missing(PathBuf),

    #[error("unable to read settings file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings file {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("settings file {} has root <{found}>, expected <settings>", path.display())]
    UnexpectedRoot { path: PathBuf, found: String },

    #[error("settings file {} is missing required option '{key}'", path.display())]
    MissingKey { path: PathBuf, key: String },

    #[error("option '{key}' in {} has value '{value}', expected {expected}", path.display())]
    InvalidValue {
        path: PathBuf,
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// Parsed settings: option name to raw text value.
#[derive(Debug, Clone)]
pub struct SettingsDocument {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl SettingsDocument {
    /// Read and parse the settings file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SettingsError::Missing(path.to_path_buf()));
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(path, &contents)
    }

    /// Parse settings text; `path` is only used in error messages.
    pub fn parse(path: impl AsRef<Path>, xml: &str) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let doc = roxmltree::Document::parse(xml).map_err(|source| SettingsError::Malformed {
            path: path.clone(),
            source,
        })?;

        let root = doc.root_element();
        if root.tag_name().name() != SETTINGS_ROOT {
            return Err(SettingsError::UnexpectedRoot {
                path,
                found: root.tag_name().name().to_string(),
            });
        }

        let values = root
            .children()
            .filter(|n| n.is_element())
            .map(|n| {
                (
                    n.tag_name().name().to_string(),
                    n.text().unwrap_or("").trim().to_string(),
                )
            })
            .collect();

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Option names and raw values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn text(&self, key: &str) -> Result<&str, SettingsError> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| SettingsError::MissingKey {
                path: self.path.clone(),
                key: key.to_string(),
            })
    }

    pub fn integer(&self, key: &str) -> Result<i64, SettingsError> {
        let raw = self.text(key)?;
        raw.parse().map_err(|_| self.invalid(key, raw, "an integer"))
    }

    pub fn float(&self, key: &str) -> Result<f64, SettingsError> {
        let raw = self.text(key)?;
        raw.parse().map_err(|_| self.invalid(key, raw, "a number"))
    }

    pub fn boolean(&self, key: &str) -> Result<bool, SettingsError> {
        let raw = self.text(key)?;
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(self.invalid(key, raw, "a boolean")),
        }
    }

    fn invalid(&self, key: &str, value: &str, expected: &'static str) -> SettingsError {
        SettingsError::InvalidValue {
            path: self.path.clone(),
            key: key.to_string(),
            value: value.to_string(),
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<settings>
    <procarve_chunkdir> chunks/ </procarve_chunkdir>
    <procarve_resolution>0.0125</procarve_resolution>
    <procarve_num_threads>4</procarve_num_threads>
    <procarve_interpolate>1</procarve_interpolate>
</settings>"#;

    #[test]
    fn test_typed_values() {
        let doc = SettingsDocument::parse("sample.xml", SAMPLE).unwrap();
        assert_eq!(doc.len(), 4);
        assert_eq!(doc.text("procarve_chunkdir").unwrap(), "chunks/");
        assert_eq!(doc.integer("procarve_num_threads").unwrap(), 4);
        assert!((doc.float("procarve_resolution").unwrap() - 0.0125).abs() < 1e-12);
        assert!(doc.boolean("procarve_interpolate").unwrap());
    }

    #[test]
    fn test_invalid_value() {
        let doc = SettingsDocument::parse("sample.xml", SAMPLE).unwrap();
        let err = doc.integer("procarve_resolution").unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { expected: "an integer", .. }));
    }

    #[test]
    fn test_missing_key() {
        let doc = SettingsDocument::parse("sample.xml", SAMPLE).unwrap();
        assert!(matches!(
            doc.text("oct2dq_min_wall_height"),
            Err(SettingsError::MissingKey { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = SettingsDocument::load(dir.path().join("absent.xml")).unwrap_err();
        assert!(matches!(err, SettingsError::Missing(_)));
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.xml");
        std::fs::write(&path, "<settings><a>1</settings>").unwrap();
        let err = SettingsDocument::load(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Malformed { .. }));
    }

    #[test]
    fn test_unexpected_root() {
        let err = SettingsDocument::parse("other.xml", "<config><a>1</a></config>").unwrap_err();
        match err {
            SettingsError::UnexpectedRoot { found, .. } => assert_eq!(found, "config"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
