//! Typed views over the settings files of each pipeline family.
//!
//! Each view declares the options it requires, so a bad settings file fails
//! when the step starts instead of inside a native stage.

use super::{SettingsDocument, SettingsError};
use std::path::{Component, Path, PathBuf};

/// Chunker (procarve family) settings, key set v1.
#[derive(Debug, Clone)]
pub struct ChunkerSettings {
    document: SettingsDocument,
    chunkdir: PathBuf,
}

impl ChunkerSettings {
    pub const KEY_SET_VERSION: u32 = 1;

    /// Output sub-directory for chunk files, relative to the chunk list.
    pub const CHUNKDIR: &'static str = "procarve_chunkdir";

    pub const REQUIRED_KEYS: &'static [&'static str] = &[Self::CHUNKDIR];

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        Self::from_document(SettingsDocument::load(path)?)
    }

    pub fn from_document(document: SettingsDocument) -> Result<Self, SettingsError> {
        let chunkdir = document.text(Self::CHUNKDIR)?;
        if !is_plain_subdirectory(Path::new(chunkdir)) {
            return Err(SettingsError::InvalidValue {
                path: document.path().to_path_buf(),
                key: Self::CHUNKDIR.to_string(),
                value: chunkdir.to_string(),
                expected: "a relative sub-directory without '..' components",
            });
        }
        let chunkdir = PathBuf::from(chunkdir);
        Ok(Self { document, chunkdir })
    }

    pub fn chunkdir(&self) -> &Path {
        &self.chunkdir
    }

    pub fn path(&self) -> &Path {
        self.document.path()
    }

    pub fn document(&self) -> &SettingsDocument {
        &self.document
    }
}

/// True for a relative path that names at least one directory below its base
/// and never climbs out of it.
fn is_plain_subdirectory(path: &Path) -> bool {
    let mut named = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => named = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    named
}

/// oct2dq settings, key set v1.
///
/// The stage reads its own options; the orchestrator only requires the file
/// to be a well-formed settings document.
#[derive(Debug, Clone)]
pub struct Oct2dqSettings {
    document: SettingsDocument,
}

impl Oct2dqSettings {
    pub const KEY_SET_VERSION: u32 = 1;

    pub const REQUIRED_KEYS: &'static [&'static str] = &[];

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        Self::from_document(SettingsDocument::load(path)?)
    }

    pub fn from_document(document: SettingsDocument) -> Result<Self, SettingsError> {
        for key in Self::REQUIRED_KEYS {
            document.text(key)?;
        }
        for (key, value) in document.iter() {
            tracing::debug!("oct2dq setting {} = {}", key, value);
        }
        Ok(Self { document })
    }

    pub fn path(&self) -> &Path {
        self.document.path()
    }

    pub fn document(&self) -> &SettingsDocument {
        &self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunker_settings() {
        let doc = SettingsDocument::parse(
            "procarve_settings.xml",
            "<settings><procarve_chunkdir>chunks/</procarve_chunkdir></settings>",
        )
        .unwrap();
        let settings = ChunkerSettings::from_document(doc).unwrap();
        assert_eq!(settings.chunkdir(), Path::new("chunks/"));
        assert_eq!(settings.path(), Path::new("procarve_settings.xml"));
    }

    #[test]
    fn test_chunker_settings_require_chunkdir() {
        let doc = SettingsDocument::parse(
            "procarve_settings.xml",
            "<settings><procarve_resolution>0.05</procarve_resolution></settings>",
        )
        .unwrap();
        let err = ChunkerSettings::from_document(doc).unwrap_err();
        match err {
            SettingsError::MissingKey { key, .. } => assert_eq!(key, ChunkerSettings::CHUNKDIR),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_chunker_settings_reject_empty_chunkdir() {
        let doc = SettingsDocument::parse(
            "procarve_settings.xml",
            "<settings><procarve_chunkdir>  </procarve_chunkdir></settings>",
        )
        .unwrap();
        assert!(matches!(
            ChunkerSettings::from_document(doc),
            Err(SettingsError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_chunker_settings_reject_escaping_chunkdir() {
        for value in [".", "./", "..", "../..", "chunks/../..", "/abs/chunks", "/"] {
            let xml =
                format!("<settings><procarve_chunkdir>{value}</procarve_chunkdir></settings>");
            let doc = SettingsDocument::parse("procarve_settings.xml", &xml).unwrap();
            match ChunkerSettings::from_document(doc) {
                Err(SettingsError::InvalidValue { key, .. }) => {
                    assert_eq!(key, ChunkerSettings::CHUNKDIR, "{value}")
                }
                other => panic!("{value} should be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_chunker_settings_accept_nested_chunkdir() {
        for value in ["chunks", "./chunks", "out/chunks/"] {
            let xml =
                format!("<settings><procarve_chunkdir>{value}</procarve_chunkdir></settings>");
            let doc = SettingsDocument::parse("procarve_settings.xml", &xml).unwrap();
            assert!(ChunkerSettings::from_document(doc).is_ok(), "{value}");
        }
    }

    #[test]
    fn test_oct2dq_settings_accept_any_options() {
        let xml = "<settings>\
            <oct2dq_coalescing_planarity_threshold>0.5</oct2dq_coalescing_planarity_threshold>\
            </settings>";
        let doc = SettingsDocument::parse("oct2dq_settings.xml", xml).unwrap();
        let settings = Oct2dqSettings::from_document(doc).unwrap();
        assert_eq!(settings.document().len(), 1);
    }
}
