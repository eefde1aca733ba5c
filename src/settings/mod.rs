//! Stage settings files.

mod document;
mod families;

pub use document::{SettingsDocument, SettingsError, SETTINGS_ROOT};
pub use families::{ChunkerSettings, Oct2dqSettings};
