//! Lantern Settings
//!
//! Session-wide and per-language configuration.

pub mod settings;

pub use settings::{LanguageBackend, LanguageSettings, Settings, TimeoutSettings};
