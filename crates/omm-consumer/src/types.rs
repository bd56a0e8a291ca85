// crates/omm-consumer/src/types.rs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the consumer, read from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub server_addr: String,
    pub service_id: u16,
    /// Local dictionary files. When unset the dictionary is downloaded
    /// from the provider.
    pub field_dictionary: Option<PathBuf>,
    pub enum_dictionary: Option<PathBuf>,
    pub login_name: String,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:14002".to_string(),
            service_id: 1,
            field_dictionary: None,
            enum_dictionary: None,
            login_name: "omm-consumer".to_string(),
        }
    }
}

impl ConsumerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Both dictionary paths, when both are configured.
    pub fn dictionary_files(&self) -> Option<(&Path, &Path)> {
        match (&self.field_dictionary, &self.enum_dictionary) {
            (Some(field), Some(enums)) => Some((field.as_path(), enums.as_path())),
            _ => None,
        }
    }
}

/// How received messages are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Indented, XML-like rendering.
    Text,
    /// One JSON object per message.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_config_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server_addr = \"10.0.0.5:14002\"").unwrap();
        writeln!(file, "login_name = \"alice\"").unwrap();

        let config = ConsumerConfig::load(file.path()).unwrap();
        assert_eq!(config.server_addr, "10.0.0.5:14002");
        assert_eq!(config.login_name, "alice");
        assert_eq!(config.service_id, 1);
        assert!(config.dictionary_files().is_none());
    }

    #[test]
    fn dictionary_paths_need_both_files() {
        let config: ConsumerConfig = toml::from_str(
            "field_dictionary = \"/etc/RDMFieldDictionary\"\nenum_dictionary = \"/etc/enumtype.def\"",
        )
        .unwrap();
        let (field, enums) = config.dictionary_files().unwrap();
        assert_eq!(field, Path::new("/etc/RDMFieldDictionary"));
        assert_eq!(enums, Path::new("/etc/enumtype.def"));

        let half: ConsumerConfig = toml::from_str("enum_dictionary = \"x\"").unwrap();
        assert!(half.dictionary_files().is_none());
    }

    #[test]
    fn bad_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "service_id = \"one\"").unwrap();
        assert!(ConsumerConfig::load(file.path()).is_err());
    }
}
