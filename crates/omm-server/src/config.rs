//! Configuration for the OMM provider.
//!
//! Defaults can be overridden via environment variables:
//!
//! - `OMM_BIND_ADDR`        (default: "0.0.0.0")
//! - `OMM_PORT`             (default: "14002")
//! - `OMM_MAX_CLIENTS`      (default: "1024")
//! - `OMM_SERVICE_ID`       (default: "1")
//! - `OMM_SERVICE_NAME`     (default: "DIRECT_FEED")
//! - `OMM_ITEMS`            (default: "TRI.N,IBM.N")
//! - `OMM_FIELD_DICTIONARY` (optional path to an RDMFieldDictionary file)
//! - `OMM_ENUM_DICTIONARY`  (optional path to an enumtype.def file)

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use omm_core::DataDictionary;

/// Provider configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Maximum number of simultaneously connected clients.
    pub max_clients: usize,

    /// Service id stamped on every item key the provider answers with.
    pub service_id: u16,

    pub service_name: String,

    /// Items that exist from startup; others appear when posted to.
    pub items: Vec<String>,

    pub field_dictionary: Option<PathBuf>,
    pub enum_dictionary: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0".to_string(),
            port: 14002,
            max_clients: 1024,
            service_id: 1,
            service_name: "DIRECT_FEED".to_string(),
            items: vec!["TRI.N".to_string(), "IBM.N".to_string()],
            field_dictionary: None,
            enum_dictionary: None,
        }
    }
}

impl Config {
    /// Construct a `Config` from environment variables, falling back
    /// to the defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let bind_addr = env::var("OMM_BIND_ADDR").unwrap_or(defaults.bind_addr);
        let port = read_env_or_default("OMM_PORT", defaults.port)?;
        let max_clients = read_env_or_default("OMM_MAX_CLIENTS", defaults.max_clients)?;
        let service_id = read_env_or_default("OMM_SERVICE_ID", defaults.service_id)?;
        let service_name = env::var("OMM_SERVICE_NAME").unwrap_or(defaults.service_name);
        let items = match env::var("OMM_ITEMS") {
            Ok(list) => parse_item_list(&list),
            Err(_) => defaults.items,
        };
        let field_dictionary = env::var_os("OMM_FIELD_DICTIONARY").map(PathBuf::from);
        let enum_dictionary = env::var_os("OMM_ENUM_DICTIONARY").map(PathBuf::from);

        Ok(Config {
            bind_addr,
            port,
            max_clients,
            service_id,
            service_name,
            items,
            field_dictionary,
            enum_dictionary,
        })
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Load the configured dictionary files, or the embedded one when
    /// neither path is set.
    pub fn load_dictionary(&self) -> Result<DataDictionary> {
        match (&self.field_dictionary, &self.enum_dictionary) {
            (None, None) => DataDictionary::embedded().context("loading embedded dictionary"),
            (Some(field), Some(enums)) => DataDictionary::from_files(field, enums)
                .with_context(|| format!("loading {} / {}", field.display(), enums.display())),
            _ => bail!("OMM_FIELD_DICTIONARY and OMM_ENUM_DICTIONARY must be set together"),
        }
    }
}

fn parse_item_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_env_or_default<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {:?}", key, val)),
        Err(_) => Ok(default),
    }
}
