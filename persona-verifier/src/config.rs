//! Configuration for the verifier service

use std::fs;

use anyhow::{Context, Result};
use persona_core::discovery::ShimTable;

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP port to listen on
    pub port: u16,
    /// This host's name (the locally served identity provider)
    pub hostname: String,
    /// Fallback authority trusted for any email domain
    pub master_idp: Option<String>,
    /// Directory holding the local key pair
    pub key_dir: String,
    /// Key pair name within the directory
    pub key_name: String,
    /// Preloaded well-known documents, `<domain>|<origin>|<path-to-body>`
    pub shim_entries: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 10002,
            hostname: "localhost".to_string(),
            master_idp: None,
            key_dir: "var".to_string(),
            key_name: "root".to_string(),
            shim_entries: Vec::new(),
        }
    }
}

impl Config {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let port = std::env::var("PERSONA_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let hostname =
            std::env::var("PERSONA_HOSTNAME").unwrap_or(defaults.hostname);

        let master_idp = std::env::var("PERSONA_MASTER_IDP").ok();

        let key_dir = std::env::var("PERSONA_KEY_DIR").unwrap_or(defaults.key_dir);
        let key_name = std::env::var("PERSONA_KEY_NAME").unwrap_or(defaults.key_name);

        let shim_entries = std::env::var("PERSONA_SHIM")
            .map(|s| {
                s.split(',')
                    .map(str::to_string)
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            port,
            hostname,
            master_idp,
            key_dir,
            key_name,
            shim_entries,
        }
    }

    /// Parse the shim entries and preload their document bodies from disk.
    /// Each entry has exactly three `|`-separated fields; the body file is
    /// read once here and never consulted again.
    pub fn load_shim_table(&self) -> Result<ShimTable> {
        let mut table = ShimTable::new();
        for entry in &self.shim_entries {
            let fields: Vec<&str> = entry.split('|').collect();
            if fields.len() != 3 {
                anyhow::bail!(
                    "malformed shim entry (want domain|origin|path): {}",
                    entry
                );
            }
            let body = fs::read_to_string(fields[2])
                .with_context(|| format!("failed to read shim document {}", fields[2]))?;
            table.insert(fields[0], fields[1], body);
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn shim_entries_load_their_bodies() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"authority":"idp.example"}}"#).unwrap();

        let config = Config {
            shim_entries: vec![format!(
                "mail.example|http://localhost:10002|{}",
                file.path().display()
            )],
            ..Default::default()
        };

        config.load_shim_table().unwrap();
    }

    #[test]
    fn malformed_shim_entry_rejected() {
        let config = Config {
            shim_entries: vec!["mail.example|onlytwofields".to_string()],
            ..Default::default()
        };
        assert!(config.load_shim_table().is_err());
    }

    #[test]
    fn missing_shim_body_rejected() {
        let config = Config {
            shim_entries: vec!["mail.example|http://localhost|/no/such/file".to_string()],
            ..Default::default()
        };
        assert!(config.load_shim_table().is_err());
    }
}
