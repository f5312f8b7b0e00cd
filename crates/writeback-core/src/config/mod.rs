//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Environment variable holding the application identifier
pub const APPLICATION_ID_ENV: &str = "WRITEBACK_APPLICATION_ID";

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "WRITEBACK_CONFIG_DIR";

/// Writeback configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub store: StoreConfig,
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Read so a stored identifier can be refused, never written back
    #[serde(default, skip_serializing)]
    pub application_identifier: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub scheme: String,
    pub port: u16,
    pub path_prefix: String,
}

/// Which record field is queried and which edits are staged before the timed save
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub reference_field: String,
    pub customer_note_field: String,
    pub customer_note: String,
    pub internal_note_field: String,
    pub internal_note: String,
    pub freight_field: String,
    pub freight_amount: Decimal,
    pub affirmative_token: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            port: 8650,
            path_prefix: "/api/v1".to_string(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            reference_field: "SalesInvoice.ReferenceNumber".to_string(),
            customer_note_field: "CustomerNote".to_string(),
            customer_note: "Test Customer Note".to_string(),
            internal_note_field: "InternalNote".to_string(),
            internal_note: "Test Internal Note".to_string(),
            freight_field: "FreightAmount".to_string(),
            freight_amount: Decimal::new(19999, 2),
            affirmative_token: "Y".to_string(),
        }
    }
}

impl SessionConfig {
    /// Application identifier from the environment
    ///
    /// An identifier present in the loaded file is refused rather than used.
    pub fn resolved_application_identifier(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var(APPLICATION_ID_ENV)
            .ok()
            .filter(|id| !id.trim().is_empty()))
    }

    pub fn redacted_application_identifier(&self) -> anyhow::Result<Option<String>> {
        self.resolved_application_identifier()
            .map(|opt| opt.map(|id| redact(&id)))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.application_identifier.is_some() {
            return Err(anyhow!(
                "Application identifiers must be provided via {}, not stored in configuration",
                APPLICATION_ID_ENV
            ));
        }
        Ok(())
    }
}

/// Mask all but the last four characters
fn redact(id: &str) -> String {
    match id.char_indices().rev().nth(3) {
        Some((start, _)) if start > 0 => format!("***{}", &id[start..]),
        _ => "***".to_string(),
    }
}

impl StoreConfig {
    /// Gateway base URL for a server name
    pub fn base_url(&self, server: &str) -> String {
        let prefix = self.path_prefix.trim_end_matches('/');
        format!("{}://{}:{}{}", self.scheme, server.trim(), self.port, prefix)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var(CONFIG_DIR_ENV) {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("writeback")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.session.enforce_env_only()?;

        if !matches!(self.store.scheme.as_str(), "http" | "https") {
            return Err(anyhow!(
                "Invalid store scheme: {}. Valid options: http, https",
                self.store.scheme
            ));
        }
        if self.workflow.reference_field.trim().is_empty() {
            return Err(anyhow!("workflow.reference_field must not be empty"));
        }
        if self.workflow.affirmative_token.trim().is_empty() {
            return Err(anyhow!("workflow.affirmative_token must not be empty"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        let w = &self.workflow;
        match key {
            "store.scheme" => Ok(self.store.scheme.clone()),
            "store.port" => Ok(self.store.port.to_string()),
            "store.path_prefix" => Ok(self.store.path_prefix.clone()),

            "workflow.reference_field" => Ok(w.reference_field.clone()),
            "workflow.customer_note_field" => Ok(w.customer_note_field.clone()),
            "workflow.customer_note" => Ok(w.customer_note.clone()),
            "workflow.internal_note_field" => Ok(w.internal_note_field.clone()),
            "workflow.internal_note" => Ok(w.internal_note.clone()),
            "workflow.freight_field" => Ok(w.freight_field.clone()),
            "workflow.freight_amount" => Ok(w.freight_amount.to_string()),
            "workflow.affirmative_token" => Ok(w.affirmative_token.clone()),

            // Credential (special handling - show redacted)
            "session.application_identifier" => {
                match self.session.redacted_application_identifier()? {
                    Some(redacted) => Ok(redacted),
                    None => Ok(format!("(not set - use {} env var)", APPLICATION_ID_ENV)),
                }
            }

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `writeback config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let w = &mut self.workflow;
        match key {
            "store.scheme" => {
                if !matches!(value, "http" | "https") {
                    return Err(anyhow!(
                        "Invalid store scheme: {}. Valid options: http, https",
                        value
                    ));
                }
                self.store.scheme = value.to_string();
            }
            "store.port" => {
                self.store.port = value
                    .parse()
                    .with_context(|| format!("Invalid port value: {}", value))?;
            }
            "store.path_prefix" => {
                self.store.path_prefix = value.to_string();
            }

            "workflow.reference_field" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("Reference field must not be empty"));
                }
                w.reference_field = value.to_string();
            }
            "workflow.customer_note_field" => w.customer_note_field = value.to_string(),
            "workflow.customer_note" => w.customer_note = value.to_string(),
            "workflow.internal_note_field" => w.internal_note_field = value.to_string(),
            "workflow.internal_note" => w.internal_note = value.to_string(),
            "workflow.freight_field" => w.freight_field = value.to_string(),
            "workflow.freight_amount" => {
                let amount: Decimal = value
                    .parse()
                    .with_context(|| format!("Invalid freight_amount value: {}", value))?;
                if amount.is_sign_negative() {
                    return Err(anyhow!("Freight amount must be non-negative"));
                }
                w.freight_amount = amount;
            }
            "workflow.affirmative_token" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("Affirmative token must not be empty"));
                }
                w.affirmative_token = value.trim().to_string();
            }

            // Credential cannot be set via config
            "session.application_identifier" => {
                return Err(anyhow!(
                    "Application identifiers cannot be stored in configuration. \
                     Set the {} environment variable instead.",
                    APPLICATION_ID_ENV
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `writeback config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "session.application_identifier",
            "store.scheme",
            "store.port",
            "store.path_prefix",
            "workflow.reference_field",
            "workflow.customer_note_field",
            "workflow.customer_note",
            "workflow.internal_note_field",
            "workflow.internal_note",
            "workflow.freight_field",
            "workflow.freight_amount",
            "workflow.affirmative_token",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
