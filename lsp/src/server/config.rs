use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use qls_core::settings::DEFAULT_LOCALE;
use serde::Deserialize;
use tower_lsp::lsp_types::{ConfigurationItem, MessageType};
use tracing::{info, warn};

use super::state::QlsLanguageServer;
use crate::analyzer::{AnalysisSettings, EnvironmentProvider, EnvironmentSymbol, Library};

pub(crate) const CONFIG_SECTION: &str = "qls.lsp";

/// Effective server configuration, rebuilt whenever the client's settings
/// change.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub locale: String,
    pub library_path: Option<PathBuf>,
    pub library: Arc<Library>,
    pub environment: Vec<EnvironmentSymbol>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            library_path: None,
            library: Arc::new(Library::default()),
            environment: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct QlsLspConfigSection {
    #[serde(default)]
    locale: Option<String>,
    #[serde(default)]
    library_path: Option<PathBuf>,
    #[serde(default)]
    environment: EnvironmentConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct EnvironmentConfig {
    #[serde(default)]
    symbols: Vec<EnvironmentSymbol>,
}

impl ServerConfig {
    /// Build from the `qls.lsp` section; `null` means "all defaults".
    /// Fails when the section is malformed or the library file cannot be
    /// loaded.
    pub fn from_value(value: serde_json::Value) -> anyhow::Result<Self> {
        let section: QlsLspConfigSection = if value.is_null() {
            QlsLspConfigSection::default()
        } else {
            serde_json::from_value(value).with_context(|| format!("invalid `{}` settings", CONFIG_SECTION))?
        };

        let library = match &section.library_path {
            Some(path) => {
                let library = Library::from_path(path)?;
                if library.is_empty() {
                    warn!(path = %path.display(), "library file defines no symbols");
                }
                library
            }
            None => Library::default(),
        };

        Ok(Self {
            locale: section.locale.unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            library_path: section.library_path,
            library: Arc::new(library),
            environment: section.environment.symbols,
        })
    }

    pub fn analysis_settings(&self) -> AnalysisSettings {
        let settings = AnalysisSettings::for_library(self.library.clone()).with_locale(self.locale.clone());
        if self.environment.is_empty() {
            settings
        } else {
            settings.with_environment(EnvironmentProvider::new(self.environment.clone()))
        }
    }
}

impl QlsLanguageServer {
    pub(crate) async fn load_config(&self) {
        let items = vec![ConfigurationItem {
            scope_uri: None,
            section: Some(CONFIG_SECTION.to_string()),
        }];

        let value = match self.client.configuration(items).await {
            Ok(values) => values.into_iter().next().unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "client did not answer workspace/configuration");
                return;
            }
        };

        match ServerConfig::from_value(value) {
            Ok(config) => {
                info!(
                    locale = %config.locale,
                    library = config.library.len(),
                    environment = config.environment.len(),
                    "configuration loaded"
                );
                if let Ok(mut guard) = self.config.lock() {
                    *guard = config;
                }
                // Inspections embed library types, so nothing cached survives
                self.cache_reset();
            }
            Err(err) => {
                warn!(error = ?err, "keeping previous configuration");
                self.client
                    .log_message(MessageType::WARNING, format!("qls: {err:#}"))
                    .await;
            }
        }
    }
}
