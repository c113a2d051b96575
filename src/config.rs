use std::{fmt, path::{Path, PathBuf}, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::StudioError;
use crate::providers::{GeminiTransport, ImageTransport, MockTransport, GEMINI_BASE_URL};
use crate::settings::StudioSettings;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_API_KEY_ENV: &str = "API_KEY";
pub const DEFAULT_COUNT: usize = 4;

/// API credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    Mock,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCfg {
    #[serde(default)]
    pub kind: ProviderKind,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl ProviderCfg {
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV)
    }

    pub fn build_transport(&self) -> Result<Arc<dyn ImageTransport>, StudioError> {
        Ok(match self.kind {
            ProviderKind::Gemini => {
                let base = self.base_url.as_deref().unwrap_or(GEMINI_BASE_URL);
                let timeout = Duration::from_secs(self.timeout_secs.unwrap_or(120));
                Arc::new(GeminiTransport::new(base, timeout)?)
            }
            ProviderKind::Mock => Arc::new(MockTransport),
        })
    }
}

/// Read-only client configuration handed to the orchestrator at construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: Option<ApiKey>,
    /// Where the key was expected to come from; reported when it is missing.
    pub api_key_env: String,
    pub model: String,
}

impl ClientConfig {
    pub fn new(api_key: Option<ApiKey>, model: impl Into<String>) -> Self {
        Self { api_key, api_key_env: DEFAULT_API_KEY_ENV.into(), model: model.into() }
    }

    /// Resolve the credential from the process environment. A missing or
    /// blank variable leaves `api_key` empty; the orchestrator rejects the
    /// batch before dispatching anything. The mock provider needs no key.
    pub fn from_env(cfg: &ProviderCfg) -> Self {
        let env = cfg.api_key_env().to_string();
        let api_key = match cfg.kind {
            ProviderKind::Mock => Some(ApiKey::new("offline")),
            ProviderKind::Gemini => std::env::var(&env).ok().filter(|v| !v.trim().is_empty()).map(ApiKey::new),
        };
        Self { api_key, api_key_env: env, model: cfg.model().to_string() }
    }

    pub fn require_key(&self) -> Result<&ApiKey, StudioError> {
        self.api_key
            .as_ref()
            .ok_or_else(|| StudioError::MissingCredential { env: self.api_key_env.clone() })
    }
}

fn default_count() -> usize {
    DEFAULT_COUNT
}

/// Run configuration loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioCfg {
    #[serde(default)]
    pub provider: ProviderCfg,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
    #[serde(default)]
    pub settings: StudioSettings,
}

impl Default for StudioCfg {
    fn default() -> Self {
        Self { provider: ProviderCfg::default(), count: DEFAULT_COUNT, out_dir: None, settings: StudioSettings::default() }
    }
}

impl StudioCfg {
    pub async fn load(path: &Path) -> Result<Self, StudioError> {
        let txt = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StudioError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_yaml(&txt)
    }

    pub fn from_yaml(txt: &str) -> Result<Self, StudioError> {
        serde_yaml::from_str(txt).map_err(|e| StudioError::Config(format!("failed to parse config YAML: {e}")))
    }
}
