//! Configuração do ironwright carregada a partir de `ironwright.toml`.
//!
//! A struct [`IronwrightConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `IRONIC_*` têm precedência sobre o arquivo.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::ironic::{Auth, BusyRetry, IsoBuilder, Microversion};
use crate::workflow::WorkflowOptions;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "ironwright.toml";

/// Estratégia de autenticação contra a API do Ironic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum AuthStrategy {
    #[default]
    #[serde(rename = "noauth")]
    NoAuth,
    #[serde(rename = "http_basic")]
    HttpBasic,
}

impl FromStr for AuthStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "noauth" => Ok(AuthStrategy::NoAuth),
            "http_basic" => Ok(AuthStrategy::HttpBasic),
            other => bail!("unknown auth strategy '{other}' (expected noauth or http_basic)"),
        }
    }
}

/// Configuração de nível superior carregada de `ironwright.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct IronwrightConfig {
    /// URL base da API do Ironic, ex.: `http://ironic:6385`.
    #[serde(default)]
    pub endpoint: String,

    /// Microversão da API enviada em cada requisição.
    #[serde(default = "default_microversion")]
    pub microversion: String,

    #[serde(default)]
    pub auth_strategy: AuthStrategy,

    #[serde(default)]
    pub http_basic_username: String,

    #[serde(default)]
    pub http_basic_password: String,

    /// Intervalos e limites do workflow.
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Backoff quando o Ironic responde 409 (nó bloqueado).
    #[serde(default)]
    pub busy_retry: BusyRetry,

    /// Programa que gera a ISO do config drive para APIs anteriores à 1.56.
    #[serde(default = "default_iso_tool")]
    pub iso_tool: String,
}

/// Seção `[workflow]` do arquivo de configuração.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Usado depois que um deploy é solicitado.
    #[serde(default = "default_deploy_poll_interval_secs")]
    pub deploy_poll_interval_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Quantas vezes um nó em estado de falha pode ser recuperado.
    #[serde(default = "default_recovery_retries")]
    pub recovery_retries: u32,
}

// Valor padrão para a microversão: "1.99".
fn default_microversion() -> String {
    "1.99".to_string()
}

fn default_iso_tool() -> String {
    "mkisofs".to_string()
}

fn default_poll_interval_secs() -> u64 {
    15
}

fn default_deploy_poll_interval_secs() -> u64 {
    30
}

// 30 minutos.
fn default_timeout_secs() -> u64 {
    1800
}

fn default_max_attempts() -> u32 {
    1000
}

fn default_recovery_retries() -> u32 {
    3
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            deploy_poll_interval_secs: default_deploy_poll_interval_secs(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            recovery_retries: default_recovery_retries(),
        }
    }
}

impl Default for IronwrightConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            microversion: default_microversion(),
            auth_strategy: AuthStrategy::default(),
            http_basic_username: String::new(),
            http_basic_password: String::new(),
            workflow: WorkflowConfig::default(),
            busy_retry: BusyRetry::default(),
            iso_tool: default_iso_tool(),
        }
    }
}

impl IronwrightConfig {
    /// Carrega a configuração de `ironwright.toml` no diretório atual e
    /// aplica as variáveis de ambiente.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega de `path`; usa valores padrão se o arquivo não existir.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<IronwrightConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Variáveis de ambiente têm precedência sobre o arquivo. Valores vazios
    /// são ignorados.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(endpoint) = var("IRONIC_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(microversion) = var("IRONIC_MICROVERSION") {
            self.microversion = microversion;
        }
        if let Some(strategy) = var("IRONIC_AUTH_STRATEGY") {
            self.auth_strategy = strategy.parse()?;
        }
        if let Some(username) = var("IRONIC_HTTP_BASIC_USERNAME") {
            self.http_basic_username = username;
        }
        if let Some(password) = var("IRONIC_HTTP_BASIC_PASSWORD") {
            self.http_basic_password = password;
        }
        if let Some(tool) = var("IRONWRIGHT_ISO_TOOL") {
            self.iso_tool = tool;
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Result<&str> {
        if self.endpoint.is_empty() {
            bail!("no Ironic endpoint configured; set IRONIC_ENDPOINT or `endpoint` in {CONFIG_FILE}");
        }
        Ok(&self.endpoint)
    }

    pub fn microversion(&self) -> Result<Microversion> {
        Ok(self.microversion.parse()?)
    }

    pub fn auth(&self) -> Result<Auth> {
        match self.auth_strategy {
            AuthStrategy::NoAuth => Ok(Auth::NoAuth),
            AuthStrategy::HttpBasic => {
                if self.http_basic_username.is_empty() || self.http_basic_password.is_empty() {
                    bail!(
                        "http_basic auth requires IRONIC_HTTP_BASIC_USERNAME and IRONIC_HTTP_BASIC_PASSWORD"
                    );
                }
                Ok(Auth::HttpBasic {
                    username: self.http_basic_username.clone(),
                    password: self.http_basic_password.clone(),
                })
            }
        }
    }

    pub fn iso_builder(&self) -> IsoBuilder {
        IsoBuilder::new(&self.iso_tool)
    }

    pub fn workflow_options(&self) -> WorkflowOptions {
        let w = &self.workflow;
        WorkflowOptions {
            poll_interval: Duration::from_secs(w.poll_interval_secs),
            deploy_poll_interval: Duration::from_secs(w.deploy_poll_interval_secs),
            timeout: Duration::from_secs(w.timeout_secs),
            max_attempts: w.max_attempts,
            recovery_retries: w.recovery_retries,
        }
    }
}
