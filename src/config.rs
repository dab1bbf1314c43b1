//! Configuração do Spoder, opcionalmente carregada de `spoder.toml`.
//!
//! A struct [`SpoderConfig`] contém todas as constantes do processo: tamanho
//! de lote, orçamentos de retentativa, intervalo de polling e endereços remotos.
//! Valores ausentes no arquivo usam os defaults. A variável de ambiente
//! `SPODER_ACCESS_TOKEN` tem precedência sobre o arquivo para o token.

use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use crate::spotify::client::COLLECTION_URL;
use crate::spotify::source::SOURCE_URL;
use crate::store::StoreKeys;

/// Nome da variável de ambiente com um token de acesso salvo.
pub const TOKEN_ENV: &str = "SPODER_ACCESS_TOKEN";

/// Configuração de nível superior.
#[derive(Debug, Clone, Deserialize)]
pub struct SpoderConfig {
    /// Endereço da lista de artistas (`nome,id` por linha).
    #[serde(default = "default_source_url")]
    pub source_url: String,

    /// Endpoint de escrita da coleção.
    #[serde(default = "default_collection_url")]
    pub collection_url: String,

    /// Nome do conjunto onde os artistas são adicionados.
    #[serde(default = "default_collection_set")]
    pub collection_set: String,

    /// Prefixo que transforma um id em URI de item.
    #[serde(default = "default_item_uri_prefix")]
    pub item_uri_prefix: String,

    /// Máximo de artistas por requisição.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Retentativas para baixar a lista de artistas.
    #[serde(default)]
    pub source_retry: RetryPolicy,

    /// Retentativas para cada lote enviado.
    #[serde(default)]
    pub submit_retry: RetryPolicy,

    /// Intervalo entre verificações da credencial, em milissegundos.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Número máximo de verificações antes de desistir.
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,

    /// Pausa mínima entre lotes, em milissegundos.
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,

    /// Jitter máximo somado à pausa entre lotes.
    #[serde(default = "default_batch_pause_jitter_ms")]
    pub batch_pause_jitter_ms: u64,

    /// Chaves usadas no armazenamento local.
    #[serde(default)]
    pub store: StoreKeys,

    /// Token de acesso a gravar no armazenamento antes da busca.
    #[serde(default)]
    pub access_token: Option<String>,
}

fn default_source_url() -> String {
    SOURCE_URL.to_string()
}

fn default_collection_url() -> String {
    COLLECTION_URL.to_string()
}

fn default_collection_set() -> String {
    "artistban".to_string()
}

fn default_item_uri_prefix() -> String {
    "spotify:artist:".to_string()
}

// Valor padrão do lote: 20 artistas.
fn default_batch_size() -> usize {
    20
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_poll_max_attempts() -> u32 {
    15
}

fn default_batch_pause_ms() -> u64 {
    300
}

fn default_batch_pause_jitter_ms() -> u64 {
    300
}

impl Default for SpoderConfig {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            collection_url: default_collection_url(),
            collection_set: default_collection_set(),
            item_uri_prefix: default_item_uri_prefix(),
            batch_size: default_batch_size(),
            source_retry: RetryPolicy::default(),
            submit_retry: RetryPolicy::default(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_max_attempts: default_poll_max_attempts(),
            batch_pause_ms: default_batch_pause_ms(),
            batch_pause_jitter_ms: default_batch_pause_jitter_ms(),
            store: StoreKeys::default(),
            access_token: None,
        }
    }
}

impl SpoderConfig {
    /// Carrega a configuração do arquivo indicado, ou os defaults se ele não existir.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<SpoderConfig>(&contents)?
        } else {
            Self::default()
        };

        config.apply_token_override(std::env::var(TOKEN_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Token vindo do ambiente substitui o do arquivo, se não for vazio.
    pub fn apply_token_override(&mut self, token: Option<String>) {
        if let Some(token) = token
            && !token.trim().is_empty()
        {
            self.access_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.poll_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "poll_max_attempts must be at least 1".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
