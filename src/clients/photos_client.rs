//! Cliente HTTP para la API upstream de fotos
//!
//! El upstream es un tercero no confiable y posiblemente lento: toda petición
//! lleva timeout, los códigos no-2xx son errores y el cuerpo se devuelve tal
//! cual llegó, sin re-serializar.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

/// Fallos del upstream. Su detalle sólo va a los logs, nunca al cliente.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream network error: {0}")]
    Network(String),

    #[error("upstream responded with status {0}")]
    Status(u16),

    #[error("upstream body is not valid JSON: {0}")]
    InvalidBody(String),
}

impl UpstreamError {
    /// Etiqueta corta para métricas
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Timeout => "timeout",
            UpstreamError::Network(_) => "network",
            UpstreamError::Status(_) => "status",
            UpstreamError::InvalidBody(_) => "invalid_body",
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Network(err.to_string())
        }
    }
}

/// Un payload es válido si es JSON o si está vacío
pub fn is_valid_payload(body: &str) -> bool {
    body.is_empty() || serde_json::from_str::<serde::de::IgnoredAny>(body).is_ok()
}

/// Fuente de verdad de las fotos
#[async_trait]
pub trait PhotoSource: Send + Sync {
    async fn fetch_collection(&self) -> Result<String, UpstreamError>;

    async fn fetch_item(&self, id: &str) -> Result<String, UpstreamError>;
}

/// Configuración del upstream
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct HttpPhotosClient {
    client: Client,
    base_url: String,
}

impl HttpPhotosClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(Duration::from_secs(5)))
            .user_agent(concat!("photo-cache-proxy/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn collection_url(&self) -> String {
        format!("{}/photos", self.base_url)
    }

    /// El identificador viaja como un único segmento de path
    pub fn item_url(&self, id: &str) -> String {
        format!("{}/photos/{}", self.base_url, urlencoding::encode(id))
    }

    async fn fetch(&self, url: &str) -> Result<String, UpstreamError> {
        log::debug!("🌐 GET {}", url);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            log::error!("❌ Upstream respondió {} para {}", status, url);
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        if !is_valid_payload(&body) {
            log::error!("❌ Upstream devolvió un cuerpo que no es JSON para {}", url);
            return Err(UpstreamError::InvalidBody(format!("{} bytes", body.len())));
        }

        log::debug!("📄 Upstream {} -> {} bytes", url, body.len());
        Ok(body)
    }
}

#[async_trait]
impl PhotoSource for HttpPhotosClient {
    async fn fetch_collection(&self) -> Result<String, UpstreamError> {
        self.fetch(&self.collection_url()).await
    }

    async fn fetch_item(&self, id: &str) -> Result<String, UpstreamError> {
        self.fetch(&self.item_url(id)).await
    }
}
