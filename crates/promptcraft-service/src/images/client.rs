//! `OpenAI` Images API client.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Error type for image generation.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned an error.
    #[error("image API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// The API answered without an image URL.
    #[error("image API returned no image URL")]
    MissingUrl,
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Image bytes fetched from a temporary URL.
#[derive(Debug, Clone)]
pub struct DownloadedImage {
    /// Raw image data.
    pub bytes: Vec<u8>,
    /// `Content-Type` reported by the host.
    pub content_type: Option<String>,
}

/// `OpenAI` Images API client.
///
/// Generation calls get their own timeout; everything else uses the client
/// default.
#[derive(Debug, Clone)]
pub struct ImageClient {
    client: Client,
    api_key: String,
    base_url: String,
    generation_timeout: Duration,
}

impl ImageClient {
    /// `OpenAI` API base URL.
    pub const BASE_URL: &'static str = "https://api.openai.com";

    /// Default timeout for a generation call.
    pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(50);

    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ImageError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: Self::BASE_URL.to_string(),
            generation_timeout: Self::DEFAULT_GENERATION_TIMEOUT,
        })
    }

    /// Point the client at a different API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the timeout for generation calls.
    #[must_use]
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Generate one image and return its temporary URL.
    pub async fn generate(&self, prompt: &str, model: &str, size: &str) -> Result<String, ImageError> {
        let request = GenerationRequest {
            model,
            prompt,
            n: 1,
            size,
            response_format: "url",
        };

        tracing::debug!(model = %model, size = %size, "Requesting image generation");

        let response = self
            .client
            .post(format!("{}/v1/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.generation_timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorResponse>().await {
                Ok(body) => body.error.message,
                Err(_) => format!("HTTP {status}"),
            };
            return Err(ImageError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerationResponse = response.json().await?;
        body.data
            .into_iter()
            .next()
            .and_then(|image| image.url)
            .ok_or(ImageError::MissingUrl)
    }

    /// Download a generated image from its temporary URL.
    pub async fn download(&self, url: &str) -> Result<DownloadedImage, ImageError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Api {
                status: status.as_u16(),
                message: "failed to download generated image".into(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = response.bytes().await?.to_vec();

        Ok(DownloadedImage {
            bytes,
            content_type,
        })
    }
}
