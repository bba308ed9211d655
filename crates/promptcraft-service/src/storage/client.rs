//! Supabase Storage REST client.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

/// Error type for object storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The storage API returned an error.
    #[error("storage API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

#[derive(Debug, Deserialize)]
struct StorageErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for one storage bucket.
#[derive(Debug, Clone)]
pub struct StorageClient {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl StorageClient {
    /// Create a client for `bucket` on the project at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            bucket: bucket.into(),
        })
    }

    /// The bucket this client writes to.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{path}", self.base_url, self.bucket)
    }

    /// Upload an object. Fails if the path already exists.
    pub async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .client
            .post(self.object_url(path))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;

        Self::check(response).await.map(|_| ())
    }

    /// Remove an object.
    pub async fn remove(&self, path: &str) -> Result<(), StorageError> {
        let response = self
            .client
            .delete(format!("{}/storage/v1/object/{}", self.base_url, self.bucket))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .json(&serde_json::json!({ "prefixes": [path] }))
            .send()
            .await?;

        Self::check(response).await.map(|_| ())
    }

    /// Create a time-limited URL for reading an object.
    pub async fn create_signed_url(
        &self,
        path: &str,
        expires_in_seconds: u64,
    ) -> Result<String, StorageError> {
        let response = self
            .client
            .post(format!(
                "{}/storage/v1/object/sign/{}/{path}",
                self.base_url, self.bucket
            ))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .json(&serde_json::json!({ "expiresIn": expires_in_seconds }))
            .send()
            .await?;

        let body: SignedUrlResponse = Self::check(response).await?.json().await?;
        Ok(format!("{}/storage/v1{}", self.base_url, body.signed_url))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<StorageErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message.or(body.error))
            .unwrap_or_else(|| format!("HTTP {status}"));

        Err(StorageError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> StorageClient {
        StorageClient::new(server.uri(), "service-key", "generated_images").unwrap()
    }

    #[tokio::test]
    async fn upload_refuses_overwrite() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/generated_images/u1/img.png"))
            .and(header("x-upsert", "false"))
            .and(header("content-type", "image/png"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"Key": "k"})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .upload("u1/img.png", vec![0u8; 4], "image/png")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn upload_conflict_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "statusCode": "409", "error": "Duplicate", "message": "The resource already exists"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .upload("u1/img.png", vec![], "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Api { status: 409, .. }));
    }

    #[tokio::test]
    async fn remove_sends_prefixes() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/storage/v1/object/generated_images"))
            .and(body_json(serde_json::json!({"prefixes": ["u1/img.png"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).remove("u1/img.png").await.unwrap();
    }

    #[tokio::test]
    async fn signed_url_is_absolute() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/sign/generated_images/u1/img.png"))
            .and(body_json(serde_json::json!({"expiresIn": 300})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "signedURL": "/object/sign/generated_images/u1/img.png?token=abc"
            })))
            .mount(&server)
            .await;

        let url = client(&server)
            .create_signed_url("u1/img.png", 300)
            .await
            .unwrap();
        assert_eq!(
            url,
            format!(
                "{}/storage/v1/object/sign/generated_images/u1/img.png?token=abc",
                server.uri()
            )
        );
    }
}
