//! Remote HTTP embedding backend
//!
//! Talks to an OpenAI-compatible embeddings endpoint with a caller-supplied
//! credential. The HTTP client is built lazily on first use and memoized
//! for the process lifetime; a failed build resets the memo so a later call
//! can retry. Like every backend, generation fails closed to the zero
//! sentinel.

use std::time::Duration;

use parking_lot::Mutex;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::error::{Result, StashError};
use crate::search::embeddings::{Embedder, truncate_chars};
use crate::search::similarity::l2_normalize;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote embedding API client
pub struct ApiEmbedder {
    endpoint: String,
    model: String,
    api_key: String,
    dims: usize,
    max_chars: usize,
    client: Mutex<Option<Client>>,
}

impl ApiEmbedder {
    /// Build from config; requires an endpoint and a credential.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = config.api_url.trim().to_string();
        if endpoint.is_empty() {
            return Err(StashError::MissingConfig(
                "embedding.api_url is required for the api backend".to_string(),
            ));
        }
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                StashError::MissingConfig(
                    "embedding.api_key is required for the api backend".to_string(),
                )
            })?;

        Ok(Self {
            endpoint,
            model: config.api_model.clone(),
            api_key,
            dims: config.dims,
            max_chars: config.max_chars,
            client: Mutex::new(None),
        })
    }

    /// Lazily build and memoize the HTTP client.
    fn ensure_client(&self) -> Result<Client> {
        let mut guard = self.client.lock();
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|err| StashError::Config(format!("invalid api key: {err}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|err| StashError::Http(format!("build http client: {err}")))?;

        *guard = Some(client.clone());
        Ok(client)
    }

    fn request_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let client = self.ensure_client()?;

        let request = EmbeddingRequest {
            model: &self.model,
            input: [text],
        };
        let response = client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|err| StashError::Http(format!("embedding request: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StashError::Http(format!(
                "embedding endpoint returned {status}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .map_err(|err| StashError::Http(format!("parse embedding response: {err}")))?;
        let entry = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| StashError::Http("embedding response carried no data".to_string()))?;

        if entry.embedding.len() != self.dims {
            return Err(StashError::Backend(format!(
                "embedding dims mismatch: expected {}, got {}",
                self.dims,
                entry.embedding.len()
            )));
        }

        let mut vector = entry.embedding;
        l2_normalize(&mut vector);
        Ok(vector)
    }
}

impl Embedder for ApiEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let text = truncate_chars(text, self.max_chars);
        if text.trim().is_empty() {
            tracing::debug!("empty input, returning sentinel");
            return vec![0.0; self.dims];
        }

        match self.request_embedding(text) {
            Ok(vector) => vector,
            Err(err) => {
                tracing::warn!(error = %err, "embedding generation failed, returning sentinel");
                // Drop the memoized client so a later call rebuilds it
                *self.client.lock() = None;
                vec![0.0; self.dims]
            }
        }
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &'static str {
        "api"
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn api_config(url: String, dims: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            backend: "api".to_string(),
            dims,
            max_chars: 512,
            api_url: url,
            api_model: "test-model".to_string(),
            api_key: Some("secret".to_string()),
        }
    }

    #[test]
    fn test_from_config_requires_endpoint_and_key() {
        let mut config = api_config(String::new(), 4);
        assert!(ApiEmbedder::from_config(&config).is_err());

        config.api_url = "https://embed.example.com/v1/embeddings".to_string();
        config.api_key = None;
        assert!(ApiEmbedder::from_config(&config).is_err());

        config.api_key = Some("secret".to_string());
        assert!(ApiEmbedder::from_config(&config).is_ok());
    }

    #[test]
    fn test_embed_returns_normalized_vector() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .header("authorization", "Bearer secret")
                .json_body_partial(r#"{"model": "test-model"}"#);
            then.status(200)
                .json_body(serde_json::json!({"data": [{"embedding": [3.0, 4.0, 0.0, 0.0]}]}));
        });

        let embedder = ApiEmbedder::from_config(&api_config(server.url("/"), 4)).unwrap();
        let vector = embedder.embed("machine learning");

        mock.assert();
        assert_eq!(vector.len(), 4);
        assert!((vector[0] - 0.6).abs() < 1e-6);
        assert!((vector[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_auth_failure_returns_sentinel() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(401);
        });

        let embedder = ApiEmbedder::from_config(&api_config(server.url("/"), 4)).unwrap();
        assert_eq!(embedder.embed("anything"), vec![0.0; 4]);
    }

    #[test]
    fn test_malformed_body_returns_sentinel() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200).body("not json");
        });

        let embedder = ApiEmbedder::from_config(&api_config(server.url("/"), 4)).unwrap();
        assert_eq!(embedder.embed("anything"), vec![0.0; 4]);
    }

    #[test]
    fn test_dims_mismatch_returns_sentinel() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200)
                .json_body(serde_json::json!({"data": [{"embedding": [1.0, 2.0]}]}));
        });

        let embedder = ApiEmbedder::from_config(&api_config(server.url("/"), 4)).unwrap();
        assert_eq!(embedder.embed("anything"), vec![0.0; 4]);
    }

    #[test]
    fn test_recovers_after_failure() {
        let server = MockServer::start();
        let mut failing = server.mock(|when, then| {
            when.method(POST);
            then.status(500);
        });

        let embedder = ApiEmbedder::from_config(&api_config(server.url("/"), 4)).unwrap();
        assert_eq!(embedder.embed("first"), vec![0.0; 4]);
        failing.delete();

        server.mock(|when, then| {
            when.method(POST);
            then.status(200)
                .json_body(serde_json::json!({"data": [{"embedding": [1.0, 0.0, 0.0, 0.0]}]}));
        });

        let vector = embedder.embed("second");
        assert!((vector[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_input_short_circuits() {
        // No server: an empty input must not attempt a request
        let embedder =
            ApiEmbedder::from_config(&api_config("http://127.0.0.1:9/none".to_string(), 4))
                .unwrap();
        assert_eq!(embedder.embed("   "), vec![0.0; 4]);
    }
}
