//! OpenAI-compatible HTTP provider client.
//!
//! One reqwest-backed client serves every supported credential type; the
//! constructors differ only in default endpoint and auth headers. OpenRouter
//! credentials additionally send the site-attribution headers
//! (`HTTP-Referer` / `X-Title`) when the credential carries them.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use std::pin::Pin;
use url::Url;

use super::{ChunkStream, GenerateChunk, GenerateRequest, GenerateResponse, ProviderClient};
use crate::errors::{Error, Result};
use crate::store::models::Credential;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// How much of an upstream error body is carried into the error message.
const ERROR_BODY_LIMIT: usize = 512;

pub struct HttpProviderClient {
    http: reqwest::Client,
    base_url: Url,
    headers: HeaderMap,
}

impl HttpProviderClient {
    fn new(http: reqwest::Client, base_url: Url, headers: HeaderMap) -> Self {
        Self { http, base_url, headers }
    }

    /// Client for an OpenRouter credential, with site attribution headers.
    pub fn open_router(http: reqwest::Client, credential: &Credential) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer_value(&credential.api_key)?);
        if let Some(site_url) = &credential.site_url {
            headers.insert("http-referer", header_value(site_url)?);
        }
        if let Some(site_name) = &credential.site_name {
            headers.insert("x-title", header_value(site_name)?);
        }
        Ok(Self::new(http, base_url_for(credential)?, headers))
    }

    /// Client for an OpenAI credential.
    pub fn open_ai(http: reqwest::Client, credential: &Credential) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer_value(&credential.api_key)?);
        Ok(Self::new(http, base_url_for(credential)?, headers))
    }

    /// Client for an Anthropic credential (`x-api-key` auth, pinned API version).
    pub fn anthropic(http: reqwest::Client, credential: &Credential) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", sensitive_header_value(&credential.api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        Ok(Self::new(http, base_url_for(credential)?, headers))
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.as_str().trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl ProviderClient for HttpProviderClient {
    async fn generate(&self, mut request: GenerateRequest) -> Result<GenerateResponse> {
        request.stream = false;

        let response = self
            .http
            .post(self.completions_url())
            .headers(self.headers.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: Some(status.as_u16()),
                message: truncate(&body),
            });
        }

        Ok(response.json::<GenerateResponse>().await?)
    }

    async fn generate_stream(&self, mut request: GenerateRequest) -> Result<ChunkStream> {
        request.stream = true;

        let response = self
            .http
            .post(self.completions_url())
            .headers(self.headers.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: Some(status.as_u16()),
                message: truncate(&body),
            });
        }

        Ok(sse_stream(response.bytes_stream()))
    }
}

fn base_url_for(credential: &Credential) -> Result<Url> {
    match &credential.base_url {
        Some(url) => Ok(url.clone()),
        None => Url::parse(credential.kind.default_base_url()).map_err(|e| Error::Internal {
            operation: format!("parse default base URL for {}: {e}", credential.kind),
        }),
    }
}

fn bearer_value(api_key: &str) -> Result<HeaderValue> {
    sensitive_header_value(&format!("Bearer {api_key}"))
}

fn sensitive_header_value(value: &str) -> Result<HeaderValue> {
    let mut value = header_value(value)?;
    value.set_sensitive(true);
    Ok(value)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| Error::BadRequest {
        message: "credential contains characters that are not valid in an HTTP header".to_string(),
    })
}

fn truncate(body: &str) -> String {
    if body.len() <= ERROR_BODY_LIMIT {
        body.to_string()
    } else {
        let mut end = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body[..end].to_string()
    }
}

/// Parse a `text/event-stream` body into [`GenerateChunk`]s.
///
/// Each event's first `data:` line is taken; `[DONE]` terminates the stream
/// and non-JSON data lines (comments, keepalives) are skipped.
fn sse_stream(body: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static) -> ChunkStream {
    let body: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>> = Box::pin(body);

    let stream = futures::stream::unfold((body, String::new(), false), |(mut body, mut buffer, done)| async move {
        if done {
            return None;
        }
        loop {
            // Emit the next complete event already sitting in the buffer
            if let Some(boundary) = buffer.find("\n\n") {
                let raw_event: String = buffer.drain(..boundary + 2).collect();
                let Some(data) = extract_data_line(&raw_event) else {
                    continue;
                };
                if data == "[DONE]" {
                    return None;
                }
                match serde_json::from_str::<serde_json::Value>(&data) {
                    Ok(value) => return Some((Ok(GenerateChunk { data: value }), (body, buffer, false))),
                    Err(_) => continue,
                }
            }

            match body.next().await {
                Some(Ok(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes).replace('\r', ""));
                }
                Some(Err(err)) => return Some((Err(Error::from(err)), (body, buffer, true))),
                None => return None,
            }
        }
    });

    Box::pin(stream)
}

fn extract_data_line(raw_event: &str) -> Option<String> {
    for line in raw_event.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            return Some(data.trim_start().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CredentialKind;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential(kind: CredentialKind, base_url: &str) -> Credential {
        let now = Utc::now();
        Credential {
            id: Uuid::new_v4(),
            name: "test".to_string(),
            kind,
            api_key: "sk-test-key".to_string(),
            base_url: Some(Url::parse(base_url).unwrap()),
            site_url: Some("https://gate.example.com".to_string()),
            site_name: Some("Gate".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    fn request(model: &str) -> GenerateRequest {
        GenerateRequest {
            model: model.to_string(),
            messages: vec![crate::providers::ChatMessage {
                role: "user".to_string(),
                content: json!("hello"),
            }],
            max_tokens: None,
            temperature: None,
            stream: false,
            extra: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn test_generate_sends_bearer_and_attribution_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test-key"))
            .and(header("http-referer", "https://gate.example.com"))
            .and(header("x-title", "Gate"))
            .and(body_partial_json(json!({"model": "deepseek/deepseek-r1", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "gen-1",
                "model": "deepseek/deepseek-r1",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 9, "completion_tokens": 2}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = credential(CredentialKind::OpenRouter, &server.uri());
        let client = HttpProviderClient::open_router(reqwest::Client::new(), &credential).unwrap();

        let response = client.generate(request("deepseek/deepseek-r1")).await.unwrap();
        assert_eq!(response.choices[0].message.content, json!("hi"));
        let usage = response.usage.unwrap().token_usage();
        assert_eq!(usage.input_tokens, Some(9));
        assert_eq!(usage.output_tokens, Some(2));
    }

    #[tokio::test]
    async fn test_anthropic_uses_api_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("x-api-key", "sk-test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "claude-3-5-haiku-20241022",
                "choices": []
            })))
            .mount(&server)
            .await;

        let credential = credential(CredentialKind::Anthropic, &server.uri());
        let client = HttpProviderClient::anthropic(reqwest::Client::new(), &credential).unwrap();

        client.generate(request("claude-3-5-haiku-20241022")).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_maps_to_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let credential = credential(CredentialKind::OpenAi, &server.uri());
        let client = HttpProviderClient::open_ai(reqwest::Client::new(), &credential).unwrap();

        let err = client.generate(request("gpt-4o")).await.unwrap_err();
        match err {
            Error::Upstream { status, message } => {
                assert_eq!(status, Some(429));
                assert_eq!(message, "rate limited");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_stream_parses_sse_until_done() {
        let sse_body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"he\"}}]}\n\n",
            ": keepalive\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}],\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":2}}\n\n",
            "data: [DONE]\n\n",
        );

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body.as_bytes().to_vec(), "text/event-stream"))
            .mount(&server)
            .await;

        let credential = credential(CredentialKind::OpenRouter, &server.uri());
        let client = HttpProviderClient::open_router(reqwest::Client::new(), &credential).unwrap();

        let mut stream = client.generate_stream(request("gpt-4o")).await.unwrap();
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk.unwrap());
        }

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].usage().is_none());
        let usage = chunks[1].usage().unwrap();
        assert_eq!(usage.input_tokens, Some(4));
        assert_eq!(usage.output_tokens, Some(2));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let body = "é".repeat(ERROR_BODY_LIMIT);
        let truncated = truncate(&body);
        assert!(truncated.len() <= ERROR_BODY_LIMIT);
        assert!(body.starts_with(&truncated));
    }
}
