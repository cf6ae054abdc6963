//! Ollama HTTP API client: capability probe (list models) and non-streaming chat.

use crate::provider::{ChatMessage, ChatOptions, ModelError, ModelProvider, ProbeReport};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: u64,
    pub modified_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Option<Vec<TagModel>>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    size: u64,
    modified_at: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: &'a ChatOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

pub struct OllamaClient {
    base: String,
    client: Client,
    /// Configured model until a probe substitutes another.
    model: RwLock<String>,
    probe_timeout: Duration,
    request_timeout: Duration,
}

impl OllamaClient {
    pub fn new(
        base: String,
        model: String,
        probe_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        let client = Client::builder().build().unwrap_or_default();
        Self {
            base: base.trim_end_matches('/').to_string(),
            client,
            model: RwLock::new(model),
            probe_timeout,
            request_timeout,
        }
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ModelError> {
        let url = format!("{}/api/tags", self.base);
        let res = self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(transport_error)?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ModelError::BadStatus { status, body });
        }
        let body: TagsResponse = res
            .json()
            .await
            .map_err(|e| ModelError::Malformed(e.to_string()))?;
        let models = body
            .models
            .unwrap_or_default()
            .into_iter()
            .map(|m| ModelInfo {
                name: m.name,
                size: m.size,
                modified_at: m.modified_at,
            })
            .collect();
        Ok(models)
    }

    fn set_model(&self, model: &str) {
        if let Ok(mut guard) = self.model.write() {
            *guard = model.to_string();
        }
    }
}

fn transport_error(e: reqwest::Error) -> ModelError {
    if e.is_timeout() {
        ModelError::Timeout
    } else if e.is_decode() {
        ModelError::Malformed(e.to_string())
    } else {
        ModelError::Unreachable(e.to_string())
    }
}

/// `llama3.2` and `llama3.2:latest` name the same model.
fn same_model(configured: &str, offered: &str) -> bool {
    configured == offered
        || format!("{}:latest", configured) == offered
        || format!("{}:latest", offered) == configured
}

/// Picks the model to serve completions: the configured one if offered, otherwise the first offered.
pub fn select_model<'a>(configured: &str, offered: &'a [String]) -> Option<&'a str> {
    offered
        .iter()
        .find(|o| same_model(configured, o))
        .or_else(|| offered.first())
        .map(String::as_str)
}

#[async_trait]
impl ModelProvider for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    fn base_url(&self) -> &str {
        &self.base
    }

    fn active_model(&self) -> String {
        self.model
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    async fn probe(&self) -> ProbeReport {
        let models = match self.list_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!(base_url = %self.base, error = %e, "ollama probe failed");
                return ProbeReport::default();
            }
        };
        let offered: Vec<String> = models.into_iter().map(|m| m.name).collect();
        let configured = self.active_model();
        let Some(selected) = select_model(&configured, &offered).map(str::to_string) else {
            warn!(base_url = %self.base, "ollama is running but offers no models");
            return ProbeReport {
                available: false,
                models_offered: offered,
                active_model: None,
            };
        };
        if !same_model(&configured, &selected) {
            warn!(
                configured = %configured,
                substitute = %selected,
                "configured model not offered; substituting first available model"
            );
            self.set_model(&selected);
        }
        info!(model = %selected, offered = offered.len(), "ollama probe succeeded");
        ProbeReport {
            available: true,
            models_offered: offered,
            active_model: Some(selected),
        }
    }

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: &ChatOptions,
    ) -> Result<String, ModelError> {
        let url = format!("{}/api/chat", self.base);
        let model = self.active_model();
        let body = ChatRequest {
            model: &model,
            messages: &messages,
            stream: false,
            options,
        };
        debug!(model = %model, messages = messages.len(), "ollama chat request");
        // Per-request timeout covers connect through body read.
        let res = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let text = res.text().await.unwrap_or_default();
            return Err(ModelError::BadStatus { status, body: text });
        }
        let payload: ChatResponse = res.json().await.map_err(transport_error)?;
        let content = payload
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| ModelError::Malformed("missing message.content".to_string()))?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ModelError::EmptyOutput);
        }
        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    type Route = (&'static str, u16, &'static str);

    /// Reads one request, body included, and returns its head.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return String::from_utf8_lossy(&buf).to_string();
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let body_len = head
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                return head;
            }
        }
    }

    /// Serves each `(path, status, body)` route over plain HTTP on an ephemeral port.
    async fn canned_ollama(routes: Vec<Route>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let routes = routes.clone();
                tokio::spawn(async move {
                    let head = read_request(&mut socket).await;
                    let path = head.split_whitespace().nth(1).unwrap_or("");
                    let (status, body) = routes
                        .iter()
                        .find(|(p, _, _)| *p == path)
                        .map(|(_, status, body)| (*status, *body))
                        .unwrap_or((404, "{}"));
                    let response = format!(
                        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        if status == 200 { "OK" } else { "Error" },
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}", addr)
    }

    fn client_for(base: String, model: &str) -> OllamaClient {
        OllamaClient::new(
            base,
            model.to_string(),
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
    }

    async fn complete_with(status: u16, body: &'static str) -> Result<String, ModelError> {
        let base = canned_ollama(vec![("/api/chat", status, body)]).await;
        client_for(base, "llama3.2:3b")
            .complete(vec![ChatMessage::user("hi")], &ChatOptions::default())
            .await
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn select_model_prefers_configured() {
        let offered = names(&["qwen2.5:3b", "llama3.2:3b"]);
        assert_eq!(select_model("llama3.2:3b", &offered), Some("llama3.2:3b"));
    }

    #[test]
    fn select_model_matches_latest_tag() {
        let offered = names(&["mistral:7b", "llama3.2:latest"]);
        assert_eq!(select_model("llama3.2", &offered), Some("llama3.2:latest"));
    }

    #[test]
    fn select_model_substitutes_first_offered() {
        let offered = names(&["mistral:7b", "phi3:mini"]);
        assert_eq!(select_model("llama3.2:3b", &offered), Some("mistral:7b"));
        assert_eq!(select_model("llama3.2:3b", &[]), None);
    }

    #[test]
    fn chat_request_wire_shape() {
        let messages = vec![ChatMessage::system("be kind"), ChatMessage::user("hello")];
        let options = ChatOptions::default();
        let req = ChatRequest {
            model: "llama3.2:3b",
            messages: &messages,
            stream: false,
            options: &options,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["options"]["num_predict"], 500);
    }

    #[tokio::test]
    async fn probe_of_closed_port_reports_unavailable() {
        let client = OllamaClient::new(
            "http://127.0.0.1:9".to_string(),
            "llama3.2:3b".to_string(),
            Duration::from_millis(500),
            Duration::from_millis(500),
        );
        let report = client.probe().await;
        assert!(!report.available);
        assert!(report.models_offered.is_empty());
        assert_eq!(client.active_model(), "llama3.2:3b");
    }

    #[tokio::test]
    async fn complete_against_closed_port_fails_without_text() {
        let client = OllamaClient::new(
            "http://127.0.0.1:9/".to_string(),
            "llama3.2:3b".to_string(),
            Duration::from_millis(500),
            Duration::from_millis(500),
        );
        let err = client
            .complete(vec![ChatMessage::user("hi")], &ChatOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Unreachable(_) | ModelError::Timeout));
    }

    #[tokio::test]
    async fn complete_returns_trimmed_content() {
        let text = complete_with(
            200,
            r#"{"model":"llama3.2:3b","message":{"role":"assistant","content":"  Take a slow breath.\n"},"done":true}"#,
        )
        .await
        .unwrap();
        assert_eq!(text, "Take a slow breath.");
    }

    #[tokio::test]
    async fn complete_maps_error_status_to_bad_status() {
        let err = complete_with(500, r#"{"error":"model crashed"}"#).await.unwrap_err();
        match err {
            ModelError::BadStatus { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("model crashed"));
            }
            other => panic!("expected BadStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn complete_without_content_is_malformed() {
        let err = complete_with(200, r#"{"done":true}"#).await.unwrap_err();
        assert!(matches!(err, ModelError::Malformed(_)));

        let err = complete_with(200, "not json at all").await.unwrap_err();
        assert!(matches!(err, ModelError::Malformed(_)));
    }

    #[tokio::test]
    async fn whitespace_content_is_empty_output() {
        let err = complete_with(200, r#"{"message":{"role":"assistant","content":" \n\t "}}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::EmptyOutput));
    }

    #[tokio::test]
    async fn missing_model_is_replaced_by_first_offered() {
        let base = canned_ollama(vec![(
            "/api/tags",
            200,
            r#"{"models":[{"name":"mistral:7b","size":4100000000},{"name":"phi3:mini","size":2200000000}]}"#,
        )])
        .await;
        let client = client_for(base, "llama3.2:3b");
        let report = client.probe().await;
        assert!(report.available);
        assert_eq!(report.models_offered, names(&["mistral:7b", "phi3:mini"]));
        assert_eq!(report.active_model.as_deref(), Some("mistral:7b"));
        assert_eq!(client.active_model(), "mistral:7b");
    }

    #[tokio::test]
    async fn configured_model_is_kept_when_offered() {
        let base = canned_ollama(vec![(
            "/api/tags",
            200,
            r#"{"models":[{"name":"mistral:7b"},{"name":"llama3.2:latest"}]}"#,
        )])
        .await;
        let client = client_for(base, "llama3.2");
        let report = client.probe().await;
        assert_eq!(report.active_model.as_deref(), Some("llama3.2:latest"));
        assert_eq!(client.active_model(), "llama3.2");
    }

    #[tokio::test]
    async fn empty_or_failing_model_list_is_unavailable() {
        let base = canned_ollama(vec![("/api/tags", 200, r#"{"models":[]}"#)]).await;
        let report = client_for(base, "llama3.2:3b").probe().await;
        assert!(!report.available);
        assert_eq!(report.active_model, None);

        let base = canned_ollama(vec![("/api/tags", 503, "busy")]).await;
        let client = client_for(base, "llama3.2:3b");
        assert!(matches!(
            client.list_models().await,
            Err(ModelError::BadStatus { status: 503, .. })
        ));
        assert!(!client.probe().await.available);
    }
}
