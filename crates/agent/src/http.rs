use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::warn;

use pedibot_core::config::{ClassifierConfig, ClassifierProvider};

use crate::llm::{Classifier, ClassifierError, ClassifierPrompt, TurnRole};

/// The single concrete classifier adapter: an OpenAI-compatible chat
/// completions client. Hosted providers and local runtimes (ollama) all
/// expose this wire shape; only the base URL and credentials differ.
pub struct HttpChatClassifier {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    timeout: Duration,
    max_retries: u32,
}

impl HttpChatClassifier {
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ClassifierError::Unavailable(error.to_string()))?;

        Ok(Self {
            client,
            base_url: effective_base_url(config.provider, config.base_url.as_deref()),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout,
            max_retries: config.max_retries,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(&self, prompt: &ClassifierPrompt) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": prompt.system })];
        for turn in &prompt.history {
            let role = match turn.role {
                TurnRole::Customer => "user",
                TurnRole::Assistant => "assistant",
            };
            messages.push(json!({ "role": role, "content": turn.text }));
        }
        messages.push(json!({ "role": "user", "content": prompt.message }));

        json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.2,
        })
    }

    async fn attempt(&self, prompt: &ClassifierPrompt) -> Result<String, ClassifierError> {
        let mut request = self.client.post(self.endpoint()).json(&self.request_body(prompt));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            if error.is_timeout() {
                ClassifierError::Timeout(self.timeout)
            } else {
                ClassifierError::Unavailable(error.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Unavailable(format!(
                "classifier endpoint returned {status}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|error| ClassifierError::Unavailable(error.to_string()))?;

        extract_content(&payload).ok_or_else(|| {
            ClassifierError::Unavailable("completion payload had no message content".to_string())
        })
    }
}

#[async_trait]
impl Classifier for HttpChatClassifier {
    async fn classify(&self, prompt: &ClassifierPrompt) -> Result<String, ClassifierError> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            match self.attempt(prompt).await {
                Ok(raw) => return Ok(raw),
                Err(error) => {
                    warn!(
                        event_name = "classifier.attempt_failed",
                        attempt,
                        max_retries = self.max_retries,
                        error = %error,
                        "classifier call failed"
                    );
                    last_error = Some(error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ClassifierError::Unavailable("no attempts were made".to_string())))
    }
}

fn effective_base_url(provider: ClassifierProvider, base_url: Option<&str>) -> String {
    let base = match base_url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => match provider {
            ClassifierProvider::OpenAi => "https://api.openai.com".to_string(),
            ClassifierProvider::Anthropic => "https://api.anthropic.com".to_string(),
            ClassifierProvider::Ollama => "http://localhost:11434".to_string(),
        },
    };

    if base.ends_with("/v1") {
        base
    } else {
        format!("{base}/v1")
    }
}

fn extract_content(payload: &Value) -> Option<String> {
    payload
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|content| content.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use pedibot_core::config::ClassifierProvider;

    use crate::llm::{ClassifierPrompt, HistoryTurn, TurnRole};

    use super::{effective_base_url, extract_content, HttpChatClassifier};

    fn classifier() -> HttpChatClassifier {
        let config = pedibot_core::config::ClassifierConfig {
            provider: ClassifierProvider::Ollama,
            api_key: None,
            base_url: Some("http://localhost:11434".to_string()),
            model: "llama3.1".to_string(),
            timeout_secs: 10,
            max_retries: 1,
        };
        HttpChatClassifier::from_config(&config).expect("build classifier")
    }

    #[test]
    fn base_url_is_normalized_to_v1() {
        assert_eq!(
            effective_base_url(ClassifierProvider::Ollama, Some("http://localhost:11434/")),
            "http://localhost:11434/v1"
        );
        assert_eq!(
            effective_base_url(ClassifierProvider::OpenAi, None),
            "https://api.openai.com/v1"
        );
        assert_eq!(
            effective_base_url(ClassifierProvider::OpenAi, Some("https://proxy.internal/v1")),
            "https://proxy.internal/v1"
        );
    }

    #[test]
    fn request_body_orders_system_history_then_message() {
        let prompt = ClassifierPrompt {
            system: "Eres el asistente".to_string(),
            history: vec![
                HistoryTurn { role: TurnRole::Customer, text: "hola".to_string() },
                HistoryTurn { role: TurnRole::Assistant, text: "¡Hola!".to_string() },
            ],
            message: "quiero 2 pizzas".to_string(),
        };

        let body = classifier().request_body(&prompt);
        let messages = body["messages"].as_array().expect("messages array");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["role"], "user");
        assert_eq!(messages[3]["content"], "quiero 2 pizzas");
    }

    #[test]
    fn content_extraction_is_defensive() {
        let payload = json!({
            "choices": [{ "message": { "content": "{\"intent\":\"greeting\"}" } }]
        });
        assert_eq!(extract_content(&payload).as_deref(), Some("{\"intent\":\"greeting\"}"));

        assert_eq!(extract_content(&json!({ "choices": [] })), None);
        assert_eq!(extract_content(&json!({})), None);
        assert_eq!(extract_content(&json!({ "choices": [{ "message": {} }] })), None);
    }
}
