//! OpenAI chat-completions transport. Returns the raw message content;
//! parsing and validation live in [`super::StructuredOracle`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Completion, OracleFuture};
use crate::error::OracleError;

const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("news-digest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
        })
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: Option<String>,
}

impl Completion for OpenAiProvider {
    fn complete<'a>(&'a self, system: &'a str, user: &'a str) -> OracleFuture<'a, String> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(OracleError::Transport("OPENAI_API_KEY is empty".into()));
            }

            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: system,
                    },
                    Msg {
                        role: "user",
                        content: user,
                    },
                ],
                temperature: 0.0,
                response_format: ResponseFormat {
                    kind: "json_object",
                },
            };

            let resp = self
                .http
                .post(ENDPOINT)
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .map_err(|e| OracleError::Transport(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(OracleError::Transport(format!("openai status {status}")));
            }

            let body: Resp = resp
                .json()
                .await
                .map_err(|e| OracleError::Format(format!("completion envelope: {e}")))?;

            body.choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| OracleError::Format("completion had no content".into()))
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
