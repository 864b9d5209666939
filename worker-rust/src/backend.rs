use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Local inference server speaking the OpenAI completions API
#[derive(Clone)]
pub struct Backend {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

impl Backend {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Sample exactly one token. Empty means the model stopped.
    pub async fn next_token(&self, model: &str, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/v1/completions", self.base_url);
        let body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "max_tokens": 1,
            "temperature": temperature,
            "stream": false,
        });
        let resp = self.http.post(&url).json(&body).send().await
            .context("Failed to reach inference backend")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("Backend returned HTTP {status}");
        }
        let data: CompletionResponse = resp.json().await
            .context("Failed to parse backend completion")?;
        Ok(first_text(data))
    }
}

fn first_text(data: CompletionResponse) -> String {
    data.choices.into_iter().next().map(|c| c.text).unwrap_or_default()
}
