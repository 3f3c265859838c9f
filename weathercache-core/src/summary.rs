use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::SummaryConfig;
use crate::error::{WeatherError, WeatherResult};
use crate::model::{SummaryInput, WeatherSummary};
use crate::provider::{http_client, truncate_body};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 300;

/// Turns one day of weather into a short human-readable summary.
#[async_trait]
pub trait SummaryGenerator: Send + Sync + std::fmt::Debug {
    async fn summarize(&self, input: &SummaryInput) -> WeatherResult<WeatherSummary>;
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<MessagesContent>,
}

#[derive(Debug, Deserialize)]
struct MessagesContent {
    #[serde(default)]
    text: String,
}

/// Summary generator backed by the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicSummarizer {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicSummarizer {
    pub fn new(config: &SummaryConfig) -> Self {
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Self {
            http: http_client(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "unknown".to_string())
}

fn build_prompt(input: &SummaryInput) -> String {
    format!(
        r#"Turn the following weather data into a short, friendly daily summary.

Location: {location}
Date: {date}
Temperature: {temp} °C
Humidity: {humidity} %
Wind: {wind} km/h
Conditions: {description}

Refer to the location neutrally, never as if it were a person, and skip greetings.

Respond with ONLY a JSON object:
{{"summary": "2-3 sentences covering temperature, wind, humidity and conditions", "clothes": "what to wear", "precautions": "anything to watch out for"}}"#,
        location = input.location,
        date = input.date,
        temp = fmt_opt(input.temperature),
        humidity = fmt_opt(input.humidity),
        wind = fmt_opt(input.wind_speed),
        description = input.description.as_deref().unwrap_or("unknown"),
    )
}

/// Pull the structured answer out of the model text, falling back to plain prose.
fn parse_summary(text: &str) -> WeatherSummary {
    let json_str = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    };

    serde_json::from_str::<WeatherSummary>(json_str).unwrap_or_else(|_| WeatherSummary {
        summary: text.trim().to_string(),
        ..Default::default()
    })
}

#[async_trait]
impl SummaryGenerator for AnthropicSummarizer {
    async fn summarize(&self, input: &SummaryInput) -> WeatherResult<WeatherSummary> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{"role": "user", "content": build_prompt(input)}]
        });

        let resp = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| WeatherError::provider(format!("Summary request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(WeatherError::provider(format!(
                "Summary API error {}: {}",
                status,
                truncate_body(&text)
            )));
        }

        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| WeatherError::provider(format!("Failed to parse summary response: {e}")))?;

        let text = parsed.content.first().map(|c| c.text.as_str()).unwrap_or("");
        if text.trim().is_empty() {
            return Err(WeatherError::provider("Summary response contained no text"));
        }

        Ok(parse_summary(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn input() -> SummaryInput {
        SummaryInput {
            location: "Madrid".into(),
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            temperature: Some(31.0),
            humidity: Some(20),
            wind_speed: Some(8.0),
            description: Some("Sunny".into()),
        }
    }

    fn summarizer(uri: &str) -> AnthropicSummarizer {
        AnthropicSummarizer::new(&SummaryConfig {
            api_key: "test_key".into(),
            model: "test-model".into(),
            base_url: Some(uri.to_string()),
        })
    }

    #[test]
    fn prompt_mentions_every_field() {
        let prompt = build_prompt(&input());
        for needle in ["Madrid", "2024-06-10", "31", "20", "8", "Sunny"] {
            assert!(prompt.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn parses_json_inside_code_fence() {
        let text = "```json\n{\"summary\": \"Hot.\", \"clothes\": \"Shorts\", \"precautions\": \"Water\"}\n```";
        let parsed = parse_summary(text);
        assert_eq!(parsed.summary, "Hot.");
        assert_eq!(parsed.clothes, "Shorts");
        assert_eq!(parsed.precautions, "Water");
    }

    #[test]
    fn free_text_becomes_summary() {
        let parsed = parse_summary("  A warm and dry day.  ");
        assert_eq!(parsed.summary, "A warm and dry day.");
        assert!(parsed.clothes.is_empty());
    }

    #[tokio::test]
    async fn calls_messages_api() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test_key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "{\"summary\": \"Sunny and hot.\", \"clothes\": \"Hat\", \"precautions\": \"Sunscreen\"}"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let summary = summarizer(&server.uri()).summarize(&input()).await.unwrap();
        assert_eq!(summary.summary, "Sunny and hot.");
        assert_eq!(summary.clothes, "Hat");
    }

    #[tokio::test]
    async fn api_error_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = summarizer(&server.uri()).summarize(&input()).await.unwrap_err();
        assert_eq!(err.kind(), "provider_unavailable");
        assert!(err.to_string().contains("529"));
    }
}
