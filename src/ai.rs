use crate::config::Config;
use crate::forecast::types::WeatherSnapshot;
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("ADVISORY_API_KEY not configured")]
    MissingApiKey,
    #[error("Response contained no JSON object")]
    NoJsonPayload,
    #[error("Advisory request timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryItem {
    pub crop: String,
    pub stage: String,
    pub advice: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoilMoistureItem {
    pub field: String,
    pub crop: String,
    #[serde(alias = "moisture")]
    pub moisture_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrigationRecommendation {
    pub field: String,
    pub crop: String,
    pub advice: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrrigationPlan {
    #[serde(default)]
    pub soil_moisture: Vec<SoilMoistureItem>,
    #[serde(default)]
    pub recommendations: Vec<IrrigationRecommendation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherAdvisory {
    #[serde(default)]
    pub advisory: Vec<AdvisoryItem>,
    #[serde(default)]
    pub irrigation: IrrigationPlan,
}

/// A generative-text backend answering a single prompt.
#[async_trait]
pub trait AdvisoryBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AiError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// OpenAI-compatible chat-completions client (OpenRouter by default).
pub struct AiClient {
    client: Client,
    config: Config,
}

impl AiClient {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent("FarmWeatherAdvisor/1.0")
            .timeout(config.advisory_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    async fn chat_completion(&self, prompt: &str) -> Result<String, AiError> {
        let api_key = self
            .config
            .advisory_api_key
            .as_deref()
            .ok_or(AiError::MissingApiKey)?;

        let request = ChatRequest {
            model: self.config.advisory_model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "You are an agronomy assistant for smallholder farms. Answer only with the JSON document requested.".to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens: 1200,
            temperature: 0.4,
            stream: false,
        };

        let response = self
            .client
            .post(&self.config.advisory_base_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout(self.config.advisory_timeout)
                } else {
                    AiError::RequestFailed(e)
                }
            })?;

        match response.status() {
            reqwest::StatusCode::OK => {
                let chat_response: ChatResponse = response.json().await?;
                chat_response
                    .choices
                    .into_iter()
                    .next()
                    .map(|choice| choice.message.content)
                    .ok_or_else(|| AiError::ApiError("No response choices".to_string()))
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => Err(AiError::RateLimited),
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(AiError::ApiError(format!("HTTP {}: {}", status, error_text)))
            }
        }
    }
}

#[async_trait]
impl AdvisoryBackend for AiClient {
    async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        self.chat_completion(prompt).await
    }
}

/// Turns a weather snapshot into crop and irrigation guidance. Every failure
/// is swallowed here: the caller only ever sees `None`.
pub struct AdvisoryEnricher {
    backend: Arc<dyn AdvisoryBackend>,
    timeout: Duration,
}

impl AdvisoryEnricher {
    pub fn new(backend: Arc<dyn AdvisoryBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn get_advisory(&self, snapshot: &WeatherSnapshot) -> Option<WeatherAdvisory> {
        match self.try_get_advisory(snapshot).await {
            Ok(advisory) => Some(advisory),
            Err(e) => {
                tracing::warn!(
                    location = %snapshot.current.location_name,
                    "Advisory enrichment failed: {}",
                    e
                );
                None
            }
        }
    }

    async fn try_get_advisory(&self, snapshot: &WeatherSnapshot) -> Result<WeatherAdvisory, AiError> {
        let prompt = build_advisory_prompt(snapshot)?;

        let response = tokio::time::timeout(self.timeout, self.backend.complete(&prompt))
            .await
            .map_err(|_| AiError::Timeout(self.timeout))??;

        parse_advisory(&response).map_err(|e| {
            tracing::debug!("Unparseable advisory response: {}", truncate_for_log(&response, 200));
            e
        })
    }
}

fn build_advisory_prompt(snapshot: &WeatherSnapshot) -> Result<String, AiError> {
    let c = &snapshot.current;
    let mut prompt = format!(
        "Current weather in {}:\n\
         - Temperature: {:.1}°C\n\
         - Conditions: {}\n\
         - Humidity: {:.0}%\n\
         - Wind: {:.1} m/s\n\
         - Precipitation (last hour): {:.1} mm\n\n\
         Upcoming forecast:\n",
        c.location_name,
        c.temperature_celsius,
        c.condition_text,
        c.humidity_percent,
        c.wind_speed,
        c.precipitation_mm
    );

    for entry in &snapshot.forecast {
        prompt.push_str(&format!(
            "- {} {}: {:.1}°C, {}\n",
            entry.day_label,
            entry.timestamp.format("%H:%M UTC"),
            entry.temperature_celsius,
            entry.condition_text
        ));
    }

    let example = serde_json::to_string(&WeatherAdvisory {
        advisory: vec![AdvisoryItem {
            crop: "Wheat".to_string(),
            stage: "Tillering".to_string(),
            advice: "...".to_string(),
        }],
        irrigation: IrrigationPlan {
            soil_moisture: vec![SoilMoistureItem {
                field: "Field 1".to_string(),
                crop: "Wheat".to_string(),
                moisture_percent: 45.0,
            }],
            recommendations: vec![IrrigationRecommendation {
                field: "Field 1".to_string(),
                crop: "Wheat".to_string(),
                advice: "...".to_string(),
            }],
        },
    })?;

    prompt.push_str(&format!(
        "\nGive crop advisories for 3 crops common in this region and an irrigation plan \
         for 2-3 fields. Moisture is a percentage between 0 and 100. \
         Respond with a single JSON object exactly in this shape and nothing else:\n{}",
        example
    ));

    Ok(prompt)
}

/// The outermost `{ ... }` of a free-form reply, ignoring code fences and prose.
pub fn extract_json_payload(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

pub fn parse_advisory(text: &str) -> Result<WeatherAdvisory, AiError> {
    let payload = extract_json_payload(text).ok_or(AiError::NoJsonPayload)?;
    let mut advisory: WeatherAdvisory = serde_json::from_str(payload)?;

    for item in &mut advisory.irrigation.soil_moisture {
        item.moisture_percent = item.moisture_percent.clamp(0.0, 100.0);
    }

    Ok(advisory)
}

/// Scripted backend for tests.
#[cfg(test)]
pub struct MockAdvisoryBackend {
    reply: std::sync::Mutex<Result<String, String>>,
    delay: Option<Duration>,
    gate: Option<(String, Arc<tokio::sync::Notify>)>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockAdvisoryBackend {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: std::sync::Mutex::new(Ok(text.to_string())),
            delay: None,
            gate: None,
            calls: Default::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: std::sync::Mutex::new(Err(message.to_string())),
            delay: None,
            gate: None,
            calls: Default::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Holds any prompt mentioning `needle` until the gate is notified.
    pub fn gated_on(mut self, needle: &str, gate: Arc<tokio::sync::Notify>) -> Self {
        self.gate = Some((needle.to_string(), gate));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn sample_reply() -> String {
        serde_json::json!({
            "advisory": [
                { "crop": "Wheat", "stage": "Tillering", "advice": "Apply nitrogen before the rain." },
                { "crop": "Mustard", "stage": "Flowering", "advice": "Watch for aphids." }
            ],
            "irrigation": {
                "soilMoisture": [
                    { "field": "North", "crop": "Wheat", "moisture": 42 }
                ],
                "recommendations": [
                    { "field": "North", "crop": "Wheat", "advice": "Irrigate lightly on Tuesday." }
                ]
            }
        })
        .to_string()
    }
}

#[cfg(test)]
#[async_trait]
impl AdvisoryBackend for MockAdvisoryBackend {
    async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some((needle, gate)) = &self.gate {
            if prompt.contains(needle.as_str()) {
                gate.notified().await;
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self.reply.lock().unwrap().clone();
        reply.map_err(AiError::ApiError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::mock::MockWeatherSource;
    use crate::forecast::normalize::normalize;
    use serde_json::json;
    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn snapshot() -> WeatherSnapshot {
        let raw = MockWeatherSource::sample("New Delhi");
        normalize(&raw.current, &raw.forecast, chrono_tz::UTC)
    }

    fn enricher(backend: MockAdvisoryBackend) -> AdvisoryEnricher {
        AdvisoryEnricher::new(Arc::new(backend), Duration::from_secs(5))
    }

    #[test]
    fn test_parse_plain_json() {
        let advisory = parse_advisory(&MockAdvisoryBackend::sample_reply()).unwrap();

        assert_eq!(advisory.advisory.len(), 2);
        assert_eq!(advisory.advisory[0].crop, "Wheat");
        assert_eq!(advisory.irrigation.soil_moisture[0].moisture_percent, 42.0);
        assert_eq!(advisory.irrigation.recommendations[0].field, "North");
    }

    #[test]
    fn test_parse_fenced_json_with_prose() {
        let text = format!(
            "Sure! Here is the plan:\n```json\n{}\n```\nGood luck with the harvest.",
            MockAdvisoryBackend::sample_reply()
        );
        let advisory = parse_advisory(&text).unwrap();
        assert_eq!(advisory.advisory[1].crop, "Mustard");
    }

    #[test]
    fn test_parse_rejects_free_text() {
        let result = parse_advisory("The weather looks lovely, plant whatever you like.");
        assert!(matches!(result, Err(AiError::NoJsonPayload)));

        let result = parse_advisory("} backwards {");
        assert!(matches!(result, Err(AiError::NoJsonPayload)));
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        let result = parse_advisory(r#"{"advisory": [{"crop": "Rice"}]}"#);
        assert!(matches!(result, Err(AiError::JsonParsing(_))));
    }

    #[test]
    fn test_missing_irrigation_defaults_empty_and_moisture_clamped() {
        let advisory = parse_advisory(r#"{"advisory": []}"#).unwrap();
        assert!(advisory.irrigation.soil_moisture.is_empty());
        assert!(advisory.irrigation.recommendations.is_empty());

        let advisory = parse_advisory(
            r#"{"irrigation": {"soilMoisture": [{"field": "A", "crop": "Rice", "moisturePercent": 130}]}}"#,
        )
        .unwrap();
        assert_eq!(advisory.irrigation.soil_moisture[0].moisture_percent, 100.0);
    }

    #[test]
    fn test_prompt_carries_snapshot() {
        let prompt = build_advisory_prompt(&snapshot()).unwrap();

        assert!(prompt.contains("New Delhi"));
        assert!(prompt.contains("28.0°C"));
        assert!(prompt.contains("clear sky"));
        assert!(prompt.contains("\"soilMoisture\""));
        assert_eq!(prompt.matches("- Mon ").count(), 7);
    }

    #[tokio::test]
    async fn test_get_advisory_success() {
        let backend = MockAdvisoryBackend::replying(&MockAdvisoryBackend::sample_reply());
        let advisory = enricher(backend).get_advisory(&snapshot()).await;

        assert_eq!(advisory.unwrap().advisory.len(), 2);
    }

    #[tokio::test]
    async fn test_get_advisory_non_json_is_absent() {
        let backend = MockAdvisoryBackend::replying("I cannot help with that today.");
        assert!(enricher(backend).get_advisory(&snapshot()).await.is_none());
    }

    #[tokio::test]
    async fn test_get_advisory_backend_error_is_absent() {
        let backend = MockAdvisoryBackend::failing("boom");
        assert!(enricher(backend).get_advisory(&snapshot()).await.is_none());
    }

    #[tokio::test]
    async fn test_get_advisory_timeout_is_absent() {
        let backend = MockAdvisoryBackend::replying(&MockAdvisoryBackend::sample_reply())
            .with_delay(Duration::from_secs(5));
        let enricher = AdvisoryEnricher::new(Arc::new(backend), Duration::from_millis(50));

        assert!(enricher.get_advisory(&snapshot()).await.is_none());
    }

    #[tokio::test]
    async fn test_chat_completion_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-advisory-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": MockAdvisoryBackend::sample_reply() } }
                ]
            })))
            .mount(&server)
            .await;

        let client = AiClient::new(Config::for_tests(&server.uri())).unwrap();
        let enricher = AdvisoryEnricher::new(Arc::new(client), Duration::from_secs(5));
        let advisory = enricher.get_advisory(&snapshot()).await.unwrap();

        assert_eq!(advisory.irrigation.recommendations.len(), 1);
    }

    #[tokio::test]
    async fn test_chat_completion_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = AiClient::new(Config::for_tests(&server.uri())).unwrap();
        let result = client.complete("hello").await;

        assert!(matches!(result, Err(AiError::RateLimited)));
    }

    #[tokio::test]
    async fn test_chat_completion_without_key() {
        let server = MockServer::start().await;
        let mut config = Config::for_tests(&server.uri());
        config.advisory_api_key = None;

        let client = AiClient::new(config).unwrap();
        let result = client.complete("hello").await;

        assert!(matches!(result, Err(AiError::MissingApiKey)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
