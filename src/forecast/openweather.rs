use super::types::*;
use super::WeatherSource;
use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("WEATHER_API_KEY not configured")]
    MissingApiKey,
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Malformed weather response: {0}")]
    JsonParsing(#[from] serde_json::Error),
    #[error("API error: HTTP {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("Weather request timed out after {0:?}")]
    Timeout(Duration),
}

pub struct OpenWeatherClient {
    client: Client,
    config: Config,
}

impl OpenWeatherClient {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent("FarmWeatherAdvisor/1.0")
            .timeout(config.weather_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    pub async fn get_current(&self, location: &str) -> Result<CurrentResponse, FetchError> {
        self.get_json(&self.config.openweather_current_path, location).await
    }

    pub async fn get_forecast(&self, location: &str) -> Result<ForecastResponse, FetchError> {
        self.get_json(&self.config.openweather_forecast_path, location).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        location: &str,
    ) -> Result<T, FetchError> {
        let api_key = self
            .config
            .weather_api_key
            .as_deref()
            .ok_or(FetchError::MissingApiKey)?;

        let url = format!("{}{}", self.config.openweather_base_url, path);

        let response = self
            .client
            .get(&url)
            .query(&[("q", location), ("units", "metric"), ("appid", api_key)])
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.config.weather_timeout)
        } else {
            FetchError::RequestFailed(error)
        }
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch_weather(&self, location: &str) -> Result<RawWeather, FetchError> {
        tracing::debug!(location, "Fetching current conditions");
        let current = self.get_current(location).await?;

        tracing::debug!(location, "Fetching 5 day forecast");
        let forecast = self.get_forecast(location).await?;

        Ok(RawWeather { current, forecast })
    }
}
