use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Response of the OpenWeather current-conditions endpoint (`/data/2.5/weather`).
///
/// `main` and `wind` are required; the provider always sends them on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentResponse {
    #[serde(default)]
    pub name: String,
    pub main: CurrentMain,
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
    pub wind: Wind,
    pub rain: Option<HashMap<String, f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentMain {
    pub temp: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherCondition {
    pub main: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
}

/// Response of the 5 day / 3 hour forecast endpoint (`/data/2.5/forecast`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub list: Vec<ForecastItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastItem {
    pub dt: i64,
    pub main: ForecastMain,
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
    pub dt_txt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastMain {
    pub temp: f64,
}

/// Both raw payloads of one fetch; only produced when both calls succeeded.
#[derive(Debug, Clone)]
pub struct RawWeather {
    pub current: CurrentResponse,
    pub forecast: ForecastResponse,
}

/// Small fixed icon taxonomy the dashboard renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IconCategory {
    Clear,
    Clouds,
    Rain,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConditions {
    pub location_name: String,
    pub temperature_celsius: f64,
    pub condition_text: String,
    pub humidity_percent: f64,
    pub wind_speed: f64,
    pub precipitation_mm: f64,
    pub icon_category: IconCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastEntry {
    pub day_label: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub temperature_celsius: f64,
    pub condition_text: String,
    pub icon_category: IconCategory,
}

/// Render-ready weather for one location. Rebuilt wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub current: CurrentConditions,
    pub forecast: Vec<ForecastEntry>,
}
