pub mod normalize;
pub mod openweather;
pub mod types;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use openweather::FetchError;
use types::RawWeather;

/// A provider of raw current + forecast payloads for a free-text location.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_weather(&self, location: &str) -> Result<RawWeather, FetchError>;
}
