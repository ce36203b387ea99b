use super::openweather::FetchError;
use super::types::*;
use super::WeatherSource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Per-location scripted behaviour of the mock source.
#[derive(Clone)]
pub enum Behaviour {
    Fail(u16),
    Delay(Duration),
    /// Holds the response until the gate is notified.
    Gate(Arc<Notify>),
    /// Waits on the gate, then fails with the given status.
    GateThenFail(Arc<Notify>, u16),
}

/// Deterministic in-process weather source. Every location reports 28°C,
/// 60% humidity, 10 m/s wind and clear skies, with a 9 sample forecast.
#[derive(Default)]
pub struct MockWeatherSource {
    behaviours: Mutex<HashMap<String, Behaviour>>,
    calls: AtomicUsize,
}

impl MockWeatherSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, location: &str, behaviour: Behaviour) {
        self.behaviours
            .lock()
            .unwrap()
            .insert(location.to_string(), behaviour);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sample(location: &str) -> RawWeather {
        let start = 1_705_276_800; // 2024-01-15 00:00 UTC

        let forecast = (0..9)
            .map(|i| ForecastItem {
                dt: start + i * 3 * 3600,
                main: ForecastMain {
                    temp: 24.0 + i as f64,
                },
                weather: vec![WeatherCondition {
                    main: if i % 2 == 0 { "Clouds" } else { "Rain" }.to_string(),
                    description: if i % 2 == 0 { "scattered clouds" } else { "light rain" }.to_string(),
                }],
                dt_txt: None,
            })
            .collect();

        RawWeather {
            current: CurrentResponse {
                name: location.to_string(),
                main: CurrentMain {
                    temp: 28.0,
                    humidity: 60.0,
                },
                weather: vec![WeatherCondition {
                    main: "Clear".to_string(),
                    description: "clear sky".to_string(),
                }],
                wind: Wind { speed: 10.0 },
                rain: None,
            },
            forecast: ForecastResponse { list: forecast },
        }
    }
}

#[async_trait]
impl WeatherSource for MockWeatherSource {
    async fn fetch_weather(&self, location: &str) -> Result<RawWeather, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behaviour = self.behaviours.lock().unwrap().get(location).cloned();

        match behaviour {
            Some(Behaviour::Fail(status)) => {
                return Err(FetchError::ApiError {
                    status,
                    body: "mock failure".to_string(),
                })
            }
            Some(Behaviour::Delay(delay)) => tokio::time::sleep(delay).await,
            Some(Behaviour::Gate(gate)) => gate.notified().await,
            Some(Behaviour::GateThenFail(gate, status)) => {
                gate.notified().await;
                return Err(FetchError::ApiError {
                    status,
                    body: "mock failure".to_string(),
                });
            }
            None => {}
        }

        Ok(Self::sample(location))
    }
}
