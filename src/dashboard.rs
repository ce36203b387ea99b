use crate::ai::{AdvisoryEnricher, WeatherAdvisory};
use crate::forecast::normalize::normalize;
use crate::forecast::openweather::FetchError;
use crate::forecast::types::WeatherSnapshot;
use crate::forecast::WeatherSource;
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DashboardError {
    #[error("location must not be empty")]
    EmptyLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub location: String,
    pub phase: Phase,
    pub weather_snapshot: Option<WeatherSnapshot>,
    pub advisory: Option<WeatherAdvisory>,
    pub loading: bool,
    pub error: Option<String>,
    /// Generation of the latest issued cycle.
    pub generation: u64,
}

impl ViewState {
    fn new(location: String) -> Self {
        Self {
            location,
            phase: Phase::Idle,
            weather_snapshot: None,
            advisory: None,
            loading: false,
            error: None,
            generation: 0,
        }
    }
}

/// A fetch cycle that has been issued but not yet run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub generation: u64,
    pub location: String,
}

/// Owns the dashboard `ViewState`. A cycle commits only while its generation
/// is still the latest issued one.
pub struct DashboardController {
    source: Arc<dyn WeatherSource>,
    enricher: AdvisoryEnricher,
    timezone: Tz,
    weather_timeout: Duration,
    state: RwLock<ViewState>,
    mounted: AtomicBool,
}

impl DashboardController {
    pub fn new(
        source: Arc<dyn WeatherSource>,
        enricher: AdvisoryEnricher,
        timezone: Tz,
        weather_timeout: Duration,
        default_location: &str,
    ) -> Self {
        Self {
            source,
            enricher,
            timezone,
            weather_timeout,
            state: RwLock::new(ViewState::new(default_location.to_string())),
            mounted: AtomicBool::new(false),
        }
    }

    /// Read-only copy of the current view state.
    pub fn state(&self) -> ViewState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Updates the location input without fetching.
    pub fn set_location(&self, location: &str) -> Result<(), DashboardError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(DashboardError::EmptyLocation);
        }
        self.write_state().location = location.to_string();
        Ok(())
    }

    /// Runs the initial cycle with the default location. Only the first call
    /// does anything.
    pub async fn mount(&self) -> Result<(), DashboardError> {
        if self.mounted.swap(true, Ordering::SeqCst) {
            tracing::debug!("Dashboard already mounted");
            return Ok(());
        }

        self.search(None).await.map(|_| ())
    }

    /// Issues a new cycle and runs it to completion.
    pub async fn search(&self, location: Option<&str>) -> Result<u64, DashboardError> {
        let cycle = self.begin_search(location)?;
        let generation = cycle.generation;
        self.run(cycle).await;
        Ok(generation)
    }

    /// Enters Loading under a fresh generation, optionally switching location
    /// first. Any cycle still in flight becomes stale.
    pub fn begin_search(&self, location: Option<&str>) -> Result<Cycle, DashboardError> {
        let mut state = self.write_state();

        let location = location.unwrap_or(state.location.as_str()).trim().to_string();
        if location.is_empty() {
            return Err(DashboardError::EmptyLocation);
        }

        state.generation += 1;
        state.location = location.clone();
        state.phase = Phase::Loading;
        state.loading = true;
        state.error = None;

        tracing::info!(generation = state.generation, location = %location, "Weather cycle started");

        Ok(Cycle {
            generation: state.generation,
            location,
        })
    }

    /// Fetch, normalize and enrich, then commit if the cycle is still current.
    pub async fn run(&self, cycle: Cycle) {
        let Cycle { generation, location } = cycle;

        // A fetch is two provider calls, each bounded by `weather_timeout`.
        let budget = self.weather_timeout * 2;
        let raw = match tokio::time::timeout(budget, self.source.fetch_weather(&location)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(budget)),
        };

        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                self.commit(generation, |state| {
                    tracing::error!(generation, location = %location, "Weather fetch failed: {}", e);
                    state.phase = Phase::Failed;
                    state.loading = false;
                    state.weather_snapshot = None;
                    state.advisory = None;
                    state.error = Some(format!("Could not load weather for {}: {}", location, e));
                });
                return;
            }
        };

        let snapshot = normalize(&raw.current, &raw.forecast, self.timezone);

        if !self.is_current(generation) {
            tracing::debug!(generation, "Superseded before enrichment, skipping advisory");
            return;
        }

        let advisory = self.enricher.get_advisory(&snapshot).await;

        self.commit(generation, |state| {
            tracing::info!(
                generation,
                location = %location,
                forecast_entries = snapshot.forecast.len(),
                advisory = advisory.is_some(),
                "Weather cycle ready"
            );
            state.phase = Phase::Ready;
            state.loading = false;
            state.weather_snapshot = Some(snapshot);
            state.advisory = advisory;
            state.error = None;
        });
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
            == generation
    }

    fn commit<F>(&self, generation: u64, apply: F) -> bool
    where
        F: FnOnce(&mut ViewState),
    {
        let mut state = self.write_state();
        if state.generation != generation {
            tracing::debug!(
                generation,
                latest = state.generation,
                "Discarding result of superseded cycle"
            );
            return false;
        }
        apply(&mut state);
        true
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ViewState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
