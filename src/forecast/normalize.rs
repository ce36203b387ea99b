use super::types::*;
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Number of forecast samples the dashboard shows.
pub const FORECAST_ENTRIES: usize = 7;

/// Maps the provider's primary condition keyword onto the icon taxonomy.
pub fn icon_category(condition: &str) -> IconCategory {
    match condition.trim().to_ascii_lowercase().as_str() {
        "clear" => IconCategory::Clear,
        "clouds" => IconCategory::Clouds,
        "rain" => IconCategory::Rain,
        _ => IconCategory::Other,
    }
}

/// Short English weekday (`Mon`, `Tue`, ...) of `ts` in the given zone.
pub fn day_label(ts: DateTime<Utc>, timezone: Tz) -> String {
    ts.with_timezone(&timezone).format("%a").to_string()
}

pub fn normalize(current: &CurrentResponse, forecast: &ForecastResponse, timezone: Tz) -> WeatherSnapshot {
    WeatherSnapshot {
        current: CurrentConditions::from(current),
        forecast: forecast
            .list
            .iter()
            .take(FORECAST_ENTRIES)
            .map(|item| ForecastEntry::from_item(item, timezone))
            .collect(),
    }
}

impl From<&CurrentResponse> for CurrentConditions {
    fn from(current: &CurrentResponse) -> Self {
        let precipitation_mm = current
            .rain
            .as_ref()
            .and_then(|r| r.get("1h"))
            .copied()
            .unwrap_or(0.0);

        let (condition_text, icon_category) = primary_condition(&current.weather);

        Self {
            location_name: current.name.clone(),
            temperature_celsius: current.main.temp,
            condition_text,
            humidity_percent: current.main.humidity,
            wind_speed: current.wind.speed,
            precipitation_mm,
            icon_category,
        }
    }
}

impl ForecastEntry {
    pub fn from_item(item: &ForecastItem, timezone: Tz) -> Self {
        let timestamp = item_timestamp(item);
        let (condition_text, icon_category) = primary_condition(&item.weather);

        Self {
            day_label: day_label(timestamp, timezone),
            timestamp,
            temperature_celsius: item.main.temp,
            condition_text,
            icon_category,
        }
    }
}

fn primary_condition(weather: &[WeatherCondition]) -> (String, IconCategory) {
    match weather.first() {
        Some(w) => (w.description.clone(), icon_category(&w.main)),
        None => (String::new(), IconCategory::Other),
    }
}

// `dt` is authoritative; `dt_txt` (UTC, "YYYY-MM-DD HH:MM:SS") only when `dt` is out of range.
fn item_timestamp(item: &ForecastItem) -> DateTime<Utc> {
    DateTime::from_timestamp(item.dt, 0)
        .or_else(|| {
            item.dt_txt
                .as_deref()
                .and_then(|txt| NaiveDateTime::parse_from_str(txt, "%Y-%m-%d %H:%M:%S").ok())
                .map(|naive| naive.and_utc())
        })
        .unwrap_or_default()
}
