//! Life statistics derived from a stored birth date
//!
//! Birth dates are calendar dates (`YYYY-MM-DD`) taken as midnight UTC. All
//! figures use the absolute distance to "now", so a future date still yields
//! positive numbers.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{KeyValueStore, StorageError};

/// Storage key holding the birth date.
pub const BIRTH_DATE_KEY: &str = "birthDate";

const DATE_FORMAT: &str = "%Y-%m-%d";

const SECOND_MS: f64 = 1_000.0;
const MINUTE_MS: f64 = 60.0 * SECOND_MS;
const HOUR_MS: f64 = 60.0 * MINUTE_MS;
const DAY_MS: f64 = 24.0 * HOUR_MS;
/// Average month length used by the countdown.
const MONTH_MS: f64 = 30.44 * DAY_MS;
const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Error)]
pub enum BirthDateError {
    #[error("invalid birth date {0:?}, expected YYYY-MM-DD")]
    Invalid(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub fn parse_birth_date(raw: &str) -> Result<NaiveDate, BirthDateError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| BirthDateError::Invalid(raw.to_string()))
}

fn elapsed_ms(birth: NaiveDate, now: DateTime<Utc>) -> f64 {
    let birth = birth.and_time(NaiveTime::default()).and_utc();
    (now - birth).num_milliseconds().unsigned_abs() as f64
}

/// Rough lifetime totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifeStats {
    /// 70 beats per minute
    pub heartbeats: u64,
    /// 12 books per year
    pub books_could_read: u64,
    /// Whole years
    pub earth_revolutions: u64,
    /// 12 breaths per minute
    pub breaths_taken: u64,
    /// 2.5 words per minute over 16 waking hours
    pub words_said: u64,
    /// Hours asleep, at 8 hours per day
    pub sleep_time: u64,
}

impl LifeStats {
    pub fn between(birth: NaiveDate, now: DateTime<Utc>) -> Self {
        let days = (elapsed_ms(birth, now) / DAY_MS).ceil();
        let years = days / DAYS_PER_YEAR;

        Self {
            heartbeats: (days * 24.0 * 60.0 * 70.0).round() as u64,
            books_could_read: (years * 12.0).round() as u64,
            earth_revolutions: years.floor() as u64,
            breaths_taken: (days * 24.0 * 60.0 * 12.0).round() as u64,
            words_said: (days * 16.0 * 60.0 * 2.5).round() as u64,
            sleep_time: (days * 8.0).round() as u64,
        }
    }
}

/// Time lived, broken into countdown units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLived {
    pub months: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl TimeLived {
    pub fn between(birth: NaiveDate, now: DateTime<Utc>) -> Self {
        let ms = elapsed_ms(birth, now);

        Self {
            months: (ms / MONTH_MS).floor() as u64,
            days: ((ms % MONTH_MS) / DAY_MS).floor() as u64,
            hours: ((ms % DAY_MS) / HOUR_MS).floor() as u64,
            minutes: ((ms % HOUR_MS) / MINUTE_MS).floor() as u64,
            seconds: ((ms % MINUTE_MS) / SECOND_MS).floor() as u64,
        }
    }
}

/// Reads and writes the birth date through a [`KeyValueStore`].
#[derive(Clone)]
pub struct BirthDateBook {
    store: Arc<dyn KeyValueStore>,
}

impl BirthDateBook {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self) -> Result<Option<NaiveDate>, BirthDateError> {
        match self.store.get(BIRTH_DATE_KEY).await? {
            Some(raw) if !raw.trim().is_empty() => parse_birth_date(&raw).map(Some),
            _ => Ok(None),
        }
    }

    /// Validate and store `raw`, returning the parsed date.
    pub async fn save(&self, raw: &str) -> Result<NaiveDate, BirthDateError> {
        let date = parse_birth_date(raw)?;
        self.store
            .set(BIRTH_DATE_KEY, &date.format(DATE_FORMAT).to_string())
            .await?;
        Ok(date)
    }
}
