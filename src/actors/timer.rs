//! Timer requests, identities and the per-timer schedule record.

use super::errors::{TimerError, TimerResult};
use super::schedule::{parse_due_time, parse_period, parse_ttl, Period};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const KEY_SEPARATOR: &str = "||";

/// Request to register (or replace) an actor timer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimerRequest {
    pub actor_type: String,
    pub actor_id: String,
    pub name: String,
    #[serde(default)]
    pub due_time: String,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub ttl: String,
    #[serde(default)]
    pub callback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl CreateTimerRequest {
    pub fn new(
        actor_type: impl Into<String>,
        actor_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            actor_type: actor_type.into(),
            actor_id: actor_id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_due_time(mut self, due_time: impl Into<String>) -> Self {
        self.due_time = due_time.into();
        self
    }

    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = period.into();
        self
    }

    pub fn with_ttl(mut self, ttl: impl Into<String>) -> Self {
        self.ttl = ttl.into();
        self
    }

    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = callback.into();
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn key(&self) -> TimerKey {
        TimerKey::new(&self.actor_type, &self.actor_id, &self.name)
    }
}

/// Request to remove an actor timer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTimerRequest {
    pub actor_type: String,
    pub actor_id: String,
    pub name: String,
}

impl DeleteTimerRequest {
    pub fn new(
        actor_type: impl Into<String>,
        actor_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            actor_type: actor_type.into(),
            actor_id: actor_id.into(),
            name: name.into(),
        }
    }

    pub fn key(&self) -> TimerKey {
        TimerKey::new(&self.actor_type, &self.actor_id, &self.name)
    }
}

/// Composite key of an actor instance: `type||id`
pub fn actor_key(actor_type: &str, actor_id: &str) -> String {
    format!("{actor_type}{KEY_SEPARATOR}{actor_id}")
}

/// Timer identity: actor type, actor id and timer name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub actor_type: String,
    pub actor_id: String,
    pub name: String,
}

impl TimerKey {
    pub fn new(actor_type: &str, actor_id: &str, name: &str) -> Self {
        Self {
            actor_type: actor_type.to_string(),
            actor_id: actor_id.to_string(),
            name: name.to_string(),
        }
    }

    pub fn actor_key(&self) -> String {
        actor_key(&self.actor_type, &self.actor_id)
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}",
            self.actor_type, self.actor_id, self.name
        )
    }
}

/// Schedule state of one registered timer.
///
/// Mutated only by the task running the timer.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerRecord {
    pub key: TimerKey,
    pub callback: String,
    pub data: Option<serde_json::Value>,
    /// Instant of the first tick
    pub registered_time: DateTime<Utc>,
    pub period: Option<Period>,
    pub expiration: Option<DateTime<Utc>>,
    /// Original schedule strings, kept for logging
    pub due_time_spec: String,
    pub period_spec: String,
    pub ttl_spec: String,
    ticks_executed: u32,
}

impl TimerRecord {
    /// Builds the record for `request` as of `now`.
    pub fn from_request(request: &CreateTimerRequest, now: DateTime<Utc>) -> TimerResult<Self> {
        let registered_time = parse_due_time(&request.due_time, now)?;
        let period = parse_period(&request.period)?;
        let expiration = parse_ttl(&request.ttl, registered_time)?;

        if let Some(expiration) = expiration {
            if expiration <= now || expiration < registered_time {
                return Err(TimerError::AlreadyExpired {
                    timer_key: request.key().to_string(),
                    ttl: request.ttl.clone(),
                });
            }
        }

        Ok(Self {
            key: request.key(),
            callback: request.callback.clone(),
            data: request.data.clone(),
            registered_time,
            period,
            expiration,
            due_time_spec: request.due_time.clone(),
            period_spec: request.period.clone(),
            ttl_spec: request.ttl.clone(),
            ticks_executed: 0,
        })
    }

    pub fn ticks_executed(&self) -> u32 {
        self.ticks_executed
    }

    /// Instant of the next pending tick
    pub fn next_tick(&self) -> DateTime<Utc> {
        let Some(period) = self.period else {
            return self.registered_time;
        };
        period
            .interval
            .checked_mul(self.ticks_executed)
            .and_then(|offset| chrono::Duration::from_std(offset).ok())
            .and_then(|offset| self.registered_time.checked_add_signed(offset))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Records a delivered tick; returns true when no ticks remain.
    pub fn tick_executed(&mut self) -> bool {
        self.ticks_executed = self.ticks_executed.saturating_add(1);
        match self.period {
            None => true,
            Some(Period {
                repetitions: Some(total),
                ..
            }) => self.ticks_executed >= total,
            Some(_) => false,
        }
    }
}
