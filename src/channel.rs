//! Alert level to destination channel resolution

use crate::types::AlertLevel;
use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc, Weekday};
use std::collections::HashMap;
use std::fmt;

/// Maps an alert level to a channel name or id
pub trait ChannelResolver: Send + Sync + fmt::Debug {
    fn resolve(&self, level: AlertLevel) -> String;
}

/// Explicit level map with a default for unmapped levels
#[derive(Debug, Clone, Default)]
pub struct MapChannelResolver {
    pub channels: HashMap<AlertLevel, String>,
    pub default_channel: String,
}

impl MapChannelResolver {
    pub fn new(default_channel: impl Into<String>) -> Self {
        Self {
            channels: HashMap::new(),
            default_channel: default_channel.into(),
        }
    }

    pub fn with_channel(mut self, level: AlertLevel, channel: impl Into<String>) -> Self {
        self.channels.insert(level, channel.into());
        self
    }
}

impl ChannelResolver for MapChannelResolver {
    fn resolve(&self, level: AlertLevel) -> String {
        self.channels
            .get(&level)
            .cloned()
            .unwrap_or_else(|| self.default_channel.clone())
    }
}

/// Routes to an on-call channel outside business hours.
///
/// Business hours are Monday to Friday, `[start_hour, end_hour)` in the
/// configured UTC offset. An escalation channel, if set, receives every
/// ERROR regardless of time.
#[derive(Debug, Clone)]
pub struct BusinessHoursResolver {
    pub business_channel: String,
    pub after_hours_channel: String,
    pub escalation_channel: Option<String>,
    pub start_hour: u32,
    pub end_hour: u32,
    pub offset: FixedOffset,
}

impl BusinessHoursResolver {
    pub fn new(business_channel: impl Into<String>, after_hours_channel: impl Into<String>) -> Self {
        Self {
            business_channel: business_channel.into(),
            after_hours_channel: after_hours_channel.into(),
            escalation_channel: None,
            start_hour: 9,
            end_hour: 18,
            offset: Utc.fix(),
        }
    }

    pub fn with_escalation(mut self, channel: impl Into<String>) -> Self {
        self.escalation_channel = Some(channel.into());
        self
    }

    pub fn with_hours(mut self, start_hour: u32, end_hour: u32, offset: FixedOffset) -> Self {
        self.start_hour = start_hour;
        self.end_hour = end_hour;
        self.offset = offset;
        self
    }

    pub fn is_business_hours(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.offset);
        let weekday = !matches!(local.weekday(), Weekday::Sat | Weekday::Sun);
        weekday && (self.start_hour..self.end_hour).contains(&local.hour())
    }

    /// Resolution at an explicit instant
    pub fn resolve_at(&self, level: AlertLevel, at: DateTime<Utc>) -> String {
        if level == AlertLevel::Error {
            if let Some(channel) = &self.escalation_channel {
                return channel.clone();
            }
        }

        if self.is_business_hours(at) {
            self.business_channel.clone()
        } else {
            self.after_hours_channel.clone()
        }
    }
}

impl ChannelResolver for BusinessHoursResolver {
    fn resolve(&self, level: AlertLevel) -> String {
        self.resolve_at(level, Utc::now())
    }
}
