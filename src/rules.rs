//! Notification rules and the weekly schedule predicate.
//!
//! A `NotificationRule` binds a channel, the group expected to acknowledge,
//! a weekly fire moment (weekday + wall-clock minute) and the template used
//! to render the notice body. Rules are validated once at construction and
//! never mutated afterwards; `RuleSet` preserves configuration order so two
//! rules firing in the same minute are always evaluated deterministically.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::{ChannelId, GroupId};

/// Errors raised while validating rule specifications.
#[derive(Error, Debug, PartialEq)]
pub enum RuleError {
    #[error("Weekday must be between 0 (Monday) and 6 (Sunday), got {weekday}")]
    InvalidWeekday { weekday: i8 },

    #[error("Time must be a valid 'HH:MM' value before 23:59, got {time:?}")]
    InvalidTime { time: String },
}

/// Raw rule specification as it appears in the rule file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub channel_id: ChannelId,
    pub group_id: GroupId,
    /// 0 = Monday .. 6 = Sunday.
    pub weekday: i8,
    /// Wall-clock fire time, "H:MM" or "HH:MM".
    pub time: String,
    #[serde(flatten)]
    pub template: NoticeTemplate,
}

/// Notice body template. Tagged so further notice shapes can be added
/// without touching the rule plumbing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoticeTemplate {
    MeetingMinutes {
        meeting_type: String,
        minutes_url: String,
    },
}

impl NoticeTemplate {
    /// Render the notice body. `group_mention` is the platform-formatted
    /// mention of the group expected to acknowledge.
    pub fn render(&self, group_mention: &str) -> String {
        match self {
            Self::MeetingMinutes {
                meeting_type,
                minutes_url,
            } => format!(
                "{group_mention}\nThe {meeting_type} meeting minutes are up:\n\
                 {minutes_url}\nPlease react once you have read them!"
            ),
        }
    }
}

/// A validated, immutable notification rule.
#[derive(Debug, Clone)]
pub struct NotificationRule {
    pub channel_id: ChannelId,
    pub group_id: GroupId,
    /// 0 = Monday .. 6 = Sunday.
    pub weekday: u8,
    /// Minute-precision fire time.
    pub time: NaiveTime,
    pub template: NoticeTemplate,
}

impl NotificationRule {
    /// Validate a raw specification. Fails fast on an out-of-range weekday
    /// or a malformed/out-of-range time.
    pub fn new(spec: RuleSpec) -> Result<Self, RuleError> {
        if !(0..=6).contains(&spec.weekday) {
            return Err(RuleError::InvalidWeekday {
                weekday: spec.weekday,
            });
        }

        let time = parse_time(&spec.time).ok_or(RuleError::InvalidTime {
            time: spec.time.clone(),
        })?;

        Ok(Self {
            channel_id: spec.channel_id,
            group_id: spec.group_id,
            weekday: spec.weekday as u8,
            time,
            template: spec.template,
        })
    }

    /// Schedule predicate: true iff `now` falls on this rule's weekday and
    /// its hour:minute equals the rule's fire time. Minute-grained — the
    /// rule fires on exactly one evaluation per matching week as long as the
    /// driving tick runs at least once per minute.
    pub fn fires_at(&self, now: NaiveDateTime) -> bool {
        now.weekday().num_days_from_monday() == u32::from(self.weekday)
            && now.hour() == self.time.hour()
            && now.minute() == self.time.minute()
    }
}

/// Parse and range-check a "H:MM"/"HH:MM" string.
///
/// Single-digit hours are left-padded before parsing. Any time at or after
/// 23:59 is rejected — the exclusion of "23:59" itself is intentional,
/// inherited behaviour; the latest accepted fire time is 23:58.
fn parse_time(raw: &str) -> Option<NaiveTime> {
    let padded = format!("{:0>5}", raw);
    let time = NaiveTime::parse_from_str(&padded, "%H:%M").ok()?;
    if time.hour() == 23 && time.minute() == 59 {
        return None;
    }
    Some(time)
}

/// Ordered, immutable collection of validated rules.
///
/// Iteration order is configuration order, which fixes the evaluation order
/// of rules that fire in the same minute.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<NotificationRule>,
}

impl RuleSet {
    /// Validate every specification; the first invalid rule aborts
    /// construction.
    pub fn new(specs: Vec<RuleSpec>) -> Result<Self, RuleError> {
        let rules = specs
            .into_iter()
            .map(NotificationRule::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[NotificationRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
