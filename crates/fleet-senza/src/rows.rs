//! Rows printed by `senza … --output json`.

use bluegreen_fleet::{ACTIVE_WEIGHT, PASSIVE_WEIGHT};
use serde::Deserialize;
use serde::de::{Deserializer, Error as _};

/// Resource type of the stack itself in the event list.
pub const STACK_RESOURCE_TYPE: &str = "CloudFormation::Stack";

/// Status of a resource that finished creating.
pub const CREATE_COMPLETE: &str = "CREATE_COMPLETE";

/// Statuses after which a stack will never finish creating.
pub const CREATION_FAILED_STATUSES: [&str; 5] = [
    "CREATE_FAILED",
    "ROLLBACK_IN_PROGRESS",
    "DELETE_IN_PROGRESS",
    "DELETE_COMPLETE",
    "ROLLBACK_COMPLETE",
];

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn percent<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(value) => Ok(value),
        NumberOrText::Text(text) => text.trim().parse().map_err(D::Error::custom),
    }
}

/// One row of `senza instances`.
#[derive(Clone, Debug, Deserialize)]
pub struct InstanceRow {
    pub private_ip: String,
}

/// One row of `senza traffic <app>`.
#[derive(Clone, Debug, Deserialize)]
pub struct TrafficRow {
    pub version: String,

    #[serde(rename = "weight%", deserialize_with = "percent")]
    pub weight: f64,
}

#[allow(clippy::float_cmp)]
impl TrafficRow {
    /// Whether the version takes all traffic.
    pub fn is_active(&self) -> bool {
        self.weight == f64::from(ACTIVE_WEIGHT)
    }

    /// Whether the version takes no traffic at all.
    pub fn is_passive(&self) -> bool {
        self.weight == f64::from(PASSIVE_WEIGHT)
    }
}

/// One row of `senza traffic <app> <version> <weight>`.
#[derive(Clone, Debug, Deserialize)]
pub struct TrafficChangeRow {
    pub stack_name: String,
    pub version: String,

    #[serde(rename = "old_weight%", deserialize_with = "percent")]
    pub old_weight: f64,

    #[serde(rename = "new_weight%", deserialize_with = "percent")]
    pub new_weight: f64,
}

/// One row of `senza events`.
#[derive(Clone, Debug, Deserialize)]
pub struct EventRow {
    pub event_time: f64,
    pub resource_type: String,

    #[serde(rename = "ResourceStatus")]
    pub resource_status: String,
}

impl EventRow {
    /// Whether the event marks the whole stack as created.
    pub fn is_stack_created(&self) -> bool {
        self.resource_status == CREATE_COMPLETE && self.resource_type == STACK_RESOURCE_TYPE
    }

    /// Whether the event means the stack will never finish creating.
    pub fn is_creation_failed(&self) -> bool {
        CREATION_FAILED_STATUSES.contains(&self.resource_status.as_str())
    }
}

/// Latest event by event time; on equal times the one listed last wins.
pub fn latest_event(events: &[EventRow]) -> Option<&EventRow> {
    events
        .iter()
        .max_by(|a, b| a.event_time.total_cmp(&b.event_time))
}

/// Weight in whole percent, clamped to 0..=100.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn whole_percent(weight: f64) -> u8 {
    weight.clamp(0.0, 100.0).round() as u8
}
