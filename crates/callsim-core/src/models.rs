//! Domain models for simulated calls and the records delivered downstream.
//!
//! [`Call`] is the only stateful entity. Its lifecycle is the fixed total
//! order Calling → Ringing → Answered → Ended, enforced by keeping the event
//! fields private and advancing them solely through [`Call::advance`].
//! [`CallStatus`] and [`Cdr`] are wire records serialized as camelCase JSON.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// Opaque identifier of a simulated call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Wraps an already generated identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lifecycle stage of a call, serialized as its numeric wire code (1-4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    /// Call is being placed.
    Calling,
    /// Callee is ringing.
    Ringing,
    /// Callee answered.
    Answered,
    /// Call finished.
    Ended,
}

impl EventType {
    /// Every stage in lifecycle order.
    pub const LIFECYCLE: [EventType; 4] =
        [EventType::Calling, EventType::Ringing, EventType::Answered, EventType::Ended];

    /// Returns the stage that follows this one. `Ended` maps to itself.
    pub fn next(self) -> Self {
        match self {
            Self::Calling => Self::Ringing,
            Self::Ringing => Self::Answered,
            Self::Answered | Self::Ended => Self::Ended,
        }
    }

    /// Numeric code used on the wire.
    pub fn code(self) -> u8 {
        match self {
            Self::Calling => 1,
            Self::Ringing => 2,
            Self::Answered => 3,
            Self::Ended => 4,
        }
    }

    /// Whether the call has reached its final stage.
    pub fn is_terminal(self) -> bool {
        self == Self::Ended
    }
}

impl TryFrom<u8> for EventType {
    type Error = CoreError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Calling),
            2 => Ok(Self::Ringing),
            3 => Ok(Self::Answered),
            4 => Ok(Self::Ended),
            other => Err(CoreError::InvalidEventType(other)),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Calling => "calling",
            Self::Ringing => "ringing",
            Self::Answered => "answered",
            Self::Ended => "ended",
        };
        f.write_str(name)
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        Self::try_from(code).map_err(serde::de::Error::custom)
    }
}

/// Immutable identity of a call, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallIdentity {
    /// Unique call identifier.
    pub id: CallId,
    /// Account the simulated traffic belongs to.
    pub account_id: String,
    /// Service type of the account.
    pub service_type: i32,
    /// Calling party number.
    pub caller: String,
    /// Called party number.
    pub callee: String,
}

/// A simulated in-flight call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    identity: CallIdentity,
    subscription_id: String,
    user_data: String,
    event_type: EventType,
    history: Vec<EventType>,
    started_at: DateTime<Utc>,
    event_at: DateTime<Utc>,
}

impl Call {
    /// Creates a call in the `Calling` stage with a single-entry history.
    pub fn new(identity: CallIdentity, started_at: DateTime<Utc>) -> Self {
        Self {
            identity,
            subscription_id: format!("sim_{}", started_at.format("%Y%m%d%H%M%S")),
            user_data: format!("{{\"startTime\":\"{}\"}}", started_at.timestamp()),
            event_type: EventType::Calling,
            history: vec![EventType::Calling],
            started_at,
            event_at: started_at,
        }
    }

    /// Moves the call to its next stage and returns it.
    ///
    /// Returns `None` without touching the call when it is already `Ended`;
    /// the caller is expected to purge it instead.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Option<EventType> {
        if self.event_type.is_terminal() {
            return None;
        }

        let next = self.event_type.next();
        self.event_type = next;
        self.history.push(next);
        self.event_at = now;
        Some(next)
    }

    /// Call identifier.
    pub fn id(&self) -> &CallId {
        &self.identity.id
    }

    /// Immutable identity fields.
    pub fn identity(&self) -> &CallIdentity {
        &self.identity
    }

    /// Current lifecycle stage.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Every stage the call has passed through, oldest first.
    pub fn history(&self) -> &[EventType] {
        &self.history
    }

    /// Creation timestamp.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Timestamp of the most recent transition.
    pub fn event_at(&self) -> DateTime<Utc> {
        self.event_at
    }

    /// Whether the call has reached `Ended`.
    pub fn is_ended(&self) -> bool {
        self.event_type.is_terminal()
    }

    /// Builds the status record describing the call's current stage.
    pub fn status(&self) -> CallStatus {
        CallStatus {
            account_id: self.identity.account_id.clone(),
            call_id: self.identity.id.clone(),
            service_type: self.identity.service_type,
            caller: self.identity.caller.clone(),
            callee: self.identity.callee.clone(),
            event_time: self.event_at.timestamp().to_string(),
            event_type: self.event_type,
            all_event_type: self.history.clone(),
            message_type: 1,
            phone_no_x: String::new(),
            phone_no_a: String::new(),
            phone_no_b: String::new(),
            party: 1,
            subscription_id: self.subscription_id.clone(),
            user_data: self.user_data.clone(),
        }
    }
}

/// Point-in-time lifecycle notification for an in-progress call.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStatus {
    pub account_id: String,
    pub call_id: CallId,
    pub service_type: i32,
    pub caller: String,
    pub callee: String,
    /// Unix seconds of the transition, as a string.
    pub event_time: String,
    pub event_type: EventType,
    pub all_event_type: Vec<EventType>,
    pub message_type: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phone_no_x: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phone_no_a: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phone_no_b: String,
    pub party: i32,
    pub subscription_id: String,
    pub user_data: String,
}

/// Call Detail Record summarizing a completed call.
///
/// Timestamps are Unix milliseconds; `call_duration` is whole seconds and
/// always equals `(end_time - start_time) / 1000`.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cdr {
    pub account_id: String,
    pub call_id: CallId,
    pub service_type: i32,
    pub sub_service_type: i32,
    pub number_pool_no: String,
    pub caller: String,
    pub caller_country_iso_code: String,
    pub caller_province_code: String,
    pub caller_city_code: String,
    pub callee: String,
    pub callee_country_iso_code: String,
    pub callee_province_code: String,
    pub callee_city_code: String,
    pub begin_call_time: i64,
    pub ring_time: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub release_type: i32,
    pub call_duration: i64,
    pub call_result: i32,
    pub audio_record_flag: i32,
    pub cdr_create_time: i64,
    pub subscription_id: String,
    pub phone_no_x: String,
    pub phone_no_a: String,
    pub phone_no_b: String,
    pub secret_call_type: i32,
    pub message_type: i32,
    pub call_display_type: i32,
    pub cdr_type: i32,
    pub user_data: String,
}
