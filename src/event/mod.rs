//! Resource events: the atomic unit of change.
//!
//! ```text
//! RawEvent ──validate──> ResourceEvent ──record──> ChangeRecord { seq, event }
//! (driver/wire)           (immutable)               (owned by ChangeMemory)
//! ```
//!
//! Drivers hand over [`RawEvent`]s exactly as they arrive. Validation turns
//! them into [`ResourceEvent`]s, which cannot be modified afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Sequence number assigned by the change memory.
pub type Seq = u64;

/// Opaque attributes carried through unmodified (size, checksum, content type).
///
/// Ordered so that documents render identically across rebuilds.
pub type Metadata = BTreeMap<String, String>;

/// Well-known metadata keys rendered into `rs:md` attributes.
pub mod meta_keys {
    pub const LENGTH: &str = "length";
    pub const HASH: &str = "hash";
    pub const TYPE: &str = "type";
}

// ============================================================================
// EventType
// ============================================================================

/// Kind of change. Closed set: unknown values are a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Create,
    Update,
    Delete,
}

impl EventType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Past-tense tag used by the changeset vocabulary (`rs:md change="..."`).
    pub const fn change_tag(self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Update => "updated",
            Self::Delete => "deleted",
        }
    }
}

impl FromStr for EventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" | "created" => Ok(Self::Create),
            "update" | "updated" => Ok(Self::Update),
            "delete" | "deleted" => Ok(Self::Delete),
            _ => Err(ValidationError::UnknownEventType(s.to_string())),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RawEvent
// ============================================================================

/// An event as produced by a harvest driver, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub resource_id: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl RawEvent {
    pub fn new(
        resource_id: impl Into<String>,
        event_type: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            event_type: event_type.into(),
            timestamp,
            metadata: Metadata::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl From<&ResourceEvent> for RawEvent {
    fn from(event: &ResourceEvent) -> Self {
        Self {
            resource_id: event.resource_id.clone(),
            event_type: event.event_type.as_str().to_string(),
            timestamp: event.timestamp,
            metadata: event.metadata.clone(),
        }
    }
}

// ============================================================================
// ResourceEvent
// ============================================================================

/// A validated change to one resource at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceEvent {
    resource_id: String,
    event_type: EventType,
    timestamp: DateTime<Utc>,
    metadata: Metadata,
}

impl ResourceEvent {
    pub fn new(
        resource_id: impl Into<String>,
        event_type: EventType,
        timestamp: DateTime<Utc>,
        metadata: Metadata,
    ) -> Result<Self, ValidationError> {
        let resource_id = resource_id.into();
        if resource_id.trim().is_empty() {
            return Err(ValidationError::EmptyResourceId);
        }
        Ok(Self {
            resource_id,
            event_type,
            timestamp,
            metadata,
        })
    }

    #[inline]
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    #[inline]
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl TryFrom<RawEvent> for ResourceEvent {
    type Error = ValidationError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        // Check id first: an empty id is the more fundamental defect.
        if raw.resource_id.trim().is_empty() {
            return Err(ValidationError::EmptyResourceId);
        }
        let event_type = raw.event_type.parse()?;
        Self::new(raw.resource_id, event_type, raw.timestamp, raw.metadata)
    }
}

// ============================================================================
// ChangeRecord
// ============================================================================

/// A recorded event together with its sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub seq: Seq,
    pub event: Arc<ResourceEvent>,
}

impl ChangeRecord {
    pub fn new(seq: Seq, event: ResourceEvent) -> Self {
        Self {
            seq,
            event: Arc::new(event),
        }
    }
}
