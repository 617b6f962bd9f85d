//! Resource set: the deduplicated state of every known resource.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BuildWarning;
use crate::event::{ChangeRecord, EventType, Metadata, RawEvent, ResourceEvent};

/// Latest known state of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ResourceState {
    Present {
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        metadata: Metadata,
    },
    Absent {
        timestamp: DateTime<Utc>,
    },
}

impl ResourceState {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Present { timestamp, .. } | Self::Absent { timestamp } => *timestamp,
        }
    }
}

/// Mapping from resource id to its latest state, last write wins.
///
/// Keyed by a `BTreeMap` so iteration is already in `resource_id` order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceSet {
    entries: BTreeMap<String, ResourceState>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event on top of the current state.
    pub fn apply(&mut self, event: &ResourceEvent) {
        let state = match event.event_type() {
            EventType::Create | EventType::Update => ResourceState::Present {
                timestamp: event.timestamp(),
                metadata: event.metadata().clone(),
            },
            EventType::Delete => ResourceState::Absent {
                timestamp: event.timestamp(),
            },
        };
        self.entries.insert(event.resource_id().to_string(), state);
    }

    /// Apply a raw event, skipping it with a warning when it does not validate.
    pub fn apply_raw(&mut self, raw: RawEvent) -> Result<(), BuildWarning> {
        let resource_id = raw.resource_id.clone();
        match ResourceEvent::try_from(raw) {
            Ok(event) => {
                self.apply(&event);
                Ok(())
            }
            Err(error) => Err(BuildWarning {
                seq: None,
                resource_id,
                error,
            }),
        }
    }

    /// Drop tombstones. Absent resources never reach an inventory.
    pub fn forget_absent(&mut self) {
        self.entries.retain(|_, state| state.is_present());
    }

    pub fn get(&self, resource_id: &str) -> Option<&ResourceState> {
        self.entries.get(resource_id)
    }

    pub fn contains_present(&self, resource_id: &str) -> bool {
        self.get(resource_id).is_some_and(ResourceState::is_present)
    }

    /// Present resources in ascending `resource_id` order.
    pub fn present(&self) -> impl Iterator<Item = (&str, DateTime<Utc>, &Metadata)> {
        self.entries.iter().filter_map(|(id, state)| match state {
            ResourceState::Present {
                timestamp,
                metadata,
            } => Some((id.as_str(), *timestamp, metadata)),
            ResourceState::Absent { .. } => None,
        })
    }

    pub fn present_count(&self) -> usize {
        self.entries.values().filter(|s| s.is_present()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fold recorded changes, in sequence order, on top of `base`.
pub fn fold<'a>(base: &ResourceSet, records: impl IntoIterator<Item = &'a ChangeRecord>) -> ResourceSet {
    let mut set = base.clone();
    for record in records {
        set.apply(&record.event);
    }
    set
}
