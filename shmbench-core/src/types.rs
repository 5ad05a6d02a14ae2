// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! All types validate their invariants at creation time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HardValidationError;

/// Longest name accepted by `shm_open` on Linux (NAME_MAX).
const MAX_REGION_NAME_LEN: usize = 255;

/// Number of event types the statistics server tracks.
pub const MAX_EVENT_TYPES: usize = 1024;

/// Validated POSIX shared memory object name.
///
/// Always stored with exactly one leading `/`. `"bb"` and `"/bb"` name the
/// same region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionName(String);

impl RegionName {
    /// Create a new RegionName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, HardValidationError> {
        let raw = name.into();
        let bare = raw.strip_prefix('/').unwrap_or(&raw);

        if bare.is_empty() {
            return Err(HardValidationError::InvalidRegionName {
                name: raw.clone(),
                reason: "Region name cannot be empty".to_string(),
            });
        }

        if bare.len() > MAX_REGION_NAME_LEN - 1 {
            return Err(HardValidationError::InvalidRegionName {
                name: raw.clone(),
                reason: format!(
                    "Region name too long: {} bytes (max {})",
                    bare.len(),
                    MAX_REGION_NAME_LEN - 1
                ),
            });
        }

        if bare.contains('/') || bare.contains('\0') {
            return Err(HardValidationError::InvalidRegionName {
                name: raw.clone(),
                reason: "Region name must not contain '/' or NUL after the leading slash"
                    .to_string(),
            });
        }

        Ok(Self(format!("/{}", bare)))
    }

    /// Name including the leading slash, as passed to `shm_open`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RegionName {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RegionName> for String {
    fn from(name: RegionName) -> Self {
        name.0
    }
}

/// Validated event type identifier (index into the event table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct EventId(u16);

impl EventId {
    /// Create a new EventId with validation.
    pub fn new(id: i64) -> Result<Self, HardValidationError> {
        if id < 0 || id >= MAX_EVENT_TYPES as i64 {
            return Err(HardValidationError::InvalidEventId {
                id,
                max: MAX_EVENT_TYPES,
            });
        }
        Ok(Self(id as u16))
    }

    /// Table index for this id.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for EventId {
    type Error = HardValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EventId> for i64 {
    fn from(id: EventId) -> Self {
        id.0 as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_name_adds_leading_slash() {
        assert_eq!(RegionName::new("agandhi-bb").unwrap().as_str(), "/agandhi-bb");
        assert_eq!(RegionName::new("/agandhi-bb").unwrap().as_str(), "/agandhi-bb");
    }

    #[test]
    fn test_region_name_rejects_bad_input() {
        assert!(RegionName::new("").is_err());
        assert!(RegionName::new("/").is_err());
        assert!(RegionName::new("a/b").is_err());
        assert!(RegionName::new("a\0b").is_err());
        assert!(RegionName::new("x".repeat(300)).is_err());
    }

    #[test]
    fn test_event_id_bounds() {
        assert!(EventId::new(0).is_ok());
        assert_eq!(EventId::new(1023).unwrap().index(), 1023);
        assert!(EventId::new(1024).is_err());
        assert!(EventId::new(-1).is_err());
    }

    #[test]
    fn test_region_name_serde_roundtrip_through_validation() {
        let name: RegionName = serde_yaml::from_str("bb-region").unwrap();
        assert_eq!(name.as_str(), "/bb-region");
        assert!(serde_yaml::from_str::<RegionName>("\"a/b\"").is_err());
    }
}
