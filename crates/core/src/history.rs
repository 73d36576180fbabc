//! App snapshot modify-history records.
//!
//! Each snapshot row embeds a short, newest-first log of the realtime edits
//! made while it was the edit-version snapshot. The log is capped so the
//! JSON column stays small.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Maximum number of records kept per snapshot.
pub const MAX_MODIFY_HISTORY: usize = 10;

/// SMALLINT representation of a snapshot trigger mode.
pub type TriggerModeId = i16;

/// What caused a snapshot to be archived.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum SnapshotTriggerMode {
    /// Archived by the server as part of a release or recover.
    Auto = 1,
    /// Archived on explicit user request.
    Manual = 2,
}

impl SnapshotTriggerMode {
    pub fn id(self) -> TriggerModeId {
        self as TriggerModeId
    }
}

impl From<SnapshotTriggerMode> for TriggerModeId {
    fn from(value: SnapshotTriggerMode) -> Self {
        value as TriggerModeId
    }
}

impl TryFrom<TriggerModeId> for SnapshotTriggerMode {
    type Error = CoreError;

    fn try_from(value: TriggerModeId) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SnapshotTriggerMode::Auto),
            2 => Ok(SnapshotTriggerMode::Manual),
            other => Err(CoreError::Validation(format!(
                "Unknown snapshot trigger mode {other}"
            ))),
        }
    }
}

/// One audit line describing a realtime edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppModifyHistory {
    /// Signal code of the operation (see [`crate::signal::Signal`]).
    pub operation: i32,
    /// Target code of the operation (see [`crate::signal::Target`]).
    pub operation_target: i32,
    /// Display name the operation touched, if any.
    pub operation_target_name: String,
    pub modified_by: DbId,
    pub modified_at: Timestamp,
}

impl AppModifyHistory {
    pub fn new(
        operation: i32,
        operation_target: i32,
        operation_target_name: impl Into<String>,
        modified_by: DbId,
    ) -> Self {
        Self {
            operation,
            operation_target,
            operation_target_name: operation_target_name.into(),
            modified_by,
            modified_at: chrono::Utc::now(),
        }
    }
}

/// Prepend `record` and drop anything past [`MAX_MODIFY_HISTORY`].
pub fn push_modify_history(history: &mut Vec<AppModifyHistory>, record: AppModifyHistory) {
    history.insert(0, record);
    history.truncate(MAX_MODIFY_HISTORY);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: usize) -> AppModifyHistory {
        AppModifyHistory::new(7, 1, format!("widget{n}"), 1)
    }

    #[test]
    fn newest_record_comes_first() {
        let mut history = Vec::new();
        push_modify_history(&mut history, record(1));
        push_modify_history(&mut history, record(2));
        assert_eq!(history[0].operation_target_name, "widget2");
        assert_eq!(history[1].operation_target_name, "widget1");
    }

    #[test]
    fn history_is_capped_at_ten() {
        let mut history = Vec::new();
        for n in 1..=15 {
            push_modify_history(&mut history, record(n));
        }
        assert_eq!(history.len(), MAX_MODIFY_HISTORY);
        let names: Vec<_> = history
            .iter()
            .map(|h| h.operation_target_name.as_str())
            .collect();
        assert_eq!(
            names,
            (6..=15).rev().map(|n| format!("widget{n}")).collect::<Vec<_>>()
        );
    }

    #[test]
    fn trigger_mode_codes() {
        assert_eq!(SnapshotTriggerMode::Auto.id(), 1);
        assert_eq!(SnapshotTriggerMode::try_from(2).unwrap(), SnapshotTriggerMode::Manual);
        assert!(SnapshotTriggerMode::try_from(3).is_err());
    }

    #[test]
    fn record_serializes_camel_case() {
        let value = serde_json::to_value(record(1)).unwrap();
        assert_eq!(value["operationTargetName"], "widget1");
        assert_eq!(value["modifiedBy"], 1);
        assert!(value["modifiedAt"].is_string());
    }
}
