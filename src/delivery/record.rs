//! Timeline record model.
//!
//! A [`TimelineRecord`] is a partial update: only the fields that are `Some`
//! carry information. Several updates for the same record id fold into one
//! with [`TimelineRecord::merge_from`] before they are sent.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::steps::TaskResult;

/// Lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimelineRecordState {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueType {
    Error,
    Warning,
}

/// An error or warning attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl Issue {
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(IssueType::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(IssueType::Warning, message)
    }

    fn new(issue_type: IssueType, message: impl Into<String>) -> Self {
        Self {
            issue_type,
            category: None,
            message: message.into(),
            data: BTreeMap::new(),
        }
    }
}

/// Reference to a sub-timeline holding a record's details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineReference {
    pub id: Uuid,
}

/// Reference to an uploaded log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogReference {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A partial update to one record on a timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRecord {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<TimelineReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_complete: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TimelineRecordState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
}

impl TimelineRecord {
    /// An update that carries nothing but the record id.
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Fold a newer update into this one.
    ///
    /// Every field present in `newer` overwrites; absent fields (and empty
    /// strings) never erase what is already known. A non-empty issue list
    /// replaces the older list wholesale.
    ///
    /// # Example
    ///
    /// ```
    /// use hauler::delivery::{TimelineRecord, TimelineRecordState};
    /// use uuid::Uuid;
    ///
    /// let id = Uuid::new_v4();
    /// let mut record = TimelineRecord::new(id);
    /// record.name = Some("compile".into());
    ///
    /// let mut update = TimelineRecord::new(id);
    /// update.state = Some(TimelineRecordState::Completed);
    ///
    /// record.merge_from(update);
    /// assert_eq!(record.name.as_deref(), Some("compile"));
    /// assert_eq!(record.state, Some(TimelineRecordState::Completed));
    /// ```
    pub fn merge_from(&mut self, newer: TimelineRecord) {
        take(&mut self.parent_id, newer.parent_id);
        take_text(&mut self.name, newer.name);
        take_text(&mut self.record_type, newer.record_type);
        take(&mut self.order, newer.order);
        take_text(&mut self.current_operation, newer.current_operation);
        take(&mut self.details, newer.details);
        take(&mut self.log, newer.log);
        take(&mut self.percent_complete, newer.percent_complete);
        take(&mut self.result, newer.result);
        take_text(&mut self.result_code, newer.result_code);
        take(&mut self.state, newer.state);
        take(&mut self.start_time, newer.start_time);
        take(&mut self.finish_time, newer.finish_time);
        take_text(&mut self.worker_name, newer.worker_name);
        take(&mut self.error_count, newer.error_count);
        take(&mut self.warning_count, newer.warning_count);
        if !newer.issues.is_empty() {
            self.issues = newer.issues;
        }
    }
}

fn take<T>(slot: &mut Option<T>, newer: Option<T>) {
    if newer.is_some() {
        *slot = newer;
    }
}

fn take_text(slot: &mut Option<String>, newer: Option<String>) {
    if newer.as_deref().is_some_and(|s| !s.is_empty()) {
        *slot = newer;
    }
}

/// Coalesce updates by record id, keeping first-seen order.
///
/// Later updates are folded into earlier ones with
/// [`TimelineRecord::merge_from`].
pub fn merge_records(records: impl IntoIterator<Item = TimelineRecord>) -> Vec<TimelineRecord> {
    let mut merged: IndexMap<Uuid, TimelineRecord> = IndexMap::new();
    for record in records {
        match merged.get_mut(&record.id) {
            Some(existing) => existing.merge_from(record),
            None => {
                merged.insert(record.id, record);
            }
        }
    }
    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disjoint_partial_updates_merge() {
        let id = Uuid::new_v4();
        let mut first = TimelineRecord::new(id);
        first.name = Some("test".into());
        let mut second = TimelineRecord::new(id);
        second.state = Some(TimelineRecordState::Completed);

        let merged = merge_records(vec![first, second]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name.as_deref(), Some("test"));
        assert_eq!(merged[0].state, Some(TimelineRecordState::Completed));
    }

    #[test]
    fn later_present_fields_win() {
        let id = Uuid::new_v4();
        let mut first = TimelineRecord::new(id);
        first.state = Some(TimelineRecordState::InProgress);
        first.percent_complete = Some(10);
        let mut second = TimelineRecord::new(id);
        second.state = Some(TimelineRecordState::Completed);
        second.result = Some(TaskResult::Failed);

        let merged = merge_records(vec![first, second]);

        assert_eq!(merged[0].state, Some(TimelineRecordState::Completed));
        assert_eq!(merged[0].percent_complete, Some(10));
        assert_eq!(merged[0].result, Some(TaskResult::Failed));
    }

    #[test]
    fn empty_text_does_not_overwrite() {
        let id = Uuid::new_v4();
        let mut record = TimelineRecord::new(id);
        record.current_operation = Some("linking".into());
        let mut update = TimelineRecord::new(id);
        update.current_operation = Some(String::new());

        record.merge_from(update);
        assert_eq!(record.current_operation.as_deref(), Some("linking"));
    }

    #[test]
    fn issues_replace_only_when_non_empty() {
        let id = Uuid::new_v4();
        let mut record = TimelineRecord::new(id);
        record.issues = vec![Issue::warning("old")];

        record.merge_from(TimelineRecord::new(id));
        assert_eq!(record.issues, vec![Issue::warning("old")]);

        let mut update = TimelineRecord::new(id);
        update.issues = vec![Issue::error("new"), Issue::error("newer")];
        record.merge_from(update);
        assert_eq!(record.issues.len(), 2);
        assert_eq!(record.issues[0].message, "new");
    }

    #[test]
    fn merge_keeps_first_seen_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let merged = merge_records(vec![
            TimelineRecord::new(a),
            TimelineRecord::new(b),
            TimelineRecord::new(a),
        ]);
        let ids: Vec<_> = merged.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn serializes_only_present_fields() {
        let mut record = TimelineRecord::new(Uuid::nil());
        record.state = Some(TimelineRecordState::InProgress);
        let json = serde_json::to_value(&record).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["state"], "inProgress");
    }
}
