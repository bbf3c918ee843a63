//! Per-file bookkeeping derived from `fstat` output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ztag::TagGroup;

/// Condensed state of one file relative to the depot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    OpenForDelete,
    NeedSync,
    DepotOnly,
    OpenForAdd,
    OpenForEdit,
    Untracked,
    Moved,
    UpToDate,
    /// Server unreachable or state otherwise undeterminable.
    Unknown,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::OpenForDelete => "OPEN_FOR_DELETE",
            FileStatus::NeedSync => "NEED_SYNC",
            FileStatus::DepotOnly => "DEPOT_ONLY",
            FileStatus::OpenForAdd => "OPEN_FOR_ADD",
            FileStatus::OpenForEdit => "OPEN_FOR_EDIT",
            FileStatus::Untracked => "UNTRACKED",
            FileStatus::Moved => "MOVED",
            FileStatus::UpToDate => "UP_TO_DATE",
            FileStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One file as the depot sees it.
///
/// Built from a single `fstat` record; fields the record does not carry
/// stay `None`. Files reported while the server is offline carry only a
/// local path and a forced [`FileStatus::Unknown`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct P4File {
    local_path: Option<String>,
    depot_path: Option<String>,
    have_revision: Option<u32>,
    head_revision: Option<u32>,
    action: Option<String>,
    head_action: Option<String>,
    checked_out_by: Vec<String>,
    last_submit_time: Option<DateTime<Utc>>,
    raw_data: String,
    forced_status: Option<FileStatus>,
}

impl P4File {
    /// Builds a file record from one `fstat` tag group.
    pub(crate) fn from_fstat(group: &TagGroup) -> Self {
        let checked_out_by = group
            .iter()
            .filter(|(key, _)| key.starts_with("otherOpen") && key.as_str() != "otherOpen")
            .map(|(_, value)| value.clone())
            .collect();

        let raw_data = group
            .iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            local_path: group.get("clientFile").cloned(),
            depot_path: group.get("depotFile").cloned(),
            have_revision: group.get("haveRev").and_then(|v| v.parse().ok()),
            head_revision: group.get("headRev").and_then(|v| v.parse().ok()),
            action: group.get("action").cloned(),
            head_action: group.get("headAction").cloned(),
            checked_out_by,
            last_submit_time: group
                .get("headTime")
                .and_then(|v| v.parse::<i64>().ok())
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            raw_data,
            forced_status: None,
        }
    }

    /// A placeholder record for when the server cannot be reached.
    pub(crate) fn offline(local_path: String) -> Self {
        Self {
            local_path: Some(local_path),
            raw_data: "HOST OFFLINE".to_string(),
            forced_status: Some(FileStatus::Unknown),
            ..Default::default()
        }
    }

    /// A record for a file the depot has never heard of; the diagnostic
    /// line carries the local path before the ` - no such file(s)` suffix.
    pub(crate) fn untracked(local_path: String, diagnostic: String) -> Self {
        Self {
            local_path: Some(local_path),
            raw_data: diagnostic,
            forced_status: None,
            ..Default::default()
        }
    }

    pub fn local_path(&self) -> Option<&str> {
        self.local_path.as_deref()
    }

    pub fn depot_path(&self) -> Option<&str> {
        self.depot_path.as_deref()
    }

    pub fn have_revision(&self) -> Option<u32> {
        self.have_revision
    }

    pub fn head_revision(&self) -> Option<u32> {
        self.head_revision
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn head_action(&self) -> Option<&str> {
        self.head_action.as_deref()
    }

    /// Users with this file open in other workspaces.
    pub fn checked_out_by(&self) -> &[String] {
        &self.checked_out_by
    }

    pub fn last_submit_time(&self) -> Option<DateTime<Utc>> {
        self.last_submit_time
    }

    /// The raw record this file was built from, for diagnostics.
    pub fn raw_data(&self) -> &str {
        &self.raw_data
    }

    pub fn is_valid(&self) -> bool {
        self.local_path.is_some() || self.depot_path.is_some()
    }

    pub fn is_open_for_add(&self) -> bool {
        self.action.as_deref() == Some("add")
    }

    pub fn is_open_for_edit(&self) -> bool {
        self.action.as_deref() == Some("edit")
    }

    /// Open for any action in this workspace.
    pub fn is_checked_out(&self) -> bool {
        self.action.is_some()
    }

    /// Known locally but never added to the depot.
    pub fn is_untracked(&self) -> bool {
        self.raw_data.contains("no such file(s)")
    }

    pub fn is_local_only(&self) -> bool {
        self.is_untracked()
    }

    /// Exists in the depot but was never synced to this workspace.
    pub fn is_depot_only(&self) -> bool {
        self.have_revision.is_none() && self.head_revision.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.head_action.as_deref() == Some("delete")
    }

    pub fn is_marked_for_delete(&self) -> bool {
        self.action.as_deref() == Some("delete")
    }

    pub fn is_moved_deleted(&self) -> bool {
        self.action.as_deref() == Some("move/delete")
            || self.head_action.as_deref() == Some("move/delete")
    }

    pub fn is_moved_added(&self) -> bool {
        self.action.as_deref() == Some("move/add")
    }

    pub fn is_up_to_date(&self) -> bool {
        self.have_revision == self.head_revision
    }

    /// The head revision is newer than what the workspace has.
    ///
    /// Deleted, moved-deleted, and freshly opened (add/edit) files never
    /// need syncing.
    pub fn needs_syncing(&self) -> bool {
        if self.is_deleted() || self.is_moved_deleted() {
            return false;
        }
        if self.is_open_for_add() || self.is_open_for_edit() {
            return false;
        }
        match (self.have_revision, self.head_revision) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(have), Some(head)) => have < head,
        }
    }

    /// Condenses the record into one [`FileStatus`].
    ///
    /// The checks run in a fixed precedence so a file always gets its most
    /// actionable status (a file that is both behind head and open for
    /// edit reports the edit, matching how `fstat` consumers triage).
    pub fn status(&self) -> FileStatus {
        if let Some(forced) = self.forced_status {
            return forced;
        }
        if self.is_marked_for_delete() {
            return FileStatus::OpenForDelete;
        }
        if self.needs_syncing() {
            return FileStatus::NeedSync;
        }
        if self.is_depot_only() {
            return FileStatus::DepotOnly;
        }
        if self.is_open_for_add() {
            return FileStatus::OpenForAdd;
        }
        if self.is_open_for_edit() {
            return FileStatus::OpenForEdit;
        }
        if self.is_local_only() {
            return FileStatus::Untracked;
        }
        if self.is_moved_added() {
            return FileStatus::Moved;
        }
        if self.have_revision == self.head_revision {
            return FileStatus::UpToDate;
        }
        FileStatus::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(fields: &[(&str, &str)]) -> TagGroup {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn builds_from_fstat_record() {
        let file = P4File::from_fstat(&group(&[
            ("depotFile", "//depot/a.txt"),
            ("clientFile", "/work/a.txt"),
            ("haveRev", "2"),
            ("headRev", "3"),
            ("headTime", "1700000000"),
            ("action", "edit"),
            ("otherOpen0", "alice@ws-alice"),
            ("otherOpen1", "bob@ws-bob"),
            ("otherOpen", "2"),
        ]));

        assert_eq!(file.depot_path(), Some("//depot/a.txt"));
        assert_eq!(file.local_path(), Some("/work/a.txt"));
        assert_eq!(file.have_revision(), Some(2));
        assert_eq!(file.head_revision(), Some(3));
        assert!(file.last_submit_time().is_some());
        assert_eq!(file.checked_out_by(), ["alice@ws-alice", "bob@ws-bob"]);
        assert!(file.is_checked_out());
        assert!(file.is_valid());
    }

    #[test]
    fn unparseable_revisions_become_none() {
        let file = P4File::from_fstat(&group(&[
            ("depotFile", "//depot/a.txt"),
            ("haveRev", "none"),
            ("headRev", "4"),
        ]));
        assert_eq!(file.have_revision(), None);
        assert_eq!(file.head_revision(), Some(4));
        assert!(file.is_depot_only());
    }

    #[test]
    fn status_precedence_delete_beats_sync() {
        let file = P4File::from_fstat(&group(&[
            ("depotFile", "//depot/a.txt"),
            ("haveRev", "1"),
            ("headRev", "3"),
            ("action", "delete"),
        ]));
        assert_eq!(file.status(), FileStatus::OpenForDelete);
    }

    #[test]
    fn status_need_sync_when_behind_head() {
        let file = P4File::from_fstat(&group(&[
            ("depotFile", "//depot/a.txt"),
            ("haveRev", "1"),
            ("headRev", "3"),
        ]));
        assert!(file.needs_syncing());
        assert_eq!(file.status(), FileStatus::NeedSync);
    }

    #[test]
    fn open_for_edit_file_does_not_need_syncing() {
        let file = P4File::from_fstat(&group(&[
            ("depotFile", "//depot/a.txt"),
            ("haveRev", "1"),
            ("headRev", "3"),
            ("action", "edit"),
        ]));
        assert!(!file.needs_syncing());
        assert_eq!(file.status(), FileStatus::OpenForEdit);
    }

    #[test]
    fn status_up_to_date() {
        let file = P4File::from_fstat(&group(&[
            ("depotFile", "//depot/a.txt"),
            ("haveRev", "3"),
            ("headRev", "3"),
        ]));
        assert!(file.is_up_to_date());
        assert_eq!(file.status(), FileStatus::UpToDate);
    }

    #[test]
    fn untracked_file_from_diagnostic() {
        let file = P4File::untracked(
            "/work/new.txt".to_string(),
            "/work/new.txt - no such file(s).".to_string(),
        );
        assert!(file.is_untracked());
        assert!(file.is_local_only());
        assert_eq!(file.status(), FileStatus::Untracked);
    }

    #[test]
    fn offline_file_is_unknown() {
        let file = P4File::offline("/work/a.txt".to_string());
        assert_eq!(file.status(), FileStatus::Unknown);
        assert_eq!(file.raw_data(), "HOST OFFLINE");
        assert!(file.is_valid());
    }

    #[test]
    fn moved_added_status() {
        let file = P4File::from_fstat(&group(&[
            ("depotFile", "//depot/b.txt"),
            ("haveRev", "1"),
            ("headRev", "1"),
            ("action", "move/add"),
        ]));
        assert_eq!(file.status(), FileStatus::Moved);
    }
}
