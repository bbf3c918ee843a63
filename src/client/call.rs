//! Typed requests and outputs for running Perforce commands through the
//! engine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::{BoxError, CommandClient, ProgressHandle, Request};

use super::file::P4File;
use super::p4::P4Client;
use super::ztag::TagGroup;

/// Target changelist for operations that open or move files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Changelist {
    /// The workspace's default changelist.
    Default,
    /// An existing numbered changelist.
    Number(u32),
    /// A changelist found by exact description, created if absent.
    Description(String),
}

impl fmt::Display for Changelist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Changelist::Default => write!(f, "default"),
            Changelist::Number(n) => write!(f, "{}", n),
            Changelist::Description(d) => write!(f, "{}", d),
        }
    }
}

/// One Perforce command, ready to run against a [`P4Client`].
///
/// The enumeration is closed: there is no way to submit a request the
/// client does not know how to execute. `RunCmd` remains the escape hatch
/// for arbitrary `p4` commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum P4Call {
    /// Any `p4` command with explicit arguments.
    RunCmd { cmd: String, args: Vec<String> },
    /// Sync files, optionally pinned to a revision, optionally forced.
    SyncFiles {
        files: Vec<String>,
        revision: Option<u32>,
        force: bool,
    },
    /// Recursively sync complete folders.
    SyncFolders { folders: Vec<String> },
    /// `fstat` a set of files into [`P4File`] records.
    FilesToP4Files {
        files: Vec<String>,
        allow_invalid: bool,
    },
    /// `fstat` everything under a folder into [`P4File`] records.
    FolderToP4Files {
        folder: String,
        include_subfolders: bool,
        allow_invalid: bool,
    },
    /// Create a numbered changelist with the given description.
    MakeNewChangelist { description: String },
    /// Reopen files in another changelist.
    MoveFilesToChangelist {
        files: Vec<String>,
        changelist: Changelist,
    },
    /// Open files for edit.
    EditFiles {
        files: Vec<String>,
        changelist: Changelist,
    },
    /// Open files for add.
    AddFiles {
        files: Vec<String>,
        changelist: Changelist,
    },
    /// Mark files for delete.
    DeleteFiles {
        files: Vec<String>,
        changelist: Changelist,
    },
    /// Move-rename a file.
    RenameFile {
        old_path: String,
        new_path: String,
        changelist: Changelist,
    },
    /// Copy a file to a new depot location.
    CopyFile {
        original_path: String,
        copied_path: String,
        changelist: Changelist,
    },
    /// Revert files, optionally only those left unchanged.
    RevertFiles {
        files: Vec<String>,
        unchanged_only: bool,
    },
    /// List the depot paths of every file in a changelist.
    GetFilesInChangelist { changelist: Changelist },
    /// Submit a numbered changelist.
    SubmitChangelist { changelist: u32 },
}

impl Request for P4Call {
    fn method(&self) -> &str {
        match self {
            P4Call::RunCmd { .. } => "run_cmd",
            P4Call::SyncFiles { .. } => "sync_files",
            P4Call::SyncFolders { .. } => "sync_folders",
            P4Call::FilesToP4Files { .. } => "files_to_p4files",
            P4Call::FolderToP4Files { .. } => "folder_to_p4files",
            P4Call::MakeNewChangelist { .. } => "make_new_changelist",
            P4Call::MoveFilesToChangelist { .. } => "move_files_to_changelist",
            P4Call::EditFiles { .. } => "edit_files",
            P4Call::AddFiles { .. } => "add_files",
            P4Call::DeleteFiles { .. } => "delete_files",
            P4Call::RenameFile { .. } => "rename_file",
            P4Call::CopyFile { .. } => "copy_file",
            P4Call::RevertFiles { .. } => "revert_files",
            P4Call::GetFilesInChangelist { .. } => "get_files_in_changelist",
            P4Call::SubmitChangelist { .. } => "submit_changelist",
        }
    }
}

/// What a [`P4Call`] produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum P4Output {
    /// Raw tagged records, for commands without a richer shape.
    Records(Vec<TagGroup>),
    /// File records from the `fstat`-backed calls.
    Files(Vec<P4File>),
    /// Depot paths, from the changelist-listing call.
    Paths(Vec<String>),
    /// The number of a created or submitted changelist.
    Changelist(u32),
    /// Whether a move or copy went through without errors.
    Success(bool),
}

impl P4Output {
    /// The tagged records, if this output carries them.
    pub fn records(&self) -> Option<&[TagGroup]> {
        match self {
            P4Output::Records(records) => Some(records),
            _ => None,
        }
    }

    /// The file records, if this output carries them.
    pub fn files(&self) -> Option<&[P4File]> {
        match self {
            P4Output::Files(files) => Some(files),
            _ => None,
        }
    }

    /// The depot paths, if this output carries them.
    pub fn paths(&self) -> Option<&[String]> {
        match self {
            P4Output::Paths(paths) => Some(paths),
            _ => None,
        }
    }

    /// The changelist number, if this output carries one.
    pub fn changelist(&self) -> Option<u32> {
        match self {
            P4Output::Changelist(number) => Some(*number),
            _ => None,
        }
    }

    /// The move/copy success flag, if this output carries one.
    pub fn success(&self) -> Option<bool> {
        match self {
            P4Output::Success(flag) => Some(*flag),
            _ => None,
        }
    }
}

impl CommandClient for P4Client {
    type Request = P4Call;
    type Output = P4Output;

    fn invoke(&self, request: P4Call, progress: &ProgressHandle) -> Result<P4Output, BoxError> {
        let output = match request {
            P4Call::RunCmd { cmd, args } => P4Output::Records(self.run_cmd(&cmd, &args)?),
            P4Call::SyncFiles {
                files,
                revision,
                force,
            } => P4Output::Records(self.sync_files_with_progress(&files, revision, force, progress)?),
            P4Call::SyncFolders { folders } => P4Output::Records(self.sync_folders(&folders)?),
            P4Call::FilesToP4Files {
                files,
                allow_invalid,
            } => P4Output::Files(self.files_to_p4files(&files, allow_invalid)?),
            P4Call::FolderToP4Files {
                folder,
                include_subfolders,
                allow_invalid,
            } => P4Output::Files(self.folder_to_p4files(&folder, include_subfolders, allow_invalid)?),
            P4Call::MakeNewChangelist { description } => {
                P4Output::Changelist(self.make_new_changelist(&description)?)
            }
            P4Call::MoveFilesToChangelist { files, changelist } => {
                P4Output::Records(self.move_files_to_changelist(&files, &changelist)?)
            }
            P4Call::EditFiles { files, changelist } => {
                P4Output::Records(self.edit_files(&files, &changelist)?)
            }
            P4Call::AddFiles { files, changelist } => {
                P4Output::Records(self.add_files(&files, &changelist)?)
            }
            P4Call::DeleteFiles { files, changelist } => {
                P4Output::Records(self.delete_files(&files, &changelist)?)
            }
            P4Call::RenameFile {
                old_path,
                new_path,
                changelist,
            } => P4Output::Success(self.rename_file(&old_path, &new_path, &changelist)?),
            P4Call::CopyFile {
                original_path,
                copied_path,
                changelist,
            } => P4Output::Success(self.copy_file(&original_path, &copied_path, &changelist)?),
            P4Call::RevertFiles {
                files,
                unchanged_only,
            } => P4Output::Records(self.revert_files(&files, unchanged_only)?),
            P4Call::GetFilesInChangelist { changelist } => {
                P4Output::Paths(self.get_files_in_changelist(&changelist)?)
            }
            P4Call::SubmitChangelist { changelist } => {
                P4Output::Changelist(self.submit_changelist(changelist)?)
            }
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_follow_the_client_api() {
        let call = P4Call::SyncFolders {
            folders: vec!["//depot/proj".into()],
        };
        assert_eq!(call.method(), "sync_folders");

        let call = P4Call::MakeNewChangelist {
            description: "work".into(),
        };
        assert_eq!(call.method(), "make_new_changelist");

        let call = P4Call::RenameFile {
            old_path: "//depot/a.txt".into(),
            new_path: "//depot/b.txt".into(),
            changelist: Changelist::Default,
        };
        assert_eq!(call.method(), "rename_file");

        let call = P4Call::GetFilesInChangelist {
            changelist: Changelist::Number(1234),
        };
        assert_eq!(call.method(), "get_files_in_changelist");
    }

    #[test]
    fn changelist_display_forms() {
        assert_eq!(Changelist::Default.to_string(), "default");
        assert_eq!(Changelist::Number(27277).to_string(), "27277");
        assert_eq!(
            Changelist::Description("tools update".into()).to_string(),
            "tools update"
        );
    }

    #[test]
    fn output_accessors_are_variant_specific() {
        let output = P4Output::Changelist(42);
        assert_eq!(output.changelist(), Some(42));
        assert!(output.records().is_none());
        assert!(output.files().is_none());

        let output = P4Output::Records(Vec::new());
        assert!(output.records().is_some());
        assert!(output.changelist().is_none());

        let output = P4Output::Paths(vec!["//depot/a.txt".into()]);
        assert_eq!(output.paths().map(<[String]>::len), Some(1));
        assert!(output.success().is_none());

        let output = P4Output::Success(true);
        assert_eq!(output.success(), Some(true));
        assert!(output.paths().is_none());
    }
}
