//! Blocking Perforce client.
//!
//! Every method shells out to the `p4` binary with tagged output enabled
//! and parses the result. Commands run from the workspace root so `p4`
//! picks up the `.p4config` file there. Long file lists are chunked to
//! stay under the command-line length limit.

use std::fs;
use std::io::Write as _;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::engine::ProgressHandle;

use super::call::Changelist;
use super::error::{ClientError, Result};
use super::file::P4File;
use super::util::{chunk_args, folder_wildcard, MAX_ARG_LEN};
use super::ztag::{error_group, is_error, parse_ztag, TagGroup};

const ONLINE_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Construction options for [`P4Client`].
///
/// Any field left `None` is discovered through `p4 set` (and, for the
/// workspace, the user's first client) at construction time.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// P4USER; discovered when `None`.
    pub user: Option<String>,
    /// P4CLIENT; discovered when `None`.
    pub client: Option<String>,
    /// P4PORT; discovered when `None`.
    pub server: Option<String>,
    /// Suppresses per-file diagnostics and config warnings. On by default
    /// to cut down on terminal spam.
    pub silent: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            user: None,
            client: None,
            server: None,
            silent: true,
        }
    }
}

/// Blocking client for one Perforce workspace.
///
/// All methods block the calling thread for the duration of the command.
/// Wrap the client in an [`AsyncP4Client`](super::AsyncP4Client) to run
/// commands through the operation engine instead.
#[derive(Debug)]
pub struct P4Client {
    perforce_root: PathBuf,
    user: String,
    client: String,
    server: String,
    silent: bool,
}

impl P4Client {
    /// Creates a client rooted at the given workspace directory.
    ///
    /// Walks up from the root looking for a `.p4config` file and re-roots
    /// onto the directory containing it. Settings not given in `options`
    /// are discovered via `p4 set`; failure to discover any of P4USER,
    /// P4CLIENT, or P4PORT is a [`ClientError::Workspace`] error.
    pub fn new(perforce_root: impl Into<PathBuf>, options: ClientOptions) -> Result<Self> {
        let mut root = perforce_root.into();

        match find_p4config_root(&root) {
            Some(config_root) => {
                info!(root = %config_root.display(), ".p4config found");
                root = config_root;
            }
            None if !options.silent => {
                warn!(root = %root.display(), "no .p4config file found");
            }
            None => {}
        }

        let user = match options.user {
            Some(user) => user,
            None => p4_setting(&root, "P4USER")?
                .ok_or_else(|| ClientError::Workspace("could not find P4USER".to_string()))?,
        };
        let client = match options.client {
            Some(client) => client,
            None => find_p4_client(&root, &user)?
                .ok_or_else(|| ClientError::Workspace("could not find P4CLIENT".to_string()))?,
        };
        let server = match options.server {
            Some(server) => server,
            None => p4_setting(&root, "P4PORT")?
                .ok_or_else(|| ClientError::Workspace("could not find P4PORT".to_string()))?,
        };

        Ok(Self {
            perforce_root: root,
            user,
            client,
            server,
            silent: options.silent,
        })
    }

    /// Creates a client rooted at the directory named by the `P4ROOT`
    /// environment variable.
    pub fn from_env(options: ClientOptions) -> Result<Self> {
        let root = std::env::var("P4ROOT").unwrap_or_default();
        Self::new(root, options)
    }

    pub fn perforce_root(&self) -> &Path {
        &self.perforce_root
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn client(&self) -> &str {
        &self.client
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Looks up a Perforce setting via `p4 set`.
    pub fn get_p4_setting(&self, setting: &str) -> Result<Option<String>> {
        p4_setting(&self.perforce_root, setting)
    }

    /// Every workspace belonging to this user.
    pub fn get_all_workspaces(&self) -> Result<Vec<String>> {
        let groups = self.run_cmd("clients", &["-u".to_string(), self.user.clone()])?;
        Ok(groups
            .iter()
            .filter_map(|group| group.get("client").cloned())
            .collect())
    }

    /// Probes the configured server address with a short TCP connect.
    pub fn host_online(&self) -> bool {
        host_online(&self.server)
    }

    /// Runs an arbitrary `p4` command with the workspace's global options
    /// and returns the parsed tagged records.
    ///
    /// Arguments are chunked so each invocation stays under the
    /// command-line length limit; records from all chunks are
    /// concatenated. Diagnostics `p4` writes outside the tagged stream
    /// come back as error records (`code` = `error`) rather than being
    /// lost. Like the interactive client, an unreachable server produces
    /// a warning and the command is attempted anyway.
    pub fn run_cmd(&self, cmd: &str, args: &[String]) -> Result<Vec<TagGroup>> {
        self.run_chunked(cmd, &[], args)
    }

    /// Syncs files to head, or to `revision` when given. `force` re-syncs
    /// files the workspace already has.
    pub fn sync_files(
        &self,
        files: &[String],
        revision: Option<u32>,
        force: bool,
    ) -> Result<Vec<TagGroup>> {
        self.sync_files_with_progress(files, revision, force, &ProgressHandle::disabled())
    }

    /// [`sync_files`](Self::sync_files), reporting per-chunk progress.
    pub fn sync_files_with_progress(
        &self,
        files: &[String],
        revision: Option<u32>,
        force: bool,
        progress: &ProgressHandle,
    ) -> Result<Vec<TagGroup>> {
        let files: Vec<String> = match revision {
            Some(rev) => files.iter().map(|path| format!("{}#{}", path, rev)).collect(),
            None => files.to_vec(),
        };
        let fixed: Vec<String> = if force {
            vec!["-f".to_string()]
        } else {
            Vec::new()
        };

        self.warn_if_offline();
        let chunks = chunk_args(&files, MAX_ARG_LEN);
        let total = chunks.len();
        let mut groups = Vec::new();
        for (done, chunk) in chunks.into_iter().enumerate() {
            groups.extend(self.run_once("sync", &fixed, &chunk)?);
            progress.report((done + 1) as f64 / total as f64 * 100.0);
        }
        Ok(groups)
    }

    /// Recursively syncs complete folders.
    pub fn sync_folders(&self, folders: &[String]) -> Result<Vec<TagGroup>> {
        let wildcards: Vec<String> = folders
            .iter()
            .map(|folder| folder_wildcard(folder, true))
            .collect();
        self.run_cmd("sync", &wildcards)
    }

    /// Reverts files. With `unchanged_only`, only files left unchanged
    /// since they were opened are reverted.
    pub fn revert_files(&self, files: &[String], unchanged_only: bool) -> Result<Vec<TagGroup>> {
        let fixed: Vec<String> = if unchanged_only {
            vec!["-a".to_string()]
        } else {
            Vec::new()
        };
        self.warn_if_offline();
        self.run_chunked_with_fixed("revert", &fixed, files)
    }

    /// Recursively reverts complete folders.
    pub fn revert_folders(&self, folders: &[String]) -> Result<Vec<TagGroup>> {
        let wildcards: Vec<String> = folders
            .iter()
            .map(|folder| folder_wildcard(folder, true))
            .collect();
        self.run_cmd("revert", &wildcards)
    }

    /// Creates a new numbered changelist.
    ///
    /// Pipes a pre-filled change form (`p4 change -o` with the
    /// description and an empty file list) into `p4 change -i` and parses
    /// the assigned number out of the confirmation line.
    pub fn make_new_changelist(&self, description: &str) -> Result<u32> {
        if !self.host_online() {
            return Err(ClientError::ServerOffline(self.server.clone()));
        }

        let form = Command::new("p4")
            .current_dir(&self.perforce_root)
            .args([
                "--field",
                &format!("Description={}", description),
                "--field",
                "Files=",
                "change",
                "-o",
            ])
            .output()?;

        let child = Command::new("p4")
            .current_dir(&self.perforce_root)
            .args(["change", "-i"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let output = feed_stdin(child, &form.stdout)?;

        // Confirmation reads "Change NNNNN created."
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        match stdout.split_whitespace().nth(1).and_then(|w| w.parse().ok()) {
            Some(number) => Ok(number),
            None if !stderr.trim().is_empty() => Err(ClientError::Command {
                command: "change -i".to_string(),
                message: stderr.trim().to_string(),
            }),
            None => Err(ClientError::Parse(format!(
                "no changelist number in: {:?}",
                stdout.trim()
            ))),
        }
    }

    /// Numbers of this user's pending changelists on this workspace,
    /// optionally filtered on the description.
    ///
    /// With `perfect_match_only` the filter must equal the whole
    /// description; otherwise substring containment is enough. Matching is
    /// case-insensitive unless `case_sensitive` is set. Trailing newlines
    /// on descriptions are ignored.
    pub fn get_pending_changelists(
        &self,
        description_filter: &str,
        perfect_match_only: bool,
        case_sensitive: bool,
    ) -> Result<Vec<u32>> {
        let groups = self.run_cmd(
            "changes",
            &[
                "-l".to_string(),
                "-s".to_string(),
                "pending".to_string(),
                "-u".to_string(),
                self.user.clone(),
                "-c".to_string(),
                self.client.clone(),
            ],
        )?;

        let mut filter = description_filter.trim_end_matches('\n').to_string();
        if !case_sensitive {
            filter = filter.to_lowercase();
        }

        let mut changelists = Vec::new();
        for group in &groups {
            let number = match group.get("change").and_then(|n| n.parse::<u32>().ok()) {
                Some(number) => number,
                None => continue,
            };
            let mut description = group
                .get("desc")
                .map(|d| d.trim_end_matches('\n').to_string())
                .unwrap_or_default();
            if !case_sensitive {
                description = description.to_lowercase();
            }

            let matched = if filter.is_empty() {
                true
            } else if perfect_match_only {
                filter == description
            } else {
                description.contains(&filter)
            };
            if matched {
                changelists.push(number);
            }
        }
        Ok(changelists)
    }

    /// Finds a pending changelist whose description equals `description`,
    /// creating one if none exists.
    pub fn get_or_make_changelist(&self, description: &str) -> Result<u32> {
        let existing = self.get_pending_changelists(description, true, false)?;
        match existing.first() {
            Some(number) => Ok(*number),
            None => self.make_new_changelist(description),
        }
    }

    /// True when the changelist resolves to an existing pending one.
    pub fn changelist_exists(&self, changelist: &Changelist) -> Result<bool> {
        match changelist {
            Changelist::Default => Ok(true),
            Changelist::Number(number) => Ok(self
                .get_pending_changelists("", false, false)?
                .contains(number)),
            Changelist::Description(description) => Ok(!self
                .get_pending_changelists(description, true, true)?
                .is_empty()),
        }
    }

    /// Reopens files in the target changelist, creating it first when the
    /// target is a description without a match.
    pub fn move_files_to_changelist(
        &self,
        files: &[String],
        changelist: &Changelist,
    ) -> Result<Vec<TagGroup>> {
        let target = self.ensure_changelist(changelist)?;
        let groups =
            self.run_chunked_with_fixed("reopen", &["-c".to_string(), target], files)?;
        self.log_errors(&groups);
        Ok(groups)
    }

    /// Opens files for edit in the target changelist.
    pub fn edit_files(&self, files: &[String], changelist: &Changelist) -> Result<Vec<TagGroup>> {
        let target = self.ensure_changelist(changelist)?;
        let groups = self.run_chunked_with_fixed("edit", &["-c".to_string(), target], files)?;
        self.log_errors(&groups);
        Ok(groups)
    }

    /// Opens files for add in the target changelist.
    pub fn add_files(&self, files: &[String], changelist: &Changelist) -> Result<Vec<TagGroup>> {
        let target = self.ensure_changelist(changelist)?;
        self.run_chunked_with_fixed("add", &["-c".to_string(), target], files)
    }

    /// Opens each file for add or edit, whichever fits: untracked files
    /// are added, tracked ones checked out. Files already open are left
    /// alone.
    pub fn add_or_edit_files(
        &self,
        files: &[String],
        changelist: &Changelist,
    ) -> Result<Vec<TagGroup>> {
        let mut for_add = Vec::new();
        let mut for_edit = Vec::new();

        for p4file in self.files_to_p4files(files, true)? {
            if p4file.is_checked_out() {
                continue;
            }
            if p4file.is_local_only() {
                if let Some(path) = p4file.local_path() {
                    for_add.push(path.to_string());
                }
            } else if let Some(path) = p4file.depot_path() {
                for_edit.push(path.to_string());
            }
        }

        let mut groups = Vec::new();
        if !for_add.is_empty() {
            groups.extend(self.add_files(&for_add, changelist)?);
        }
        if !for_edit.is_empty() {
            groups.extend(self.edit_files(&for_edit, changelist)?);
        }
        Ok(groups)
    }

    /// Marks files for delete in the target changelist.
    pub fn delete_files(&self, files: &[String], changelist: &Changelist) -> Result<Vec<TagGroup>> {
        let target = self.ensure_changelist(changelist)?;
        self.run_chunked_with_fixed("delete", &["-c".to_string(), target], files)
    }

    /// Move-renames a file. Returns false when `p4 move` reports an error.
    pub fn rename_file(
        &self,
        old_path: &str,
        new_path: &str,
        changelist: &Changelist,
    ) -> Result<bool> {
        let target = self.ensure_changelist(changelist)?;
        let groups = self.run_cmd(
            "move",
            &[
                "-c".to_string(),
                target,
                old_path.to_string(),
                new_path.to_string(),
            ],
        )?;
        Ok(!groups.iter().any(is_error))
    }

    /// Copies a file to a new depot location. Returns false when `p4 copy`
    /// reports an error.
    pub fn copy_file(
        &self,
        original_path: &str,
        copied_path: &str,
        changelist: &Changelist,
    ) -> Result<bool> {
        let target = self.ensure_changelist(changelist)?;
        let groups = self.run_cmd(
            "copy",
            &[
                "-c".to_string(),
                target,
                original_path.to_string(),
                copied_path.to_string(),
            ],
        )?;
        Ok(!groups.iter().any(is_error))
    }

    /// Depot paths of every file in the changelist.
    ///
    /// A description that matches no pending changelist yields an empty
    /// list rather than an error.
    pub fn get_files_in_changelist(&self, changelist: &Changelist) -> Result<Vec<String>> {
        let target = match changelist {
            Changelist::Default => "default".to_string(),
            Changelist::Number(number) => number.to_string(),
            Changelist::Description(description) => {
                match self
                    .get_pending_changelists(description, true, true)?
                    .first()
                {
                    Some(number) => number.to_string(),
                    None => return Ok(Vec::new()),
                }
            }
        };

        let groups = self.run_cmd("describe", &["-O".to_string(), target])?;
        Ok(collect_depot_files(&groups))
    }

    /// Reverts every file in the changelist.
    pub fn revert_changelist(
        &self,
        changelist: &Changelist,
        unchanged_only: bool,
    ) -> Result<Vec<TagGroup>> {
        let files = self.get_files_in_changelist(changelist)?;
        if files.is_empty() {
            return Ok(Vec::new());
        }
        self.revert_files(&files, unchanged_only)
    }

    /// Deletes every pending changelist whose description matches the
    /// filter.
    pub fn delete_changelist(
        &self,
        description_filter: &str,
        perfect_match_only: bool,
        case_sensitive: bool,
    ) -> Result<Vec<TagGroup>> {
        let mut groups = Vec::new();
        for number in
            self.get_pending_changelists(description_filter, perfect_match_only, case_sensitive)?
        {
            groups.extend(self.run_cmd("change", &["-d".to_string(), number.to_string()])?);
        }
        self.log_errors(&groups);
        Ok(groups)
    }

    /// Submits a numbered changelist and returns the submitted number
    /// (renumbered by the server when it differs).
    pub fn submit_changelist(&self, changelist: u32) -> Result<u32> {
        let groups = self.run_cmd(
            "submit",
            &["-c".to_string(), changelist.to_string()],
        )?;

        if let Some(error) = groups.iter().find(|group| is_error(group)) {
            return Err(ClientError::Changelist(format!(
                "submit of {} failed: {}",
                changelist,
                error.get("data").map(String::as_str).unwrap_or("unknown")
            )));
        }
        Ok(groups
            .iter()
            .find_map(|group| group.get("submittedChange").and_then(|n| n.parse().ok()))
            .unwrap_or(changelist))
    }

    /// Builds [`P4File`] records for the given paths via `fstat`.
    ///
    /// When the server is offline every path comes back as a placeholder
    /// record with [`FileStatus::Unknown`](super::FileStatus::Unknown)
    /// instead of failing. Unless `allow_invalid` is set, deleted and
    /// moved-deleted files are dropped from the result.
    pub fn files_to_p4files(&self, files: &[String], allow_invalid: bool) -> Result<Vec<P4File>> {
        if !self.host_online() {
            return Ok(files
                .iter()
                .map(|path| P4File::offline(path.clone()))
                .collect());
        }
        let groups = self.run_cmd("fstat", files)?;
        Ok(fstat_to_p4files(&groups, allow_invalid))
    }

    /// Builds [`P4File`] records for everything under a folder.
    ///
    /// Online this is a single wildcard `fstat`; offline the directory is
    /// walked locally and each file becomes an offline placeholder.
    pub fn folder_to_p4files(
        &self,
        folder: &str,
        include_subfolders: bool,
        allow_invalid: bool,
    ) -> Result<Vec<P4File>> {
        if self.host_online() {
            let wildcard = folder_wildcard(folder, include_subfolders);
            let groups = self.run_cmd("fstat", &[wildcard])?;
            Ok(fstat_to_p4files(&groups, allow_invalid))
        } else {
            let mut paths = Vec::new();
            collect_local_files(Path::new(folder), include_subfolders, &mut paths)?;
            self.files_to_p4files(&paths, allow_invalid)
        }
    }

    /// Resolves a changelist target to the literal `-c` argument,
    /// creating a changelist when the target is an unmatched description.
    pub fn ensure_changelist(&self, changelist: &Changelist) -> Result<String> {
        match changelist {
            Changelist::Default => Ok("default".to_string()),
            Changelist::Number(number) => Ok(number.to_string()),
            Changelist::Description(description) => {
                Ok(self.get_or_make_changelist(description)?.to_string())
            }
        }
    }

    fn run_chunked(&self, cmd: &str, fixed: &[String], args: &[String]) -> Result<Vec<TagGroup>> {
        self.warn_if_offline();
        self.run_chunked_with_fixed(cmd, fixed, args)
    }

    /// Chunks `args`, prepending `fixed` to every invocation so flags
    /// like `-c NNNN` survive the split.
    fn run_chunked_with_fixed(
        &self,
        cmd: &str,
        fixed: &[String],
        args: &[String],
    ) -> Result<Vec<TagGroup>> {
        let mut groups = Vec::new();
        for chunk in chunk_args(args, MAX_ARG_LEN) {
            groups.extend(self.run_once(cmd, fixed, &chunk)?);
        }
        Ok(groups)
    }

    /// One `p4` process: global options, tagged output, a command, and
    /// its arguments.
    fn run_once(&self, cmd: &str, fixed: &[String], args: &[String]) -> Result<Vec<TagGroup>> {
        let output = Command::new("p4")
            .current_dir(&self.perforce_root)
            .args(["-ztag", "-u", &self.user, "-c", &self.client, cmd])
            .args(fixed)
            .args(args)
            .output()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut groups = parse_ztag(&stdout);

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|line| !line.trim().is_empty()) {
            debug!(command = cmd, "p4 diagnostic: {}", line);
            groups.push(error_group(cmd, line));
        }
        Ok(groups)
    }

    fn warn_if_offline(&self) {
        if !self.host_online() {
            warn!(server = %self.server, "cannot reach perforce server");
        }
    }

    fn log_errors(&self, groups: &[TagGroup]) {
        if self.silent {
            return;
        }
        for group in groups.iter().filter(|group| is_error(group)) {
            warn!(
                "p4 reported: {}",
                group.get("data").map(String::as_str).unwrap_or("unknown")
            );
        }
    }
}

/// Turns `fstat` records into [`P4File`]s.
///
/// Diagnostic records for unknown files become untracked placeholders so
/// add/edit classification still works. Unless `allow_invalid` is set,
/// records without any path and files deleted at head are dropped.
fn fstat_to_p4files(groups: &[TagGroup], allow_invalid: bool) -> Vec<P4File> {
    let mut p4files = Vec::new();
    for group in groups {
        let p4file = if is_error(group) {
            let data = group.get("data").cloned().unwrap_or_default();
            if !data.contains("no such file(s)") {
                continue;
            }
            let path = data.split(" - ").next().unwrap_or_default().to_string();
            P4File::untracked(path, data)
        } else {
            P4File::from_fstat(group)
        };

        if allow_invalid {
            p4files.push(p4file);
        } else if p4file.is_valid() && !p4file.is_deleted() && !p4file.is_moved_deleted() {
            p4files.push(p4file);
        }
    }
    p4files
}

/// Writes `input` to the child's stdin and collects its output.
///
/// If the pipe breaks mid-write the child is killed and reaped before the
/// error propagates, so no zombie is left on the failure path.
fn feed_stdin(mut child: std::process::Child, input: &[u8]) -> Result<std::process::Output> {
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(err) = stdin.write_all(input) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(err.into());
        }
    }
    Ok(child.wait_with_output()?)
}

/// Pulls every `depotFile`-tagged value (`depotFile`, `depotFile0`, ...)
/// out of `describe` records.
fn collect_depot_files(groups: &[TagGroup]) -> Vec<String> {
    groups
        .iter()
        .flat_map(|group| {
            group
                .iter()
                .filter(|(key, _)| key.starts_with("depotFile"))
                .map(|(_, value)| value.clone())
        })
        .collect()
}

fn collect_local_files(dir: &Path, recursive: bool, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                collect_local_files(&path, true, out)?;
            }
        } else {
            out.push(path.to_string_lossy().into_owned());
        }
    }
    Ok(())
}

/// Looks a setting up via `p4 set`, whose output reads
/// `P4USER=alice (set)`. Returns `None` when the setting is absent.
fn p4_setting(root: &Path, setting: &str) -> Result<Option<String>> {
    let mut command = Command::new("p4");
    command.args(["set", setting]);
    if root.is_dir() {
        command.current_dir(root);
    }
    let output = command.output()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value = stdout
        .lines()
        .next()
        .and_then(|line| line.split_once('='))
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .map(str::to_string);
    Ok(value.filter(|v| v != "none"))
}

/// The current P4CLIENT if set, otherwise the user's first workspace.
fn find_p4_client(root: &Path, user: &str) -> Result<Option<String>> {
    if let Some(client) = p4_setting(root, "P4CLIENT")? {
        return Ok(Some(client));
    }

    let mut command = Command::new("p4");
    command.args(["-ztag", "-u", user, "clients", "-u", user]);
    if root.is_dir() {
        command.current_dir(root);
    }
    let output = command.output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_ztag(&stdout)
        .iter()
        .find_map(|group| group.get("client").cloned()))
}

/// Walks up from `start` looking for a directory containing `.p4config`.
fn find_p4config_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(".p4config").is_file() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Probes the host and port named by a P4PORT value (`host:port`, with an
/// optional protocol prefix such as `ssl:`).
fn host_online(server: &str) -> bool {
    let mut parts = server.rsplit(':');
    let port = match parts.next().and_then(|p| p.parse::<u16>().ok()) {
        Some(port) => port,
        None => return false,
    };
    let host = match parts.next() {
        Some(host) if !host.is_empty() => host,
        _ => return false,
    };

    let addrs = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(_) => return false,
    };
    for addr in addrs {
        if TcpStream::connect_timeout(&addr, ONLINE_PROBE_TIMEOUT).is_ok() {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fstat_conversion_keeps_valid_files_and_drops_deleted() {
        let mut alive = TagGroup::new();
        alive.insert("depotFile".to_string(), "//depot/a.txt".to_string());
        alive.insert("headRev".to_string(), "2".to_string());
        alive.insert("haveRev".to_string(), "2".to_string());

        let mut deleted = TagGroup::new();
        deleted.insert("depotFile".to_string(), "//depot/gone.txt".to_string());
        deleted.insert("headAction".to_string(), "delete".to_string());

        let files = fstat_to_p4files(&[alive.clone(), deleted.clone()], false);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].depot_path(), Some("//depot/a.txt"));

        let files = fstat_to_p4files(&[alive, deleted], true);
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn fstat_conversion_turns_missing_file_diagnostics_into_untracked() {
        let diag = error_group("fstat", "/work/new.txt - no such file(s).");
        let files = fstat_to_p4files(&[diag], true);

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].local_path(), Some("/work/new.txt"));
        assert!(files[0].is_untracked());
    }

    #[test]
    fn fstat_conversion_skips_unrelated_error_records() {
        let diag = error_group("fstat", "some other problem entirely");
        assert!(fstat_to_p4files(&[diag], true).is_empty());
    }

    #[test]
    fn collect_depot_files_reads_indexed_tags() {
        let mut described = TagGroup::new();
        described.insert("change".to_string(), "1234".to_string());
        described.insert("depotFile0".to_string(), "//depot/a.txt".to_string());
        described.insert("depotFile1".to_string(), "//depot/b.txt".to_string());

        let mut other = TagGroup::new();
        other.insert("depotFile".to_string(), "//depot/c.txt".to_string());
        other.insert("clientFile".to_string(), "/work/c.txt".to_string());

        let paths = collect_depot_files(&[described, other]);
        assert_eq!(paths, ["//depot/a.txt", "//depot/b.txt", "//depot/c.txt"]);

        assert!(collect_depot_files(&[error_group("describe", "no such changelist")]).is_empty());
    }

    #[test]
    fn feed_stdin_round_trips_through_the_child() {
        let child = Command::new("cat")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let output = feed_stdin(child, b"Description=test\n").unwrap();
        assert_eq!(output.stdout, b"Description=test\n");
    }

    #[test]
    fn feed_stdin_reaps_the_child_when_the_pipe_breaks() {
        let child = Command::new("false")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        // Let the child exit so the pipe is closed on its end, then write
        // more than the pipe buffer holds to force a broken-pipe error.
        std::thread::sleep(Duration::from_millis(100));
        let oversized = vec![b'x'; 1 << 21];
        assert!(feed_stdin(child, &oversized).is_err());
    }

    #[test]
    fn host_online_rejects_unparseable_ports() {
        assert!(!host_online("perforce"));
        assert!(!host_online("perforce:notaport"));
        assert!(!host_online(":1666"));
    }

    #[test]
    fn p4config_discovery_walks_up_to_the_containing_directory() {
        let base = std::env::temp_dir().join(format!("p4cfg-test-{}", std::process::id()));
        let nested = base.join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(base.join(".p4config"), "P4CLIENT=ws\n").unwrap();

        assert_eq!(find_p4config_root(&nested), Some(base.clone()));

        fs::remove_dir_all(&base).unwrap();
    }
}
