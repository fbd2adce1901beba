//! The end-to-end runs behind each command: fetch, apply, rollback, strip and
//! the two access reports. Each run names its output files after the root
//! folder and a start timestamp, and writes them under the configured
//! `archives/`, `reports/` and `logs/` directories.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::audit::{AuditEntry, Status};
use crate::changes::process_changes;
use crate::config::PathsConfig;
use crate::contacts::ContactDirectory;
use crate::drive::{DriveApi, DriveError};
use crate::report::generate_permission_report;
use crate::report::matrix::build_matrix;
use crate::report::single::{self, single_principal_report};
use crate::rollback::generate_rollback_actions;
use crate::sheet::{self, ReportRow, SheetError};
use crate::strip::{strip_permissions, StripSummary};

pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const UNKNOWN_ITEM: &str = "UnknownItem";

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Drive error: {0}")]
    Drive(#[from] DriveError),

    #[error(transparent)]
    Sheet(#[from] SheetError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not determine Root Folder ID from {}", .0.display())]
    MissingRootId(PathBuf),

    #[error("{} is not inside the logs directory {}", .path.display(), .logs.display())]
    OutsideLogs { path: PathBuf, logs: PathBuf },
}

/// Keep a name usable as part of a file name.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .replace([' ', '/', '\\'], "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if sanitized.is_empty() {
        "unnamed_item".to_string()
    } else {
        sanitized
    }
}

fn timestamp() -> String {
    Local::now().format(FILE_TIMESTAMP_FORMAT).to_string()
}

fn first_root_id<'a>(mut ids: impl Iterator<Item = &'a str>) -> Option<String> {
    ids.next()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn count(entries: &[AuditEntry], status: Status) -> usize {
    entries.iter().filter(|e| e.status == status).count()
}

fn write_counts(f: &mut fmt::Formatter<'_>, entries: &[AuditEntry]) -> fmt::Result {
    write!(
        f,
        "{} actions: {} succeeded, {} failed, {} skipped, {} dry run",
        entries.len(),
        count(entries, Status::Success),
        count(entries, Status::Error),
        count(entries, Status::Skipped),
        count(entries, Status::DryRun)
    )
}

fn write_path(f: &mut fmt::Formatter<'_>, label: &str, path: &Option<PathBuf>) -> fmt::Result {
    match path {
        Some(path) => write!(f, "\n{}: {}", label, path.display()),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub rows: usize,
    pub archive: Option<PathBuf>,
    pub editor: Option<PathBuf>,
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rows == 0 {
            return write!(f, "No permissions found; nothing written.");
        }
        write!(f, "{} permission entries", self.rows)?;
        write_path(f, "baseline archive", &self.archive)?;
        write_path(f, "editor sheet", &self.editor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub root_id: String,
    pub entries: Vec<AuditEntry>,
    pub archive: Option<PathBuf>,
    pub audit_log: Option<PathBuf>,
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return write!(f, "No changes to apply under {}.", self.root_id);
        }
        write_counts(f, &self.entries)?;
        write_path(f, "archive", &self.archive)?;
        write_path(f, "audit log", &self.audit_log)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripOutcome {
    pub summary: StripSummary,
    pub audit_log: Option<PathBuf>,
}

impl fmt::Display for StripOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary)?;
        write_path(f, "audit log", &self.audit_log)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutcome {
    pub items: usize,
    pub output: PathBuf,
}

impl fmt::Display for ReportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} items written to {}", self.items, self.output.display())
    }
}

/// Runs against one drive, writing under one set of directories.
pub struct Workflow<'a> {
    drive: &'a dyn DriveApi,
    paths: &'a PathsConfig,
    batch_size: usize,
}

impl<'a> Workflow<'a> {
    pub fn new(drive: &'a dyn DriveApi, paths: &'a PathsConfig, batch_size: usize) -> Self {
        Self {
            drive,
            paths,
            batch_size,
        }
    }

    /// The sanitised root name; a lookup failure is logged and named
    /// `UnknownItem`.
    async fn root_name(&self, root_id: &str) -> String {
        match self.drive.get_item(root_id).await {
            Ok(item) => sanitize_filename(&item.name),
            Err(e) => {
                tracing::error!("could not retrieve name for item {}: {}", root_id, e);
                UNKNOWN_ITEM.to_string()
            }
        }
    }

    async fn report(
        &self,
        root_id: &str,
        user_email: Option<&str>,
    ) -> Result<Vec<ReportRow>, DriveError> {
        let progress = |done: usize, total: usize| {
            tracing::info!("fetching permissions {}/{}", done, total)
        };
        generate_permission_report(self.drive, root_id, user_email, self.batch_size, progress)
            .await
    }

    /// Baseline archive plus an editor sheet to fill in.
    pub async fn run_fetch(
        &self,
        root_id: &str,
        user_email: Option<&str>,
    ) -> Result<FetchOutcome, WorkflowError> {
        tracing::info!("starting fetch for folder {}", root_id);
        let name = self.root_name(root_id).await;
        let ts = timestamp();

        let rows = self.report(root_id, user_email).await?;
        if rows.is_empty() {
            tracing::warn!("no permissions found to generate a report");
            return Ok(FetchOutcome {
                rows: 0,
                archive: None,
                editor: None,
            });
        }

        let archive = self
            .paths
            .archives
            .join(format!("{}_fetch_{}_baseline.csv", ts, name));
        sheet::write_report(&archive, &rows)?;
        tracing::info!("created baseline archive {}", archive.display());

        let editor = self
            .paths
            .reports
            .join(format!("permissions_editor_{}.csv", name));
        sheet::write_change_sheet(&editor, &rows)?;
        tracing::info!("editor sheet saved to {}", editor.display());

        Ok(FetchOutcome {
            rows: rows.len(),
            archive: Some(archive),
            editor: Some(editor),
        })
    }

    /// Apply an edited sheet. The live report is fetched once, serves as the
    /// comparison baseline and is archived as the pre-change state.
    pub async fn run_apply(
        &self,
        sheet_path: &Path,
        live: bool,
        root_override: Option<&str>,
    ) -> Result<ApplyOutcome, WorkflowError> {
        let rows = sheet::read_change_sheet(sheet_path)?;
        let root_id = match root_override {
            Some(root) => root.trim().to_string(),
            None => first_root_id(rows.iter().map(|r| r.root_folder_id.as_str()))
                .ok_or_else(|| WorkflowError::MissingRootId(sheet_path.to_path_buf()))?,
        };
        tracing::info!("applying {} to folder {}", sheet_path.display(), root_id);

        let name = self.root_name(&root_id).await;
        let ts = timestamp();
        let current = self.report(&root_id, None).await?;

        let entries = process_changes(
            self.drive,
            &rows,
            &root_id,
            !live,
            Some(current.as_slice()),
            self.batch_size,
        )
        .await?;
        if entries.is_empty() {
            return Ok(ApplyOutcome {
                root_id,
                entries,
                archive: None,
                audit_log: None,
            });
        }

        let archive = self
            .paths
            .archives
            .join(format!("{}_apply_{}_pre_changes.csv", ts, name));
        sheet::write_report(&archive, &current)?;

        let audit_log = self
            .paths
            .logs
            .join(format!("{}_apply_{}_audit.csv", ts, name));
        sheet::write_audit_log(&audit_log, &entries)?;

        Ok(ApplyOutcome {
            root_id,
            entries,
            archive: Some(archive),
            audit_log: Some(audit_log),
        })
    }

    /// Undo the successful entries of an audit log kept under the logs
    /// directory.
    pub async fn run_rollback(
        &self,
        log_path: &Path,
        live: bool,
        root_override: Option<&str>,
    ) -> Result<ApplyOutcome, WorkflowError> {
        let log_abs = fs::canonicalize(log_path)?;
        let outside = || WorkflowError::OutsideLogs {
            path: log_path.to_path_buf(),
            logs: self.paths.logs.clone(),
        };
        let logs_abs = fs::canonicalize(&self.paths.logs).map_err(|_| outside())?;
        if log_abs == logs_abs || !log_abs.starts_with(&logs_abs) {
            tracing::error!("log file must be inside {}", self.paths.logs.display());
            return Err(outside());
        }

        let entries = sheet::read_audit_log(&log_abs)?;
        let root_id = match root_override.map(str::trim).filter(|r| !r.is_empty()) {
            Some(root) => root.to_string(),
            None => first_root_id(entries.iter().map(|e| e.root_folder_id.as_str()))
                .ok_or_else(|| WorkflowError::MissingRootId(log_path.to_path_buf()))?,
        };

        let name = self.root_name(&root_id).await;
        let ts = timestamp();

        tracing::info!("fetching live permission data once for all operations");
        let current = self.report(&root_id, None).await?;
        let archive = self
            .paths
            .archives
            .join(format!("{}_rollback_{}_pre_rollback.csv", ts, name));
        sheet::write_report(&archive, &current)?;

        let actions = generate_rollback_actions(&entries, &current);
        if actions.is_empty() {
            tracing::info!("no actions to perform for rollback");
            return Ok(ApplyOutcome {
                root_id,
                entries: Vec::new(),
                archive: Some(archive),
                audit_log: None,
            });
        }

        let applied = process_changes(
            self.drive,
            &actions,
            &root_id,
            !live,
            Some(current.as_slice()),
            self.batch_size,
        )
        .await?;

        let audit_log = if applied.is_empty() {
            None
        } else {
            let path = self
                .paths
                .logs
                .join(format!("{}_rollback_{}_audit.csv", ts, name));
            sheet::write_audit_log(&path, &applied)?;
            Some(path)
        };

        Ok(ApplyOutcome {
            root_id,
            entries: applied,
            archive: Some(archive),
            audit_log,
        })
    }

    /// Take every permission of `emails` off the root and its descendants.
    pub async fn run_strip(
        &self,
        root_id: &str,
        emails: &[String],
        live: bool,
    ) -> Result<StripOutcome, WorkflowError> {
        tracing::info!("stripping {} addresses from {}", emails.len(), root_id);
        let name = self.root_name(root_id).await;
        let ts = timestamp();

        let summary = strip_permissions(self.drive, root_id, emails, !live).await?;
        let audit_log = if summary.removals.is_empty() {
            None
        } else {
            let entries: Vec<AuditEntry> = summary
                .removals
                .iter()
                .map(|r| r.to_audit_entry(root_id))
                .collect();
            let path = self
                .paths
                .logs
                .join(format!("{}_strip_{}_audit.csv", ts, name));
            sheet::write_audit_log(&path, &entries)?;
            Some(path)
        };

        Ok(StripOutcome { summary, audit_log })
    }

    pub async fn run_matrix(
        &self,
        root_id: &str,
        output: &Path,
        contacts: &ContactDirectory,
    ) -> Result<ReportOutcome, WorkflowError> {
        let matrix = build_matrix(self.drive, root_id, self.batch_size).await?;
        sheet::write_records(output, &matrix.to_records(contacts))?;
        Ok(ReportOutcome {
            items: matrix.rows.len(),
            output: output.to_path_buf(),
        })
    }

    /// Without `output` the report goes to
    /// `reports/single_<email>_<root name>.csv`.
    pub async fn run_single(
        &self,
        root_id: &str,
        email: &str,
        output: Option<&Path>,
    ) -> Result<ReportOutcome, WorkflowError> {
        let output = match output {
            Some(path) => path.to_path_buf(),
            None => {
                let name = self.root_name(root_id).await;
                self.paths.reports.join(format!(
                    "single_{}_{}.csv",
                    sanitize_filename(&email.trim().to_lowercase()),
                    name
                ))
            }
        };
        let rows = single_principal_report(self.drive, root_id, email, self.batch_size).await?;
        sheet::write_records(&output, &single::to_records(email, &rows))?;
        Ok(ReportOutcome {
            items: rows.len(),
            output,
        })
    }
}
