//! Remove every permission a set of addresses holds anywhere under a folder.

use std::collections::HashSet;
use std::fmt;

use crate::audit::{AuditEntry, Command, Status};
use crate::drive::{DriveApi, DriveError, Permission, PrincipalType};
use crate::report::{walk, WalkedItem};
use crate::role::Role;

/// One permission taken (or, in a dry run, to be taken) from one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub item_id: String,
    pub item_name: String,
    pub path: String,
    pub is_folder: bool,
    pub permission_id: String,
    pub principal_type: PrincipalType,
    pub email: String,
    pub role: Role,
    pub status: Status,
    pub details: String,
}

impl Removal {
    fn new(walked: &WalkedItem, permission: &Permission, email: &str) -> Self {
        Self {
            item_id: walked.item.id.clone(),
            item_name: walked.item.name.clone(),
            path: walked.path.clone(),
            is_folder: walked.item.is_folder(),
            permission_id: permission.id.clone(),
            principal_type: permission.principal_type,
            email: email.to_string(),
            role: permission.role,
            status: Status::Pending,
            details: String::new(),
        }
    }

    /// The entry is a `REMOVE` like any other, so a strip can be rolled back.
    pub fn to_audit_entry(&self, root_id: &str) -> AuditEntry {
        let mut entry = AuditEntry::new(root_id, &self.item_id, Command::Remove.as_str(), self.status);
        entry.full_path = self.path.clone();
        entry.item_name = self.item_name.clone();
        entry.details = self.details.clone();
        entry.original_principal_type = self.principal_type.to_string();
        entry.original_email_address = self.email.clone();
        entry.original_role = self.role.ui_name().to_string();
        entry
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripSummary {
    pub removals: Vec<Removal>,
}

impl StripSummary {
    pub fn folders(&self) -> impl Iterator<Item = &Removal> {
        self.removals.iter().filter(|r| r.is_folder)
    }

    pub fn files(&self) -> impl Iterator<Item = &Removal> {
        self.removals.iter().filter(|r| !r.is_folder)
    }

    pub fn count(&self, status: Status) -> usize {
        self.removals.iter().filter(|r| r.status == status).count()
    }
}

impl fmt::Display for StripSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.removals.is_empty() {
            return write!(f, "No matching permissions found.");
        }
        for (title, group) in [
            ("Folders", self.folders().collect::<Vec<_>>()),
            ("Files", self.files().collect::<Vec<_>>()),
        ] {
            if group.is_empty() {
                continue;
            }
            writeln!(f, "{}:", title)?;
            for removal in group {
                writeln!(
                    f,
                    "  [{}] {} ({}) from {} ({})",
                    removal.status,
                    removal.email,
                    removal.role.api_name(),
                    removal.path,
                    removal.item_id
                )?;
            }
        }
        write!(
            f,
            "{} removed, {} failed, {} dry run",
            self.count(Status::Success),
            self.count(Status::Error),
            self.count(Status::DryRun)
        )
    }
}

/// Walk the root and all descendants and delete each permission whose email
/// is one of `emails` (case-insensitive). A permission that cannot be deleted
/// is recorded with `ERROR` and the strip goes on.
pub async fn strip_permissions(
    drive: &dyn DriveApi,
    root_id: &str,
    emails: &[String],
    dry_run: bool,
) -> Result<StripSummary, DriveError> {
    let targets: HashSet<String> = emails
        .iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    let mut summary = StripSummary::default();
    if targets.is_empty() {
        return Ok(summary);
    }

    for walked in walk(drive, root_id).await? {
        let permissions = match drive.list_permissions(&walked.item.id).await {
            Ok(permissions) => permissions,
            Err(e) => {
                tracing::error!("error listing permissions for {}: {}", walked.item.id, e);
                continue;
            }
        };

        for permission in &permissions {
            let Some(email) = permission.email_address.as_deref() else {
                continue;
            };
            if !targets.contains(&email.to_lowercase()) {
                continue;
            }

            let mut removal = Removal::new(&walked, permission, email);
            if dry_run {
                removal.status = Status::DryRun;
                removal.details = format!("Would remove {} as {}.", email, permission.role);
            } else {
                match drive
                    .delete_permission(&walked.item.id, &permission.id)
                    .await
                {
                    Ok(()) => {
                        tracing::info!(
                            "removed {} ({}) from '{}' ({})",
                            email,
                            permission.role.api_name(),
                            walked.item.name,
                            walked.item.id
                        );
                        removal.status = Status::Success;
                        removal.details = format!("Removed {} as {}.", email, permission.role);
                    }
                    Err(e) => {
                        tracing::error!(
                            "failed to delete permission {} on {}: {}",
                            permission.id,
                            walked.item.id,
                            e
                        );
                        removal.status = Status::Error;
                        removal.details = e.to_string();
                    }
                }
            }
            summary.removals.push(removal);
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::memory::{MemoryDrive, Method};

    fn drive() -> MemoryDrive {
        let drive = MemoryDrive::new("root", "Study");
        drive
            .add_folder("root", "f1", "Site 01")
            .add_file("f1", "d1", "log.pdf")
            .add_file("root", "d2", "plan.pdf");
        drive.grant("root", PrincipalType::User, Some("Old@X.com"), Role::Reader);
        drive.grant("d1", PrincipalType::User, Some("old@x.com"), Role::Writer);
        drive.grant("d1", PrincipalType::User, Some("keep@x.com"), Role::Writer);
        drive.grant("d2", PrincipalType::User, Some("gone@x.com"), Role::Commenter);
        drive
    }

    fn emails() -> Vec<String> {
        vec!["old@x.com".into(), " GONE@x.com ".into()]
    }

    #[tokio::test]
    async fn removes_matching_permissions_everywhere() {
        let drive = drive();
        let summary = strip_permissions(&drive, "root", &emails(), false)
            .await
            .unwrap();

        assert_eq!(summary.count(Status::Success), 3);
        assert_eq!(summary.folders().count(), 1);
        assert_eq!(summary.files().count(), 2);
        assert!(drive.permissions("root").is_empty());
        assert_eq!(drive.permissions("d1").len(), 1);
        assert!(drive.permissions("d2").is_empty());

        let entry = summary.removals[1].to_audit_entry("root");
        assert_eq!(entry.action_command, "REMOVE");
        assert_eq!(entry.original_email_address, "old@x.com");
        assert_eq!(entry.original_role, "Editor");
        assert_eq!(entry.full_path, "/Study/Site 01/log.pdf");
    }

    #[tokio::test]
    async fn dry_run_only_reports() {
        let drive = drive();
        let summary = strip_permissions(&drive, "root", &emails(), true)
            .await
            .unwrap();
        assert_eq!(summary.count(Status::DryRun), 3);
        assert!(drive.mutations().is_empty());
        assert!(summary.to_string().ends_with("0 removed, 0 failed, 3 dry run"));
    }

    #[tokio::test]
    async fn failed_delete_is_recorded_and_the_rest_continue() {
        let drive = drive();
        drive.fail_item(Method::DeletePermission, "d1", 400, 1);
        let summary = strip_permissions(&drive, "root", &emails(), false)
            .await
            .unwrap();
        assert_eq!(summary.count(Status::Error), 1);
        assert_eq!(summary.count(Status::Success), 2);
        assert_eq!(drive.permissions("d1").len(), 2);
    }
}
