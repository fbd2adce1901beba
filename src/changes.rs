//! Turn an edited change sheet into Drive API calls.
//!
//! Two passes over the sheet. The first reconciles the `Restrict Download`
//! column with the live state of each item; the second executes the rows that
//! carry an `Action_Type`. Every attempt ends up as one [`AuditEntry`], and a
//! failing row never stops the rows after it.

use std::collections::HashMap;

use crate::audit::{AuditEntry, Command, Status};
use crate::drive::{find_permission_id, DriveApi, DriveError, Grant, PrincipalType};
use crate::report::{generate_permission_report, NOT_AVAILABLE};
use crate::role::Role;
use crate::sheet::{ChangeRow, ReportRow};

/// What a row asks for, once its cells have been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Add(Grant),
    Remove {
        principal_type: PrincipalType,
        address: String,
        role: Role,
    },
    Modify {
        principal_type: PrincipalType,
        address: String,
        from: Role,
        to: Role,
    },
}

/// Why a row did not succeed.
#[derive(Debug)]
enum Failure {
    /// Bad input or nothing to act on; no call was refused.
    Skipped(String),
    Api(DriveError),
}

impl From<DriveError> for Failure {
    fn from(e: DriveError) -> Self {
        Failure::Api(e)
    }
}

impl Failure {
    fn status(&self) -> Status {
        match self {
            Failure::Skipped(_) => Status::Skipped,
            Failure::Api(_) => Status::Error,
        }
    }

    fn reason(&self) -> String {
        match self {
            Failure::Skipped(reason) => reason.clone(),
            Failure::Api(e) => e.to_string(),
        }
    }
}

/// Apply `rows` under `root_id`, or only describe what would happen when
/// `dry_run` is set.
///
/// `live_report` is the current state the restriction pass compares against;
/// when it is `None` and the sheet asks for any restriction, the report is
/// fetched here.
pub async fn process_changes(
    drive: &dyn DriveApi,
    rows: &[ChangeRow],
    root_id: &str,
    dry_run: bool,
    live_report: Option<&[ReportRow]>,
    batch_size: usize,
) -> Result<Vec<AuditEntry>, DriveError> {
    if !dry_run {
        tracing::warn!("live mode: changes will be applied to Google Drive");
    }

    let mut audit = Vec::new();

    let desired = desired_restrictions(rows);
    if !desired.is_empty() {
        tracing::info!("analyzing download restrictions");
        let fetched;
        let live: &[ReportRow] = match live_report {
            Some(live) => live,
            None => {
                tracing::info!("fetching current state of {} for comparison", root_id);
                fetched = generate_permission_report(drive, root_id, None, batch_size, |_, _| {})
                    .await?;
                &fetched
            }
        };
        audit.extend(apply_restrictions(drive, rows, root_id, dry_run, &desired, live).await);
    }

    tracing::info!("analyzing permission actions");
    for (index, row) in rows.iter().enumerate() {
        if row.action_type.trim().is_empty() {
            continue;
        }
        // header is line 1 of the sheet
        let line = index + 2;
        audit.push(apply_row(drive, row, line, root_id, dry_run).await);
    }

    if audit.is_empty() {
        tracing::info!("no differences between the sheet and the current Drive state");
    }
    Ok(audit)
}

/// `TRUE` wins over `FALSE` when rows of one item disagree; items with no
/// value are left alone. Keeps first-appearance order.
fn desired_restrictions(rows: &[ChangeRow]) -> Vec<(String, bool)> {
    let mut order: Vec<String> = Vec::new();
    let mut wanted: HashMap<String, bool> = HashMap::new();
    for row in rows {
        let item_id = row.item_id.trim();
        let value = match row.restrict_download.trim().to_ascii_uppercase().as_str() {
            "TRUE" => true,
            "FALSE" => false,
            _ => continue,
        };
        if item_id.is_empty() {
            continue;
        }
        match wanted.get_mut(item_id) {
            Some(current) => *current |= value,
            None => {
                order.push(item_id.to_string());
                wanted.insert(item_id.to_string(), value);
            }
        }
    }
    order
        .into_iter()
        .filter_map(|id| wanted.get(&id).map(|&value| (id, value)))
        .collect()
}

fn flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

async fn apply_restrictions(
    drive: &dyn DriveApi,
    rows: &[ChangeRow],
    root_id: &str,
    dry_run: bool,
    desired: &[(String, bool)],
    live: &[ReportRow],
) -> Vec<AuditEntry> {
    let mut current: HashMap<&str, String> = HashMap::new();
    for row in live {
        current
            .entry(row.item_id.as_str())
            .or_insert_with(|| row.restrict_download.trim().to_ascii_uppercase());
    }

    let mut entries = Vec::new();
    for (item_id, restricted) in desired {
        let original = current
            .get(item_id.as_str())
            .cloned()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let wanted = flag(*restricted);
        if original == wanted {
            continue;
        }

        let details = format!("Set Restrict Download from '{}' to '{}'", original, wanted);
        let status = if dry_run { Status::DryRun } else { Status::Pending };
        let mut entry = AuditEntry::new(
            root_id,
            item_id,
            Command::SetDownloadRestriction.as_str(),
            status,
        );
        if let Some(row) = rows.iter().find(|r| r.item_id.trim() == item_id.as_str()) {
            entry.full_path = row.full_path.clone();
            entry.item_name = row.item_name.clone();
        }
        entry.original_role = original;
        entry.new_role = wanted.to_string();

        if dry_run {
            tracing::info!("[DRY RUN] {} for item {}", details, item_id);
            entry.details = details;
        } else {
            match drive.set_download_restriction(item_id, *restricted).await {
                Ok(()) => {
                    tracing::info!("[SUCCESS] {} for item {}", details, item_id);
                    entry.status = Status::Success;
                    entry.details = details;
                }
                Err(e) => {
                    tracing::error!("failed to set restriction for {}: {}", item_id, e);
                    entry.status = Status::Error;
                    entry.details = e.to_string();
                }
            }
        }
        entries.push(entry);
    }
    entries
}

fn entry_for(row: &ChangeRow, root_id: &str, command: &str, status: Status) -> AuditEntry {
    let mut entry = AuditEntry::new(root_id, row.item_id.trim(), command, status);
    entry.full_path = row.full_path.clone();
    entry.item_name = row.item_name.clone();
    entry.original_principal_type = row.principal_type.clone();
    entry.original_email_address = row.email_address.clone();
    entry.original_role = row.role.clone();
    entry.new_principal_type = row.add_type.clone();
    entry.new_email_address = row.add_address.clone();
    entry.new_role = row.new_role.clone();
    entry
}

async fn apply_row(
    drive: &dyn DriveApi,
    row: &ChangeRow,
    line: usize,
    root_id: &str,
    dry_run: bool,
) -> AuditEntry {
    let command_text = row.action_type.trim().to_ascii_uppercase();
    let status = if dry_run { Status::DryRun } else { Status::Pending };
    let mut entry = entry_for(row, root_id, &command_text, status);
    let item_id = row.item_id.trim();

    let action = if item_id.is_empty() {
        Err(format!("Missing Item ID on row {}.", line))
    } else {
        command_text
            .parse::<Command>()
            .map_err(|unknown| format!("Unknown action '{}' on row {}.", unknown, line))
            .and_then(|command| parse_action(command, row, line))
    };
    let action = match action {
        Ok(action) => action,
        Err(reason) => {
            tracing::warn!("[SKIPPED] {} on row {}: {}", command_text, line, reason);
            entry.status = Status::Skipped;
            entry.details = reason;
            return entry;
        }
    };

    if dry_run {
        tracing::info!(
            "[DRY RUN] would perform {} for '{}' on item {}",
            command_text,
            entry.subject(),
            item_id
        );
        entry.details = describe(&action);
        return entry;
    }

    match execute(drive, item_id, &action).await {
        Ok(details) => {
            tracing::info!("[SUCCESS] {} on item {}", details, item_id);
            entry.status = Status::Success;
            entry.details = details;
        }
        Err(failure) => {
            entry.status = failure.status();
            entry.details = failure.reason();
            tracing::warn!(
                "[{}] {} on item {}: {}",
                entry.status,
                command_text,
                item_id,
                entry.details
            );
        }
    }
    entry
}

fn required<'a>(value: &'a str, command: Command, line: usize) -> Result<&'a str, String> {
    let value = value.trim();
    if value.is_empty() {
        Err(format!("Missing info for {} on row {}.", command, line))
    } else {
        Ok(value)
    }
}

fn principal(value: &str, command: Command, line: usize) -> Result<PrincipalType, String> {
    required(value, command, line)?
        .parse()
        .map_err(|e| format!("{} on row {}.", e, line))
}

fn role(value: &str, command: Command, line: usize) -> Result<Role, String> {
    required(value, command, line)?
        .parse()
        .map_err(|e| format!("{} on row {}.", e, line))
}

/// Validate the cells `command` needs. Download restrictions are handled by
/// their own pass and are not a row action.
fn parse_action(command: Command, row: &ChangeRow, line: usize) -> Result<Action, String> {
    match command {
        Command::Add => {
            let principal_type = principal(&row.add_type, command, line)?;
            let address = match principal_type {
                PrincipalType::Anyone => None,
                _ => Some(required(&row.add_address, command, line)?.to_string()),
            };
            Ok(Action::Add(Grant {
                principal_type,
                address,
                role: role(&row.new_role, command, line)?,
            }))
        }
        Command::Remove => Ok(Action::Remove {
            principal_type: principal(&row.principal_type, command, line)?,
            address: row.email_address.trim().to_string(),
            role: role(&row.role, command, line)?,
        })
        .and_then(|action| require_address(action, command, line)),
        Command::Modify => Ok(Action::Modify {
            principal_type: principal(&row.principal_type, command, line)?,
            address: row.email_address.trim().to_string(),
            from: role(&row.role, command, line)?,
            to: role(&row.new_role, command, line)?,
        })
        .and_then(|action| require_address(action, command, line)),
        Command::SetDownloadRestriction => Err(format!(
            "{} is set through the Restrict Download column, not Action_Type (row {}).",
            command, line
        )),
    }
}

/// Everyone but `anyone` must name who the permission belongs to.
fn require_address(action: Action, command: Command, line: usize) -> Result<Action, String> {
    let (principal_type, address) = match &action {
        Action::Remove {
            principal_type,
            address,
            ..
        }
        | Action::Modify {
            principal_type,
            address,
            ..
        } => (*principal_type, address.as_str()),
        Action::Add(_) => return Ok(action),
    };
    if principal_type != PrincipalType::Anyone {
        required(address, command, line)?;
    }
    Ok(action)
}

fn shown(principal_type: PrincipalType, address: &str) -> &str {
    match principal_type {
        PrincipalType::Anyone => "anyone",
        _ => address,
    }
}

fn describe(action: &Action) -> String {
    match action {
        Action::Add(grant) => format!(
            "Would add {} as {}.",
            grant.address.as_deref().unwrap_or("anyone"),
            grant.role
        ),
        Action::Remove {
            principal_type,
            address,
            role,
        } => format!("Would remove {} as {}.", shown(*principal_type, address), role),
        Action::Modify {
            principal_type,
            address,
            from,
            to,
        } => format!(
            "Would modify {} from {} to {}.",
            shown(*principal_type, address),
            from,
            to
        ),
    }
}

async fn execute(drive: &dyn DriveApi, item_id: &str, action: &Action) -> Result<String, Failure> {
    match action {
        Action::Add(grant) => {
            drive.create_permission(item_id, grant).await?;
            Ok(format!(
                "Added {} as {}.",
                grant.address.as_deref().unwrap_or("anyone"),
                grant.role
            ))
        }
        Action::Remove {
            principal_type,
            address,
            role,
        } => {
            let who = shown(*principal_type, address);
            let permission_id = find_permission_id(drive, item_id, *principal_type, address, *role)
                .await?
                .ok_or_else(|| {
                    Failure::Skipped(format!(
                        "Permission not found for {} with role {} to remove.",
                        who, role
                    ))
                })?;
            drive.delete_permission(item_id, &permission_id).await?;
            Ok(format!("Removed {} as {}.", who, role))
        }
        Action::Modify {
            principal_type,
            address,
            from,
            to,
        } => {
            let who = shown(*principal_type, address);
            let permission_id = find_permission_id(drive, item_id, *principal_type, address, *from)
                .await?
                .ok_or_else(|| {
                    Failure::Skipped(format!(
                        "Permission not found for {} with role {} to modify.",
                        who, from
                    ))
                })?;
            drive.update_permission(item_id, &permission_id, *to).await?;
            Ok(format!("Modified {} from {} to {}.", who, from, to))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::memory::{MemoryDrive, Method};

    fn drive() -> MemoryDrive {
        let drive = MemoryDrive::new("root", "Projects");
        drive
            .add_file("root", "d1", "nda.pdf")
            .add_file("root", "d2", "plan.pdf");
        drive
    }

    fn add(item_id: &str, principal_type: &str, address: &str, new_role: &str) -> ChangeRow {
        ChangeRow {
            item_id: item_id.into(),
            action_type: "add".into(),
            add_type: principal_type.into(),
            add_address: address.into(),
            new_role: new_role.into(),
            ..Default::default()
        }
    }

    fn existing(item_id: &str, action: &str, address: &str, role: &str) -> ChangeRow {
        ChangeRow {
            item_id: item_id.into(),
            action_type: action.into(),
            principal_type: "user".into(),
            email_address: address.into(),
            role: role.into(),
            ..Default::default()
        }
    }

    fn restrict(item_id: &str, value: &str) -> ChangeRow {
        ChangeRow {
            item_id: item_id.into(),
            restrict_download: value.into(),
            ..Default::default()
        }
    }

    async fn run(drive: &MemoryDrive, rows: &[ChangeRow], dry_run: bool) -> Vec<AuditEntry> {
        process_changes(drive, rows, "root", dry_run, None, 100)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn dry_run_never_mutates() {
        let drive = drive();
        drive.grant("d1", PrincipalType::User, Some("a@x.com"), Role::Reader);
        let rows = vec![
            add("d1", "user", "b@x.com", "Editor"),
            existing("d1", "REMOVE", "a@x.com", "Viewer"),
            restrict("d2", "TRUE"),
        ];

        let audit = run(&drive, &rows, true).await;
        assert_eq!(audit.len(), 3);
        assert!(audit.iter().all(|e| e.status == Status::DryRun));
        assert_eq!(audit[0].action_command, "SET_DOWNLOAD_RESTRICTION");
        assert_eq!(audit[1].details, "Would add b@x.com as Editor.");
        assert!(drive.mutations().is_empty());
    }

    #[tokio::test]
    async fn live_run_applies_each_command() {
        let drive = drive();
        drive.grant("d1", PrincipalType::User, Some("a@x.com"), Role::Reader);
        drive.grant("d2", PrincipalType::User, Some("c@x.com"), Role::Commenter);
        let rows = vec![
            add("d1", "user", "b@x.com", "editor"),
            existing("d1", "remove", "A@X.com", "Viewer"),
            ChangeRow {
                new_role: "Editor".into(),
                ..existing("d2", "MODIFY", "c@x.com", "Commenter")
            },
        ];

        let audit = run(&drive, &rows, false).await;
        let statuses: Vec<_> = audit.iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![Status::Success; 3]);
        assert_eq!(audit[0].details, "Added b@x.com as Editor.");
        assert_eq!(audit[1].details, "Removed A@X.com as Viewer.");
        assert_eq!(audit[2].details, "Modified c@x.com from Commenter to Editor.");

        let d1 = drive.permissions("d1");
        assert_eq!(d1.len(), 1);
        assert_eq!(d1[0].email_address.as_deref(), Some("b@x.com"));
        assert_eq!(drive.permissions("d2")[0].role, Role::Writer);
    }

    #[tokio::test]
    async fn bad_rows_are_skipped_and_api_failures_are_errors() {
        let drive = drive();
        drive.fail_item(Method::CreatePermission, "d2", 403, 1);
        let rows = vec![
            add("d1", "user", "", "Editor"),
            existing("d1", "REMOVE", "ghost@x.com", "Viewer"),
            existing("d1", "SHARE", "a@x.com", "Viewer"),
            add("d1", "user", "b@x.com", "Overlord"),
            add("d2", "user", "b@x.com", "Viewer"),
            add("d1", "anyone", "", "Viewer"),
        ];

        let audit = run(&drive, &rows, false).await;
        let statuses: Vec<_> = audit.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                Status::Skipped,
                Status::Skipped,
                Status::Skipped,
                Status::Skipped,
                Status::Error,
                Status::Success,
            ]
        );
        assert_eq!(audit[0].details, "Missing info for ADD on row 2.");
        assert_eq!(audit[2].action_command, "SHARE");
        assert!(audit[1].details.starts_with("Permission not found for ghost@x.com"));
        assert_eq!(audit[5].details, "Added anyone as Viewer.");
    }

    #[tokio::test]
    async fn anyone_link_is_removed_by_its_report_row_and_rolls_back() {
        let drive = drive();
        drive.grant("d1", PrincipalType::Anyone, None, Role::Reader);
        drive.grant("d1", PrincipalType::User, Some("a@x.com"), Role::Reader);
        let rows = [ChangeRow {
            principal_type: "anyone".into(),
            ..existing("d1", "REMOVE", "anyoneWithLink", "Viewer")
        }];

        let audit = run(&drive, &rows, false).await;
        assert_eq!(audit[0].status, Status::Success);
        assert_eq!(audit[0].details, "Removed anyone as Viewer.");
        let d1 = drive.permissions("d1");
        assert_eq!(d1.len(), 1);
        assert_eq!(d1[0].principal_type, PrincipalType::User);

        let undo = crate::rollback::generate_rollback_actions(&audit, &[]);
        let restored = run(&drive, &undo, false).await;
        assert_eq!(restored[0].status, Status::Success);
        assert!(drive
            .permissions("d1")
            .iter()
            .any(|p| p.principal_type == PrincipalType::Anyone && p.role == Role::Reader));

        // the restored link can itself be rolled back
        let again = crate::rollback::generate_rollback_actions(&restored, &[]);
        assert_eq!(run(&drive, &again, false).await[0].status, Status::Success);
        assert_eq!(drive.permissions("d1").len(), 1);
    }

    #[tokio::test]
    async fn restriction_follows_true_over_false_and_skips_unchanged() {
        let drive = drive();
        drive.grant("d1", PrincipalType::User, Some("a@x.com"), Role::Reader);
        drive.grant("d2", PrincipalType::User, Some("a@x.com"), Role::Reader);
        let rows = vec![
            restrict("d1", "false"),
            restrict("d1", "TRUE"),
            restrict("d2", "FALSE"),
            restrict("d2", ""),
        ];

        let audit = run(&drive, &rows, false).await;
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].item_id, "d1");
        assert_eq!(audit[0].original_role, "FALSE");
        assert_eq!(audit[0].new_role, "TRUE");
        assert_eq!(audit[0].status, Status::Success);
        assert_eq!(drive.item("d1").unwrap().copy_requires_writer_permission, Some(true));
    }

    #[tokio::test]
    async fn restriction_on_unreported_item_starts_from_not_available() {
        let drive = drive();
        let rows = [restrict("d2", "TRUE")];
        let audit = process_changes(&drive, &rows, "root", true, Some(&[][..]), 100)
            .await
            .unwrap();
        assert_eq!(audit[0].original_role, NOT_AVAILABLE);
        assert_eq!(audit[0].details, "Set Restrict Download from 'N/A' to 'TRUE'");
    }

    #[test]
    fn restriction_cell_is_not_an_action() {
        let row = existing("d1", "SET_DOWNLOAD_RESTRICTION", "", "");
        assert!(parse_action(Command::SetDownloadRestriction, &row, 2).is_err());
    }
}
