use std::collections::HashMap;

use crate::audit::{AuditEntry, Command, Status};
use crate::report::NOT_AVAILABLE;
use crate::sheet::{ChangeRow, ReportRow};

/// The change rows that undo the successful entries of an audit log.
///
/// Only `SUCCESS` entries are inverted, and the rows come out in reverse log
/// order: the newest entry's undo is first. Path and name come from
/// `live_report`, or `N/A` for items it does not list.
pub fn generate_rollback_actions(entries: &[AuditEntry], live_report: &[ReportRow]) -> Vec<ChangeRow> {
    let successful = entries
        .iter()
        .filter(|e| e.status == Status::Success)
        .count();
    if successful == 0 {
        tracing::info!("no successful actions in the log to roll back");
        return Vec::new();
    }

    let mut metadata: HashMap<&str, &ReportRow> = HashMap::new();
    for row in live_report {
        metadata.entry(row.item_id.as_str()).or_insert(row);
    }
    let root_folder_id = live_report
        .first()
        .map(|r| r.root_folder_id.clone())
        .unwrap_or_default();

    let actions: Vec<ChangeRow> = entries
        .iter()
        .rev()
        .filter(|e| e.status == Status::Success)
        .filter_map(|entry| {
            let (full_path, item_name) = match metadata.get(entry.item_id.as_str()) {
                Some(row) => (row.full_path.clone(), row.item_name.clone()),
                None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
            };
            let base = ChangeRow {
                item_id: entry.item_id.clone(),
                full_path,
                item_name,
                root_folder_id: root_folder_id.clone(),
                ..Default::default()
            };

            let row = match entry.command()? {
                Command::Add => ChangeRow {
                    action_type: Command::Remove.to_string(),
                    principal_type: entry.new_principal_type.clone(),
                    email_address: entry.new_email_address.clone(),
                    role: entry.new_role.clone(),
                    ..base
                },
                Command::Remove => ChangeRow {
                    action_type: Command::Add.to_string(),
                    add_type: entry.original_principal_type.clone(),
                    add_address: entry.original_email_address.clone(),
                    new_role: entry.original_role.clone(),
                    ..base
                },
                Command::Modify => ChangeRow {
                    action_type: Command::Modify.to_string(),
                    principal_type: entry.original_principal_type.clone(),
                    email_address: entry.original_email_address.clone(),
                    role: entry.new_role.clone(),
                    new_role: entry.original_role.clone(),
                    ..base
                },
                Command::SetDownloadRestriction => ChangeRow {
                    restrict_download: entry.original_role.clone(),
                    ..base
                },
            };
            Some(row)
        })
        .collect();

    tracing::info!(
        "generated {} rollback actions from {} successful entries",
        actions.len(),
        successful
    );
    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(item_id: &str, command: Command, status: Status) -> AuditEntry {
        AuditEntry::new("root", item_id, command.as_str(), status)
    }

    fn live(item_id: &str, path: &str) -> ReportRow {
        ReportRow {
            full_path: path.into(),
            item_name: path.rsplit('/').next().unwrap_or_default().into(),
            item_id: item_id.into(),
            role: "Viewer".into(),
            principal_type: "user".into(),
            email_address: "a@x.com".into(),
            owner: "owner@example.com".into(),
            allow_discovery: "N/A".into(),
            expiration_time: "N/A".into(),
            url: String::new(),
            root_folder_id: "root".into(),
            restrict_download: "FALSE".into(),
        }
    }

    #[test]
    fn inverts_successes_newest_first() {
        let mut added = entry("d1", Command::Add, Status::Success);
        added.new_principal_type = "user".into();
        added.new_email_address = "b@x.com".into();
        added.new_role = "Editor".into();

        let mut removed = entry("d2", Command::Remove, Status::Success);
        removed.original_principal_type = "group".into();
        removed.original_email_address = "team@x.com".into();
        removed.original_role = "Viewer".into();

        let mut modified = entry("d1", Command::Modify, Status::Success);
        modified.original_principal_type = "user".into();
        modified.original_email_address = "c@x.com".into();
        modified.original_role = "Commenter".into();
        modified.new_role = "Editor".into();

        let mut restricted = entry("d1", Command::SetDownloadRestriction, Status::Success);
        restricted.original_role = "FALSE".into();
        restricted.new_role = "TRUE".into();

        let failed = entry("d1", Command::Add, Status::Error);

        let actions = generate_rollback_actions(
            &[restricted, added, failed, removed, modified],
            &[live("d1", "/Projects/nda.pdf")],
        );
        assert_eq!(actions.len(), 4);

        assert_eq!(actions[0].action_type, "MODIFY");
        assert_eq!(actions[0].email_address, "c@x.com");
        assert_eq!(actions[0].role, "Editor");
        assert_eq!(actions[0].new_role, "Commenter");
        assert_eq!(actions[0].full_path, "/Projects/nda.pdf");
        assert_eq!(actions[0].item_name, "nda.pdf");

        assert_eq!(actions[1].action_type, "ADD");
        assert_eq!(actions[1].add_type, "group");
        assert_eq!(actions[1].add_address, "team@x.com");
        assert_eq!(actions[1].new_role, "Viewer");
        assert_eq!(actions[1].full_path, NOT_AVAILABLE);

        assert_eq!(actions[2].action_type, "REMOVE");
        assert_eq!(actions[2].email_address, "b@x.com");
        assert_eq!(actions[2].role, "Editor");

        assert!(actions[3].action_type.is_empty());
        assert_eq!(actions[3].restrict_download, "FALSE");
        assert!(actions.iter().all(|a| a.root_folder_id == "root"));
    }

    #[test]
    fn nothing_to_undo_without_successes() {
        let entries = [
            entry("d1", Command::Add, Status::DryRun),
            entry("d1", Command::Remove, Status::Skipped),
        ];
        assert!(generate_rollback_actions(&entries, &[]).is_empty());
    }

    #[test]
    fn unknown_commands_are_ignored() {
        let mut odd = entry("d1", Command::Add, Status::Success);
        odd.action_command = "SHARE".into();
        assert!(generate_rollback_actions(&[odd], &[]).is_empty());
    }
}
