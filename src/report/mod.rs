use std::collections::HashSet;

use async_recursion::async_recursion;

use crate::drive::batch::execute_in_batches;
use crate::drive::{DriveApi, DriveError, DriveItem, Permission, PrincipalType};
use crate::sheet::ReportRow;

pub mod matrix;
pub mod single;

pub const NOT_AVAILABLE: &str = "N/A";

/// An item together with its slash-separated path from the root, e.g.
/// `/Projects/Contracts/nda.pdf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedItem {
    pub item: DriveItem,
    pub path: String,
}

/// The root item followed by every descendant, depth-first.
///
/// Only a failure to read the root is an error. A folder whose listing fails
/// is logged and its subtree left out.
pub async fn walk(drive: &dyn DriveApi, root_id: &str) -> Result<Vec<WalkedItem>, DriveError> {
    let root = drive.get_item(root_id).await?;
    let root_path = format!("/{}", root.name);
    let is_folder = root.is_folder();

    let mut items = vec![WalkedItem {
        item: root,
        path: root_path.clone(),
    }];
    if is_folder {
        let mut visited = HashSet::from([root_id.to_string()]);
        walk_folder(drive, root_id, &root_path, &mut visited, &mut items).await;
    }
    tracing::info!("found {} items under {}", items.len(), root_id);
    Ok(items)
}

#[async_recursion]
async fn walk_folder(
    drive: &dyn DriveApi,
    folder_id: &str,
    path: &str,
    visited: &mut HashSet<String>,
    out: &mut Vec<WalkedItem>,
) {
    let mut page_token: Option<String> = None;
    loop {
        let page = match drive.list_children(folder_id, page_token.as_deref()).await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!("failed to list files in folder {}: {}", folder_id, e);
                return;
            }
        };

        for item in page.items {
            let item_path = format!("{}/{}", path, item.name);
            let id = item.id.clone();
            let is_folder = item.is_folder();
            out.push(WalkedItem {
                item,
                path: item_path.clone(),
            });

            // folders can be reachable through more than one parent
            if is_folder && visited.insert(id.clone()) {
                walk_folder(drive, &id, &item_path, visited, out).await;
            }
        }

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }
}

/// Permissions of each item, in item order; `None` where the fetch failed.
pub async fn fetch_permissions(
    drive: &dyn DriveApi,
    items: &[WalkedItem],
    batch_size: usize,
    mut progress: impl FnMut(usize, usize),
) -> Vec<Option<Vec<Permission>>> {
    let requests = items
        .iter()
        .map(|walked| drive.list_permissions(&walked.item.id))
        .collect();
    execute_in_batches(requests, batch_size, |done, total| progress(done, total)).await
}

/// The text the report shows for the principal of a permission.
pub fn principal_label(permission: &Permission) -> String {
    if let Some(email) = &permission.email_address {
        return email.clone();
    }
    if let Some(domain) = &permission.domain {
        return domain.clone();
    }
    if permission.principal_type == PrincipalType::Anyone {
        return "anyoneWithLink".to_string();
    }
    NOT_AVAILABLE.to_string()
}

fn bool_label(value: Option<bool>) -> String {
    match value {
        Some(true) => "TRUE".to_string(),
        Some(false) => "FALSE".to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// One row per permission on every item under `root_id`.
///
/// With `user_email`, only items where that address holds some permission are
/// kept, but all of their permissions are reported. Items whose permissions
/// could not be read, or that have none, are left out.
pub async fn generate_permission_report(
    drive: &dyn DriveApi,
    root_id: &str,
    user_email: Option<&str>,
    batch_size: usize,
    progress: impl FnMut(usize, usize),
) -> Result<Vec<ReportRow>, DriveError> {
    tracing::info!("starting report generation for folder {}", root_id);
    let items = walk(drive, root_id).await?;
    let permissions = fetch_permissions(drive, &items, batch_size, progress).await;

    let mut rows = Vec::new();
    for (walked, permissions) in items.iter().zip(permissions) {
        let Some(permissions) = permissions.filter(|p| !p.is_empty()) else {
            continue;
        };

        if let Some(email) = user_email {
            let has_access = permissions.iter().any(|p| {
                p.email_address
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email.trim()))
            });
            if !has_access {
                continue;
            }
        }

        let item = &walked.item;
        for permission in &permissions {
            rows.push(ReportRow {
                full_path: walked.path.clone(),
                item_name: item.name.clone(),
                item_id: item.id.clone(),
                role: permission.role.ui_name().to_string(),
                principal_type: permission.principal_type.to_string(),
                email_address: principal_label(permission),
                owner: item
                    .owner
                    .clone()
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                allow_discovery: bool_label(permission.allow_file_discovery),
                expiration_time: permission
                    .expiration_time
                    .clone()
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                url: item.web_view_link.clone().unwrap_or_default(),
                root_folder_id: root_id.to_string(),
                restrict_download: bool_label(item.copy_requires_writer_permission),
            });
        }
    }

    tracing::info!("generated {} permission entries", rows.len());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::memory::{MemoryDrive, Method};
    use crate::role::Role;

    fn tree() -> MemoryDrive {
        let drive = MemoryDrive::new("root", "Projects");
        drive
            .add_folder("root", "f1", "Contracts")
            .add_file("f1", "d1", "nda.pdf")
            .add_folder("f1", "f2", "Signed")
            .add_file("f2", "d3", "final.pdf")
            .add_file("root", "d2", "plan.pdf");
        drive
    }

    #[tokio::test]
    async fn walk_builds_paths_depth_first() {
        let drive = tree();
        let items = walk(&drive, "root").await.unwrap();
        let paths: Vec<_> = items.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "/Projects",
                "/Projects/Contracts",
                "/Projects/Contracts/nda.pdf",
                "/Projects/Contracts/Signed",
                "/Projects/Contracts/Signed/final.pdf",
                "/Projects/plan.pdf",
            ]
        );
    }

    #[tokio::test]
    async fn walk_follows_page_tokens() {
        let drive = tree();
        drive.set_page_size(1);
        assert_eq!(walk(&drive, "root").await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn walk_skips_unlistable_folders() {
        let drive = tree();
        drive.fail_item(Method::ListChildren, "f1", 500, 1);
        let items = walk(&drive, "root").await.unwrap();
        let ids: Vec<_> = items.iter().map(|w| w.item.id.as_str()).collect();
        assert_eq!(ids, vec!["root", "f1", "d2"]);
    }

    #[tokio::test]
    async fn walk_fails_when_root_is_missing() {
        let drive = tree();
        let err = walk(&drive, "nope").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn report_has_one_row_per_permission() {
        let drive = tree();
        drive.grant("d1", PrincipalType::User, Some("a@x.com"), Role::Writer);
        drive.grant("d1", PrincipalType::Anyone, None, Role::Reader);
        drive.grant("d2", PrincipalType::Domain, Some("x.com"), Role::Commenter);
        drive.set_restricted("d2", true);

        let rows = generate_permission_report(&drive, "root", None, 100, |_, _| {})
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].item_id, "d1");
        assert_eq!(rows[0].role, "Editor");
        assert_eq!(rows[0].email_address, "a@x.com");
        assert_eq!(rows[0].full_path, "/Projects/Contracts/nda.pdf");
        assert_eq!(rows[0].root_folder_id, "root");
        assert_eq!(rows[0].restrict_download, "FALSE");

        assert_eq!(rows[1].email_address, "anyoneWithLink");
        assert_eq!(rows[1].allow_discovery, "FALSE");
        assert_eq!(rows[2].email_address, "x.com");
        assert_eq!(rows[2].restrict_download, "TRUE");
    }

    #[tokio::test]
    async fn user_filter_keeps_whole_items() {
        let drive = tree();
        drive.grant("d1", PrincipalType::User, Some("a@x.com"), Role::Writer);
        drive.grant("d1", PrincipalType::User, Some("b@x.com"), Role::Reader);
        drive.grant("d2", PrincipalType::User, Some("b@x.com"), Role::Reader);

        let rows = generate_permission_report(&drive, "root", Some("A@X.com"), 100, |_, _| {})
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.item_id == "d1"));
    }

    #[tokio::test]
    async fn failed_permission_fetch_skips_the_item() {
        let drive = tree();
        drive.grant("d1", PrincipalType::User, Some("a@x.com"), Role::Writer);
        drive.grant("d2", PrincipalType::User, Some("a@x.com"), Role::Writer);
        drive.fail_item(Method::ListPermissions, "d1", 404, 1);

        let rows = generate_permission_report(&drive, "root", None, 100, |_, _| {})
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item_id, "d2");
    }
}
