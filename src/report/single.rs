use super::matrix::NO_ACCESS;
use super::{fetch_permissions, walk};
use crate::drive::{DriveApi, DriveError};
use crate::role::Role;

/// Access of one address to one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRow {
    pub path: String,
    pub item_id: String,
    pub role: Option<Role>,
    pub general_access: bool,
}

/// Every item under `root_id`, the root included, with the role `email` holds
/// on it. Items whose permissions cannot be read show no access.
pub async fn single_principal_report(
    drive: &dyn DriveApi,
    root_id: &str,
    email: &str,
    batch_size: usize,
) -> Result<Vec<AccessRow>, DriveError> {
    let target = email.trim().to_lowercase();
    let items = walk(drive, root_id).await?;
    let permissions = fetch_permissions(drive, &items, batch_size, |done, total| {
        tracing::info!("fetching permissions {}/{}", done, total)
    })
    .await;

    let rows = items
        .into_iter()
        .zip(permissions)
        .map(|(walked, permissions)| {
            let permissions = permissions.unwrap_or_default();
            let role = permissions
                .iter()
                .find(|p| {
                    p.email_address
                        .as_deref()
                        .is_some_and(|e| e.to_lowercase() == target)
                })
                .map(|p| p.role);
            AccessRow {
                path: walked.path,
                item_id: walked.item.id,
                role,
                general_access: permissions.iter().any(|p| p.is_general_access()),
            }
        })
        .collect();
    Ok(rows)
}

/// Header line followed by one record per row.
pub fn to_records(email: &str, rows: &[AccessRow]) -> Vec<Vec<String>> {
    let header = vec![
        "Item Path".to_string(),
        "Item ID".to_string(),
        format!("Role for {}", email.trim().to_lowercase()),
        "General Access".to_string(),
    ];
    std::iter::once(header)
        .chain(rows.iter().map(|row| {
            vec![
                row.path.clone(),
                row.item_id.clone(),
                row.role
                    .map(|r| r.api_name().to_string())
                    .unwrap_or_else(|| NO_ACCESS.to_string()),
                if row.general_access { "Yes" } else { "No" }.to_string(),
            ]
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::memory::{MemoryDrive, Method};
    use crate::drive::PrincipalType;

    #[tokio::test]
    async fn reports_role_for_every_item() {
        let drive = MemoryDrive::new("root", "Study");
        drive
            .add_folder("root", "f1", "Site 01")
            .add_file("f1", "d1", "log.pdf")
            .add_file("root", "d2", "plan.pdf");
        drive.grant("root", PrincipalType::User, Some("CRA@x.com"), Role::Reader);
        drive.grant("d1", PrincipalType::User, Some("cra@x.com"), Role::Writer);
        drive.grant("d1", PrincipalType::Group, Some("team@x.com"), Role::Reader);
        drive.fail_item(Method::ListPermissions, "d2", 404, 1);

        let rows = single_principal_report(&drive, "root", " Cra@X.com", 100)
            .await
            .unwrap();
        let records = to_records("Cra@X.com", &rows);

        assert_eq!(
            records,
            vec![
                vec!["Item Path", "Item ID", "Role for cra@x.com", "General Access"],
                vec!["/Study", "root", "reader", "No"],
                vec!["/Study/Site 01", "f1", NO_ACCESS, "No"],
                vec!["/Study/Site 01/log.pdf", "d1", "writer", "Yes"],
                vec!["/Study/plan.pdf", "d2", NO_ACCESS, "No"],
            ]
        );
    }
}
