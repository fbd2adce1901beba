//! Who can reach what: one row per item, one column per email address found
//! anywhere under the root.

use std::collections::BTreeSet;

use super::{fetch_permissions, walk};
use crate::contacts::ContactDirectory;
use crate::drive::{DriveApi, DriveError};

pub const NO_ACCESS: &str = "No Access";
const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRow {
    pub path: String,
    pub item_id: String,
    /// API role per email column, `None` for no access.
    pub roles: Vec<Option<String>>,
    pub general_access: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessMatrix {
    /// Sorted, lower-cased.
    pub emails: Vec<String>,
    pub rows: Vec<MatrixRow>,
}

pub async fn build_matrix(
    drive: &dyn DriveApi,
    root_id: &str,
    batch_size: usize,
) -> Result<AccessMatrix, DriveError> {
    let items = walk(drive, root_id).await?;
    let permissions = fetch_permissions(drive, &items, batch_size, |done, total| {
        tracing::info!("fetching permissions {}/{}", done, total)
    })
    .await;

    let emails: Vec<String> = permissions
        .iter()
        .flatten()
        .flatten()
        .filter_map(|p| p.email_address.as_deref())
        .map(str::to_lowercase)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let rows = items
        .iter()
        .zip(&permissions)
        .map(|(walked, permissions)| {
            let permissions = permissions.as_deref().unwrap_or_default();
            let mut roles = vec![None; emails.len()];
            for permission in permissions {
                let Some(email) = permission.email_address.as_deref() else {
                    continue;
                };
                if let Ok(column) = emails.binary_search(&email.to_lowercase()) {
                    roles[column] = Some(permission.role.api_name().to_string());
                }
            }
            MatrixRow {
                path: walked.path.clone(),
                item_id: walked.item.id.clone(),
                roles,
                general_access: permissions.iter().any(|p| p.is_general_access()),
            }
        })
        .collect();

    Ok(AccessMatrix { emails, rows })
}

impl AccessMatrix {
    /// Three header records (names, titles, emails) followed by the data.
    pub fn to_records(&self, contacts: &ContactDirectory) -> Vec<Vec<String>> {
        let lookup = |email: &String, pick: fn(&crate::contacts::Contact) -> &str| {
            contacts
                .get(email)
                .map(|c| pick(c).to_string())
                .unwrap_or_else(|| UNKNOWN.to_string())
        };

        let mut names = vec!["Full Path".to_string(), "Item ID".to_string()];
        names.extend(self.emails.iter().map(|e| lookup(e, |c| c.name.as_str())));
        names.push("General Access".to_string());

        let mut titles = vec![String::new(), String::new()];
        titles.extend(self.emails.iter().map(|e| lookup(e, |c| c.title.as_str())));
        titles.push(String::new());

        let mut emails = vec![String::new(), String::new()];
        emails.extend(self.emails.iter().cloned());
        emails.push(String::new());

        let mut records = vec![names, titles, emails];
        for row in &self.rows {
            let mut record = vec![row.path.clone(), row.item_id.clone()];
            record.extend(
                row.roles
                    .iter()
                    .map(|r| r.clone().unwrap_or_else(|| NO_ACCESS.to_string())),
            );
            record.push(if row.general_access { "Yes" } else { "No" }.to_string());
            records.push(record);
        }
        records
    }
}
