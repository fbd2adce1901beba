//! Name and job title for the email addresses that show up in a report,
//! read from `name | email | title` ranges of Google Sheets.

use std::collections::HashMap;

use async_trait::async_trait;
use google_sheets4::api::Scope;
use google_sheets4::Sheets;
use serde_json::Value;

use crate::config::ContactSource;
use crate::drive::hub::Connector;
use crate::drive::{DriveError, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDirectory {
    by_email: HashMap<String, Contact>,
}

impl ContactDirectory {
    /// Rows shorter than three cells or without an email are ignored.
    pub fn from_rows(rows: &[Vec<String>]) -> Self {
        let by_email = rows
            .iter()
            .filter(|row| row.len() >= 3 && !row[1].trim().is_empty())
            .map(|row| {
                (
                    row[1].trim().to_lowercase(),
                    Contact {
                        name: row[0].trim().to_string(),
                        title: row[2].trim().to_string(),
                    },
                )
            })
            .collect();
        Self { by_email }
    }

    /// Entries of `other` win over existing ones.
    pub fn merge(&mut self, other: ContactDirectory) {
        self.by_email.extend(other.by_email);
    }

    pub fn get(&self, email: &str) -> Option<&Contact> {
        self.by_email.get(&email.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }
}

/// Where cell values come from.
#[async_trait]
pub trait RangeSource: Send + Sync {
    async fn values(&self, spreadsheet_id: &str, range: &str)
        -> Result<Vec<Vec<String>>, DriveError>;
}

pub struct SheetsRanges {
    hub: Sheets<Connector>,
}

impl SheetsRanges {
    pub fn new(hub: Sheets<Connector>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl RangeSource for SheetsRanges {
    async fn values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, DriveError> {
        let (_, value_range) = self
            .hub
            .spreadsheets()
            .values_get(spreadsheet_id, range)
            .add_scope(Scope::SpreadsheetReadonly)
            .doit()
            .await?;
        let raw = serde_json::to_value(value_range.values.unwrap_or_default())
            .map_err(|e| DriveError::Invalid(e.to_string()))?;
        Ok(cells(&raw))
    }
}

/// Flatten a JSON grid into strings; numbers and booleans keep their JSON text.
fn cells(grid: &Value) -> Vec<Vec<String>> {
    grid.as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| {
                            cells
                                .iter()
                                .map(|cell| match cell {
                                    Value::String(s) => s.clone(),
                                    Value::Null => String::new(),
                                    other => other.to_string(),
                                })
                                .collect()
                        })
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Read every configured range, later sources overriding earlier ones. A range
/// that cannot be read is logged and contributes nothing.
pub async fn load(
    source: &dyn RangeSource,
    sources: &[ContactSource],
    policy: RetryPolicy,
) -> ContactDirectory {
    let mut directory = ContactDirectory::default();
    for contact_source in sources {
        let what = format!("values.get {}", contact_source.range);
        let fetched = policy
            .run(&what, || {
                source.values(&contact_source.spreadsheet_id, &contact_source.range)
            })
            .await;
        match fetched {
            Ok(rows) => directory.merge(ContactDirectory::from_rows(&rows)),
            Err(e) => tracing::error!(
                "failed to read contacts from {} {}: {}",
                contact_source.spreadsheet_id,
                contact_source.range,
                e
            ),
        }
    }
    tracing::info!("loaded {} contacts", directory.len());
    directory
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    struct FixedRanges;

    #[async_trait]
    impl RangeSource for FixedRanges {
        async fn values(
            &self,
            _spreadsheet_id: &str,
            range: &str,
        ) -> Result<Vec<Vec<String>>, DriveError> {
            match range {
                "Sponsors!B:D" => Ok(vec![
                    row(&["Ana Ruiz", "Ana@Sponsor.com ", "Monitor"]),
                    row(&["Luis", "luis@sponsor.com", "CRA"]),
                ]),
                "bioaccess!B:D" => Ok(vec![row(&["Ana R.", "ana@sponsor.com", "Lead"])]),
                _ => Err(DriveError::api(400, "Unable to parse range")),
            }
        }
    }

    fn source(range: &str) -> ContactSource {
        ContactSource {
            spreadsheet_id: "sheet".into(),
            range: range.into(),
        }
    }

    #[test]
    fn ignores_short_and_anonymous_rows() {
        let directory = ContactDirectory::from_rows(&[
            row(&["Name", "", "Title"]),
            row(&["Only", "two@x.com"]),
            row(&["Full", " Full@X.com ", " Boss "]),
        ]);
        assert_eq!(directory.len(), 1);
        let contact = directory.get("full@x.com").unwrap();
        assert_eq!(contact.name, "Full");
        assert_eq!(contact.title, "Boss");
    }

    #[test]
    fn flattens_mixed_cells() {
        let grid = json!([["a", 1, true], [null, "b"]]);
        assert_eq!(
            cells(&grid),
            vec![row(&["a", "1", "true"]), row(&["", "b"])]
        );
    }

    #[tokio::test]
    async fn later_sources_override_and_failures_are_skipped() {
        let directory = load(
            &FixedRanges,
            &[
                source("Sponsors!B:D"),
                source("bioaccess!B:D"),
                source("broken"),
            ],
            RetryPolicy::immediate(0),
        )
        .await;

        assert_eq!(directory.len(), 2);
        assert_eq!(directory.get("ana@sponsor.com").unwrap().title, "Lead");
        assert_eq!(directory.get("LUIS@sponsor.com").unwrap().name, "Luis");
    }
}
