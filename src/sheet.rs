//! CSV sheets: the permission report, the editable change sheet and the audit log.
//!
//! Column names are the ones people see when they open the files in a
//! spreadsheet, so they are kept human-readable rather than snake_case.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::audit::AuditEntry;

/// One permission on one item, as fetched from Drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    #[serde(rename = "Full Path")]
    pub full_path: String,
    #[serde(rename = "Item Name")]
    pub item_name: String,
    #[serde(rename = "Item ID")]
    pub item_id: String,
    #[serde(rename = "Role")]
    pub role: String,
    #[serde(rename = "Principal Type")]
    pub principal_type: String,
    #[serde(rename = "Email Address")]
    pub email_address: String,
    #[serde(rename = "Owner")]
    pub owner: String,
    #[serde(rename = "Allow Discovery")]
    pub allow_discovery: String,
    #[serde(rename = "Expiration Time")]
    pub expiration_time: String,
    #[serde(rename = "Google Drive URL")]
    pub url: String,
    #[serde(rename = "Root Folder ID")]
    pub root_folder_id: String,
    #[serde(rename = "Restrict Download")]
    pub restrict_download: String,
}

/// A row of the sheet users edit to request changes.
///
/// Every column is optional on read; validation happens when the row is
/// turned into an API call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeRow {
    #[serde(rename = "Full Path")]
    pub full_path: String,
    #[serde(rename = "Item Name")]
    pub item_name: String,
    #[serde(rename = "Item ID")]
    pub item_id: String,
    #[serde(rename = "Role")]
    pub role: String,
    #[serde(rename = "Principal Type")]
    pub principal_type: String,
    #[serde(rename = "Email Address")]
    pub email_address: String,
    #[serde(rename = "Owner")]
    pub owner: String,
    #[serde(rename = "Allow Discovery")]
    pub allow_discovery: String,
    #[serde(rename = "Expiration Time")]
    pub expiration_time: String,
    #[serde(rename = "Google Drive URL")]
    pub url: String,
    #[serde(rename = "Root Folder ID")]
    pub root_folder_id: String,
    #[serde(rename = "Restrict Download")]
    pub restrict_download: String,
    #[serde(rename = "Action_Type")]
    pub action_type: String,
    #[serde(rename = "New_Role")]
    pub new_role: String,
    #[serde(rename = "Type (for ADD)")]
    pub add_type: String,
    #[serde(rename = "Email/Domain (for ADD)")]
    pub add_address: String,
}

impl From<&ReportRow> for ChangeRow {
    fn from(row: &ReportRow) -> Self {
        Self {
            full_path: row.full_path.clone(),
            item_name: row.item_name.clone(),
            item_id: row.item_id.clone(),
            role: row.role.clone(),
            principal_type: row.principal_type.clone(),
            email_address: row.email_address.clone(),
            owner: row.owner.clone(),
            allow_discovery: row.allow_discovery.clone(),
            expiration_time: row.expiration_time.clone(),
            url: row.url.clone(),
            root_folder_id: row.root_folder_id.clone(),
            restrict_download: row.restrict_download.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("CSV error in {}: {source}", .path.display())]
    Csv { path: PathBuf, source: csv::Error },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{} has no rows", .0.display())]
    Empty(PathBuf),
}

fn create_parent(path: &Path) -> Result<(), SheetError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> SheetError + '_ {
    move |source| SheetError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `rows` with a header line derived from their field names.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), SheetError> {
    create_parent(path)?;
    let mut writer = csv::Writer::from_path(path).map_err(csv_error(path))?;
    for row in rows {
        writer.serialize(row).map_err(csv_error(path))?;
    }
    writer.flush()?;
    tracing::info!("wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Write pre-built records, for sheets whose header is not a single line.
pub fn write_records(path: &Path, records: &[Vec<String>]) -> Result<(), SheetError> {
    create_parent(path)?;
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_error(path))?;
    for record in records {
        writer.write_record(record).map_err(csv_error(path))?;
    }
    writer.flush()?;
    tracing::info!("wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Read every row; fields are trimmed and unknown columns ignored.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SheetError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error(path))?;
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(csv_error(path))?;
    if rows.is_empty() {
        return Err(SheetError::Empty(path.to_path_buf()));
    }
    Ok(rows)
}

/// The baseline archive: every report column.
pub fn write_report(path: &Path, rows: &[ReportRow]) -> Result<(), SheetError> {
    write_rows(path, rows)
}

/// The editor sheet: report columns plus empty action columns to fill in.
pub fn write_change_sheet(path: &Path, rows: &[ReportRow]) -> Result<(), SheetError> {
    let rows: Vec<ChangeRow> = rows.iter().map(ChangeRow::from).collect();
    write_rows(path, &rows)
}

pub fn read_change_sheet(path: &Path) -> Result<Vec<ChangeRow>, SheetError> {
    read_rows(path)
}

pub fn write_audit_log(path: &Path, entries: &[AuditEntry]) -> Result<(), SheetError> {
    write_rows(path, entries)
}

pub fn read_audit_log(path: &Path) -> Result<Vec<AuditEntry>, SheetError> {
    read_rows(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Status;

    fn report_row() -> ReportRow {
        ReportRow {
            full_path: "/Projects/plan.pdf".into(),
            item_name: "plan.pdf".into(),
            item_id: "d2".into(),
            role: "Editor".into(),
            principal_type: "user".into(),
            email_address: "a@x.com".into(),
            owner: "owner@example.com".into(),
            allow_discovery: "N/A".into(),
            expiration_time: "N/A".into(),
            url: "https://drive.google.com/open?id=d2".into(),
            root_folder_id: "root".into(),
            restrict_download: "FALSE".into(),
        }
    }

    #[test]
    fn change_sheet_reads_back_with_blank_actions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/editor.csv");
        write_change_sheet(&path, &[report_row()]).unwrap();

        let header = fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("Full Path,Item Name,Item ID,Role,"));
        assert!(header.contains(
            "Owner,Allow Discovery,Expiration Time,Google Drive URL,Root Folder ID,"
        ));
        assert!(header.contains("Type (for ADD),Email/Domain (for ADD)"));

        let rows = read_change_sheet(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item_id, "d2");
        assert_eq!(rows[0].root_folder_id, "root");
        assert_eq!(rows[0].allow_discovery, "N/A");
        assert_eq!(rows[0].expiration_time, "N/A");
        assert!(rows[0].action_type.is_empty());
    }

    #[test]
    fn change_sheet_tolerates_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edited.csv");
        fs::write(
            &path,
            "Item ID,Root Folder ID,Action_Type,New_Role\n d1 ,root, add ,Viewer\n",
        )
        .unwrap();

        let rows = read_change_sheet(&path).unwrap();
        assert_eq!(rows[0].item_id, "d1");
        assert_eq!(rows[0].action_type, "add");
        assert!(rows[0].restrict_download.is_empty());
    }

    #[test]
    fn header_only_sheet_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "Item ID,Root Folder ID\n").unwrap();
        assert!(matches!(read_change_sheet(&path), Err(SheetError::Empty(_))));
    }

    #[test]
    fn audit_log_keeps_status_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/audit.csv");
        let mut entry = AuditEntry::new("root", "d1", "SET_DOWNLOAD_RESTRICTION", Status::Success);
        entry.original_role = "FALSE".into();
        entry.new_role = "TRUE".into();
        write_audit_log(&path, &[entry.clone()]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains(",SUCCESS,"));
        assert_eq!(read_audit_log(&path).unwrap(), vec![entry]);
    }
}
