use std::fmt;
use std::str::FromStr;

use chrono::Local;
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of one attempted change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    DryRun,
    Pending,
    Success,
    /// The Drive API refused the call.
    Error,
    /// The row could not be turned into a call (bad input, nothing to act on).
    Skipped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::DryRun => "DRY_RUN",
            Status::Pending => "PENDING",
            Status::Success => "SUCCESS",
            Status::Error => "ERROR",
            Status::Skipped => "SKIPPED",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Add,
    Remove,
    Modify,
    SetDownloadRestriction,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Add => "ADD",
            Command::Remove => "REMOVE",
            Command::Modify => "MODIFY",
            Command::SetDownloadRestriction => "SET_DOWNLOAD_RESTRICTION",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADD" => Ok(Command::Add),
            "REMOVE" => Ok(Command::Remove),
            "MODIFY" => Ok(Command::Modify),
            "SET_DOWNLOAD_RESTRICTION" => Ok(Command::SetDownloadRestriction),
            other => Err(other.to_string()),
        }
    }
}

/// One row of the audit log.
///
/// `action_command` stays a string so that a row with an unrecognised command
/// is still logged verbatim (as `SKIPPED`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Root Folder ID")]
    pub root_folder_id: String,
    #[serde(rename = "Full Path", default)]
    pub full_path: String,
    #[serde(rename = "Item Name", default)]
    pub item_name: String,
    #[serde(rename = "Item ID")]
    pub item_id: String,
    #[serde(rename = "Action_Command")]
    pub action_command: String,
    #[serde(rename = "Status")]
    pub status: Status,
    #[serde(rename = "Details", default)]
    pub details: String,
    #[serde(rename = "Original_Principal_Type", default)]
    pub original_principal_type: String,
    #[serde(rename = "Original_Email_Address", default)]
    pub original_email_address: String,
    #[serde(rename = "Original_Role", default)]
    pub original_role: String,
    #[serde(rename = "New_Principal_Type", default)]
    pub new_principal_type: String,
    #[serde(rename = "New_Email_Address", default)]
    pub new_email_address: String,
    #[serde(rename = "New_Role", default)]
    pub new_role: String,
}

impl AuditEntry {
    /// A blank entry stamped with the current local time.
    pub fn new(root_folder_id: &str, item_id: &str, action_command: &str, status: Status) -> Self {
        Self {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            root_folder_id: root_folder_id.to_string(),
            full_path: String::new(),
            item_name: String::new(),
            item_id: item_id.to_string(),
            action_command: action_command.to_string(),
            status,
            details: String::new(),
            original_principal_type: String::new(),
            original_email_address: String::new(),
            original_role: String::new(),
            new_principal_type: String::new(),
            new_email_address: String::new(),
            new_role: String::new(),
        }
    }

    pub fn command(&self) -> Option<Command> {
        self.action_command.parse().ok()
    }

    /// The address the entry is about: the new one for an ADD, else the original.
    pub fn subject(&self) -> &str {
        if self.new_email_address.is_empty() {
            &self.original_email_address
        } else {
            &self.new_email_address
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_case_insensitively() {
        assert_eq!("add".parse::<Command>(), Ok(Command::Add));
        assert_eq!(
            " set_download_restriction ".parse::<Command>(),
            Ok(Command::SetDownloadRestriction)
        );
        assert_eq!("SHARE".parse::<Command>(), Err("SHARE".to_string()));
    }

    #[test]
    fn new_entry_has_a_timestamp() {
        let entry = AuditEntry::new("root", "item", "ADD", Status::DryRun);
        assert_eq!(entry.timestamp.len(), "2025-01-01 00:00:00".len());
        assert_eq!(entry.command(), Some(Command::Add));
        assert_eq!(entry.status.to_string(), "DRY_RUN");
    }
}
