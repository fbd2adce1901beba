//! Audit and bulk-edit Google Drive sharing permissions across a folder tree.
//!
//! The pipeline is: list every item under a root folder, fetch its permissions,
//! diff them against a user-edited CSV sheet, apply the differences through the
//! Drive API, and keep a CSV audit trail that can be inverted for rollback.

pub mod audit;
pub mod config;
pub mod contacts;
pub mod drive;
pub mod logging;
pub mod report;
pub mod role;
pub mod sheet;
pub mod workflow;

pub mod changes;
pub mod strip;
pub mod rollback;

pub use config::AppConfig;
pub use drive::{DriveApi, DriveError, DriveItem, Grant, Permission, PrincipalType};
pub use role::Role;
