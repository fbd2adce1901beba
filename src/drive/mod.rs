//! The Drive API seam.
//!
//! Everything above this module talks to Drive through [`DriveApi`]. The
//! production implementation is [`hub::HubDrive`], built on `google-drive3`;
//! [`memory::MemoryDrive`] keeps a tree in memory for tests and rehearsals, and
//! [`retry::Retrying`] wraps either one with exponential backoff.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::role::Role;

pub mod auth;
pub mod batch;
pub mod error;
pub mod hub;
pub mod memory;
pub mod retry;

pub use error::DriveError;
pub use retry::{Retrying, RetryPolicy};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A file or folder in Drive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub parents: Vec<String>,
    /// Email of the first listed owner.
    pub owner: Option<String>,
    pub web_view_link: Option<String>,
    pub copy_requires_writer_permission: Option<bool>,
}

impl DriveItem {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// One page of a folder listing.
#[derive(Debug, Clone, Default)]
pub struct ItemPage {
    pub items: Vec<DriveItem>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalType {
    User,
    Group,
    Domain,
    Anyone,
}

impl PrincipalType {
    pub fn as_str(self) -> &'static str {
        match self {
            PrincipalType::User => "user",
            PrincipalType::Group => "group",
            PrincipalType::Domain => "domain",
            PrincipalType::Anyone => "anyone",
        }
    }

    /// Users and groups are addressed by email, domains by domain name.
    pub fn uses_email(self) -> bool {
        matches!(self, PrincipalType::User | PrincipalType::Group)
    }
}

impl fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown principal type: {0:?}")]
pub struct UnknownPrincipalType(pub String);

impl FromStr for PrincipalType {
    type Err = UnknownPrincipalType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(PrincipalType::User),
            "group" => Ok(PrincipalType::Group),
            "domain" => Ok(PrincipalType::Domain),
            "anyone" => Ok(PrincipalType::Anyone),
            _ => Err(UnknownPrincipalType(s.to_string())),
        }
    }
}

/// A grant of a role to a principal on one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub id: String,
    pub principal_type: PrincipalType,
    pub role: Role,
    pub email_address: Option<String>,
    pub domain: Option<String>,
    pub allow_file_discovery: Option<bool>,
    pub expiration_time: Option<String>,
}

impl Permission {
    /// The address that identifies the principal: email for users and groups,
    /// domain for domains, nothing for `anyone`.
    pub fn address(&self) -> Option<&str> {
        match self.principal_type {
            PrincipalType::User | PrincipalType::Group => self.email_address.as_deref(),
            PrincipalType::Domain => self.domain.as_deref(),
            PrincipalType::Anyone => None,
        }
    }

    /// `address` is ignored for `anyone`, which has none.
    pub fn matches(&self, principal_type: PrincipalType, address: &str, role: Role) -> bool {
        if self.principal_type != principal_type || self.role != role {
            return false;
        }
        match principal_type {
            PrincipalType::Anyone => true,
            _ => self
                .address()
                .is_some_and(|own| own.eq_ignore_ascii_case(address.trim())),
        }
    }

    /// Broad sharing: anyone, a whole domain or a group.
    pub fn is_general_access(&self) -> bool {
        matches!(
            self.principal_type,
            PrincipalType::Anyone | PrincipalType::Domain | PrincipalType::Group
        )
    }
}

/// The body of a permission create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub principal_type: PrincipalType,
    pub address: Option<String>,
    pub role: Role,
}

#[async_trait]
pub trait DriveApi: Send + Sync {
    async fn get_item(&self, item_id: &str) -> Result<DriveItem, DriveError>;

    /// List one page of the non-trashed children of `folder_id`.
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ItemPage, DriveError>;

    /// All permissions on an item, across pages.
    async fn list_permissions(&self, item_id: &str) -> Result<Vec<Permission>, DriveError>;

    async fn create_permission(
        &self,
        item_id: &str,
        grant: &Grant,
    ) -> Result<Permission, DriveError>;

    async fn update_permission(
        &self,
        item_id: &str,
        permission_id: &str,
        role: Role,
    ) -> Result<(), DriveError>;

    async fn delete_permission(&self, item_id: &str, permission_id: &str)
        -> Result<(), DriveError>;

    /// Toggle `copyRequiresWriterPermission`, i.e. whether viewers and
    /// commenters may download, print or copy the item.
    async fn set_download_restriction(
        &self,
        item_id: &str,
        restricted: bool,
    ) -> Result<(), DriveError>;

    /// Email of the authenticated account.
    async fn whoami(&self) -> Result<String, DriveError>;
}

/// Find the id of the permission held by `address` with exactly `role`.
pub async fn find_permission_id<D: DriveApi + ?Sized>(
    drive: &D,
    item_id: &str,
    principal_type: PrincipalType,
    address: &str,
    role: Role,
) -> Result<Option<String>, DriveError> {
    let permissions = drive.list_permissions(item_id).await?;
    Ok(permissions
        .into_iter()
        .find(|p| p.matches(principal_type, address, role))
        .map(|p| p.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permission(principal_type: PrincipalType, email: Option<&str>, domain: Option<&str>) -> Permission {
        Permission {
            id: "p1".into(),
            principal_type,
            role: Role::Writer,
            email_address: email.map(str::to_string),
            domain: domain.map(str::to_string),
            allow_file_discovery: None,
            expiration_time: None,
        }
    }

    #[test]
    fn address_depends_on_principal_type() {
        let user = permission(PrincipalType::User, Some("a@x.com"), None);
        assert_eq!(user.address(), Some("a@x.com"));
        let domain = permission(PrincipalType::Domain, None, Some("x.com"));
        assert_eq!(domain.address(), Some("x.com"));
        let anyone = permission(PrincipalType::Anyone, None, None);
        assert_eq!(anyone.address(), None);
    }

    #[test]
    fn matches_ignores_address_case() {
        let user = permission(PrincipalType::User, Some("Alice@X.com"), None);
        assert!(user.matches(PrincipalType::User, "alice@x.com", Role::Writer));
        assert!(!user.matches(PrincipalType::User, "alice@x.com", Role::Reader));
        assert!(!user.matches(PrincipalType::Group, "alice@x.com", Role::Writer));
    }

    #[test]
    fn anyone_matches_without_address() {
        let anyone = permission(PrincipalType::Anyone, None, None);
        assert!(anyone.matches(PrincipalType::Anyone, "anyoneWithLink", Role::Writer));
        let nameless = permission(PrincipalType::User, None, None);
        assert!(!nameless.matches(PrincipalType::User, "", Role::Writer));
    }

    #[test]
    fn principal_type_parses_loosely() {
        assert_eq!("User".parse::<PrincipalType>().unwrap(), PrincipalType::User);
        assert_eq!(" domain ".parse::<PrincipalType>().unwrap(), PrincipalType::Domain);
        assert!("robot".parse::<PrincipalType>().is_err());
    }
}
