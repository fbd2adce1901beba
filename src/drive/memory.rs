//! In-memory implementation of [`DriveApi`].
//!
//! Holds a folder tree and per-item permission lists behind a mutex. It is
//! used by the test-suite and for rehearsing a sheet without credentials.
//!
//! Besides plain state it can:
//! - fail the next N calls of a method (optionally for one item) with a given
//!   HTTP status, to exercise retry and per-row error handling;
//! - page folder listings with a small page size;
//! - record every call in a journal, so tests can assert that dry runs did
//!   not mutate anything.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{
    DriveApi, DriveError, DriveItem, Grant, ItemPage, Permission, PrincipalType, FOLDER_MIME_TYPE,
};
use crate::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GetItem,
    ListChildren,
    ListPermissions,
    CreatePermission,
    UpdatePermission,
    DeletePermission,
    SetDownloadRestriction,
    Whoami,
}

impl Method {
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Method::CreatePermission
                | Method::UpdatePermission
                | Method::DeletePermission
                | Method::SetDownloadRestriction
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: Method,
    pub item_id: String,
}

#[derive(Debug)]
struct Failure {
    method: Method,
    item_id: Option<String>,
    status: u16,
    remaining: u32,
}

#[derive(Debug, Default)]
struct State {
    items: HashMap<String, DriveItem>,
    children: HashMap<String, Vec<String>>,
    permissions: HashMap<String, Vec<Permission>>,
    next_permission: u64,
    failures: Vec<Failure>,
    journal: Vec<Call>,
    page_size: usize,
    account: String,
}

pub struct MemoryDrive {
    state: Mutex<State>,
}

impl MemoryDrive {
    pub const ACCOUNT: &'static str = "owner@example.com";

    /// A drive holding a single root folder.
    pub fn new(root_id: &str, root_name: &str) -> Self {
        let drive = Self {
            state: Mutex::new(State {
                page_size: 1000,
                account: Self::ACCOUNT.to_string(),
                ..Default::default()
            }),
        };
        drive.insert(None, root_id, root_name, FOLDER_MIME_TYPE);
        drive
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // a panicking test thread must not hide the state from the assertions
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert(&self, parent: Option<&str>, id: &str, name: &str, mime_type: &str) {
        let mut state = self.lock();
        let item = DriveItem {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            parents: parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
            owner: Some(state.account.clone()),
            web_view_link: Some(format!("https://drive.google.com/open?id={}", id)),
            copy_requires_writer_permission: Some(false),
        };
        if let Some(parent) = parent {
            state
                .children
                .entry(parent.to_string())
                .or_default()
                .push(id.to_string());
        }
        state.items.insert(id.to_string(), item);
        state.permissions.entry(id.to_string()).or_default();
    }

    pub fn add_folder(&self, parent: &str, id: &str, name: &str) -> &Self {
        self.insert(Some(parent), id, name, FOLDER_MIME_TYPE);
        self
    }

    pub fn add_file(&self, parent: &str, id: &str, name: &str) -> &Self {
        self.insert(Some(parent), id, name, "application/pdf");
        self
    }

    /// Add a permission directly, bypassing the journal. Returns its id.
    pub fn grant(
        &self,
        item_id: &str,
        principal_type: PrincipalType,
        address: Option<&str>,
        role: Role,
    ) -> String {
        let mut state = self.lock();
        let permission = new_permission(&mut state, principal_type, address, role);
        let id = permission.id.clone();
        state
            .permissions
            .entry(item_id.to_string())
            .or_default()
            .push(permission);
        id
    }

    pub fn permissions(&self, item_id: &str) -> Vec<Permission> {
        self.lock()
            .permissions
            .get(item_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn item(&self, item_id: &str) -> Option<DriveItem> {
        self.lock().items.get(item_id).cloned()
    }

    pub fn set_restricted(&self, item_id: &str, restricted: bool) {
        if let Some(item) = self.lock().items.get_mut(item_id) {
            item.copy_requires_writer_permission = Some(restricted);
        }
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.lock().page_size = page_size.max(1);
    }

    /// Fail the next `times` calls of `method` on any item with `status`.
    pub fn fail_next(&self, method: Method, status: u16, times: u32) {
        self.lock().failures.push(Failure {
            method,
            item_id: None,
            status,
            remaining: times,
        });
    }

    /// Fail the next `times` calls of `method` on `item_id` with `status`.
    pub fn fail_item(&self, method: Method, item_id: &str, status: u16, times: u32) {
        self.lock().failures.push(Failure {
            method,
            item_id: Some(item_id.to_string()),
            status,
            remaining: times,
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().journal.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method.is_mutation())
            .collect()
    }

    /// Journal the call and consume an injected failure if one matches.
    fn enter(&self, method: Method, item_id: &str) -> Result<MutexGuard<'_, State>, DriveError> {
        let mut state = self.lock();
        state.journal.push(Call {
            method,
            item_id: item_id.to_string(),
        });

        let hit = state.failures.iter_mut().find(|f| {
            f.remaining > 0
                && f.method == method
                && f.item_id.as_deref().map_or(true, |id| id == item_id)
        });
        if let Some(failure) = hit {
            failure.remaining -= 1;
            return Err(DriveError::api(failure.status, "injected failure"));
        }
        Ok(state)
    }
}

fn new_permission(
    state: &mut State,
    principal_type: PrincipalType,
    address: Option<&str>,
    role: Role,
) -> Permission {
    state.next_permission += 1;
    let address = address.map(str::to_string);
    Permission {
        id: format!("perm-{}", state.next_permission),
        principal_type,
        role,
        email_address: if principal_type.uses_email() {
            address.clone()
        } else {
            None
        },
        domain: if principal_type == PrincipalType::Domain {
            address
        } else {
            None
        },
        allow_file_discovery: match principal_type {
            PrincipalType::Anyone | PrincipalType::Domain => Some(false),
            _ => None,
        },
        expiration_time: None,
    }
}

fn not_found(what: &str, id: &str) -> DriveError {
    DriveError::api(404, format!("{} not found: {}", what, id))
}

#[async_trait]
impl DriveApi for MemoryDrive {
    async fn get_item(&self, item_id: &str) -> Result<DriveItem, DriveError> {
        let state = self.enter(Method::GetItem, item_id)?;
        state
            .items
            .get(item_id)
            .cloned()
            .ok_or_else(|| not_found("File", item_id))
    }

    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ItemPage, DriveError> {
        let state = self.enter(Method::ListChildren, folder_id)?;
        if !state.items.contains_key(folder_id) {
            return Err(not_found("File", folder_id));
        }

        let start = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| DriveError::api(400, format!("invalid page token {}", token)))?,
            None => 0,
        };
        let ids = state.children.get(folder_id).cloned().unwrap_or_default();
        let end = (start + state.page_size).min(ids.len());
        let items = ids
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| state.items.get(id).cloned())
            .collect();

        Ok(ItemPage {
            items,
            next_page_token: (end < ids.len()).then(|| end.to_string()),
        })
    }

    async fn list_permissions(&self, item_id: &str) -> Result<Vec<Permission>, DriveError> {
        let state = self.enter(Method::ListPermissions, item_id)?;
        state
            .permissions
            .get(item_id)
            .cloned()
            .ok_or_else(|| not_found("File", item_id))
    }

    async fn create_permission(
        &self,
        item_id: &str,
        grant: &Grant,
    ) -> Result<Permission, DriveError> {
        let mut state = self.enter(Method::CreatePermission, item_id)?;
        if !state.items.contains_key(item_id) {
            return Err(not_found("File", item_id));
        }
        if grant.principal_type != PrincipalType::Anyone && grant.address.is_none() {
            return Err(DriveError::api(400, "missing principal address"));
        }
        let permission = new_permission(
            &mut state,
            grant.principal_type,
            grant.address.as_deref(),
            grant.role,
        );
        state
            .permissions
            .entry(item_id.to_string())
            .or_default()
            .push(permission.clone());
        Ok(permission)
    }

    async fn update_permission(
        &self,
        item_id: &str,
        permission_id: &str,
        role: Role,
    ) -> Result<(), DriveError> {
        let mut state = self.enter(Method::UpdatePermission, item_id)?;
        let permission = state
            .permissions
            .get_mut(item_id)
            .and_then(|list| list.iter_mut().find(|p| p.id == permission_id))
            .ok_or_else(|| not_found("Permission", permission_id))?;
        permission.role = role;
        Ok(())
    }

    async fn delete_permission(
        &self,
        item_id: &str,
        permission_id: &str,
    ) -> Result<(), DriveError> {
        let mut state = self.enter(Method::DeletePermission, item_id)?;
        let list = state
            .permissions
            .get_mut(item_id)
            .ok_or_else(|| not_found("File", item_id))?;
        let before = list.len();
        list.retain(|p| p.id != permission_id);
        if list.len() == before {
            return Err(not_found("Permission", permission_id));
        }
        Ok(())
    }

    async fn set_download_restriction(
        &self,
        item_id: &str,
        restricted: bool,
    ) -> Result<(), DriveError> {
        let mut state = self.enter(Method::SetDownloadRestriction, item_id)?;
        let item = state
            .items
            .get_mut(item_id)
            .ok_or_else(|| not_found("File", item_id))?;
        item.copy_requires_writer_permission = Some(restricted);
        Ok(())
    }

    async fn whoami(&self) -> Result<String, DriveError> {
        let state = self.enter(Method::Whoami, "")?;
        Ok(state.account.clone())
    }
}
