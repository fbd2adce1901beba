use async_trait::async_trait;
use google_drive3 as drive3;

use drive3::api::{File, Scope};
use drive3::hyper::client::HttpConnector;
use drive3::hyper_rustls::HttpsConnector;
use drive3::DriveHub;
use serde::Serialize;

use super::{DriveApi, DriveError, DriveItem, Grant, ItemPage, Permission, PrincipalType};
use crate::role::Role;

pub type Connector = HttpsConnector<HttpConnector>;

const ITEM_FIELDS: &str =
    "id,name,mimeType,parents,owners(emailAddress),webViewLink,copyRequiresWriterPermission";
const PERMISSION_FIELDS: &str =
    "id,type,emailAddress,domain,role,allowFileDiscovery,expirationTime";
const PAGE_SIZE: i32 = 1000;

/// [`DriveApi`] backed by the generated Drive v3 client.
pub struct HubDrive {
    hub: DriveHub<Connector>,
}

impl HubDrive {
    pub fn new(hub: DriveHub<Connector>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl DriveApi for HubDrive {
    async fn get_item(&self, item_id: &str) -> Result<DriveItem, DriveError> {
        let (_, file) = self
            .hub
            .files()
            .get(item_id)
            .supports_all_drives(true)
            .param("fields", ITEM_FIELDS)
            .add_scope(Scope::Full)
            .doit()
            .await?;
        convert_file(file)
    }

    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ItemPage, DriveError> {
        let query = format!("'{}' in parents and trashed=false", folder_id);
        let fields = format!("nextPageToken, files({})", ITEM_FIELDS);
        let mut call = self
            .hub
            .files()
            .list()
            .q(&query)
            .page_size(PAGE_SIZE)
            .supports_all_drives(true)
            .include_items_from_all_drives(true)
            .param("fields", fields.as_str())
            .add_scope(Scope::Full);
        if let Some(token) = page_token {
            call = call.page_token(token);
        }

        let (_, list) = call.doit().await?;
        let items = list
            .files
            .unwrap_or_default()
            .into_iter()
            .map(convert_file)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ItemPage {
            items,
            next_page_token: list.next_page_token,
        })
    }

    async fn list_permissions(&self, item_id: &str) -> Result<Vec<Permission>, DriveError> {
        let fields = format!("nextPageToken, permissions({})", PERMISSION_FIELDS);
        let mut permissions = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut call = self
                .hub
                .permissions()
                .list(item_id)
                .supports_all_drives(true)
                .param("fields", fields.as_str())
                .add_scope(Scope::Full);
            if let Some(token) = &page_token {
                call = call.page_token(token);
            }

            let (_, list) = call.doit().await?;
            permissions.extend(
                list.permissions
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|p| convert_permission(item_id, p)),
            );

            page_token = list.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(permissions)
    }

    async fn create_permission(
        &self,
        item_id: &str,
        grant: &Grant,
    ) -> Result<Permission, DriveError> {
        let mut request = drive3::api::Permission {
            type_: Some(grant.principal_type.as_str().to_string()),
            role: Some(grant.role.api_name().to_string()),
            ..Default::default()
        };
        if grant.principal_type.uses_email() {
            request.email_address = grant.address.clone();
        } else if grant.principal_type == PrincipalType::Domain {
            request.domain = grant.address.clone();
        }

        let (_, created) = self
            .hub
            .permissions()
            .create(request, item_id)
            .send_notification_email(false)
            .supports_all_drives(true)
            .param("fields", PERMISSION_FIELDS)
            .add_scope(Scope::Full)
            .doit()
            .await?;
        convert_permission(item_id, created).ok_or_else(|| {
            DriveError::Invalid(format!("unreadable permission created on {}", item_id))
        })
    }

    async fn update_permission(
        &self,
        item_id: &str,
        permission_id: &str,
        role: Role,
    ) -> Result<(), DriveError> {
        let request = drive3::api::Permission {
            role: Some(role.api_name().to_string()),
            ..Default::default()
        };
        self.hub
            .permissions()
            .update(request, item_id, permission_id)
            .transfer_ownership(role == Role::Owner)
            .supports_all_drives(true)
            .add_scope(Scope::Full)
            .doit()
            .await?;
        Ok(())
    }

    async fn delete_permission(
        &self,
        item_id: &str,
        permission_id: &str,
    ) -> Result<(), DriveError> {
        self.hub
            .permissions()
            .delete(item_id, permission_id)
            .supports_all_drives(true)
            .add_scope(Scope::Full)
            .doit()
            .await?;
        Ok(())
    }

    async fn set_download_restriction(
        &self,
        item_id: &str,
        restricted: bool,
    ) -> Result<(), DriveError> {
        let request = File {
            copy_requires_writer_permission: Some(restricted),
            ..Default::default()
        };
        self.hub
            .files()
            .update(request, item_id)
            .supports_all_drives(true)
            .add_scope(Scope::Full)
            .doit_without_upload()
            .await?;
        Ok(())
    }

    async fn whoami(&self) -> Result<String, DriveError> {
        let (_, about) = self
            .hub
            .about()
            .get()
            .param("fields", "user")
            .add_scope(Scope::Full)
            .doit()
            .await?;
        about
            .user
            .and_then(|u| u.email_address)
            .ok_or_else(|| DriveError::Invalid("about.get returned no user email".into()))
    }
}

fn convert_file(file: File) -> Result<DriveItem, DriveError> {
    let id = file
        .id
        .ok_or_else(|| DriveError::Invalid("file without an id".into()))?;
    Ok(DriveItem {
        name: file.name.unwrap_or_else(|| "Untitled".to_string()),
        mime_type: file.mime_type.unwrap_or_default(),
        parents: file.parents.unwrap_or_default(),
        owner: file
            .owners
            .and_then(|owners| owners.into_iter().next())
            .and_then(|owner| owner.email_address),
        web_view_link: file.web_view_link,
        copy_requires_writer_permission: file.copy_requires_writer_permission,
        id,
    })
}

/// Permissions with a type or role this tool does not know are dropped with a
/// warning rather than failing the whole listing.
fn convert_permission(item_id: &str, p: drive3::api::Permission) -> Option<Permission> {
    let id = p.id?;
    let principal_type = match p.type_.as_deref().unwrap_or_default().parse() {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!("skipping permission {} on {}: {}", id, item_id, e);
            return None;
        }
    };
    let role = match p.role.as_deref().and_then(Role::from_api) {
        Some(role) => role,
        None => {
            tracing::warn!(
                "skipping permission {} on {}: unknown role {:?}",
                id,
                item_id,
                p.role
            );
            return None;
        }
    };
    Some(Permission {
        id,
        principal_type,
        role,
        email_address: p.email_address,
        domain: p.domain,
        allow_file_discovery: p.allow_file_discovery,
        expiration_time: wire_string(&p.expiration_time),
    })
}

/// Render a field the way it travels on the wire, e.g. an RFC 3339 timestamp.
fn wire_string<T: Serialize>(value: &Option<T>) -> Option<String> {
    let value = value.as_ref()?;
    match serde_json::to_value(value).ok()? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
