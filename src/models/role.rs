// Role and permission models
// Roles carry a many-to-many permission set through role_permissions

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::permissions::{DEFAULT_PERMISSIONS, DEFAULT_ROLES};
use crate::schema::{permissions, role_permissions, roles};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = roles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub is_system: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = roles)]
pub struct NewRole {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_system: bool,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = roles)]
pub struct RoleUpdate {
    pub display_name: Option<String>,
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = permissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub category: String,
    pub is_active: bool,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = permissions)]
pub struct NewPermission {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub category: String,
    pub is_system: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = role_permissions)]
pub struct NewRolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
}

#[derive(thiserror::Error, Debug)]
pub enum RoleError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Role not found")]
    NotFound,

    #[error("System roles cannot be deleted")]
    SystemRole,
}

impl Role {
    pub async fn find_by_id(conn: &mut AsyncPgConnection, role_id: Uuid) -> Result<Self, RoleError> {
        roles::table
            .filter(roles::id.eq(role_id))
            .first::<Role>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => RoleError::NotFound,
                _ => RoleError::Database(e),
            })
    }

    pub async fn find_by_name(
        conn: &mut AsyncPgConnection,
        role_name: &str,
    ) -> Result<Option<Self>, RoleError> {
        roles::table
            .filter(roles::name.eq(role_name))
            .first::<Role>(conn)
            .await
            .optional()
            .map_err(RoleError::Database)
    }

    pub async fn list(
        conn: &mut AsyncPgConnection,
        include_deleted: bool,
    ) -> Result<Vec<Self>, RoleError> {
        let query = roles::table.order(roles::created_at.asc());
        let result = if include_deleted {
            query.load::<Role>(conn).await
        } else {
            query
                .filter(roles::deleted_at.is_null())
                .load::<Role>(conn)
                .await
        };
        result.map_err(RoleError::Database)
    }

    pub async fn create(conn: &mut AsyncPgConnection, new_role: NewRole) -> Result<Self, RoleError> {
        diesel::insert_into(roles::table)
            .values(&new_role)
            .get_result::<Role>(conn)
            .await
            .map_err(RoleError::Database)
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        role_id: Uuid,
        mut update: RoleUpdate,
    ) -> Result<Self, RoleError> {
        update.updated_at = Some(Utc::now());
        diesel::update(roles::table.filter(roles::id.eq(role_id)))
            .set(&update)
            .get_result::<Role>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => RoleError::NotFound,
                _ => RoleError::Database(e),
            })
    }

    /// Soft delete. System roles are refused.
    pub async fn soft_delete(
        conn: &mut AsyncPgConnection,
        role_id: Uuid,
    ) -> Result<Self, RoleError> {
        let role = Self::find_by_id(conn, role_id).await?;
        if role.is_system {
            return Err(RoleError::SystemRole);
        }
        Self::update(
            conn,
            role_id,
            RoleUpdate {
                is_active: Some(false),
                deleted_at: Some(Some(Utc::now())),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn restore(conn: &mut AsyncPgConnection, role_id: Uuid) -> Result<Self, RoleError> {
        Self::update(
            conn,
            role_id,
            RoleUpdate {
                is_active: Some(true),
                deleted_at: Some(None),
                ..Default::default()
            },
        )
        .await
    }

    /// Active permissions attached to this role
    pub async fn permissions(
        &self,
        conn: &mut AsyncPgConnection,
    ) -> Result<Vec<Permission>, RoleError> {
        role_permissions::table
            .inner_join(permissions::table)
            .filter(role_permissions::role_id.eq(self.id))
            .filter(permissions::is_active.eq(true))
            .select(Permission::as_select())
            .load::<Permission>(conn)
            .await
            .map_err(RoleError::Database)
    }

    /// Replace the role's permission set in one transaction
    pub async fn set_permissions(
        conn: &mut AsyncPgConnection,
        role_id: Uuid,
        permission_ids: Vec<Uuid>,
    ) -> Result<(), RoleError> {
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                diesel::delete(
                    role_permissions::table.filter(role_permissions::role_id.eq(role_id)),
                )
                .execute(conn)
                .await?;

                let rows: Vec<NewRolePermission> = permission_ids
                    .into_iter()
                    .map(|permission_id| NewRolePermission {
                        role_id,
                        permission_id,
                    })
                    .collect();

                if !rows.is_empty() {
                    diesel::insert_into(role_permissions::table)
                        .values(&rows)
                        .execute(conn)
                        .await?;
                }

                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(RoleError::Database)
    }
}

impl Permission {
    pub async fn list_active(conn: &mut AsyncPgConnection) -> Result<Vec<Self>, RoleError> {
        permissions::table
            .filter(permissions::is_active.eq(true))
            .order((permissions::category.asc(), permissions::name.asc()))
            .load::<Permission>(conn)
            .await
            .map_err(RoleError::Database)
    }

    pub async fn find_by_name(
        conn: &mut AsyncPgConnection,
        permission_name: &str,
    ) -> Result<Option<Self>, RoleError> {
        permissions::table
            .filter(permissions::name.eq(permission_name))
            .first::<Permission>(conn)
            .await
            .optional()
            .map_err(RoleError::Database)
    }

    pub async fn find_by_names(
        conn: &mut AsyncPgConnection,
        names: &[String],
    ) -> Result<Vec<Self>, RoleError> {
        permissions::table
            .filter(permissions::name.eq_any(names))
            .load::<Permission>(conn)
            .await
            .map_err(RoleError::Database)
    }
}

/// Seed the default permission catalog and system roles.
/// Idempotent: existing rows are left untouched.
pub async fn seed_default_roles_and_permissions(
    conn: &mut AsyncPgConnection,
) -> Result<(), RoleError> {
    for (name, display_name, category, description) in DEFAULT_PERMISSIONS {
        let existing = Permission::find_by_name(conn, name).await?;
        if existing.is_none() {
            diesel::insert_into(permissions::table)
                .values(&NewPermission {
                    name: name.to_string(),
                    display_name: display_name.to_string(),
                    description: Some(description.to_string()),
                    category: category.to_string(),
                    is_system: true,
                })
                .execute(conn)
                .await
                .map_err(RoleError::Database)?;
        }
    }

    for (name, display_name, description, perm_names) in DEFAULT_ROLES {
        if Role::find_by_name(conn, name).await?.is_some() {
            continue;
        }

        let role = Role::create(
            conn,
            NewRole {
                name: name.to_string(),
                display_name: display_name.to_string(),
                description: Some(description.to_string()),
                is_system: true,
            },
        )
        .await?;

        // An empty permission list means "grant everything"
        let permission_ids: Vec<Uuid> = if perm_names.is_empty() {
            permissions::table
                .select(permissions::id)
                .load::<Uuid>(conn)
                .await
                .map_err(RoleError::Database)?
        } else {
            let names: Vec<String> = perm_names.iter().map(|s| s.to_string()).collect();
            Permission::find_by_names(conn, &names)
                .await?
                .into_iter()
                .map(|p| p.id)
                .collect()
        };

        Role::set_permissions(conn, role.id, permission_ids).await?;
    }

    Ok(())
}

/// Role response with an optional expanded permission list
#[derive(Debug, Clone, Serialize)]
pub struct RoleResponse {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub is_system: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<Permission>>,
}

impl From<&Role> for RoleResponse {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id,
            name: role.name.clone(),
            display_name: role.display_name.clone(),
            description: role.description.clone(),
            is_active: role.is_active,
            is_system: role.is_system,
            deleted_at: role.deleted_at,
            created_at: role.created_at,
            updated_at: role.updated_at,
            permissions: None,
        }
    }
}

impl RoleResponse {
    pub fn with_permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = Some(permissions);
        self
    }
}
