// User database model
// Lookup, creation, soft delete and permission resolution

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{permissions, role_permissions, roles, users};

/// User database model - queryable from database
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub role_id: Option<Uuid>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub is_admin: bool,
    pub role_id: Option<Uuid>,
}

/// User update struct
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<Option<String>>,
    pub department: Option<Option<String>>,
    pub position: Option<Option<String>>,
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
    pub role_id: Option<Option<Uuid>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Errors for user operations
#[derive(thiserror::Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("User not found")]
    NotFound,
}

impl User {
    /// Find user by ID, including soft-deleted rows
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        users::table
            .filter(users::id.eq(user_id))
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Find an active, non-deleted user by ID
    pub async fn find_active_by_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        users::table
            .filter(users::id.eq(user_id))
            .filter(users::is_active.eq(true))
            .filter(users::deleted_at.is_null())
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Find a user by username or email, for login
    pub async fn find_by_username_or_email(
        conn: &mut AsyncPgConnection,
        identifier: &str,
    ) -> Result<Option<Self>, UserError> {
        users::table
            .filter(
                users::username
                    .eq(identifier)
                    .or(users::email.eq(identifier)),
            )
            .first::<User>(conn)
            .await
            .optional()
            .map_err(UserError::Database)
    }

    /// Check whether a username or email is already taken
    pub async fn exists_by_username_or_email(
        conn: &mut AsyncPgConnection,
        username: &str,
        email: &str,
    ) -> Result<bool, UserError> {
        let count: i64 = users::table
            .filter(users::username.eq(username).or(users::email.eq(email)))
            .count()
            .get_result(conn)
            .await
            .map_err(UserError::Database)?;
        Ok(count > 0)
    }

    /// Total number of users ever registered (including deleted)
    pub async fn count_all(conn: &mut AsyncPgConnection) -> Result<i64, UserError> {
        users::table
            .count()
            .get_result(conn)
            .await
            .map_err(UserError::Database)
    }

    /// Create a new user
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_user: NewUser,
    ) -> Result<Self, UserError> {
        diesel::insert_into(users::table)
            .values(&new_user)
            .get_result::<User>(conn)
            .await
            .map_err(UserError::Database)
    }

    /// Update a user
    pub async fn update(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        mut update: UserUpdate,
    ) -> Result<Self, UserError> {
        update.updated_at = Some(Utc::now());
        diesel::update(users::table.filter(users::id.eq(user_id)))
            .set(&update)
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Soft delete: mark inactive and stamp deleted_at
    pub async fn soft_delete(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        Self::update(
            conn,
            user_id,
            UserUpdate {
                is_active: Some(false),
                deleted_at: Some(Some(Utc::now())),
                ..Default::default()
            },
        )
        .await
    }

    /// Restore a soft-deleted user
    pub async fn restore(conn: &mut AsyncPgConnection, user_id: Uuid) -> Result<Self, UserError> {
        Self::update(
            conn,
            user_id,
            UserUpdate {
                is_active: Some(true),
                deleted_at: Some(None),
                ..Default::default()
            },
        )
        .await
    }

    /// Record a successful login
    pub async fn touch_last_login(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<(), UserError> {
        diesel::update(users::table.filter(users::id.eq(user_id)))
            .set(users::last_login_at.eq(Utc::now()))
            .execute(conn)
            .await
            .map_err(UserError::Database)?;
        Ok(())
    }

    /// List users; soft-deleted rows excluded unless requested
    pub async fn list(
        conn: &mut AsyncPgConnection,
        include_deleted: bool,
    ) -> Result<Vec<Self>, UserError> {
        let query = users::table.order(users::created_at.desc());
        let result = if include_deleted {
            query.load::<User>(conn).await
        } else {
            query
                .filter(users::deleted_at.is_null())
                .load::<User>(conn)
                .await
        };
        result.map_err(UserError::Database)
    }

    /// List active, non-deleted users
    pub async fn list_active(conn: &mut AsyncPgConnection) -> Result<Vec<Self>, UserError> {
        users::table
            .filter(users::is_active.eq(true))
            .filter(users::deleted_at.is_null())
            .order(users::created_at.asc())
            .load::<User>(conn)
            .await
            .map_err(UserError::Database)
    }

    /// Resolve the permission names this user holds.
    /// Admins hold every active permission; everyone else gets the active
    /// permissions of their active role.
    pub async fn resolve_permissions(
        &self,
        conn: &mut AsyncPgConnection,
    ) -> Result<Vec<String>, UserError> {
        if self.is_admin {
            return permissions::table
                .filter(permissions::is_active.eq(true))
                .select(permissions::name)
                .load::<String>(conn)
                .await
                .map_err(UserError::Database);
        }

        let role_id = match self.role_id {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };

        let role_active: i64 = roles::table
            .filter(roles::id.eq(role_id))
            .filter(roles::is_active.eq(true))
            .filter(roles::deleted_at.is_null())
            .count()
            .get_result(conn)
            .await
            .map_err(UserError::Database)?;

        if role_active == 0 {
            return Ok(Vec::new());
        }

        role_permissions::table
            .inner_join(permissions::table)
            .filter(role_permissions::role_id.eq(role_id))
            .filter(permissions::is_active.eq(true))
            .select(permissions::name)
            .load::<String>(conn)
            .await
            .map_err(UserError::Database)
    }
}

/// User response for the API (no password hash)
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub role_id: Option<Uuid>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            phone: user.phone.clone(),
            department: user.department.clone(),
            position: user.position.clone(),
            is_admin: user.is_admin,
            is_active: user.is_active,
            role_id: user.role_id,
            last_login_at: user.last_login_at,
            deleted_at: user.deleted_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
            permissions: None,
        }
    }
}

impl UserResponse {
    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = Some(permissions);
        self
    }
}
