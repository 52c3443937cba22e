// Link business logic
// Creation with code generation, CRUD with soft delete, and the redirect
// path where the click counter increment and the click log insert share
// one transaction.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::{info, instrument};
use url::Url;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    db::DieselPool,
    models::{
        click_log::NewClickLog,
        link::{CreateLinkRequest, Link, LinkResponse, NewLink, UpdateLink, UpdateLinkRequest},
    },
    services::short_code::{ShortCodeError, ShortCodeGenerator},
    utils::service_error::ServiceError,
};
use crate::schema::links;

pub struct LinkService {
    pool: DieselPool,
    short_code_generator: ShortCodeGenerator,
    base_url: String,
}

impl LinkService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.diesel_pool.clone(),
            short_code_generator: ShortCodeGenerator::default(),
            base_url: state.config.base_url.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn conn(&self) -> Result<crate::db::PooledConn<'_>, ServiceError> {
        self.pool
            .get()
            .await
            .map_err(|e| ServiceError::DatabaseError(e.to_string()))
    }

    /// Create a new short link for a user
    #[instrument(skip(self, request))]
    pub async fn create_link(
        &self,
        user_id: Uuid,
        mut request: CreateLinkRequest,
    ) -> Result<LinkResponse, ServiceError> {
        request.sanitize();
        request.validate()?;

        // Bare hostnames are accepted; default them to https before validating
        let normalized_url = normalize_url(&request.url)?;

        if let Some(expires_at) = request.expires_at {
            if expires_at <= Utc::now() {
                return Err(ServiceError::ValidationError(
                    "Expiration date must be in the future".to_string(),
                ));
            }
        }

        let mut conn = self.conn().await?;

        let short_code = match request.custom_alias {
            Some(ref alias) => {
                ShortCodeGenerator::validate_custom_alias(&mut conn, alias)
                    .await
                    .map_err(map_short_code_error)?;
                alias.clone()
            },
            None => self
                .short_code_generator
                .generate_unique_code(&mut conn)
                .await
                .map_err(map_short_code_error)?,
        };

        let new_link = NewLink {
            original_url: normalized_url,
            short_code: short_code.clone(),
            custom_alias: request.custom_alias.clone(),
            title: request.title.clone(),
            description: request.description.clone(),
            expires_at: request.expires_at,
            user_id: Some(user_id),
        };

        let link = diesel::insert_into(links::table)
            .values(&new_link)
            .get_result::<Link>(&mut conn)
            .await?;

        info!("Created link {} -> {}", short_code, link.original_url);

        Ok(link.to_response(&self.base_url))
    }

    /// Fetch a link by ID, including soft-deleted rows
    pub async fn get_link(&self, link_id: Uuid) -> Result<Link, ServiceError> {
        let mut conn = self.conn().await?;
        Link::find_by_id(&mut conn, link_id)
            .await?
            .ok_or(ServiceError::NotFound)
    }

    /// Fetch a link by its short code without redirecting
    pub async fn get_link_by_code(&self, code: &str) -> Result<Option<Link>, ServiceError> {
        let mut conn = self.conn().await?;
        Ok(Link::find_active_by_code(&mut conn, code).await?)
    }

    /// Apply an update request to a link
    pub async fn update_link(
        &self,
        link_id: Uuid,
        request: UpdateLinkRequest,
    ) -> Result<LinkResponse, ServiceError> {
        request.validate()?;

        let url = match request.url {
            Some(ref raw) => Some(normalize_url(raw)?),
            None => None,
        };

        let update = UpdateLink {
            original_url: url,
            title: request.title.map(Some),
            description: request.description.map(Some),
            expires_at: request.expires_at,
            is_active: request.is_active,
            deleted_at: None,
            updated_at: Some(Utc::now()),
        };

        let mut conn = self.conn().await?;
        let link = diesel::update(links::table.filter(links::id.eq(link_id)))
            .set(&update)
            .get_result::<Link>(&mut conn)
            .await?;

        Ok(link.to_response(&self.base_url))
    }

    /// Soft delete: stamp deleted_at and deactivate
    pub async fn soft_delete_link(&self, link_id: Uuid) -> Result<(), ServiceError> {
        let mut conn = self.conn().await?;
        diesel::update(links::table.filter(links::id.eq(link_id)))
            .set((
                links::deleted_at.eq(Some(Utc::now())),
                links::is_active.eq(false),
                links::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Restore a soft-deleted link
    pub async fn restore_link(&self, link_id: Uuid) -> Result<LinkResponse, ServiceError> {
        let mut conn = self.conn().await?;

        let link = Link::find_by_id(&mut conn, link_id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        if link.deleted_at.is_none() {
            return Err(ServiceError::ValidationError(
                "Link is not deleted".to_string(),
            ));
        }

        let link = diesel::update(links::table.filter(links::id.eq(link_id)))
            .set((
                links::deleted_at.eq(None::<chrono::DateTime<Utc>>),
                links::is_active.eq(true),
                links::updated_at.eq(Utc::now()),
            ))
            .get_result::<Link>(&mut conn)
            .await?;

        Ok(link.to_response(&self.base_url))
    }

    /// List links for one user; soft-deleted rows excluded unless requested
    pub async fn list_user_links(
        &self,
        user_id: Uuid,
        include_deleted: bool,
    ) -> Result<Vec<LinkResponse>, ServiceError> {
        let mut conn = self.conn().await?;

        let query = links::table
            .filter(links::user_id.eq(user_id))
            .order(links::created_at.desc());

        let rows = if include_deleted {
            query.load::<Link>(&mut conn).await?
        } else {
            query
                .filter(links::deleted_at.is_null())
                .load::<Link>(&mut conn)
                .await?
        };

        Ok(rows
            .iter()
            .map(|link| link.to_response(&self.base_url))
            .collect())
    }

    /// List every link; soft-deleted rows excluded unless requested
    pub async fn list_all_links(
        &self,
        include_deleted: bool,
    ) -> Result<Vec<LinkResponse>, ServiceError> {
        let mut conn = self.conn().await?;

        let query = links::table.order(links::created_at.desc());
        let rows = if include_deleted {
            query.load::<Link>(&mut conn).await?
        } else {
            query
                .filter(links::deleted_at.is_null())
                .load::<Link>(&mut conn)
                .await?
        };

        Ok(rows
            .iter()
            .map(|link| link.to_response(&self.base_url))
            .collect())
    }

    /// Resolve a short code for redirecting. The click counter increment and
    /// the click log insert commit together or not at all.
    #[instrument(skip(self, ip_address, user_agent, referrer))]
    pub async fn process_redirect(
        &self,
        short_code: &str,
        ip_address: Option<String>,
        user_agent: Option<&str>,
        referrer: Option<String>,
    ) -> Result<String, ServiceError> {
        let mut conn = self.conn().await?;

        let link = Link::find_active_by_code(&mut conn, short_code)
            .await?
            .ok_or(ServiceError::NotFound)?;

        if link.is_expired() {
            return Err(ServiceError::Expired);
        }

        let link_id = link.id;
        let click_log = NewClickLog::new(link_id, ip_address, user_agent, referrer);

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                diesel::update(links::table.filter(links::id.eq(link_id)))
                    .set((
                        links::click_count.eq(links::click_count + 1),
                        links::last_accessed_at.eq(Some(Utc::now())),
                    ))
                    .execute(conn)
                    .await?;

                click_log.insert(conn).await?;

                Ok(())
            }
            .scope_boxed()
        })
        .await?;

        Ok(link.original_url)
    }
}

/// Prepend https:// when no scheme is present, then validate
fn normalize_url(raw: &str) -> Result<String, ServiceError> {
    let candidate = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };

    let parsed = Url::parse(&candidate)
        .map_err(|_| ServiceError::ValidationError("Invalid URL".to_string()))?;

    if parsed.host_str().is_none() {
        return Err(ServiceError::ValidationError("Invalid URL".to_string()));
    }

    Ok(candidate)
}

fn map_short_code_error(error: ShortCodeError) -> ServiceError {
    match error {
        ShortCodeError::DatabaseError(e) => ServiceError::DatabaseError(e.to_string()),
        ShortCodeError::Exhausted(_) => ServiceError::InternalError,
        ShortCodeError::InvalidCustomAlias(reason) => ServiceError::ValidationError(reason),
        ShortCodeError::AliasAlreadyExists => ServiceError::AliasAlreadyExists,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_defaults_scheme() {
        assert_eq!(
            normalize_url("example.com/page").unwrap(),
            "https://example.com/page"
        );
        assert_eq!(
            normalize_url("http://example.com").unwrap(),
            "http://example.com"
        );
        assert_eq!(
            normalize_url("https://example.com").unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn test_normalize_url_rejects_garbage() {
        assert!(normalize_url("ht tp://bad url").is_err());
        assert!(normalize_url("").is_err());
    }
}
