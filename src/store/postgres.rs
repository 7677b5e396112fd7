use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{FavoriteStore, NotificationStore, PropertyStore, StoreResult, UserStore};
use crate::domain::{
    Address, ListingStatus, NewUser, Notification, Property, PropertyFilter, RecoveryToken,
    SessionRecord, User,
};
use crate::error::{AppError, DatabaseError};

const USER_COLUMNS: &str = r#"
    id, email, password_hash, first_name, last_name, role,
    session_id, refresh_token_hash, refresh_token_expires_at,
    reset_token_hash, reset_token_expires_at,
    verify_token_hash, verify_token_expires_at,
    email_verified_at, must_change_password, created_by_admin,
    created_at, updated_at
"#;

const PROPERTY_COLUMNS: &str = r#"
    id, agent_id, title, description, price, currency, listing_type, property_type,
    bedrooms, bathrooms, area_sqm,
    address_line1, address_line2, city, state, postal_code, country,
    images, status, approved_by, approved_at, rejection_reason,
    created_at, updated_at
"#;

/// PostgreSQL implementation of every store trait
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending migrations from `./migrations`.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn find_user_where(&self, column: &str, value: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, column);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }
}

fn corrupt(what: String) -> AppError {
    AppError::Database(DatabaseError::QueryExecution(format!("corrupt row: {}", what)))
}

fn recovery(hash: Option<String>, expires_at: Option<DateTime<Utc>>) -> Option<RecoveryToken> {
    match (hash, expires_at) {
        (Some(token_hash), Some(expires_at)) => Some(RecoveryToken {
            token_hash,
            expires_at,
        }),
        _ => None,
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    role: String,
    session_id: Option<Uuid>,
    refresh_token_hash: Option<String>,
    refresh_token_expires_at: Option<DateTime<Utc>>,
    reset_token_hash: Option<String>,
    reset_token_expires_at: Option<DateTime<Utc>>,
    verify_token_hash: Option<String>,
    verify_token_expires_at: Option<DateTime<Utc>>,
    email_verified_at: Option<DateTime<Utc>>,
    must_change_password: bool,
    created_by_admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let session = match (row.session_id, row.refresh_token_hash) {
            (Some(session_id), Some(token_hash)) => Some(SessionRecord {
                session_id,
                token_hash,
                expires_at: row.refresh_token_expires_at,
            }),
            _ => None,
        };

        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            role: row.role.parse().map_err(corrupt)?,
            session,
            reset_token: recovery(row.reset_token_hash, row.reset_token_expires_at),
            verify_token: recovery(row.verify_token_hash, row.verify_token_expires_at),
            email_verified_at: row.email_verified_at,
            must_change_password: row.must_change_password,
            created_by_admin: row.created_by_admin,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PropertyRow {
    id: Uuid,
    agent_id: Uuid,
    title: String,
    description: Option<String>,
    price: f64,
    currency: String,
    listing_type: String,
    property_type: Option<String>,
    bedrooms: Option<i32>,
    bathrooms: Option<i32>,
    area_sqm: Option<f64>,
    address_line1: String,
    address_line2: Option<String>,
    city: String,
    state: Option<String>,
    postal_code: Option<String>,
    country: String,
    images: Vec<String>,
    status: String,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PropertyRow> for Property {
    type Error = AppError;

    fn try_from(row: PropertyRow) -> Result<Self, Self::Error> {
        Ok(Property {
            id: row.id,
            agent_id: row.agent_id,
            title: row.title,
            description: row.description,
            price: row.price,
            currency: row.currency,
            listing_type: row.listing_type.parse().map_err(corrupt)?,
            property_type: row.property_type,
            bedrooms: row.bedrooms,
            bathrooms: row.bathrooms,
            area_sqm: row.area_sqm,
            address: Address {
                line1: row.address_line1,
                line2: row.address_line2,
                city: row.city,
                state: row.state,
                postal_code: row.postal_code,
                country: row.country,
            },
            images: row.images,
            status: row.status.parse().map_err(corrupt)?,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_properties(rows: Vec<PropertyRow>) -> StoreResult<Vec<Property>> {
    rows.into_iter().map(Property::try_from).collect()
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let now = Utc::now();
        let (verify_hash, verify_expires) = match &user.verify_token {
            Some(t) => (Some(t.token_hash.clone()), Some(t.expires_at)),
            None => (None, None),
        };

        let sql = format!(
            r#"
            INSERT INTO users (
                id, email, password_hash, first_name, last_name, role,
                verify_token_hash, verify_token_expires_at,
                must_change_password, created_by_admin, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let result = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.role.as_str())
            .bind(verify_hash)
            .bind(verify_expires)
            .bind(user.must_change_password)
            .bind(user.created_by_admin)
            .bind(now)
            .fetch_one(&self.pool)
            .await;

        match result.map_err(AppError::from) {
            Ok(row) => User::try_from(row),
            Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_))) => {
                Err(AppError::Conflict("Email already registered".to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE lower(email) = lower($1)", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_refresh_hash(&self, token_hash: &str) -> StoreResult<Option<User>> {
        self.find_user_where("refresh_token_hash", token_hash).await
    }

    async fn find_by_reset_hash(&self, token_hash: &str) -> StoreResult<Option<User>> {
        self.find_user_where("reset_token_hash", token_hash).await
    }

    async fn find_by_verify_hash(&self, token_hash: &str) -> StoreResult<Option<User>> {
        self.find_user_where("verify_token_hash", token_hash).await
    }

    async fn set_session(&self, user_id: Uuid, session: SessionRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET session_id = $1, refresh_token_hash = $2, refresh_token_expires_at = $3,
                updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(session.session_id)
        .bind(&session.token_hash)
        .bind(session.expires_at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn rotate_session(
        &self,
        user_id: Uuid,
        expected_hash: &str,
        session: SessionRecord,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET session_id = $1, refresh_token_hash = $2, refresh_token_expires_at = $3,
                updated_at = NOW()
            WHERE id = $4 AND refresh_token_hash = $5
            "#,
        )
        .bind(session.session_id)
        .bind(&session.token_hash)
        .bind(session.expires_at)
        .bind(user_id)
        .bind(expected_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn clear_session_by_hash(&self, token_hash: &str) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET session_id = NULL, refresh_token_hash = NULL, refresh_token_expires_at = NULL,
                updated_at = NOW()
            WHERE refresh_token_hash = $1
            "#,
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn set_reset_token(&self, user_id: Uuid, token: RecoveryToken) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = $1, reset_token_expires_at = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_password_reset(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1,
                reset_token_hash = NULL, reset_token_expires_at = NULL,
                must_change_password = FALSE,
                session_id = NULL, refresh_token_hash = NULL, refresh_token_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(password_hash)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET email_verified_at = $1, verify_token_hash = NULL, verify_token_expires_at = NULL,
                updated_at = $1
            WHERE id = $2
            "#,
        )
        .bind(at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PropertyStore for PgStore {
    async fn insert_property(&self, p: &Property) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO properties (
                id, agent_id, title, description, price, currency, listing_type, property_type,
                bedrooms, bathrooms, area_sqm,
                address_line1, address_line2, city, state, postal_code, country,
                images, status, approved_by, approved_at, rejection_reason,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22, $23, $24)
            "#,
        )
        .bind(p.id)
        .bind(p.agent_id)
        .bind(&p.title)
        .bind(&p.description)
        .bind(p.price)
        .bind(&p.currency)
        .bind(p.listing_type.as_str())
        .bind(&p.property_type)
        .bind(p.bedrooms)
        .bind(p.bathrooms)
        .bind(p.area_sqm)
        .bind(&p.address.line1)
        .bind(&p.address.line2)
        .bind(&p.address.city)
        .bind(&p.address.state)
        .bind(&p.address.postal_code)
        .bind(&p.address.country)
        .bind(&p.images)
        .bind(p.status.as_str())
        .bind(p.approved_by)
        .bind(p.approved_at)
        .bind(&p.rejection_reason)
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_property(&self, id: Uuid) -> StoreResult<Option<Property>> {
        let sql = format!("SELECT {} FROM properties WHERE id = $1", PROPERTY_COLUMNS);
        sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Property::try_from)
            .transpose()
    }

    async fn list_by_status(
        &self,
        status: ListingStatus,
        filter: &PropertyFilter,
    ) -> StoreResult<Vec<Property>> {
        let trimmed = |v: &Option<String>| v.as_deref().map(|s| s.trim().to_string());

        let sql = format!(
            r#"
            SELECT {} FROM properties
            WHERE status = $1
              AND ($2::TEXT IS NULL OR lower(city) = lower($2))
              AND ($3::TEXT IS NULL OR lower(country) = lower($3))
              AND ($4::TEXT IS NULL OR lower(property_type) = lower($4))
              AND ($5::TEXT IS NULL OR listing_type = $5)
              AND ($6::DOUBLE PRECISION IS NULL OR price >= $6)
              AND ($7::DOUBLE PRECISION IS NULL OR price <= $7)
              AND NOT EXISTS (
                  SELECT 1 FROM unnest($8::TEXT[]) AS q(token)
                  WHERE NOT EXISTS (
                      SELECT 1
                      FROM regexp_split_to_table(
                          lower(title || ' ' || city || ' ' || coalesce(description, '')),
                          '[^[:alnum:]]+'
                      ) AS w(word)
                      WHERE word <> '' AND left(word, length(token)) = token
                  )
              )
            ORDER BY created_at DESC
            LIMIT $9 OFFSET $10
            "#,
            PROPERTY_COLUMNS
        );
        // OFFSET is BIGINT; past i64::MAX the page is empty anyway
        let offset = i64::try_from(filter.offset()).unwrap_or(i64::MAX);

        let rows = sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(status.as_str())
            .bind(trimmed(&filter.city))
            .bind(trimmed(&filter.country))
            .bind(trimmed(&filter.property_type))
            .bind(filter.listing_type.map(|t| t.as_str()))
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(filter.query_tokens())
            .bind(filter.limit() as i64)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        into_properties(rows)
    }

    async fn list_by_agent(&self, agent_id: Uuid) -> StoreResult<Vec<Property>> {
        let sql = format!(
            "SELECT {} FROM properties WHERE agent_id = $1 ORDER BY created_at DESC",
            PROPERTY_COLUMNS
        );
        let rows = sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(agent_id)
            .fetch_all(&self.pool)
            .await?;

        into_properties(rows)
    }

    async fn save_property(&self, p: &Property) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE properties
            SET title = $2, description = $3, price = $4, currency = $5, listing_type = $6,
                property_type = $7, bedrooms = $8, bathrooms = $9, area_sqm = $10,
                address_line1 = $11, address_line2 = $12, city = $13, state = $14,
                postal_code = $15, country = $16, images = $17,
                status = $18, approved_by = $19, approved_at = $20, rejection_reason = $21,
                updated_at = $22
            WHERE id = $1
            "#,
        )
        .bind(p.id)
        .bind(&p.title)
        .bind(&p.description)
        .bind(p.price)
        .bind(&p.currency)
        .bind(p.listing_type.as_str())
        .bind(&p.property_type)
        .bind(p.bedrooms)
        .bind(p.bathrooms)
        .bind(p.area_sqm)
        .bind(&p.address.line1)
        .bind(&p.address.line2)
        .bind(&p.address.city)
        .bind(&p.address.state)
        .bind(&p.address.postal_code)
        .bind(&p.address.country)
        .bind(&p.images)
        .bind(p.status.as_str())
        .bind(p.approved_by)
        .bind(p.approved_at)
        .bind(&p.rejection_reason)
        .bind(p.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("property"));
        }
        Ok(())
    }

    async fn delete_property(&self, id: Uuid) -> StoreResult<bool> {
        // favorites go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM properties WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl FavoriteStore for PgStore {
    async fn add_favorite(&self, user_id: Uuid, property_id: Uuid) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO favorites (user_id, property_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id, property_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(property_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_favorite(&self, user_id: Uuid, property_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND property_id = $2")
            .bind(user_id)
            .bind(property_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_favorites(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT property_id FROM favorites WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn users_favoriting(&self, property_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM favorites WHERE property_id = $1",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    property_id: Uuid,
    kind: String,
    message: String,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            property_id: row.property_id,
            kind: row.kind.parse().map_err(corrupt)?,
            message: row.message,
            read_at: row.read_at,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_notification(&self, n: &Notification) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, property_id, kind, message, read_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(n.id)
        .bind(n.user_id)
        .bind(n.property_id)
        .bind(n.kind.as_str())
        .bind(&n.message)
        .bind(n.read_at)
        .bind(n.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, property_id, kind, message, read_at, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Notification::try_from)
        .collect()
    }

    async fn mark_read(&self, user_id: Uuid, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, $1)
            WHERE id = $2 AND user_id = $3
            "#,
        )
        .bind(at)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
