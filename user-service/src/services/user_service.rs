use redis::AsyncCommands;
use serde_json::json;
use shared::auth::{JwtKeys, TokenSubject, REFRESH_TOKEN};
use shared::mailer::{EmailTemplate, Mailer};
use shared::types::{Page, PaginatedResponse, UserType};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthService;
use crate::config::Config;
use crate::models::*;

const ADMIN_PAGE_SIZE: i64 = 25;

fn verification_key(token: &str) -> String {
    format!("email_verification:{}", token)
}

/// Reverse index so that a resend can revoke the previous link.
fn verification_user_key(user_id: Uuid) -> String {
    format!("email_verification_user:{}", user_id)
}

fn password_reset_key(token: &str) -> String {
    format!("password_reset:{}", token)
}

fn session_key(user_id: Uuid) -> String {
    format!("session:{}", user_id)
}

fn db_err(e: sqlx::Error) -> UserError {
    UserError::DatabaseError(e.to_string())
}

fn redis_err(e: redis::RedisError) -> UserError {
    UserError::Internal(format!("Redis error: {}", e))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub struct UserService {
    config: Config,
    db_pool: PgPool,
    redis_conn: redis::aio::ConnectionManager,
    auth_service: AuthService,
    jwt: Arc<JwtKeys>,
    mailer: Arc<Mailer>,
}

impl UserService {
    pub fn new(
        config: Config,
        db_pool: PgPool,
        redis_conn: redis::aio::ConnectionManager,
        jwt: Arc<JwtKeys>,
        mailer: Arc<Mailer>,
    ) -> Self {
        Self {
            config,
            db_pool,
            redis_conn,
            auth_service: AuthService::new(),
            jwt,
            mailer,
        }
    }

    // ============= Registration =============

    /// Register an artist account with its profile
    pub async fn register_artist(&self, req: RegisterArtistRequest) -> UserResult<AuthResponse> {
        req.validate()?;
        ensure_passwords_match(&req.password, &req.password_confirm)?;

        let email = shared::text::normalize_email(&req.email);
        self.ensure_email_available(&email).await?;
        let password_hash = self.auth_service.hash_password(&req.password)?;

        let mut tx = self.db_pool.begin().await.map_err(db_err)?;

        let user = insert_user(
            &mut tx,
            &email,
            &password_hash,
            &req.first_name,
            &req.last_name,
            UserType::Artist,
        )
        .await?;

        sqlx::query(
            r#"
            INSERT INTO artist_profiles (id, user_id, stage_name, phone_number, whatsapp_number,
                                         bio, city, region, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(blank_to_none(req.stage_name))
        .bind(req.phone_number.trim())
        .bind(blank_to_none(req.whatsapp_number))
        .bind(blank_to_none(req.bio))
        .bind(req.city.trim())
        .bind(req.region.trim())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        info!(user_id = %user.id, "Artist account registered");

        self.send_verification_email(&user).await;
        self.issue_session(user).await
    }

    /// Register an organizer account with its profile
    pub async fn register_organizer(&self, req: RegisterOrganizerRequest) -> UserResult<AuthResponse> {
        req.validate()?;
        ensure_passwords_match(&req.password, &req.password_confirm)?;

        let email = shared::text::normalize_email(&req.email);
        self.ensure_email_available(&email).await?;
        let password_hash = self.auth_service.hash_password(&req.password)?;

        let mut tx = self.db_pool.begin().await.map_err(db_err)?;

        let user = insert_user(
            &mut tx,
            &email,
            &password_hash,
            &req.first_name,
            &req.last_name,
            UserType::Organizer,
        )
        .await?;

        sqlx::query(
            r#"
            INSERT INTO organizer_profiles (id, user_id, phone_number, whatsapp_number, organization_name,
                                            organization_type, city, region, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(req.phone_number.trim())
        .bind(blank_to_none(req.whatsapp_number))
        .bind(blank_to_none(req.organization_name))
        .bind(req.organization_type.as_str())
        .bind(req.city.trim())
        .bind(req.region.trim())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        info!(user_id = %user.id, "Organizer account registered");

        self.send_verification_email(&user).await;
        self.issue_session(user).await
    }

    async fn ensure_email_available(&self, email: &str) -> UserResult<()> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.db_pool)
                .await
                .map_err(db_err)?;

        if exists {
            return Err(UserError::AlreadyExists);
        }
        Ok(())
    }

    // ============= Authentication =============

    /// Login user
    pub async fn login(&self, req: LoginRequest) -> UserResult<AuthResponse> {
        req.validate()?;

        let user = self
            .find_by_email(&req.email)
            .await?
            .ok_or(UserError::AuthenticationError("Invalid credentials".to_string()))?;

        if !self.auth_service.verify_password(&req.password, &user.password_hash)? {
            return Err(UserError::AuthenticationError("Invalid credentials".to_string()));
        }

        if !user.is_active {
            return Err(UserError::Forbidden("Account is suspended".to_string()));
        }

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET last_login = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(user.id)
        .fetch_one(&self.db_pool)
        .await
        .map_err(db_err)?;

        info!(user_id = %user.id, "User logged in");
        self.issue_session(user).await
    }

    /// Logout user
    pub async fn logout(&self, user_id: Uuid) -> UserResult<()> {
        let mut conn = self.redis_conn.clone();
        conn.del::<_, ()>(session_key(user_id)).await.map_err(redis_err)?;
        Ok(())
    }

    /// Rotate the token pair; the presented refresh token must be the one
    /// stored for the session.
    pub async fn refresh_token(&self, refresh_token: &str) -> UserResult<AuthResponse> {
        let claims = self
            .jwt
            .validate_token(refresh_token)
            .map_err(|_| UserError::AuthenticationError("Invalid refresh token".to_string()))?;

        if claims.token_type != REFRESH_TOKEN {
            return Err(UserError::AuthenticationError("Invalid token type".to_string()));
        }

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| UserError::AuthenticationError("Invalid refresh token".to_string()))?;

        let mut conn = self.redis_conn.clone();
        let stored_token: Option<String> = conn.get(session_key(user_id)).await.map_err(redis_err)?;

        if stored_token.as_deref() != Some(refresh_token) {
            return Err(UserError::AuthenticationError("Session expired".to_string()));
        }

        let user = self.get_user_by_id(user_id).await?;
        if !user.is_active {
            return Err(UserError::Forbidden("Account is suspended".to_string()));
        }

        self.issue_session(user).await
    }

    async fn issue_session(&self, user: User) -> UserResult<AuthResponse> {
        let subject = TokenSubject {
            user_id: user.id,
            email: &user.email,
            user_type: user.kind()?,
            is_staff: user.is_staff,
        };

        let access_token = self
            .jwt
            .generate_access_token(&subject)
            .map_err(|e| UserError::Internal(e.to_string()))?;
        let refresh_token = self
            .jwt
            .generate_refresh_token(&subject)
            .map_err(|e| UserError::Internal(e.to_string()))?;

        let mut conn = self.redis_conn.clone();
        conn.set_ex::<_, _, ()>(
            session_key(user.id),
            &refresh_token,
            self.config.redis.session_ttl_seconds,
        )
        .await
        .map_err(redis_err)?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            user: user.into(),
            expires_in: self.jwt.access_token_expiry(),
        })
    }

    // ============= Email verification =============

    /// Issue a fresh verification token (revoking any previous one) and
    /// email it. Delivery failures are logged, never surfaced.
    async fn send_verification_email(&self, user: &User) {
        if let Err(e) = self.try_send_verification_email(user).await {
            warn!(user_id = %user.id, "Failed to send verification email: {}", e);
        }
    }

    async fn try_send_verification_email(&self, user: &User) -> UserResult<()> {
        let token = self.auth_service.generate_verification_token();
        let ttl = self.config.tokens.email_verification_ttl_seconds;
        let mut conn = self.redis_conn.clone();

        let previous: Option<String> = conn
            .get(verification_user_key(user.id))
            .await
            .map_err(redis_err)?;
        if let Some(previous) = previous {
            conn.del::<_, ()>(verification_key(&previous)).await.map_err(redis_err)?;
        }

        conn.set_ex::<_, _, ()>(verification_key(&token), user.id.to_string(), ttl)
            .await
            .map_err(redis_err)?;
        conn.set_ex::<_, _, ()>(verification_user_key(user.id), &token, ttl)
            .await
            .map_err(redis_err)?;

        let verification_url = format!(
            "{}/accounts/verify-email/{}/",
            self.config.public_base_url, token
        );

        self.mailer
            .send(
                EmailTemplate::EmailVerification,
                &user.email,
                &json!({
                    "name": user.full_name(),
                    "verification_url": verification_url,
                }),
            )
            .await
            .map_err(|e| UserError::Internal(e.to_string()))
    }

    /// Verify email with a single-use token
    pub async fn verify_email(&self, token: &str) -> UserResult<()> {
        let mut conn = self.redis_conn.clone();

        let stored: Option<String> = conn.get(verification_key(token)).await.map_err(redis_err)?;
        let user_id = stored
            .and_then(|id| Uuid::parse_str(&id).ok())
            .ok_or(UserError::InvalidToken)?;

        sqlx::query("UPDATE users SET email_verified = true, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.db_pool)
            .await
            .map_err(db_err)?;

        conn.del::<_, ()>(verification_key(token)).await.map_err(redis_err)?;
        conn.del::<_, ()>(verification_user_key(user_id)).await.map_err(redis_err)?;

        info!(user_id = %user_id, "Email verified");
        Ok(())
    }

    pub async fn resend_verification(&self, user_id: Uuid) -> UserResult<()> {
        let user = self.get_user_by_id(user_id).await?;

        if user.email_verified {
            return Err(UserError::ValidationError("Email is already verified".to_string()));
        }

        self.try_send_verification_email(&user).await
    }

    // ============= Passwords =============

    /// Always succeeds from the caller's point of view so that the endpoint
    /// does not reveal which emails are registered.
    pub async fn forgot_password(&self, req: ForgotPasswordRequest) -> UserResult<()> {
        req.validate()?;

        let Some(user) = self.find_by_email(&req.email).await? else {
            info!("Password reset requested for unknown email");
            return Ok(());
        };

        if !user.is_active {
            return Ok(());
        }

        let token = self.auth_service.generate_verification_token();
        let mut conn = self.redis_conn.clone();
        conn.set_ex::<_, _, ()>(
            password_reset_key(&token),
            user.id.to_string(),
            self.config.tokens.password_reset_ttl_seconds,
        )
        .await
        .map_err(redis_err)?;

        let reset_url = format!(
            "{}/accounts/reset-password/{}/",
            self.config.public_base_url, token
        );

        if let Err(e) = self
            .mailer
            .send(
                EmailTemplate::PasswordReset,
                &user.email,
                &json!({ "name": user.full_name(), "reset_url": reset_url }),
            )
            .await
        {
            warn!(user_id = %user.id, "Failed to send password reset email: {}", e);
        }

        Ok(())
    }

    pub async fn reset_password(&self, req: ResetPasswordRequest) -> UserResult<()> {
        req.validate()?;
        ensure_passwords_match(&req.new_password, &req.new_password_confirm)?;

        let mut conn = self.redis_conn.clone();
        let stored: Option<String> = conn
            .get(password_reset_key(&req.token))
            .await
            .map_err(redis_err)?;
        let user_id = stored
            .and_then(|id| Uuid::parse_str(&id).ok())
            .ok_or(UserError::InvalidToken)?;

        let new_hash = self.auth_service.hash_password(&req.new_password)?;
        self.store_password(user_id, &new_hash).await?;

        conn.del::<_, ()>(password_reset_key(&req.token)).await.map_err(redis_err)?;
        self.logout(user_id).await?;

        info!(user_id = %user_id, "Password reset");
        Ok(())
    }

    /// Change password
    pub async fn change_password(&self, user_id: Uuid, req: ChangePasswordRequest) -> UserResult<()> {
        req.validate()?;
        ensure_passwords_match(&req.new_password, &req.new_password_confirm)?;

        let user = self.get_user_by_id(user_id).await?;

        if !self.auth_service.verify_password(&req.current_password, &user.password_hash)? {
            return Err(UserError::AuthenticationError("Invalid current password".to_string()));
        }

        let new_hash = self.auth_service.hash_password(&req.new_password)?;
        self.store_password(user_id, &new_hash).await
    }

    async fn store_password(&self, user_id: Uuid, password_hash: &str) -> UserResult<()> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.db_pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // ============= Profiles =============

    pub async fn get_me(&self, user_id: Uuid) -> UserResult<ProfileResponse> {
        let user = self.get_user_by_id(user_id).await?;

        match user.kind()? {
            UserType::Artist => {
                let profile = sqlx::query_as::<_, ArtistProfile>(
                    "SELECT * FROM artist_profiles WHERE user_id = $1",
                )
                .bind(user_id)
                .fetch_optional(&self.db_pool)
                .await
                .map_err(db_err)?
                .ok_or(UserError::NotFound)?;

                Ok(ProfileResponse {
                    display_name: shared::text::display_name(
                        profile.stage_name.as_deref(),
                        &user.first_name,
                        &user.last_name,
                    ),
                    user: user.into(),
                    artist_profile: Some(profile),
                    organizer_profile: None,
                })
            }
            UserType::Organizer => {
                let profile = sqlx::query_as::<_, OrganizerProfile>(
                    "SELECT * FROM organizer_profiles WHERE user_id = $1",
                )
                .bind(user_id)
                .fetch_optional(&self.db_pool)
                .await
                .map_err(db_err)?
                .ok_or(UserError::NotFound)?;

                Ok(ProfileResponse {
                    display_name: shared::text::display_name(
                        profile.organization_name.as_deref(),
                        &user.first_name,
                        &user.last_name,
                    ),
                    user: user.into(),
                    artist_profile: None,
                    organizer_profile: Some(profile),
                })
            }
        }
    }

    pub async fn update_me(&self, user_id: Uuid, req: UpdateProfileRequest) -> UserResult<ProfileResponse> {
        req.validate()?;
        let user = self.get_user_by_id(user_id).await?;

        let mut tx = self.db_pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r#"
            UPDATE users
            SET first_name = COALESCE($1, first_name),
                last_name = COALESCE($2, last_name),
                updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(blank_to_none(req.first_name.clone()))
        .bind(blank_to_none(req.last_name.clone()))
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        match user.kind()? {
            UserType::Artist => {
                sqlx::query(
                    r#"
                    UPDATE artist_profiles
                    SET stage_name = COALESCE($1, stage_name),
                        phone_number = COALESCE($2, phone_number),
                        whatsapp_number = COALESCE($3, whatsapp_number),
                        bio = COALESCE($4, bio),
                        city = COALESCE($5, city),
                        region = COALESCE($6, region),
                        is_available = COALESCE($7, is_available),
                        updated_at = NOW()
                    WHERE user_id = $8
                    "#,
                )
                .bind(&req.stage_name)
                .bind(&req.phone_number)
                .bind(&req.whatsapp_number)
                .bind(&req.bio)
                .bind(&req.city)
                .bind(&req.region)
                .bind(req.is_available)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }
            UserType::Organizer => {
                sqlx::query(
                    r#"
                    UPDATE organizer_profiles
                    SET organization_name = COALESCE($1, organization_name),
                        organization_type = COALESCE($2, organization_type),
                        phone_number = COALESCE($3, phone_number),
                        whatsapp_number = COALESCE($4, whatsapp_number),
                        bio = COALESCE($5, bio),
                        website = COALESCE($6, website),
                        address = COALESCE($7, address),
                        city = COALESCE($8, city),
                        region = COALESCE($9, region),
                        updated_at = NOW()
                    WHERE user_id = $10
                    "#,
                )
                .bind(&req.organization_name)
                .bind(req.organization_type.map(|t| t.as_str()))
                .bind(&req.phone_number)
                .bind(&req.whatsapp_number)
                .bind(&req.bio)
                .bind(&req.website)
                .bind(&req.address)
                .bind(&req.city)
                .bind(&req.region)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }
        }

        tx.commit().await.map_err(db_err)?;
        self.get_me(user_id).await
    }

    /// Public organizer page; every visit counts as a profile view.
    pub async fn get_organizer(&self, organizer_id: Uuid) -> UserResult<OrganizerPublic> {
        let profile = sqlx::query_as::<_, OrganizerProfile>(
            r#"
            UPDATE organizer_profiles
            SET profile_views = profile_views + 1
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(organizer_id)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(db_err)?
        .ok_or(UserError::NotFound)?;

        let user = self.get_user_by_id(profile.user_id).await?;
        let whatsapp_link = shared::text::whatsapp_link(
            profile.whatsapp_number.as_deref().unwrap_or(&profile.phone_number),
            "",
        );

        Ok(OrganizerPublic {
            id: profile.id,
            display_name: shared::text::display_name(
                profile.organization_name.as_deref(),
                &user.first_name,
                &user.last_name,
            ),
            organization_name: profile.organization_name,
            organization_type: profile.organization_type,
            bio: profile.bio,
            profile_picture: profile.profile_picture,
            website: profile.website,
            city: profile.city,
            region: profile.region,
            profile_views: profile.profile_views,
            whatsapp_link,
            member_since: user.date_joined,
        })
    }

    // ============= Administration =============

    pub async fn list_users(&self, query: ListUsersQuery) -> UserResult<PaginatedResponse<UserPublic>> {
        let search = blank_to_none(query.search.clone()).map(|s| format!("%{}%", s));

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE TRUE");
        push_user_filters(&mut count, &query, search.as_deref());
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.db_pool)
            .await
            .map_err(db_err)?;

        let page = Page::resolve(query.page.as_deref(), total, ADMIN_PAGE_SIZE);

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM users WHERE TRUE");
        push_user_filters(&mut select, &query, search.as_deref());
        select
            .push(" ORDER BY date_joined DESC, id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let users = select
            .build_query_as::<User>()
            .fetch_all(&self.db_pool)
            .await
            .map_err(db_err)?;

        Ok(PaginatedResponse::new(
            users.into_iter().map(UserPublic::from).collect(),
            page,
        ))
    }

    pub async fn get_user(&self, user_id: Uuid) -> UserResult<UserPublic> {
        Ok(self.get_user_by_id(user_id).await?.into())
    }

    /// Suspend or reactivate an account. Suspension also ends the session.
    pub async fn set_active(&self, user_id: Uuid, is_active: bool) -> UserResult<UserPublic> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET is_active = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(is_active)
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(db_err)?
        .ok_or(UserError::NotFound)?;

        if !is_active {
            self.logout(user_id).await?;
        }

        info!(user_id = %user_id, is_active, "Account status changed");
        Ok(user.into())
    }

    pub async fn mark_email_verified(&self, user_id: Uuid) -> UserResult<UserPublic> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET email_verified = true, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(db_err)?
        .ok_or(UserError::NotFound)?;

        Ok(user.into())
    }

    // ============= Lookups =============

    async fn find_by_email(&self, email: &str) -> UserResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email.trim())
            .fetch_optional(&self.db_pool)
            .await
            .map_err(db_err)
    }

    /// Get user by ID
    pub async fn get_user_by_id(&self, user_id: Uuid) -> UserResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await
            .map_err(db_err)?
            .ok_or(UserError::NotFound)
    }
}

async fn insert_user(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    email: &str,
    password_hash: &str,
    first_name: &str,
    last_name: &str,
    user_type: UserType,
) -> UserResult<User> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, password_hash, first_name, last_name, user_type,
                           is_staff, is_active, email_verified, date_joined, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, false, true, false, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(first_name.trim())
    .bind(last_name.trim())
    .bind(user_type.as_str())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => UserError::AlreadyExists,
        other => db_err(other),
    })
}

fn push_user_filters<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    query: &'a ListUsersQuery,
    search: Option<&'a str>,
) {
    if let Some(user_type) = query.user_type {
        builder.push(" AND user_type = ").push_bind(user_type.as_str());
    }
    if let Some(is_active) = query.is_active {
        builder.push(" AND is_active = ").push_bind(is_active);
    }
    if let Some(pattern) = search {
        builder
            .push(" AND (email ILIKE ")
            .push_bind(pattern)
            .push(" OR first_name ILIKE ")
            .push_bind(pattern)
            .push(" OR last_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_redis_keys() {
        let id = Uuid::nil();
        assert_eq!(verification_key("abc"), "email_verification:abc");
        assert_eq!(
            verification_user_key(id),
            "email_verification_user:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(password_reset_key("t"), "password_reset:t");
        assert_eq!(session_key(id), "session:00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_blank_to_none() {
        assert_eq!(blank_to_none(Some("  ".to_string())), None);
        assert_eq!(blank_to_none(Some(" Ténor ".to_string())), Some("Ténor".to_string()));
        assert_eq!(blank_to_none(None), None);
    }

    fn filters(user_type: Option<UserType>, is_active: Option<bool>, search: Option<&str>) -> ListUsersQuery {
        ListUsersQuery {
            user_type,
            is_active,
            search: search.map(str::to_string),
            page: None,
        }
    }

    async fn matching_emails(pool: &PgPool, query: &ListUsersQuery) -> Vec<String> {
        let search = blank_to_none(query.search.clone()).map(|s| format!("%{}%", s));
        let mut select = QueryBuilder::<Postgres>::new("SELECT email FROM users WHERE TRUE");
        push_user_filters(&mut select, query, search.as_deref());
        select.push(" ORDER BY email");
        select
            .build_query_scalar()
            .fetch_all(pool)
            .await
            .expect("filtered users")
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_duplicate_email_is_conflict(pool: PgPool) {
        let mut tx = pool.begin().await.unwrap();
        let user = insert_user(&mut tx, "tenor@example.cm", "hash", " Ténor ", "Mballa", UserType::Artist)
            .await
            .unwrap();
        assert_eq!(user.first_name, "Ténor");
        assert_eq!(user.user_type, "artist");
        assert!(user.is_active);
        assert!(!user.email_verified);

        let err = insert_user(&mut tx, "tenor@example.cm", "hash", "Other", "Person", UserType::Organizer)
            .await
            .err()
            .expect("duplicate email");
        assert!(matches!(err, UserError::AlreadyExists));
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_user_filters(pool: PgPool) {
        let mut tx = pool.begin().await.unwrap();
        insert_user(&mut tx, "tenor@example.cm", "hash", "Ténor", "Mballa", UserType::Artist)
            .await
            .unwrap();
        insert_user(&mut tx, "awa@example.cm", "hash", "Awa", "Ngono", UserType::Organizer)
            .await
            .unwrap();
        let suspended = insert_user(&mut tx, "paul@example.cm", "hash", "Paul", "Biya", UserType::Organizer)
            .await
            .unwrap();
        sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
            .bind(suspended.id)
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(matching_emails(&pool, &filters(None, None, None)).await.len(), 3);
        assert_eq!(
            matching_emails(&pool, &filters(Some(UserType::Organizer), Some(true), None)).await,
            vec!["awa@example.cm".to_string()]
        );
        assert_eq!(
            matching_emails(&pool, &filters(None, Some(false), None)).await,
            vec!["paul@example.cm".to_string()]
        );
        assert_eq!(
            matching_emails(&pool, &filters(None, None, Some("mball"))).await,
            vec!["tenor@example.cm".to_string()]
        );
        assert!(matching_emails(&pool, &filters(Some(UserType::Artist), None, Some("awa")))
            .await
            .is_empty());
    }
}
