use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use shared::auth::UNUSABLE_PASSWORD_PREFIX;
use shared::mailer::{EmailTemplate, Mailer};
use shared::text::normalize_email;
use shared::types::{Page, PaginatedResponse, UserType};
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::ReviewConfig;
use crate::models::*;
use crate::rating::{RatingSummary, REFRESH_ARTIST_RATING_SQL, REFRESH_STATISTICS_SQL};

const DUPLICATE_REVIEW: &str = "You have already reviewed this artist for this event";

/// Review fields shared by the authenticated and the emailed-link flows.
struct NewReview<'a> {
    artist_id: Uuid,
    organizer_id: Uuid,
    rating: i16,
    comment: Option<String>,
    event_date: Option<chrono::NaiveDate>,
    event_type: Option<&'a str>,
    event_location: Option<&'a str>,
}

pub struct ReviewService {
    config: ReviewConfig,
    db_pool: PgPool,
    mailer: Arc<Mailer>,
}

impl ReviewService {
    pub fn new(config: ReviewConfig, db_pool: PgPool, mailer: Arc<Mailer>) -> Self {
        Self {
            config,
            db_pool,
            mailer,
        }
    }

    // ============= Lookups =============

    async fn artist_for_user(&self, user_id: Uuid) -> ReviewResult<(Uuid, Decimal)> {
        sqlx::query_as("SELECT id, rating_average FROM artist_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(ReviewError::NotFound("Artist profile"))
    }

    async fn organizer_for_user(&self, user_id: Uuid) -> ReviewResult<Uuid> {
        sqlx::query_scalar("SELECT id FROM organizer_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(ReviewError::NotFound("Organizer profile"))
    }

    /// Display name of an active artist.
    async fn artist_name(&self, artist_id: Uuid) -> ReviewResult<String> {
        sqlx::query_scalar(
            "SELECT COALESCE(NULLIF(TRIM(a.stage_name), ''), TRIM(u.first_name || ' ' || u.last_name)) \
             FROM artist_profiles a JOIN users u ON u.id = a.user_id \
             WHERE a.id = $1 AND u.is_active",
        )
        .bind(artist_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(ReviewError::NotFound("Artist"))
    }

    async fn reviews_where(&self, condition: &str, id: Uuid) -> ReviewResult<Vec<ReviewView>> {
        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {}{} WHERE {} ORDER BY r.created_at DESC",
            REVIEW_COLUMNS, REVIEW_FROM, condition
        ))
        .bind(id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows.into_iter().map(ReviewView::from).collect())
    }

    async fn review(&self, review_id: Uuid) -> ReviewResult<ReviewView> {
        self.reviews_where("r.id = $1", review_id)
            .await?
            .pop()
            .ok_or(ReviewError::NotFound("Review"))
    }

    // ============= Leaving reviews =============

    /// An organizer reviews an artist they worked with.
    pub async fn leave_review(&self, user_id: Uuid, req: LeaveReviewRequest) -> ReviewResult<ReviewView> {
        req.validate()?;

        let comment = clean_comment(req.comment)?;
        if let Some(date) = req.event_date {
            check_event_date(date, Utc::now().date_naive(), Some(self.config.max_event_age_days))?;
        }

        let organizer_id = self.organizer_for_user(user_id).await?;
        self.artist_name(req.artist_id).await?;

        let event_type = req.event_type.map(|t| t.as_str());
        let event_location = req
            .event_location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty());

        let mut tx = self.db_pool.begin().await?;
        lock_artist(&mut tx, req.artist_id).await?;
        let review_id = insert_review(
            &mut tx,
            NewReview {
                artist_id: req.artist_id,
                organizer_id,
                rating: req.rating,
                comment,
                event_date: req.event_date,
                event_type,
                event_location,
            },
        )
        .await?;
        refresh_artist_rating(&mut tx, req.artist_id).await?;
        tx.commit().await?;

        info!(
            "Organizer {} reviewed artist {} ({} stars)",
            organizer_id, req.artist_id, req.rating
        );
        self.review(review_id).await
    }

    // ============= Review requests =============

    /// An artist asks a past client for a review by email.
    pub async fn request_review(&self, user_id: Uuid, req: RequestReviewRequest) -> ReviewResult<ReviewRequestView> {
        req.validate()?;
        check_event_date(req.event_date, Utc::now().date_naive(), None)?;

        let (artist_id, _) = self.artist_for_user(user_id).await?;
        let artist_name = self.artist_name(artist_id).await?;

        let token = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::days(self.config.request_expiry_days);

        let request: ReviewRequest = sqlx::query_as(
            r#"
            INSERT INTO review_requests (id, artist_id, client_email, client_name, client_phone,
                event_date, event_type, event_location, token, message, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(artist_id)
        .bind(normalize_email(&req.client_email))
        .bind(req.client_name.trim())
        .bind(req.client_phone.as_deref().map(str::trim).filter(|p| !p.is_empty()))
        .bind(req.event_date)
        .bind(req.event_type.as_str())
        .bind(req.event_location.trim())
        .bind(token)
        .bind(req.message.as_deref().map(str::trim).filter(|m| !m.is_empty()))
        .bind(expires_at)
        .fetch_one(&self.db_pool)
        .await?;

        let request = match self.send_request_email(&request, &artist_name).await {
            Ok(()) => sqlx::query_as(
                "UPDATE review_requests SET is_sent = TRUE, sent_at = NOW() WHERE id = $1 RETURNING *",
            )
            .bind(request.id)
            .fetch_one(&self.db_pool)
            .await?,
            Err(e) => {
                warn!("Failed to send review request {}: {}", request.id, e);
                request
            }
        };

        info!("Artist {} requested a review from {}", artist_id, request.client_email);
        Ok(request.into())
    }

    async fn send_request_email(
        &self,
        request: &ReviewRequest,
        artist_name: &str,
    ) -> Result<(), shared::mailer::MailerError> {
        let data = json!({
            "client_name": request.client_name,
            "artist_name": artist_name,
            "event_type": EventType::label_for(&request.event_type),
            "event_date": request.event_date.format("%d/%m/%Y").to_string(),
            "event_location": request.event_location,
            "message": request.message,
            "review_url": self.config.review_url(&request.token),
            "expires_at": request.expires_at.format("%d/%m/%Y").to_string(),
        });

        self.mailer
            .send(EmailTemplate::ReviewRequest, &request.client_email, &data)
            .await
    }

    pub async fn get_public_request(&self, token: Uuid) -> ReviewResult<PublicRequestView> {
        let request: ReviewRequest = sqlx::query_as("SELECT * FROM review_requests WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(ReviewError::NotFound("Review request"))?;

        let artist_name = self.artist_name(request.artist_id).await?;

        Ok(PublicRequestView {
            status: request.status(),
            artist_id: request.artist_id,
            artist_name,
            event_type_label: EventType::label_for(&request.event_type),
            client_name: request.client_name,
            event_date: request.event_date,
            event_type: request.event_type,
            event_location: request.event_location,
            expires_at: request.expires_at,
        })
    }

    /// A client answers an emailed link. The organizer account is created on the fly.
    pub async fn submit_public_review(&self, token: Uuid, req: PublicReviewRequest) -> ReviewResult<ReviewView> {
        req.validate()?;
        let comment = clean_comment(req.comment)?;

        let mut tx = self.db_pool.begin().await?;

        let request: ReviewRequest =
            sqlx::query_as("SELECT * FROM review_requests WHERE token = $1 FOR UPDATE")
                .bind(token)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(ReviewError::NotFound("Review request"))?;

        match request.status() {
            RequestStatus::Valid => {}
            RequestStatus::Expired => {
                return Err(ReviewError::LinkUnavailable("This review link has expired".to_string()))
            }
            RequestStatus::Used => {
                return Err(ReviewError::LinkUnavailable(
                    "This review link has already been used".to_string(),
                ))
            }
        }

        lock_artist(&mut tx, request.artist_id).await?;
        let organizer_id = find_or_create_organizer(&mut tx, &req.organizer_email, &req.organizer_name).await?;

        let review_id = insert_review(
            &mut tx,
            NewReview {
                artist_id: request.artist_id,
                organizer_id,
                rating: req.rating,
                comment,
                event_date: Some(request.event_date),
                event_type: Some(request.event_type.as_str()),
                event_location: Some(request.event_location.as_str()),
            },
        )
        .await?;

        sqlx::query("UPDATE review_requests SET is_used = TRUE WHERE id = $1")
            .bind(request.id)
            .execute(&mut *tx)
            .await?;

        refresh_artist_rating(&mut tx, request.artist_id).await?;
        tx.commit().await?;

        info!("Review request {} answered by organizer {}", request.id, organizer_id);
        self.review(review_id).await
    }

    // ============= Own reviews =============

    pub async fn my_reviews(&self, user_id: Uuid, user_type: UserType) -> ReviewResult<MyReviewsResponse> {
        match user_type {
            UserType::Artist => {
                let (artist_id, average_rating) = self.artist_for_user(user_id).await?;
                let reviews_received = self
                    .reviews_where("r.artist_id = $1 AND r.is_public", artist_id)
                    .await?;

                let requests: Vec<ReviewRequest> = sqlx::query_as(
                    "SELECT * FROM review_requests WHERE artist_id = $1 ORDER BY created_at DESC",
                )
                .bind(artist_id)
                .fetch_all(&self.db_pool)
                .await?;

                Ok(MyReviewsResponse::Artist {
                    total_reviews: reviews_received.len() as i64,
                    reviews_received,
                    review_requests: requests.into_iter().map(Into::into).collect(),
                    average_rating,
                })
            }
            UserType::Organizer => {
                let organizer_id = self.organizer_for_user(user_id).await?;
                let reviews_given = self.reviews_where("r.organizer_id = $1", organizer_id).await?;
                Ok(MyReviewsResponse::Organizer { reviews_given })
            }
        }
    }

    // ============= Responses =============

    pub async fn respond(&self, user_id: Uuid, review_id: Uuid, text: &str) -> ReviewResult<ReviewResponse> {
        let response_text = clean_response_text(text)?;
        let (artist_id, _) = self.artist_for_user(user_id).await?;

        let owned: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM reviews WHERE id = $1 AND artist_id = $2)",
        )
        .bind(review_id)
        .bind(artist_id)
        .fetch_one(&self.db_pool)
        .await?;
        if !owned {
            return Err(ReviewError::NotFound("Review"));
        }

        let response = sqlx::query_as(
            r#"
            INSERT INTO review_responses (id, review_id, response_text, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(review_id)
        .bind(&response_text)
        .fetch_one(&self.db_pool)
        .await
        .map_err(conflict_on_duplicate("You have already responded to this review"))?;

        debug!("Artist {} responded to review {}", artist_id, review_id);
        Ok(response)
    }

    pub async fn edit_response(&self, user_id: Uuid, response_id: Uuid, text: &str) -> ReviewResult<ReviewResponse> {
        let response_text = clean_response_text(text)?;
        let (artist_id, _) = self.artist_for_user(user_id).await?;

        sqlx::query_as(
            r#"
            UPDATE review_responses rr
            SET response_text = $3, updated_at = NOW()
            FROM reviews r
            WHERE rr.id = $1 AND r.id = rr.review_id AND r.artist_id = $2
            RETURNING rr.*
            "#,
        )
        .bind(response_id)
        .bind(artist_id)
        .bind(&response_text)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(ReviewError::NotFound("Response"))
    }

    // ============= Helpfulness =============

    pub async fn mark_helpful(&self, user_id: Uuid, review_id: Uuid, is_helpful: bool) -> ReviewResult<HelpfulResponse> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM reviews WHERE id = $1 AND is_public)")
                .bind(review_id)
                .fetch_one(&self.db_pool)
                .await?;
        if !exists {
            return Err(ReviewError::NotFound("Review"));
        }

        sqlx::query(
            r#"
            INSERT INTO review_helpfulness (id, review_id, user_id, is_helpful, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (review_id, user_id) DO UPDATE SET is_helpful = EXCLUDED.is_helpful
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(review_id)
        .bind(user_id)
        .bind(is_helpful)
        .execute(&self.db_pool)
        .await?;

        let (helpful_count, total_votes): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*) FILTER (WHERE is_helpful), COUNT(*) FROM review_helpfulness WHERE review_id = $1",
        )
        .bind(review_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(HelpfulResponse {
            helpful_count,
            total_votes,
            user_voted_helpful: is_helpful,
        })
    }

    // ============= Public listing =============

    pub async fn artist_reviews(&self, artist_id: Uuid, page: Option<&str>) -> ReviewResult<ArtistReviewsResponse> {
        let artist_name = self.artist_name(artist_id).await?;

        let star_counts: Vec<(i16, i64)> = sqlx::query_as(
            "SELECT rating, COUNT(*) FROM reviews WHERE artist_id = $1 AND is_public GROUP BY rating",
        )
        .bind(artist_id)
        .fetch_all(&self.db_pool)
        .await?;

        let mut counts = [0i64; 5];
        for (rating, count) in star_counts {
            if let Some(slot) = usize::try_from(rating - 1).ok().and_then(|i| counts.get_mut(i)) {
                *slot = count;
            }
        }
        let stats = RatingSummary::from_counts(counts);

        let page = Page::resolve(page, stats.total, self.config.page_size);
        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {}{} WHERE r.artist_id = $1 AND r.is_public \
             ORDER BY r.created_at DESC LIMIT $2 OFFSET $3",
            REVIEW_COLUMNS, REVIEW_FROM
        ))
        .bind(artist_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db_pool)
        .await?;

        Ok(ArtistReviewsResponse {
            artist_id,
            artist_name,
            stats,
            reviews: PaginatedResponse::new(rows.into_iter().map(ReviewView::from).collect(), page),
        })
    }

    // ============= Staff =============

    pub async fn moderate(&self, review_id: Uuid, req: ModerateReviewRequest) -> ReviewResult<ReviewView> {
        let artist_id: Uuid = sqlx::query_scalar("SELECT artist_id FROM reviews WHERE id = $1")
            .bind(review_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(ReviewError::NotFound("Review"))?;

        let mut tx = self.db_pool.begin().await?;
        lock_artist(&mut tx, artist_id).await?;

        sqlx::query(
            r#"
            UPDATE reviews
            SET is_public = COALESCE($2, is_public),
                is_verified = COALESCE($3, is_verified),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(review_id)
        .bind(req.is_public)
        .bind(req.is_verified)
        .execute(&mut *tx)
        .await?;

        refresh_artist_rating(&mut tx, artist_id).await?;
        tx.commit().await?;

        info!(
            "Review {} moderated (public: {:?}, verified: {:?})",
            review_id, req.is_public, req.is_verified
        );
        self.review(review_id).await
    }

    /// Rebuild `review_statistics` for every artist. Returns rows written.
    pub async fn refresh_all_statistics(&self) -> ReviewResult<u64> {
        let result = sqlx::query(REFRESH_STATISTICS_SQL)
            .bind(None::<Uuid>)
            .execute(&self.db_pool)
            .await?;
        Ok(result.rows_affected())
    }
}

async fn insert_review(tx: &mut Transaction<'_, Postgres>, review: NewReview<'_>) -> ReviewResult<Uuid> {
    sqlx::query_scalar(
        r#"
        INSERT INTO reviews (id, artist_id, organizer_id, rating, comment, event_date, event_type,
                             event_location, is_verified, is_public, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, TRUE, NOW(), NOW())
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(review.artist_id)
    .bind(review.organizer_id)
    .bind(review.rating)
    .bind(review.comment)
    .bind(review.event_date)
    .bind(review.event_type)
    .bind(review.event_location)
    .fetch_one(&mut **tx)
    .await
    .map_err(conflict_on_duplicate(DUPLICATE_REVIEW))
}

/// Serializes rating changes of one artist. Must run before the review rows
/// are touched so the recomputed aggregates see every committed review.
async fn lock_artist(tx: &mut Transaction<'_, Postgres>, artist_id: Uuid) -> ReviewResult<()> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM artist_profiles WHERE id = $1 FOR UPDATE")
        .bind(artist_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(ReviewError::NotFound("Artist"))?;
    Ok(())
}

/// Artist profile rating plus its statistics row, inside the caller's transaction.
async fn refresh_artist_rating(tx: &mut Transaction<'_, Postgres>, artist_id: Uuid) -> ReviewResult<()> {
    sqlx::query(REFRESH_ARTIST_RATING_SQL)
        .bind(artist_id)
        .execute(&mut **tx)
        .await?;
    sqlx::query(REFRESH_STATISTICS_SQL)
        .bind(Some(artist_id))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn find_or_create_organizer(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
    name: &str,
) -> ReviewResult<Uuid> {
    let email = normalize_email(email);

    let existing: Option<(Uuid, String)> =
        sqlx::query_as("SELECT id, user_type FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(&email)
            .fetch_optional(&mut **tx)
            .await?;

    let user_id = match existing {
        Some((_, user_type)) if user_type != UserType::Organizer.as_str() => {
            return Err(ReviewError::Forbidden(
                "This email belongs to an artist account".to_string(),
            ))
        }
        Some((user_id, _)) => user_id,
        None => {
            let (first_name, last_name) = split_name(name);
            let user_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO users (id, email, password_hash, first_name, last_name, user_type,
                                   is_staff, is_active, email_verified, date_joined, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, FALSE, TRUE, FALSE, NOW(), NOW())
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&email)
            .bind(format!("{}{}", UNUSABLE_PASSWORD_PREFIX, Uuid::new_v4().simple()))
            .bind(first_name)
            .bind(last_name)
            .bind(UserType::Organizer.as_str())
            .fetch_one(&mut **tx)
            .await?;
            info!("Created organizer account {} from a review link", user_id);
            user_id
        }
    };

    let organizer_id: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM organizer_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;

    match organizer_id {
        Some(id) => Ok(id),
        None => {
            let id = sqlx::query_scalar(
                r#"
                INSERT INTO organizer_profiles (id, user_id, organization_name, created_at, updated_at)
                VALUES ($1, $2, $3, NOW(), NOW())
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(name.trim())
            .fetch_one(&mut **tx)
            .await?;
            Ok(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use shared::config::EmailConfig;
    use std::str::FromStr;

    fn service(pool: PgPool) -> ReviewService {
        let mailer = Mailer::new(&EmailConfig::default()).expect("mailer");
        ReviewService::new(ReviewConfig::default(), pool, Arc::new(mailer))
    }

    async fn create_user(pool: &PgPool, email: &str, user_type: UserType) -> Uuid {
        sqlx::query_scalar(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, user_type)
            VALUES ($1, $2, 'x', 'Jean', 'Mballa', $3)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(user_type.as_str())
        .fetch_one(pool)
        .await
        .expect("insert user")
    }

    /// Returns (user id, artist profile id).
    async fn create_artist(pool: &PgPool, email: &str) -> (Uuid, Uuid) {
        let user_id = create_user(pool, email, UserType::Artist).await;
        let artist_id = sqlx::query_scalar(
            "INSERT INTO artist_profiles (id, user_id, stage_name) VALUES ($1, $2, 'Ténor') RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("insert artist profile");
        (user_id, artist_id)
    }

    /// Returns (user id, organizer profile id).
    async fn create_organizer(pool: &PgPool, email: &str) -> (Uuid, Uuid) {
        let user_id = create_user(pool, email, UserType::Organizer).await;
        let organizer_id = sqlx::query_scalar(
            "INSERT INTO organizer_profiles (id, user_id, organization_name) VALUES ($1, $2, 'Mairie') RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("insert organizer profile");
        (user_id, organizer_id)
    }

    async fn artist_rating(pool: &PgPool, artist_id: Uuid) -> (Decimal, i32) {
        sqlx::query_as("SELECT rating_average, total_reviews FROM artist_profiles WHERE id = $1")
            .bind(artist_id)
            .fetch_one(pool)
            .await
            .expect("artist rating")
    }

    async fn statistics_total(pool: &PgPool, artist_id: Uuid) -> i32 {
        sqlx::query_scalar("SELECT total_reviews FROM review_statistics WHERE artist_id = $1")
            .bind(artist_id)
            .fetch_one(pool)
            .await
            .expect("statistics row")
    }

    fn review_of(artist_id: Uuid, rating: i16, event_date: Option<NaiveDate>) -> LeaveReviewRequest {
        LeaveReviewRequest {
            artist_id,
            rating,
            comment: Some("Prestation remarquable, public ravi".to_string()),
            event_date,
            event_type: Some(EventType::Birthday),
            event_location: Some("Douala".to_string()),
        }
    }

    fn request_for(client_email: &str) -> RequestReviewRequest {
        RequestReviewRequest {
            client_email: client_email.to_string(),
            client_name: "Awa Ngono".to_string(),
            client_phone: None,
            event_date: Utc::now().date_naive() - Duration::days(3),
            event_type: EventType::WeddingTraditional,
            event_location: "Bafoussam".to_string(),
            message: None,
        }
    }

    fn public_review(email: &str, rating: i16) -> PublicReviewRequest {
        PublicReviewRequest {
            organizer_name: "Awa Ngono".to_string(),
            organizer_email: email.to_string(),
            rating,
            comment: None,
        }
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_concurrent_reviews_keep_artist_rating_consistent(pool: PgPool) {
        let (_, artist_id) = create_artist(&pool, "artist@example.cm").await;
        let service = Arc::new(service(pool.clone()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let (organizer_user, _) = create_organizer(&pool, &format!("org{}@example.cm", i)).await;
            let service = service.clone();
            let rating = if i % 2 == 0 { 5 } else { 4 };
            handles.push(tokio::spawn(async move {
                service
                    .leave_review(organizer_user, review_of(artist_id, rating, None))
                    .await
            }));
        }
        for handle in handles {
            handle.await.expect("task").expect("review");
        }

        let (average, total) = artist_rating(&pool, artist_id).await;
        assert_eq!(total, 8);
        assert_eq!(average, Decimal::from_str("4.50").unwrap());
        assert_eq!(statistics_total(&pool, artist_id).await, 8);
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_duplicate_review_for_same_event_conflicts(pool: PgPool) {
        let (_, artist_id) = create_artist(&pool, "artist@example.cm").await;
        let (organizer_user, _) = create_organizer(&pool, "org@example.cm").await;
        let service = service(pool.clone());

        let date = Utc::now().date_naive() - Duration::days(10);
        service
            .leave_review(organizer_user, review_of(artist_id, 5, Some(date)))
            .await
            .expect("first review");
        let err = service
            .leave_review(organizer_user, review_of(artist_id, 3, Some(date)))
            .await
            .err()
            .expect("duplicate rejected");
        assert!(matches!(err, ReviewError::AlreadyExists(_)));

        // Reviews without a date share one slot too.
        service
            .leave_review(organizer_user, review_of(artist_id, 4, None))
            .await
            .expect("undated review");
        let err = service
            .leave_review(organizer_user, review_of(artist_id, 4, None))
            .await
            .err()
            .expect("undated duplicate rejected");
        assert!(matches!(err, ReviewError::AlreadyExists(_)));

        assert_eq!(artist_rating(&pool, artist_id).await.1, 2);
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_public_link_is_single_use(pool: PgPool) {
        let (artist_user, artist_id) = create_artist(&pool, "artist@example.cm").await;
        let service = service(pool.clone());

        let request = service
            .request_review(artist_user, request_for("awa@example.cm"))
            .await
            .expect("request");
        assert!(request.request.is_sent);
        let token = request.request.token;

        let view = service.get_public_request(token).await.expect("view");
        assert_eq!(view.status, RequestStatus::Valid);

        let review = service
            .submit_public_review(token, public_review("Awa@Example.CM", 5))
            .await
            .expect("public review");
        assert_eq!(review.artist_id, artist_id);
        assert_eq!(review.event_location.as_deref(), Some("Bafoussam"));
        assert_eq!(artist_rating(&pool, artist_id).await, (Decimal::from(5), 1));

        let password_hash: String =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE email = 'Awa@example.cm'")
                .fetch_one(&pool)
                .await
                .expect("organizer created");
        assert!(password_hash.starts_with(UNUSABLE_PASSWORD_PREFIX));

        let err = service
            .submit_public_review(token, public_review("awa@example.cm", 1))
            .await
            .err()
            .expect("second use rejected");
        assert!(matches!(err, ReviewError::LinkUnavailable(_)));
        assert_eq!(
            service.get_public_request(token).await.expect("view").status,
            RequestStatus::Used
        );
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_expired_link_is_gone(pool: PgPool) {
        let (artist_user, artist_id) = create_artist(&pool, "artist@example.cm").await;
        let service = service(pool.clone());

        let token = service
            .request_review(artist_user, request_for("late@example.cm"))
            .await
            .expect("request")
            .request
            .token;
        sqlx::query("UPDATE review_requests SET expires_at = NOW() - INTERVAL '1 day' WHERE token = $1")
            .bind(token)
            .execute(&pool)
            .await
            .expect("expire");

        let err = service
            .submit_public_review(token, public_review("late@example.cm", 4))
            .await
            .err()
            .expect("expired link rejected");
        assert!(matches!(err, ReviewError::LinkUnavailable(_)));
        assert_eq!(artist_rating(&pool, artist_id).await.1, 0);

        let unknown = service.get_public_request(Uuid::new_v4()).await.err();
        assert!(matches!(unknown, Some(ReviewError::NotFound(_))));
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_public_review_refuses_artist_email(pool: PgPool) {
        let (artist_user, _) = create_artist(&pool, "artist@example.cm").await;
        create_artist(&pool, "rival@example.cm").await;
        let service = service(pool.clone());

        let token = service
            .request_review(artist_user, request_for("rival@example.cm"))
            .await
            .expect("request")
            .request
            .token;
        let err = service
            .submit_public_review(token, public_review("rival@example.cm", 1))
            .await
            .err()
            .expect("artist email rejected");
        assert!(matches!(err, ReviewError::Forbidden(_)));
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_moderation_recomputes_rating(pool: PgPool) {
        let (_, artist_id) = create_artist(&pool, "artist@example.cm").await;
        let (first, _) = create_organizer(&pool, "one@example.cm").await;
        let (second, _) = create_organizer(&pool, "two@example.cm").await;
        let service = service(pool.clone());

        let low = service
            .leave_review(first, review_of(artist_id, 2, None))
            .await
            .expect("review");
        service
            .leave_review(second, review_of(artist_id, 5, None))
            .await
            .expect("review");
        assert_eq!(artist_rating(&pool, artist_id).await, (Decimal::from_str("3.50").unwrap(), 2));

        let hidden = service
            .moderate(
                low.id,
                ModerateReviewRequest {
                    is_public: Some(false),
                    is_verified: None,
                },
            )
            .await
            .expect("moderate");
        assert!(!hidden.is_public);
        assert_eq!(artist_rating(&pool, artist_id).await, (Decimal::from(5), 1));
        assert_eq!(statistics_total(&pool, artist_id).await, 1);

        let listing = service.artist_reviews(artist_id, None).await.expect("listing");
        assert_eq!(listing.stats.total, 1);
        assert_eq!(listing.reviews.items.len(), 1);
    }
}
