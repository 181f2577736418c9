use shared::auth::Claims;
use shared::types::{Page, PaginatedResponse};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::{self, instrument_family};
use crate::config::CatalogConfig;
use crate::models::*;
use crate::search::{like_pattern, ArtistFilters, SortOrder, ARTIST_CARD_COLUMNS, ARTIST_FROM};

/// Who is looking at a profile or pressing the WhatsApp button.
#[derive(Debug, Clone)]
pub struct Visitor {
    pub claims: Option<Claims>,
    pub ip: String,
    pub referrer: Option<String>,
}

impl Visitor {
    fn user_id(&self) -> Option<Uuid> {
        self.claims.as_ref().and_then(|c| c.user_id().ok())
    }
}

pub struct ArtistService {
    catalog: CatalogConfig,
    db_pool: PgPool,
}

impl ArtistService {
    pub fn new(catalog: CatalogConfig, db_pool: PgPool) -> Self {
        Self { catalog, db_pool }
    }

    // ============= Listing and search =============

    /// All artists, best rated first
    pub async fn list_artists(&self, page: Option<&str>) -> ArtistResult<PaginatedResponse<ArtistCard>> {
        let filters = ArtistFilters::default();
        let (artists, _) = self.run_search(&filters, page).await?;
        Ok(artists)
    }

    pub async fn search_artists(
        &self,
        params: SearchParams,
        visitor: &Visitor,
    ) -> ArtistResult<SearchResponse> {
        let filters = ArtistFilters::from_params(&params)?;
        let (artists, total) = self.run_search(&filters, params.page.as_deref()).await?;

        if let Some(ref text) = filters.search {
            self.record_search(text, &filters, total, visitor).await;
        }

        Ok(SearchResponse {
            stats: self.sidebar_stats().await?,
            has_filters: filters.has_filters(),
            results_count: total,
            artists,
        })
    }

    async fn run_search(
        &self,
        filters: &ArtistFilters,
        page: Option<&str>,
    ) -> ArtistResult<(PaginatedResponse<ArtistCard>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        count.push(ARTIST_FROM);
        filters.push_predicates(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db_pool).await?;

        let page = Page::resolve(page, total, self.catalog.page_size);

        let mut select = QueryBuilder::<Postgres>::new("SELECT ");
        select.push(ARTIST_CARD_COLUMNS).push(ARTIST_FROM);
        filters.push_predicates(&mut select);
        select
            .push(filters.sort_by.order_by())
            .push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let artists = select
            .build_query_as::<ArtistCard>()
            .fetch_all(&self.db_pool)
            .await?;

        debug!(total, page = page.number, "Artist search executed");
        Ok((PaginatedResponse::new(artists, page), total))
    }

    /// Search analytics are best effort and never fail the search.
    async fn record_search(&self, text: &str, filters: &ArtistFilters, results: i64, visitor: &Visitor) {
        let query: String = text.chars().take(255).collect();
        let result = sqlx::query(
            r#"
            INSERT INTO search_queries (id, query, filters_used, results_count, user_id, user_ip, searched_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(query)
        .bind(sqlx::types::Json(filters))
        .bind(results as i32)
        .bind(visitor.user_id())
        .bind(&visitor.ip)
        .execute(&self.db_pool)
        .await;

        if let Err(e) = result {
            warn!("Failed to record search query: {}", e);
        }
    }

    pub async fn sidebar_stats(&self) -> ArtistResult<SidebarStats> {
        let (total_artists, available_artists): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE a.is_available)
            FROM artist_profiles a JOIN users u ON u.id = a.user_id
            WHERE u.is_active
            "#,
        )
        .fetch_one(&self.db_pool)
        .await?;

        let top_genres = sqlx::query_as::<_, GenreCount>(
            r#"
            SELECT g.id, g.name, COUNT(ag.id) AS artist_count
            FROM music_genres g
            JOIN artist_genres ag ON ag.genre_id = g.id
            JOIN artist_profiles a ON a.id = ag.artist_id
            JOIN users u ON u.id = a.user_id
            WHERE u.is_active
            GROUP BY g.id, g.name
            ORDER BY artist_count DESC, g.name
            LIMIT 5
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        let top_regions = sqlx::query_as::<_, RegionCount>(
            r#"
            SELECT a.region, COUNT(*) AS count
            FROM artist_profiles a JOIN users u ON u.id = a.user_id
            WHERE u.is_active AND a.region <> ''
            GROUP BY a.region
            ORDER BY count DESC, a.region
            LIMIT 5
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        Ok(SidebarStats {
            total_artists,
            available_artists,
            top_genres,
            top_regions,
        })
    }

    pub async fn quick_search(&self, q: Option<&str>) -> ArtistResult<QuickSearchResponse> {
        let Some(q) = q.map(str::trim).filter(|q| !q.is_empty()) else {
            return Ok(QuickSearchResponse { results: Vec::new() });
        };
        if q.chars().count() > 100 {
            return Err(ArtistError::ValidationError(
                "Query must be at most 100 characters".to_string(),
            ));
        }

        let pattern = like_pattern(q);
        let sql = format!(
            "SELECT {}{} AND (u.first_name ILIKE $1 OR u.last_name ILIKE $1 OR a.stage_name ILIKE $1){} LIMIT $2",
            ARTIST_CARD_COLUMNS,
            ARTIST_FROM,
            SortOrder::BestRated.order_by()
        );

        let artists = sqlx::query_as::<_, ArtistCard>(&sql)
            .bind(pattern)
            .bind(self.catalog.quick_search_limit)
            .fetch_all(&self.db_pool)
            .await?;

        let results = artists
            .into_iter()
            .map(|a| QuickSearchResult {
                kind: "artist",
                id: a.id,
                subtitle: format!("{}, {}", a.city, a.region),
                url: format!("/artists/{}/", a.id),
                name: a.display_name,
                avatar: a.profile_picture,
            })
            .collect();

        Ok(QuickSearchResponse { results })
    }

    // ============= Detail =============

    async fn get_card(&self, artist_id: Uuid) -> ArtistResult<ArtistCard> {
        let sql = format!("SELECT {}{} AND a.id = $1", ARTIST_CARD_COLUMNS, ARTIST_FROM);
        sqlx::query_as::<_, ArtistCard>(&sql)
            .bind(artist_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(ArtistError::NotFound("Artist"))
    }

    /// Artist profile page. Every visit except the artist's own counts as a
    /// profile view.
    pub async fn get_artist(&self, artist_id: Uuid, visitor: &Visitor) -> ArtistResult<ArtistDetail> {
        let mut artist = self.get_card(artist_id).await?;
        let viewer_id = visitor.user_id();

        if viewer_id != Some(artist.user_id) {
            self.record_view(&artist, viewer_id, visitor).await?;
            artist.profile_views += 1;
        }

        let tags = self.tags_for(artist.id).await?;
        let similar_artists = self.similar_artists(&artist).await?;
        let whatsapp_link = shared::text::whatsapp_link(artist.contact_number(), "");
        let can_contact = visitor.claims.as_ref().is_some_and(|c| c.is_organizer());

        Ok(ArtistDetail {
            artist,
            tags,
            whatsapp_link,
            similar_artists,
            can_contact,
        })
    }

    async fn record_view(&self, artist: &ArtistCard, viewer_id: Option<Uuid>, visitor: &Visitor) -> ArtistResult<()> {
        let mut tx = self.db_pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO profile_views (id, artist_id, viewer_id, viewer_ip, referrer, viewed_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(artist.id)
        .bind(viewer_id)
        .bind(&visitor.ip)
        .bind(&visitor.referrer)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE artist_profiles SET profile_views = profile_views + 1 WHERE id = $1")
            .bind(artist.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Artists sharing a genre or the same city, best rated first.
    async fn similar_artists(&self, artist: &ArtistCard) -> ArtistResult<Vec<ArtistCard>> {
        let sql = format!(
            r#"SELECT {}{}
            AND a.id <> $1
            AND (
                (a.city <> '' AND LOWER(a.city) = LOWER($2))
                OR EXISTS (
                    SELECT 1 FROM artist_genres mine
                    JOIN artist_genres theirs ON theirs.genre_id = mine.genre_id
                    WHERE mine.artist_id = $1 AND theirs.artist_id = a.id
                )
            ){} LIMIT $3"#,
            ARTIST_CARD_COLUMNS,
            ARTIST_FROM,
            SortOrder::BestRated.order_by()
        );

        let similar = sqlx::query_as::<_, ArtistCard>(&sql)
            .bind(artist.id)
            .bind(&artist.city)
            .bind(self.catalog.similar_artists_limit)
            .fetch_all(&self.db_pool)
            .await?;
        Ok(similar)
    }

    pub async fn tags_for(&self, artist_id: Uuid) -> ArtistResult<ArtistTags> {
        let genres = sqlx::query_as::<_, GenreTag>(
            r#"
            SELECT g.id, g.name, g.slug, g.is_traditional
            FROM artist_genres ag JOIN music_genres g ON g.id = ag.genre_id
            WHERE ag.artist_id = $1
            ORDER BY g.name
            "#,
        )
        .bind(artist_id)
        .fetch_all(&self.db_pool)
        .await?;

        let roles = sqlx::query_as::<_, RoleTag>(
            r#"
            SELECT r.id, r.name, r.slug
            FROM artist_role_assignments ar JOIN artist_roles r ON r.id = ar.role_id
            WHERE ar.artist_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(artist_id)
        .fetch_all(&self.db_pool)
        .await?;

        let mut instruments = sqlx::query_as::<_, InstrumentTag>(
            r#"
            SELECT i.id, i.name, i.slug, i.category, ai.proficiency_level
            FROM artist_instruments ai JOIN instruments i ON i.id = ai.instrument_id
            WHERE ai.artist_id = $1
            ORDER BY i.name
            "#,
        )
        .bind(artist_id)
        .fetch_all(&self.db_pool)
        .await?;

        for instrument in &mut instruments {
            instrument.family = instrument_family(&instrument.name).to_string();
        }

        Ok(ArtistTags {
            genres,
            roles,
            instruments,
        })
    }

    // ============= WhatsApp =============

    pub async fn whatsapp_templates(&self, artist_id: Uuid) -> ArtistResult<WhatsAppTemplatesResponse> {
        let artist = self.get_card(artist_id).await?;
        let has_whatsapp = shared::text::international_number(artist.contact_number()).is_some();

        Ok(WhatsAppTemplatesResponse {
            artist_id: artist.id,
            templates: catalog::templates_for(&artist.display_name),
            artist_name: artist.display_name,
            has_whatsapp,
        })
    }

    /// Record a contact click and build the wa.me link with the chosen
    /// message.
    pub async fn whatsapp_contact(
        &self,
        artist_id: Uuid,
        req: &WhatsAppContactRequest,
        visitor: &Visitor,
    ) -> ArtistResult<WhatsAppRedirect> {
        let artist = self.get_card(artist_id).await?;

        let message = catalog::compose_message(
            &artist.display_name,
            req.message_type.as_deref().unwrap_or("general"),
            req.custom_message.as_deref(),
        );

        let redirect_url = shared::text::whatsapp_link(artist.contact_number(), &message)
            .ok_or(ArtistError::NoWhatsAppNumber)?;

        sqlx::query(
            r#"
            INSERT INTO whatsapp_clicks (id, artist_id, clicker_id, clicker_ip, clicked_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(artist.id)
        .bind(visitor.user_id())
        .bind(&visitor.ip)
        .execute(&self.db_pool)
        .await?;

        info!(artist_id = %artist.id, "WhatsApp contact click recorded");
        Ok(WhatsAppRedirect { redirect_url })
    }

    /// Contact statistics for the calling artist
    pub async fn whatsapp_stats(&self, user_id: Uuid) -> ArtistResult<WhatsAppStats> {
        let (artist_id, profile_views) = self.artist_for_user(user_id).await?;

        let (total_clicks, recent_clicks_count, anonymous_clicks): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE clicked_at >= NOW() - INTERVAL '30 days'),
                   COUNT(*) FILTER (WHERE clicker_id IS NULL)
            FROM whatsapp_clicks
            WHERE artist_id = $1
            "#,
        )
        .bind(artist_id)
        .fetch_one(&self.db_pool)
        .await?;

        let daily_clicks = sqlx::query_as::<_, DailyClicks>(
            r#"
            SELECT d.day::date AS date, COUNT(c.id) AS clicks
            FROM generate_series(CURRENT_DATE - 6, CURRENT_DATE, INTERVAL '1 day') AS d(day)
            LEFT JOIN whatsapp_clicks c
                ON c.artist_id = $1 AND c.clicked_at::date = d.day::date
            GROUP BY d.day
            ORDER BY d.day
            "#,
        )
        .bind(artist_id)
        .fetch_all(&self.db_pool)
        .await?;

        let top_clickers = sqlx::query_as::<_, TopClicker>(
            r#"
            SELECT u.first_name, u.last_name, u.email, COUNT(c.id) AS click_count
            FROM whatsapp_clicks c JOIN users u ON u.id = c.clicker_id
            WHERE c.artist_id = $1
            GROUP BY u.id, u.first_name, u.last_name, u.email
            ORDER BY click_count DESC, u.email
            LIMIT 5
            "#,
        )
        .bind(artist_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(WhatsAppStats {
            total_clicks,
            recent_clicks_count,
            daily_clicks,
            top_clickers,
            anonymous_clicks,
            profile_views,
            conversion_rate: conversion_rate(total_clicks, profile_views),
        })
    }

    /// Artist profile id and view count for an artist account.
    pub async fn artist_for_user(&self, user_id: Uuid) -> ArtistResult<(Uuid, i32)> {
        sqlx::query_as("SELECT id, profile_views FROM artist_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(ArtistError::NotFound("Artist profile"))
    }
}

/// Clicks per hundred profile views, one decimal.
pub fn conversion_rate(clicks: i64, profile_views: i32) -> f64 {
    if profile_views <= 0 {
        return 0.0;
    }
    let rate = clicks as f64 / profile_views as f64 * 100.0;
    (rate * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    #[test]
    fn test_conversion_rate() {
        assert_eq!(conversion_rate(0, 0), 0.0);
        assert_eq!(conversion_rate(5, 0), 0.0);
        assert_eq!(conversion_rate(1, 3), 33.3);
        assert_eq!(conversion_rate(2, 3), 66.7);
        assert_eq!(conversion_rate(10, 10), 100.0);
    }

    #[test]
    fn test_anonymous_visitor_has_no_user() {
        let visitor = Visitor {
            claims: None,
            ip: "41.202.1.1".to_string(),
            referrer: None,
        };
        assert_eq!(visitor.user_id(), None);
    }

    async fn create_artist(pool: &PgPool, stage_name: &str, region: &str, rating: i64, is_active: bool) -> Uuid {
        let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (id, email, password_hash, first_name, last_name, user_type, is_active) \
             VALUES ($1, $2, 'x', 'Jean', 'Mballa', 'artist', $3) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(format!("{}@example.cm", stage_name.to_lowercase()))
        .bind(is_active)
        .fetch_one(pool)
        .await
        .expect("insert user");
        sqlx::query_scalar(
            "INSERT INTO artist_profiles (id, user_id, stage_name, city, region, rating_average) \
             VALUES ($1, $2, $3, 'Douala', $4, $5) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(stage_name)
        .bind(region)
        .bind(Decimal::from(rating))
        .fetch_one(pool)
        .await
        .expect("insert artist profile")
    }

    async fn create_genre(pool: &PgPool, name: &str) -> Uuid {
        sqlx::query_scalar("INSERT INTO music_genres (id, name, slug) VALUES ($1, $2, $3) RETURNING id")
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(name.to_lowercase())
            .fetch_one(pool)
            .await
            .expect("insert genre")
    }

    async fn tag_genre(pool: &PgPool, artist_id: Uuid, genre_id: Uuid) {
        sqlx::query("INSERT INTO artist_genres (id, artist_id, genre_id) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(artist_id)
            .bind(genre_id)
            .execute(pool)
            .await
            .expect("tag genre");
    }

    fn names(page: &PaginatedResponse<ArtistCard>) -> Vec<&str> {
        page.items.iter().map(|a| a.display_name.as_str()).collect()
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_sidebar_ignores_suspended_artists(pool: PgPool) {
        let makossa = create_genre(&pool, "Makossa").await;
        let bikutsi = create_genre(&pool, "Bikutsi").await;

        let active = create_artist(&pool, "Manu", "Littoral", 4, true).await;
        tag_genre(&pool, active, makossa).await;
        let suspended = create_artist(&pool, "Ghost", "Centre", 5, false).await;
        tag_genre(&pool, suspended, makossa).await;
        tag_genre(&pool, suspended, bikutsi).await;

        let stats = ArtistService::new(CatalogConfig::default(), pool).sidebar_stats().await.unwrap();

        assert_eq!(stats.total_artists, 1);
        assert_eq!(stats.available_artists, 1);
        let genres: Vec<(&str, i64)> = stats
            .top_genres
            .iter()
            .map(|g| (g.name.as_str(), g.artist_count))
            .collect();
        assert_eq!(genres, vec![("Makossa", 1)]);
        let regions: Vec<(&str, i64)> = stats
            .top_regions
            .iter()
            .map(|r| (r.region.as_str(), r.count))
            .collect();
        assert_eq!(regions, vec![("Littoral", 1)]);
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_search_filters_and_pages(pool: PgPool) {
        let makossa = create_genre(&pool, "Makossa").await;
        let petit_pays = create_artist(&pool, "Petit", "Littoral", 5, true).await;
        tag_genre(&pool, petit_pays, makossa).await;
        create_artist(&pool, "Longue", "Littoral", 4, true).await;
        create_artist(&pool, "Lady", "Littoral", 3, true).await;
        create_artist(&pool, "Hidden", "Littoral", 5, false).await;
        create_artist(&pool, "Zanzibar", "Centre", 2, true).await;

        let catalog = CatalogConfig {
            page_size: 2,
            ..CatalogConfig::default()
        };
        let service = ArtistService::new(catalog, pool);

        let littoral = ArtistFilters {
            region: Some("Littoral".to_string()),
            ..ArtistFilters::default()
        };
        let (first, total) = service.run_search(&littoral, None).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(names(&first), vec!["Petit", "Longue"]);
        let (second, _) = service.run_search(&littoral, Some("2")).await.unwrap();
        assert_eq!(names(&second), vec!["Lady"]);

        let tagged = ArtistFilters {
            genres: vec![makossa],
            ..ArtistFilters::default()
        };
        let (found, total) = service.run_search(&tagged, None).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found.items[0].genres, vec!["Makossa".to_string()]);

        let by_text = ArtistFilters {
            search: Some("100%".to_string()),
            ..ArtistFilters::default()
        };
        assert_eq!(service.run_search(&by_text, None).await.unwrap().1, 0);
    }
}
