use sqlx::PgPool;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::catalog::instrument_family;
use crate::models::*;

/// Genres, roles and instruments, and the artists' choice among them.
pub struct ReferenceService {
    db_pool: PgPool,
}

fn kind_columns(kind: ReferenceKind) -> &'static str {
    match kind {
        ReferenceKind::Genre => "t.is_traditional, NULL::varchar AS category",
        ReferenceKind::Role => "NULL::boolean AS is_traditional, NULL::varchar AS category",
        ReferenceKind::Instrument => "NULL::boolean AS is_traditional, t.category",
    }
}

fn with_family(kind: ReferenceKind, mut item: ReferenceItem) -> ReferenceItem {
    if kind == ReferenceKind::Instrument {
        item.family = Some(instrument_family(&item.name).to_string());
    }
    item
}

fn resolve_slug(name: &str, slug: Option<&str>) -> ArtistResult<String> {
    let slug = match slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(given) => shared::text::slugify(given),
        None => shared::text::slugify(name),
    };
    if slug.is_empty() {
        return Err(ArtistError::ValidationError(
            "Could not derive a slug from the name".to_string(),
        ));
    }
    Ok(slug)
}

impl ReferenceService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    fn select_sql(kind: ReferenceKind, condition: &str) -> String {
        format!(
            r#"
            SELECT t.id, t.name, t.slug, t.description, t.is_active, t.created_at,
                   (SELECT COUNT(*) FROM {link} l WHERE l.{column} = t.id) AS artist_count,
                   {extra}
            FROM {table} t
            WHERE {condition}
            ORDER BY t.name
            "#,
            link = kind.link_table(),
            column = kind.link_column(),
            extra = kind_columns(kind),
            table = kind.table(),
            condition = condition,
        )
    }

    /// Active entries with the number of artists carrying each.
    pub async fn list(&self, kind: ReferenceKind) -> ArtistResult<ReferenceList> {
        let items = sqlx::query_as::<_, ReferenceItem>(&Self::select_sql(kind, "t.is_active"))
            .fetch_all(&self.db_pool)
            .await?;

        Ok(ReferenceList {
            items: items.into_iter().map(|i| with_family(kind, i)).collect(),
        })
    }

    async fn get(&self, kind: ReferenceKind, id: Uuid) -> ArtistResult<ReferenceItem> {
        sqlx::query_as::<_, ReferenceItem>(&Self::select_sql(kind, "t.id = $1"))
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .map(|i| with_family(kind, i))
            .ok_or(ArtistError::NotFound(kind.label()))
    }

    pub async fn create(&self, kind: ReferenceKind, req: CreateReferenceRequest) -> ArtistResult<ReferenceItem> {
        req.validate()?;
        let name = req.name.trim();
        let slug = resolve_slug(name, req.slug.as_deref())?;
        let id = Uuid::new_v4();

        match kind {
            ReferenceKind::Genre => {
                sqlx::query(
                    r#"
                    INSERT INTO music_genres (id, name, slug, description, is_traditional, is_active, created_at)
                    VALUES ($1, $2, $3, $4, $5, TRUE, NOW())
                    "#,
                )
                .bind(id)
                .bind(name)
                .bind(&slug)
                .bind(&req.description)
                .bind(req.is_traditional)
                .execute(&self.db_pool)
                .await?;
            }
            ReferenceKind::Role => {
                sqlx::query(
                    r#"
                    INSERT INTO artist_roles (id, name, slug, description, is_active, created_at)
                    VALUES ($1, $2, $3, $4, TRUE, NOW())
                    "#,
                )
                .bind(id)
                .bind(name)
                .bind(&slug)
                .bind(&req.description)
                .execute(&self.db_pool)
                .await?;
            }
            ReferenceKind::Instrument => {
                let category = req.category.unwrap_or(InstrumentCategory::Modern);
                sqlx::query(
                    r#"
                    INSERT INTO instruments (id, name, slug, description, category, is_active, created_at)
                    VALUES ($1, $2, $3, $4, $5, TRUE, NOW())
                    "#,
                )
                .bind(id)
                .bind(name)
                .bind(&slug)
                .bind(&req.description)
                .bind(category.as_str())
                .execute(&self.db_pool)
                .await?;
            }
        }

        info!(kind = kind.label(), %id, %slug, "Reference entry created");
        self.get(kind, id).await
    }

    pub async fn update(
        &self,
        kind: ReferenceKind,
        id: Uuid,
        req: UpdateReferenceRequest,
    ) -> ArtistResult<ReferenceItem> {
        req.validate()?;

        let name = req.name.as_deref().map(str::trim);
        let slug = match req.slug.as_deref() {
            Some(raw) => Some(resolve_slug(raw, Some(raw))?),
            None => None,
        };

        let sql = format!(
            r#"
            UPDATE {table}
            SET name = COALESCE($1, name),
                slug = COALESCE($2, slug),
                description = COALESCE($3, description),
                is_active = COALESCE($4, is_active)
            WHERE id = $5
            "#,
            table = kind.table()
        );

        let updated = sqlx::query(&sql)
            .bind(name)
            .bind(slug)
            .bind(&req.description)
            .bind(req.is_active)
            .bind(id)
            .execute(&self.db_pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(ArtistError::NotFound(kind.label()));
        }

        match kind {
            ReferenceKind::Genre if req.is_traditional.is_some() => {
                sqlx::query("UPDATE music_genres SET is_traditional = $1 WHERE id = $2")
                    .bind(req.is_traditional)
                    .bind(id)
                    .execute(&self.db_pool)
                    .await?;
            }
            ReferenceKind::Instrument => {
                if let Some(category) = req.category {
                    sqlx::query("UPDATE instruments SET category = $1 WHERE id = $2")
                        .bind(category.as_str())
                        .bind(id)
                        .execute(&self.db_pool)
                        .await?;
                }
            }
            _ => {}
        }

        self.get(kind, id).await
    }

    // ============= Artist self-service =============

    async fn artist_id(&self, user_id: Uuid) -> ArtistResult<Uuid> {
        sqlx::query_scalar("SELECT id FROM artist_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(ArtistError::NotFound("Artist profile"))
    }

    /// Every id must name an active entry of `kind`.
    async fn ensure_active(&self, kind: ReferenceKind, ids: &[Uuid]) -> ArtistResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE id = ANY($1) AND is_active",
            kind.table()
        );
        let found: i64 = sqlx::query_scalar(&sql)
            .bind(ids)
            .fetch_one(&self.db_pool)
            .await?;

        if found != ids.len() as i64 {
            return Err(ArtistError::ValidationError(format!(
                "Unknown or inactive {} selected",
                kind.label().to_lowercase()
            )));
        }
        Ok(())
    }

    /// Replace the caller's genres or roles.
    pub async fn set_my_tags(&self, user_id: Uuid, kind: ReferenceKind, ids: Vec<Uuid>) -> ArtistResult<()> {
        if kind == ReferenceKind::Instrument {
            return Err(ArtistError::Internal(
                "Instruments carry a proficiency level; use set_my_instruments".to_string(),
            ));
        }

        let artist_id = self.artist_id(user_id).await?;
        let ids = dedup(ids);
        self.ensure_active(kind, &ids).await?;

        let mut tx = self.db_pool.begin().await?;

        sqlx::query(&format!("DELETE FROM {} WHERE artist_id = $1", kind.link_table()))
            .bind(artist_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, artist_id, {}, created_at)
            SELECT gen_random_uuid(), $1, tag_id, NOW()
            FROM UNNEST($2::uuid[]) AS tag_id
            "#,
            kind.link_table(),
            kind.link_column()
        ))
        .bind(artist_id)
        .bind(&ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(%artist_id, kind = kind.label(), count = ids.len(), "Artist tags replaced");
        Ok(())
    }

    pub async fn set_my_instruments(
        &self,
        user_id: Uuid,
        assignments: Vec<InstrumentAssignment>,
    ) -> ArtistResult<()> {
        let artist_id = self.artist_id(user_id).await?;

        let mut seen = HashSet::new();
        let assignments: Vec<InstrumentAssignment> = assignments
            .into_iter()
            .filter(|a| seen.insert(a.instrument_id))
            .collect();

        let ids: Vec<Uuid> = assignments.iter().map(|a| a.instrument_id).collect();
        let levels: Vec<String> = assignments
            .iter()
            .map(|a| a.proficiency_level.as_str().to_string())
            .collect();
        self.ensure_active(ReferenceKind::Instrument, &ids).await?;

        let mut tx = self.db_pool.begin().await?;

        sqlx::query("DELETE FROM artist_instruments WHERE artist_id = $1")
            .bind(artist_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO artist_instruments (id, artist_id, instrument_id, proficiency_level, created_at)
            SELECT gen_random_uuid(), $1, instrument_id, proficiency_level, NOW()
            FROM UNNEST($2::uuid[], $3::text[]) AS t(instrument_id, proficiency_level)
            "#,
        )
        .bind(artist_id)
        .bind(&ids)
        .bind(&levels)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(%artist_id, count = ids.len(), "Artist instruments replaced");
        Ok(())
    }
}

fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_derived_from_name() {
        assert_eq!(resolve_slug("Coupé-décalé", None).unwrap(), "coupe-decale");
        assert_eq!(resolve_slug("Hip Hop", Some("  ")).unwrap(), "hip-hop");
        assert_eq!(resolve_slug("Hip Hop", Some("Rap Urbain")).unwrap(), "rap-urbain");
        assert!(resolve_slug("???", None).is_err());
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(dedup(vec![a, b, a]), vec![a, b]);
    }

    #[test]
    fn test_select_sql_per_kind() {
        let sql = ReferenceService::select_sql(ReferenceKind::Instrument, "t.is_active");
        assert!(sql.contains("FROM instruments t"));
        assert!(sql.contains("FROM artist_instruments l WHERE l.instrument_id = t.id"));
        assert!(sql.contains("t.category"));

        let sql = ReferenceService::select_sql(ReferenceKind::Role, "t.id = $1");
        assert!(sql.contains("FROM artist_roles t"));
        assert!(sql.contains("NULL::boolean AS is_traditional"));
    }

    #[test]
    fn test_instrument_items_get_a_family() {
        let item = ReferenceItem {
            id: Uuid::new_v4(),
            name: "Balafon".to_string(),
            slug: "balafon".to_string(),
            description: None,
            is_active: true,
            created_at: chrono::Utc::now(),
            artist_count: 3,
            is_traditional: None,
            category: Some("traditional".to_string()),
            family: None,
        };
        let item = with_family(ReferenceKind::Instrument, item);
        assert_eq!(item.family.as_deref(), Some("Percussions sacrées"));
    }
}
