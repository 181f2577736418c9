//! Artist search: filter parsing and SQL composition.
//!
//! Filters are pushed onto a [`QueryBuilder`] so the same predicate serves
//! both the count and the page query. Every value goes through a bind
//! parameter; only fixed column names are written into the SQL text.

use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};
use std::str::FromStr;
use uuid::Uuid;

use crate::catalog::locations::label_for;
use crate::models::{ArtistError, ArtistResult, SearchParams};

/// Columns selected for an [`ArtistCard`](crate::models::ArtistCard). Expects
/// `artist_profiles a JOIN users u`.
pub const ARTIST_CARD_COLUMNS: &str = r#"
    a.id, a.user_id, u.first_name, u.last_name, a.stage_name,
    COALESCE(NULLIF(TRIM(a.stage_name), ''), TRIM(u.first_name || ' ' || u.last_name)) AS display_name,
    a.bio, a.profile_picture, a.city, a.region, a.is_available,
    a.rating_average, a.total_reviews, a.profile_views, a.created_at,
    ARRAY(
        SELECT g.name FROM artist_genres ag
        JOIN music_genres g ON g.id = ag.genre_id
        WHERE ag.artist_id = a.id
        ORDER BY g.name
    ) AS genres,
    a.phone_number, a.whatsapp_number
"#;

pub const ARTIST_FROM: &str = " FROM artist_profiles a JOIN users u ON u.id = a.user_id WHERE u.is_active";

const MAX_SEARCH_LEN: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SortOrder {
    #[serde(rename = "name")]
    NameAsc,
    #[serde(rename = "-name")]
    NameDesc,
    #[default]
    #[serde(rename = "-rating_average")]
    BestRated,
    #[serde(rename = "-total_reviews")]
    MostReviewed,
    #[serde(rename = "-profile_views")]
    MostViewed,
    #[serde(rename = "-created_at")]
    Newest,
    #[serde(rename = "created_at")]
    Oldest,
}

impl SortOrder {
    /// ORDER BY clause; `a.id` is always the last tiebreaker so pages are
    /// stable.
    pub fn order_by(&self) -> &'static str {
        match self {
            SortOrder::NameAsc => " ORDER BY display_name ASC, a.id",
            SortOrder::NameDesc => " ORDER BY display_name DESC, a.id",
            SortOrder::BestRated => " ORDER BY a.rating_average DESC, a.total_reviews DESC, a.id",
            SortOrder::MostReviewed => " ORDER BY a.total_reviews DESC, a.id",
            SortOrder::MostViewed => " ORDER BY a.profile_views DESC, a.id",
            SortOrder::Newest => " ORDER BY a.created_at DESC, a.id",
            SortOrder::Oldest => " ORDER BY a.created_at ASC, a.id",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ArtistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(SortOrder::NameAsc),
            "-name" => Ok(SortOrder::NameDesc),
            "-rating_average" => Ok(SortOrder::BestRated),
            "-total_reviews" => Ok(SortOrder::MostReviewed),
            "-profile_views" => Ok(SortOrder::MostViewed),
            "-created_at" => Ok(SortOrder::Newest),
            "created_at" => Ok(SortOrder::Oldest),
            other => Err(ArtistError::ValidationError(format!("Unknown sort order: {}", other))),
        }
    }
}

/// Validated search filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArtistFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<Uuid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Uuid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub instruments: Vec<Uuid>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub available_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<i32>,
    pub sort_by: SortOrder,
}

impl ArtistFilters {
    pub fn from_params(params: &SearchParams) -> ArtistResult<Self> {
        let search = non_blank(params.search.as_deref());
        if let Some(ref text) = search {
            if text.chars().count() > MAX_SEARCH_LEN {
                return Err(ArtistError::ValidationError(format!(
                    "Search text must be at most {} characters",
                    MAX_SEARCH_LEN
                )));
            }
        }

        let min_rating = match non_blank(params.min_rating.as_deref()) {
            None => None,
            Some(raw) => match raw.parse::<i32>() {
                Ok(n @ 1..=4) => Some(n),
                _ => {
                    return Err(ArtistError::ValidationError(
                        "Minimum rating must be between 1 and 4".to_string(),
                    ))
                }
            },
        };

        let sort_by = match non_blank(params.sort_by.as_deref()) {
            None => SortOrder::default(),
            Some(raw) => raw.parse()?,
        };

        Ok(Self {
            search,
            region: location_filter(params.region.as_deref()),
            city: location_filter(params.city.as_deref()),
            genres: parse_ids("genres", params.genres.as_deref())?,
            roles: parse_ids("roles", params.roles.as_deref())?,
            instruments: parse_ids("instruments", params.instruments.as_deref())?,
            available_only: params.is_available.unwrap_or(false),
            min_rating,
            sort_by,
        })
    }

    /// True when any filter narrows the result set. Sorting is not a filter.
    pub fn has_filters(&self) -> bool {
        self.search.is_some()
            || self.region.is_some()
            || self.city.is_some()
            || !self.genres.is_empty()
            || !self.roles.is_empty()
            || !self.instruments.is_empty()
            || self.available_only
            || self.min_rating.is_some()
    }

    /// Append the WHERE predicates. The builder must already end with a
    /// WHERE clause (see [`ARTIST_FROM`]).
    pub fn push_predicates<'a>(&'a self, builder: &mut QueryBuilder<'a, Postgres>) {
        if let Some(ref text) = self.search {
            let pattern = like_pattern(text);
            builder.push(" AND (");
            for (i, column) in [
                "u.first_name",
                "u.last_name",
                "a.stage_name",
                "a.city",
                "a.region",
                "a.bio",
            ]
            .iter()
            .enumerate()
            {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder.push(*column).push(" ILIKE ").push_bind(pattern.clone());
            }
            builder.push(")");
        }

        if let Some(ref region) = self.region {
            builder.push(" AND a.region ILIKE ").push_bind(like_pattern(region));
        }

        if let Some(ref city) = self.city {
            builder.push(" AND a.city ILIKE ").push_bind(like_pattern(city));
        }

        push_any_tag(builder, "artist_genres", "genre_id", &self.genres);
        push_any_tag(builder, "artist_role_assignments", "role_id", &self.roles);
        push_any_tag(builder, "artist_instruments", "instrument_id", &self.instruments);

        if self.available_only {
            builder.push(" AND a.is_available");
        }

        if let Some(min_rating) = self.min_rating {
            builder
                .push(" AND a.rating_average >= ")
                .push_bind(rust_decimal::Decimal::from(min_rating));
        }
    }
}

/// EXISTS keeps each artist once even when several tags match.
fn push_any_tag<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    link_table: &'static str,
    link_column: &'static str,
    ids: &'a [Uuid],
) {
    if ids.is_empty() {
        return;
    }
    builder
        .push(" AND EXISTS (SELECT 1 FROM ")
        .push(link_table)
        .push(" t WHERE t.artist_id = a.id AND t.")
        .push(link_column)
        .push(" = ANY(")
        .push_bind(ids)
        .push("))");
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Known choice values ("yaounde") are matched through their label
/// ("Yaoundé") since profiles store the label as typed.
fn location_filter(value: Option<&str>) -> Option<String> {
    non_blank(value).map(|v| match label_for(&v) {
        Some(label) => label.to_string(),
        None => v,
    })
}

/// Comma separated UUIDs, duplicates removed.
fn parse_ids(field: &str, raw: Option<&str>) -> ArtistResult<Vec<Uuid>> {
    let mut ids = Vec::new();
    for part in raw.unwrap_or_default().split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = Uuid::parse_str(part)
            .map_err(|_| ArtistError::ValidationError(format!("Invalid id in {}: {}", field, part)))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Case-insensitive "contains" pattern with LIKE metacharacters escaped.
pub fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params() -> SearchParams {
        SearchParams::default()
    }

    #[test]
    fn test_empty_params_have_no_filters() {
        let filters = ArtistFilters::from_params(&params()).unwrap();
        assert!(!filters.has_filters());
        assert_eq!(filters.sort_by, SortOrder::BestRated);
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let mut p = params();
        p.search = Some("   ".to_string());
        p.city = Some("".to_string());
        p.genres = Some(" , ".to_string());
        p.is_available = Some(false);
        let filters = ArtistFilters::from_params(&p).unwrap();
        assert!(!filters.has_filters());
    }

    #[test]
    fn test_ids_are_parsed_and_deduplicated() {
        let id = Uuid::new_v4();
        let mut p = params();
        p.genres = Some(format!("{}, {}", id, id));
        let filters = ArtistFilters::from_params(&p).unwrap();
        assert_eq!(filters.genres, vec![id]);
        assert!(filters.has_filters());

        p.genres = Some("not-a-uuid".to_string());
        assert!(matches!(
            ArtistFilters::from_params(&p),
            Err(ArtistError::ValidationError(_))
        ));
    }

    #[test]
    fn test_min_rating_range() {
        let mut p = params();
        p.min_rating = Some("4".to_string());
        assert_eq!(ArtistFilters::from_params(&p).unwrap().min_rating, Some(4));

        for bad in ["0", "5", "abc"] {
            p.min_rating = Some(bad.to_string());
            assert!(ArtistFilters::from_params(&p).is_err(), "{} accepted", bad);
        }
    }

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!("-name".parse::<SortOrder>().unwrap(), SortOrder::NameDesc);
        assert_eq!("created_at".parse::<SortOrder>().unwrap(), SortOrder::Oldest);
        assert!("rating".parse::<SortOrder>().is_err());
        assert!(SortOrder::NameAsc.order_by().ends_with("a.id"));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Douala"), "%Douala%");
        assert_eq!(like_pattern("100%_live"), "%100\\%\\_live%");
    }

    #[test]
    fn test_predicates_sql() {
        let mut p = params();
        p.search = Some("makossa".to_string());
        p.genres = Some(Uuid::new_v4().to_string());
        p.is_available = Some(true);
        p.min_rating = Some("3".to_string());
        let filters = ArtistFilters::from_params(&p).unwrap();

        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        builder.push(ARTIST_FROM);
        filters.push_predicates(&mut builder);
        let sql = builder.sql();

        assert!(sql.contains("u.first_name ILIKE $1"));
        assert!(sql.contains("a.bio ILIKE $6"));
        assert!(sql.contains("EXISTS (SELECT 1 FROM artist_genres t WHERE t.artist_id = a.id AND t.genre_id = ANY($7))"));
        assert!(sql.contains("AND a.is_available"));
        assert!(sql.contains("a.rating_average >= $8"));
        assert!(!sql.contains("artist_role_assignments"));
    }

    #[test]
    fn test_location_choice_values_use_labels() {
        let mut p = params();
        p.region = Some("extreme-nord".to_string());
        p.city = Some("Kribi".to_string());
        let filters = ArtistFilters::from_params(&p).unwrap();
        assert_eq!(filters.region.as_deref(), Some("Extrême-Nord"));
        assert_eq!(filters.city.as_deref(), Some("Kribi"));
    }

    #[test]
    fn test_filters_serialize_only_what_is_set() {
        let mut p = params();
        p.city = Some("yaounde".to_string());
        let filters = ArtistFilters::from_params(&p).unwrap();
        let value = serde_json::to_value(&filters).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "city": "Yaoundé", "sort_by": "-rating_average" })
        );
    }
}
