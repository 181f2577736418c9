//! Rating aggregates over an artist's public reviews.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// SQL that rebuilds `review_statistics` from public reviews. `$1` is an
/// artist id, or NULL to rebuild every artist.
pub const REFRESH_STATISTICS_SQL: &str = r#"
    INSERT INTO review_statistics (artist_id, total_reviews, average_rating,
        rating_1_count, rating_2_count, rating_3_count, rating_4_count, rating_5_count,
        last_review_date, updated_at)
    SELECT a.id,
           COUNT(r.id)::INT,
           COALESCE(ROUND(AVG(r.rating)::NUMERIC, 2), 0),
           (COUNT(r.id) FILTER (WHERE r.rating = 1))::INT,
           (COUNT(r.id) FILTER (WHERE r.rating = 2))::INT,
           (COUNT(r.id) FILTER (WHERE r.rating = 3))::INT,
           (COUNT(r.id) FILTER (WHERE r.rating = 4))::INT,
           (COUNT(r.id) FILTER (WHERE r.rating = 5))::INT,
           MAX(r.created_at),
           NOW()
    FROM artist_profiles a
    LEFT JOIN reviews r ON r.artist_id = a.id AND r.is_public
    WHERE $1::UUID IS NULL OR a.id = $1
    GROUP BY a.id
    ON CONFLICT (artist_id) DO UPDATE SET
        total_reviews = EXCLUDED.total_reviews,
        average_rating = EXCLUDED.average_rating,
        rating_1_count = EXCLUDED.rating_1_count,
        rating_2_count = EXCLUDED.rating_2_count,
        rating_3_count = EXCLUDED.rating_3_count,
        rating_4_count = EXCLUDED.rating_4_count,
        rating_5_count = EXCLUDED.rating_5_count,
        last_review_date = EXCLUDED.last_review_date,
        updated_at = NOW()
"#;

/// Copies the public-review average and count onto the artist profile.
pub const REFRESH_ARTIST_RATING_SQL: &str = r#"
    UPDATE artist_profiles a
    SET rating_average = s.average, total_reviews = s.total, updated_at = NOW()
    FROM (
        SELECT COALESCE(ROUND(AVG(rating)::NUMERIC, 2), 0) AS average, COUNT(*)::INT AS total
        FROM reviews
        WHERE artist_id = $1 AND is_public
    ) s
    WHERE a.id = $1
"#;

/// Star counts, average and percentage distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingSummary {
    pub total: i64,
    pub average: Decimal,
    pub counts: BTreeMap<u8, i64>,
    pub distribution: BTreeMap<u8, f64>,
}

impl RatingSummary {
    /// `counts[i]` is the number of `i + 1` star reviews.
    pub fn from_counts(counts: [i64; 5]) -> Self {
        let total: i64 = counts.iter().sum();
        let weighted: i64 = counts
            .iter()
            .enumerate()
            .map(|(i, c)| (i as i64 + 1) * c)
            .sum();

        let average = if total > 0 {
            (Decimal::from(weighted) / Decimal::from(total)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        let stars = (1u8..=5).zip(counts);
        Self {
            total,
            average,
            counts: stars.clone().collect(),
            distribution: stars.map(|(star, c)| (star, percentage(c, total))).collect(),
        }
    }
}

/// Share of `part` in `total`, in percent with one decimal.
pub fn percentage(part: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn test_empty_summary() {
        let summary = RatingSummary::from_counts([0; 5]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.average, Decimal::ZERO);
        assert_eq!(summary.distribution.get(&5), Some(&0.0));
        assert_eq!(summary.counts.len(), 5);
    }

    #[test]
    fn test_average_and_distribution() {
        // two 5s, one 4
        let summary = RatingSummary::from_counts([0, 0, 0, 1, 2]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.average, Decimal::from_str("4.67").unwrap());
        assert_eq!(summary.counts.get(&5), Some(&2));
        assert_eq!(summary.distribution.get(&5), Some(&66.7));
        assert_eq!(summary.distribution.get(&4), Some(&33.3));
        assert_eq!(summary.distribution.get(&1), Some(&0.0));
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 8), 12.5);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(5, 0), 0.0);
    }
}
