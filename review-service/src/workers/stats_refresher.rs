use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use crate::services::review_service::ReviewService;

/// Periodically rebuilds `review_statistics` for every artist.
pub struct StatsRefresher {
    review_service: Arc<ReviewService>,
    interval_seconds: u64,
}

impl StatsRefresher {
    pub fn new(review_service: Arc<ReviewService>, interval_seconds: u64) -> Self {
        Self {
            review_service,
            interval_seconds: interval_seconds.max(60),
        }
    }

    pub async fn run(&self) {
        info!(
            "Starting statistics refresher (every {}s)...",
            self.interval_seconds
        );
        let mut ticker = interval(Duration::from_secs(self.interval_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.review_service.refresh_all_statistics().await {
                Ok(updated) => info!("Review statistics refreshed for {} artists", updated),
                Err(e) => error!("Error refreshing review statistics: {}", e),
            }
        }
    }
}
