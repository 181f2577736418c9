pub mod stats_refresher;

pub use stats_refresher::StatsRefresher;
