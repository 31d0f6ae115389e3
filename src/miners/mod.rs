//! Batch drivers that turn catalog queries into flat output records. A
//! failed subject never aborts the batch; it leaves a sentinel row and its
//! identifier in the miner's exception list.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::graphql::{Client, SubValue, Substitutions};
use crate::models::{ContributionCounters, RepoCategoryStats};
use crate::queries::contributions::{UserContributionsCollection, UserRepositories};
use crate::util;

pub mod profile_metrics;
pub mod repo_contributions;
pub mod user_metrics;

pub use profile_metrics::ProfileMetricsMiner;
pub use repo_contributions::RepositoryContributionsMiner;
pub use user_metrics::UserMetricsMiner;

pub(crate) const DEFAULT_PAGE_SIZE: i64 = 100;

/// The contributionsCollection connection caps its window at one year, so
/// longer spans are mined in year-sized slices and summed.
const WINDOW_DAYS: i64 = 365;

/// Sums contributionsCollection counters across year-sized windows.
pub(crate) async fn windowed_counters(
    client: &Client,
    login: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<ContributionCounters> {
    let mut counters = ContributionCounters::default();
    let query = UserContributionsCollection::query();
    let mut window_start = start;
    while window_start < end {
        let window_end = util::add_days(window_start, WINDOW_DAYS).min(end);
        let subs = Substitutions::new()
            .bind("user", login)
            .bind("start", window_start)
            .bind("end", window_end);
        let data = client.execute(&query, &subs).await?;
        counters += &UserContributionsCollection::counters(&data);
        window_start = window_end;
    }
    Ok(counters)
}

/// Accumulates one of the four repository category bundles, keeping only
/// repositories created before the end of the span.
pub(crate) async fn repository_category(
    client: &Client,
    page_size: i64,
    login: &str,
    is_fork: bool,
    ownership: &str,
    end: DateTime<Utc>,
) -> Result<RepoCategoryStats> {
    let mut query = UserRepositories::query()?;
    let subs = Substitutions::new()
        .bind("user", login)
        .bind("pg_size", page_size)
        .bind("is_fork", is_fork)
        .bind("ownership", ownership)
        .bind(
            "order_by",
            SubValue::object(vec![("field", "CREATED_AT"), ("direction", "ASC")]),
        );
    let mut stream = client.execute_paginated(&mut query, subs);
    let mut stats = RepoCategoryStats::default();
    let filter = util::CreatedFilter::Before(end);
    while let Some(page) = stream.next_page().await? {
        UserRepositories::cumulated_repository_stats(
            UserRepositories::nodes(&page),
            &mut stats,
            &filter,
        );
    }
    Ok(stats)
}
