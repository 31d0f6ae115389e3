//! Profile-centric metrics for one login: the lifetime totals read straight
//! off the profile, enriched with the windowed counters and repository
//! category bundles the profile itself does not expose.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::graphql::{Client, Substitutions};
use crate::models::{ProfileMetricsRecord, SubjectStatus};
use crate::queries::profile::UserProfileStats;

use super::DEFAULT_PAGE_SIZE;

pub struct ProfileMetricsMiner<'a> {
    client: &'a Client,
    page_size: i64,
    pub records: Vec<ProfileMetricsRecord>,
    pub exceptions: Vec<String>,
}

impl<'a> ProfileMetricsMiner<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
            records: Vec::new(),
            exceptions: Vec::new(),
        }
    }

    pub fn page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Mines one login and records the outcome. Failed subjects keep a
    /// sentinel row so the batch output stays aligned with its input.
    pub async fn run(&mut self, login: &str, end: Option<DateTime<Utc>>) {
        match self.mine(login, end).await {
            Ok(record) => self.records.push(record),
            Err(e) => {
                let status = if e.is_query_failure() {
                    SubjectStatus::DoesNotExist
                } else {
                    SubjectStatus::UnknownFailure
                };
                tracing::warn!(login, error = %e, "mining failed, keeping sentinel row");
                self.records
                    .push(ProfileMetricsRecord::sentinel(login, status));
                self.exceptions.push(login.to_owned());
            }
        }
    }

    async fn mine(
        &self,
        login: &str,
        end: Option<DateTime<Utc>>,
    ) -> Result<ProfileMetricsRecord> {
        let data = self
            .client
            .execute(
                &UserProfileStats::query(),
                &Substitutions::new().bind("user", login),
            )
            .await?;
        let profile = UserProfileStats::stats(&data)?;
        let start = profile
            .created_at
            .ok_or_else(|| Error::Parse("user.createdAt is missing".to_string()))?;
        let end = end.unwrap_or_else(Utc::now);

        let counters = super::windowed_counters(self.client, login, start, end).await?;

        let owned_original =
            super::repository_category(self.client, self.page_size, login, false, "OWNER", end)
                .await?;
        let owned_forks =
            super::repository_category(self.client, self.page_size, login, true, "OWNER", end)
                .await?;
        let collaborated_original = super::repository_category(
            self.client,
            self.page_size,
            login,
            false,
            "COLLABORATOR",
            end,
        )
        .await?;
        let collaborated_forks = super::repository_category(
            self.client,
            self.page_size,
            login,
            true,
            "COLLABORATOR",
            end,
        )
        .await?;

        Ok(ProfileMetricsRecord {
            login: login.to_owned(),
            status: SubjectStatus::Mined,
            end_at: Some(end),
            lifetime_days: Some((end - start).num_days()),
            profile: Some(profile),
            restricted: Some(counters.restricted),
            commits: Some(counters.commits),
            pull_request_reviews: Some(counters.pull_request_reviews),
            owned_original: Some(owned_original),
            owned_forks: Some(owned_forks),
            collaborated_original: Some(collaborated_original),
            collaborated_forks: Some(collaborated_forks),
        })
    }
}
