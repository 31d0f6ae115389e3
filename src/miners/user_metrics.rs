//! Per-user activity metrics over an optional time span.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::graphql::{Client, PaginatedQuery, Substitutions};
use crate::models::{SubjectStatus, UserMetricsRecord};
use crate::queries::comments::{
    UserCommitComments, UserGistComments, UserIssueComments, UserRepositoryDiscussionComments,
};
use crate::queries::contributions::{UserGists, UserRepositoryDiscussions};
use crate::queries::profile::UserLogin;

use super::DEFAULT_PAGE_SIZE;

pub struct UserMetricsMiner<'a> {
    client: &'a Client,
    page_size: i64,
    pub records: Vec<UserMetricsRecord>,
    pub exceptions: Vec<String>,
}

impl<'a> UserMetricsMiner<'a> {
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

    /// Mines one login and records the outcome. A query-level failure means
    /// the account is gone or inaccessible; anything else is an unexpected
    /// failure. Both leave a sentinel row so the batch output stays aligned
    /// with its input.
    pub async fn run(
        &mut self,
        login: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) {
        match self.mine(login, start, end).await {
            Ok(record) => self.records.push(record),
            Err(e) => {
                let status = if e.is_query_failure() {
                    SubjectStatus::DoesNotExist
                } else {
                    SubjectStatus::UnknownFailure
                };
                tracing::warn!(login, error = %e, "mining failed, keeping sentinel row");
                self.records.push(UserMetricsRecord::sentinel(login, status));
                self.exceptions.push(login.to_owned());
            }
        }
    }

    async fn mine(
        &self,
        login: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<UserMetricsRecord> {
        let start = match start {
            Some(t) => t,
            None => {
                let data = self
                    .client
                    .execute(
                        &UserLogin::query(),
                        &Substitutions::new().bind("user", login),
                    )
                    .await?;
                UserLogin::created_at(&data)?
            }
        };
        let end = end.unwrap_or_else(Utc::now);

        let mut counters = super::windowed_counters(self.client, login, start, end).await?;

        counters.gists = self
            .count_connection(UserGists::query()?, UserGists::nodes, login, end)
            .await?;
        counters.repository_discussions = self
            .count_connection(
                UserRepositoryDiscussions::query()?,
                UserRepositoryDiscussions::nodes,
                login,
                end,
            )
            .await?;
        counters.commit_comments = self
            .count_connection(UserCommitComments::query()?, UserCommitComments::nodes, login, end)
            .await?;
        counters.issue_comments = self
            .count_connection(UserIssueComments::query()?, UserIssueComments::nodes, login, end)
            .await?;
        counters.gist_comments = self
            .count_connection(UserGistComments::query()?, UserGistComments::nodes, login, end)
            .await?;
        counters.repository_discussion_comments = self
            .count_connection(
                UserRepositoryDiscussionComments::query()?,
                UserRepositoryDiscussionComments::nodes,
                login,
                end,
            )
            .await?;

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

        Ok(UserMetricsRecord {
            login: login.to_owned(),
            status: SubjectStatus::Mined,
            created_at: Some(start),
            end_at: Some(end),
            lifetime_days: Some((end - start).num_days()),
            counters: Some(counters),
            owned_original: Some(owned_original),
            owned_forks: Some(owned_forks),
            collaborated_original: Some(collaborated_original),
            collaborated_forks: Some(collaborated_forks),
        })
    }

    /// Pages through a created-at connection and counts nodes created before
    /// the end of the span.
    async fn count_connection(
        &self,
        mut query: PaginatedQuery,
        nodes: for<'v> fn(&'v Value) -> &'v [Value],
        login: &str,
        end: DateTime<Utc>,
    ) -> Result<u64> {
        let subs = Substitutions::new()
            .bind("user", login)
            .bind("pg_size", self.page_size);
        let mut stream = self.client.execute_paginated(&mut query, subs);
        let mut total = 0;
        while let Some(page) = stream.next_page().await? {
            total += crate::queries::count_created_before(nodes(&page), end);
        }
        Ok(total)
    }
}
