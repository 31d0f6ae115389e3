//! Per-contributor commit totals for a repository's default branch.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::graphql::{Client, SubValue, Substitutions};
use crate::models::{CommitContribution, RepoContributionRecord, SubjectStatus};
use crate::queries::profile::UserLogin;
use crate::queries::repositories::{
    CumulatedContribution, RepositoryContributors, RepositoryContributorsContribution,
};
use crate::util;

use super::DEFAULT_PAGE_SIZE;

pub struct RepositoryContributionsMiner<'a> {
    client: &'a Client,
    page_size: i64,
    pub cumulated: Vec<RepoContributionRecord>,
    pub commits: Vec<CommitContribution>,
    pub exceptions: Vec<String>,
}

impl<'a> RepositoryContributionsMiner<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
            cumulated: Vec::new(),
            commits: Vec::new(),
            exceptions: Vec::new(),
        }
    }

    pub fn page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Mines one repository link and records the outcome. Failures leave a
    /// sentinel row keyed by the link so the batch output stays aligned
    /// with its input.
    pub async fn run(&mut self, link: &str) {
        if let Err(e) = self.mine(link).await {
            let status = if e.is_query_failure() {
                SubjectStatus::DoesNotExist
            } else {
                SubjectStatus::UnknownFailure
            };
            tracing::warn!(link, error = %e, "mining failed, keeping sentinel row");
            self.cumulated
                .push(RepoContributionRecord::sentinel(link, status));
            self.exceptions.push(link.to_owned());
        }
    }

    async fn mine(&mut self, link: &str) -> Result<()> {
        let client = self.client;
        let (owner, name) = util::owner_and_name(link)?;

        let logins = self.discover_contributors(&owner, &name).await?;
        tracing::info!(repository = %name, contributors = logins.len(), "contributors discovered");

        // Commit history filters by node id, not login, so each contributor
        // gets resolved before the per-author pass.
        let mut ids = Vec::with_capacity(logins.len());
        for login in logins {
            let data = client
                .execute(
                    &UserLogin::query(),
                    &Substitutions::new().bind("user", login.as_str()),
                )
                .await?;
            let id = UserLogin::id(&data)?.to_owned();
            ids.push((login, id));
        }

        for (login, id) in ids {
            tracing::debug!(%login, "mining contributions");
            let mut query = RepositoryContributorsContribution::query()?;
            let subs = Substitutions::new()
                .bind("owner", owner.as_str())
                .bind("repo_name", name.as_str())
                .bind("id", SubValue::object(vec![("id", id.as_str())]))
                .bind("pg_size", self.page_size);
            let mut totals = CumulatedContribution::default();
            let mut stream = client.execute_paginated(&mut query, subs);
            while let Some(page) = stream.next_page().await? {
                let nodes = RepositoryContributorsContribution::nodes(&page);
                RepositoryContributorsContribution::cumulate(nodes, &mut totals);
                RepositoryContributorsContribution::commit_details(
                    nodes,
                    &name,
                    &login,
                    &mut self.commits,
                );
            }
            self.cumulated.push(RepoContributionRecord {
                repository: name.clone(),
                login: Some(login),
                status: SubjectStatus::Mined,
                total_commits: Some(totals.total_commits),
                total_additions: Some(totals.total_additions),
                total_deletions: Some(totals.total_deletions),
            });
        }
        Ok(())
    }

    async fn discover_contributors(&self, owner: &str, name: &str) -> Result<BTreeSet<String>> {
        let mut query = RepositoryContributors::query()?;
        let subs = Substitutions::new()
            .bind("owner", owner)
            .bind("repo_name", name)
            .bind("pg_size", self.page_size);
        let mut stream = self.client.execute_paginated(&mut query, subs);
        let mut logins = BTreeSet::new();
        while let Some(page) = stream.next_page().await? {
            RepositoryContributors::collect_logins(RepositoryContributors::nodes(&page), &mut logins);
        }
        Ok(logins)
    }
}
