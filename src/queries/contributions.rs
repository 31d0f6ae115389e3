use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::graphql::{ArgValue, PaginatedQuery, Query, QueryNode};
use crate::models::{ContributionCounters, RepoCategoryStats};
use crate::util::{self, CreatedFilter};

/// Contribution totals for one time window. Windows are capped by the
/// remote at roughly a year, so callers step through longer spans.
pub struct UserContributionsCollection;

impl UserContributionsCollection {
    pub fn query() -> Query {
        Query::new().child(
            QueryNode::new("user").arg("login", "$user").child(
                QueryNode::new("contributionsCollection")
                    .arg("from", "$start")
                    .arg("to", "$end")
                    .field("startedAt")
                    .field("endedAt")
                    .field("restrictedContributionsCount")
                    .field("totalCommitContributions")
                    .field("totalIssueContributions")
                    .field("totalPullRequestContributions")
                    .field("totalPullRequestReviewContributions")
                    .field("totalRepositoryContributions"),
            ),
        )
    }

    /// Partial counters for one window; summed across windows by the miner.
    pub fn counters(data: &Value) -> ContributionCounters {
        let collection = &data["user"]["contributionsCollection"];
        let count = |key: &str| collection.get(key).and_then(Value::as_u64).unwrap_or(0);
        ContributionCounters {
            restricted: count("restrictedContributionsCount"),
            commits: count("totalCommitContributions"),
            issues: count("totalIssueContributions"),
            pull_requests: count("totalPullRequestContributions"),
            pull_request_reviews: count("totalPullRequestReviewContributions"),
            repositories: count("totalRepositoryContributions"),
            ..Default::default()
        }
    }
}

/// A user's repositories with language statistics, filtered server-side by
/// fork status and ownership affiliation.
pub struct UserRepositories;

impl UserRepositories {
    pub fn query() -> Result<PaginatedQuery> {
        let query = Query::new().child(
            QueryNode::new("user").arg("login", "$user").child(
                QueryNode::paginated("repositories")
                    .arg("first", "$pg_size")
                    .arg("isFork", "$is_fork")
                    .arg("ownerAffiliations", "$ownership")
                    .arg("orderBy", "$order_by")
                    .field("totalCount")
                    .child(
                        QueryNode::new("nodes")
                            .field("name")
                            .field("isEmpty")
                            .field("createdAt")
                            .field("updatedAt")
                            .field("forkCount")
                            .field("stargazerCount")
                            .child(QueryNode::new("watchers").field("totalCount"))
                            .child(QueryNode::new("primaryLanguage").field("name"))
                            .child(
                                QueryNode::new("languages")
                                    .arg("first", 100)
                                    .arg(
                                        "orderBy",
                                        ArgValue::object(vec![
                                            ("field", "SIZE".into()),
                                            ("direction", "DESC".into()),
                                        ]),
                                    )
                                    .field("totalSize")
                                    .child(
                                        QueryNode::new("edges")
                                            .field("size")
                                            .child(QueryNode::new("node").field("name")),
                                    ),
                            ),
                    )
                    .child(super::page_info()),
            ),
        );
        PaginatedQuery::new(query)
    }

    pub fn nodes<'a>(data: &'a Value) -> &'a [Value] {
        super::user_connection_nodes(data, "repositories")
    }

    /// Folds one page of repositories into a category's running totals.
    /// Repositories outside the creation-time filter or with no language
    /// bytes at all are skipped; language sizes merge by summing.
    pub fn cumulated_repository_stats(
        repos: &[Value],
        stats: &mut RepoCategoryStats,
        filter: &CreatedFilter,
    ) {
        for repo in repos {
            let created = repo
                .get("createdAt")
                .and_then(Value::as_str)
                .and_then(|s| util::parse_timestamp(s).ok());
            let Some(created) = created else {
                continue;
            };
            if !filter.matches(created) {
                continue;
            }

            let languages = &repo["languages"];
            let total_size = languages
                .get("totalSize")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            if total_size == 0 {
                continue;
            }

            let count = |key: &str| repo.get(key).and_then(Value::as_u64).unwrap_or(0);
            stats.total_count += 1;
            stats.fork_count += count("forkCount");
            stats.stargazer_count += count("stargazerCount");
            stats.watcher_count += repo
                .get("watchers")
                .and_then(|w| w.get("totalCount"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            stats.total_size += total_size;

            if let Some(edges) = languages.get("edges").and_then(Value::as_array) {
                for edge in edges {
                    let Some(name) = edge
                        .get("node")
                        .and_then(|node| node.get("name"))
                        .and_then(Value::as_str)
                    else {
                        continue;
                    };
                    let size = edge.get("size").and_then(Value::as_u64).unwrap_or(0);
                    *stats.languages.entry(name.to_string()).or_insert(0) += size;
                }
            }
        }
    }
}

pub struct UserGists;

impl UserGists {
    pub fn query() -> Result<PaginatedQuery> {
        super::user_created_connection("gists")
    }

    pub fn nodes<'a>(data: &'a Value) -> &'a [Value] {
        super::user_connection_nodes(data, "gists")
    }

    pub fn created_before(nodes: &[Value], cutoff: DateTime<Utc>) -> u64 {
        super::count_created_before(nodes, cutoff)
    }
}

pub struct UserIssues;

impl UserIssues {
    pub fn query() -> Result<PaginatedQuery> {
        super::user_created_connection("issues")
    }

    pub fn nodes<'a>(data: &'a Value) -> &'a [Value] {
        super::user_connection_nodes(data, "issues")
    }

    pub fn created_before(nodes: &[Value], cutoff: DateTime<Utc>) -> u64 {
        super::count_created_before(nodes, cutoff)
    }
}

pub struct UserPullRequests;

impl UserPullRequests {
    pub fn query() -> Result<PaginatedQuery> {
        super::user_created_connection("pullRequests")
    }

    pub fn nodes<'a>(data: &'a Value) -> &'a [Value] {
        super::user_connection_nodes(data, "pullRequests")
    }

    pub fn created_before(nodes: &[Value], cutoff: DateTime<Utc>) -> u64 {
        super::count_created_before(nodes, cutoff)
    }
}

pub struct UserRepositoryDiscussions;

impl UserRepositoryDiscussions {
    pub fn query() -> Result<PaginatedQuery> {
        super::user_created_connection("repositoryDiscussions")
    }

    pub fn nodes<'a>(data: &'a Value) -> &'a [Value] {
        super::user_connection_nodes(data, "repositoryDiscussions")
    }

    pub fn created_before(nodes: &[Value], cutoff: DateTime<Utc>) -> u64 {
        super::count_created_before(nodes, cutoff)
    }
}
