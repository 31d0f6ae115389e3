//! Queries against a single repository's default-branch commit history.
//!
//! All three queries page through `repository.defaultBranchRef.target.history`
//! behind an inline `... on Commit` fragment; the fragment does not appear in
//! the response, so the page path is the same for each of them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::graphql::{PaginatedQuery, Query, QueryNode};
use crate::models::CommitContribution;
use crate::util;

/// Wraps a `history` connection in the repository / default-branch /
/// `... on Commit` scaffolding every commit-history query shares.
fn commit_history_query(history: QueryNode) -> Result<PaginatedQuery> {
    let query = Query::new().child(
        QueryNode::new("repository")
            .arg("owner", "$owner")
            .arg("name", "$repo_name")
            .child(QueryNode::new("defaultBranchRef").child(
                QueryNode::new("target").child(QueryNode::new("... on Commit").child(history)),
            )),
    );
    PaginatedQuery::new(query)
}

/// The commit nodes of a single history page, or an empty slice when the
/// repository has no default branch.
pub(crate) fn history_nodes(data: &Value) -> &[Value] {
    data.pointer("/repository/defaultBranchRef/target/history/nodes")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn as_count(value: &Value) -> u64 {
    value.as_u64().unwrap_or(0)
}

/// A commit with two or more parents is a merge and carries the combined
/// diff of the merged branch, so it is excluded from per-author totals.
fn is_merge_commit(node: &Value) -> bool {
    node.pointer("/parents/totalCount")
        .and_then(Value::as_u64)
        .map(|parents| parents >= 2)
        .unwrap_or(false)
}

/// Discovers who authored commits on the default branch.
pub struct RepositoryContributors;

impl RepositoryContributors {
    pub fn query() -> Result<PaginatedQuery> {
        commit_history_query(
            QueryNode::paginated("history")
                .arg("first", "$pg_size")
                .field("totalCount")
                .child(
                    QueryNode::new("nodes").child(
                        QueryNode::new("author")
                            .field("name")
                            .field("email")
                            .child(QueryNode::new("user").field("login")),
                    ),
                )
                .child(super::page_info()),
        )
    }

    pub fn nodes(data: &Value) -> &[Value] {
        history_nodes(data)
    }

    /// Folds one page of commit nodes into the set of contributor logins.
    /// Commits whose author has no associated GitHub account are skipped.
    pub fn collect_logins(nodes: &[Value], logins: &mut BTreeSet<String>) {
        for node in nodes {
            if let Some(login) = node
                .pointer("/author/user/login")
                .and_then(Value::as_str)
            {
                logins.insert(login.to_owned());
            }
        }
    }
}

/// Non-merge commit totals for one author across history pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CumulatedContribution {
    pub total_commits: u64,
    pub total_additions: u64,
    pub total_deletions: u64,
}

/// Commit history filtered to a single author, for per-contributor totals
/// and the individual commit rows behind them.
pub struct RepositoryContributorsContribution;

impl RepositoryContributorsContribution {
    pub fn query() -> Result<PaginatedQuery> {
        commit_history_query(
            QueryNode::paginated("history")
                .arg("author", "$id")
                .arg("first", "$pg_size")
                .field("totalCount")
                .child(
                    QueryNode::new("nodes")
                        .field("authoredDate")
                        .field("changedFilesIfAvailable")
                        .field("additions")
                        .field("deletions")
                        .field("message")
                        .child(QueryNode::new("parents").arg("first", 2).field("totalCount")),
                )
                .child(super::page_info()),
        )
    }

    pub fn nodes(data: &Value) -> &[Value] {
        history_nodes(data)
    }

    pub fn cumulate(nodes: &[Value], totals: &mut CumulatedContribution) {
        for node in nodes {
            if is_merge_commit(node) {
                continue;
            }
            totals.total_commits += 1;
            totals.total_additions += node.get("additions").map(as_count).unwrap_or(0);
            totals.total_deletions += node.get("deletions").map(as_count).unwrap_or(0);
        }
    }

    /// Expands one page into per-commit rows, again skipping merges. Commits
    /// whose authored date does not parse are dropped rather than invented.
    pub fn commit_details(
        nodes: &[Value],
        repository: &str,
        login: &str,
        out: &mut Vec<CommitContribution>,
    ) {
        for node in nodes {
            if is_merge_commit(node) {
                continue;
            }
            let authored_at = node
                .get("authoredDate")
                .and_then(Value::as_str)
                .and_then(|s| util::parse_timestamp(s).ok());
            let authored_at = match authored_at {
                Some(t) => t,
                None => continue,
            };
            out.push(CommitContribution {
                repository: repository.to_owned(),
                login: login.to_owned(),
                authored_at,
                changed_files: node.get("changedFilesIfAvailable").and_then(Value::as_u64),
                additions: node.get("additions").map(as_count).unwrap_or(0),
                deletions: node.get("deletions").map(as_count).unwrap_or(0),
                message: node
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
            });
        }
    }
}

/// Totals of one author's non-merge commits, keyed by login where the
/// commit has one and by the raw author name otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthorCommitTotals {
    pub total_commits: u64,
    pub total_additions: u64,
    pub total_deletions: u64,
    pub total_files: u64,
}

/// Full commit history of the default branch with author attribution.
pub struct RepositoryCommits;

impl RepositoryCommits {
    pub fn query() -> Result<PaginatedQuery> {
        commit_history_query(
            QueryNode::paginated("history")
                .arg("first", "$pg_size")
                .field("totalCount")
                .child(
                    QueryNode::new("nodes")
                        .field("authoredDate")
                        .field("changedFilesIfAvailable")
                        .field("additions")
                        .field("deletions")
                        .field("message")
                        .child(QueryNode::new("parents").arg("first", 2).field("totalCount"))
                        .child(
                            QueryNode::new("author")
                                .field("name")
                                .field("email")
                                .child(QueryNode::new("user").field("login")),
                        ),
                )
                .child(super::page_info()),
        )
    }

    pub fn nodes(data: &Value) -> &[Value] {
        history_nodes(data)
    }

    pub fn accumulate(
        nodes: &[Value],
        totals: &mut std::collections::BTreeMap<String, AuthorCommitTotals>,
    ) {
        for node in nodes {
            if is_merge_commit(node) {
                continue;
            }
            let key = node
                .pointer("/author/user/login")
                .and_then(Value::as_str)
                .or_else(|| node.pointer("/author/name").and_then(Value::as_str));
            let key = match key {
                Some(k) => k.to_owned(),
                None => continue,
            };
            let entry = totals.entry(key).or_default();
            entry.total_commits += 1;
            entry.total_additions += node.get("additions").map(as_count).unwrap_or(0);
            entry.total_deletions += node.get("deletions").map(as_count).unwrap_or(0);
            entry.total_files += node
                .get("changedFilesIfAvailable")
                .and_then(Value::as_u64)
                .unwrap_or(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::Substitutions;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn history_page(nodes: Value) -> Value {
        json!({
            "repository": {
                "defaultBranchRef": {
                    "target": {
                        "history": {
                            "totalCount": 3,
                            "nodes": nodes,
                            "pageInfo": {"endCursor": "abc", "hasNextPage": false}
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn contributors_query_renders_through_the_fragment() {
        let query = RepositoryContributors::query().unwrap();
        assert_eq!(
            query.path(),
            ["repository", "defaultBranchRef", "target", "history"]
        );
        let rendered = query.render();
        assert!(rendered.contains("... on Commit { history(first: $pg_size)"));
        assert!(rendered.contains("author { name email user { login } }"));
    }

    #[test]
    fn contribution_query_binds_author_id_as_object() {
        let query = RepositoryContributorsContribution::query().unwrap();
        let subs = Substitutions::new()
            .bind("owner", "octocat")
            .bind("repo_name", "hello-world")
            .bind("id", crate::graphql::SubValue::object(vec![("id", "MDQ6VXNlcjE=")]))
            .bind("pg_size", 100);
        let text = query.substitute(&subs).unwrap();
        assert!(text.contains(r#"repository(owner: "octocat", name: "hello-world")"#));
        assert!(text.contains(r#"history(author: {id: "MDQ6VXNlcjE="}, first: 100)"#));
        assert!(text.contains("parents(first: 2) { totalCount }"));
    }

    #[test]
    fn collects_logins_and_skips_accountless_authors() {
        let page = history_page(json!([
            {"author": {"name": "Alice", "email": "a@x", "user": {"login": "alice"}}},
            {"author": {"name": "Bot", "email": "b@x", "user": null}},
            {"author": {"name": "Alice", "email": "a@x", "user": {"login": "alice"}}}
        ]));
        let mut logins = BTreeSet::new();
        RepositoryContributors::collect_logins(RepositoryContributors::nodes(&page), &mut logins);
        assert_eq!(logins.into_iter().collect::<Vec<_>>(), ["alice"]);
    }

    #[test]
    fn cumulate_excludes_merge_commits() {
        let page = history_page(json!([
            {"additions": 10, "deletions": 2, "parents": {"totalCount": 1}},
            {"additions": 500, "deletions": 500, "parents": {"totalCount": 2}},
            {"additions": 3, "deletions": 1, "parents": {"totalCount": 1}}
        ]));
        let mut totals = CumulatedContribution::default();
        RepositoryContributorsContribution::cumulate(
            RepositoryContributorsContribution::nodes(&page),
            &mut totals,
        );
        assert_eq!(
            totals,
            CumulatedContribution {
                total_commits: 2,
                total_additions: 13,
                total_deletions: 3,
            }
        );
    }

    #[test]
    fn commit_details_carry_repo_and_login_context() {
        let page = history_page(json!([
            {
                "authoredDate": "2023-04-01T12:00:00Z",
                "changedFilesIfAvailable": 4,
                "additions": 10,
                "deletions": 2,
                "message": "fix parser",
                "parents": {"totalCount": 1}
            },
            {
                "authoredDate": "2023-04-02T12:00:00Z",
                "changedFilesIfAvailable": 40,
                "additions": 100,
                "deletions": 20,
                "message": "merge branch",
                "parents": {"totalCount": 2}
            }
        ]));
        let mut out = Vec::new();
        RepositoryContributorsContribution::commit_details(
            RepositoryContributorsContribution::nodes(&page),
            "hello-world",
            "alice",
            &mut out,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].repository, "hello-world");
        assert_eq!(out[0].login, "alice");
        assert_eq!(out[0].changed_files, Some(4));
        assert_eq!(out[0].message, "fix parser");
    }

    #[test]
    fn commit_totals_fall_back_to_author_name() {
        let page = history_page(json!([
            {
                "additions": 1, "deletions": 1, "changedFilesIfAvailable": 1,
                "parents": {"totalCount": 1},
                "author": {"name": "Alice", "user": {"login": "alice"}}
            },
            {
                "additions": 2, "deletions": 0, "changedFilesIfAvailable": 1,
                "parents": {"totalCount": 1},
                "author": {"name": "Build Bot", "user": null}
            },
            {
                "additions": 5, "deletions": 5, "changedFilesIfAvailable": 2,
                "parents": {"totalCount": 1},
                "author": {"name": "Alice", "user": {"login": "alice"}}
            }
        ]));
        let mut totals = BTreeMap::new();
        RepositoryCommits::accumulate(RepositoryCommits::nodes(&page), &mut totals);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals["alice"].total_commits, 2);
        assert_eq!(totals["alice"].total_additions, 6);
        assert_eq!(totals["Build Bot"].total_commits, 1);
    }

    #[test]
    fn missing_default_branch_yields_no_nodes() {
        let data = json!({"repository": {"defaultBranchRef": null}});
        assert!(history_nodes(&data).is_empty());
    }
}
