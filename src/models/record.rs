use std::collections::BTreeMap;
use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// How a subject's record came to be. Failed subjects keep their identity
/// but carry no numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectStatus {
    Mined,
    DoesNotExist,
    UnknownFailure,
}

/// Additive contribution counters for one user. Windowed queries produce
/// partial counters that are summed across windows; the paginated
/// created-before counts are filled in afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContributionCounters {
    pub restricted: u64,
    pub commits: u64,
    pub issues: u64,
    pub pull_requests: u64,
    pub pull_request_reviews: u64,
    pub repositories: u64,
    pub gists: u64,
    pub repository_discussions: u64,
    pub commit_comments: u64,
    pub issue_comments: u64,
    pub gist_comments: u64,
    pub repository_discussion_comments: u64,
}

impl AddAssign<&ContributionCounters> for ContributionCounters {
    fn add_assign(&mut self, other: &ContributionCounters) {
        self.restricted += other.restricted;
        self.commits += other.commits;
        self.issues += other.issues;
        self.pull_requests += other.pull_requests;
        self.pull_request_reviews += other.pull_request_reviews;
        self.repositories += other.repositories;
        self.gists += other.gists;
        self.repository_discussions += other.repository_discussions;
        self.commit_comments += other.commit_comments;
        self.issue_comments += other.issue_comments;
        self.gist_comments += other.gist_comments;
        self.repository_discussion_comments += other.repository_discussion_comments;
    }
}

/// Running totals for one repository-ownership category, plus the merged
/// per-language byte sizes of everything counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepoCategoryStats {
    pub total_count: u64,
    pub fork_count: u64,
    pub stargazer_count: u64,
    pub watcher_count: u64,
    pub total_size: u64,
    pub languages: BTreeMap<String, u64>,
}

/// Identity and lifetime totals read straight off a user profile, one
/// `totalCount` per connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileStats {
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub followers: u64,
    pub following: u64,
    pub watching: u64,
    pub starred_repositories: u64,
    pub gists: u64,
    pub issues: u64,
    pub projects: u64,
    pub pull_requests: u64,
    pub repositories: u64,
    pub repository_discussions: u64,
    pub gist_comments: u64,
    pub issue_comments: u64,
    pub commit_comments: u64,
    pub repository_discussion_comments: u64,
}

/// One flat output row per mined login. The four category bundles are
/// owner/collaborator crossed with fork/non-fork.
#[derive(Debug, Clone, Serialize)]
pub struct UserMetricsRecord {
    pub login: String,
    pub status: SubjectStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub lifetime_days: Option<i64>,
    pub counters: Option<ContributionCounters>,
    pub owned_original: Option<RepoCategoryStats>,
    pub owned_forks: Option<RepoCategoryStats>,
    pub collaborated_original: Option<RepoCategoryStats>,
    pub collaborated_forks: Option<RepoCategoryStats>,
}

impl UserMetricsRecord {
    /// Placeholder row for a failed subject: identity kept, numbers null.
    pub fn sentinel(login: impl Into<String>, status: SubjectStatus) -> Self {
        Self {
            login: login.into(),
            status,
            created_at: None,
            end_at: None,
            lifetime_days: None,
            counters: None,
            owned_original: None,
            owned_forks: None,
            collaborated_original: None,
            collaborated_forks: None,
        }
    }
}

/// Profile-centric row per mined login: the lifetime totals straight off
/// the profile, plus the windowed counters and category bundles that the
/// profile itself does not expose.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileMetricsRecord {
    pub login: String,
    pub status: SubjectStatus,
    pub end_at: Option<DateTime<Utc>>,
    pub lifetime_days: Option<i64>,
    pub profile: Option<ProfileStats>,
    pub restricted: Option<u64>,
    pub commits: Option<u64>,
    pub pull_request_reviews: Option<u64>,
    pub owned_original: Option<RepoCategoryStats>,
    pub owned_forks: Option<RepoCategoryStats>,
    pub collaborated_original: Option<RepoCategoryStats>,
    pub collaborated_forks: Option<RepoCategoryStats>,
}

impl ProfileMetricsRecord {
    pub fn sentinel(login: impl Into<String>, status: SubjectStatus) -> Self {
        Self {
            login: login.into(),
            status,
            end_at: None,
            lifetime_days: None,
            profile: None,
            restricted: None,
            commits: None,
            pull_request_reviews: None,
            owned_original: None,
            owned_forks: None,
            collaborated_original: None,
            collaborated_forks: None,
        }
    }
}

/// Cumulated non-merge contribution of one user to one repository.
#[derive(Debug, Clone, Serialize)]
pub struct RepoContributionRecord {
    pub repository: String,
    pub login: Option<String>,
    pub status: SubjectStatus,
    pub total_commits: Option<u64>,
    pub total_additions: Option<u64>,
    pub total_deletions: Option<u64>,
}

impl RepoContributionRecord {
    pub fn sentinel(repository: impl Into<String>, status: SubjectStatus) -> Self {
        Self {
            repository: repository.into(),
            login: None,
            status,
            total_commits: None,
            total_additions: None,
            total_deletions: None,
        }
    }
}

/// One non-merge commit by a tracked contributor.
#[derive(Debug, Clone, Serialize)]
pub struct CommitContribution {
    pub repository: String,
    pub login: String,
    pub authored_at: DateTime<Utc>,
    pub changed_files: Option<u64>,
    pub additions: u64,
    pub deletions: u64,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_sum_fieldwise() {
        let mut total = ContributionCounters {
            commits: 10,
            issues: 2,
            ..Default::default()
        };
        let window = ContributionCounters {
            commits: 5,
            pull_requests: 1,
            ..Default::default()
        };
        total += &window;
        assert_eq!(total.commits, 15);
        assert_eq!(total.issues, 2);
        assert_eq!(total.pull_requests, 1);
    }

    #[test]
    fn sentinel_rows_carry_no_numbers() {
        let record = UserMetricsRecord::sentinel("ghost", SubjectStatus::DoesNotExist);
        assert_eq!(record.login, "ghost");
        assert_eq!(record.status, SubjectStatus::DoesNotExist);
        assert!(record.counters.is_none());
        assert!(record.lifetime_days.is_none());
    }
}
