use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::graphql::{Query, QueryNode};
use crate::models::ProfileStats;
use crate::util;

/// Login of the authenticated viewer.
pub struct ViewerLogin;

impl ViewerLogin {
    pub fn query() -> Query {
        Query::new().child(QueryNode::new("viewer").field("login"))
    }

    pub fn login(data: &Value) -> Result<&str> {
        data.get("viewer")
            .and_then(|viewer| viewer.get("login"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Parse("viewer.login is missing".to_string()))
    }
}

/// Identity snapshot for one login: name, id, email, account creation.
pub struct UserLogin;

impl UserLogin {
    pub fn query() -> Query {
        Query::new().child(
            QueryNode::new("user")
                .arg("login", "$user")
                .field("login")
                .field("name")
                .field("id")
                .field("email")
                .field("createdAt"),
        )
    }

    pub fn created_at(data: &Value) -> Result<DateTime<Utc>> {
        let created = data
            .get("user")
            .and_then(|user| user.get("createdAt"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Parse("user.createdAt is missing".to_string()))?;
        util::parse_timestamp(created)
    }

    pub fn id(data: &Value) -> Result<&str> {
        data.get("user")
            .and_then(|user| user.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Parse("user.id is missing".to_string()))
    }
}

/// Lifetime totals straight off the profile, one `totalCount` per
/// connection.
pub struct UserProfileStats;

impl UserProfileStats {
    pub fn query() -> Query {
        let mut user = QueryNode::new("user")
            .arg("login", "$user")
            .field("login")
            .field("name")
            .field("email")
            .field("createdAt")
            .field("bio")
            .field("company")
            .field("isBountyHunter")
            .field("isCampusExpert")
            .field("isDeveloperProgramMember")
            .field("isEmployee")
            .field("isGitHubStar")
            .field("isHireable")
            .field("isSiteAdmin");
        for connection in [
            "watching",
            "starredRepositories",
            "following",
            "followers",
            "gists",
            "issues",
            "projects",
            "pullRequests",
            "repositories",
            "repositoryDiscussions",
            "gistComments",
            "issueComments",
            "commitComments",
            "repositoryDiscussionComments",
        ] {
            user = user.child(QueryNode::new(connection).field("totalCount"));
        }
        Query::new().child(user)
    }

    pub fn stats(data: &Value) -> Result<ProfileStats> {
        let user = data
            .get("user")
            .ok_or_else(|| Error::Parse("response has no user field".to_string()))?;
        let text = |key: &str| {
            user.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Ok(ProfileStats {
            login: text("login").unwrap_or_default(),
            name: text("name"),
            email: text("email"),
            company: text("company"),
            created_at: text("createdAt")
                .as_deref()
                .map(util::parse_timestamp)
                .transpose()?,
            followers: total_count(user, "followers"),
            following: total_count(user, "following"),
            watching: total_count(user, "watching"),
            starred_repositories: total_count(user, "starredRepositories"),
            gists: total_count(user, "gists"),
            issues: total_count(user, "issues"),
            projects: total_count(user, "projects"),
            pull_requests: total_count(user, "pullRequests"),
            repositories: total_count(user, "repositories"),
            repository_discussions: total_count(user, "repositoryDiscussions"),
            gist_comments: total_count(user, "gistComments"),
            issue_comments: total_count(user, "issueComments"),
            commit_comments: total_count(user, "commitComments"),
            repository_discussion_comments: total_count(user, "repositoryDiscussionComments"),
        })
    }
}

fn total_count(user: &Value, connection: &str) -> u64 {
    user.get(connection)
        .and_then(|conn| conn.get("totalCount"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}
