//! Per-user comment collections. All four share the created-at connection
//! shape; only the connection name differs.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::graphql::PaginatedQuery;

macro_rules! comment_collection {
    ($name:ident, $connection:literal) => {
        pub struct $name;

        impl $name {
            pub fn query() -> Result<PaginatedQuery> {
                super::user_created_connection($connection)
            }

            pub fn nodes<'a>(data: &'a Value) -> &'a [Value] {
                super::user_connection_nodes(data, $connection)
            }

            pub fn created_before(nodes: &[Value], cutoff: DateTime<Utc>) -> u64 {
                super::count_created_before(nodes, cutoff)
            }
        }
    };
}

comment_collection!(UserCommitComments, "commitComments");
comment_collection!(UserGistComments, "gistComments");
comment_collection!(UserIssueComments, "issueComments");
comment_collection!(UserRepositoryDiscussionComments, "repositoryDiscussionComments");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util;
    use serde_json::json;

    #[test]
    fn issue_comments_shape() {
        let query = UserIssueComments::query().unwrap();
        assert_eq!(query.path(), ["user", "issueComments"]);
        assert!(query.render().contains("issueComments(first: $pg_size)"));
    }

    #[test]
    fn counts_comments_before_cutoff() {
        let data = json!({
            "user": {
                "commitComments": {
                    "totalCount": 2,
                    "nodes": [
                        {"createdAt": "2020-06-01T00:00:00Z"},
                        {"createdAt": "2021-06-01T00:00:00Z"}
                    ],
                    "pageInfo": {"endCursor": null, "hasNextPage": false}
                }
            }
        });
        let cutoff = util::parse_timestamp("2021-01-01T00:00:00Z").unwrap();
        let nodes = UserCommitComments::nodes(&data);
        assert_eq!(UserCommitComments::created_before(nodes, cutoff), 1);
    }
}
