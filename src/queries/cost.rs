use crate::graphql::{Query, QueryNode};

/// Wraps an arbitrary query body in a dry-run `rateLimit` sibling selection
/// so the remote reports what the body would cost without running it.
pub struct QueryCost;

impl QueryCost {
    pub fn query(body: &str) -> Query {
        Query::new().field(body).child(
            QueryNode::new("rateLimit")
                .arg("dryRun", "$dryrun")
                .field("cost")
                .field("remaining")
                .field("resetAt"),
        )
    }
}

/// Standalone quota probe with the full rate-limit field set.
pub struct RateLimitQuery;

impl RateLimitQuery {
    pub fn query() -> Query {
        Query::new().child(
            QueryNode::new("rateLimit")
                .arg("dryRun", "$dryrun")
                .field("cost")
                .field("limit")
                .field("remaining")
                .field("resetAt")
                .field("used"),
        )
    }
}
