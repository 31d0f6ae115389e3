//! Declarative catalog of concrete query shapes: each one is a static
//! instantiation of the generic query tree against the GitHub schema, with
//! extraction helpers for the miners.

pub mod comments;
pub mod contributions;
pub mod cost;
pub mod profile;
pub mod repositories;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::graphql::{PaginatedQuery, Query, QueryNode};
use crate::util;

pub(crate) fn page_info() -> QueryNode {
    QueryNode::new("pageInfo").field("endCursor").field("hasNextPage")
}

/// The shape shared by every per-user created-at collection: a paginated
/// connection under `user` whose nodes carry only `createdAt`.
pub(crate) fn user_created_connection(connection: &str) -> Result<PaginatedQuery> {
    let query = Query::new().child(
        QueryNode::new("user").arg("login", "$user").field("login").child(
            QueryNode::paginated(connection)
                .arg("first", "$pg_size")
                .field("totalCount")
                .child(QueryNode::new("nodes").field("createdAt"))
                .child(page_info()),
        ),
    );
    PaginatedQuery::new(query)
}

pub(crate) fn user_connection_nodes<'a>(data: &'a Value, connection: &str) -> &'a [Value] {
    data.get("user")
        .and_then(|user| user.get(connection))
        .and_then(|conn| conn.get("nodes"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Counts nodes created before the cutoff, stopping at the first node that
/// is not. Correct while the remote returns newest first; if the API's
/// default ordering ever changes this undercounts silently.
pub(crate) fn count_created_before(nodes: &[Value], cutoff: DateTime<Utc>) -> u64 {
    let mut count = 0;
    for node in nodes {
        let created = node
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(|s| util::parse_timestamp(s).ok());
        match created {
            Some(t) if util::created_before(t, cutoff) => count += 1,
            _ => break,
        }
    }
    count
}
