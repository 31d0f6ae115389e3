use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::graphql::query::{ArgValue, Query, QueryNode, Selection, Substitutions};

/// Cursor state machine: `HasNext` initially, then whatever the remote
/// `pageInfo.hasNextPage` reports, with `Exhausted` terminal. `Unknown` is
/// the deliberate third state produced by `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Unknown,
    HasNext,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginator {
    state: PageState,
}

impl Paginator {
    pub(crate) fn new() -> Self {
        Self {
            state: PageState::HasNext,
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn has_next(&self) -> bool {
        self.state == PageState::HasNext
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new()
    }
}

/// A query whose tree contains exactly one cursor-paginated connection.
/// Construction locates the `pageInfo`-bearing node up front; the stored
/// path is later used to walk each response for cursor updates.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedQuery {
    query: Query,
    path: Vec<String>,
    node_loc: Vec<usize>,
}

impl PaginatedQuery {
    pub fn new(query: Query) -> Result<Self> {
        let (path, node_loc) = locate_page_info(&query)?;
        Ok(Self {
            query,
            path,
            node_loc,
        })
    }

    /// Field names from the response root to the paginated connection,
    /// inclusive. Inline fragments do not appear: they have no counterpart
    /// in the response JSON.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn render(&self) -> String {
        self.query.render()
    }

    pub fn substitute(&self, subs: &Substitutions) -> Result<String> {
        self.query.substitute(subs)
    }

    pub fn has_next(&self) -> bool {
        self.paginated_node().paginator().map_or(false, Paginator::has_next)
    }

    pub fn state(&self) -> PageState {
        self.paginated_node()
            .paginator()
            .map_or(PageState::Unknown, Paginator::state)
    }

    /// Feeds one page's `pageInfo` back into the state machine. Called
    /// exactly once per fetched page. An absent cursor becomes an explicit
    /// empty string, which the remote accepts as "no cursor".
    pub fn update(&mut self, has_next_page: bool, end_cursor: Option<&str>) {
        let loc = self.node_loc.clone();
        let node = node_at_mut(self.query.root_mut(), &loc);
        let value = ArgValue::Str(format!("\"{}\"", end_cursor.unwrap_or("")));
        if let Some(entry) = node.args.iter_mut().find(|(key, _)| key == "after") {
            entry.1 = value;
        } else {
            node.args.push(("after".to_string(), value));
        }
        if let Some(paginator) = node.paginator.as_mut() {
            paginator.state = if has_next_page {
                PageState::HasNext
            } else {
                PageState::Exhausted
            };
        }
    }

    /// Drops the cursor argument and moves the state machine to `Unknown`,
    /// not back to `HasNext`.
    pub fn reset(&mut self) {
        let loc = self.node_loc.clone();
        let node = node_at_mut(self.query.root_mut(), &loc);
        node.args.retain(|(key, _)| key != "after");
        if let Some(paginator) = node.paginator.as_mut() {
            paginator.state = PageState::Unknown;
        }
    }

    fn paginated_node(&self) -> &QueryNode {
        node_at(self.query.root(), &self.node_loc)
    }
}

fn node_at<'a>(root: &'a QueryNode, loc: &[usize]) -> &'a QueryNode {
    let mut node = root;
    for &index in loc {
        match &node.fields[index] {
            Selection::Node(child) => node = child,
            Selection::Field(_) => unreachable!("node location points at a leaf field"),
        }
    }
    node
}

fn node_at_mut<'a>(root: &'a mut QueryNode, loc: &[usize]) -> &'a mut QueryNode {
    let mut node = root;
    for &index in loc {
        match &mut node.fields[index] {
            Selection::Node(child) => node = child,
            Selection::Field(_) => unreachable!("node location points at a leaf field"),
        }
    }
    node
}

/// Breadth-first search for the first node literally named `pageInfo`,
/// in declaration order. Inline fragment nodes (names containing `...`)
/// are traversed but contribute no path segment. Returns the response path
/// to the containing node and its location in the tree.
fn locate_page_info(query: &Query) -> Result<(Vec<String>, Vec<usize>)> {
    let mut queue: VecDeque<(Vec<String>, Vec<usize>)> = VecDeque::new();
    queue.push_back((Vec::new(), Vec::new()));

    while let Some((path, loc)) = queue.pop_front() {
        let node = node_at(query.root(), &loc);
        for (index, field) in node.fields.iter().enumerate() {
            let Selection::Node(child) = field else {
                continue;
            };
            if child.name == "pageInfo" {
                if node.paginator().is_none() {
                    return Err(Error::InvalidQuery(
                        "pageInfo is not contained in a paginated node".to_string(),
                    ));
                }
                return Ok((path, loc));
            }
            let mut child_loc = loc.clone();
            child_loc.push(index);
            if child.name.contains("...") {
                queue.push_back((path.clone(), child_loc));
            } else {
                let mut child_path = path.clone();
                child_path.push(child.name.clone());
                queue.push_back((child_path, child_loc));
            }
        }
    }

    Err(Error::InvalidQuery(
        "no pageInfo node reachable from the query root".to_string(),
    ))
}
