use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::graphql::pagination::Paginator;
use crate::util;

/// Argument value attached to a query node. Rendering is deterministic:
/// the same tree always produces the same text.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<ArgValue>),
    Object(Vec<(String, ArgValue)>),
}

impl ArgValue {
    pub fn object<K: Into<String>>(entries: Vec<(K, ArgValue)>) -> Self {
        ArgValue::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    fn render(&self) -> String {
        match self {
            ArgValue::Str(s) => s.clone(),
            ArgValue::Int(i) => i.to_string(),
            ArgValue::Bool(b) => b.to_string(),
            ArgValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(ArgValue::render).collect();
                format!("[{}]", rendered.join(", "))
            }
            ArgValue::Object(entries) => {
                let rendered: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.render()))
                    .collect();
                format!("{{{}}}", rendered.join(", "))
            }
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Str(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Str(s)
    }
}

impl From<i64> for ArgValue {
    fn from(i: i64) -> Self {
        ArgValue::Int(i)
    }
}

impl From<i32> for ArgValue {
    fn from(i: i32) -> Self {
        ArgValue::Int(i64::from(i))
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

/// One entry of a node's selection set: either a plain field name or a
/// nested node with its own arguments and selections.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(String),
    Node(QueryNode),
}

/// A named node of a GraphQL query tree. Pagination awareness is an optional
/// capability attached to the node rather than a separate node kind.
#[derive(Debug, Clone)]
pub struct QueryNode {
    pub name: String,
    pub args: Vec<(String, ArgValue)>,
    pub fields: Vec<Selection>,
    pub(crate) paginator: Option<Paginator>,
}

/// Argument keys whose values are always rendered as quoted strings.
const QUOTED_ARG_KEYS: [&str; 3] = ["login", "owner", "name"];

impl QueryNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            fields: Vec::new(),
            paginator: None,
        }
    }

    /// A node that owns cursor state for a paginated connection.
    pub fn paginated(name: impl Into<String>) -> Self {
        Self {
            paginator: Some(Paginator::new()),
            ..Self::new(name)
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.push((key.into(), value.into()));
        self
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(Selection::Field(name.into()));
        self
    }

    pub fn child(mut self, node: QueryNode) -> Self {
        self.fields.push(Selection::Node(node));
        self
    }

    pub fn paginator(&self) -> Option<&Paginator> {
        self.paginator.as_ref()
    }

    pub fn child_nodes(&self) -> impl Iterator<Item = &QueryNode> {
        self.fields.iter().filter_map(|f| match f {
            Selection::Node(node) => Some(node),
            Selection::Field(_) => None,
        })
    }

    fn render_args(&self) -> String {
        if self.args.is_empty() {
            return String::new();
        }
        let rendered: Vec<String> = self
            .args
            .iter()
            .map(|(key, value)| {
                if QUOTED_ARG_KEYS.contains(&key.as_str()) {
                    format!("{}: \"{}\"", key, value.render())
                } else {
                    format!("{}: {}", key, value.render())
                }
            })
            .collect();
        format!("({})", rendered.join(", "))
    }

    fn render_fields(&self) -> String {
        let rendered: Vec<String> = self
            .fields
            .iter()
            .map(|f| match f {
                Selection::Field(name) => name.clone(),
                Selection::Node(node) => node.render(),
            })
            .collect();
        rendered.join(" ")
    }

    pub fn render(&self) -> String {
        format!("{}{} {{ {} }}", self.name, self.render_args(), self.render_fields())
    }
}

impl PartialEq for QueryNode {
    /// Order-sensitive over args and fields; pagination state does not
    /// affect node identity.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.args == other.args && self.fields == other.fields
    }
}

/// A complete, executable query: a root node named `query`.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    root: QueryNode,
}

impl Query {
    pub fn new() -> Self {
        Self {
            root: QueryNode::new("query"),
        }
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.root = self.root.field(name);
        self
    }

    pub fn child(mut self, node: QueryNode) -> Self {
        self.root = self.root.child(node);
        self
    }

    pub fn root(&self) -> &QueryNode {
        &self.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut QueryNode {
        &mut self.root
    }

    pub fn render(&self) -> String {
        self.root.render()
    }

    /// Renders the whole tree, then replaces every `$name` placeholder with
    /// its converted binding. A placeholder without a binding is a caller
    /// error and fails loudly.
    pub fn substitute(&self, subs: &Substitutions) -> Result<String> {
        substitute_placeholders(&self.render(), subs)
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

/// A value bound to a `$name` placeholder. Converted to GraphQL text before
/// substitution: booleans lowercase, objects as brace text with `field` and
/// `direction` values unquoted and everything else quoted, ISO-8601-looking
/// strings quoted, anything else verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum SubValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Object(Vec<(String, String)>),
}

impl SubValue {
    pub fn object<K: Into<String>, V: Into<String>>(entries: Vec<(K, V)>) -> Self {
        SubValue::Object(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    fn to_graphql(&self) -> String {
        match self {
            SubValue::Bool(b) => b.to_string(),
            SubValue::Int(i) => i.to_string(),
            SubValue::Object(entries) => {
                let rendered: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| {
                        if k == "field" || k == "direction" {
                            format!("{k}: {v}")
                        } else {
                            format!("{k}: \"{v}\"")
                        }
                    })
                    .collect();
                format!("{{{}}}", rendered.join(", "))
            }
            SubValue::Str(s) => {
                if util::looks_like_timestamp(s) {
                    format!("\"{s}\"")
                } else {
                    s.clone()
                }
            }
        }
    }
}

impl From<&str> for SubValue {
    fn from(s: &str) -> Self {
        SubValue::Str(s.to_string())
    }
}

impl From<String> for SubValue {
    fn from(s: String) -> Self {
        SubValue::Str(s)
    }
}

impl From<i64> for SubValue {
    fn from(i: i64) -> Self {
        SubValue::Int(i)
    }
}

impl From<i32> for SubValue {
    fn from(i: i32) -> Self {
        SubValue::Int(i64::from(i))
    }
}

impl From<bool> for SubValue {
    fn from(b: bool) -> Self {
        SubValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for SubValue {
    fn from(t: DateTime<Utc>) -> Self {
        SubValue::Str(util::format_timestamp(t))
    }
}

/// Ordered placeholder bindings for one execution.
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    bindings: Vec<(String, SubValue)>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<SubValue>) -> Self {
        self.bindings.push((name.into(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&SubValue> {
        self.bindings
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// Textual `$identifier` replacement over already-rendered query text. Also
/// used for response-path segments, which may themselves carry placeholders.
pub fn substitute_placeholders(text: &str, subs: &Substitutions) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let ident_len = after
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .count();
        if ident_len == 0 {
            out.push('$');
            rest = after;
        } else {
            let name = &after[..ident_len];
            let value = subs
                .get(name)
                .ok_or_else(|| Error::MissingSubstitution(name.to_string()))?;
            out.push_str(&value.to_graphql());
            rest = &after[ident_len..];
        }
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_without_args() {
        let node = QueryNode::new("testNode");
        assert_eq!(node.render_args(), "");
        assert_eq!(node.render(), "testNode {  }");
    }

    #[test]
    fn renders_basic_args() {
        let node = QueryNode::new("testNode")
            .arg("arg1", "value1")
            .arg("arg2", 123)
            .arg("arg3", true);
        assert_eq!(node.render_args(), "(arg1: value1, arg2: 123, arg3: true)");
    }

    #[test]
    fn quotes_special_arg_keys() {
        let node = QueryNode::new("testNode")
            .arg("login", "userLogin")
            .arg("owner", "userOwner")
            .arg("name", "userName");
        assert_eq!(
            node.render_args(),
            r#"(login: "userLogin", owner: "userOwner", name: "userName")"#
        );
    }

    #[test]
    fn renders_list_and_object_args() {
        let node = QueryNode::new("testNode").arg(
            "listArg",
            ArgValue::List(vec!["item1".into(), "item2".into(), "item3".into()]),
        );
        assert_eq!(node.render_args(), "(listArg: [item1, item2, item3])");

        let node = QueryNode::new("testNode").arg(
            "dictArg",
            ArgValue::object(vec![("key1", "value1".into()), ("key2", "value2".into())]),
        );
        assert_eq!(node.render_args(), "(dictArg: {key1: value1, key2: value2})");
    }

    #[test]
    fn renders_nested_fields() {
        let node = QueryNode::new("parentNode")
            .field("field1")
            .child(QueryNode::new("nestedNode").field("nestedField1").field("nestedField2"));
        assert_eq!(
            node.render_fields(),
            "field1 nestedNode { nestedField1 nestedField2 }"
        );
    }

    #[test]
    fn full_rendering_is_deterministic() {
        let build = || {
            QueryNode::new("testNode")
                .arg("arg1", "value1")
                .field("field1")
                .child(QueryNode::new("nestedNode"))
        };
        let expected = "testNode(arg1: value1) { field1 nestedNode {  } }";
        assert_eq!(build().render(), expected);
        assert_eq!(build().render(), build().render());
    }

    #[test]
    fn node_equality_is_order_sensitive() {
        let node1 = QueryNode::new("testNode").arg("arg1", "value1").field("field1").field("field2");
        let node2 = QueryNode::new("testNode").arg("arg1", "value1").field("field1").field("field2");
        let node3 = QueryNode::new("testNode").arg("arg1", "value1").field("field2").field("field1");
        assert_eq!(node1, node2);
        assert_ne!(node1, node3);
    }

    #[test]
    fn child_nodes_skips_plain_fields() {
        let nested1 = QueryNode::new("nestedNode1");
        let nested2 = QueryNode::new("nestedNode2");
        let parent = QueryNode::new("parentNode")
            .field("field1")
            .child(nested1.clone())
            .field("field2")
            .child(nested2.clone());
        let connected: Vec<&QueryNode> = parent.child_nodes().collect();
        assert_eq!(connected, vec![&nested1, &nested2]);
    }

    #[test]
    fn conversion_rules() {
        assert_eq!(SubValue::from(true).to_graphql(), "true");
        assert_eq!(SubValue::from(42).to_graphql(), "42");
        assert_eq!(SubValue::from("normalValue").to_graphql(), "normalValue");
        assert_eq!(
            SubValue::from("2020-01-01T12:00:00Z").to_graphql(),
            "\"2020-01-01T12:00:00Z\""
        );
        assert_eq!(
            SubValue::object(vec![("field", "CREATED_AT"), ("direction", "ASC")]).to_graphql(),
            "{field: CREATED_AT, direction: ASC}"
        );
        assert_eq!(
            SubValue::object(vec![("key", "value")]).to_graphql(),
            "{key: \"value\"}"
        );
    }

    #[test]
    fn substitute_replaces_placeholder_verbatim() {
        let query = Query::new().child(QueryNode::new("testQuery").arg("arg1", "$value").field("field1"));
        let text = query
            .substitute(&Substitutions::new().bind("value", "substitutedValue"))
            .unwrap();
        assert_eq!(text, "query { testQuery(arg1: substitutedValue) { field1 } }");
    }

    #[test]
    fn substitute_missing_binding_fails() {
        let query = Query::new().child(QueryNode::new("testQuery").arg("arg1", "$value"));
        let err = query.substitute(&Substitutions::new()).unwrap_err();
        assert!(matches!(err, Error::MissingSubstitution(name) if name == "value"));
    }

    #[test]
    fn bare_dollar_passes_through() {
        let out = substitute_placeholders("cost: $ 5", &Substitutions::new()).unwrap();
        assert_eq!(out, "cost: $ 5");
    }
}
