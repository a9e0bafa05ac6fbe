//! Builds GraphQL documents for subgraph collection queries from a list of field paths.

use std::fmt::{self, Display};

use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "asc"),
            OrderDirection::Desc => write!(f, "desc"),
        }
    }
}

/// Comparison operators of the subgraph `where` filter, rendered as field suffixes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Not,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl FilterOp {
    fn suffix(&self) -> &'static str {
        match self {
            FilterOp::Eq => "",
            FilterOp::Not => "_not",
            FilterOp::Gt => "_gt",
            FilterOp::Gte => "_gte",
            FilterOp::Lt => "_lt",
            FilterOp::Lte => "_lte",
            FilterOp::In => "_in",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// A query against one top-level collection of a subgraph, e.g. `liquidityPoolDailySnapshots`,
/// selecting one or more field paths such as `["inputTokens", "name"]`.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldPathQuery {
    pub collection: String,
    pub first: Option<u32>,
    pub order_by: Option<String>,
    pub order_direction: Option<OrderDirection>,
    pub filters: Vec<Filter>,
    pub field_paths: Vec<Vec<String>>,
}

impl FieldPathQuery {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            first: None,
            order_by: None,
            order_direction: None,
            filters: Vec::new(),
            field_paths: Vec::new(),
        }
    }

    pub fn first(mut self, first: u32) -> Self {
        self.first = Some(first);
        self
    }

    pub fn order_by(mut self, field: &str, direction: OrderDirection) -> Self {
        self.order_by = Some(field.to_string());
        self.order_direction = Some(direction);
        self
    }

    pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    /// Adds a field path, written dotted: `inputTokens.name`.
    pub fn select(mut self, path: &str) -> Self {
        self.field_paths
            .push(path.split('.').map(str::to_string).collect());
        self
    }

    /// Column name the flattened result uses for `path`.
    pub fn column_name(&self, path: &[String]) -> String {
        format!("{}_{}", self.collection, path.join("_"))
    }

    /// Column name for a dotted path, written as `select` takes it.
    pub fn column_for(&self, path: &str) -> String {
        format!("{}_{}", self.collection, path.replace('.', "_"))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.field_paths
            .iter()
            .map(|path| self.column_name(path))
            .collect()
    }

    fn arguments(&self) -> Vec<String> {
        let mut arguments = Vec::new();

        if let Some(first) = self.first {
            arguments.push(format!("first: {first}"));
        }
        if let Some(order_by) = &self.order_by {
            arguments.push(format!("orderBy: {order_by}"));
        }
        if let Some(direction) = self.order_direction {
            arguments.push(format!("orderDirection: {direction}"));
        }
        if !self.filters.is_empty() {
            let conditions = self
                .filters
                .iter()
                .map(|filter| {
                    format!(
                        "{}{}: {}",
                        filter.field,
                        filter.op.suffix(),
                        graphql_value(&filter.value)
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            arguments.push(format!("where: {{{conditions}}}"));
        }

        arguments
    }

    pub fn to_graphql(&self) -> String {
        let mut selection = Selection::default();
        for path in &self.field_paths {
            selection.insert(path);
        }

        let arguments = self.arguments();
        let mut document = String::from("query {\n  ");
        document.push_str(&self.collection);
        if !arguments.is_empty() {
            document.push_str(&format!("({})", arguments.join(", ")));
        }
        selection.write(&mut document, 1);
        document.push_str("\n}");
        document
    }
}

/// GraphQL input values: object keys are bare, everything else matches JSON.
fn graphql_value(value: &Value) -> String {
    match value {
        Value::Array(items) => format!(
            "[{}]",
            items
                .iter()
                .map(graphql_value)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Object(fields) => format!(
            "{{{}}}",
            fields
                .iter()
                .map(|(key, value)| format!("{key}: {}", graphql_value(value)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        other => other.to_string(),
    }
}

#[derive(Default)]
struct Selection {
    fields: Vec<(String, Selection)>,
}

impl Selection {
    fn insert(&mut self, path: &[String]) {
        let Some((head, tail)) = path.split_first() else {
            return;
        };

        let index = match self.fields.iter().position(|(name, _)| name == head) {
            Some(index) => index,
            None => {
                self.fields.push((head.clone(), Selection::default()));
                self.fields.len() - 1
            }
        };
        self.fields[index].1.insert(tail);
    }

    fn write(&self, out: &mut String, depth: usize) {
        if self.fields.is_empty() {
            return;
        }

        out.push_str(" {\n");
        for (name, child) in &self.fields {
            out.push_str(&"  ".repeat(depth + 1));
            out.push_str(name);
            child.write(out, depth + 1);
            out.push('\n');
        }
        out.push_str(&"  ".repeat(depth));
        out.push('}');
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn renders_nested_selection() {
        let query = FieldPathQuery::new("liquidityPoolDailySnapshots")
            .first(1000)
            .order_by("timestamp", OrderDirection::Desc)
            .filter("pool", FilterOp::Eq, "0xpool")
            .filter("timestamp", FilterOp::Gt, 1641600000)
            .select("id")
            .select("inputTokens.name")
            .select("inputTokens.decimals");

        let expected = "query {
  liquidityPoolDailySnapshots(first: 1000, orderBy: timestamp, orderDirection: desc, where: {pool: \"0xpool\", timestamp_gt: 1641600000}) {
    id
    inputTokens {
      name
      decimals
    }
  }
}";
        assert_eq!(query.to_graphql(), expected);
    }

    #[test]
    fn renders_without_arguments() {
        let query = FieldPathQuery::new("protocols").select("id");
        assert_eq!(query.to_graphql(), "query {\n  protocols {\n    id\n  }\n}");
    }

    #[test]
    fn renders_list_and_object_values() {
        let query = FieldPathQuery::new("markets")
            .filter("id", FilterOp::In, json!(["0xa", "0xb"]))
            .filter("inputToken_", FilterOp::Eq, json!({"symbol": "DAI"}))
            .select("id");

        assert!(query
            .to_graphql()
            .contains("where: {id_in: [\"0xa\", \"0xb\"], inputToken_: {symbol: \"DAI\"}}"));
    }

    #[test]
    fn column_names_join_path_with_collection() {
        let query = FieldPathQuery::new("liquidityPoolDailySnapshots")
            .select("id")
            .select("inputTokens.name");

        assert_eq!(
            query.column_names(),
            vec![
                "liquidityPoolDailySnapshots_id",
                "liquidityPoolDailySnapshots_inputTokens_name"
            ]
        );
        assert_eq!(
            query.column_for("inputTokens.name"),
            "liquidityPoolDailySnapshots_inputTokens_name"
        );
    }
}
