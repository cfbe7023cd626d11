//! Result rendering strategies.
//!
//! A renderer turns one [`DaemonReply`] into one [`Presentation`]. Failures
//! always come out as [`Presentation::Error`] carrying the daemon's message
//! verbatim, and a failing reply is never also rendered as a table or graph.

use std::collections::HashSet;

use hmsconsole_common::reply::{display_value, UNRECOGNISED_REPLY};
use hmsconsole_common::{DaemonReply, DatabaseDescriptor, Row};
use minijinja::{context, AutoEscape, Environment};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

pub const NO_RESULTS: &str = "No results";

/// Shown when a reply cannot be displayed by the renderer it was given to.
pub const RENDER_FAILURE: &str = "Unable to display the response";

/// What a panel should show.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum Presentation {
    Html(String),
    Text(String),
    Graph(GraphElements),
    List(Vec<String>),
    Error(String),
}

impl Presentation {
    pub fn is_error(&self) -> bool {
        matches!(self, Presentation::Error(_))
    }
}

pub trait ResultRenderer: Send + Sync {
    fn render(&self, reply: &DaemonReply) -> Presentation;
}

// === Tabular ===

/// Rows reduced to display strings.
#[derive(Debug, Clone, PartialEq)]
enum TableShape {
    Empty,
    /// Header from the first row's columns, one line per row.
    Grid { columns: Vec<String>, rows: Vec<Vec<String>> },
    /// Pre-formatted text entries, shown one after another.
    Blocks(Vec<String>),
}

impl TableShape {
    fn from_rows(rows: &[Row]) -> Self {
        let Some(first) = rows.first() else {
            return TableShape::Empty;
        };
        let columns: Vec<String> = first.columns().into_iter().map(str::to_string).collect();
        if columns.is_empty() {
            let blocks: Vec<String> = rows.iter().filter_map(Row::label).collect();
            if blocks.is_empty() {
                return TableShape::Empty;
            }
            return TableShape::Blocks(blocks);
        }

        // Later rows are read through the first row's columns only.
        let rows = rows
            .iter()
            .map(|row| match row {
                Row::Record(_) => columns
                    .iter()
                    .map(|c| row.cell(c).map(display_value).unwrap_or_default())
                    .collect(),
                other => vec![other.label().unwrap_or_default()],
            })
            .collect();
        TableShape::Grid { columns, rows }
    }

    fn from_databases(databases: &[DatabaseDescriptor]) -> Self {
        if databases.is_empty() {
            return TableShape::Empty;
        }
        TableShape::Grid {
            columns: vec!["name".to_string(), "tables".to_string()],
            rows: databases
                .iter()
                .map(|db| vec![db.name.clone(), db.tables.join(", ")])
                .collect(),
        }
    }

    fn from_reply(reply: &DaemonReply) -> Result<Self, String> {
        match reply {
            DaemonReply::Failure(message) => Err(message.clone()),
            DaemonReply::Tabular(rows) => Ok(Self::from_rows(rows)),
            DaemonReply::Listing(databases) => Ok(Self::from_databases(databases)),
        }
    }
}

const GRID_TEMPLATE: &str = r#"<table class="result-table"><tr>{% for column in columns %}<th>{{ column }}</th>{% endfor %}</tr>{% for row in rows %}<tr>{% for cell in row %}<td>{{ cell }}</td>{% endfor %}</tr>{% endfor %}</table>"#;

const BLOCKS_TEMPLATE: &str = r#"{% for block in blocks %}<div class="result-table-wrapper"><pre>{{ block }}</pre></div>{% endfor %}"#;

/// Renders tabular replies as an HTML table. All daemon text is escaped.
pub struct HtmlTableRenderer {
    env: Environment<'static>,
}

impl HtmlTableRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        Self { env }
    }
}

impl Default for HtmlTableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultRenderer for HtmlTableRenderer {
    fn render(&self, reply: &DaemonReply) -> Presentation {
        let shape = match TableShape::from_reply(reply) {
            Ok(shape) => shape,
            Err(message) => return Presentation::Error(message),
        };
        let rendered = match shape {
            TableShape::Empty => {
                return Presentation::Html(format!(r#"<div class="no-results">{}</div>"#, NO_RESULTS))
            }
            TableShape::Grid { columns, rows } => {
                self.env.render_str(GRID_TEMPLATE, context! { columns => columns, rows => rows })
            }
            TableShape::Blocks(blocks) => self.env.render_str(BLOCKS_TEMPLATE, context! { blocks => blocks }),
        };
        match rendered {
            Ok(html) => Presentation::Html(html),
            Err(e) => {
                warn!("Result table failed to render: {}", e);
                Presentation::Error(RENDER_FAILURE.to_string())
            }
        }
    }
}

/// Renders tabular replies as an aligned plain-text grid.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextTableRenderer;

impl ResultRenderer for TextTableRenderer {
    fn render(&self, reply: &DaemonReply) -> Presentation {
        match TableShape::from_reply(reply) {
            Err(message) => Presentation::Error(message),
            Ok(TableShape::Empty) => Presentation::Text(NO_RESULTS.to_string()),
            Ok(TableShape::Blocks(blocks)) => Presentation::Text(blocks.join("\n\n")),
            Ok(TableShape::Grid { columns, rows }) => Presentation::Text(text_grid(&columns, &rows)),
        }
    }
}

fn text_grid(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                format!("{:<width$}", cell, width = *w)
            })
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(columns)];
    out.push(widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
    out.extend(rows.iter().map(|row| line(row)));
    out.join("\n")
}

// === Graph ===

/// One node per database, one edge per database→table containment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GraphElement {
    Node { id: String, label: String },
    Edge { source: String, target: String, label: String },
}

pub const CONTAINS: &str = "contains";

/// The complete element set of the relationship graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GraphElements {
    elements: Vec<GraphElement>,
}

impl GraphElements {
    /// Build the whole element set from a database listing. Nothing from an
    /// earlier listing is kept; duplicate names collapse to one node.
    pub fn from_databases(databases: &[DatabaseDescriptor]) -> Self {
        let mut elements: Vec<GraphElement> = Vec::new();
        let mut nodes: HashSet<&str> = HashSet::new();
        let mut edges: HashSet<(&str, &str)> = HashSet::new();
        for db in databases {
            if nodes.insert(db.name.as_str()) {
                elements.push(GraphElement::Node { id: db.name.clone(), label: db.name.clone() });
            }
            for table in &db.tables {
                if edges.insert((db.name.as_str(), table.as_str())) {
                    elements.push(GraphElement::Edge {
                        source: db.name.clone(),
                        target: format!("{}.{}", db.name, table),
                        label: CONTAINS.to_string(),
                    });
                }
            }
        }
        Self { elements }
    }

    pub fn elements(&self) -> &[GraphElement] {
        &self.elements
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphElement> {
        self.elements.iter().filter(|e| matches!(e, GraphElement::Node { .. }))
    }

    pub fn edges(&self) -> impl Iterator<Item = &GraphElement> {
        self.elements.iter().filter(|e| matches!(e, GraphElement::Edge { .. }))
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements wrapped as `{"data": {...}}`, the shape graph widgets consume.
    pub fn to_cytoscape(&self) -> Value {
        Value::Array(self.elements.iter().map(|e| json!({ "data": e })).collect())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GraphRenderer;

impl ResultRenderer for GraphRenderer {
    fn render(&self, reply: &DaemonReply) -> Presentation {
        match reply {
            DaemonReply::Listing(databases) => Presentation::Graph(GraphElements::from_databases(databases)),
            DaemonReply::Failure(message) => Presentation::Error(message.clone()),
            DaemonReply::Tabular(_) => {
                warn!("Graph view received a tabular reply");
                Presentation::Error(UNRECOGNISED_REPLY.to_string())
            }
        }
    }
}
