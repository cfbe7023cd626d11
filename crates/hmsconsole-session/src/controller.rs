//! Session controller — operator actions in, panel updates out.

use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use hmsconsole_common::reply::UNRECOGNISED_REPLY;
use hmsconsole_common::{ConsoleError, DaemonReply, DatabaseDescriptor, Result};
use tracing::{debug, info, warn};

use crate::live::{LiveSink, LiveSlot, DEFAULT_INTERVAL};
use crate::render::{GraphRenderer, HtmlTableRenderer, Presentation, ResultRenderer};
use crate::transport::QueryTransport;
use crate::view::{Panel, View};

/// Console tabs. Switching tabs only toggles what is visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Query,
    Schema,
    Live,
}

impl FromStr for Tab {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "query" => Ok(Tab::Query),
            "schema" | "graph" => Ok(Tab::Schema),
            "live" => Ok(Tab::Live),
            other => Err(ConsoleError::InvalidInput(format!("unknown tab '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub selected_database: Option<String>,
    pub selected_table: Option<String>,
    pub tab: Tab,
}

pub struct SessionController {
    transport: Arc<dyn QueryTransport>,
    view: Arc<dyn View>,
    renderer: Arc<dyn ResultRenderer>,
    graph: GraphRenderer,
    state: Mutex<SessionState>,
    live: LiveSlot,
    live_interval: Duration,
}

impl SessionController {
    pub fn new(transport: Arc<dyn QueryTransport>, view: Arc<dyn View>) -> Self {
        Self {
            transport,
            view,
            renderer: Arc::new(HtmlTableRenderer::new()),
            graph: GraphRenderer,
            state: Mutex::new(SessionState::default()),
            live: LiveSlot::new(),
            live_interval: DEFAULT_INTERVAL,
        }
    }

    /// Strategy for the results and live panels.
    pub fn with_renderer(mut self, renderer: Arc<dyn ResultRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// A zero interval is ignored and the current one kept.
    pub fn with_live_interval(mut self, interval: Duration) -> Self {
        if interval.is_zero() {
            warn!("Ignoring zero live interval, keeping {:?}", self.live_interval);
        } else {
            self.live_interval = interval;
        }
        self
    }

    pub fn state(&self) -> SessionState {
        self.lock_state().clone()
    }

    /// Table whose rows are currently being polled.
    pub fn live_table(&self) -> Option<String> {
        self.live.active_table()
    }

    /// Run free-form query text and show the outcome in the results panel.
    ///
    /// A transport failure leaves the results panel as it was and is shown as
    /// a notice instead.
    pub async fn execute_query(&self, text: &str) -> Result<DaemonReply> {
        let query = text.trim();
        if query.is_empty() {
            return Err(self.reject("query is empty"));
        }
        let reply = self.dispatch(query).await?;
        self.view.show(Panel::Results, self.renderer.render(&reply));
        Ok(reply)
    }

    /// `CREATE DATABASE <name>;`, then refresh the database list and graph.
    pub async fn create_database(&self, name: &str) -> Result<Vec<DatabaseDescriptor>> {
        let name = self.identifier(name)?;
        let reply = self.dispatch(&format!("CREATE DATABASE {};", name)).await?;
        self.expect_success(reply)?;
        info!(database = name, "Database created");
        self.refresh_databases().await
    }

    /// Issue `\dc` and rebuild the database list and the graph from scratch.
    pub async fn refresh_databases(&self) -> Result<Vec<DatabaseDescriptor>> {
        let reply = self.dispatch("\\dc").await?;
        self.view.show(Panel::Graph, self.graph.render(&reply));
        match reply {
            DaemonReply::Listing(databases) => {
                let names = databases.iter().map(|db| db.name.clone()).collect();
                self.view.show(Panel::Databases, Presentation::List(names));
                Ok(databases)
            }
            DaemonReply::Failure(message) => Err(ConsoleError::Daemon(message)),
            DaemonReply::Tabular(_) => Err(ConsoleError::Daemon(UNRECOGNISED_REPLY.to_string())),
        }
    }

    /// `USE <name>;`, then list that database's tables.
    ///
    /// The selection only changes once the daemon accepts the switch.
    pub async fn use_database(&self, name: &str) -> Result<Vec<String>> {
        let name = self.identifier(name)?;
        let reply = self.dispatch(&format!("USE {};", name)).await?;
        self.expect_success(reply)?;

        {
            let mut state = self.lock_state();
            state.selected_database = Some(name.to_string());
            state.selected_table = None;
        }
        self.live.release();
        debug!(database = name, "Database selected");
        self.list_tables().await
    }

    /// Issue `\dt` and show the table names of the selected database.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let reply = self.dispatch("\\dt").await?;
        let tables = match reply {
            DaemonReply::Tabular(rows) => rows.iter().filter_map(|row| row.label()).collect(),
            DaemonReply::Listing(databases) => {
                let selected = self.state().selected_database;
                databases
                    .into_iter()
                    .find(|db| Some(&db.name) == selected.as_ref())
                    .map(|db| db.tables)
                    .unwrap_or_default()
            }
            DaemonReply::Failure(message) => {
                self.view.show(Panel::Notice, Presentation::Error(message.clone()));
                return Err(ConsoleError::Daemon(message));
            }
        };
        self.view.show(Panel::Tables, Presentation::List(tables.clone()));
        Ok(tables)
    }

    /// Select a table and watch it live, replacing any previous live view.
    pub fn select_table(&self, name: &str) -> Result<()> {
        let name = self.identifier(name)?;
        {
            let mut state = self.lock_state();
            state.selected_table = Some(name.to_string());
            state.tab = Tab::Live;
        }
        let sink = LiveSink {
            transport: self.transport.clone(),
            view: self.view.clone(),
            renderer: self.renderer.clone(),
        };
        self.live.subscribe(name, self.live_interval, sink);
        Ok(())
    }

    /// Leaving the live tab ends the live view. No queries are issued.
    pub fn switch_tab(&self, tab: Tab) {
        let previous = std::mem::replace(&mut self.lock_state().tab, tab);
        if previous == Tab::Live && tab != Tab::Live {
            if let Some(table) = self.live.release() {
                debug!(%table, "Left live tab");
            }
        }
    }

    /// End the session's live view.
    pub fn close(&self) {
        self.live.release();
    }

    async fn dispatch(&self, query: &str) -> Result<DaemonReply> {
        match self.transport.send(query).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                warn!(error = %e, "Query did not reach the daemon");
                self.view.show(Panel::Notice, Presentation::Error(format!("Error: {}", e)));
                Err(e)
            }
        }
    }

    fn expect_success(&self, reply: DaemonReply) -> Result<DaemonReply> {
        reply.into_result().inspect_err(|e| {
            self.view.show(Panel::Notice, Presentation::Error(e.to_string()));
        })
    }

    fn identifier<'a>(&self, name: &'a str) -> Result<&'a str> {
        let name = name.trim();
        if is_identifier(name) {
            Ok(name)
        } else {
            Err(self.reject(&format!("'{}' is not a valid name", name)))
        }
    }

    fn reject(&self, message: &str) -> ConsoleError {
        self.view.show(Panel::Notice, Presentation::Error(message.to_string()));
        ConsoleError::InvalidInput(message.to_string())
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.live.release();
    }
}

/// Letters, digits and underscores, not starting with a digit.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
