//! Where presentations end up.

use std::fmt;
use std::sync::Mutex;

use crate::render::Presentation;

/// The regions of the console a controller writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    /// Output of the query editor.
    Results,
    /// Inline, non-blocking messages (transport failures, rejected input).
    Notice,
    /// Rows of the table under live view.
    Live,
    /// Relationship graph. Each update replaces every element and re-runs layout.
    Graph,
    Databases,
    Tables,
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Panel::Results => "results",
            Panel::Notice => "notice",
            Panel::Live => "live",
            Panel::Graph => "graph",
            Panel::Databases => "databases",
            Panel::Tables => "tables",
        };
        f.write_str(s)
    }
}

/// A display surface. Implementations must not call back into the controller.
pub trait View: Send + Sync {
    fn show(&self, panel: Panel, content: Presentation);
}

/// Keeps every update in memory, in order.
#[derive(Debug, Default)]
pub struct MemoryView {
    updates: Mutex<Vec<(Panel, Presentation)>>,
}

impl MemoryView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest content of a panel.
    pub fn current(&self, panel: Panel) -> Option<Presentation> {
        self.updates()
            .into_iter()
            .rev()
            .find(|(p, _)| *p == panel)
            .map(|(_, content)| content)
    }

    /// Every update a panel received, oldest first.
    pub fn history(&self, panel: Panel) -> Vec<Presentation> {
        self.updates()
            .into_iter()
            .filter(|(p, _)| *p == panel)
            .map(|(_, content)| content)
            .collect()
    }

    pub fn updates(&self) -> Vec<(Panel, Presentation)> {
        match self.updates.lock() {
            Ok(updates) => updates.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl View for MemoryView {
    fn show(&self, panel: Panel, content: Presentation) {
        let mut updates = match self.updates.lock() {
            Ok(updates) => updates,
            Err(poisoned) => poisoned.into_inner(),
        };
        updates.push((panel, content));
    }
}
