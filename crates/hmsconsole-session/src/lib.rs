//! hmsconsole-session — Client half of the console.
//!
//! Owns what the operator sees: the selected database and table, the live
//! view of one table, and the two renderings of daemon replies (a result grid
//! and the database/table relationship graph). Every query goes through a
//! [`transport::QueryTransport`], normally the web server's `/query` relay.

pub mod controller;
pub mod live;
pub mod render;
pub mod transport;
pub mod view;

pub use controller::{SessionController, SessionState, Tab};
pub use render::{GraphElements, Presentation, ResultRenderer};
pub use transport::{HttpTransport, QueryTransport};
pub use view::{MemoryView, Panel, View};
