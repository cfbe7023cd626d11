//! Terminal front end for the HMSSQL console.
//!
//! Run with: cargo run -p hmsconsole-session --bin hmsconsole
//!
//! Lines are executed as queries, except for these commands:
//!   \create <db>   create a database and refresh the database list
//!   \use <db>      switch database and list its tables
//!   \watch <table> show the table's rows, refreshed every interval
//!   \unwatch       stop watching
//!   \graph         rebuild the database/table graph
//!   \tab <name>    switch to the query, schema or live tab
//!   \q             quit

use std::sync::Arc;

use anyhow::Context;
use hmsconsole_config::Config;
use hmsconsole_session::render::{GraphElement, TextTableRenderer};
use hmsconsole_session::{HttpTransport, Panel, Presentation, SessionController, Tab, View};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, PartialEq)]
enum Command {
    Create(String),
    Use(String),
    Watch(String),
    Unwatch,
    Graph,
    Tab(String),
    Quit,
    Query(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (head, arg) = match line.split_once(char::is_whitespace) {
        Some((head, arg)) => (head, arg.trim().to_string()),
        None => (line, String::new()),
    };
    let command = match head {
        "\\create" => Command::Create(arg),
        "\\use" => Command::Use(arg),
        "\\watch" => Command::Watch(arg),
        "\\unwatch" => Command::Unwatch,
        "\\graph" => Command::Graph,
        "\\tab" => Command::Tab(arg),
        "\\q" | "\\quit" => Command::Quit,
        _ => Command::Query(line.to_string()),
    };
    Some(command)
}

/// Prints panel updates to the terminal.
struct TerminalView;

impl View for TerminalView {
    fn show(&self, panel: Panel, content: Presentation) {
        match content {
            Presentation::Error(message) => eprintln!("[{}] error: {}", panel, message),
            Presentation::Text(text) | Presentation::Html(text) => println!("[{}]\n{}", panel, text),
            Presentation::List(items) if items.is_empty() => println!("[{}] (none)", panel),
            Presentation::List(items) => {
                println!("[{}]", panel);
                for item in items {
                    println!("  {}", item);
                }
            }
            Presentation::Graph(graph) => {
                println!("[{}]", panel);
                for element in graph.elements() {
                    match element {
                        GraphElement::Node { label, .. } => println!("  ({})", label),
                        GraphElement::Edge { source, target, label } => {
                            println!("  {} -[{}]-> {}", source, label, target)
                        }
                    }
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().context("Could not load configuration")?;
    let transport = HttpTransport::from_config(&config.console)?;
    info!("Connected to relay at {}", transport.url());

    let controller = SessionController::new(Arc::new(transport), Arc::new(TerminalView))
        .with_renderer(Arc::new(TextTableRenderer))
        .with_live_interval(config.console.live_interval());

    // Failures are already on screen through the view.
    let _ = controller.refresh_databases().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse_command(&line) else { continue };
        match command {
            Command::Quit => break,
            Command::Create(name) => {
                let _ = controller.create_database(&name).await;
            }
            Command::Use(name) => {
                let _ = controller.use_database(&name).await;
            }
            Command::Watch(table) => {
                let _ = controller.select_table(&table);
            }
            Command::Unwatch => controller.switch_tab(Tab::Query),
            Command::Graph => {
                let _ = controller.refresh_databases().await;
            }
            Command::Tab(name) => match name.parse::<Tab>() {
                Ok(tab) => controller.switch_tab(tab),
                Err(e) => eprintln!("{}", e),
            },
            Command::Query(text) => {
                let _ = controller.execute_query(&text).await;
            }
        }
    }

    controller.close();
    Ok(())
}
