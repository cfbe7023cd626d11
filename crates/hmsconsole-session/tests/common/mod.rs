//! An in-memory daemon speaking the console's query dialect.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use hmsconsole_common::{ConsoleError, DaemonReply, DatabaseDescriptor, Result, Row};
use hmsconsole_session::QueryTransport;
use serde_json::json;

#[derive(Default)]
pub struct FakeDaemon {
    queries: Mutex<Vec<String>>,
    databases: Mutex<Vec<DatabaseDescriptor>>,
    current: Mutex<Option<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    canned: Mutex<HashMap<String, DaemonReply>>,
    down: AtomicBool,
}

impl FakeDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(self, name: &str, tables: &[&str]) -> Self {
        self.databases.lock().unwrap().push(DatabaseDescriptor {
            name: name.to_string(),
            tables: tables.iter().map(|t| t.to_string()).collect(),
        });
        self
    }

    /// Make every occurrence of `query` take `delay` to answer.
    pub fn delay(&self, query: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(query.to_string(), delay);
    }

    /// Answer `query` with `reply` instead of evaluating it.
    pub fn reply_with(&self, query: &str, reply: DaemonReply) {
        self.canned.lock().unwrap().insert(query.to_string(), reply);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn count(&self, query: &str) -> usize {
        self.queries().iter().filter(|q| *q == query).count()
    }

    fn answer(&self, query: &str) -> DaemonReply {
        if let Some(reply) = self.canned.lock().unwrap().get(query) {
            return reply.clone();
        }
        let statement = query.trim().trim_end_matches(';');
        if let Some(name) = statement.strip_prefix("CREATE DATABASE ") {
            let mut databases = self.databases.lock().unwrap();
            if databases.iter().any(|db| db.name == name) {
                return DaemonReply::Failure(format!("Database {name} already exists"));
            }
            databases.push(DatabaseDescriptor { name: name.to_string(), tables: vec![] });
            return DaemonReply::Tabular(vec![]);
        }
        if let Some(name) = statement.strip_prefix("USE ") {
            if !self.databases.lock().unwrap().iter().any(|db| db.name == name) {
                return DaemonReply::Failure(format!("Database {name} does not exist"));
            }
            *self.current.lock().unwrap() = Some(name.to_string());
            return DaemonReply::Tabular(vec![]);
        }
        if let Some(table) = statement.strip_prefix("SELECT * FROM ") {
            let exists = self.databases.lock().unwrap().iter().any(|db| db.tables.iter().any(|t| t == table));
            if !exists {
                return DaemonReply::Failure(format!("Table {table} does not exist"));
            }
            let row = json!({"table": table, "id": 1});
            let serde_json::Value::Object(map) = row else { unreachable!() };
            return DaemonReply::Tabular(vec![Row::Record(map)]);
        }
        match statement {
            "\\dc" => DaemonReply::Listing(self.databases.lock().unwrap().clone()),
            "\\dt" => {
                let current = self.current.lock().unwrap().clone();
                let Some(current) = current else {
                    return DaemonReply::Failure("No database selected".into());
                };
                let databases = self.databases.lock().unwrap();
                let tables = databases
                    .iter()
                    .find(|db| db.name == current)
                    .map(|db| db.tables.clone())
                    .unwrap_or_default();
                DaemonReply::Tabular(tables.into_iter().map(Row::Text).collect())
            }
            _ => DaemonReply::Failure(format!("Unsupported statement: {query}")),
        }
    }
}

#[async_trait]
impl QueryTransport for FakeDaemon {
    async fn send(&self, query: &str) -> Result<DaemonReply> {
        self.queries.lock().unwrap().push(query.to_string());
        let delay = self.delays.lock().unwrap().get(query).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(ConsoleError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(self.answer(query))
    }
}
