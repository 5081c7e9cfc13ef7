use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use crate::engine::LocalStore;
use crate::model::Query;
use crate::server::protocol::{AddRequest, DeleteRequest, UpdateRequest};
use serde::de::DeserializeOwned;
use crate::Result;
use log::{info, error};
use tokio::sync::Semaphore;

/// Accepts TCP connections and serves the document protocol from a [`LocalStore`].
pub struct Router {
    store: Arc<LocalStore>,
    semaphore: Arc<Semaphore>,
}

impl Router {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self {
            store,
            semaphore: Arc::new(Semaphore::new(100)),
        }
    }

    pub async fn listen(&self, port: &str) -> Result<()> {
        let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
        info!("Launchpad document store listening on port {}", port);
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener until accepting fails.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            let (socket, _) = listener.accept().await?;
            let store = self.store.clone();
            let sem = self.semaphore.clone();

            tokio::spawn(async move {
                let _permit = match sem.try_acquire() {
                    Ok(p) => p,
                    Err(_) => {
                        error!("Server busy: too many concurrent connections. Rejecting...");
                        let mut socket = socket;
                        let _ = socket.shutdown().await;
                        return;
                    }
                };

                if let Err(e) = handle_connection(socket, store).await {
                    error!("Connection error: {}", e);
                }
            });
        }
    }
}

fn err_reply(e: impl std::fmt::Display) -> String {
    format!("ERR {}", e)
}

/// Parses a command body. An empty body is a missing argument; anything that is
/// not exactly one well-formed request object is rejected.
fn parse_body<T: DeserializeOwned>(rest: &str) -> std::result::Result<T, String> {
    if rest.is_empty() {
        return Err("ERR missing arguments".to_string());
    }
    serde_json::from_str(rest).map_err(|e| format!("ERR invalid request: {}", e))
}

/// Executes one protocol line against `store`. `None` means the client asked to quit.
pub fn dispatch(store: &LocalStore, line: &str) -> Result<Option<String>> {
    let (command, rest) = match line.split_once(' ') {
        Some((c, r)) => (c, r.trim()),
        None => (line, ""),
    };

    let response = match command.to_uppercase().as_str() {
        "QUERY" => match parse_body::<Query>(rest) {
            Ok(q) => format!("OK {}", serde_json::to_string(&store.query(&q))?),
            Err(reply) => reply,
        },
        "ADD" => match parse_body::<AddRequest>(rest) {
            Ok(req) => match store.add(&req.collection, req.data) {
                Ok(id) => format!("OK {}", serde_json::to_string(&id)?),
                Err(e) => err_reply(e),
            },
            Err(reply) => reply,
        },
        "UPDATE" => match parse_body::<UpdateRequest>(rest) {
            Ok(req) => match store.update(&req.collection, &req.id, req.data) {
                Ok(()) => "OK".to_string(),
                Err(e) => err_reply(e),
            },
            Err(reply) => reply,
        },
        "DEL" => match parse_body::<DeleteRequest>(rest) {
            Ok(req) => match store.delete(&req.collection, &req.id) {
                Ok(()) => "OK".to_string(),
                Err(e) => err_reply(e),
            },
            Err(reply) => reply,
        },
        "LIST_COLLECTIONS" => format!("OK {}", serde_json::to_string(&store.collections())?),
        "PING" => "PONG".to_string(),
        "QUIT" => return Ok(None),
        _ => "ERR unknown command".to_string(),
    };

    Ok(Some(response))
}

pub async fn handle_connection(mut socket: TcpStream, store: Arc<LocalStore>) -> Result<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match dispatch(&store, trimmed)? {
            Some(r) => r,
            None => break,
        };

        writer.write_all(format!("{}\n", response).as_bytes()).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Registry;

    fn reply(store: &LocalStore, line: &str) -> String {
        dispatch(store, line).unwrap().unwrap()
    }

    #[test]
    fn test_dispatch_crud() {
        let store = LocalStore::new(Registry::builtin(), None);

        let added = reply(
            &store,
            r#"ADD {"collection": "products", "data": {"name": "Saturn  V replica", "price": 99}}"#,
        );
        let id: String = serde_json::from_str(added.strip_prefix("OK ").unwrap()).unwrap();

        let update = format!(r#"UPDATE {{"collection": "products", "id": "{}", "data": {{"price": 89}}}}"#, id);
        assert_eq!(reply(&store, &update), "OK");

        let q = r#"QUERY {"collection":"products","clauses":[{"kind":"equality","field":"price","value":89}]}"#;
        let found = reply(&store, q);
        assert!(found.contains("Saturn  V replica"));
        assert!(found.contains(&id));

        let del = format!(r#"DEL {{"collection": "products", "id": "{}"}}"#, id);
        assert_eq!(reply(&store, &del), "OK");
        assert_eq!(reply(&store, q), "OK []");
    }

    #[test]
    fn test_ids_with_spaces_are_not_truncated() {
        let store = LocalStore::new(Registry::builtin(), None);

        let del = r#"DEL {"collection": "products", "id": "product-1 stale"}"#;
        assert_eq!(reply(&store, del), "ERR document not found: products/product-1 stale");
        assert!(store.load("products").unwrap().iter().any(|d| d.id == "product-1"));
    }

    #[test]
    fn test_dispatch_errors() {
        let store = LocalStore::new(Registry::builtin(), None);

        assert_eq!(
            reply(&store, r#"DEL {"collection": "heroSlides", "id": "nope"}"#),
            "ERR document not found: heroSlides/nope"
        );
        assert_eq!(
            reply(&store, r#"ADD {"collection": "orders", "data": {}}"#),
            "ERR unknown collection: orders"
        );
        assert!(reply(&store, r#"ADD {"collection": "products", "data": [1]}"#).starts_with("ERR invalid request"));
        assert!(reply(&store, "DEL products product-1").starts_with("ERR invalid request"));
        assert!(reply(&store, r#"DEL {"collection": "products", "id": "product-1"} extra"#).starts_with("ERR invalid request"));
        assert!(reply(&store, r#"DEL {"collection": "products"}"#).starts_with("ERR invalid request"));
        assert!(reply(&store, "QUERY nonsense").starts_with("ERR invalid request"));
        assert_eq!(reply(&store, "UPDATE"), "ERR missing arguments");
        assert_eq!(reply(&store, "FLY"), "ERR unknown command");
        assert_eq!(reply(&store, "ping"), "PONG");
        assert!(dispatch(&store, "QUIT").unwrap().is_none());
        assert_eq!(store.load("products").unwrap().len(), 4);
    }
}
