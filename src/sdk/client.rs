use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use crate::model::{doc, CollectionRef, DocRef, Document, DocumentSnapshot, Fields, Query};
use crate::server::protocol::{AddRequest, DeleteRequest, UpdateRequest};
use crate::{RemoteResult, RemoteStore, RemoteUnavailable, Result};
use tokio::sync::Mutex;

/// TCP client for the document daemon. Implements [`RemoteStore`].
///
/// Every failure, including `ERR` replies from the daemon, is reported as
/// [`RemoteUnavailable`].
pub struct Client {
    addr: String,
    inner: Mutex<Option<ClientInner>>,
}

struct ClientInner {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl Client {
    /// Creates a client that connects on first use.
    pub fn new(addr: &str) -> Self {
        Self {
            addr: addr.to_string(),
            inner: Mutex::new(None),
        }
    }

    /// Connects immediately, failing if the daemon cannot be reached.
    pub async fn connect(addr: &str) -> Result<Self> {
        let inner = Client::connect_inner(addr).await?;
        Ok(Self {
            addr: addr.to_string(),
            inner: Mutex::new(Some(inner)),
        })
    }

    /// Sends one command line and reads its reply.
    ///
    /// Only connecting and writing are retried. Once a request has been written
    /// it is never sent again, so a lost reply surfaces as [`RemoteUnavailable`]
    /// instead of repeating a non-idempotent command such as `ADD`.
    async fn send_and_receive(&self, cmd: String) -> RemoteResult<String> {
        let mut inner_guard = self.inner.lock().await;
        let line = format!("{}\n", cmd);

        // Retry logic
        for i in 0..3 {
            if inner_guard.is_none() {
                match Client::connect_inner(&self.addr).await {
                    Ok(inner) => *inner_guard = Some(inner),
                    Err(e) => {
                        if i == 2 {
                            return Err(RemoteUnavailable::new(format!("connect to {}: {}", self.addr, e)));
                        }
                        tokio::time::sleep(std::time::Duration::from_millis((i + 1) * 200)).await;
                        continue;
                    }
                }
            }

            let Some(inner) = inner_guard.as_mut() else { continue };
            if inner.writer.write_all(line.as_bytes()).await.is_err() {
                *inner_guard = None;
                continue;
            }

            let mut resp = String::new();
            return match inner.reader.read_line(&mut resp).await {
                Ok(0) => {
                    *inner_guard = None;
                    Err(RemoteUnavailable::new("connection closed before reply"))
                }
                Err(e) => {
                    *inner_guard = None;
                    Err(RemoteUnavailable::new(format!("read reply: {}", e)))
                }
                Ok(_) => {
                    let resp = resp.trim();
                    if let Some(msg) = resp.strip_prefix("ERR") {
                        return Err(RemoteUnavailable::new(msg.trim()));
                    }
                    Ok(resp.to_string())
                }
            };
        }

        Err(RemoteUnavailable::new("failed after 3 attempts"))
    }

    async fn connect_inner(addr: &str) -> std::io::Result<ClientInner> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        Ok(ClientInner {
            reader: BufReader::new(reader),
            writer,
        })
    }

    pub async fn ping(&self) -> RemoteResult<()> {
        match self.send_and_receive("PING".to_string()).await?.as_str() {
            "PONG" => Ok(()),
            other => Err(RemoteUnavailable::new(format!("unexpected ping reply: {}", other))),
        }
    }

    pub async fn list_collections(&self) -> RemoteResult<Vec<String>> {
        let resp = self.send_and_receive("LIST_COLLECTIONS".to_string()).await?;
        decode(payload(&resp)?)
    }
}

fn payload(resp: &str) -> RemoteResult<&str> {
    resp.strip_prefix("OK ")
        .ok_or_else(|| RemoteUnavailable::new(format!("invalid response: {}", resp)))
}

fn expect_ok(resp: &str) -> RemoteResult<()> {
    match resp {
        "OK" => Ok(()),
        other => Err(RemoteUnavailable::new(format!("invalid response: {}", other))),
    }
}

fn decode<T: serde::de::DeserializeOwned>(json: &str) -> RemoteResult<T> {
    serde_json::from_str(json).map_err(|e| RemoteUnavailable::new(format!("malformed reply: {}", e)))
}

fn encode<T: serde::Serialize>(value: &T) -> RemoteResult<String> {
    serde_json::to_string(value).map_err(|e| RemoteUnavailable::new(format!("malformed request: {}", e)))
}

#[async_trait]
impl RemoteStore for Client {
    async fn read(&self, query: &Query) -> RemoteResult<Vec<DocumentSnapshot>> {
        let resp = self.send_and_receive(format!("QUERY {}", encode(query)?)).await?;
        let docs: Vec<Document> = decode(payload(&resp)?)?;
        Ok(docs.into_iter().map(DocumentSnapshot::from).collect())
    }

    async fn add(&self, collection: &CollectionRef, data: Fields) -> RemoteResult<DocRef> {
        let req = AddRequest {
            collection: collection.name().to_string(),
            data,
        };
        let resp = self.send_and_receive(format!("ADD {}", encode(&req)?)).await?;
        let id: String = decode(payload(&resp)?)?;
        Ok(doc(collection.name(), id))
    }

    async fn update(&self, doc: &DocRef, data: Fields) -> RemoteResult<()> {
        let req = UpdateRequest {
            collection: doc.collection().to_string(),
            id: doc.id().to_string(),
            data,
        };
        expect_ok(&self.send_and_receive(format!("UPDATE {}", encode(&req)?)).await?)
    }

    async fn delete(&self, doc: &DocRef) -> RemoteResult<()> {
        let req = DeleteRequest {
            collection: doc.collection().to_string(),
            id: doc.id().to_string(),
        };
        expect_ok(&self.send_and_receive(format!("DEL {}", encode(&req)?)).await?)
    }
}
