//! HTTP polling API over the trap buffer
//!
//! | Route    | Effect                           |
//! |----------|----------------------------------|
//! | `/traps` | return buffered traps, keep them |
//! | `/flush` | return buffered traps, clear     |
//! | other    | 404 with `Unknown route: <path>` |
//!
//! Bodies are JSON of the form `{"status": <code>, "content": ...}`.

use crate::config::QueryServerConfig;
use crate::trap::TrapRecord;
use crate::trap_buffer::TrapBuffer;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info};

pub const CONTENT_TYPE: &str = "text/javascript";

/// Envelope shared by every response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply<T> {
    pub status: u16,
    pub content: T,
}

fn reply<T: Serialize>(status: StatusCode, content: T) -> Response {
    let body = Reply {
        status: status.as_u16(),
        content,
    };
    (status, [(header::CONTENT_TYPE, CONTENT_TYPE)], Json(body)).into_response()
}

pub fn router(buffer: TrapBuffer) -> Router {
    Router::new()
        .route("/traps", get(list_traps).fallback(unknown_route))
        .route("/flush", get(flush_traps).fallback(unknown_route))
        .fallback(unknown_route)
        .with_state(buffer)
}

async fn list_traps(State(buffer): State<TrapBuffer>) -> Response {
    let records: Vec<TrapRecord> = buffer.drain(false);
    debug!("Serving {} buffered traps", records.len());
    reply(StatusCode::OK, records)
}

async fn flush_traps(State(buffer): State<TrapBuffer>) -> Response {
    let records: Vec<TrapRecord> = buffer.drain(true);
    info!("Flushed {} traps", records.len());
    reply(StatusCode::OK, records)
}

async fn unknown_route(uri: Uri) -> Response {
    debug!("Unknown route requested: {}", uri.path());
    reply(StatusCode::NOT_FOUND, format!("Unknown route: {}", uri.path()))
}

pub struct QueryServer {
    listener: TcpListener,
    buffer: TrapBuffer,
}

impl QueryServer {
    /// Bind the HTTP socket. Failing here is fatal for the process.
    pub async fn bind(config: &QueryServerConfig, buffer: TrapBuffer) -> Result<Self> {
        let bind_addr = config.socket_addr()?;
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind query server to {}", bind_addr))?;

        Ok(Self { listener, buffer })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read query server address")
    }

    pub async fn run(self) -> Result<()> {
        info!("Query server listening on http://{}", self.local_addr()?);
        axum::serve(self.listener, router(self.buffer))
            .await
            .context("Query server terminated")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trap::V2Trap;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn record(oid: &str) -> TrapRecord {
        TrapRecord::V2(V2Trap {
            oid: oid.to_string(),
            source_ip: "127.0.0.1".to_string(),
            vars: vec![],
        })
    }

    async fn start(buffer: TrapBuffer) -> String {
        let config = QueryServerConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
        };
        let server = QueryServer::bind(&config, buffer).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        format!("http://{addr}")
    }

    async fn get(url: String) -> (u16, String, Value) {
        let response = reqwest::get(url).await.unwrap();
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        (status, content_type, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn traps_then_flush() {
        let buffer = TrapBuffer::new();
        buffer.append(record("1.3.6.1.6.3.1.1.5.3"));
        let base = start(buffer.clone()).await;

        let (status, content_type, body) = get(format!("{base}/traps")).await;
        assert_eq!(status, 200);
        assert_eq!(content_type, CONTENT_TYPE);
        assert_eq!(body["status"], json!(200));
        assert_eq!(body["content"][0]["oid"], json!("1.3.6.1.6.3.1.1.5.3"));
        assert_eq!(buffer.len(), 1);

        let (status, _, body) = get(format!("{base}/flush")).await;
        assert_eq!(status, 200);
        assert_eq!(body["content"].as_array().unwrap().len(), 1);
        assert!(buffer.is_empty());

        let (_, _, body) = get(format!("{base}/traps")).await;
        assert_eq!(body, json!({"status": 200, "content": []}));
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let buffer = TrapBuffer::new();
        buffer.append(record("1.0"));
        let base = start(buffer.clone()).await;

        let (status, content_type, body) = get(format!("{base}/bogus")).await;
        assert_eq!(status, 404);
        assert_eq!(content_type, CONTENT_TYPE);
        assert_eq!(body, json!({"status": 404, "content": "Unknown route: /bogus"}));
        assert_eq!(buffer.len(), 1);
    }

    #[tokio::test]
    async fn non_get_methods_are_404() {
        let buffer = TrapBuffer::new();
        buffer.append(record("1.0"));
        let base = start(buffer.clone()).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/flush"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);
        assert_eq!(buffer.len(), 1);
    }
}
