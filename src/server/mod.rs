//! Inbound HTTP/1.1 server on tokio.
//!
//! Accepts TCP connections, parses requests with `httparse`, and dispatches
//! them to [`routes::handle`]. Keep-alive connections are served until the
//! peer closes or sends `Connection: close`. [`Server::run`] stops accepting
//! once its shutdown future resolves.

mod request;
mod response;
mod routes;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::service::WeatherPoetryService;

pub use request::{Request, RequestError};
pub use response::{status_for, Response};
pub use routes::handle;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Largest request (head plus body) buffered before answering 413.
const MAX_REQUEST_SIZE: usize = 1024 * 1024;

const INITIAL_BUF_SIZE: usize = 4096;

pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve `service` until `shutdown` resolves. Connections already
    /// accepted finish their in-flight request on their own tasks.
    pub async fn run<S>(self, service: Arc<WeatherPoetryService>, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()>,
    {
        info!(address = %self.local_addr, "weather-poetry listening");
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(%peer, "connection accepted");
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, peer, service).await {
                    warn!(%peer, error = %e, "connection closed with error");
                }
            });
        }
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    service: Arc<WeatherPoetryService>,
) -> std::io::Result<()> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        if stream.read_buf(&mut buf).await? == 0 {
            debug!(%peer, "connection closed by peer");
            return Ok(());
        }

        if buf.len() > MAX_REQUEST_SIZE {
            warn!(%peer, "request too large");
            let response = Response::message(413, "Request too large").keep_alive(false);
            stream.write_all(&response.into_bytes()).await?;
            return Ok(());
        }

        // A single read may carry several pipelined requests.
        loop {
            let (request, body_offset) = match Request::parse(&buf) {
                Ok(pair) => pair,
                Err(RequestError::Incomplete) => break,
                Err(e) => {
                    warn!(%peer, error = %e, "malformed request");
                    let response = Response::message(400, "Bad request").keep_alive(false);
                    stream.write_all(&response.into_bytes()).await?;
                    return Ok(());
                }
            };

            let total = body_offset + request.content_length().unwrap_or(0);
            if buf.len() < total {
                break;
            }
            let frame = buf.split_to(total).freeze();
            let request = request.with_body(frame.slice(body_offset..));
            let keep_alive = request.is_keep_alive();

            debug!(%peer, method = request.method(), path = request.path(), "dispatching request");
            let response = handle(&service, &request).await.keep_alive(keep_alive);
            stream.write_all(&response.into_bytes()).await?;
            stream.flush().await?;

            if !keep_alive {
                return Ok(());
            }
        }
    }
}
