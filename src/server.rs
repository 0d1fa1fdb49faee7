//! The `"hyper"` transport.
//!
//! [`Server`] feeds an [`Engine`] from a TCP listener, speaking HTTP/1.1 and
//! HTTP/2 (auto-detected per connection). Each connection gets its own
//! task; each request on it is read in full and handed to
//! [`Engine::dispatch`], so every response, including transport-level
//! failures, is a JSON envelope.
//!
//! # Shutdown
//!
//! [`Server::run`] stops at the first of two things: the `shutdown` future
//! resolving, or the listener failing for good. On shutdown it stops
//! accepting immediately, then waits for every open connection task to
//! finish before returning. Orchestrators that send SIGTERM and wait a
//! grace period (Kubernetes, systemd) get a clean drain this way; pair
//! [`shutdown_signal`] with `run` to react to them.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::engine::{Engine, Transport};
use crate::error::Error;
use crate::failure::Failure;
use crate::response::Response;

/// HTTP over tokio, bound to [`EngineOptions::bind`](crate::EngineOptions::bind).
#[derive(Clone, Copy, Debug, Default)]
pub struct Server;

impl Transport for Server {
    fn serve(&self, engine: Arc<Engine>) -> BoxFuture<'static, Result<(), Error>> {
        Box::pin(async move {
            let listener = TcpListener::bind(engine.options().bind.as_str()).await?;
            Server::run(listener, engine, shutdown_signal()).await
        })
    }
}

impl Server {
    /// Serves `engine` on an already-bound listener until `shutdown`
    /// resolves, then drains open connections.
    ///
    /// Tests bind `127.0.0.1:0` themselves and pass a oneshot receiver as
    /// `shutdown`.
    pub async fn run(
        listener: TcpListener,
        engine: Arc<Engine>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        info!(
            addr = %listener.local_addr()?,
            prefix = %engine.options().prefix,
            "waypost listening"
        );

        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown wins over queued accepts.
                biased;

                () = &mut shutdown => break,

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(serve_connection(stream, peer, Arc::clone(&engine)));
                    }
                    Err(e) => error!("accept failed: {e}"),
                },

                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        info!(open = connections.len(), "shutting down, draining connections");
        while connections.join_next().await.is_some() {}
        info!("waypost stopped");
        Ok(())
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, engine: Arc<Engine>) {
    debug!(peer = %peer, "connection opened");

    // One service per connection; it is called once per request.
    let service = service_fn(move |req| forward(Arc::clone(&engine), req));

    let result = ConnBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), service)
        .await;

    match result {
        Ok(()) => debug!(peer = %peer, "connection closed"),
        Err(e) => error!(peer = %peer, "connection error: {e}"),
    }
}

/// Collects the body and hands the request to the engine. Never fails:
/// an unreadable body becomes a 400 envelope.
async fn forward(
    engine: Arc<Engine>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let response = match body.collect().await {
        Ok(collected) => {
            let req = http::Request::from_parts(parts, collected.to_bytes());
            engine.dispatch(req).await
        }
        Err(e) => {
            error!(path = %parts.uri.path(), "request body unreadable: {e}");
            Response::failure(&Failure::bad_request("unreadable body"))
        }
    };

    Ok(response.into_inner())
}

/// Completes on SIGTERM or Ctrl-C (Ctrl-C only off Unix).
///
/// A signal whose handler cannot be installed is logged and then ignored;
/// the other one still works.
pub async fn shutdown_signal() {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl-C"),
            Err(e) => {
                error!("cannot listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM");
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {}
        () = terminate => {}
    }
}
