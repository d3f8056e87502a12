/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! gRPC carriage of envelopes between processes.
//!
//! [`GrpcTransport`] is the sending side; [`CastReceiver`] implements the
//! generated `CastService` and hands accepted envelopes to a local queue.
//! The ack only confirms delivery: the outcome of the operation is observed
//! through the volume's status.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tonic::transport::{Channel, Endpoint, Server};
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use super::envelope::Envelope;
use super::error::RpcError;
use super::transport::Transport;
use super::version::RpcVersion;
use crate::proto::volsched_v1::cast_service_client::CastServiceClient;
use crate::proto::volsched_v1::cast_service_server::{CastService, CastServiceServer};
use crate::proto::volsched_v1::{CastAck, CastRequest};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

// ── Client side ───────────────────────────────────────────────────────────────

/// Sends casts to one or more peers.  Channels connect lazily, so a peer
/// that is down at startup is picked up once it comes back.
#[derive(Debug)]
pub struct GrpcTransport {
    peers: Vec<(String, Channel)>,
    next: AtomicUsize,
}

impl GrpcTransport {
    /// # Errors
    /// [`RpcError::Transport`] for an unparseable URL or an empty list.
    pub fn new<S: AsRef<str>>(urls: &[S]) -> Result<Self, RpcError> {
        if urls.is_empty() {
            return Err(RpcError::transport("*", "no peer endpoints configured"));
        }
        let peers = urls
            .iter()
            .map(|url| {
                let url = url.as_ref().to_string();
                let endpoint = Endpoint::from_shared(url.clone())
                    .map_err(|e| RpcError::transport("*", format!("invalid endpoint '{url}': {e}")))?
                    .connect_timeout(CONNECT_TIMEOUT);
                Ok((url, endpoint.connect_lazy()))
            })
            .collect::<Result<Vec<_>, RpcError>>()?;
        Ok(Self {
            peers,
            next: AtomicUsize::new(0),
        })
    }

    async fn send(
        channel: Channel,
        topic: &str,
        fanout: bool,
        payload: Vec<u8>,
    ) -> Result<(), RpcError> {
        let request = Request::new(CastRequest {
            topic: topic.to_string(),
            fanout,
            envelope: payload,
        });
        let ack = CastServiceClient::new(channel)
            .cast(request)
            .await
            .map_err(|status| RpcError::transport(topic, status.message().to_string()))?
            .into_inner();
        if ack.accepted {
            Ok(())
        } else {
            Err(RpcError::transport(topic, format!("rejected: {}", ack.detail)))
        }
    }
}

#[async_trait]
impl Transport for GrpcTransport {
    /// Deliver to one peer, starting round-robin and failing over to the
    /// next on error.
    async fn cast(&self, topic: &str, envelope: Envelope) -> Result<(), RpcError> {
        let payload = envelope.to_bytes()?;
        let start = self.next.fetch_add(1, Ordering::Relaxed);
        let mut last_err = None;

        for i in 0..self.peers.len() {
            let (url, channel) = &self.peers[(start + i) % self.peers.len()];
            match Self::send(channel.clone(), topic, false, payload.clone()).await {
                Ok(()) => {
                    debug!(topic, peer = %url, method = %envelope.method, "cast delivered");
                    return Ok(());
                }
                Err(e) => {
                    warn!(topic, peer = %url, error = %e, "cast failed, trying next peer");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| RpcError::transport(topic, "no peers")))
    }

    /// Fire-and-forget to every peer; failures are logged and dropped.
    async fn fanout_cast(&self, topic: &str, envelope: Envelope) -> Result<(), RpcError> {
        let payload = envelope.to_bytes()?;
        for (url, channel) in &self.peers {
            let (url, channel, topic, payload) =
                (url.clone(), channel.clone(), topic.to_string(), payload.clone());
            tokio::spawn(async move {
                if let Err(e) = Self::send(channel, &topic, true, payload).await {
                    debug!(topic = %topic, peer = %url, error = %e, "fanout delivery failed");
                }
            });
        }
        Ok(())
    }
}

// ── Server side ───────────────────────────────────────────────────────────────

/// `CastService` implementation feeding a local consumer queue.
#[derive(Debug, Clone)]
pub struct CastReceiver {
    supported: RpcVersion,
    tx: mpsc::Sender<Envelope>,
}

impl CastReceiver {
    /// Accept envelopes a peer speaking `supported` can handle.
    pub fn new(supported: RpcVersion, tx: mpsc::Sender<Envelope>) -> Self {
        Self { supported, tx }
    }

    pub fn into_service(self) -> CastServiceServer<Self> {
        CastServiceServer::new(self)
    }
}

fn reject(detail: impl ToString) -> Response<CastAck> {
    Response::new(CastAck {
        accepted: false,
        detail: detail.to_string(),
    })
}

#[tonic::async_trait]
impl CastService for CastReceiver {
    async fn cast(&self, request: Request<CastRequest>) -> Result<Response<CastAck>, Status> {
        let req = request.into_inner();

        let envelope = match Envelope::from_bytes(&req.envelope) {
            Ok(e) => e,
            Err(e) => {
                warn!(topic = %req.topic, error = %e, "undecodable envelope");
                return Ok(reject(e));
            }
        };
        if let Err(e) = envelope.check_supported(self.supported) {
            warn!(topic = %req.topic, method = %envelope.method, error = %e, "rejecting cast");
            return Ok(reject(e));
        }

        debug!(
            topic   = %req.topic,
            fanout  = req.fanout,
            method  = %envelope.method,
            version = %envelope.version,
            "cast received"
        );
        self.tx
            .send(envelope)
            .await
            .map_err(|_| Status::unavailable("consumer is shutting down"))?;

        Ok(Response::new(CastAck {
            accepted: true,
            detail: String::new(),
        }))
    }
}

/// Serve `receiver` on `addr` until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, receiver: CastReceiver, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send,
{
    info!(%addr, "cast endpoint listening");
    Server::builder()
        .add_service(receiver.into_service())
        .serve_with_shutdown(addr, shutdown)
        .await?;
    info!(%addr, "cast endpoint stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
