// Copyright (C) The Ifrit Authors.
// This file is part of the ifrit library.

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
// http://www.apache.org/licenses/LICENSE-2.0

// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate tracing;

mod handshake;

use ifrit_identity::{Certificate, Identity};
use ifrit_node_messages::{Message, MessageCodec, Ping, Pong, RejectReason, State, StateResponse};

use anyhow::{anyhow, bail, Result};
use futures::SinkExt;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;

/// The client-side capabilities of an authenticated transport. The node holds
/// these behind a trait object so tests can substitute stubs.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs a Spread exchange with the peer at the given address.
    async fn spread(&self, addr: &str, state: State) -> Result<StateResponse>;

    /// Probes the liveness of the peer at the given address.
    async fn ping(&self, addr: &str) -> Result<()>;

    /// Delivers an application payload and returns the peer's reply.
    async fn send(&self, addr: &str, payload: Vec<u8>) -> Result<Vec<u8>>;
}

/// The server-side hooks an embedding node implements. Every call carries the
/// certificate the caller authenticated with during the handshake.
#[async_trait]
pub trait Inbound: Send + Sync {
    /// Handles a Spread exchange from an authenticated caller.
    async fn spread(&self, caller: Certificate, state: State) -> Result<StateResponse, RejectReason>;

    /// Handles a liveness probe.
    async fn ping(&self);

    /// Handles an application payload and produces the reply.
    async fn application(&self, payload: Vec<u8>) -> Result<Vec<u8>>;
}

/// An authenticated request/response transport over TCP.
///
/// Every connection starts with a mutual challenge handshake, then carries
/// exactly one request and its response. Inbound connections are served
/// concurrently, bounded by a semaphore.
#[derive(Clone)]
pub struct Tcp(Arc<InnerTcp>);

pub struct InnerTcp {
    /// The identity presented and proven during handshakes.
    identity: Arc<Identity>,
    /// The bound listener, consumed when the accept loop starts.
    listener: Mutex<Option<TcpListener>>,
    /// The address the listener is bound to.
    local_addr: SocketAddr,
    /// The maximum number of concurrently served inbound connections.
    max_streams: usize,
    /// The spawned handles.
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Tcp {
    /// The number of seconds before an outbound exchange is abandoned.
    const CALL_TIMEOUT_IN_SECS: u64 = 10;
    /// The default bound on concurrently served inbound connections.
    pub const MAXIMUM_CONCURRENT_STREAMS: usize = 64;
    /// The number of seconds before a liveness probe counts as failed.
    const PING_TIMEOUT_IN_SECS: u64 = 5;

    /// Binds the listener and initializes the transport around it.
    pub async fn bind(listen_addr: SocketAddr, identity: Arc<Identity>, max_streams: usize) -> Result<Self> {
        let listener = TcpListener::bind(listen_addr).await?;
        Self::from_listener(listener, identity, max_streams)
    }

    /// Initializes the transport around an already-bound listener.
    pub fn from_listener(listener: TcpListener, identity: Arc<Identity>, max_streams: usize) -> Result<Self> {
        let local_addr = listener.local_addr()?;
        Ok(Self(Arc::new(InnerTcp {
            identity,
            listener: Mutex::new(Some(listener)),
            local_addr,
            max_streams,
            handles: Default::default(),
        })))
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.0.local_addr
    }

    /// Starts the accept loop, dispatching requests to the given handler.
    pub fn enable_listener(&self, handler: Arc<dyn Inbound>) -> Result<()> {
        let listener =
            self.0.listener.lock().take().ok_or_else(|| anyhow!("the listener is already enabled"))?;
        let semaphore = Arc::new(Semaphore::new(self.0.max_streams));
        let tcp = self.clone();

        let handle = tokio::spawn(async move {
            loop {
                let (stream, peer_addr) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(error) => {
                        warn!("Failed to accept a connection - {error}");
                        continue;
                    }
                };
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let tcp = tcp.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(error) = tcp.serve_connection(stream, peer_addr, handler).await {
                        debug!("Dropped the connection from '{peer_addr}' - {error}");
                    }
                });
            }
        });
        self.0.handles.lock().push(handle);
        Ok(())
    }

    /// Shuts down the transport.
    pub fn shut_down(&self) {
        trace!("Shutting down the transport...");
        self.0.handles.lock().iter().for_each(|handle| handle.abort());
    }

    /// Serves a single inbound connection: handshake, one request, one reply.
    async fn serve_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        handler: Arc<dyn Inbound>,
    ) -> Result<()> {
        let mut framed = Framed::new(stream, MessageCodec::default());
        let caller = handshake::execute(&mut framed, &self.0.identity, self.0.local_addr.port()).await?;

        let request =
            framed.try_next().await?.ok_or_else(|| anyhow!("the peer closed the connection"))?;
        trace!("Received '{}' from '{peer_addr}'", request.name());

        let response = match request {
            Message::Spread(state) => match handler.spread(caller, *state).await {
                Ok(reply) => Message::SpreadResponse(Box::new(reply)),
                Err(reason) => Message::Reject(reason),
            },
            Message::Ping(..) => {
                handler.ping().await;
                Message::Pong(Pong)
            }
            Message::Application(payload) => match handler.application(payload).await {
                Ok(reply) => Message::ApplicationResponse(reply),
                Err(error) => {
                    debug!("The application handler failed on a payload from '{peer_addr}' - {error}");
                    Message::Reject(RejectReason::ProtocolViolation)
                }
            },
            message => bail!("unexpected request '{}'", message.name()),
        };
        framed.send(response).await?;
        Ok(())
    }

    /// Issues one authenticated request and awaits its response.
    async fn call(&self, addr: &str, request: Message) -> Result<Message> {
        let stream = TcpStream::connect(addr).await?;
        let mut framed = Framed::new(stream, MessageCodec::default());
        let _callee = handshake::execute(&mut framed, &self.0.identity, self.0.local_addr.port()).await?;

        framed.send(request).await?;
        framed.try_next().await?.ok_or_else(|| anyhow!("the peer closed the connection"))
    }
}

#[async_trait]
impl Transport for Tcp {
    async fn spread(&self, addr: &str, state: State) -> Result<StateResponse> {
        let call = self.call(addr, Message::Spread(Box::new(state)));
        let response = tokio::time::timeout(Duration::from_secs(Self::CALL_TIMEOUT_IN_SECS), call)
            .await
            .map_err(|_| anyhow!("the exchange with '{addr}' timed out"))??;
        match response {
            Message::SpreadResponse(reply) => Ok(*reply),
            Message::Reject(reason) => bail!("'{addr}' rejected the exchange - {reason}"),
            message => bail!("'{addr}' answered with an unexpected '{}'", message.name()),
        }
    }

    async fn ping(&self, addr: &str) -> Result<()> {
        let call = self.call(addr, Message::Ping(Ping));
        let response = tokio::time::timeout(Duration::from_secs(Self::PING_TIMEOUT_IN_SECS), call)
            .await
            .map_err(|_| anyhow!("the probe of '{addr}' timed out"))??;
        match response {
            Message::Pong(..) => Ok(()),
            message => bail!("'{addr}' answered a probe with an unexpected '{}'", message.name()),
        }
    }

    async fn send(&self, addr: &str, payload: Vec<u8>) -> Result<Vec<u8>> {
        let call = self.call(addr, Message::Application(payload));
        let response = tokio::time::timeout(Duration::from_secs(Self::CALL_TIMEOUT_IN_SECS), call)
            .await
            .map_err(|_| anyhow!("the delivery to '{addr}' timed out"))??;
        match response {
            Message::ApplicationResponse(reply) => Ok(reply),
            Message::Reject(reason) => bail!("'{addr}' rejected the payload - {reason}"),
            message => bail!("'{addr}' answered with an unexpected '{}'", message.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl Inbound for EchoHandler {
        async fn spread(&self, _caller: Certificate, _state: State) -> Result<StateResponse, RejectReason> {
            Ok(StateResponse::default())
        }

        async fn ping(&self) {}

        async fn application(&self, payload: Vec<u8>) -> Result<Vec<u8>> {
            Ok(payload)
        }
    }

    async fn sample_transport() -> Tcp {
        let identity =
            Arc::new(Identity::generate(8, "127.0.0.1:0", "127.0.0.1:0", "127.0.0.1:0").unwrap());
        let tcp = Tcp::bind("127.0.0.1:0".parse().unwrap(), identity, Tcp::MAXIMUM_CONCURRENT_STREAMS)
            .await
            .unwrap();
        tcp.enable_listener(Arc::new(EchoHandler)).unwrap();
        tcp
    }

    #[tokio::test]
    async fn ping_round_trip() {
        let server = sample_transport().await;
        let client = sample_transport().await;

        client.ping(&server.local_addr().to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn application_payload_round_trip() {
        let server = sample_transport().await;
        let client = sample_transport().await;

        let reply = client.send(&server.local_addr().to_string(), b"hello".to_vec()).await.unwrap();
        assert_eq!(reply, b"hello");
    }

    #[tokio::test]
    async fn connecting_to_a_dead_address_fails() {
        let client = sample_transport().await;
        // A listener that was bound and immediately dropped.
        let vacated = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        assert!(client.ping(&vacated.to_string()).await.is_err());
    }
}
