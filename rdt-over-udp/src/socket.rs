//! Async UDP socket transport.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! whole datagrams to a single peer.  All protocol logic lives elsewhere;
//! this module owns only byte I/O.
//!
//! A socket is bound to a local address and either connected to a known peer
//! up front ([`Socket::connect`], sender side) or locked onto the first peer
//! it hears from (receiver side).  Once connected, the kernel filters out
//! datagrams from anyone else and reports ICMP port-unreachable as
//! `ConnectionRefused`.
//!
//! A refusal only means the peer has closed once the peer has been heard
//! from; it is then surfaced as [`TransportError::PeerClosed`].  Before that
//! the peer may simply not be listening yet, so the refusal is treated like a
//! lost datagram and left to the retransmission timer.

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::error::TransportError;
use crate::packet::MAX_DATAGRAM;
use crate::transport::Transport;

/// A datagram socket talking to exactly one peer.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    peer: Option<SocketAddr>,
    /// Set once a datagram from `peer` has arrived.
    heard_peer: bool,
    inner: Option<UdpSocket>,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `127.0.0.1:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, TransportError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self {
            local_addr,
            peer: None,
            heard_peer: false,
            inner: Some(inner),
        })
    }

    /// Fix the remote peer; only its datagrams are accepted afterwards.
    pub async fn connect(&mut self, peer: SocketAddr) -> Result<(), TransportError> {
        self.handle()?.connect(peer).await?;
        self.peer = Some(peer);
        Ok(())
    }

    /// The peer this socket exchanges datagrams with, once known.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn handle(&self) -> Result<&UdpSocket, TransportError> {
        self.inner
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket closed").into())
    }
}

fn is_refused(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
    )
}

/// Map OS errors that mean "nobody is listening any more" to `PeerClosed`.
fn classify(e: io::Error) -> TransportError {
    if is_refused(&e) {
        TransportError::PeerClosed
    } else {
        TransportError::Io(e)
    }
}

impl Transport for Socket {
    async fn send(&mut self, datagram: &[u8]) -> Result<(), TransportError> {
        if self.peer.is_none() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "no peer yet").into());
        }
        match self.handle()?.send(datagram).await {
            Ok(_) => Ok(()),
            Err(e) if is_refused(&e) && !self.heard_peer => {
                log::debug!("[udp] peer not listening yet; datagram lost");
                Ok(())
            }
            Err(e) => Err(classify(e)),
        }
    }

    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let inner = self
            .inner
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket closed"))?;

        let n = if self.peer.is_some() {
            loop {
                match inner.recv(&mut buf).await {
                    Ok(n) => break n,
                    Err(e) if is_refused(&e) && !self.heard_peer => {
                        log::debug!("[udp] peer not listening yet; waiting");
                    }
                    Err(e) => return Err(classify(e)),
                }
            }
        } else {
            let (n, addr) = inner.recv_from(&mut buf).await?;
            inner.connect(addr).await?;
            self.peer = Some(addr);
            log::info!("[udp] locked onto peer {addr}");
            n
        };
        self.heard_peer = true;
        buf.truncate(n);
        Ok(buf)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.inner.take().is_some() {
            log::debug!("[udp] closed {}", self.local_addr);
        }
        Ok(())
    }
}
