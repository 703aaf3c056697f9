//! In-process datagram channel.
//!
//! [`MemoryLink::pair`] returns two connected endpoints backed by tokio
//! unbounded channels.  Delivery is reliable and ordered; wrap an endpoint in
//! a [`crate::simulator::Simulator`] to make it lossy.  Closing or dropping
//! one endpoint makes the other observe [`TransportError::PeerClosed`].

use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::transport::Transport;

#[derive(Debug)]
pub struct MemoryLink {
    tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemoryLink {
    /// Create two endpoints wired back to back.
    pub fn pair() -> (MemoryLink, MemoryLink) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            MemoryLink {
                tx: Some(a_tx),
                rx: a_rx,
            },
            MemoryLink {
                tx: Some(b_tx),
                rx: b_rx,
            },
        )
    }

    /// Non-blocking peek used by tests to assert that nothing is queued.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }
}

impl Transport for MemoryLink {
    async fn send(&mut self, datagram: &[u8]) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::PeerClosed)?;
        tx.send(datagram.to_vec())
            .map_err(|_| TransportError::PeerClosed)
    }

    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        self.rx.recv().await.ok_or(TransportError::PeerClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        self.rx.close();
        Ok(())
    }
}
