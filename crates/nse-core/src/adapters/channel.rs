//! Announcer backed by a swappable channel.
//!
//! The transport attaches a sender while a relay connection is live and
//! detaches it when the connection drops; announcing in between fails with
//! `TransportUnavailable`.

use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedSender;

use crate::domain::AnnounceError;
use crate::ports::outbound::Announcer;

/// `Announcer` forwarding claims to whichever link is attached.
#[derive(Debug, Default)]
pub struct ChannelAnnouncer {
    link: RwLock<Option<UnboundedSender<Vec<u8>>>>,
}

impl ChannelAnnouncer {
    /// Create a detached announcer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route announcements into `sender`, replacing any previous link.
    pub fn attach(&self, sender: UnboundedSender<Vec<u8>>) {
        *self.link.write() = Some(sender);
    }

    pub fn detach(&self) {
        *self.link.write() = None;
    }

    pub fn is_attached(&self) -> bool {
        self.link.read().as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

impl Announcer for ChannelAnnouncer {
    fn announce(&self, claim: Vec<u8>) -> Result<(), AnnounceError> {
        let link = self.link.read();
        let sender = link.as_ref().ok_or(AnnounceError::TransportUnavailable)?;
        sender
            .send(claim)
            .map_err(|_| AnnounceError::TransportUnavailable)
    }
}
