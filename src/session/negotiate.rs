//! Session handshake

use tracing::info;

use super::codec::PendingKind;
use super::rpc::{self, PeerMeta};
use super::uri::SessionUri;
use super::Session;
use crate::error::{Error, Result};
use crate::transport::Transport;

impl<T: Transport> Session<T> {
    /// Publish the session request and return the URI to show the wallet
    ///
    /// Does not wait for the wallet; its answer arrives through [`Session::run`].
    pub async fn request_session(&mut self, peer_meta: &PeerMeta) -> Result<SessionUri> {
        let request = rpc::session_request(&self.topic, peer_meta);

        self.relay
            .send(&self.topic, &request)
            .await
            .map_err(Error::Negotiation)?;
        self.pending.insert(request.id, PendingKind::SessionRequest);

        let key = self.relay.key().map_err(Error::Negotiation)?;
        info!(topic = %self.topic, id = request.id, "session requested");
        Ok(SessionUri::new(&self.topic, &self.bridge_url, key))
    }
}
