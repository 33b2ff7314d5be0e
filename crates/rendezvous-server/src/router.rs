use rendezvous_common::{Envelope, MessageType, Result};
use tracing::{debug, warn};

use crate::groups::GroupStore;
use crate::registry::ConnectionRegistry;

/// What the router did with one inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Point-to-point payload handed to `receiver`'s channel (or dropped).
    Forwarded { receiver: String, delivered: bool },
    /// Sender entered a group and the roster went out to every member.
    GroupEntered {
        group_key: String,
        roster: Vec<String>,
        delivered: usize,
    },
    Ignored,
}

/// Routes signaling envelopes by addressee.
///
/// Payloads are never parsed past the envelope: point-to-point messages are
/// forwarded as the exact text the sender wrote.
#[derive(Clone)]
pub struct MessageRouter {
    registry: ConnectionRegistry,
    groups: GroupStore,
}

impl MessageRouter {
    pub fn new(registry: ConnectionRegistry, groups: GroupStore) -> Self {
        Self { registry, groups }
    }

    /// Decode `raw` and route it on behalf of connection `sender_key`.
    pub async fn dispatch(&self, sender_key: &str, raw: &str) -> Result<Routed> {
        let envelope = Envelope::decode(raw)?;
        Ok(self.route(sender_key, &envelope, raw).await)
    }

    /// Route an already decoded envelope. `raw` must be the text it was
    /// decoded from; forwarded messages carry it unchanged.
    pub async fn route(&self, sender_key: &str, envelope: &Envelope, raw: &str) -> Routed {
        match &envelope.kind {
            MessageType::Text
            | MessageType::Offer
            | MessageType::Answer
            | MessageType::Candidate => {
                let delivered = self.registry.send(&envelope.receiver, raw).await;
                debug!(
                    "{} {} -> {} (delivered: {})",
                    envelope.kind, sender_key, envelope.receiver, delivered
                );
                Routed::Forwarded {
                    receiver: envelope.receiver.clone(),
                    delivered,
                }
            }
            MessageType::EnterGroup => self.enter_group(sender_key, &envelope.content).await,
            MessageType::Welcome | MessageType::GroupEntered => {
                warn!(
                    "ignoring server-only message type {} from {}",
                    envelope.kind, sender_key
                );
                Routed::Ignored
            }
            MessageType::Unrecognized(tag) => {
                warn!("unknown message type {:?} from {}", tag, sender_key);
                Routed::Ignored
            }
        }
    }

    async fn enter_group(&self, sender_key: &str, group_key: &str) -> Routed {
        if group_key.is_empty() {
            warn!("entergroup without a group key from {}", sender_key);
            return Routed::Ignored;
        }

        let group = self.groups.enter_group(sender_key, group_key);
        let delivered = self.broadcast_roster(sender_key, &group.members).await;
        Routed::GroupEntered {
            group_key: group.key,
            roster: group.members,
            delivered,
        }
    }

    /// Send a `groupentered` roster to every member in roster order.
    /// `joined_key` is the member whose join triggered the broadcast.
    pub async fn broadcast_roster(&self, joined_key: &str, roster: &[String]) -> usize {
        let envelope = Envelope::group_entered(joined_key, roster);
        match envelope.encode() {
            Ok(json) => self.registry.send_many(roster, &json).await,
            Err(err) => {
                warn!("failed to encode roster for {}: {}", joined_key, err);
                0
            }
        }
    }
}
