use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sender name used on envelopes the relay itself produces.
pub const SERVER_SENDER: &str = "server";

/// Separator between member keys in a `groupentered` roster.
pub const ROSTER_SEPARATOR: &str = ",";

/// Type tag of a signaling envelope.
///
/// Tags the relay does not recognize are kept verbatim in `Unrecognized` so
/// they can be logged; they are never rejected at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Server greeting sent once after registration (server to client).
    Welcome,
    Text,
    /// WebRTC SDP offer, opaque to the relay.
    Offer,
    /// WebRTC SDP answer, opaque to the relay.
    Answer,
    /// ICE candidate, opaque to the relay.
    Candidate,
    /// Request to enter the group named by `content` (client to server).
    EnterGroup,
    /// Roster broadcast after a membership change (server to client).
    GroupEntered,
    Unrecognized(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Welcome => "welcome",
            MessageType::Text => "text",
            MessageType::Offer => "offer",
            MessageType::Answer => "answer",
            MessageType::Candidate => "candidate",
            MessageType::EnterGroup => "entergroup",
            MessageType::GroupEntered => "groupentered",
            MessageType::Unrecognized(tag) => tag,
        }
    }
}

impl From<String> for MessageType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "welcome" => MessageType::Welcome,
            "text" => MessageType::Text,
            "offer" => MessageType::Offer,
            "answer" => MessageType::Answer,
            "candidate" => MessageType::Candidate,
            "entergroup" => MessageType::EnterGroup,
            "groupentered" => MessageType::GroupEntered,
            _ => MessageType::Unrecognized(tag),
        }
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Unrecognized(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signaling envelope exchanged over the relay channel.
///
/// Only `type` is mandatory on the wire; the other fields default to empty
/// strings when a client leaves them out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub content: String,
}

impl Envelope {
    pub fn new(
        kind: MessageType,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            sender: sender.into(),
            receiver: receiver.into(),
            content: content.into(),
        }
    }

    /// Greeting delivered to a freshly registered connection.
    pub fn welcome(user_key: &str) -> Self {
        Self::new(
            MessageType::Welcome,
            SERVER_SENDER,
            user_key,
            format!("Hi, you are connected with key: {user_key}\n"),
        )
    }

    /// Roster broadcast for a group; `receiver` is the member whose join
    /// triggered it.
    pub fn group_entered(receiver: &str, roster: &[String]) -> Self {
        Self::new(
            MessageType::GroupEntered,
            SERVER_SENDER,
            receiver,
            roster.join(ROSTER_SEPARATOR),
        )
    }

    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_types() {
        let env = Envelope::decode(
            r#"{"type":"offer","sender":"a","receiver":"b","content":"{\"sdp\":\"v=0\"}"}"#,
        )
        .unwrap();
        assert_eq!(env.kind, MessageType::Offer);
        assert_eq!(env.sender, "a");
        assert_eq!(env.receiver, "b");
        assert_eq!(env.content, r#"{"sdp":"v=0"}"#);

        let env = Envelope::decode(r#"{"type":"entergroup","content":"g1"}"#).unwrap();
        assert_eq!(env.kind, MessageType::EnterGroup);
        assert_eq!(env.receiver, "");
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let env = Envelope::decode(r#"{"type":"bye","sender":"a"}"#).unwrap();
        assert_eq!(env.kind, MessageType::Unrecognized("bye".to_string()));
        assert_eq!(env.kind.to_string(), "bye");
    }

    #[test]
    fn test_missing_type_is_malformed() {
        assert!(Envelope::decode(r#"{"sender":"a"}"#).is_err());
        assert!(Envelope::decode("not json").is_err());
    }

    #[test]
    fn test_welcome_envelope() {
        let json = Envelope::welcome("Ab3x").encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "welcome");
        assert_eq!(value["sender"], "server");
        assert_eq!(value["receiver"], "Ab3x");
        assert_eq!(value["content"], "Hi, you are connected with key: Ab3x\n");
    }

    #[test]
    fn test_group_entered_joins_roster_in_order() {
        let roster = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let env = Envelope::group_entered("C", &roster);
        assert_eq!(env.kind, MessageType::GroupEntered);
        assert_eq!(env.content, "A,B,C");
        assert_eq!(env.receiver, "C");
    }
}
