//! Discord interaction payloads and request signature checks.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::discord::embed::MessagePayload;
use crate::error::{BotError, BotResult};

/// Interaction type sent by Discord to validate the endpoint.
pub const INTERACTION_PING: u8 = 1;
/// Interaction type for slash command invocations.
pub const INTERACTION_APPLICATION_COMMAND: u8 = 2;

const RESPONSE_PONG: u8 = 1;
const RESPONSE_MESSAGE: u8 = 4;
const RESPONSE_DEFERRED: u8 = 5;

/// Command data of an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionData {
    /// Invoked command name.
    pub name: String,
}

/// An incoming interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// Interaction type.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Interaction id.
    #[serde(default)]
    pub id: String,
    /// Application the interaction targets.
    #[serde(default)]
    pub application_id: String,
    /// Continuation token for follow-up edits.
    #[serde(default)]
    pub token: String,
    /// Command data, present for commands.
    #[serde(default)]
    pub data: Option<InteractionData>,
}

impl Interaction {
    /// Returns true for endpoint validation pings.
    #[must_use]
    pub const fn is_ping(&self) -> bool {
        self.kind == INTERACTION_PING
    }

    /// Returns the command name for command interactions.
    #[must_use]
    pub fn command_name(&self) -> Option<&str> {
        if self.kind != INTERACTION_APPLICATION_COMMAND {
            return None;
        }
        self.data.as_ref().map(|data| data.name.as_str())
    }
}

/// A reply to an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionResponse {
    /// Response type.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Message body, for message replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<MessagePayload>,
}

impl InteractionResponse {
    /// Acknowledges a ping.
    #[must_use]
    pub const fn pong() -> Self {
        Self {
            kind: RESPONSE_PONG,
            data: None,
        }
    }

    /// Replies immediately with a message.
    #[must_use]
    pub const fn message(payload: MessagePayload) -> Self {
        Self {
            kind: RESPONSE_MESSAGE,
            data: Some(payload),
        }
    }

    /// Acknowledges now; the reply follows as an edit.
    #[must_use]
    pub const fn deferred() -> Self {
        Self {
            kind: RESPONSE_DEFERRED,
            data: None,
        }
    }
}

/// Verifies the ed25519 signatures Discord puts on interaction requests.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    /// Creates a verifier from the application's hex public key.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key is not a valid ed25519 key.
    pub fn from_hex(public_key: &str) -> BotResult<Self> {
        let bytes: [u8; 32] = hex::decode(public_key.trim())
            .map_err(|e| BotError::Config(format!("public key is not hex: {e}")))?
            .try_into()
            .map_err(|_| BotError::Config("public key must be 32 bytes".to_string()))?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| BotError::Config(format!("invalid public key: {e}")))?;
        Ok(Self { key })
    }

    /// Wraps an existing key.
    #[must_use]
    pub const fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Checks `signature_hex` over `timestamp || body`.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Signature`] if the signature is malformed or wrong.
    pub fn verify(&self, signature_hex: &str, timestamp: &str, body: &[u8]) -> BotResult<()> {
        let bytes: [u8; 64] = hex::decode(signature_hex)
            .map_err(|_| BotError::Signature)?
            .try_into()
            .map_err(|_| BotError::Signature)?;
        let signature = Signature::from_bytes(&bytes);

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        self.key
            .verify(&message, &signature)
            .map_err(|_| BotError::Signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn keypair() -> (SigningKey, String) {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let public_hex = hex::encode(signing_key.verifying_key().as_bytes());
        (signing_key, public_hex)
    }

    fn sign(key: &SigningKey, timestamp: &str, body: &[u8]) -> String {
        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(body);
        hex::encode(key.sign(&message).to_bytes())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let (key, public_hex) = keypair();
        let verifier = SignatureVerifier::from_hex(&public_hex).unwrap();
        let body = br#"{"type":1}"#;
        let signature = sign(&key, "1700000000", body);

        assert!(verifier.verify(&signature, "1700000000", body).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let (key, public_hex) = keypair();
        let verifier = SignatureVerifier::from_hex(&public_hex).unwrap();
        let signature = sign(&key, "1700000000", br#"{"type":1}"#);

        let result = verifier.verify(&signature, "1700000000", br#"{"type":2}"#);
        assert!(matches!(result, Err(BotError::Signature)));
    }

    #[test]
    fn test_wrong_timestamp_rejected() {
        let (key, public_hex) = keypair();
        let verifier = SignatureVerifier::from_hex(&public_hex).unwrap();
        let body = br#"{"type":1}"#;
        let signature = sign(&key, "1700000000", body);

        assert!(verifier.verify(&signature, "1700000001", body).is_err());
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let (_, public_hex) = keypair();
        let verifier = SignatureVerifier::from_hex(&public_hex).unwrap();

        assert!(matches!(
            verifier.verify("not-hex", "1", b"{}"),
            Err(BotError::Signature)
        ));
        assert!(matches!(
            verifier.verify("abcd", "1", b"{}"),
            Err(BotError::Signature)
        ));
    }

    #[test]
    fn test_bad_public_key() {
        assert!(matches!(
            SignatureVerifier::from_hex("zz"),
            Err(BotError::Config(_))
        ));
        assert!(matches!(
            SignatureVerifier::from_hex("abcd"),
            Err(BotError::Config(_))
        ));
    }

    #[test]
    fn test_parse_command_interaction() {
        let json = r#"{
            "type": 2,
            "id": "1",
            "application_id": "555",
            "token": "tok",
            "data": { "name": "status", "id": "9" }
        }"#;
        let interaction: Interaction = serde_json::from_str(json).unwrap();

        assert!(!interaction.is_ping());
        assert_eq!(interaction.command_name(), Some("status"));
        assert_eq!(interaction.token, "tok");
    }

    #[test]
    fn test_ping_has_no_command() {
        let interaction: Interaction = serde_json::from_str(r#"{"type":1}"#).unwrap();
        assert!(interaction.is_ping());
        assert_eq!(interaction.command_name(), None);
    }

    #[test]
    fn test_response_serialization() {
        let pong = serde_json::to_value(InteractionResponse::pong()).unwrap();
        assert_eq!(pong, serde_json::json!({ "type": 1 }));

        let deferred = serde_json::to_value(InteractionResponse::deferred()).unwrap();
        assert_eq!(deferred["type"], 5);

        let message =
            serde_json::to_value(InteractionResponse::message(MessagePayload::text("hi"))).unwrap();
        assert_eq!(message["type"], 4);
        assert_eq!(message["data"]["content"], "hi");
    }
}
