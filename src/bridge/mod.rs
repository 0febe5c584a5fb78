//! The services backing the forms: lead search, contract storage and remote signing.
//!
//! `DataBridge` is implemented by `HttpBridge`, which talks to the backend over HTTP, and by
//! `InMemoryBridge`, a self-contained reference backend used by the tests and the CLI.

use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{error::ContextError, lead::LeadSummary};

pub mod http;
pub mod memory;

pub use http::HttpBridge;
pub use memory::InMemoryBridge;

/// The largest number of leads returned by a search.
pub const SEARCH_RESULT_LIMIT: usize = 10;
/// The number of days a signature request stays valid.
pub const SIGNATURE_REQUEST_VALIDITY_DAYS: i64 = 30;
/// The length of the random token of a signature request.
pub const SIGNATURE_TOKEN_LENGTH: usize = 32;
/// The message of every rejected signature, whatever the reason.
pub const INVALID_SIGNATURE_REQUEST: &str = "Invalid or expired signature request";

/// A finished contract handed over to the backend for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractUpload {
    pub pdf: Vec<u8>,
    pub file_name: String,
    pub contract_type: String,
    pub lead_id: String,
    /// The snapshot of the form values the PDF was generated from.
    pub contract_data: serde_json::Value,
}

/// A contract row stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    pub id: String,
    pub lead_id: String,
    pub contract_type: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default, alias = "googleDriveFileId")]
    pub storage_file_id: Option<String>,
    #[serde(default)]
    pub contract_data: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Where an uploaded contract can be found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub contract: ContractRecord,
    #[serde(alias = "googleDriveFileId")]
    pub storage_file_id: String,
    #[serde(rename = "viewLink")]
    pub view_url: String,
    #[serde(rename = "downloadLink")]
    pub download_url: String,
}

/// The request for a customer to sign a contract remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequestDraft {
    pub lead_id: String,
    pub contract_type: String,
    pub contract_data: serde_json::Value,
    /// The address the signing link is sent to.
    pub lead_email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureStatus {
    Sent,
    /// The signing link was opened at least once.
    Viewed,
    Signed,
}

/// A signature request as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    pub id: String,
    pub lead_id: String,
    pub contract_type: String,
    pub status: SignatureStatus,
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub viewed_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub signed_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub contract_data: serde_json::Value,
    #[serde(default)]
    pub email_sent: bool,
}

impl SignatureRequest {
    /// Whether the request can still be viewed and signed at the given instant. Viewing the
    /// request does not close it.
    pub fn is_open_at(&self, instant: OffsetDateTime) -> bool {
        self.status != SignatureStatus::Signed && self.expires_at > instant
    }
}

/// The record created when a customer signs remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedContract {
    pub id: String,
    pub signature_request_id: String,
    pub lead_id: String,
    pub contract_type: String,
    /// The form values of the request, extended with the signature, its date and the IP address.
    pub contract_data: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub signed_at: OffsetDateTime,
    pub ip_address: String,
}

/// The ways a call to the backend can fail.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// The backend could not be reached.
    Network(ContextError),
    /// The backend did not answer within the configured timeout.
    Timeout,
    /// The request was rejected as malformed, or the signature request is unusable.
    InvalidRequest(String),
    Unauthorized,
    NotFound(String),
    /// The backend failed while handling the request.
    Upstream { status: u16, message: String },
}

impl BridgeError {
    /// The HTTP status code matching the error, `None` when no response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            BridgeError::Network(_) | BridgeError::Timeout => None,
            BridgeError::InvalidRequest(_) => Some(400),
            BridgeError::Unauthorized => Some(401),
            BridgeError::NotFound(_) => Some(404),
            BridgeError::Upstream { status, .. } => Some(*status),
        }
    }

    /// The single message shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            BridgeError::Network(_) => {
                "Unable to reach the server. Please check your connection and try again.".into()
            }
            BridgeError::Timeout => "The server took too long to respond. Please try again.".into(),
            BridgeError::InvalidRequest(message) => message.clone(),
            BridgeError::Unauthorized => "Please sign in to continue.".into(),
            BridgeError::NotFound(message) => message.clone(),
            BridgeError::Upstream { message, .. } => message.clone(),
        }
    }
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::Network(error) => write!(formatter, "Network error: {}", error),
            BridgeError::Timeout => write!(formatter, "The request timed out"),
            BridgeError::InvalidRequest(message) => write!(formatter, "Bad request: {}", message),
            BridgeError::Unauthorized => write!(formatter, "Unauthorized"),
            BridgeError::NotFound(message) => write!(formatter, "Not found: {}", message),
            BridgeError::Upstream { status, message } => {
                write!(formatter, "Server error {}: {}", status, message)
            }
        }
    }
}

impl std::error::Error for BridgeError {}

/// The backend the forms search leads in, store contracts to and send signature requests
/// through.
pub trait DataBridge {
    /// The leads matching the query, at most `SEARCH_RESULT_LIMIT` and most recently updated
    /// first; a blank query matches nothing.
    fn search_leads(&self, query: &str) -> Result<Vec<LeadSummary>, BridgeError>;

    fn upload_contract(&self, upload: ContractUpload) -> Result<UploadReceipt, BridgeError>;

    /// Creates the request and emails the signing link to the lead.
    fn create_signature_request(
        &self,
        draft: SignatureRequestDraft,
    ) -> Result<SignatureRequest, BridgeError>;

    /// Signs the contract of an open request. Unknown, expired and already signed tokens are
    /// all rejected with the same `InvalidRequest`.
    fn record_signature(
        &self,
        token: &str,
        signature: &str,
        client_ip: &str,
    ) -> Result<SignedContract, BridgeError>;
}

/// A random alphanumeric string, used for signature tokens and document identifiers.
pub fn random_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// The form values of a request extended with the remote signature.
pub(crate) fn signed_contract_data(
    contract_data: &serde_json::Value,
    signature: &str,
    signed_at: OffsetDateTime,
    client_ip: &str,
) -> serde_json::Value {
    let mut entries = contract_data.as_object().cloned().unwrap_or_default();
    entries.insert("signature".into(), signature.into());
    entries.insert(
        "signedAt".into(),
        signed_at
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default()
            .into(),
    );
    entries.insert("ipAddress".into(), client_ip.into());
    serde_json::Value::Object(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_error_maps_to_one_status() {
        assert_eq!(BridgeError::Timeout.status_code(), None);
        assert_eq!(
            BridgeError::InvalidRequest(INVALID_SIGNATURE_REQUEST.into()).status_code(),
            Some(400)
        );
        assert_eq!(BridgeError::Unauthorized.status_code(), Some(401));
        assert_eq!(
            BridgeError::Upstream {
                status: 500,
                message: "Failed to upload contract".into()
            }
            .status_code(),
            Some(500)
        );
        assert_eq!(
            BridgeError::InvalidRequest(INVALID_SIGNATURE_REQUEST.into()).user_message(),
            INVALID_SIGNATURE_REQUEST
        );
    }

    #[test]
    fn viewed_requests_stay_open_until_signed_or_expired() {
        let mut request: SignatureRequest = serde_json::from_value(serde_json::json!({
            "id": "request-1",
            "leadId": "lead-1",
            "contractType": "warranty",
            "status": "VIEWED",
            "token": "abc",
            "expiresAt": "2025-04-06T15:30:00Z",
            "viewedAt": "2025-03-08T09:00:00Z",
        }))
        .unwrap();
        let before_expiry = request.expires_at - time::Duration::days(1);

        assert_eq!(request.status, SignatureStatus::Viewed);
        assert!(request.viewed_at.is_some());
        assert!(request.is_open_at(before_expiry));
        assert!(!request.is_open_at(request.expires_at));
        request.status = SignatureStatus::Signed;
        assert!(!request.is_open_at(before_expiry));
    }

    #[test]
    fn tokens_are_alphanumeric() {
        let token = random_token(SIGNATURE_TOKEN_LENGTH);
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|character| character.is_ascii_alphanumeric()));
        assert_ne!(token, random_token(SIGNATURE_TOKEN_LENGTH));
    }

    #[test]
    fn signed_data_keeps_the_form_values() {
        let signed_at = OffsetDateTime::UNIX_EPOCH;
        let data = signed_contract_data(
            &serde_json::json!({ "name": "Jane Doe" }),
            "data:image/png;base64,AAAA",
            signed_at,
            "1.2.3.4",
        );

        similar_asserts::assert_eq!(
            data,
            serde_json::json!({
                "name": "Jane Doe",
                "signature": "data:image/png;base64,AAAA",
                "signedAt": "1970-01-01T00:00:00Z",
                "ipAddress": "1.2.3.4",
            })
        );
    }
}
