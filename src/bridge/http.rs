use std::time::Duration;

use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{
    BridgeError, ContractUpload, DataBridge, SignatureRequest, SignatureRequestDraft,
    SignedContract, UploadReceipt,
};
use crate::{config::AppConfiguration, error::ContextError, lead::LeadSummary};

/// The client-side timeout of every call when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureRequestResponse {
    signature_request: SignatureRequest,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedContractResponse {
    signed_contract: SignedContract,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignaturePayload<'a> {
    token: &'a str,
    signature: &'a str,
    ip_address: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// The backend reached over HTTP, every call blocking until the answer or the timeout.
pub struct HttpBridge {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpBridge {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        bearer_token: Option<String>,
    ) -> Result<Self, ContextError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("contractr/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| ContextError::with_error("Unable to create the HTTP client", &error))?;

        Ok(HttpBridge {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
        })
    }

    /// Connects to the backend named by the configuration, which is validated first.
    pub fn from_configuration(configuration: &AppConfiguration) -> Result<Self, ContextError> {
        configuration.validate()?;
        let base_url = configuration.bridge_base_url.as_deref().ok_or_else(|| {
            ContextError::with_context("The configuration is missing the bridgeBaseUrl key")
        })?;

        HttpBridge::new(
            base_url,
            configuration.request_timeout(),
            configuration.bridge_token.clone(),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BridgeError> {
        let response = self.authorize(request).send().map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(response));
        }

        response.json::<T>().map_err(|error| BridgeError::Upstream {
            status: status.as_u16(),
            message: format!("Unable to read the response of the server: {}", error),
        })
    }
}

fn transport_error(error: reqwest::Error) -> BridgeError {
    if error.is_timeout() {
        log::warn!("The request to the backend timed out");
        BridgeError::Timeout
    } else {
        BridgeError::Network(ContextError::with_error(
            "Unable to reach the backend",
            &error,
        ))
    }
}

/// Converts an unsuccessful response, preferring the `error` field of a JSON body as message.
fn status_error(response: Response) -> BridgeError {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(error_body) => error_body.error,
        Err(_) if body.trim().is_empty() => format!("The server answered with status {}", status),
        Err(_) => body.trim().to_string(),
    };
    log::warn!("The backend answered {}: {}", status, message);

    match status {
        400 => BridgeError::InvalidRequest(message),
        401 => BridgeError::Unauthorized,
        404 => BridgeError::NotFound(message),
        _ => BridgeError::Upstream { status, message },
    }
}

impl DataBridge for HttpBridge {
    fn search_leads(&self, query: &str) -> Result<Vec<LeadSummary>, BridgeError> {
        self.send(
            self.client
                .get(self.url("/leads/search"))
                .query(&[("q", query)]),
        )
    }

    fn upload_contract(&self, upload: ContractUpload) -> Result<UploadReceipt, BridgeError> {
        let pdf_part = multipart::Part::bytes(upload.pdf)
            .file_name(upload.file_name)
            .mime_str("application/pdf")
            .map_err(|error| BridgeError::InvalidRequest(error.to_string()))?;
        let form = multipart::Form::new()
            .part("pdf", pdf_part)
            .text("leadId", upload.lead_id)
            .text("contractType", upload.contract_type)
            .text("contractData", upload.contract_data.to_string());

        let receipt: UploadReceipt =
            self.send(self.client.post(self.url("/contracts/upload")).multipart(form))?;
        log::info!("Uploaded the contract as {}", receipt.storage_file_id);

        Ok(receipt)
    }

    fn create_signature_request(
        &self,
        draft: SignatureRequestDraft,
    ) -> Result<SignatureRequest, BridgeError> {
        let response: SignatureRequestResponse =
            self.send(self.client.post(self.url("/signature-requests")).json(&draft))?;

        Ok(response.signature_request)
    }

    fn record_signature(
        &self,
        token: &str,
        signature: &str,
        client_ip: &str,
    ) -> Result<SignedContract, BridgeError> {
        let payload = SignaturePayload {
            token,
            signature,
            ip_address: client_ip,
        };
        let response: SignedContractResponse = self.send(
            self.client
                .post(self.url("/signature-requests/sign"))
                .json(&payload),
        )?;

        Ok(response.signed_contract)
    }
}

#[cfg(test)]
mod tests {
    use mockito::{mock, Matcher};

    use super::*;
    use crate::bridge::INVALID_SIGNATURE_REQUEST;

    fn bridge() -> HttpBridge {
        HttpBridge::new(
            &mockito::server_url(),
            Duration::from_secs(5),
            Some("session-token".into()),
        )
        .unwrap()
    }

    #[test]
    fn search_sends_the_query_and_the_session() {
        let _search = mock("GET", "/leads/search")
            .match_query(Matcher::UrlEncoded("q".into(), "smith".into()))
            .match_header("authorization", "Bearer session-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id": "lead-1", "firstName": "Ann", "lastName": "Smith",
                     "updatedAt": "2024-05-01T10:00:00Z"}]"#,
            )
            .create();

        let leads = bridge().search_leads("smith").unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].last_name.as_deref(), Some("Smith"));
        assert!(leads[0].updated_at.is_some());
    }

    #[test]
    fn upload_receipt_is_read_from_the_response() {
        let _upload = mock("POST", "/contracts/upload")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data".into()),
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"success": true,
                    "contract": {"id": "contract-1", "leadId": "lead-1",
                                 "contractType": "warranty",
                                 "createdAt": "2024-05-01T10:00:00Z"},
                    "googleDriveFileId": "file-1",
                    "viewLink": "https://drive.example.com/file-1/view",
                    "downloadLink": "https://drive.example.com/file-1/download"}"#,
            )
            .create();

        let receipt = bridge()
            .upload_contract(ContractUpload {
                pdf: b"%PDF-1.7".to_vec(),
                file_name: "Warranty.pdf".into(),
                contract_type: "warranty".into(),
                lead_id: "lead-1".into(),
                contract_data: serde_json::json!({ "projectAddress": "1 Main St" }),
            })
            .unwrap();

        assert_eq!(receipt.storage_file_id, "file-1");
        assert_eq!(receipt.download_url, "https://drive.example.com/file-1/download");
        assert_eq!(receipt.contract.lead_id, "lead-1");
    }

    #[test]
    fn error_statuses_are_mapped() {
        let _sign = mock("POST", "/signature-requests/sign")
            .with_status(400)
            .with_body(INVALID_SIGNATURE_REQUEST)
            .create();
        let _request = mock("POST", "/signature-requests")
            .with_status(401)
            .with_body("Unauthorized")
            .create();
        let _upload = mock("POST", "/contracts/upload")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "Failed to upload contract"}"#)
            .create();

        let bridge = bridge();
        assert_eq!(
            bridge
                .record_signature("token", "data:,", "1.2.3.4")
                .unwrap_err(),
            BridgeError::InvalidRequest(INVALID_SIGNATURE_REQUEST.into())
        );
        assert_eq!(
            bridge
                .create_signature_request(SignatureRequestDraft {
                    lead_id: "lead-1".into(),
                    contract_type: "warranty".into(),
                    contract_data: serde_json::json!({}),
                    lead_email: "jane@example.com".into(),
                })
                .unwrap_err(),
            BridgeError::Unauthorized
        );
        let upload_error = bridge
            .upload_contract(ContractUpload {
                pdf: b"%PDF-1.7".to_vec(),
                file_name: "Warranty.pdf".into(),
                contract_type: "warranty".into(),
                lead_id: "lead-1".into(),
                contract_data: serde_json::json!({}),
            })
            .unwrap_err();
        assert_eq!(
            upload_error,
            BridgeError::Upstream {
                status: 500,
                message: "Failed to upload contract".into()
            }
        );
        assert_eq!(upload_error.user_message(), "Failed to upload contract");
    }

    #[test]
    fn incomplete_configuration_is_rejected_before_connecting() {
        let mut values = serde_json::json!({
            "identityClientId": "client",
            "identityClientSecret": "secret",
            "sessionSecret": "session",
            "mapsApiKey": "maps",
            "storageCredentialsPath": "credentials.json",
            "storageFolderId": "folder",
            "emailApiKey": "email",
            "appUrl": "https://forms.example.com",
            "bridgeBaseUrl": "https://forms.example.com/api/",
            "requestTimeoutSeconds": 5,
        });
        let configuration: AppConfiguration = serde_json::from_value(values.clone()).unwrap();
        let bridge = HttpBridge::from_configuration(&configuration).unwrap();
        assert_eq!(bridge.url("/leads/search"), "https://forms.example.com/api/leads/search");

        values.as_object_mut().unwrap().remove("sessionSecret");
        let configuration: AppConfiguration = serde_json::from_value(values).unwrap();
        let error = HttpBridge::from_configuration(&configuration)
            .err()
            .unwrap();
        assert_eq!(
            error.to_string(),
            "Missing required configuration keys: sessionSecret"
        );
    }

    #[test]
    fn silent_backend_times_out() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            // Hold the connection open without ever answering
            if let Ok((stream, _)) = listener.accept() {
                std::thread::sleep(Duration::from_secs(5));
                drop(stream);
            }
        });

        let bridge = HttpBridge::new(
            &format!("http://{}", address),
            Duration::from_millis(200),
            None,
        )
        .unwrap();
        let error = bridge.search_leads("smith").unwrap_err();

        assert_eq!(error, BridgeError::Timeout);
        assert_eq!(error.status_code(), None);
        assert_eq!(
            error.user_message(),
            "The server took too long to respond. Please try again."
        );
    }

    #[test]
    fn unreachable_backend_is_a_network_error() {
        let bridge = HttpBridge::new("http://127.0.0.1:9", Duration::from_secs(2), None).unwrap();
        assert!(matches!(
            bridge.search_leads("smith"),
            Err(BridgeError::Network(_)) | Err(BridgeError::Timeout)
        ));
    }
}
