use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap},
};

use time::{Duration, OffsetDateTime};

use super::{
    random_token, signed_contract_data, BridgeError, ContractRecord, ContractUpload, DataBridge,
    SignatureRequest, SignatureRequestDraft, SignatureStatus, SignedContract, UploadReceipt,
    INVALID_SIGNATURE_REQUEST, SEARCH_RESULT_LIMIT, SIGNATURE_REQUEST_VALIDITY_DAYS,
    SIGNATURE_TOKEN_LENGTH,
};
use crate::{
    document::format_display_date,
    lead::{Lead, LeadSummary},
};

type Clock = Box<dyn Fn() -> OffsetDateTime>;

/// An email handed over to the mail service.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// A backend kept entirely in memory, with the same rules as the real one: sessions, lead
/// search, file storage, signature requests and their emails.
pub struct InMemoryBridge {
    app_url: String,
    clock: Clock,
    signed_in_user: RefCell<Option<String>>,
    leads: RefCell<Vec<Lead>>,
    contracts: RefCell<Vec<ContractRecord>>,
    stored_files: RefCell<BTreeMap<String, Vec<u8>>>,
    signature_requests: RefCell<Vec<SignatureRequest>>,
    /// The address every signature request was sent to, by request identifier.
    recipients: RefCell<HashMap<String, String>>,
    signed_contracts: RefCell<Vec<SignedContract>>,
    outbox: RefCell<Vec<OutgoingEmail>>,
    next_identifier: Cell<u64>,
}

impl InMemoryBridge {
    /// Creates an empty backend whose signing links point to `app_url`.
    pub fn new<S: Into<String>>(app_url: S) -> Self {
        InMemoryBridge {
            app_url: app_url.into().trim_end_matches('/').to_string(),
            clock: Box::new(OffsetDateTime::now_utc),
            signed_in_user: RefCell::new(None),
            leads: RefCell::new(Vec::new()),
            contracts: RefCell::new(Vec::new()),
            stored_files: RefCell::new(BTreeMap::new()),
            signature_requests: RefCell::new(Vec::new()),
            recipients: RefCell::new(HashMap::new()),
            signed_contracts: RefCell::new(Vec::new()),
            outbox: RefCell::new(Vec::new()),
            next_identifier: Cell::new(1),
        }
    }

    /// Replaces the source of the current time.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> OffsetDateTime + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    pub fn sign_in<S: Into<String>>(&self, user_id: S) {
        self.signed_in_user.replace(Some(user_id.into()));
    }

    pub fn sign_out(&self) {
        self.signed_in_user.replace(None);
    }

    pub fn insert_lead(&self, lead: Lead) {
        let mut leads = self.leads.borrow_mut();
        leads.retain(|stored_lead| stored_lead.id != lead.id);
        leads.push(lead);
    }

    /// The contracts stored for a lead, most recently created first.
    pub fn contracts_for_lead(&self, lead_id: &str) -> Vec<ContractRecord> {
        // Later uploads come first among contracts created at the same instant
        let mut contracts: Vec<ContractRecord> = self
            .contracts
            .borrow()
            .iter()
            .rev()
            .filter(|contract| contract.lead_id == lead_id)
            .cloned()
            .collect();
        contracts.sort_by(|first, second| second.created_at.cmp(&first.created_at));
        contracts
    }

    pub fn contract(&self, contract_id: &str) -> Option<ContractRecord> {
        self.contracts
            .borrow()
            .iter()
            .find(|contract| contract.id == contract_id)
            .cloned()
    }

    /// Removes a contract together with its stored file.
    pub fn delete_contract(&self, contract_id: &str) -> Result<ContractRecord, BridgeError> {
        let mut contracts = self.contracts.borrow_mut();
        let Some(position) = contracts
            .iter()
            .position(|contract| contract.id == contract_id)
        else {
            return Err(BridgeError::NotFound("Contract not found".into()));
        };
        let contract = contracts.remove(position);
        drop(contracts);

        if let Some(storage_file_id) = &contract.storage_file_id {
            if self.stored_files.borrow_mut().remove(storage_file_id).is_none() {
                log::warn!("The stored file {} was already gone", storage_file_id);
            }
        }
        log::info!("Deleted the contract {}", contract.id);

        Ok(contract)
    }

    /// Opens the signing link of a request, marking it viewed the first time. Unknown, expired
    /// and signed requests are all not found.
    pub fn view_signature_request(&self, token: &str) -> Result<SignatureRequest, BridgeError> {
        let now = self.now();
        let mut requests = self.signature_requests.borrow_mut();
        let Some(request) = requests
            .iter_mut()
            .find(|request| request.token == token && request.is_open_at(now))
        else {
            return Err(BridgeError::NotFound(INVALID_SIGNATURE_REQUEST.into()));
        };

        if request.viewed_at.is_none() {
            request.viewed_at = Some(now);
            request.status = SignatureStatus::Viewed;
        }

        Ok(request.clone())
    }

    pub fn stored_file(&self, storage_file_id: &str) -> Option<Vec<u8>> {
        self.stored_files.borrow().get(storage_file_id).cloned()
    }

    pub fn signature_request(&self, token: &str) -> Option<SignatureRequest> {
        self.signature_requests
            .borrow()
            .iter()
            .find(|request| request.token == token)
            .cloned()
    }

    pub fn signed_contracts(&self) -> Vec<SignedContract> {
        self.signed_contracts.borrow().clone()
    }

    /// Every email sent so far, oldest first.
    pub fn outbox(&self) -> Vec<OutgoingEmail> {
        self.outbox.borrow().clone()
    }

    fn now(&self) -> OffsetDateTime {
        (self.clock)()
    }

    fn require_session(&self) -> Result<String, BridgeError> {
        self.signed_in_user
            .borrow()
            .clone()
            .ok_or(BridgeError::Unauthorized)
    }

    fn next_identifier(&self, prefix: &str) -> String {
        let identifier = self.next_identifier.get();
        self.next_identifier.set(identifier + 1);
        format!("{}-{}", prefix, identifier)
    }

    fn send_email(&self, email: OutgoingEmail) {
        log::info!("Sending {:?} to {:?}", email.subject, email.to);
        self.outbox.borrow_mut().push(email);
    }
}

impl DataBridge for InMemoryBridge {
    fn search_leads(&self, query: &str) -> Result<Vec<LeadSummary>, BridgeError> {
        self.require_session()?;
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let leads = self.leads.borrow();
        let mut matches: Vec<&Lead> = leads
            .iter()
            .filter(|lead| {
                lead.searchable_values()
                    .into_iter()
                    .flatten()
                    .any(|value| value.to_lowercase().contains(&query))
            })
            .collect();
        matches.sort_by(|first, second| second.updated_at.cmp(&first.updated_at));

        Ok(matches
            .into_iter()
            .take(SEARCH_RESULT_LIMIT)
            .map(Lead::summary)
            .collect())
    }

    fn upload_contract(&self, upload: ContractUpload) -> Result<UploadReceipt, BridgeError> {
        self.require_session()?;
        if upload.pdf.is_empty() || upload.lead_id.is_empty() || upload.contract_type.is_empty() {
            return Err(BridgeError::InvalidRequest(
                "Missing required fields: pdf, leadId, contractType".into(),
            ));
        }
        if !self.leads.borrow().iter().any(|lead| lead.id == upload.lead_id) {
            return Err(BridgeError::NotFound(format!(
                "Lead {} not found",
                upload.lead_id
            )));
        }

        let storage_file_id = self.next_identifier("file");
        self.stored_files
            .borrow_mut()
            .insert(storage_file_id.clone(), upload.pdf);
        let contract = ContractRecord {
            id: self.next_identifier("contract"),
            lead_id: upload.lead_id,
            contract_type: upload.contract_type,
            file_name: Some(upload.file_name),
            storage_file_id: Some(storage_file_id.clone()),
            contract_data: upload.contract_data,
            created_at: self.now(),
        };
        self.contracts.borrow_mut().push(contract.clone());
        log::info!(
            "Stored the {} contract of the lead {} as {}",
            contract.contract_type,
            contract.lead_id,
            storage_file_id
        );

        Ok(UploadReceipt {
            contract,
            view_url: format!("{}/files/{}/view", self.app_url, storage_file_id),
            download_url: format!("{}/files/{}/download", self.app_url, storage_file_id),
            storage_file_id,
        })
    }

    fn create_signature_request(
        &self,
        draft: SignatureRequestDraft,
    ) -> Result<SignatureRequest, BridgeError> {
        self.require_session()?;
        if draft.lead_email.trim().is_empty() {
            return Err(BridgeError::InvalidRequest(
                "The lead has no email address".into(),
            ));
        }

        let request = SignatureRequest {
            id: self.next_identifier("request"),
            lead_id: draft.lead_id,
            contract_type: draft.contract_type,
            status: SignatureStatus::Sent,
            token: random_token(SIGNATURE_TOKEN_LENGTH),
            expires_at: self.now() + Duration::days(SIGNATURE_REQUEST_VALIDITY_DAYS),
            viewed_at: None,
            signed_at: None,
            contract_data: draft.contract_data,
            email_sent: true,
        };

        let signature_url = format!("{}/sign/{}", self.app_url, request.token);
        self.send_email(OutgoingEmail {
            to: draft.lead_email.clone(),
            subject: "Document Ready for Signature".into(),
            html: format!(
                "<h1>Document Ready for Your Signature</h1>\
                 <p>A document has been sent to you for electronic signature.</p>\
                 <p>Please click the link below to view and sign the document:</p>\
                 <a href=\"{}\">View and Sign Document</a>\
                 <p>This link will expire in {} days.</p>\
                 <p>If you did not request this document, please ignore this email.</p>",
                signature_url, SIGNATURE_REQUEST_VALIDITY_DAYS
            ),
        });

        self.recipients
            .borrow_mut()
            .insert(request.id.clone(), draft.lead_email);
        self.signature_requests.borrow_mut().push(request.clone());

        Ok(request)
    }

    fn record_signature(
        &self,
        token: &str,
        signature: &str,
        client_ip: &str,
    ) -> Result<SignedContract, BridgeError> {
        let now = self.now();
        let mut requests = self.signature_requests.borrow_mut();
        let Some(request) = requests
            .iter_mut()
            .find(|request| request.token == token && request.is_open_at(now))
        else {
            log::warn!("Rejected a signature for an unusable request");
            return Err(BridgeError::InvalidRequest(INVALID_SIGNATURE_REQUEST.into()));
        };

        request.status = SignatureStatus::Signed;
        request.signed_at = Some(now);
        let signed_contract = SignedContract {
            id: self.next_identifier("signed"),
            signature_request_id: request.id.clone(),
            lead_id: request.lead_id.clone(),
            contract_type: request.contract_type.clone(),
            contract_data: signed_contract_data(&request.contract_data, signature, now, client_ip),
            signed_at: now,
            ip_address: client_ip.to_string(),
        };
        let recipient = self.recipients.borrow().get(&request.id).cloned();
        let contract_type = request.contract_type.clone();
        drop(requests);

        self.signed_contracts
            .borrow_mut()
            .push(signed_contract.clone());
        if let Some(recipient) = recipient {
            self.send_email(OutgoingEmail {
                to: recipient,
                subject: "Document Signed Successfully".into(),
                html: format!(
                    "<h1>Document Signed Successfully</h1>\
                     <p>Thank you for signing the document. This email confirms that the \
                     document has been signed successfully.</p>\
                     <p>Document Details:</p>\
                     <ul><li>Document Type: {}</li><li>Signed Date: {}</li></ul>\
                     <p>A copy of the signed document will be sent to you shortly.</p>",
                    contract_type,
                    format_display_date(now.date())
                ),
            });
        }

        Ok(signed_contract)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    fn lead(id: &str, first_name: &str) -> Lead {
        Lead {
            id: id.into(),
            first_name: Some(first_name.into()),
            last_name: Some("Doe".into()),
            email: Some(format!("{}@example.com", id)),
            ..Lead::default()
        }
    }

    fn upload(lead_id: &str) -> ContractUpload {
        ContractUpload {
            pdf: b"%PDF-1.7".to_vec(),
            file_name: "Warranty.pdf".into(),
            contract_type: "warranty".into(),
            lead_id: lead_id.into(),
            contract_data: serde_json::json!({}),
        }
    }

    #[test]
    fn every_authenticated_call_requires_a_session() {
        let bridge = InMemoryBridge::new("https://forms.example.com");
        bridge.insert_lead(lead("lead-1", "Jane"));

        assert_eq!(bridge.search_leads("jane"), Err(BridgeError::Unauthorized));
        assert_eq!(
            bridge.upload_contract(upload("lead-1")).unwrap_err(),
            BridgeError::Unauthorized
        );

        bridge.sign_in("user-1");
        assert_eq!(bridge.search_leads("JANE").unwrap().len(), 1);
        bridge.sign_out();
        assert_eq!(
            bridge.search_leads("jane").unwrap_err().status_code(),
            Some(401)
        );
    }

    #[test]
    fn blank_queries_match_nothing() {
        let bridge = InMemoryBridge::new("https://forms.example.com");
        bridge.sign_in("user-1");
        bridge.insert_lead(lead("lead-1", "Jane"));

        assert!(bridge.search_leads("").unwrap().is_empty());
        assert!(bridge.search_leads("   ").unwrap().is_empty());
    }

    #[test]
    fn uploads_are_stored_against_the_lead() {
        let bridge = InMemoryBridge::new("https://forms.example.com/");
        bridge.sign_in("user-1");
        bridge.insert_lead(lead("lead-1", "Jane"));

        let receipt = bridge.upload_contract(upload("lead-1")).unwrap();
        assert_eq!(
            bridge.stored_file(&receipt.storage_file_id).as_deref(),
            Some(&b"%PDF-1.7"[..])
        );
        assert!(receipt
            .view_url
            .starts_with("https://forms.example.com/files/"));
        assert_eq!(bridge.contracts_for_lead("lead-1"), vec![receipt.contract]);

        assert!(matches!(
            bridge.upload_contract(upload("lead-2")),
            Err(BridgeError::NotFound(_))
        ));
        let mut incomplete = upload("lead-1");
        incomplete.pdf.clear();
        assert_eq!(
            bridge.upload_contract(incomplete).unwrap_err().status_code(),
            Some(400)
        );
    }

    #[test]
    fn contracts_are_listed_newest_first_and_deleted_with_their_file() {
        let now = Rc::new(Cell::new(OffsetDateTime::UNIX_EPOCH));
        let clock = now.clone();
        let bridge =
            InMemoryBridge::new("https://forms.example.com").with_clock(move || clock.get());
        bridge.sign_in("user-1");
        bridge.insert_lead(lead("lead-1", "Jane"));

        let first = bridge.upload_contract(upload("lead-1")).unwrap();
        now.set(OffsetDateTime::UNIX_EPOCH + Duration::hours(1));
        let second = bridge.upload_contract(upload("lead-1")).unwrap();
        let third = bridge.upload_contract(upload("lead-1")).unwrap();

        let identifiers: Vec<String> = bridge
            .contracts_for_lead("lead-1")
            .into_iter()
            .map(|contract| contract.id)
            .collect();
        similar_asserts::assert_eq!(
            identifiers,
            vec![
                third.contract.id.clone(),
                second.contract.id.clone(),
                first.contract.id.clone()
            ]
        );

        assert_eq!(bridge.contract(&second.contract.id), Some(second.contract.clone()));
        assert_eq!(
            bridge.delete_contract(&second.contract.id).unwrap(),
            second.contract.clone()
        );
        assert!(bridge.contract(&second.contract.id).is_none());
        assert!(bridge.stored_file(&second.storage_file_id).is_none());
        assert!(bridge.stored_file(&first.storage_file_id).is_some());
        assert_eq!(bridge.contracts_for_lead("lead-1").len(), 2);
        assert_eq!(
            bridge.delete_contract(&second.contract.id).unwrap_err(),
            BridgeError::NotFound("Contract not found".into())
        );
    }

    #[test]
    fn viewed_requests_can_still_be_signed() {
        let now = Rc::new(Cell::new(OffsetDateTime::UNIX_EPOCH));
        let clock = now.clone();
        let bridge =
            InMemoryBridge::new("https://forms.example.com").with_clock(move || clock.get());
        bridge.sign_in("user-1");
        let request = bridge
            .create_signature_request(SignatureRequestDraft {
                lead_id: "lead-1".into(),
                contract_type: "warranty".into(),
                contract_data: serde_json::json!({}),
                lead_email: "jane@example.com".into(),
            })
            .unwrap();

        now.set(OffsetDateTime::UNIX_EPOCH + Duration::hours(2));
        let viewed = bridge.view_signature_request(&request.token).unwrap();
        assert_eq!(viewed.status, SignatureStatus::Viewed);
        assert_eq!(viewed.viewed_at, Some(now.get()));

        // Opening the link again keeps the first view
        now.set(OffsetDateTime::UNIX_EPOCH + Duration::hours(3));
        let viewed_again = bridge.view_signature_request(&request.token).unwrap();
        assert_eq!(
            viewed_again.viewed_at,
            Some(OffsetDateTime::UNIX_EPOCH + Duration::hours(2))
        );

        assert!(bridge
            .record_signature(&request.token, "data:,", "1.2.3.4")
            .is_ok());
        let signed = bridge.signature_request(&request.token).unwrap();
        assert_eq!(signed.status, SignatureStatus::Signed);
        assert!(signed.viewed_at.is_some());
        assert!(matches!(
            bridge.view_signature_request(&request.token),
            Err(BridgeError::NotFound(_))
        ));
        assert!(matches!(
            bridge.view_signature_request("unknown"),
            Err(BridgeError::NotFound(_))
        ));
    }

    #[test]
    fn expired_requests_cannot_be_signed() {
        let now = Rc::new(Cell::new(OffsetDateTime::UNIX_EPOCH));
        let clock = now.clone();
        let bridge =
            InMemoryBridge::new("https://forms.example.com").with_clock(move || clock.get());
        bridge.sign_in("user-1");

        let request = bridge
            .create_signature_request(SignatureRequestDraft {
                lead_id: "lead-1".into(),
                contract_type: "warranty".into(),
                contract_data: serde_json::json!({}),
                lead_email: "jane@example.com".into(),
            })
            .unwrap();

        now.set(request.expires_at);
        assert_eq!(
            bridge
                .record_signature(&request.token, "data:,", "1.2.3.4")
                .unwrap_err(),
            BridgeError::InvalidRequest(INVALID_SIGNATURE_REQUEST.into())
        );
        assert_eq!(
            bridge
                .record_signature("unknown", "data:,", "1.2.3.4")
                .unwrap_err(),
            BridgeError::InvalidRequest(INVALID_SIGNATURE_REQUEST.into())
        );

        now.set(request.expires_at - Duration::seconds(1));
        assert!(bridge
            .record_signature(&request.token, "data:,", "1.2.3.4")
            .is_ok());
    }
}
