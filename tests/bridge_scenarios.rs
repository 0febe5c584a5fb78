use contractr::{
    bridge::{
        BridgeError, DataBridge, InMemoryBridge, SignatureRequestDraft, SignatureStatus,
        INVALID_SIGNATURE_REQUEST,
    },
    catalog::DocumentType,
    document::DocumentModel,
    lead::Lead,
};
use time::{macros::datetime, Duration, OffsetDateTime};

const NOW: OffsetDateTime = datetime!(2025-03-07 15:30:00 UTC);

fn bridge() -> InMemoryBridge {
    let bridge = InMemoryBridge::new("https://forms.example.com").with_clock(|| NOW);
    bridge.sign_in("user-1");
    bridge
}

#[test]
fn signature_request_can_be_signed_once() {
    let bridge = bridge();
    bridge.insert_lead(Lead {
        id: "lead-jane".into(),
        first_name: Some("Jane".into()),
        last_name: Some("Doe".into()),
        email: Some("jane@example.com".into()),
        ..Lead::default()
    });
    let model = DocumentModel::new(DocumentType::Warranty.descriptor()).unwrap();

    let request = bridge
        .create_signature_request(SignatureRequestDraft {
            lead_id: "lead-jane".into(),
            contract_type: model.descriptor().contract_type.clone(),
            contract_data: model.snapshot(),
            lead_email: "jane@example.com".into(),
        })
        .unwrap();
    assert_eq!(request.token.len(), 32);
    assert_eq!(request.expires_at, NOW + Duration::days(30));
    assert_eq!(request.status, SignatureStatus::Sent);

    let outbox = bridge.outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].to, "jane@example.com");
    assert!(outbox[0]
        .html
        .contains(&format!("https://forms.example.com/sign/{}", request.token)));

    let signed_contract = bridge
        .record_signature(&request.token, "data:image/png;base64,AAAA", "1.2.3.4")
        .unwrap();
    assert_eq!(signed_contract.ip_address, "1.2.3.4");
    assert_eq!(signed_contract.signed_at, NOW);
    assert_eq!(
        signed_contract.contract_data["signature"],
        "data:image/png;base64,AAAA"
    );
    assert_eq!(
        bridge.signature_request(&request.token).unwrap().status,
        SignatureStatus::Signed
    );

    let outbox = bridge.outbox();
    assert_eq!(outbox.len(), 2);
    assert_eq!(outbox[1].subject, "Document Signed Successfully");
    assert!(outbox[1].html.contains("03/07/2025"));

    let second_attempt = bridge
        .record_signature(&request.token, "data:image/png;base64,AAAA", "1.2.3.4")
        .unwrap_err();
    assert_eq!(
        second_attempt,
        BridgeError::InvalidRequest(INVALID_SIGNATURE_REQUEST.into())
    );
    assert_eq!(second_attempt.status_code(), Some(400));
    assert_eq!(bridge.signed_contracts().len(), 1);
}

#[test]
fn search_returns_the_ten_most_recent_matches() {
    let bridge = bridge();
    for index in 0..12 {
        bridge.insert_lead(Lead {
            id: format!("lead-{}", index),
            first_name: Some(format!("Customer {}", index)),
            last_name: Some("Smith".into()),
            updated_at: Some(NOW - Duration::days(index)),
            ..Lead::default()
        });
    }
    bridge.insert_lead(Lead {
        id: "lead-other".into(),
        last_name: Some("Jones".into()),
        updated_at: Some(NOW),
        ..Lead::default()
    });

    let leads = bridge.search_leads("smith").unwrap();
    assert_eq!(leads.len(), 10);
    let identifiers: Vec<String> = leads.iter().map(|lead| lead.id.clone()).collect();
    similar_asserts::assert_eq!(
        identifiers,
        (0..10).map(|index| format!("lead-{}", index)).collect::<Vec<_>>()
    );
    assert!(leads
        .windows(2)
        .all(|pair| pair[0].updated_at >= pair[1].updated_at));

    assert!(bridge.search_leads("").unwrap().is_empty());
}

#[test]
fn search_matches_insurance_details() {
    let bridge = bridge();
    bridge.insert_lead(Lead {
        id: "lead-claim".into(),
        insurance_company: Some("Great Lakes Mutual".into()),
        claim_number: Some("CLM-00042".into()),
        ..Lead::default()
    });

    assert_eq!(bridge.search_leads("clm-000").unwrap().len(), 1);
    assert_eq!(bridge.search_leads("LAKES").unwrap().len(), 1);
    assert!(bridge.search_leads("hail").unwrap().is_empty());
}
