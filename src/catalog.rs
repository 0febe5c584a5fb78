use serde::{Deserialize, Serialize};

use crate::{
    document::{DocumentDescriptor, FieldDefault, FieldSpec, SectionSpec},
    lead::LeadAttribute,
    paginate::Margins,
};

const ROOFING_COLORS: &[&str] = &[
    "Weathered Wood",
    "Charcoal",
    "Pewter Gray",
    "Onyx Black",
    "Driftwood",
    "Barkwood",
    "Shakewood",
    "Slate",
    "Hunter Green",
    "Hickory",
    "Mission Brown",
    "Aged Copper",
    "Other",
];

const SIDING_COLORS: &[&str] = &[
    "White",
    "Almond",
    "Beige",
    "Clay",
    "Tan",
    "Khaki",
    "Sandstone",
    "Gray",
    "Light Gray",
    "Slate",
    "Blue",
    "Green",
    "Red",
    "Brown",
    "Other",
];

const GUTTER_COLORS: &[&str] = &[
    "White",
    "Brown",
    "Black",
    "Almond",
    "Clay",
    "Gray",
    "Bronze",
    "Copper",
    "Musket Brown",
    "Royal Brown",
    "Wicker",
    "Other",
];

const TRIM_COLORS: &[&str] = &[
    "White", "Almond", "Clay", "Tan", "Gray", "Black", "Brown", "Bronze", "Other",
];

const COMPANY_NAME: &str = "In-Vision Construction LLC";
const COMPANY_PHONE: &str = "313-247-0142";
const COMPANY_EMAIL: &str = "Info@in-visionconstruction.com";
const COMPANY_ADDRESS: &str = "36712 Chatham Ct, Clinton Township, Mi 48036";

/// The contract types shipped with the application.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    GeneralContract,
    ScopeOfWork,
    Warranty,
    ThirdPartyAuthorization,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::GeneralContract,
        DocumentType::ScopeOfWork,
        DocumentType::Warranty,
        DocumentType::ThirdPartyAuthorization,
    ];

    /// The identifier the backend stores the contracts of this type under.
    pub fn contract_type(&self) -> &'static str {
        match self {
            DocumentType::GeneralContract => "general-contract",
            DocumentType::ScopeOfWork => "scope-of-work",
            DocumentType::Warranty => "warranty",
            DocumentType::ThirdPartyAuthorization => "third-party-authorization",
        }
    }

    pub fn descriptor(&self) -> DocumentDescriptor {
        match self {
            DocumentType::GeneralContract => general_contract(),
            DocumentType::ScopeOfWork => scope_of_work(),
            DocumentType::Warranty => warranty(),
            DocumentType::ThirdPartyAuthorization => third_party_authorization(),
        }
    }
}

fn section(id: &str, title: &str, paragraphs: &[&str], fields: &[&str]) -> SectionSpec {
    SectionSpec {
        id: id.to_string(),
        title: title.to_string(),
        paragraphs: paragraphs.iter().map(|text| text.to_string()).collect(),
        fields: fields.iter().map(|name| name.to_string()).collect(),
    }
}

fn general_contract() -> DocumentDescriptor {
    DocumentDescriptor {
        id: "general-contract".into(),
        title: "General Contract".into(),
        contract_type: DocumentType::GeneralContract.contract_type().into(),
        file_stem: "General-Contract".into(),
        needs_initials: true,
        margins: Margins {
            top: 20.0,
            bottom: 20.0,
            left: 15.0,
            right: 15.0,
        },
        fields: vec![
            FieldSpec::text("name", "Name").prefilled_from(LeadAttribute::FullName),
            FieldSpec::date("date", "Date"),
            FieldSpec::text("projectAddress", "Project Address")
                .prefilled_from(LeadAttribute::Address),
            FieldSpec::text("billingAddress", "Billing Address")
                .prefilled_from(LeadAttribute::Address),
            FieldSpec::text("phone", "Phone").prefilled_from(LeadAttribute::Phone),
            FieldSpec::text("email", "Email").prefilled_from(LeadAttribute::Email),
            FieldSpec::signature("agreesSignature", "Home Owner Signature"),
            FieldSpec::date("agreesDate", "Date"),
            FieldSpec::initials("homeOwnerInitials1", "Home Owner Initials"),
            FieldSpec::text("emailFacsimile", "Email/Facsimile")
                .prefilled_from(LeadAttribute::Email),
            FieldSpec::initials("homeOwnerInitials2", "Home Owner Initials"),
            FieldSpec::initials("homeOwnerInitials3", "Home Owner Initials"),
        ],
        sections: vec![
            section(
                "contract-page-1",
                "In-Vision Construction",
                &[
                    "CUSTOMER'S RIGHT TO CANCEL (MCL 445.113)",
                    "You may cancel this transaction at any time prior to midnight of the third \
                     business day after the date of this transaction.",
                    "If your agreement is with a contractor for work to be paid by your insurance \
                     company, you may also cancel within three business days after you receive \
                     written notice from the insurer that the claim has been denied in whole or in part.",
                ],
                &[
                    "name",
                    "date",
                    "projectAddress",
                    "billingAddress",
                    "phone",
                    "email",
                    "agreesSignature",
                    "agreesDate",
                ],
            ),
            section(
                "contract-page-2",
                "NOTICE TO OWNER",
                &[
                    "Home Owner acknowledges that In-Vision Construction LLC may file a lien \
                     against the property for work performed and not paid for.",
                    "TERMS AND CONDITIONS",
                    "1) The work described in the scope of work is attached hereto and incorporated \
                     herein by this reference. In-Vision Construction LLC hereby agrees to be bound \
                     to the terms of this Agreement.",
                    "2) Home Owner agrees that electronic signatures and initials shall be deemed to \
                     be valid and binding upon the Home Owner as if they were original signatures.",
                ],
                &["homeOwnerInitials1"],
            ),
            section(
                "contract-page-3",
                "TERMS AND CONDITIONS (continued)",
                &[
                    "Notices under this Agreement shall be delivered to the email or facsimile \
                     number given below.",
                    "Home Owner acknowledges that In-Vision Construction LLC may change manufacturers \
                     and/or suppliers of material for the Work without further approval.",
                ],
                &["emailFacsimile"],
            ),
            section(
                "contract-page-4",
                "TERMS AND CONDITIONS (continued)",
                &[
                    "By signing this Agreement Home Owner agrees to be contacted by calls, texts and \
                     faxes from In-Vision Construction LLC until such permission is revoked in \
                     accordance with these Terms.",
                ],
                &["homeOwnerInitials2"],
            ),
            section(
                "contract-page-5",
                "TERMS AND CONDITIONS (continued)",
                &[
                    "This Agreement contains the entire Agreement between the parties hereto.",
                    "Upon signature of this Agreement the Home Owner agrees that they have read and \
                     received a copy of this Agreement.",
                ],
                &["homeOwnerInitials3"],
            ),
        ],
    }
}

fn scope_of_work() -> DocumentDescriptor {
    let checkbox = FieldSpec::checkbox;
    let text = FieldSpec::text;

    DocumentDescriptor {
        id: "scope-of-work".into(),
        title: "Scope of Work".into(),
        contract_type: DocumentType::ScopeOfWork.contract_type().into(),
        file_stem: "Scope-of-Work".into(),
        needs_initials: false,
        margins: Margins::uniform(15.0),
        fields: vec![
            FieldSpec::date("date", "Date"),
            text("customerName", "Customer Name").prefilled_from(LeadAttribute::FullName),
            text("companyName", "Company Name"),
            text("address", "Address").prefilled_from(LeadAttribute::Address),
            // Roofing
            text("roofSpec", "Roof Specification"),
            FieldSpec::select("roofColor", "Roof Color", ROOFING_COLORS),
            checkbox("ventilationPreExisting", "Ventilation Pre-Existing"),
            text("ventilationPreExistingDetails", "Pre-Existing Ventilation Details"),
            checkbox("ventilationAdding", "Ventilation Adding"),
            text("ventilationAddingDetails", "Added Ventilation Details"),
            text("roofingAdditionalInfo", "Roofing Additional Info"),
            // Gutters
            checkbox("guttersDownspouts", "Gutters/Downspouts"),
            checkbox("noneGutters", "No Gutters"),
            checkbox("sizeStandard", "Standard Size"),
            checkbox("sizeOversized", "Oversized"),
            FieldSpec::select("gutterColor", "Gutter Color", GUTTER_COLORS),
            checkbox("hasGutterGuardsYes", "Gutter Guards: Yes"),
            checkbox("hasGutterGuardsNo", "Gutter Guards: No"),
            checkbox("hasWarrantyYes", "Warranty: Yes"),
            checkbox("hasWarrantyNo", "Warranty: No"),
            text("gutterAdditionalInfo", "Gutter Additional Info"),
            // Siding
            text("sidingSpec", "Siding Specification"),
            FieldSpec::select("sidingColor", "Siding Color", SIDING_COLORS),
            FieldSpec::select("cornerColor", "Corner Color", TRIM_COLORS),
            FieldSpec::select("gableVentColor", "Gable Vent Color", TRIM_COLORS),
            checkbox("shutterDetachReset", "Shutters: Detach & Reset Existing"),
            checkbox("shutterReplaceNew", "Shutters: Replace with New"),
            checkbox("shutterRemoveDiscard", "Shutters: Remove & Discard"),
            checkbox("shutterNA", "Shutters: N/A"),
            checkbox("fascia", "Fascia"),
            checkbox("soffit", "Soffit"),
            checkbox("wraps", "Wraps"),
            checkbox("noneFascia", "No Fascia"),
            FieldSpec::select("fasciaColor", "Fascia Color", TRIM_COLORS),
            text("sidingAdditionalInfo", "Siding Additional Info"),
            // Solar
            text("solarCompany", "Solar Company"),
            text("numberOfPanels", "Number of Panels"),
            text("solarContactInfo", "Solar Contact Info"),
            checkbox("solarOwned", "Solar: Owned"),
            checkbox("solarLeased", "Solar: Leased"),
            checkbox("solarNo", "Solar: No"),
            checkbox("solarUnknown", "Solar: Unknown"),
            checkbox("hasCritterCageYes", "Critter Cage: Yes"),
            text("solarAdditionalInfo", "Solar Additional Info"),
            // HOA and miscellaneous
            text("hoaContactInfo", "HOA Contact Info"),
            checkbox("satelliteKeep", "Satellite: Keep"),
            checkbox("satelliteDispose", "Satellite: Dispose"),
            checkbox("noDishExists", "No Dish Exists"),
            checkbox("hasDetachedStructureYes", "Detached Structure: Yes"),
            checkbox("hasDetachedStructureNo", "Detached Structure: No"),
            checkbox("performingWorkYes", "Performing Work on It: Yes"),
            checkbox("performingWorkNo", "Performing Work on It: No"),
            text("detachedDescription", "Detached Structure Description"),
            checkbox("hasDrivewayDamageYes", "Driveway Damage: Yes"),
            checkbox("hasDrivewayDamageNo", "Driveway Damage: No"),
            text("drivewayDescription", "Driveway Description"),
            text("additionalNotes", "Additional Notes"),
            // Approval
            FieldSpec::signature("customerSignature", "Customer Signature"),
            FieldSpec::date("customerSignatureDate", "Date"),
            FieldSpec::signature("invisionSignature", "In-Vision Representative Signature"),
            FieldSpec::date("invisionSignatureDate", "Date"),
        ],
        sections: vec![
            section(
                "scope-page-1",
                "ADDENDUM - SCOPE OF WORK & MATERIAL SELECTION",
                &[],
                &[
                    "date",
                    "customerName",
                    "companyName",
                    "address",
                    "roofSpec",
                    "roofColor",
                    "roofColorCustom",
                    "ventilationPreExisting",
                    "ventilationPreExistingDetails",
                    "ventilationAdding",
                    "ventilationAddingDetails",
                    "roofingAdditionalInfo",
                    "guttersDownspouts",
                    "noneGutters",
                    "sizeStandard",
                    "sizeOversized",
                    "gutterColor",
                    "gutterColorCustom",
                    "hasGutterGuardsYes",
                    "hasGutterGuardsNo",
                    "hasWarrantyYes",
                    "hasWarrantyNo",
                    "gutterAdditionalInfo",
                ],
            ),
            section(
                "scope-page-2",
                "SIDING, SOLAR, HOA & MISCELLANEOUS",
                &[],
                &[
                    "sidingSpec",
                    "sidingColor",
                    "sidingColorCustom",
                    "cornerColor",
                    "cornerColorCustom",
                    "gableVentColor",
                    "gableVentColorCustom",
                    "shutterDetachReset",
                    "shutterReplaceNew",
                    "shutterRemoveDiscard",
                    "shutterNA",
                    "fascia",
                    "soffit",
                    "wraps",
                    "noneFascia",
                    "fasciaColor",
                    "fasciaColorCustom",
                    "sidingAdditionalInfo",
                    "solarCompany",
                    "numberOfPanels",
                    "solarContactInfo",
                    "solarOwned",
                    "solarLeased",
                    "solarNo",
                    "solarUnknown",
                    "hasCritterCageYes",
                    "solarAdditionalInfo",
                    "hoaContactInfo",
                    "satelliteKeep",
                    "satelliteDispose",
                    "noDishExists",
                    "hasDetachedStructureYes",
                    "hasDetachedStructureNo",
                    "performingWorkYes",
                    "performingWorkNo",
                    "detachedDescription",
                    "hasDrivewayDamageYes",
                    "hasDrivewayDamageNo",
                    "drivewayDescription",
                    "additionalNotes",
                ],
            ),
            section(
                "scope-page-3",
                "APPROVAL",
                &["By signing below, the customer approves the scope of work and the material \
                   selections listed in this addendum."],
                &[
                    "customerSignature",
                    "customerSignatureDate",
                    "invisionSignature",
                    "invisionSignatureDate",
                ],
            ),
        ],
    }
}

fn warranty() -> DocumentDescriptor {
    DocumentDescriptor {
        id: "warranty".into(),
        title: "Warranty Contract".into(),
        contract_type: DocumentType::Warranty.contract_type().into(),
        file_stem: "Warranty-Contract".into(),
        needs_initials: false,
        margins: Margins::uniform(15.0),
        fields: vec![
            FieldSpec::text("projectAddress", "Project Address")
                .prefilled_from(LeadAttribute::Address),
            FieldSpec::text("dateOfCompletion", "Date of Completion"),
            FieldSpec::date("date", "Date"),
            FieldSpec::date("agreesDate", "Date"),
            FieldSpec::signature(
                "authorizedRepresentativeSignature",
                "Authorized Representative Signature",
            ),
            FieldSpec::date("authorizedRepresentativeSignatureDate", "Date"),
        ],
        sections: vec![section(
            "warranty-page-1",
            "ROOF REPLACEMENT WARRANTY CERTIFICATE",
            &[
                "1. WARRANTY COVERAGE",
                "In-Vision Construction warrants that the roof replacement performed at the above \
                 project address will be free from defects in workmanship and materials for a \
                 period of two (2) years from the date of project completion.",
                "2. WHAT IS COVERED",
                "Repair or replacement of defective roofing materials. Repair of workmanship issues \
                 that cause leaks or structural problems.",
                "3. EXCLUSIONS AND LIMITATIONS",
                "This warranty does not cover damage caused by natural disasters, severe weather, \
                 improper maintenance, unrelated structural issues or normal wear and tear.",
                "4. CUSTOMER RESPONSIBILITIES",
                "Regular maintenance and inspections, immediate reporting of suspected defects and \
                 access for inspections and repairs.",
                "5. CLAIM PROCESS",
                "Notify In-Vision Construction in writing within 30 days of discovering a defect.",
                "6. LIMITATIONS OF LIABILITY",
                "This warranty is limited to the repair or replacement of defective work or materials.",
                "7. TRANSFERABILITY",
                "This warranty is non-transferable and applies only to the original property owner.",
            ],
            &[
                "projectAddress",
                "dateOfCompletion",
                "authorizedRepresentativeSignature",
                "authorizedRepresentativeSignatureDate",
            ],
        )],
    }
}

fn third_party_authorization() -> DocumentDescriptor {
    let fixed = |value: &str| FieldDefault::Value(value.to_string());

    DocumentDescriptor {
        id: "third-party-authorization".into(),
        title: "Third Party Authorization".into(),
        contract_type: DocumentType::ThirdPartyAuthorization.contract_type().into(),
        file_stem: "Third-Party-Authorization".into(),
        needs_initials: false,
        margins: Margins::uniform(15.0),
        fields: vec![
            FieldSpec::date("date", "Date"),
            FieldSpec::text("homeownerName", "Name").prefilled_from(LeadAttribute::FullName),
            FieldSpec::text("homeownerPhone", "Phone").prefilled_from(LeadAttribute::Phone),
            FieldSpec::text("homeownerAddress", "Property Address")
                .prefilled_from(LeadAttribute::Address),
            FieldSpec::text("authorizedParty1Name", "Name").with_default(fixed(COMPANY_NAME)),
            FieldSpec::text("authorizedParty1Phone", "Phone").with_default(fixed(COMPANY_PHONE)),
            FieldSpec::text("authorizedParty1Email", "Email").with_default(fixed(COMPANY_EMAIL)),
            FieldSpec::text("authorizedParty1Address", "Address")
                .with_default(fixed(COMPANY_ADDRESS)),
            FieldSpec::text("authorizedParty2Name", "Name"),
            FieldSpec::text("authorizedParty2Phone", "Phone"),
            FieldSpec::text("authorizedParty2Email", "Email"),
            FieldSpec::text("authorizedParty2Address", "Address"),
            FieldSpec::text("mortgageCompanyName", "Mortgage Company"),
            FieldSpec::text("loanAccountNumber", "Loan Account Number"),
            FieldSpec::checkbox("helocYes", "HELOC: Yes"),
            FieldSpec::checkbox("helocNo", "HELOC: No").with_default(FieldDefault::Checked),
            FieldSpec::checkbox("reverseMortgageYes", "Reverse Mortgage: Yes"),
            FieldSpec::checkbox("reverseMortgageNo", "Reverse Mortgage: No")
                .with_default(FieldDefault::Checked),
            FieldSpec::text("insuranceCompanyName", "Insurance Company")
                .prefilled_from(LeadAttribute::InsuranceCompany),
            FieldSpec::text("claimNumber", "Claim Number")
                .prefilled_from(LeadAttribute::ClaimNumber),
            FieldSpec::signature("primarySignature", "Primary Homeowner Signature"),
            FieldSpec::text("primaryPrintedName", "Printed Name")
                .prefilled_from(LeadAttribute::FullName),
            FieldSpec::date("primarySignatureDate", "Date"),
            FieldSpec::signature("coSignature", "Co-Homeowner/Spouse Signature"),
            FieldSpec::text("coPrintedName", "Printed Name"),
            FieldSpec::date("coSignatureDate", "Date"),
        ],
        sections: vec![section(
            "authorization-page-1",
            "THIRD PARTY AUTHORIZATION FORM",
            &[
                "The Homeowner/Borrower hereby authorizes the Mortgage Company to release any and \
                 all information requested by Authorized Party 1 and/or Authorized Party 2 \
                 regarding the loan account number given below.",
                "The Homeowner/Borrower authorizes the Mortgage Company to endorse and release any \
                 insurance claim funds related to the property directly to Authorized Party 1 or \
                 jointly to the Homeowner/Borrower and Authorized Party 1.",
                "This authorization remains in effect until revoked in writing. A photocopy or \
                 facsimile of this authorization is as valid as the original.",
            ],
            &[
                "homeownerName",
                "homeownerPhone",
                "homeownerAddress",
                "authorizedParty1Name",
                "authorizedParty1Phone",
                "authorizedParty1Email",
                "authorizedParty1Address",
                "authorizedParty2Name",
                "authorizedParty2Phone",
                "authorizedParty2Email",
                "authorizedParty2Address",
                "mortgageCompanyName",
                "loanAccountNumber",
                "helocYes",
                "helocNo",
                "reverseMortgageYes",
                "reverseMortgageNo",
                "insuranceCompanyName",
                "claimNumber",
                "primarySignature",
                "primaryPrintedName",
                "primarySignatureDate",
                "coSignature",
                "coPrintedName",
                "coSignatureDate",
            ],
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentModel, FieldKind};

    #[test]
    fn every_built_in_descriptor_is_valid() {
        for document_type in DocumentType::ALL {
            let descriptor = document_type.descriptor();
            descriptor.validate().unwrap();
            assert_eq!(descriptor.contract_type, document_type.contract_type());
        }
    }

    #[test]
    fn page_counts_match_the_paper_forms() {
        let page_counts: Vec<usize> = DocumentType::ALL
            .iter()
            .map(|document_type| document_type.descriptor().sections.len())
            .collect();
        assert_eq!(page_counts, vec![5, 3, 1, 1]);
    }

    #[test]
    fn only_the_general_contract_needs_initials_and_wider_margins() {
        let general_contract = DocumentType::GeneralContract.descriptor();
        assert!(general_contract.needs_initials);
        assert_eq!(general_contract.margins.top, 20.0);
        assert!(general_contract
            .fields
            .iter()
            .any(|field| matches!(field.kind, FieldKind::Signature { .. })));

        for document_type in [
            DocumentType::ScopeOfWork,
            DocumentType::Warranty,
            DocumentType::ThirdPartyAuthorization,
        ] {
            let descriptor = document_type.descriptor();
            assert!(!descriptor.needs_initials);
            assert_eq!(descriptor.margins, Margins::uniform(15.0));
        }
    }

    #[test]
    fn company_details_are_filled_in_advance() {
        let model = DocumentModel::new(DocumentType::ThirdPartyAuthorization.descriptor()).unwrap();
        assert_eq!(
            model.field("authorizedParty1Phone").unwrap().as_text(),
            Some("313-247-0142")
        );
        assert_eq!(model.field("helocNo").unwrap().as_checkbox(), Some(true));
        assert_eq!(model.field("coPrintedName").unwrap().as_text(), Some(""));
    }

    #[test]
    fn every_color_list_ends_with_other() {
        for colors in [ROOFING_COLORS, SIDING_COLORS, GUTTER_COLORS, TRIM_COLORS] {
            assert_eq!(colors.last(), Some(&"Other"));
        }
    }
}
