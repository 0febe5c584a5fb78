use std::{
    collections::{BTreeSet, HashMap},
    path::Path,
};

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    error::{ContextError, FieldError},
    lead::{Lead, LeadAttribute},
    paginate::Margins,
    signature::{MarkKind, SignatureImage, SignatureMode},
};

/// The option of a select field which defers to the parallel free-text override.
pub const OTHER_OPTION: &str = "Other";
/// The suffix of the free-text override field generated for every select field.
pub const CUSTOM_SUFFIX: &str = "Custom";

/// The kind of value a field holds and how it is presented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Date,
    Checkbox,
    /// A choice among fixed options, the last of which is usually `"Other"`.
    Select { options: Vec<String> },
    Signature { mark: MarkKind },
}

impl FieldKind {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Date => "date",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Select { .. } => "select",
            FieldKind::Signature { .. } => "signature",
        }
    }
}

/// The current value of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Checkbox(bool),
    Signature(SignatureImage),
}

impl FieldValue {
    fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Checkbox(_) => "checkbox",
            FieldValue::Signature(_) => "signature",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_checkbox(&self) -> Option<bool> {
        match self {
            FieldValue::Checkbox(checked) => Some(*checked),
            _ => None,
        }
    }

    pub fn as_signature(&self) -> Option<&SignatureImage> {
        match self {
            FieldValue::Signature(signature) => Some(signature),
            _ => None,
        }
    }
}

/// The value a field starts with when the document is opened.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum FieldDefault {
    /// Empty text, unchecked box or no signature.
    #[default]
    Blank,
    /// The current date as `MM/DD/YYYY`.
    Today,
    /// A fixed text, e.g. the contact details of the company.
    Value(String),
    Checked,
}

/// The declaration of one named field of a document type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub default: FieldDefault,
    /// The lead attribute the field is prefilled from, if any.
    #[serde(default)]
    pub prefill: Option<LeadAttribute>,
}

impl FieldSpec {
    fn new(name: &str, label: &str, kind: FieldKind, default: FieldDefault) -> Self {
        FieldSpec {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            default,
            prefill: None,
        }
    }

    pub fn text(name: &str, label: &str) -> Self {
        FieldSpec::new(name, label, FieldKind::Text, FieldDefault::Blank)
    }

    /// A date field which defaults to the current date.
    pub fn date(name: &str, label: &str) -> Self {
        FieldSpec::new(name, label, FieldKind::Date, FieldDefault::Today)
    }

    pub fn checkbox(name: &str, label: &str) -> Self {
        FieldSpec::new(name, label, FieldKind::Checkbox, FieldDefault::Blank)
    }

    pub fn select(name: &str, label: &str, options: &[&str]) -> Self {
        let options = options.iter().map(|option| option.to_string()).collect();
        FieldSpec::new(
            name,
            label,
            FieldKind::Select { options },
            FieldDefault::Blank,
        )
    }

    pub fn signature(name: &str, label: &str) -> Self {
        let kind = FieldKind::Signature {
            mark: MarkKind::Signature,
        };
        FieldSpec::new(name, label, kind, FieldDefault::Blank)
    }

    pub fn initials(name: &str, label: &str) -> Self {
        let kind = FieldKind::Signature {
            mark: MarkKind::Initials,
        };
        FieldSpec::new(name, label, kind, FieldDefault::Blank)
    }

    pub fn with_default(mut self, default: FieldDefault) -> Self {
        self.default = default;
        self
    }

    pub fn prefilled_from(mut self, attribute: LeadAttribute) -> Self {
        self.prefill = Some(attribute);
        self
    }

    fn default_value(&self, today: Date) -> FieldValue {
        match (&self.kind, &self.default) {
            (FieldKind::Checkbox, default) => FieldValue::Checkbox(*default == FieldDefault::Checked),
            (FieldKind::Signature { .. }, _) => FieldValue::Signature(SignatureImage::empty()),
            (_, FieldDefault::Today) => FieldValue::Text(format_display_date(today)),
            (_, FieldDefault::Value(value)) => FieldValue::Text(value.clone()),
            (_, FieldDefault::Blank | FieldDefault::Checked) => FieldValue::Text(String::new()),
        }
    }

    fn accepts(&self, value: &FieldValue) -> bool {
        matches!(
            (&self.kind, value),
            (
                FieldKind::Text | FieldKind::Date | FieldKind::Select { .. },
                FieldValue::Text(_)
            ) | (FieldKind::Checkbox, FieldValue::Checkbox(_))
                | (FieldKind::Signature { .. }, FieldValue::Signature(_))
        )
    }
}

/// One physical page of a document: a titled group of paragraphs and fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSpec {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub paragraphs: Vec<String>,
    /// The names of the fields shown on the page, in order.
    pub fields: Vec<String>,
}

/// Everything that distinguishes one document type from another: its fields, its pages
/// and the way it is paginated and named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescriptor {
    pub id: String,
    pub title: String,
    /// The contract type recorded by the backend.
    pub contract_type: String,
    /// The stem of the suggested file name.
    pub file_stem: String,
    pub needs_initials: bool,
    pub margins: Margins,
    pub fields: Vec<FieldSpec>,
    pub sections: Vec<SectionSpec>,
}

impl DocumentDescriptor {
    /// Reads a custom document type from a JSON file and validates it.
    pub fn from_path(descriptor_path: &Path) -> Result<DocumentDescriptor, ContextError> {
        let descriptor_content = std::fs::read_to_string(descriptor_path).map_err(|error| {
            ContextError::with_error(
                format!("Unable to read the document descriptor {:?}", descriptor_path),
                &error,
            )
        })?;
        let descriptor: DocumentDescriptor = serde_json::from_str(&descriptor_content)
            .map_err(|error| {
                ContextError::with_error(
                    format!("Unable to parse the document descriptor {:?}", descriptor_path),
                    &error,
                )
            })?;
        descriptor.validate()?;

        Ok(descriptor)
    }

    /// Checks that the field names are unique, that every section only lists declared fields
    /// and that the margins leave room for the content.
    pub fn validate(&self) -> Result<(), ContextError> {
        let mut field_names = BTreeSet::new();
        for field in self.fields.iter() {
            if !field_names.insert(field.name.as_str()) {
                return Err(ContextError::with_context(format!(
                    "The field {:?} is declared twice in the document {:?}",
                    field.name, self.id
                )));
            }
            if let FieldKind::Select { options } = &field.kind {
                if options.is_empty() {
                    return Err(ContextError::with_context(format!(
                        "The select field {:?} has no options",
                        field.name
                    )));
                }
            }
        }
        for field in self.fields.iter() {
            let custom_name = format!("{}{}", field.name, CUSTOM_SUFFIX);
            if matches!(field.kind, FieldKind::Select { .. })
                && field_names.contains(custom_name.as_str())
            {
                return Err(ContextError::with_context(format!(
                    "The field {:?} clashes with the override of the select field {:?}",
                    custom_name, field.name
                )));
            }
        }

        if self.sections.is_empty() {
            return Err(ContextError::with_context(format!(
                "The document {:?} has no sections",
                self.id
            )));
        }
        let mut section_ids = BTreeSet::new();
        for section in self.sections.iter() {
            if !section_ids.insert(section.id.as_str()) {
                return Err(ContextError::with_context(format!(
                    "The section {:?} is declared twice in the document {:?}",
                    section.id, self.id
                )));
            }
            for field_name in section.fields.iter() {
                let is_override = field_name
                    .strip_suffix(CUSTOM_SUFFIX)
                    .is_some_and(|select_name| field_names.contains(select_name));
                if !field_names.contains(field_name.as_str()) && !is_override {
                    return Err(ContextError::with_context(format!(
                        "The section {:?} refers to the undeclared field {:?}",
                        section.id, field_name
                    )));
                }
            }
        }

        let [content_width, content_height] =
            self.margins.content_size(&crate::paginate::PageGeometry::A4);
        if content_width <= 0.0 || content_height <= 0.0 {
            return Err(ContextError::with_context(format!(
                "The margins of the document {:?} leave no room for content",
                self.id
            )));
        }

        Ok(())
    }

    /// The file name used when the customer is not known.
    pub fn download_file_name(&self) -> String {
        format!("{}.pdf", self.file_stem)
    }
}

/// The live state of one document being filled: a typed map of field values seeded from
/// the descriptor defaults.
#[derive(Debug, Clone)]
pub struct DocumentModel {
    descriptor: DocumentDescriptor,
    /// The declared fields followed by the generated overrides of the select fields.
    fields: Vec<FieldSpec>,
    field_indices: HashMap<String, usize>,
    values: Vec<FieldValue>,
    edited_by_hand: BTreeSet<String>,
    signatures_locked: bool,
    lead: Option<Lead>,
}

impl DocumentModel {
    /// Opens a blank document dated today.
    pub fn new(descriptor: DocumentDescriptor) -> Result<Self, ContextError> {
        DocumentModel::new_on(descriptor, OffsetDateTime::now_utc().date())
    }

    /// Opens a blank document whose date fields default to the given day.
    pub fn new_on(descriptor: DocumentDescriptor, today: Date) -> Result<Self, ContextError> {
        descriptor.validate()?;

        let mut fields = descriptor.fields.clone();
        for field in descriptor.fields.iter() {
            if let FieldKind::Select { .. } = field.kind {
                let custom_name = format!("{}{}", field.name, CUSTOM_SUFFIX);
                let custom_label = format!("{} ({})", field.label, OTHER_OPTION);
                fields.push(FieldSpec::text(&custom_name, &custom_label));
            }
        }
        let field_indices = fields
            .iter()
            .enumerate()
            .map(|(index, field)| (field.name.clone(), index))
            .collect();
        let values = fields
            .iter()
            .map(|field| field.default_value(today))
            .collect();

        Ok(DocumentModel {
            descriptor,
            fields,
            field_indices,
            values,
            edited_by_hand: BTreeSet::new(),
            signatures_locked: false,
            lead: None,
        })
    }

    pub fn descriptor(&self) -> &DocumentDescriptor {
        &self.descriptor
    }

    /// All the fields of the document, the generated select overrides included.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_spec(&self, name: &str) -> Result<&FieldSpec, FieldError> {
        let index = self.index_of(name)?;
        Ok(&self.fields[index])
    }

    /// Replaces the value of a field. The value must match the declared kind of the field
    /// and, for a select field, be one of its options or empty.
    pub fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), FieldError> {
        let index = self.index_of(name)?;
        let field = &self.fields[index];

        if !field.accepts(&value) {
            return Err(FieldError::KindMismatch {
                field: name.to_string(),
                expected: field.kind.name(),
                found: value.kind_name(),
            });
        }
        if let (FieldKind::Select { options }, FieldValue::Text(choice)) = (&field.kind, &value) {
            if !choice.is_empty() && !options.iter().any(|option| option == choice) {
                return Err(FieldError::InvalidValue {
                    field: name.to_string(),
                    reason: format!("{:?} is not one of the options {:?}", choice, options),
                });
            }
        }
        if matches!(field.kind, FieldKind::Signature { .. }) && self.signatures_locked {
            return Err(FieldError::SignaturesLocked {
                field: name.to_string(),
            });
        }

        self.values[index] = value;
        self.edited_by_hand.insert(name.to_string());
        Ok(())
    }

    pub fn field(&self, name: &str) -> Result<&FieldValue, FieldError> {
        let index = self.index_of(name)?;
        Ok(&self.values[index])
    }

    /// The value of a field as it is meant to be read: for a select field whose choice is
    /// `"Other"`, the content of its override when that is not empty.
    pub fn effective_value(&self, name: &str) -> Result<FieldValue, FieldError> {
        let index = self.index_of(name)?;
        let value = &self.values[index];

        if let (FieldKind::Select { .. }, FieldValue::Text(choice)) = (&self.fields[index].kind, value)
        {
            if choice == OTHER_OPTION {
                let custom_name = format!("{}{}", name, CUSTOM_SUFFIX);
                if let Some(custom) = self.field(&custom_name)?.as_text() {
                    if !custom.is_empty() {
                        return Ok(FieldValue::Text(custom.to_string()));
                    }
                }
            }
        }

        Ok(value.clone())
    }

    /// Copies the prefill-eligible attributes of the lead into their fields, skipping the
    /// fields edited by hand. Returns the number of fields which were filled.
    pub fn prefill_from_lead(&mut self, lead: &Lead) -> usize {
        let mut filled_count = 0;
        for (index, field) in self.fields.iter().enumerate() {
            let Some(attribute) = field.prefill else {
                continue;
            };
            if self.edited_by_hand.contains(&field.name) {
                log::debug!("Keeping the hand-edited field {:?}", field.name);
                continue;
            }
            if let Some(value) = lead.attribute(attribute).filter(|value| !value.trim().is_empty())
            {
                self.values[index] = FieldValue::Text(value);
                filled_count += 1;
            }
        }
        log::debug!(
            "Prefilled {} fields of the document {:?} from the lead {:?}",
            filled_count,
            self.descriptor.id,
            lead.id
        );
        self.lead = Some(lead.clone());

        filled_count
    }

    /// The lead the document was last prefilled from.
    pub fn lead(&self) -> Option<&Lead> {
        self.lead.as_ref()
    }

    /// Freezes every signature field, provided at least one of them holds a signature.
    pub fn lock_signatures(&mut self) -> Result<(), FieldError> {
        let has_signature = self.fields.iter().zip(self.values.iter()).any(|(field, value)| {
            matches!(field.kind, FieldKind::Signature { .. })
                && value.as_signature().is_some_and(|signature| !signature.is_empty())
        });
        if !has_signature {
            return Err(FieldError::NoSignatureToLock);
        }

        self.signatures_locked = true;
        Ok(())
    }

    pub fn signatures_locked(&self) -> bool {
        self.signatures_locked
    }

    /// The suggested file name: `<First>_<Last>_<Stem>_<YYYY-MM-DD>.pdf` once a lead is known,
    /// otherwise `<Stem>.pdf`.
    pub fn suggested_file_name(&self, date: Date) -> String {
        let Some(lead) = &self.lead else {
            return self.descriptor.download_file_name();
        };

        let name_part = |part: &Option<String>| {
            part.as_deref()
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .unwrap_or("Unknown")
                .replace(['/', '\\'], "-")
        };
        format!(
            "{}_{}_{}_{:04}-{:02}-{:02}.pdf",
            name_part(&lead.first_name),
            name_part(&lead.last_name),
            self.descriptor.file_stem,
            date.year(),
            u8::from(date.month()),
            date.day()
        )
    }

    /// All the field values as one JSON object, signatures as PNG data URLs (`null` when blank).
    pub fn snapshot(&self) -> serde_json::Value {
        let entries = self
            .fields
            .iter()
            .zip(self.values.iter())
            .map(|(field, value)| {
                let json_value = match value {
                    FieldValue::Text(text) => serde_json::Value::String(text.clone()),
                    FieldValue::Checkbox(checked) => serde_json::Value::Bool(*checked),
                    FieldValue::Signature(signature) if signature.is_empty() => {
                        serde_json::Value::Null
                    }
                    FieldValue::Signature(signature) => {
                        serde_json::Value::String(signature.to_data_url())
                    }
                };
                (field.name.clone(), json_value)
            })
            .collect();

        serde_json::Value::Object(entries)
    }

    /// Sets every field present in a JSON object shaped like the one of `snapshot`.
    pub fn set_from_json(&mut self, values: &serde_json::Value) -> Result<(), FieldError> {
        let Some(entries) = values.as_object() else {
            return Err(FieldError::InvalidValue {
                field: String::new(),
                reason: "the form values must be a JSON object".to_string(),
            });
        };

        for (name, json_value) in entries {
            let field = self.field_spec(name)?;
            let value = match (&field.kind, json_value) {
                (FieldKind::Checkbox, serde_json::Value::Bool(checked)) => {
                    FieldValue::Checkbox(*checked)
                }
                (FieldKind::Signature { .. }, serde_json::Value::Null) => {
                    FieldValue::Signature(SignatureImage::empty())
                }
                (FieldKind::Signature { .. }, serde_json::Value::String(data_url)) => {
                    let signature = SignatureImage::from_data_url(data_url, SignatureMode::Drawn)
                        .map_err(|error| FieldError::InvalidValue {
                            field: name.clone(),
                            reason: error.to_string(),
                        })?;
                    FieldValue::Signature(signature)
                }
                (FieldKind::Checkbox | FieldKind::Signature { .. }, other) => {
                    return Err(FieldError::KindMismatch {
                        field: name.clone(),
                        expected: field.kind.name(),
                        found: json_kind_name(other),
                    });
                }
                (_, serde_json::Value::String(text)) => FieldValue::Text(text.clone()),
                (_, other) => {
                    return Err(FieldError::KindMismatch {
                        field: name.clone(),
                        expected: field.kind.name(),
                        found: json_kind_name(other),
                    });
                }
            };
            self.set_field(name, value)?;
        }

        Ok(())
    }

    fn index_of(&self, name: &str) -> Result<usize, FieldError> {
        self.field_indices
            .get(name)
            .copied()
            .ok_or_else(|| FieldError::UnknownField {
                document: self.descriptor.id.clone(),
                field: name.to_string(),
            })
    }
}

/// Formats a date the way the forms display it, e.g. `03/07/2025`.
pub fn format_display_date(date: Date) -> String {
    format!(
        "{:02}/{:02}/{:04}",
        u8::from(date.month()),
        date.day(),
        date.year()
    )
}

fn json_kind_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use time::Month;

    use super::*;

    fn descriptor() -> DocumentDescriptor {
        DocumentDescriptor {
            id: "test".into(),
            title: "Test".into(),
            contract_type: "test".into(),
            file_stem: "Test-Document".into(),
            needs_initials: false,
            margins: Margins::default(),
            fields: vec![
                FieldSpec::date("date", "Date"),
                FieldSpec::text("name", "Name").prefilled_from(LeadAttribute::FullName),
                FieldSpec::text("address", "Address").prefilled_from(LeadAttribute::Address),
                FieldSpec::text("company", "Company")
                    .with_default(FieldDefault::Value("In-Vision Construction LLC".into())),
                FieldSpec::checkbox("agrees", "Agrees"),
                FieldSpec::select("roofColor", "Roof color", &["Charcoal", "Slate", "Other"]),
                FieldSpec::signature("customerSignature", "Customer signature"),
            ],
            sections: vec![SectionSpec {
                id: "page-1".into(),
                title: "Page".into(),
                paragraphs: vec![],
                fields: vec!["date".into(), "roofColor".into(), "roofColorCustom".into()],
            }],
        }
    }

    fn model() -> DocumentModel {
        let today = Date::from_calendar_date(2025, Month::March, 7).unwrap();
        DocumentModel::new_on(descriptor(), today).unwrap()
    }

    fn signature() -> SignatureImage {
        let mut image = RgbaImage::new(4, 4);
        image.put_pixel(1, 1, Rgba([0, 0, 0, 255]));
        SignatureImage::from_rgba(&image, SignatureMode::Drawn).unwrap()
    }

    #[test]
    fn fields_are_seeded_with_their_defaults() {
        let model = model();

        assert_eq!(model.field("date").unwrap().as_text(), Some("03/07/2025"));
        assert_eq!(model.field("name").unwrap().as_text(), Some(""));
        assert_eq!(
            model.field("company").unwrap().as_text(),
            Some("In-Vision Construction LLC")
        );
        assert_eq!(model.field("agrees").unwrap().as_checkbox(), Some(false));
        assert!(model
            .field("customerSignature")
            .unwrap()
            .as_signature()
            .is_some_and(SignatureImage::is_empty));
        assert_eq!(model.field("roofColorCustom").unwrap().as_text(), Some(""));
    }

    #[test]
    fn unknown_fields_and_wrong_kinds_are_rejected() {
        let mut model = model();

        assert!(matches!(
            model.set_field("nope", FieldValue::Text("x".into())),
            Err(FieldError::UnknownField { .. })
        ));
        assert!(matches!(
            model.set_field("agrees", FieldValue::Text("yes".into())),
            Err(FieldError::KindMismatch { .. })
        ));
        assert!(matches!(
            model.set_field("roofColor", FieldValue::Text("Purple".into())),
            Err(FieldError::InvalidValue { .. })
        ));
        assert!(model.field("nope").is_err());
    }

    #[test]
    fn other_option_resolves_to_the_override_only_when_filled() {
        let mut model = model();

        model
            .set_field("roofColor", FieldValue::Text("Other".into()))
            .unwrap();
        assert_eq!(
            model.effective_value("roofColor").unwrap(),
            FieldValue::Text("Other".into())
        );

        model
            .set_field("roofColorCustom", FieldValue::Text("Sunset Red".into()))
            .unwrap();
        assert_eq!(
            model.effective_value("roofColor").unwrap(),
            FieldValue::Text("Sunset Red".into())
        );

        model
            .set_field("roofColor", FieldValue::Text("Slate".into()))
            .unwrap();
        assert_eq!(
            model.effective_value("roofColor").unwrap(),
            FieldValue::Text("Slate".into())
        );
    }

    #[test]
    fn prefill_never_overwrites_hand_edited_fields() {
        let mut model = model();
        model
            .set_field("address", FieldValue::Text("7 Elm Rd".into()))
            .unwrap();
        let lead = Lead {
            id: "lead-1".into(),
            first_name: Some("Jane".into()),
            last_name: Some("Doe".into()),
            address: Some("1 Main St".into()),
            ..Lead::default()
        };

        assert_eq!(model.prefill_from_lead(&lead), 1);
        assert_eq!(model.prefill_from_lead(&lead), 1);
        assert_eq!(model.field("name").unwrap().as_text(), Some("Jane Doe"));
        assert_eq!(model.field("address").unwrap().as_text(), Some("7 Elm Rd"));
    }

    #[test]
    fn locking_requires_a_signature_and_freezes_signature_fields() {
        let mut model = model();
        assert_eq!(model.lock_signatures(), Err(FieldError::NoSignatureToLock));

        model
            .set_field("customerSignature", FieldValue::Signature(signature()))
            .unwrap();
        model.lock_signatures().unwrap();

        let result = model.set_field(
            "customerSignature",
            FieldValue::Signature(SignatureImage::empty()),
        );
        assert!(matches!(result, Err(FieldError::SignaturesLocked { .. })));
        // Other fields stay editable
        model
            .set_field("name", FieldValue::Text("Jane".into()))
            .unwrap();
    }

    #[test]
    fn snapshot_is_read_back_by_set_from_json() {
        let mut model = model();
        model
            .set_field("customerSignature", FieldValue::Signature(signature()))
            .unwrap();
        model
            .set_field("agrees", FieldValue::Checkbox(true))
            .unwrap();
        let snapshot = model.snapshot();
        assert_eq!(snapshot["agrees"], serde_json::Value::Bool(true));

        let mut restored = self::model();
        restored.set_from_json(&snapshot).unwrap();
        similar_asserts::assert_eq!(restored.snapshot(), snapshot);
    }

    #[test]
    fn file_name_uses_the_lead_name_when_known() {
        let mut model = model();
        let date = Date::from_calendar_date(2025, Month::March, 7).unwrap();
        assert_eq!(model.suggested_file_name(date), "Test-Document.pdf");

        model.prefill_from_lead(&Lead {
            id: "lead-1".into(),
            first_name: Some("Jane".into()),
            ..Lead::default()
        });
        assert_eq!(
            model.suggested_file_name(date),
            "Jane_Unknown_Test-Document_2025-03-07.pdf"
        );
    }

    #[test]
    fn descriptor_with_undeclared_section_field_is_invalid() {
        let mut descriptor = descriptor();
        descriptor.sections[0].fields.push("missing".into());
        assert!(descriptor.validate().is_err());
        assert!(DocumentModel::new(descriptor).is_err());
    }
}
