use std::path::Path;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ContextError;

/// A prospective or existing customer, as stored by the backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub insurance_company: Option<String>,
    #[serde(default)]
    pub insurance_policy_number: Option<String>,
    #[serde(default)]
    pub claim_number: Option<String>,
    #[serde(default)]
    pub insurance_adjuster_name: Option<String>,
    #[serde(default)]
    pub insurance_adjuster_phone: Option<String>,
    #[serde(default)]
    pub insurance_adjuster_email: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// The subset of a lead returned by the lead search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSummary {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub insurance_company: Option<String>,
    pub insurance_policy_number: Option<String>,
    pub claim_number: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// An attribute of a lead which a document field can be prefilled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LeadAttribute {
    FullName,
    FirstName,
    LastName,
    Email,
    Phone,
    Address,
    InsuranceCompany,
    InsurancePolicyNumber,
    ClaimNumber,
    InsuranceAdjusterName,
    InsuranceAdjusterPhone,
    InsuranceAdjusterEmail,
}

impl Lead {
    /// Reads a lead previously saved as JSON, e.g. the lead selected in the search.
    pub fn from_path(lead_path: &Path) -> Result<Lead, ContextError> {
        let lead_content = std::fs::read_to_string(lead_path).map_err(|error| {
            ContextError::with_error(format!("Unable to read the lead {:?}", lead_path), &error)
        })?;
        let lead: Lead = serde_json::from_str(&lead_content).map_err(|error| {
            ContextError::with_error(format!("Unable to parse the lead {:?}", lead_path), &error)
        })?;

        Ok(lead)
    }

    /// The first and last name joined by a space, skipping the missing parts.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    pub fn attribute(&self, attribute: LeadAttribute) -> Option<String> {
        match attribute {
            LeadAttribute::FullName => self.full_name(),
            LeadAttribute::FirstName => self.first_name.clone(),
            LeadAttribute::LastName => self.last_name.clone(),
            LeadAttribute::Email => self.email.clone(),
            LeadAttribute::Phone => self.phone.clone(),
            LeadAttribute::Address => self.address.clone(),
            LeadAttribute::InsuranceCompany => self.insurance_company.clone(),
            LeadAttribute::InsurancePolicyNumber => self.insurance_policy_number.clone(),
            LeadAttribute::ClaimNumber => self.claim_number.clone(),
            LeadAttribute::InsuranceAdjusterName => self.insurance_adjuster_name.clone(),
            LeadAttribute::InsuranceAdjusterPhone => self.insurance_adjuster_phone.clone(),
            LeadAttribute::InsuranceAdjusterEmail => self.insurance_adjuster_email.clone(),
        }
    }

    /// The fields of the lead which are matched by the free-text search.
    pub(crate) fn searchable_values(&self) -> [Option<&str>; 8] {
        [
            self.first_name.as_deref(),
            self.last_name.as_deref(),
            self.email.as_deref(),
            self.phone.as_deref(),
            self.address.as_deref(),
            self.insurance_company.as_deref(),
            self.insurance_policy_number.as_deref(),
            self.claim_number.as_deref(),
        ]
    }

    pub fn summary(&self) -> LeadSummary {
        LeadSummary {
            id: self.id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            insurance_company: self.insurance_company.clone(),
            insurance_policy_number: self.insurance_policy_number.clone(),
            claim_number: self.claim_number.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_skips_missing_parts() {
        let mut lead = Lead {
            id: "lead-1".into(),
            first_name: Some("Jane".into()),
            last_name: Some(" Doe ".into()),
            ..Lead::default()
        };
        assert_eq!(lead.full_name().as_deref(), Some("Jane Doe"));

        lead.first_name = None;
        assert_eq!(lead.attribute(LeadAttribute::FullName).as_deref(), Some("Doe"));

        lead.last_name = Some("  ".into());
        assert_eq!(lead.full_name(), None);
    }

    #[test]
    fn stored_lead_without_timestamps_is_parsed() {
        let lead: Lead = serde_json::from_str(
            r#"{"id": "abc", "firstName": "Jane", "lastName": "Doe", "address": "1 Main St"}"#,
        )
        .unwrap();

        assert_eq!(lead.address.as_deref(), Some("1 Main St"));
        assert_eq!(lead.updated_at, None);
        assert_eq!(lead.summary().first_name.as_deref(), Some("Jane"));
    }
}
