//! Identify requests and their normalization.

use serde::{Deserialize, Serialize};

use idlink_core::{DomainError, DomainResult};

/// An identify request after transport decoding.
///
/// Both fields are plain options: `null`, a missing key and an empty (or
/// whitespace-only) string all mean "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

/// The identifiers actually present in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifiers {
    EmailOnly(String),
    PhoneOnly(String),
    Both { email: String, phone_number: String },
}

impl IdentifyRequest {
    pub fn new(email: Option<String>, phone_number: Option<String>) -> Self {
        Self {
            email,
            phone_number,
        }
    }

    /// Trim both fields and drop the empty ones.
    pub fn normalize(self) -> Self {
        Self {
            email: normalize_field(self.email),
            phone_number: normalize_field(self.phone_number),
        }
    }

    /// Classify the request by which identifiers are present.
    ///
    /// Fails with a validation error when neither is.
    pub fn identifiers(&self) -> DomainResult<Identifiers> {
        let email = normalize_field(self.email.clone());
        let phone_number = normalize_field(self.phone_number.clone());
        match (email, phone_number) {
            (Some(email), Some(phone_number)) => Ok(Identifiers::Both {
                email,
                phone_number,
            }),
            (Some(email), None) => Ok(Identifiers::EmailOnly(email)),
            (None, Some(phone_number)) => Ok(Identifiers::PhoneOnly(phone_number)),
            (None, None) => Err(DomainError::validation(
                "either email or phoneNumber must be provided",
            )),
        }
    }
}

fn normalize_field(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == v.len() {
            Some(v)
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_are_treated_as_absent() {
        let req = IdentifyRequest::new(Some("   ".into()), Some("".into())).normalize();
        assert_eq!(req, IdentifyRequest::default());
        assert!(matches!(req.identifiers(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn classifies_by_present_fields() {
        let req = IdentifyRequest::new(Some(" a@x.com ".into()), None);
        assert_eq!(req.identifiers().unwrap(), Identifiers::EmailOnly("a@x.com".into()));

        let req = IdentifyRequest::new(None, Some("555".into()));
        assert_eq!(req.identifiers().unwrap(), Identifiers::PhoneOnly("555".into()));

        let req = IdentifyRequest::new(Some("a@x.com".into()), Some("555".into()));
        let ids = req.identifiers().unwrap();
        assert_eq!(
            ids,
            Identifiers::Both {
                email: "a@x.com".into(),
                phone_number: "555".into()
            }
        );
    }

    #[test]
    fn deserializes_camel_case_with_nulls() {
        let req: IdentifyRequest =
            serde_json::from_str(r#"{"email": null, "phoneNumber": "123456"}"#).unwrap();
        assert_eq!(req.email, None);
        assert_eq!(req.phone_number.as_deref(), Some("123456"));

        let req: IdentifyRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, IdentifyRequest::default());
    }
}
