use serde::{Deserialize, Serialize};

use idlink_contacts::{ClusterView, IdentifyRequest};

// -------------------------
// Request DTOs
// -------------------------

/// `phoneNumber` arrives as either a JSON string or a JSON number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PhoneNumberField {
    Text(String),
    Number(serde_json::Number),
}

impl PhoneNumberField {
    /// Numbers are kept in their decimal rendering.
    pub fn into_string(self) -> String {
        match self {
            PhoneNumberField::Text(s) => s,
            PhoneNumberField::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequestBody {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<PhoneNumberField>,
}

impl From<IdentifyRequestBody> for IdentifyRequest {
    fn from(body: IdentifyRequestBody) -> Self {
        IdentifyRequest::new(body.email, body.phone_number.map(PhoneNumberField::into_string))
            .normalize()
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Clone, Serialize)]
pub struct IdentifyResponse {
    pub contact: ClusterView,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> IdentifyRequest {
        serde_json::from_value::<IdentifyRequestBody>(value).unwrap().into()
    }

    #[test]
    fn numeric_phone_is_rendered_as_decimal_string() {
        let req = decode(json!({ "email": "a@x.com", "phoneNumber": 123456 }));
        assert_eq!(req.phone_number.as_deref(), Some("123456"));
        assert_eq!(req.email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn null_missing_and_blank_fields_are_absent() {
        let req = decode(json!({ "email": null, "phoneNumber": "  " }));
        assert_eq!(req, IdentifyRequest::default());
        let req = decode(json!({}));
        assert_eq!(req, IdentifyRequest::default());
    }

    #[test]
    fn values_are_trimmed() {
        let req = decode(json!({ "email": " a@x.com ", "phoneNumber": " 555 " }));
        assert_eq!(req.email.as_deref(), Some("a@x.com"));
        assert_eq!(req.phone_number.as_deref(), Some("555"));
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert!(serde_json::from_value::<IdentifyRequestBody>(json!({ "email": 5 })).is_err());
        assert!(
            serde_json::from_value::<IdentifyRequestBody>(json!({ "phoneNumber": [1] })).is_err()
        );
    }
}
