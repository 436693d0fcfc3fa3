// CDS Hooks payer-check request and card parsing

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

pub const ORDER_SIGN_HOOK: &str = "order-sign";
pub const HOOK_INSTANCE: &str = "98765-wxyz-43210-lmno";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CdsSource {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CdsSuggestion {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CdsLink {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdsCard {
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// info, warning, critical ...
    #[serde(default)]
    pub indicator: String,
    #[serde(default)]
    pub source: CdsSource,
    #[serde(default)]
    pub suggestions: Vec<CdsSuggestion>,
    #[serde(default)]
    pub links: Vec<CdsLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_behavior: Option<String>,
}

/// `order-sign` request embedding the created MedicationRequest as a draft order
pub fn build_order_sign_request(
    patient_id: &str,
    practitioner_id: &str,
    medication_response: &Value,
) -> Value {
    json!({
        "hook": ORDER_SIGN_HOOK,
        "hookInstance": HOOK_INSTANCE,
        "context": {
            "userId": format!("PractitionerRole/{}", practitioner_id),
            "patientId": patient_id,
            "draftOrders": {
                "resourceType": "Bundle",
                "meta": {
                    "profile": ["http://hl7.org/fhir/StructureDefinition/Bundle"]
                },
                "type": "collection",
                "entry": [{ "resource": medication_response }]
            }
        }
    })
}

/// Cards from a CDS response body; entries that do not parse are skipped
pub fn extract_cards(body: &Value) -> Vec<CdsCard> {
    let Some(cards) = body.get("cards").and_then(Value::as_array) else {
        return Vec::new();
    };
    cards
        .iter()
        .filter_map(|card| match serde_json::from_value::<CdsCard>(card.clone()) {
            Ok(card) => Some(card),
            Err(e) => {
                debug!(error = %e, "Skipping malformed CDS card");
                None
            }
        })
        .collect()
}

/// Shape kept in the store for the payer-check response
pub fn wrap_response(body: &Value) -> Value {
    json!({ "cards": body, "systemActions": {} })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_sign_request_embeds_medication() {
        let request = build_order_sign_request("101", "456", &json!({"id": "111112"}));
        assert_eq!(request["hook"], "order-sign");
        assert_eq!(request["context"]["userId"], "PractitionerRole/456");
        assert_eq!(request["context"]["draftOrders"]["entry"][0]["resource"]["id"], "111112");
    }

    #[test]
    fn test_extract_cards() {
        let body = json!({
            "cards": [
                {
                    "summary": "Prior authorization",
                    "indicator": "critical",
                    "source": {"label": "Payer CDS", "url": "https://example.com"},
                    "suggestions": [{"label": "Kindly get prior-authorization"}],
                    "selectionBehavior": "at-most-one"
                },
                "not a card"
            ]
        });
        let cards = extract_cards(&body);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].indicator, "critical");
        assert_eq!(cards[0].selection_behavior.as_deref(), Some("at-most-one"));
        assert_eq!(cards[0].suggestions[0].label, "Kindly get prior-authorization");
    }

    #[test]
    fn test_no_cards() {
        assert!(extract_cards(&json!({})).is_empty());
        assert_eq!(
            wrap_response(&json!({"cards": []})),
            json!({"cards": {"cards": []}, "systemActions": {}})
        );
    }
}
