// Questionnaire package extraction, dynamic answer fields and
// QuestionnaireResponse construction

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuestionnaireError {
    #[error("Questionnaire package has no embedded Questionnaire resource")]
    MissingQuestionnaire,

    #[error("Questionnaire resource has no id")]
    MissingId,

    #[error("Item '{link_id}' has unsupported type '{item_type}'")]
    UnsupportedItemType { link_id: String, item_type: String },

    #[error("Item is missing '{field}'")]
    MalformedItem { field: &'static str },

    #[error("Answer for '{link_id}' is not a valid {expected}: '{raw}'")]
    InvalidAnswer {
        link_id: String,
        expected: &'static str,
        raw: String,
    },

    #[error("No question with linkId '{0}'")]
    UnknownQuestion(String),
}

/// Closed set of supported questionnaire item types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Boolean,
    Integer,
    String,
}

impl ItemKind {
    pub fn parse(link_id: &str, item_type: &str) -> Result<Self, QuestionnaireError> {
        match item_type {
            "boolean" => Ok(ItemKind::Boolean),
            "integer" => Ok(ItemKind::Integer),
            "string" => Ok(ItemKind::String),
            other => Err(QuestionnaireError::UnsupportedItemType {
                link_id: link_id.to_string(),
                item_type: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionItem {
    pub link_id: String,
    pub text: String,
    pub kind: ItemKind,
}

/// The Questionnaire pulled out of a package response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Questionnaire {
    pub id: String,
    pub items: Vec<QuestionItem>,
}

/// Input control used to collect one answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Yes / No selector
    YesNoSelect,
    NumericInput,
    TextInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub link_id: String,
    pub label: String,
    pub input: InputKind,
    pub required: bool,
}

impl From<&QuestionItem> for FormField {
    fn from(item: &QuestionItem) -> Self {
        let input = match item.kind {
            ItemKind::Boolean => InputKind::YesNoSelect,
            ItemKind::Integer => InputKind::NumericInput,
            ItemKind::String => InputKind::TextInput,
        };
        Self {
            link_id: item.link_id.clone(),
            label: item.text.clone(),
            input,
            required: true,
        }
    }
}

/// One form field per questionnaire item
pub fn render_fields(items: &[QuestionItem]) -> Vec<FormField> {
    items.iter().map(FormField::from).collect()
}

/// Request body for the questionnaire-package operation
pub fn build_package_request(coverage_id: &str, medication_request_id: &str) -> Value {
    json!({
        "resourceType": "Parameters",
        "id": "questionnaire-package-request",
        "parameter": [
            {
                "name": "coverage",
                "resource": {
                    "resourceType": "Coverage",
                    "reference": format!("Coverage/{}", coverage_id),
                }
            },
            {
                "name": "order",
                "resource": {
                    "resourceType": "MedicationRequest",
                    "reference": format!("MedicationRequest/{}", medication_request_id),
                }
            }
        ]
    })
}

/// Pull the first embedded Questionnaire (`parameter[0].resource.entry[0].resource`)
pub fn extract_questionnaire(package: &Value) -> Result<Questionnaire, QuestionnaireError> {
    let resource = package
        .pointer("/parameter/0/resource/entry/0/resource")
        .filter(|r| r.is_object())
        .ok_or(QuestionnaireError::MissingQuestionnaire)?;

    let id = resource
        .get("id")
        .and_then(Value::as_str)
        .ok_or(QuestionnaireError::MissingId)?
        .to_string();

    let items = match resource.get("item").and_then(Value::as_array) {
        Some(items) => items.iter().map(parse_item).collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(Questionnaire { id, items })
}

fn parse_item(item: &Value) -> Result<QuestionItem, QuestionnaireError> {
    let link_id = item
        .get("linkId")
        .and_then(Value::as_str)
        .ok_or(QuestionnaireError::MalformedItem { field: "linkId" })?;
    let item_type = item
        .get("type")
        .and_then(Value::as_str)
        .ok_or(QuestionnaireError::MalformedItem { field: "type" })?;
    let text = item.get("text").and_then(Value::as_str).unwrap_or(link_id);

    Ok(QuestionItem {
        link_id: link_id.to_string(),
        text: text.to_string(),
        kind: ItemKind::parse(link_id, item_type)?,
    })
}

/// A collected answer, tagged by its run-time type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Boolean(bool),
    Integer(i64),
    String(String),
}

impl AnswerValue {
    /// Parse raw user input according to the item's kind
    pub fn parse(item: &QuestionItem, raw: &str) -> Result<Self, QuestionnaireError> {
        let trimmed = raw.trim();
        match item.kind {
            ItemKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "yes" | "true" | "y" => Ok(AnswerValue::Boolean(true)),
                "no" | "false" | "n" => Ok(AnswerValue::Boolean(false)),
                _ => Err(QuestionnaireError::InvalidAnswer {
                    link_id: item.link_id.clone(),
                    expected: "yes/no",
                    raw: raw.to_string(),
                }),
            },
            ItemKind::Integer => trimmed
                .parse::<i64>()
                .map(AnswerValue::Integer)
                .map_err(|_| QuestionnaireError::InvalidAnswer {
                    link_id: item.link_id.clone(),
                    expected: "integer",
                    raw: raw.to_string(),
                }),
            ItemKind::String => Ok(AnswerValue::String(raw.to_string())),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AnswerValue::String(s) if s.is_empty())
    }

    fn answer_json(&self) -> Value {
        let mut answer = Map::new();
        match self {
            AnswerValue::Boolean(b) => {
                answer.insert("valueQuestionnaireResponseBoolean".into(), json!(b));
            }
            AnswerValue::Integer(i) => {
                answer.insert("valueQuestionnaireResponseInteger".into(), json!(i));
            }
            AnswerValue::String(s) => {
                answer.insert("valueQuestionnaireResponseString".into(), json!(s));
            }
        }
        Value::Object(answer)
    }
}

/// Answers keyed by item `linkId`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet {
    answers: BTreeMap<String, AnswerValue>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, link_id: impl Into<String>, value: AnswerValue) {
        self.answers.insert(link_id.into(), value);
    }

    pub fn get(&self, link_id: &str) -> Option<&AnswerValue> {
        self.answers.get(link_id)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Parse `linkId=value` pairs against the questionnaire items
    pub fn from_pairs<'a, I>(items: &[QuestionItem], pairs: I) -> Result<Self, QuestionnaireError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut set = AnswerSet::new();
        for (link_id, raw) in pairs {
            let item = items
                .iter()
                .find(|i| i.link_id == link_id)
                .ok_or_else(|| QuestionnaireError::UnknownQuestion(link_id.to_string()))?;
            set.insert(link_id, AnswerValue::parse(item, raw)?);
        }
        Ok(set)
    }
}

/// True once every item has a defined, non-empty answer
pub fn validate_form(items: &[QuestionItem], answers: &AnswerSet) -> bool {
    items
        .iter()
        .all(|item| answers.get(&item.link_id).is_some_and(|a| !a.is_empty()))
}

/// Build the QuestionnaireResponse resource for submission
pub fn build_questionnaire_response(
    questionnaire_id: &str,
    patient_id: &str,
    practitioner_id: &str,
    items: &[QuestionItem],
    answers: &AnswerSet,
) -> Value {
    let item: Vec<Value> = items
        .iter()
        .map(|question| {
            let answer = answers
                .get(&question.link_id)
                .map(AnswerValue::answer_json)
                .unwrap_or_else(|| json!({}));
            json!({
                "linkId": question.link_id,
                "text": question.text,
                "answer": [answer],
            })
        })
        .collect();

    json!({
        "resourceType": "QuestionnaireResponse",
        "questionnaire": format!("Questionnaire/{}", questionnaire_id),
        "status": "completed",
        "subject": { "reference": format!("Patient/{}", patient_id) },
        "author": { "reference": format!("PractitionerRole/{}", practitioner_id) },
        "item": item,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(items: Value) -> Value {
        json!({
            "resourceType": "Parameters",
            "parameter": [{
                "name": "return",
                "resource": {
                    "resourceType": "Bundle",
                    "entry": [{
                        "resource": {
                            "resourceType": "Questionnaire",
                            "id": "aimovig-pa",
                            "item": items
                        }
                    }]
                }
            }]
        })
    }

    fn three_items() -> Vec<QuestionItem> {
        extract_questionnaire(&package(json!([
            {"linkId": "1", "text": "Tried preventive therapy?", "type": "boolean"},
            {"linkId": "2", "text": "Migraine days per month", "type": "integer"},
            {"linkId": "3", "text": "Notes", "type": "string"}
        ])))
        .unwrap()
        .items
    }

    #[test]
    fn test_extract_questionnaire_items_and_id() {
        let questionnaire = extract_questionnaire(&package(json!([
            {"linkId": "1", "text": "Q1", "type": "boolean"}
        ])))
        .unwrap();
        assert_eq!(questionnaire.id, "aimovig-pa");
        assert_eq!(questionnaire.items.len(), 1);
        assert_eq!(questionnaire.items[0].kind, ItemKind::Boolean);
    }

    #[test]
    fn test_missing_questionnaire() {
        let err = extract_questionnaire(&json!({"resourceType": "Parameters"})).unwrap_err();
        assert_eq!(err, QuestionnaireError::MissingQuestionnaire);
    }

    #[test]
    fn test_unknown_item_type_is_rejected() {
        let err = extract_questionnaire(&package(json!([
            {"linkId": "9", "text": "When?", "type": "date"}
        ])))
        .unwrap_err();
        assert_eq!(
            err,
            QuestionnaireError::UnsupportedItemType {
                link_id: "9".into(),
                item_type: "date".into()
            }
        );
    }

    #[test]
    fn test_render_fields_match_item_kinds() {
        let fields = render_fields(&three_items());
        let inputs: Vec<InputKind> = fields.iter().map(|f| f.input).collect();
        assert_eq!(
            inputs,
            vec![InputKind::YesNoSelect, InputKind::NumericInput, InputKind::TextInput]
        );
    }

    #[test]
    fn test_validate_form_requires_every_answer() {
        let items = three_items();
        let mut answers = AnswerSet::new();
        assert!(!validate_form(&items, &answers));

        answers.insert("1", AnswerValue::Boolean(false));
        answers.insert("2", AnswerValue::Integer(4));
        assert!(!validate_form(&items, &answers));

        answers.insert("3", AnswerValue::String(String::new()));
        assert!(!validate_form(&items, &answers));

        answers.insert("3", AnswerValue::String("none".into()));
        assert!(validate_form(&items, &answers));
    }

    #[test]
    fn test_answer_parsing() {
        let items = three_items();
        let answers =
            AnswerSet::from_pairs(&items, [("1", "Yes"), ("2", "12"), ("3", "n/a")]).unwrap();
        assert_eq!(answers.get("1"), Some(&AnswerValue::Boolean(true)));
        assert_eq!(answers.get("2"), Some(&AnswerValue::Integer(12)));

        let err = AnswerSet::from_pairs(&items, [("2", "twelve")]).unwrap_err();
        assert!(matches!(err, QuestionnaireError::InvalidAnswer { .. }));

        let err = AnswerSet::from_pairs(&items, [("7", "x")]).unwrap_err();
        assert_eq!(err, QuestionnaireError::UnknownQuestion("7".into()));
    }

    #[test]
    fn test_response_tags_answers_by_type() {
        let items = three_items();
        let answers =
            AnswerSet::from_pairs(&items, [("1", "no"), ("2", "3"), ("3", "text")]).unwrap();
        let response = build_questionnaire_response("aimovig-pa", "101", "456", &items, &answers);

        assert_eq!(response["questionnaire"], "Questionnaire/aimovig-pa");
        assert_eq!(response["subject"]["reference"], "Patient/101");
        assert_eq!(response["author"]["reference"], "PractitionerRole/456");

        let first = &response["item"][0]["answer"][0];
        assert_eq!(first["valueQuestionnaireResponseBoolean"], json!(false));
        assert!(first.get("valueQuestionnaireResponseInteger").is_none());
        assert!(first.get("valueQuestionnaireResponseString").is_none());

        assert_eq!(
            response["item"][1]["answer"][0]["valueQuestionnaireResponseInteger"],
            json!(3)
        );
        assert_eq!(
            response["item"][2]["answer"][0]["valueQuestionnaireResponseString"],
            json!("text")
        );
    }
}
