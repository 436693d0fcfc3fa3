// MedicationRequest / Claim bodies and the medication catalogue

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

pub const RXNORM_SYSTEM: &str = "http://www.nlm.nih.gov/research/umls/rxnorm";
pub const UCUM_SYSTEM: &str = "http://unitsofmeasure.org";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MedicationOption {
    pub name: &'static str,
    pub code: &'static str,
    pub dose_quantity: u32,
    pub dose_unit: &'static str,
    pub unit: &'static str,
}

pub const MEDICATION_OPTIONS: [MedicationOption; 2] = [
    MedicationOption {
        name: "Aimovig 70 mg Injection",
        code: "1746007",
        dose_quantity: 70,
        dose_unit: "mg",
        unit: "injection",
    },
    MedicationOption {
        name: "Aimovig 140 mg Injection",
        code: "1746008",
        dose_quantity: 140,
        dose_unit: "mg",
        unit: "injection",
    },
];

pub fn find_medication(name: &str) -> Option<&'static MedicationOption> {
    MEDICATION_OPTIONS.iter().find(|m| m.name == name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrequencyUnit {
    #[default]
    #[serde(rename = "mo")]
    Month,
    #[serde(rename = "wk")]
    Week,
    #[serde(rename = "d")]
    Day,
}

impl FrequencyUnit {
    pub fn code(self) -> &'static str {
        match self {
            FrequencyUnit::Month => "mo",
            FrequencyUnit::Week => "wk",
            FrequencyUnit::Day => "d",
        }
    }
}

impl fmt::Display for FrequencyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for FrequencyUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mo" | "month" => Ok(FrequencyUnit::Month),
            "wk" | "week" => Ok(FrequencyUnit::Week),
            "d" | "day" => Ok(FrequencyUnit::Day),
            other => Err(format!("unknown frequency unit '{other}' (expected mo, wk or d)")),
        }
    }
}

/// Medication order form, persisted as `medicationFormData`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationOrderForm {
    pub treating_sickness: String,
    pub medication: String,
    pub quantity: u32,
    pub frequency: u32,
    pub frequency_unit: FrequencyUnit,
    pub period: u32,
    pub start_date: String,
}

impl MedicationOrderForm {
    /// Reasons the form cannot be submitted; empty when valid
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (field, value) in [
            ("treatingSickness", &self.treating_sickness),
            ("medication", &self.medication),
            ("startDate", &self.start_date),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{field} is required"));
            }
        }
        for (field, value) in [
            ("quantity", self.quantity),
            ("frequency", self.frequency),
            ("period", self.period),
        ] {
            if value == 0 {
                problems.push(format!("{field} must be greater than zero"));
            }
        }
        problems
    }

    /// Default claim quantity
    pub fn total_doses(&self) -> u32 {
        self.frequency.saturating_mul(self.period)
    }
}

pub fn build_medication_request(
    form: &MedicationOrderForm,
    patient_id: &str,
    practitioner_id: &str,
    authored_on: NaiveDate,
) -> Value {
    let option = find_medication(&form.medication);
    let unit = option.map(|m| m.unit).unwrap_or_default();
    let code = option.map(|m| m.code).unwrap_or_default();
    let dose_unit = option.map(|m| m.dose_unit).unwrap_or_default();
    let dose_quantity = option.map(|m| json!(m.dose_quantity)).unwrap_or_else(|| json!(""));
    let frequency_unit = form.frequency_unit.code();

    json!({
        "resourceType": "MedicationRequest",
        "subject": { "reference": format!("Patient/{}", patient_id) },
        "medicationReference": { "reference": format!("Medication/{}", form.medication) },
        "dispenseRequest": {
            "quantity": {
                "value": form.quantity,
                "unit": unit,
                "system": UCUM_SYSTEM,
                "code": unit,
            },
            "expectedSupplyDuration": {
                "unit": frequency_unit,
                "system": UCUM_SYSTEM,
                "code": frequency_unit,
                "value": form.frequency,
            }
        },
        "requester": { "reference": format!("Practitioner/{}", practitioner_id) },
        "authoredOn": authored_on.format("%Y-%m-%d").to_string(),
        "medicationCodeableConcept": {
            "coding": [{
                "system": RXNORM_SYSTEM,
                "code": code,
                "display": form.medication,
            }],
            "text": form.medication,
        },
        "intent": "order",
        "dosageInstruction": [{
            "timing": {
                "repeat": {
                    "boundsPeriod": { "start": form.start_date },
                    "frequency": form.frequency,
                    "period": form.period,
                    "periodUnit": frequency_unit,
                }
            },
            "doseAndRate": [{
                "doseQuantity": {
                    "value": dose_quantity,
                    "unit": dose_unit,
                    "system": UCUM_SYSTEM,
                    "code": dose_unit,
                }
            }],
            "text": format!(
                "{}, for {} times a {} for {} {}",
                form.medication, form.frequency, frequency_unit, form.period, frequency_unit
            ),
        }],
        "reason": [{ "text": form.treating_sickness }],
        "status": "active",
    })
}

pub const CLAIM_IDENTIFIER_SYSTEM: &str = "http://hospital.org/claims";
pub const CLAIM_IDENTIFIER: &str = "PA-20250302-001";
pub const CLAIM_COVERAGE: &str = "Coverage/insurance-coverage";

/// Amount and currency parsed from a "600 USD" string
#[derive(Debug, Clone, PartialEq)]
pub struct UnitPrice {
    pub value: f64,
    pub currency: String,
}

impl FromStr for UnitPrice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let value = parts
            .next()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| format!("unit price '{s}' must start with an amount"))?;
        let currency = parts
            .next()
            .ok_or_else(|| format!("unit price '{s}' is missing a currency"))?;
        if parts.next().is_some() {
            return Err(format!("unit price '{s}' has trailing text"));
        }
        Ok(UnitPrice {
            value,
            currency: currency.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimForm {
    pub patient: String,
    pub provider: String,
    pub insurer: String,
    #[serde(rename = "use")]
    pub use_: String,
    pub supporting_info: String,
    pub category: String,
    pub medication: String,
    pub quantity: u32,
    pub unit_price: String,
}

impl ClaimForm {
    /// Claim pre-filled from the patient and the stored medication order
    pub fn prefilled(patient_id: &str, order: Option<&MedicationOrderForm>) -> Self {
        Self {
            patient: format!("Patient/{}", patient_id),
            provider: "PractitionerRole/456".to_string(),
            insurer: "Organization/insurance-org".to_string(),
            use_: "preauthorization".to_string(),
            supporting_info: "QuestionnaireResponse/1122".to_string(),
            category: "Pharmacy".to_string(),
            medication: order.map(|o| o.medication.clone()).unwrap_or_default(),
            quantity: order.map(MedicationOrderForm::total_doses).unwrap_or_default(),
            unit_price: "600 USD".to_string(),
        }
    }

    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (field, value) in [
            ("patient", &self.patient),
            ("provider", &self.provider),
            ("insurer", &self.insurer),
            ("medication", &self.medication),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{field} is required"));
            }
        }
        if self.quantity == 0 {
            problems.push("quantity must be greater than zero".to_string());
        }
        if let Err(e) = self.unit_price.parse::<UnitPrice>() {
            problems.push(e);
        }
        problems
    }
}

/// `Parameters { Bundle(collection) { Claim } }`
pub fn build_claim(form: &ClaimForm, created: NaiveDate) -> Result<Value, String> {
    let price: UnitPrice = form.unit_price.parse()?;
    let date = created.format("%Y-%m-%d").to_string();
    let code = find_medication(&form.medication)
        .map(|m| m.code)
        .unwrap_or(MEDICATION_OPTIONS[0].code);

    let claim = json!({
        "resourceType": "Claim",
        "identifier": [{ "system": CLAIM_IDENTIFIER_SYSTEM, "value": CLAIM_IDENTIFIER }],
        "status": "active",
        "type": {
            "coding": [{
                "system": "http://terminology.hl7.org/CodeSystem/claim-type",
                "code": "professional",
                "display": "Professional",
            }]
        },
        "use": form.use_,
        "priority": {
            "coding": [{
                "system": "http://terminology.hl7.org/CodeSystem/processpriority",
                "code": "stat",
                "display": "Immediate",
            }]
        },
        "patient": { "reference": form.patient },
        "created": date,
        "insurer": { "reference": form.insurer },
        "provider": { "reference": form.provider },
        "insurance": [{
            "sequence": 1,
            "focal": true,
            "coverage": { "reference": CLAIM_COVERAGE },
        }],
        "supportingInfo": [{
            "sequence": 1,
            "category": {
                "coding": [{
                    "system": "http://terminology.hl7.org/CodeSystem/claiminformationcategory",
                    "code": "info",
                    "display": "Supporting Information",
                }]
            },
            "valueReference": { "reference": form.supporting_info },
        }],
        "item": [{
            "sequence": 1,
            "category": {
                "coding": [{
                    "system": "http://terminology.hl7.org/CodeSystem/ex-benefitcategory",
                    "code": "pharmacy",
                    "display": form.category,
                }]
            },
            "productOrService": {
                "coding": [{
                    "system": RXNORM_SYSTEM,
                    "code": code,
                    "display": form.medication,
                }]
            },
            "servicedDate": date,
            "unitPrice": { "value": price.value, "currency": price.currency },
            "quantity": { "value": form.quantity },
        }],
    });

    Ok(json!({
        "resourceType": "Parameters",
        "parameter": [{
            "name": "resource",
            "resource": {
                "resourceType": "Bundle",
                "type": "collection",
                "entry": [{ "resource": claim }],
            }
        }]
    }))
}

pub const CLAIM_OUTCOME_COMPLETE: &str = "complete";

/// Outcome of a claim-submit response.
///
/// The payer answers with `Parameters { ClaimResponse }`; a bare
/// ClaimResponse is accepted too.
pub fn claim_outcome(response: &Value) -> Option<&str> {
    response
        .pointer("/parameter/0/resource/outcome")
        .or_else(|| response.get("outcome"))
        .and_then(Value::as_str)
}

/// Display data for the selected patient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientSummary {
    pub id: String,
    pub display_name: String,
}

impl PatientSummary {
    /// `given[0] family` from the first `name` entry
    pub fn from_resource(id: &str, patient: &Value) -> Self {
        let name = patient.pointer("/name/0");
        let given = name
            .and_then(|n| n.pointer("/given/0"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let family = name
            .and_then(|n| n.get("family"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let display_name = format!("{given} {family}").trim().to_string();

        Self {
            id: id.to_string(),
            display_name: if display_name.is_empty() {
                format!("Patient/{id}")
            } else {
                display_name
            },
        }
    }
}
