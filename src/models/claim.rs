//! Claim input types: the five clinical fields and their submitted values.

use serde::{Deserialize, Serialize};

/// The five clinical fields of a claim, in their fixed processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Complaint,
    Symptoms,
    Diagnosis,
    Lab,
    Pharmacy,
}

impl FieldName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complaint => "complaint",
            Self::Symptoms => "symptoms",
            Self::Diagnosis => "diagnosis",
            Self::Lab => "lab",
            Self::Pharmacy => "pharmacy",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "complaint" => Some(Self::Complaint),
            "symptoms" => Some(Self::Symptoms),
            "diagnosis" => Some(Self::Diagnosis),
            "lab" => Some(Self::Lab),
            "pharmacy" => Some(Self::Pharmacy),
            _ => None,
        }
    }

    pub fn all() -> &'static [FieldName] {
        &[
            Self::Complaint,
            Self::Symptoms,
            Self::Diagnosis,
            Self::Lab,
            Self::Pharmacy,
        ]
    }

    /// Display label used in oracle prompts ("Chief Complaints" etc.).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Complaint => "Chief Complaints",
            Self::Symptoms => "Symptoms",
            Self::Diagnosis => "Diagnosis",
            Self::Lab => "Lab/Investigations",
            Self::Pharmacy => "Pharmacy",
        }
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The five field slots of one claim. Any slot may be absent; a claim is
/// evaluable only when at least one slot holds a non-blank value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimFields {
    pub complaint: Option<String>,
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub lab: Option<String>,
    pub pharmacy: Option<String>,
}

impl ClaimFields {
    /// The trimmed value for a field, or None when absent or blank.
    pub fn get(&self, field: FieldName) -> Option<&str> {
        let raw = match field {
            FieldName::Complaint => self.complaint.as_deref(),
            FieldName::Symptoms => self.symptoms.as_deref(),
            FieldName::Diagnosis => self.diagnosis.as_deref(),
            FieldName::Lab => self.lab.as_deref(),
            FieldName::Pharmacy => self.pharmacy.as_deref(),
        };
        raw.map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, field: FieldName, value: Option<String>) {
        let slot = match field {
            FieldName::Complaint => &mut self.complaint,
            FieldName::Symptoms => &mut self.symptoms,
            FieldName::Diagnosis => &mut self.diagnosis,
            FieldName::Lab => &mut self.lab,
            FieldName::Pharmacy => &mut self.pharmacy,
        };
        *slot = value;
    }

    /// Fields that carry a value, in processing order.
    pub fn present(&self) -> Vec<(FieldName, &str)> {
        FieldName::all()
            .iter()
            .filter_map(|&f| self.get(f).map(|v| (f, v)))
            .collect()
    }

    /// A claim needs at least one populated field to be evaluated.
    pub fn is_evaluable(&self) -> bool {
        FieldName::all().iter().any(|&f| self.get(f).is_some())
    }
}
