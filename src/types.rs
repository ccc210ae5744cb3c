use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Equipment box on a well sheet. `None` means the value was never
/// captured; merging treats it as "leave the existing value alone".
/// Extraction never produces `Some("")`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquipmentSpecs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_make_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridal_cable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polish_rods: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liner_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rods: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tubing: Option<String>,
}

impl EquipmentSpecs {
    pub fn is_empty(&self) -> bool {
        self.engine_size.is_none()
            && self.unit_make_model.is_none()
            && self.bridal_cable.is_none()
            && self.polish_rods.is_none()
            && self.liner_size.is_none()
            && self.packing.is_none()
            && self.rods.is_none()
            && self.tubing.is_none()
    }
}

/// Everything the extractors could pull out of one invoice's OCR text.
/// Every field is optional; absence is distinct from an explicit value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub well_name_candidate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date_iso: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pump_type: Option<String>,
    #[serde(default)]
    pub equipment: EquipmentSpecs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_description_notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Service,
    Maintenance,
    Other,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Service => "service",
            RecordKind::Maintenance => "maintenance",
            RecordKind::Other => "other",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "maintenance" => RecordKind::Maintenance,
            "other" => RecordKind::Other,
            _ => RecordKind::Service,
        }
    }
}

/// A single history entry on a well. Never edited in place once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEntity {
    pub id: String,
    pub kind: RecordKind,
    /// ISO calendar date (yyyy-mm-dd).
    pub date: String,
    pub notes: String,
    /// Provenance: who or what created the entry (e.g. "Invoice OCR").
    pub by: String,
}

/// Record payload before the registry assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDraft {
    pub kind: RecordKind,
    pub date: String,
    pub notes: String,
    pub by: String,
}

/// A well as the registry stores it. Records are newest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellEntity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub pump_type: String,
    #[serde(default)]
    pub equipment: EquipmentSpecs,
    #[serde(default)]
    pub records: Vec<RecordEntity>,
}

/// Partial update for an existing well. Only `Some` members are applied,
/// and the merge engine only ever fills fields that are currently empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WellPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pump_type: Option<String>,
    #[serde(default)]
    pub equipment: EquipmentSpecs,
}

impl WellPatch {
    pub fn is_empty(&self) -> bool {
        self.location.is_none() && self.pump_type.is_none() && self.equipment.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Processing,
    Parsed,
    Saved,
    /// No well name could be extracted; needs manual operator input.
    /// Never silently replaced by a placeholder well.
    NeedsReview,
    Error,
}

/// One uploaded file moving through the batch pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    /// Where the uploaded file lives, kept so a failed item can be
    /// retried without re-supplying it.
    pub source_path: PathBuf,
    pub source_file_name: String,
    pub raw_text: String,
    pub status: QueueStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted: Option<ExtractedFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_well_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitAction {
    Created,
    Updated,
}

/// What one successful commit did to the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub well_id: String,
    pub action: CommitAction,
    pub record_id: String,
}

/// A commit either writes, or reports that the invoice needs a human.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommitResult {
    Committed(CommitOutcome),
    NeedsReview,
}
