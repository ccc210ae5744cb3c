//! Merge/commit engine: the one place that writes through the registry.
//!
//! Create-vs-merge is decided by the resolver's answer; writes are
//! non-destructive by construction. Extracted data never overwrites
//! operator-entered data: a field is only ever filled when the existing
//! value is empty (monotonic fill). Every committed invoice appends
//! exactly one service record so the audit trail stays one-to-one with
//! the paperwork.

use chrono::{NaiveDate, Utc};
use log::info;

use crate::error::ReconcileError;
use crate::registry::WellRegistry;
use crate::resolve::slugify;
use crate::types::{
    CommitAction, CommitOutcome, CommitResult, EquipmentSpecs, ExtractedFields, RecordDraft,
    RecordKind, WellEntity, WellPatch,
};

pub const PROVENANCE: &str = "Invoice OCR";

/// Monotonic fill: set only when the existing value is empty and the
/// extracted one is not. An empty extracted string never blanks a field.
fn fill(existing: &str, extracted: &Option<String>) -> Option<String> {
    match extracted {
        Some(v) if !v.trim().is_empty() && existing.trim().is_empty() => Some(v.clone()),
        _ => None,
    }
}

fn fill_opt(existing: &Option<String>, extracted: &Option<String>) -> Option<String> {
    fill(existing.as_deref().unwrap_or(""), extracted)
}

fn equipment_fill(existing: &EquipmentSpecs, extracted: &EquipmentSpecs) -> EquipmentSpecs {
    EquipmentSpecs {
        engine_size: fill_opt(&existing.engine_size, &extracted.engine_size),
        unit_make_model: fill_opt(&existing.unit_make_model, &extracted.unit_make_model),
        bridal_cable: fill_opt(&existing.bridal_cable, &extracted.bridal_cable),
        polish_rods: fill_opt(&existing.polish_rods, &extracted.polish_rods),
        liner_size: fill_opt(&existing.liner_size, &extracted.liner_size),
        packing: fill_opt(&existing.packing, &extracted.packing),
        rods: fill_opt(&existing.rods, &extracted.rods),
        tubing: fill_opt(&existing.tubing, &extracted.tubing),
    }
}

/// Build the non-destructive patch for merging an invoice into an
/// existing well. Empty when the invoice adds nothing new.
fn build_patch(existing: &WellEntity, fields: &ExtractedFields) -> WellPatch {
    WellPatch {
        location: fill(&existing.location, &fields.location),
        pump_type: fill(&existing.pump_type, &fields.pump_type),
        equipment: equipment_fill(&existing.equipment, &fields.equipment),
    }
}

/// Deterministic-ish id for a freshly created well: name slug plus a
/// time suffix to separate wells with near-identical display names.
fn new_well_id(name: &str) -> String {
    let slug = slugify(name);
    let millis = Utc::now().timestamp_millis();
    if slug.is_empty() {
        format!("well-{}", millis)
    } else {
        format!("well-{}-{:04}", slug, millis % 10_000)
    }
}

/// Summary note for the appended record: invoice metadata first, then the
/// work-description blob.
fn record_notes(fields: &ExtractedFields) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(v) = &fields.vendor {
        parts.push(format!("Vendor: {}", v));
    }
    if let Some(n) = &fields.invoice_number {
        parts.push(format!("Invoice #: {}", n));
    }
    if let Some(a) = &fields.amount {
        parts.push(format!("Amount: {}", a));
    }
    if let Some(d) = &fields.work_description_notes {
        parts.push(d.clone());
    }
    parts.join(" • ")
}

/// Commit one parsed invoice: exactly one well create-or-merge plus one
/// record append, or a reported skip when no well name was extracted.
///
/// The `today` date is the commit-time policy fallback for invoices whose
/// date could not be read; extractors themselves never guess.
pub fn commit(
    registry: &mut dyn WellRegistry,
    fields: &ExtractedFields,
    resolved_well_id: Option<&str>,
    today: NaiveDate,
) -> Result<CommitResult, ReconcileError> {
    let name = match fields.well_name_candidate.as_deref().map(str::trim) {
        Some(n) if !n.is_empty() => n,
        // Not an error: surfaced to the operator for manual review
        // instead of inventing a placeholder well.
        _ => return Ok(CommitResult::NeedsReview),
    };

    let (well_id, action) = match resolved_well_id {
        Some(id) => {
            // Re-read the latest state before merging; the resolver's
            // snapshot may predate earlier commits in this batch.
            let existing = registry
                .get(id)?
                .ok_or_else(|| ReconcileError::Registry(format!("resolved well vanished: {}", id)))?;
            let patch = build_patch(&existing, fields);
            if !patch.is_empty() {
                registry.update_fields(id, &patch)?;
            }
            info!("merged invoice into existing well {} ({})", id, existing.name);
            (id.to_string(), CommitAction::Updated)
        }
        None => {
            let well = WellEntity {
                id: new_well_id(name),
                name: name.to_string(),
                location: fields.location.clone().unwrap_or_default(),
                pump_type: fields
                    .pump_type
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
                equipment: fields.equipment.clone(),
                records: Vec::new(),
            };
            let created = registry.create(well)?;
            info!("created well {} ({})", created.id, created.name);
            (created.id, CommitAction::Created)
        }
    };

    let record = registry.append_record(
        &well_id,
        RecordDraft {
            kind: RecordKind::Service,
            date: fields
                .invoice_date_iso
                .clone()
                .unwrap_or_else(|| today.format("%Y-%m-%d").to_string()),
            notes: record_notes(fields),
            by: PROVENANCE.to_string(),
        },
    )?;

    Ok(CommitResult::Committed(CommitOutcome {
        well_id,
        action,
        record_id: record.id,
    }))
}
