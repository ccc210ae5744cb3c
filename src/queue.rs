//! Batch queue controller: per-item state machine over uploaded invoices.
//!
//! Items move `Pending -> Processing -> {Parsed, Error}` during OCR and
//! extraction, then `Parsed -> {Saved, NeedsReview, Error}` on commit.
//! Processing is strictly sequential, one item at a time, so two invoices
//! naming the same well can never interleave their writes; each commit
//! re-reads the registry first. One item's failure never aborts the rest
//! of the batch.

use chrono::Local;
use log::{info, warn};
use std::path::PathBuf;

use crate::error::ReconcileError;
use crate::extract::extract_all;
use crate::merge::commit;
use crate::normalize::normalize;
use crate::ocr::OcrCapability;
use crate::registry::WellRegistry;
use crate::resolve::resolve;
use crate::types::{CommitResult, QueueItem, QueueStatus};

pub const REVIEW_MESSAGE: &str = "No well name detected - review manually";

pub struct QueueController<O: OcrCapability, R: WellRegistry> {
    ocr: O,
    registry: R,
    items: Vec<QueueItem>,
    next_item: u64,
}

impl<O: OcrCapability, R: WellRegistry> QueueController<O, R> {
    pub fn new(ocr: O, registry: R) -> Self {
        Self {
            ocr,
            registry,
            items: Vec::new(),
            next_item: 0,
        }
    }

    /// Current queue snapshot for the UI.
    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn into_registry(self) -> R {
        self.registry
    }

    /// Enqueue files and run OCR + extraction over each, sequentially.
    /// Returns the queue snapshot.
    pub fn submit_batch(&mut self, files: &[PathBuf]) -> &[QueueItem] {
        let first_new = self.items.len();
        for file in files {
            self.next_item += 1;
            self.items.push(QueueItem {
                id: format!("item-{}", self.next_item),
                source_path: file.clone(),
                source_file_name: file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("")
                    .to_string(),
                raw_text: String::new(),
                status: QueueStatus::Pending,
                extracted: None,
                resolved_well_id: None,
                error: None,
            });
        }
        for idx in first_new..self.items.len() {
            self.process_item(idx);
        }
        &self.items[first_new..]
    }

    fn process_item(&mut self, idx: usize) {
        let file = self.items[idx].source_path.clone();
        self.items[idx].status = QueueStatus::Processing;
        match self.ocr.recognize(&file) {
            Ok(text) => {
                self.items[idx].raw_text = text;
                let doc = normalize(&self.items[idx].raw_text);
                if doc.is_empty() {
                    // No text at all: error out without touching the registry.
                    self.items[idx].status = QueueStatus::Error;
                    self.items[idx].error = Some("OCR produced no text".to_string());
                    return;
                }
                self.items[idx].extracted = Some(extract_all(&doc));
                self.items[idx].status = QueueStatus::Parsed;
                self.items[idx].error = None;
            }
            Err(e) => {
                warn!("OCR failed for {}: {}", self.items[idx].source_file_name, e);
                self.items[idx].status = QueueStatus::Error;
                self.items[idx].error = Some(e.to_string());
            }
        }
    }

    fn index_of(&self, item_id: &str) -> Result<usize, ReconcileError> {
        self.items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| ReconcileError::UnknownItem(item_id.to_string()))
    }

    /// Re-queue a failed item and reprocess it from its stored source
    /// path. Items in any other state are left alone.
    pub fn retry_item(&mut self, item_id: &str) -> Result<(), ReconcileError> {
        let idx = self.index_of(item_id)?;
        if self.items[idx].status != QueueStatus::Error {
            warn!("retry ignored: {} is not in error state", item_id);
            return Ok(());
        }
        self.items[idx].status = QueueStatus::Pending;
        self.items[idx].error = None;
        self.process_item(idx);
        Ok(())
    }

    /// Commit a single parsed item.
    pub fn commit_one(&mut self, item_id: &str) -> Result<QueueItem, ReconcileError> {
        let idx = self.index_of(item_id)?;
        self.commit_item(idx);
        Ok(self.items[idx].clone())
    }

    /// Commit every parsed item, continuing past individual failures.
    /// Returns the per-item outcome list.
    pub fn commit_all(&mut self) -> Vec<QueueItem> {
        for idx in 0..self.items.len() {
            if self.items[idx].status == QueueStatus::Parsed {
                self.commit_item(idx);
            }
        }
        self.items.clone()
    }

    fn commit_item(&mut self, idx: usize) {
        if self.items[idx].status != QueueStatus::Parsed {
            return;
        }
        let fields = match &self.items[idx].extracted {
            Some(f) => f.clone(),
            None => return,
        };

        // Ambiguous extraction is a reported state, not an error; skip
        // before any registry traffic.
        let has_name = fields
            .well_name_candidate
            .as_deref()
            .map(|n| !n.trim().is_empty())
            .unwrap_or(false);
        if !has_name {
            self.items[idx].status = QueueStatus::NeedsReview;
            self.items[idx].error = Some(REVIEW_MESSAGE.to_string());
            return;
        }

        // Fresh snapshot per item: earlier commits in this batch may have
        // created the well this one refers to.
        let resolved = match self.registry.list_all() {
            Ok(wells) => fields
                .well_name_candidate
                .as_deref()
                .and_then(|name| resolve(name, &wells)),
            Err(e) => {
                self.items[idx].status = QueueStatus::Error;
                self.items[idx].error = Some(e.to_string());
                return;
            }
        };

        let today = Local::now().date_naive();
        match commit(&mut self.registry, &fields, resolved.as_deref(), today) {
            Ok(CommitResult::Committed(outcome)) => {
                info!(
                    "{}: {:?} well {} (record {})",
                    self.items[idx].source_file_name, outcome.action, outcome.well_id, outcome.record_id
                );
                self.items[idx].resolved_well_id = Some(outcome.well_id);
                self.items[idx].status = QueueStatus::Saved;
                self.items[idx].error = None;
            }
            Ok(CommitResult::NeedsReview) => {
                self.items[idx].status = QueueStatus::NeedsReview;
                self.items[idx].error = Some(REVIEW_MESSAGE.to_string());
            }
            Err(e) => {
                warn!(
                    "commit failed for {}: {}",
                    self.items[idx].source_file_name, e
                );
                self.items[idx].status = QueueStatus::Error;
                self.items[idx].error = Some(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;
    use crate::types::{RecordDraft, RecordEntity, WellEntity, WellPatch};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::path::Path;

    /// Canned OCR: maps file names to text or a forced failure.
    struct StubOcr {
        texts: HashMap<String, String>,
        failures: RefCell<HashMap<String, u32>>,
    }

    impl StubOcr {
        fn new() -> Self {
            Self {
                texts: HashMap::new(),
                failures: RefCell::new(HashMap::new()),
            }
        }

        fn with_text(mut self, name: &str, text: &str) -> Self {
            self.texts.insert(name.to_string(), text.to_string());
            self
        }

        /// Fail the first `n` recognitions of this file, then use `texts`.
        fn failing(self, name: &str, n: u32) -> Self {
            self.failures.borrow_mut().insert(name.to_string(), n);
            self
        }
    }

    impl OcrCapability for StubOcr {
        fn recognize(&self, file: &Path) -> Result<String, ReconcileError> {
            let name = file.file_name().unwrap().to_str().unwrap().to_string();
            let mut failures = self.failures.borrow_mut();
            if let Some(left) = failures.get_mut(&name) {
                if *left > 0 {
                    *left -= 1;
                    return Err(ReconcileError::Ocr("scanner offline".to_string()));
                }
            }
            self.texts
                .get(&name)
                .cloned()
                .ok_or_else(|| ReconcileError::Ocr(format!("no such fixture: {}", name)))
        }
    }

    /// Counts registry traffic and optionally fails writes for one well
    /// name, for batch-isolation tests.
    struct CountingRegistry {
        inner: MemoryRegistry,
        calls: Cell<u32>,
        fail_create_named: Option<String>,
    }

    impl CountingRegistry {
        fn new() -> Self {
            Self {
                inner: MemoryRegistry::new(),
                calls: Cell::new(0),
                fail_create_named: None,
            }
        }

        fn bump(&self) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    impl WellRegistry for CountingRegistry {
        fn list_all(&self) -> Result<Vec<WellEntity>, ReconcileError> {
            self.bump();
            self.inner.list_all()
        }
        fn find_by_name(&self, name: &str) -> Result<Option<WellEntity>, ReconcileError> {
            self.bump();
            self.inner.find_by_name(name)
        }
        fn get(&self, id: &str) -> Result<Option<WellEntity>, ReconcileError> {
            self.bump();
            self.inner.get(id)
        }
        fn create(&mut self, well: WellEntity) -> Result<WellEntity, ReconcileError> {
            self.bump();
            if self.fail_create_named.as_deref() == Some(well.name.as_str()) {
                return Err(ReconcileError::Registry("disk full".to_string()));
            }
            self.inner.create(well)
        }
        fn update_fields(
            &mut self,
            id: &str,
            patch: &WellPatch,
        ) -> Result<WellEntity, ReconcileError> {
            self.bump();
            self.inner.update_fields(id, patch)
        }
        fn append_record(
            &mut self,
            id: &str,
            draft: RecordDraft,
        ) -> Result<RecordEntity, ReconcileError> {
            self.bump();
            self.inner.append_record(id, draft)
        }
    }

    const INVOICE_A: &str = "WELL\nMontgomery #3\nDATE 02/19/2024\nCONTRACT WORK DESCRIPTION\n54 x 3/4\" rods\n120 joints 2-3/8\" tubing\nPAYMENT";

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn happy_path_parses_and_saves() {
        let ocr = StubOcr::new().with_text("a.pdf", INVOICE_A);
        let mut ctl = QueueController::new(ocr, MemoryRegistry::new());

        ctl.submit_batch(&paths(&["a.pdf"]));
        assert_eq!(ctl.items()[0].status, QueueStatus::Parsed);

        let outcomes = ctl.commit_all();
        assert_eq!(outcomes[0].status, QueueStatus::Saved);
        let well_id = outcomes[0].resolved_well_id.clone().unwrap();

        let reg = ctl.into_registry();
        let well = reg.get(&well_id).unwrap().unwrap();
        assert_eq!(well.name, "Montgomery #3");
        assert_eq!(well.records.len(), 1);
        assert_eq!(well.records[0].date, "2024-02-19");
    }

    #[test]
    fn empty_ocr_text_errors_with_no_registry_calls() {
        let ocr = StubOcr::new().with_text("blank.pdf", "  \n \n");
        let mut ctl = QueueController::new(ocr, CountingRegistry::new());

        ctl.submit_batch(&paths(&["blank.pdf"]));
        assert_eq!(ctl.items()[0].status, QueueStatus::Error);
        ctl.commit_all();

        let reg = ctl.into_registry();
        assert_eq!(reg.calls.get(), 0);
    }

    #[test]
    fn missing_well_name_is_surfaced_not_committed() {
        let ocr = StubOcr::new().with_text("odd.pdf", "completely unrelated scribbles\nmore of the same scribbles here");
        let mut ctl = QueueController::new(ocr, CountingRegistry::new());

        ctl.submit_batch(&paths(&["odd.pdf"]));
        assert_eq!(ctl.items()[0].status, QueueStatus::Parsed);

        let outcomes = ctl.commit_all();
        assert_eq!(outcomes[0].status, QueueStatus::NeedsReview);
        assert_eq!(outcomes[0].error.as_deref(), Some(REVIEW_MESSAGE));

        // Surfacing, not silent placeholder creation: nothing was written.
        let reg = ctl.into_registry();
        assert_eq!(reg.calls.get(), 0);
        assert!(reg.inner.list_all().unwrap().is_empty());
    }

    #[test]
    fn one_failed_commit_does_not_abort_the_batch() {
        let ocr = StubOcr::new()
            .with_text("one.pdf", "WELL: Alpha 1\nDATE 01/05/2024")
            .with_text("two.pdf", "WELL: Bravo 2\nDATE 01/06/2024")
            .with_text("three.pdf", "WELL: Charlie 3\nDATE 01/07/2024");
        let mut reg = CountingRegistry::new();
        reg.fail_create_named = Some("Bravo 2".to_string());
        let mut ctl = QueueController::new(ocr, reg);

        ctl.submit_batch(&paths(&["one.pdf", "two.pdf", "three.pdf"]));
        let outcomes = ctl.commit_all();

        assert_eq!(outcomes[0].status, QueueStatus::Saved);
        assert_eq!(outcomes[1].status, QueueStatus::Error);
        assert!(outcomes[1].error.as_deref().unwrap().contains("disk full"));
        assert_eq!(outcomes[2].status, QueueStatus::Saved);

        let reg = ctl.into_registry();
        let names: Vec<String> = reg
            .inner
            .list_all()
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(names, vec!["Alpha 1", "Charlie 3"]);
    }

    #[test]
    fn two_invoices_for_the_same_new_well_merge_into_one() {
        let ocr = StubOcr::new()
            .with_text("one.pdf", "WELL: Montgomery #3\n54 x 3/4\" rods ran")
            .with_text("two.pdf", "WELL: Montgomery #3\n120 joints 2-3/8\" tubing");
        let mut ctl = QueueController::new(ocr, MemoryRegistry::new());

        ctl.submit_batch(&paths(&["one.pdf", "two.pdf"]));
        ctl.commit_all();

        let reg = ctl.into_registry();
        let wells = reg.list_all().unwrap();
        // Second commit re-read the registry and resolved the well the
        // first one created.
        assert_eq!(wells.len(), 1);
        assert_eq!(wells[0].records.len(), 2);
        assert_eq!(wells[0].equipment.rods.as_deref(), Some("54 x 3/4\""));
        assert_eq!(
            wells[0].equipment.tubing.as_deref(),
            Some("120 joints 2-3/8\"")
        );
    }

    #[test]
    fn retry_requeues_an_ocr_failure() {
        let ocr = StubOcr::new()
            .with_text("flaky.pdf", INVOICE_A)
            .failing("flaky.pdf", 1);
        let mut ctl = QueueController::new(ocr, MemoryRegistry::new());

        ctl.submit_batch(&paths(&["flaky.pdf"]));
        assert_eq!(ctl.items()[0].status, QueueStatus::Error);
        let id = ctl.items()[0].id.clone();

        // Retry reuses the path the item was submitted with.
        ctl.retry_item(&id).unwrap();
        assert_eq!(ctl.items()[0].status, QueueStatus::Parsed);

        let outcome = ctl.commit_one(&id).unwrap();
        assert_eq!(outcome.status, QueueStatus::Saved);
    }

    #[test]
    fn unknown_item_id_is_rejected() {
        let ctl_err = {
            let ocr = StubOcr::new();
            let mut ctl = QueueController::new(ocr, MemoryRegistry::new());
            ctl.commit_one("item-99")
        };
        assert!(matches!(ctl_err, Err(ReconcileError::UnknownItem(_))));
    }
}
