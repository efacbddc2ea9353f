//! Sequential batch evaluation with visible per-claim progress.
//!
//! Claims process one at a time for UI-feedback reasons, not resource
//! limits. A pause request suspends between claims, never mid-claim; a stop
//! request ends the run while keeping every already-completed row. A row
//! that fails records an error result and the batch continues.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ClaimFields, ClaimResult, Decision, FieldName};
use crate::pipeline::embedding::EmbeddingModel;
use crate::pipeline::oracle::Oracle;
use crate::pipeline::orchestrator::ClaimPipeline;

/// Recognized column aliases per field. Unrecognized columns are ignored.
const COLUMN_ALIASES: &[(&str, FieldName)] = &[
    ("complaint", FieldName::Complaint),
    ("chief_complaints", FieldName::Complaint),
    ("chief_complaint", FieldName::Complaint),
    ("complaints", FieldName::Complaint),
    ("symptoms", FieldName::Symptoms),
    ("symptom", FieldName::Symptoms),
    ("diagnosis", FieldName::Diagnosis),
    ("diagnosis_description", FieldName::Diagnosis),
    ("diagnosis_code", FieldName::Diagnosis),
    ("lab", FieldName::Lab),
    ("service_detail", FieldName::Lab),
    ("lab_test", FieldName::Lab),
    ("labs", FieldName::Lab),
    ("pharmacy", FieldName::Pharmacy),
    ("payer_product_category_name", FieldName::Pharmacy),
    ("medication", FieldName::Pharmacy),
    ("drug", FieldName::Pharmacy),
];

/// Columns recognized as a row identity.
const ID_COLUMNS: &[&str] = &["id", "case_id"];

/// One claim row mapped out of a tabular upload.
#[derive(Debug, Clone)]
pub struct ClaimRecord {
    pub case_id: String,
    pub fields: ClaimFields,
}

/// Map a parsed table (headers + rows) onto claim records.
///
/// Rows without an id column get a sequential placeholder identity.
pub fn map_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<ClaimRecord> {
    let normalized: Vec<String> = headers
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            let mut fields = ClaimFields::default();
            let mut case_id = (idx + 1).to_string();

            for (col, header) in normalized.iter().enumerate() {
                let Some(cell) = row.get(col).map(|c| c.trim()).filter(|c| !c.is_empty()) else {
                    continue;
                };

                if ID_COLUMNS.contains(&header.as_str()) {
                    case_id = cell.to_string();
                    continue;
                }

                if let Some((_, field)) = COLUMN_ALIASES.iter().find(|(alias, _)| alias == header) {
                    // First matching column wins for a field
                    if fields.get(*field).is_none() {
                        fields.set(*field, Some(cell.to_string()));
                    }
                }
            }

            ClaimRecord { case_id, fields }
        })
        .collect()
}

/// Run control shared with the UI: pause suspends between claims, stop ends
/// the run keeping completed rows.
#[derive(Clone, Default)]
pub struct BatchControl {
    inner: Arc<ControlInner>,
}

#[derive(Default)]
struct ControlInner {
    paused: AtomicBool,
    stopped: AtomicBool,
}

impl BatchControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }
}

/// Event emitted during batch processing for the progress indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BatchStatusEvent {
    Started {
        total: u32,
    },
    Progress {
        completed: u32,
        total: u32,
        case_id: String,
    },
    Stopped {
        completed: u32,
    },
    Completed {
        completed: u32,
        duration_ms: u64,
    },
}

/// One processed row: a claim result, or an error entry when evaluation was
/// rejected (decision = Error) with the batch continuing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRow {
    pub case_id: String,
    pub decision: Decision,
    pub result: Option<ClaimResult>,
    pub error: Option<String>,
}

/// Outcome of a batch run. Rows completed before a stop are always kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub batch_id: Uuid,
    pub started_at: NaiveDateTime,
    pub rows: Vec<BatchRow>,
    pub total_processed: u32,
    pub stopped_early: bool,
    pub duration_ms: u64,
}

pub struct BatchRunner<'a, O: Oracle, E: EmbeddingModel> {
    pipeline: &'a ClaimPipeline<'a, O, E>,
    control: BatchControl,
}

impl<'a, O: Oracle, E: EmbeddingModel> BatchRunner<'a, O, E> {
    pub fn new(pipeline: &'a ClaimPipeline<'a, O, E>, control: BatchControl) -> Self {
        Self { pipeline, control }
    }

    /// Process records sequentially, emitting progress after each claim.
    pub fn run(
        &self,
        records: &[ClaimRecord],
        mut on_event: impl FnMut(BatchStatusEvent),
    ) -> BatchOutcome {
        let start = Instant::now();
        let started_at = chrono::Local::now().naive_local();
        let total = records.len() as u32;
        let mut rows = Vec::new();
        let mut stopped_early = false;

        on_event(BatchStatusEvent::Started { total });

        for record in records {
            // Suspension points sit between claims, never mid-claim
            while self.control.is_paused() && !self.control.is_stopped() {
                std::thread::sleep(Duration::from_millis(50));
            }
            if self.control.is_stopped() {
                stopped_early = true;
                break;
            }

            let row = match self.pipeline.evaluate_case(&record.case_id, &record.fields) {
                Ok(result) => BatchRow {
                    case_id: record.case_id.clone(),
                    decision: result.final_decision,
                    result: Some(result),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(case_id = %record.case_id, error = %e, "Batch row failed, continuing");
                    BatchRow {
                        case_id: record.case_id.clone(),
                        decision: Decision::Error,
                        result: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            rows.push(row);

            on_event(BatchStatusEvent::Progress {
                completed: rows.len() as u32,
                total,
                case_id: record.case_id.clone(),
            });
        }

        let completed = rows.len() as u32;
        let duration_ms = start.elapsed().as_millis() as u64;
        if stopped_early {
            on_event(BatchStatusEvent::Stopped { completed });
        } else {
            on_event(BatchStatusEvent::Completed {
                completed,
                duration_ms,
            });
        }

        BatchOutcome {
            batch_id: Uuid::new_v4(),
            started_at,
            rows,
            total_processed: completed,
            stopped_early,
            duration_ms,
        }
    }
}
