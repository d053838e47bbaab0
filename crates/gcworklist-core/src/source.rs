// ── Worklist source contract ──
//
// A worklist browser talks to its backend only through `WorklistSource`.
// Every operation returns immediately with a task id and reports through
// the supplied callback, possibly on another thread.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use gcworklist_api::{DataTable, FieldSelection, TaskId};

/// Called once with whether a mutation was accepted.
pub type StatusObserver = Box<dyn FnOnce(bool) + Send>;
/// Called once with the resulting table and its numeric code (`0` on success).
pub type TableReceiver = Box<dyn FnOnce(DataTable, i32) + Send>;
/// Called once with the local path of a fetched file, or `None` on failure.
pub type FileReceiver = Box<dyn FnOnce(Option<PathBuf>) + Send>;
/// Called with transfer progress in percent.
pub type ProgressObserver = Arc<dyn Fn(u8) + Send + Sync>;

/// What a source can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SourceType {
    /// Worklists with the full patient/study/image hierarchy.
    FullWorklist,
    /// A flat list of files.
    Filelist,
}

/// The resource family, from root to leaf.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
    Worklist,
    Patient,
    Study,
    Image,
}

pub trait WorklistSource: Send + Sync {
    fn source_type(&self) -> SourceType;

    // ── Worklist mutations ──────────────────────────────────────────
    fn add_worklist(&self, title: &str, observer: StatusObserver) -> TaskId;
    fn update_worklist(
        &self,
        worklist_id: &str,
        title: &str,
        images: &BTreeSet<String>,
        observer: StatusObserver,
    ) -> TaskId;
    fn delete_worklist(&self, worklist_id: &str, observer: StatusObserver) -> TaskId;

    // ── Reads ───────────────────────────────────────────────────────
    fn list_worklists(&self, receiver: TableReceiver) -> TaskId;
    /// Empty `worklist_id` lists every patient.
    fn list_patients(&self, worklist_id: &str, receiver: TableReceiver) -> TaskId;
    fn list_studies(&self, patient_id: &str, receiver: TableReceiver) -> TaskId;
    /// Either filter may be empty.
    fn list_images(&self, worklist_id: &str, study_id: &str, receiver: TableReceiver) -> TaskId;

    // ── Files ───────────────────────────────────────────────────────
    fn image_thumbnail(
        &self,
        image_id: &str,
        receiver: FileReceiver,
        observer: ProgressObserver,
    ) -> TaskId;
    fn image_file(&self, image_id: &str, receiver: FileReceiver, observer: ProgressObserver)
    -> TaskId;

    /// Column names of a resource's current schema.
    fn headers(&self, kind: ResourceKind, selection: FieldSelection) -> Vec<String>;

    /// Returns `false` if the task had already finished.
    fn cancel_task(&self, id: TaskId) -> bool;
}
