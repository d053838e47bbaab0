// Grand Challenge resource client
//
// CRUD over worklists and read access to the patient/study/image hierarchy,
// with schemas learned from the live API: patients and studies from a sample
// record, worklists from OPTIONS introspection, images from a fixed set.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use gcworklist_api::download::download_to_file;
use gcworklist_api::normalize::{
    options_response_to_table_schema, response_to_filtered_table, response_to_table,
    response_to_table_schema,
};
use gcworklist_api::{
    AuthState, AuthenticatedConnection, ClientOptions, Connection, Credentials, DataTable,
    FieldSelection, Request, StatusCode, TaskId, result_code,
};

use crate::config::{GrandChallengeUrls, SourceConfig};
use crate::error::CoreError;
use crate::source::{
    FileReceiver, ProgressObserver, ResourceKind, SourceType, StatusObserver, TableReceiver,
    WorklistSource,
};

/// Fields kept for image rows, and the image schema.
const IMAGE_FIELDS: [&str; 2] = ["pk", "name"];
/// The one column left visible in patient and study schemas.
const DISPLAY_COLUMN: &str = "name";

#[derive(Debug, Default, Clone)]
struct Schemas {
    /// Bumped on every credential change. A refresh only stores results if
    /// the generation it started under is still current.
    generation: u64,
    worklist: DataTable,
    patient: DataTable,
    study: DataTable,
    image: DataTable,
}

impl Schemas {
    fn get(&self, kind: ResourceKind) -> &DataTable {
        match kind {
            ResourceKind::Worklist => &self.worklist,
            ResourceKind::Patient => &self.patient,
            ResourceKind::Study => &self.study,
            ResourceKind::Image => &self.image,
        }
    }
}

#[derive(Deserialize)]
struct ImageRecord {
    name: String,
    #[serde(default)]
    files: Vec<ImageFile>,
}

#[derive(Deserialize)]
struct ImageFile {
    file: String,
}

struct Inner {
    connection: AuthenticatedConnection,
    urls: GrandChallengeUrls,
    download_dir: PathBuf,
    schemas: RwLock<Schemas>,
    /// Held for the duration of a schema refresh. Holds the generation of the
    /// last refresh whose results were stored.
    refresh: tokio::sync::Mutex<Option<u64>>,
}

/// Worklist source backed by a Grand Challenge REST deployment.
///
/// Cheaply cloneable; clones share the connection and schema store.
#[derive(Clone)]
pub struct GrandChallengeSource {
    inner: Arc<Inner>,
}

impl GrandChallengeSource {
    /// Connect, verify credentials, and learn every schema.
    ///
    /// Returns once the worklist, patient and study schemas have all been
    /// attempted. Discovery failures are tolerated: the affected schema stays
    /// empty and is retried the next time a read brings back rows.
    pub async fn connect(config: SourceConfig) -> Result<Self, CoreError> {
        let options = ClientOptions::new(config.scheme)
            .tls((&config.tls).into())
            .timeout(config.timeout);
        let connection = Connection::new(&config.urls.base_url, &options)?;
        let connection = AuthenticatedConnection::connect_with_probe(
            connection,
            config.scheme,
            config.credentials,
            config.probe_path,
        )
        .await?;

        let source = Self {
            inner: Arc::new(Inner {
                connection,
                urls: config.urls,
                download_dir: config.download_dir,
                schemas: RwLock::new(Schemas {
                    image: image_schema(),
                    ..Schemas::default()
                }),
                refresh: tokio::sync::Mutex::new(None),
            }),
        };
        source.refresh_schemas().await;
        Ok(source)
    }

    pub fn urls(&self) -> &GrandChallengeUrls {
        &self.inner.urls
    }

    pub fn download_dir(&self) -> &Path {
        &self.inner.download_dir
    }

    /// Re-learn every schema from the server.
    ///
    /// If a refresh is already running this waits for it, and only starts
    /// another if that one was begun under different credentials.
    pub async fn refresh_schemas(&self) {
        self.inner.refresh_schemas().await;
    }

    pub fn authentication_status(&self) -> AuthState {
        self.inner.connection.authentication_status()
    }

    /// Swap credentials, cancelling every outstanding task first.
    ///
    /// Schema refreshes still running under the old credentials are
    /// discarded. Schemas are re-learned when the new credentials verify.
    pub async fn set_credentials(&self, credentials: Credentials) -> Result<AuthState, CoreError> {
        let state = self.inner.connection.set_credentials(credentials).await?;
        self.inner.next_generation();
        if state == AuthState::Authenticated {
            self.refresh_schemas().await;
        }
        Ok(state)
    }

    /// Queue a mutation whose success is signalled by one specific status.
    fn submit_expecting(
        &self,
        request: Request,
        expected: StatusCode,
        observer: StatusObserver,
    ) -> TaskId {
        let action = format!("{} {}", request.method, request.target);
        self.inner.connection.submit(request, move |result| {
            let accepted = match result {
                Ok(resp) if resp.status == expected => true,
                Ok(resp) => {
                    debug!(%action, status = %resp.status, %expected, "mutation refused");
                    false
                }
                Err(e) => {
                    warn!(%action, error = %e, "mutation failed");
                    false
                }
            };
            observer(accepted);
        })
    }

    /// Queue a list read normalized into a table seeded with `kind`'s schema.
    fn submit_read(&self, kind: ResourceKind, request: Request, receiver: TableReceiver) -> TaskId {
        let schema = self.inner.schema(kind);
        let schema_was_empty = schema.column_count() == 0;
        let inner = Arc::clone(&self.inner);

        let job = async move {
            let mut table = schema;
            let result = inner.read_into(kind, request, &mut table).await;
            if let Err(ref e) = result {
                debug!(%kind, error = %e, "read finished with an error");
            }

            if schema_was_empty && !table.is_empty() && kind != ResourceKind::Image {
                info!(%kind, "rows arrived before the schema was known; refreshing schemas");
                let healer = Arc::clone(&inner);
                inner
                    .connection
                    .submit_job(async move { healer.refresh_schemas().await }, |()| {});
            }
            (table, result_code(&result))
        };

        self.inner
            .connection
            .submit_job(job, move |(table, code)| receiver(table, code))
    }
}

impl WorklistSource for GrandChallengeSource {
    fn source_type(&self) -> SourceType {
        SourceType::FullWorklist
    }

    fn add_worklist(&self, title: &str, observer: StatusObserver) -> TaskId {
        let body = json!({ "title": title, "images": [] });
        let request = Request::post(self.inner.urls.worklists.clone(), body);
        self.submit_expecting(request, StatusCode::CREATED, observer)
    }

    fn update_worklist(
        &self,
        worklist_id: &str,
        title: &str,
        images: &BTreeSet<String>,
        observer: StatusObserver,
    ) -> TaskId {
        let body = json!({ "title": title, "images": images });
        let request = Request::patch(record_path(&self.inner.urls.worklists, worklist_id), body);
        self.submit_expecting(request, StatusCode::OK, observer)
    }

    fn delete_worklist(&self, worklist_id: &str, observer: StatusObserver) -> TaskId {
        let request = Request::delete(record_path(&self.inner.urls.worklists, worklist_id));
        self.submit_expecting(request, StatusCode::NO_CONTENT, observer)
    }

    fn list_worklists(&self, receiver: TableReceiver) -> TaskId {
        let request = Request::get(self.inner.urls.worklists.clone());
        self.submit_read(ResourceKind::Worklist, request, receiver)
    }

    fn list_patients(&self, worklist_id: &str, receiver: TableReceiver) -> TaskId {
        let request = with_filter(
            Request::get(self.inner.urls.patients.clone()),
            "worklist",
            worklist_id,
        );
        self.submit_read(ResourceKind::Patient, request, receiver)
    }

    fn list_studies(&self, patient_id: &str, receiver: TableReceiver) -> TaskId {
        let request = with_filter(
            Request::get(self.inner.urls.studies.clone()),
            "patient",
            patient_id,
        );
        self.submit_read(ResourceKind::Study, request, receiver)
    }

    fn list_images(&self, worklist_id: &str, study_id: &str, receiver: TableReceiver) -> TaskId {
        let request = Request::get(self.inner.urls.images.clone());
        let request = with_filter(request, "study", study_id);
        let request = with_filter(request, "worklist", worklist_id);
        self.submit_read(ResourceKind::Image, request, receiver)
    }

    fn image_thumbnail(
        &self,
        image_id: &str,
        receiver: FileReceiver,
        observer: ProgressObserver,
    ) -> TaskId {
        debug!(image = image_id, "thumbnails are not served; reporting an empty result");
        receiver(None);
        observer(100);
        TaskId::NONE
    }

    fn image_file(
        &self,
        image_id: &str,
        receiver: FileReceiver,
        observer: ProgressObserver,
    ) -> TaskId {
        let path = record_path(&self.inner.urls.images, image_id);
        let inner = Arc::clone(&self.inner);

        let job = async move {
            match inner.fetch_image_file(&path, observer.as_ref()).await {
                Ok(written) => Some(written),
                Err(e) => {
                    warn!(image = %path, error = %e, "image download failed");
                    None
                }
            }
        };
        self.inner.connection.submit_job(job, receiver)
    }

    fn headers(&self, kind: ResourceKind, selection: FieldSelection) -> Vec<String> {
        self.inner.read_schemas().get(kind).column_names(selection)
    }

    fn cancel_task(&self, id: TaskId) -> bool {
        self.inner.connection.cancel(id)
    }
}

impl Inner {
    fn schema(&self, kind: ResourceKind) -> DataTable {
        self.read_schemas().get(kind).schema()
    }

    async fn read_into(
        &self,
        kind: ResourceKind,
        request: Request,
        table: &mut DataTable,
    ) -> Result<(), gcworklist_api::Error> {
        let response = self.connection.send(request).await?;
        match kind {
            ResourceKind::Image => {
                response_to_filtered_table(&self.connection, &response, table, &IMAGE_FIELDS).await
            }
            _ => response_to_table(&self.connection, &response, table).await,
        }
    }

    async fn fetch_image_file(
        &self,
        path: &str,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<PathBuf, CoreError> {
        let response = self.connection.send(Request::get(path)).await?;
        response.require_success()?;
        let record: ImageRecord = response.json()?;
        let file = record.files.first().ok_or_else(|| CoreError::NotFound {
            entity_type: "file for image".into(),
            identifier: path.to_owned(),
        })?;

        let download = self.connection.send_raw(Request::get(file.file.clone())).await?;
        Ok(download_to_file(download, &self.download_dir, &record.name, progress).await?)
    }

    // ── Schema discovery ─────────────────────────────────────────────

    async fn refresh_schemas(&self) {
        let generation = self.read_schemas().generation;
        let mut stored = match self.refresh.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("schema refresh already running; waiting for it");
                let guard = self.refresh.lock().await;
                if guard.is_some_and(|done| done >= generation) {
                    return;
                }
                guard
            }
        };

        let (patient, study, worklist) = tokio::join!(
            self.sample_schema(&self.urls.patients),
            self.sample_schema(&self.urls.studies),
            self.options_schema(&self.urls.worklists),
        );

        let mut schemas = self.write_schemas();
        if schemas.generation != generation {
            debug!("credentials changed during schema refresh; discarding results");
            return;
        }
        apply(ResourceKind::Patient, &mut schemas.patient, patient, true);
        apply(ResourceKind::Study, &mut schemas.study, study, true);
        apply(ResourceKind::Worklist, &mut schemas.worklist, worklist, false);
        schemas.image = image_schema();
        *stored = Some(generation);
    }

    fn next_generation(&self) {
        let mut schemas = self.write_schemas();
        schemas.generation += 1;
        debug!(generation = schemas.generation, "schema generation advanced");
    }

    /// Columns of the first record of a listing.
    async fn sample_schema(&self, path: &str) -> Result<DataTable, gcworklist_api::Error> {
        let response = self
            .connection
            .send(Request::get(path).query("limit", "1"))
            .await?;
        let mut table = DataTable::new();
        response_to_table_schema(&response, &mut table)?;
        Ok(table)
    }

    /// Writable fields advertised by OPTIONS.
    async fn options_schema(&self, path: &str) -> Result<DataTable, gcworklist_api::Error> {
        let response = self.connection.send(Request::options(path)).await?;
        let mut table = DataTable::new();
        options_response_to_table_schema(&response, &mut table)?;
        Ok(table)
    }

    fn read_schemas(&self) -> RwLockReadGuard<'_, Schemas> {
        self.schemas.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_schemas(&self) -> RwLockWriteGuard<'_, Schemas> {
        self.schemas.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Replace `slot` with a freshly discovered schema. Failures and empty
/// results keep whatever was known before.
fn apply(
    kind: ResourceKind,
    slot: &mut DataTable,
    discovered: Result<DataTable, gcworklist_api::Error>,
    name_only: bool,
) {
    match discovered {
        Ok(mut schema) if schema.column_count() > 0 => {
            if name_only {
                schema.show_only(&[DISPLAY_COLUMN]);
            }
            debug!(%kind, columns = schema.column_count(), "schema learned");
            *slot = schema;
        }
        Ok(_) => debug!(%kind, "no sample record; schema unchanged"),
        Err(e) => warn!(%kind, error = %e, "schema discovery failed"),
    }
}

fn image_schema() -> DataTable {
    DataTable::with_columns(IMAGE_FIELDS)
}

fn record_path(collection: &str, id: &str) -> String {
    format!("{}/{id}/", collection.trim_end_matches('/'))
}

fn with_filter(request: Request, key: &str, value: &str) -> Request {
    if value.is_empty() {
        request
    } else {
        request.query(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_paths_have_one_separator() {
        assert_eq!(record_path("api/v1/worklists/", "w1"), "api/v1/worklists/w1/");
        assert_eq!(record_path("api/v1/worklists", "w1"), "api/v1/worklists/w1/");
    }

    #[test]
    fn empty_filters_are_omitted() {
        let req = with_filter(Request::get("api/v1/cases/images/"), "study", "");
        assert!(req.query.is_empty());
        let req = with_filter(req, "worklist", "w1");
        assert_eq!(req.query, vec![("worklist".to_owned(), "w1".to_owned())]);
    }

    #[test]
    fn failed_discovery_keeps_the_previous_schema() {
        let mut slot = DataTable::with_columns(["pk", "name"]);
        apply(
            ResourceKind::Patient,
            &mut slot,
            Err(gcworklist_api::Error::NoRuntime),
            true,
        );
        assert_eq!(slot.column_names(FieldSelection::All), vec!["pk", "name"]);

        apply(ResourceKind::Patient, &mut slot, Ok(DataTable::new()), true);
        assert_eq!(slot.column_count(), 2);
    }

    #[test]
    fn patient_and_study_schemas_show_only_the_name() {
        let mut slot = DataTable::new();
        let learned = DataTable::with_columns(["pk", "name", "sex"]);
        apply(ResourceKind::Study, &mut slot, Ok(learned), true);
        assert_eq!(slot.column_names(FieldSelection::Visible), vec!["name"]);
        assert_eq!(
            slot.column_names(FieldSelection::Invisible),
            vec!["pk", "sex"]
        );
    }
}
