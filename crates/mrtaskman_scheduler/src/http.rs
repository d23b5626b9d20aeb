//! §6 HTTP API: JSON + multipart routes over [`Scheduler`].

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Router,
};
use mrtaskman_protocol::{
    http::{AssignRequest, ErrorBody, PackageCreateManifest, ScheduleRequest, ScheduleResponse, TaskAssignment},
    Package, PackageFile, TaskId, TaskResult,
};
use tracing::error;

use crate::db::UploadOutcome;
use crate::error::SchedulerError;
use crate::scheduler::Scheduler;

impl IntoResponse for SchedulerError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            SchedulerError::TaskNotFound(_) => (StatusCode::NOT_FOUND, "task_not_found"),
            SchedulerError::TimedOut { .. } => (StatusCode::CONFLICT, "timed_out"),
            SchedulerError::Package(mrtaskman_protocol::PackageError::NotFound(..)) => {
                (StatusCode::NOT_FOUND, "package_not_found")
            }
            SchedulerError::Package(mrtaskman_protocol::PackageError::AlreadyExists(..)) => {
                (StatusCode::BAD_REQUEST, "package_already_exists")
            }
            SchedulerError::Package(_) => (StatusCode::BAD_REQUEST, "invalid_package"),
            SchedulerError::CorruptRow { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "corrupt_row"),
            SchedulerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            SchedulerError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(%self, "internal scheduler error");
        }
        (status, Json(ErrorBody::new(error, self.to_string()))).into_response()
    }
}

pub fn router(scheduler: Arc<Scheduler>) -> Router {
    Router::new()
        .route("/tasks/schedule", post(schedule_task))
        .route("/tasks/:id", get(get_task).delete(delete_task))
        .route("/tasks/assign", put(assign_task))
        .route("/tasks/:id/complete", post(upload_result))
        .route("/packages/create", post(create_package))
        .route("/packages/:name_dot_version", get(get_package).delete(delete_package))
        .with_state(scheduler)
}

/// Splits a `{name}.{version}` path segment, e.g. `"xcodetools.4"`.
fn parse_package_path(raw: &str) -> Result<(String, i64), SchedulerError> {
    let (name, version) = raw
        .rsplit_once('.')
        .ok_or_else(|| SchedulerError::InvalidRequest(format!("malformed package path: {raw}")))?;
    let version: i64 = version
        .parse()
        .map_err(|_| SchedulerError::InvalidRequest(format!("malformed package version: {version}")))?;
    Ok((name.to_string(), version))
}

async fn schedule_task(
    State(scheduler): State<Arc<Scheduler>>,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<ScheduleResponse>, SchedulerError> {
    if request.executor_requirements.is_empty() {
        return Err(SchedulerError::InvalidRequest(
            "executor_requirements must be a non-empty list".to_string(),
        ));
    }
    let id = scheduler.schedule(request).await?;
    Ok(Json(ScheduleResponse::new(id)))
}

async fn get_task(
    State(scheduler): State<Arc<Scheduler>>,
    Path(id): Path<TaskId>,
) -> Result<Json<mrtaskman_protocol::Task>, SchedulerError> {
    scheduler
        .get_task(id)
        .await?
        .map(Json)
        .ok_or(SchedulerError::TaskNotFound(id.as_i64()))
}

async fn delete_task(
    State(scheduler): State<Arc<Scheduler>>,
    Path(id): Path<TaskId>,
) -> Result<StatusCode, SchedulerError> {
    if scheduler.delete_task(id).await? {
        Ok(StatusCode::OK)
    } else {
        Err(SchedulerError::TaskNotFound(id.as_i64()))
    }
}

async fn assign_task(
    State(scheduler): State<Arc<Scheduler>>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<TaskAssignment>, SchedulerError> {
    let task = scheduler
        .assign(&request.worker, &request.capabilities.executor)
        .await?;
    Ok(Json(TaskAssignment::new(task)))
}

/// Multipart body: field `task_result` (JSON), file fields `STDOUT`/`STDERR`.
/// The blob store itself is out of scope (§9); bytes are discarded after their
/// size is recorded as the `*_ref`.
async fn upload_result(
    State(scheduler): State<Arc<Scheduler>>,
    Path(id): Path<TaskId>,
    mut multipart: Multipart,
) -> Result<StatusCode, SchedulerError> {
    let mut task_result: Option<TaskResult> = None;
    let mut stdout_ref = None;
    let mut stderr_ref = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| SchedulerError::InvalidRequest(err.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "task_result" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| SchedulerError::InvalidRequest(err.to_string()))?;
                task_result = Some(
                    serde_json::from_slice(&bytes)
                        .map_err(|err| SchedulerError::InvalidRequest(err.to_string()))?,
                );
            }
            "STDOUT" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| SchedulerError::InvalidRequest(err.to_string()))?;
                stdout_ref = Some(format!("blob://stdout/{}/{}", id, bytes.len()));
            }
            "STDERR" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| SchedulerError::InvalidRequest(err.to_string()))?;
                stderr_ref = Some(format!("blob://stderr/{}/{}", id, bytes.len()));
            }
            _ => {}
        }
    }

    let mut result =
        task_result.ok_or_else(|| SchedulerError::InvalidRequest("missing task_result field".to_string()))?;
    result.stdout_ref = stdout_ref;
    result.stderr_ref = stderr_ref.clone();
    if result.stderr_url.is_empty() {
        result.stderr_url = stderr_ref.unwrap_or_default();
    }

    match scheduler.upload_result(id, result.attempt, result).await? {
        UploadOutcome::Recorded => Ok(StatusCode::OK),
        UploadOutcome::NotFound => Err(SchedulerError::TaskNotFound(id.as_i64())),
        UploadOutcome::TimedOut => Err(SchedulerError::TimedOut { task_id: id.as_i64() }),
    }
}

async fn create_package(
    State(scheduler): State<Arc<Scheduler>>,
    mut multipart: Multipart,
) -> Result<StatusCode, SchedulerError> {
    let mut manifest: Option<PackageCreateManifest> = None;
    let mut blobs: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| SchedulerError::InvalidRequest(err.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| SchedulerError::InvalidRequest(err.to_string()))?;
        if name == "manifest" {
            manifest = Some(
                serde_json::from_slice(&bytes)
                    .map_err(|err| SchedulerError::InvalidRequest(err.to_string()))?,
            );
        } else {
            blobs.insert(name, bytes.len());
        }
    }

    let manifest =
        manifest.ok_or_else(|| SchedulerError::InvalidRequest("missing manifest field".to_string()))?;

    let files = manifest
        .files
        .into_iter()
        .map(|entry| {
            let blob_ref = blobs
                .get(&entry.form_name)
                .map(|size| format!("blob://package/{}/{}/{}", manifest.name, entry.file_destination, size));
            PackageFile {
                destination_path: entry.file_destination,
                file_mode: entry.file_mode,
                download_url: entry.url,
                blob_ref,
            }
        })
        .collect();

    let package = Package {
        name: manifest.name,
        version: manifest.version,
        created_by: manifest.created_by,
        created_time: chrono::Utc::now(),
        modified_time: chrono::Utc::now(),
        files,
    };
    scheduler.create_package(package).await?;
    Ok(StatusCode::OK)
}

async fn get_package(
    State(scheduler): State<Arc<Scheduler>>,
    Path(raw): Path<String>,
) -> Result<Json<Package>, SchedulerError> {
    let (name, version) = parse_package_path(&raw)?;
    scheduler
        .get_package(&name, version)
        .await?
        .map(Json)
        .ok_or(SchedulerError::Package(mrtaskman_protocol::PackageError::NotFound(
            name, version,
        )))
}

async fn delete_package(
    State(scheduler): State<Arc<Scheduler>>,
    Path(raw): Path<String>,
) -> Result<StatusCode, SchedulerError> {
    let (name, version) = parse_package_path(&raw)?;
    if scheduler.delete_package(&name, version).await? {
        Ok(StatusCode::OK)
    } else {
        Err(SchedulerError::Package(mrtaskman_protocol::PackageError::NotFound(
            name, version,
        )))
    }
}
