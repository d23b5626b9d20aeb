//! Thin `reqwest` binding to the §6 HTTP API for the CLI's own subcommands
//! (`schedule`, `get`, `delete`, `package ...`). Distinct from
//! `mrtaskman_worker::transport::SchedulerClient`, which only covers the
//! worker's half of the contract (`Assign` + result upload).

use mrtaskman_protocol::http::{PackageCreateManifest, ScheduleRequest, ScheduleResponse};
use mrtaskman_protocol::{Package, TaskId};

use crate::error::{CliError, Result};

pub struct CliClient {
    http: reqwest::Client,
    base_url: String,
}

impl CliClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(CliError::Http { status, body })
    }

    pub async fn schedule(&self, request: &ScheduleRequest) -> Result<ScheduleResponse> {
        let response = self
            .http
            .post(format!("{}/tasks/schedule", self.base_url))
            .json(request)
            .send()
            .await?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    pub async fn get_task(&self, id: TaskId) -> Result<serde_json::Value> {
        let response = self.http.get(format!("{}/tasks/{id}", self.base_url)).send().await?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    pub async fn delete_task(&self, id: TaskId) -> Result<()> {
        let response = self.http.delete(format!("{}/tasks/{id}", self.base_url)).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    pub async fn get_package(&self, name: &str, version: i64) -> Result<Package> {
        let response = self
            .http
            .get(format!("{}/packages/{name}.{version}", self.base_url))
            .send()
            .await?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    pub async fn delete_package(&self, name: &str, version: i64) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/packages/{name}.{version}", self.base_url))
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// `POST /packages/create`: the manifest plus one file part per
    /// `manifest.files[*].form_name`, read from `file_paths` (same order).
    pub async fn create_package(
        &self,
        manifest: PackageCreateManifest,
        file_paths: &[(String, std::path::PathBuf)],
    ) -> Result<serde_json::Value> {
        let mut form = reqwest::multipart::Form::new().text("manifest", serde_json::to_string(&manifest)?);
        for (form_name, path) in file_paths {
            let bytes = tokio::fs::read(path).await.map_err(|source| CliError::FileOpen {
                path: path.clone(),
                source,
            })?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            form = form.part(form_name.clone(), reqwest::multipart::Part::bytes(bytes).file_name(file_name));
        }

        let response = self
            .http
            .post(format!("{}/packages/create", self.base_url))
            .multipart(form)
            .send()
            .await?;
        Ok(Self::check_status(response).await?.json().await?)
    }
}
