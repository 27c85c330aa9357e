//! HTTP client for the control-plane API.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use orca_api::{AgentPod, AgentPool, DevTask, LogEntry, Project, Resource};

use crate::error::{CliError, CliResult};

/// Typed client over the CRUD facade.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: String,
}

#[derive(Debug, Serialize)]
struct ScaleRequest {
    replicas: u32,
}

impl ApiClient {
    pub fn new(server: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: server.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(&self, response: reqwest::Response) -> CliResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let message = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => envelope.error,
            Err(_) => format!("server returned {status}"),
        };
        Err(CliError::api(status.as_u16(), message))
    }

    async fn expect_no_content(&self, response: reqwest::Response) -> CliResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => envelope.error,
            Err(_) => format!("server returned {status}"),
        };
        Err(CliError::api(status.as_u16(), message))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> CliResult<T> {
        let response = self.http.get(self.url(path)).send().await?;
        self.decode(response).await
    }

    async fn delete(&self, path: &str) -> CliResult<()> {
        let response = self.http.delete(self.url(path)).send().await?;
        self.expect_no_content(response).await
    }

    // ------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------

    pub async fn healthz(&self) -> CliResult<()> {
        let response = self.http.get(self.url("/healthz")).send().await?;
        self.expect_no_content(response).await
    }

    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------

    pub async fn list_projects(&self) -> CliResult<Vec<Project>> {
        self.get_json("/api/v1alpha1/projects").await
    }

    pub async fn get_project(&self, name: &str) -> CliResult<Project> {
        self.get_json(&format!("/api/v1alpha1/projects/{name}")).await
    }

    pub async fn delete_project(&self, name: &str) -> CliResult<()> {
        self.delete(&format!("/api/v1alpha1/projects/{name}")).await
    }

    // ------------------------------------------------------------------
    // AgentPods
    // ------------------------------------------------------------------

    pub async fn list_pods(&self, project: Option<&str>) -> CliResult<Vec<AgentPod>> {
        let path = match project {
            Some(project) => format!("/api/v1alpha1/agentpods?project={project}"),
            None => "/api/v1alpha1/agentpods".to_string(),
        };
        self.get_json(&path).await
    }

    pub async fn get_pod(&self, name: &str, project: &str) -> CliResult<AgentPod> {
        self.get_json(&format!("/api/v1alpha1/agentpods/{name}?project={project}"))
            .await
    }

    pub async fn delete_pod(&self, name: &str, project: &str) -> CliResult<()> {
        self.delete(&format!("/api/v1alpha1/agentpods/{name}?project={project}"))
            .await
    }

    pub async fn get_logs(&self, pod: &str, project: &str) -> CliResult<Vec<LogEntry>> {
        self.get_json(&format!(
            "/api/v1alpha1/agentpods/{pod}/logs?project={project}"
        ))
        .await
    }

    // ------------------------------------------------------------------
    // AgentPools
    // ------------------------------------------------------------------

    pub async fn list_pools(&self, project: Option<&str>) -> CliResult<Vec<AgentPool>> {
        let path = match project {
            Some(project) => format!("/api/v1alpha1/agentpools?project={project}"),
            None => "/api/v1alpha1/agentpools".to_string(),
        };
        self.get_json(&path).await
    }

    pub async fn get_pool(&self, name: &str, project: &str) -> CliResult<AgentPool> {
        self.get_json(&format!("/api/v1alpha1/agentpools/{name}?project={project}"))
            .await
    }

    pub async fn delete_pool(&self, name: &str, project: &str) -> CliResult<()> {
        self.delete(&format!("/api/v1alpha1/agentpools/{name}?project={project}"))
            .await
    }

    pub async fn scale_pool(
        &self,
        name: &str,
        project: &str,
        replicas: u32,
    ) -> CliResult<AgentPool> {
        let response = self
            .http
            .put(self.url(&format!(
                "/api/v1alpha1/agentpools/{name}/scale?project={project}"
            )))
            .json(&ScaleRequest { replicas })
            .send()
            .await?;
        self.decode(response).await
    }

    // ------------------------------------------------------------------
    // DevTasks
    // ------------------------------------------------------------------

    pub async fn list_tasks(&self, project: Option<&str>) -> CliResult<Vec<DevTask>> {
        let path = match project {
            Some(project) => format!("/api/v1alpha1/devtasks?project={project}"),
            None => "/api/v1alpha1/devtasks".to_string(),
        };
        self.get_json(&path).await
    }

    pub async fn get_task(&self, name: &str, project: &str) -> CliResult<DevTask> {
        self.get_json(&format!("/api/v1alpha1/devtasks/{name}?project={project}"))
            .await
    }

    pub async fn delete_task(&self, name: &str, project: &str) -> CliResult<()> {
        self.delete(&format!("/api/v1alpha1/devtasks/{name}?project={project}"))
            .await
    }

    pub async fn create_task(&self, task: &DevTask) -> CliResult<DevTask> {
        let response = self
            .http
            .post(self.url(&format!(
                "/api/v1alpha1/devtasks?project={}",
                task.metadata.project
            )))
            .json(task)
            .send()
            .await?;
        self.decode(response).await
    }

    // ------------------------------------------------------------------
    // Apply
    // ------------------------------------------------------------------

    pub async fn apply(&self, resource: &Resource) -> CliResult<serde_json::Value> {
        let body = match resource {
            Resource::Project(r) => serde_json::to_value(r),
            Resource::AgentPod(r) => serde_json::to_value(r),
            Resource::AgentPool(r) => serde_json::to_value(r),
            Resource::DevTask(r) => serde_json::to_value(r),
        }
        .map_err(|err| CliError::InvalidInput(err.to_string()))?;

        let response = self
            .http
            .post(self.url("/api/v1alpha1/apply"))
            .json(&body)
            .send()
            .await?;
        self.decode(response).await
    }
}
