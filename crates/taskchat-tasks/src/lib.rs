// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task ownership provider backed by the task service's REST API.
//!
//! `GET {base_url}/api/tasks/{id}` answers with the task's owner and its
//! assigned worker. A 404 is [`ChatError::NotFound`]; anything else that is
//! not a readable 2xx is [`ChatError::UpstreamUnavailable`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use taskchat_config::model::TasksConfig;
use taskchat_core::{
    AdapterType, ChatError, HealthStatus, PluginAdapter, TaskAssignment, TaskId,
    TaskOwnershipProvider, UserId,
};

/// Task as returned by the task service. Only the fields chat needs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskResponse {
    id: Option<TaskId>,
    title: Option<String>,
    owner_id: UserId,
    owner_email: Option<String>,
    assigned_user_id: Option<UserId>,
    assigned_user_email: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpTaskProvider {
    client: reqwest::Client,
    base_url: String,
    service_token: Option<String>,
}

impl HttpTaskProvider {
    pub fn new(config: &TasksConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::Internal(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_token: config.service_token.clone(),
        })
    }

    fn task_url(&self, task_id: TaskId) -> String {
        format!("{}/api/tasks/{task_id}", self.base_url)
    }
}

#[async_trait]
impl PluginAdapter for HttpTaskProvider {
    fn name(&self) -> &str {
        "task-service"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Tasks
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatError> {
        match self.client.get(&self.base_url).send().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("task service unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), ChatError> {
        Ok(())
    }
}

#[async_trait]
impl TaskOwnershipProvider for HttpTaskProvider {
    async fn task_assignment(&self, task_id: TaskId) -> Result<TaskAssignment, ChatError> {
        let mut request = self
            .client
            .get(self.task_url(task_id))
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.service_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            warn!(task_id, error = %e, "task service request failed");
            ChatError::UpstreamUnavailable {
                message: "task service unavailable".into(),
                source: Some(Box::new(e)),
            }
        })?;

        let status = response.status();
        debug!(task_id, status = %status, "task service responded");
        if status == StatusCode::NOT_FOUND {
            return Err(ChatError::NotFound(format!("task {task_id} not found")));
        }
        if !status.is_success() {
            warn!(task_id, status = %status, "task service returned an error");
            return Err(ChatError::upstream(format!(
                "task service returned {status}"
            )));
        }

        let task: TaskResponse = response.json().await.map_err(|e| {
            warn!(task_id, error = %e, "task service returned an unreadable body");
            ChatError::UpstreamUnavailable {
                message: "task service returned an invalid task".into(),
                source: Some(Box::new(e)),
            }
        })?;

        Ok(TaskAssignment {
            task_id: task.id.unwrap_or(task_id),
            title: task.title,
            owner_id: task.owner_id,
            owner_email: task.owner_email.unwrap_or_default(),
            assigned_user_id: task.assigned_user_id,
            assigned_user_email: task.assigned_user_email,
            status: task.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, service_token: Option<&str>) -> HttpTaskProvider {
        HttpTaskProvider::new(&TasksConfig {
            base_url: format!("{}/", server.uri()),
            service_token: service_token.map(str::to_string),
            timeout_secs: 2,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn maps_assigned_task() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tasks/42"))
            .and(header("authorization", "Bearer svc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 42,
                "title": "Fix the sink",
                "ownerId": 1,
                "ownerEmail": "owner@uni.edu",
                "assignedUserId": 2,
                "assignedUserEmail": "worker@uni.edu",
                "status": "IN_PROGRESS",
                "budget": 40.0
            })))
            .mount(&server)
            .await;

        let task = provider(&server, Some("svc"))
            .task_assignment(42)
            .await
            .unwrap();
        assert_eq!(task.owner_id, 1);
        assert_eq!(task.assigned_user_id, Some(2));
        assert_eq!(task.assigned_user_email.as_deref(), Some("worker@uni.edu"));
        assert_eq!(task.title.as_deref(), Some("Fix the sink"));
    }

    #[tokio::test]
    async fn unassigned_task_has_no_worker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tasks/5"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 5, "ownerId": 1})),
            )
            .mount(&server)
            .await;

        let task = provider(&server, None).task_assignment(5).await.unwrap();
        assert_eq!(task.assigned_user_id, None);
    }

    #[tokio::test]
    async fn missing_task_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tasks/404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = provider(&server, None).task_assignment(404).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn server_errors_and_bad_bodies_are_upstream_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tasks/1"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tasks/2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let p = provider(&server, None);
        assert_eq!(
            p.task_assignment(1).await.unwrap_err().code(),
            "UPSTREAM_UNAVAILABLE"
        );
        assert_eq!(
            p.task_assignment(2).await.unwrap_err().code(),
            "UPSTREAM_UNAVAILABLE"
        );
    }

    #[tokio::test]
    async fn unreachable_service_is_an_upstream_failure() {
        // Bind then release a port so nothing is listening on it.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let p = HttpTaskProvider::new(&TasksConfig {
            base_url: format!("http://{addr}/"),
            service_token: None,
            timeout_secs: 2,
        })
        .unwrap();
        assert_eq!(
            p.task_assignment(1).await.unwrap_err().code(),
            "UPSTREAM_UNAVAILABLE"
        );
    }
}
