//! Instance API Handlers
//!
//! HTTP endpoints for pipeline instances and their engine containers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sift_core::domain::instance::{PipelineInstance, PipelineInstanceVersion};
use sift_core::dto::instance::{
    CreateInstance, InstanceStatus, PortSummary, StartedInstance, UpdateConfig,
};

use crate::api::AppState;
use crate::api::error::ApiResult;

/// GET /instance/{org_id}
/// Get the organization's instance, creating the default one if needed
pub async fn get_instance(
    State(orchestrator): State<AppState>,
    Path(org_id): Path<String>,
) -> ApiResult<Json<PipelineInstance>> {
    tracing::debug!("Getting instance for organization: {}", org_id);

    let instance = orchestrator.get_instance(&org_id).await?;
    Ok(Json(instance))
}

/// POST /instance/{org_id}
/// Create the organization's instance with an explicit config
pub async fn create_instance(
    State(orchestrator): State<AppState>,
    Path(org_id): Path<String>,
    Json(req): Json<CreateInstance>,
) -> ApiResult<(StatusCode, Json<PipelineInstance>)> {
    tracing::info!("Creating instance for organization: {}", org_id);

    let instance = orchestrator.create_instance(&org_id, req.config).await?;
    Ok((StatusCode::CREATED, Json(instance)))
}

/// POST /instance/{org_id}/default
pub async fn ensure_default_instance(
    State(orchestrator): State<AppState>,
    Path(org_id): Path<String>,
) -> ApiResult<Json<PipelineInstance>> {
    let instance = orchestrator.ensure_default_instance(&org_id).await?;
    Ok(Json(instance))
}

/// PUT /instance/{org_id}/config
/// Replace the config and record a new version
pub async fn update_config(
    State(orchestrator): State<AppState>,
    Path(org_id): Path<String>,
    Json(req): Json<UpdateConfig>,
) -> ApiResult<Json<PipelineInstanceVersion>> {
    tracing::info!(
        "Updating config of organization {} for {}",
        org_id,
        req.actor_id
    );

    let version = orchestrator
        .update_config(&org_id, req.config, &req.actor_id)
        .await?;
    Ok(Json(version))
}

/// GET /instance/{org_id}/versions
pub async fn list_versions(
    State(orchestrator): State<AppState>,
    Path(org_id): Path<String>,
) -> ApiResult<Json<Vec<PipelineInstanceVersion>>> {
    let versions = orchestrator.list_versions(&org_id).await?;
    Ok(Json(versions))
}

/// GET /instance/{org_id}/ports
pub async fn configured_ports(
    State(orchestrator): State<AppState>,
    Path(org_id): Path<String>,
) -> ApiResult<Json<PortSummary>> {
    let summary = orchestrator.configured_ports(&org_id).await?;
    Ok(Json(summary))
}

/// POST /instance/{org_id}/start
/// Start the engine, replacing a running one
pub async fn start_instance(
    State(orchestrator): State<AppState>,
    Path(org_id): Path<String>,
) -> ApiResult<Json<StartedInstance>> {
    tracing::info!("Starting engine for organization: {}", org_id);

    let container_id = orchestrator.start_instance(&org_id).await?;
    Ok(Json(StartedInstance { container_id }))
}

/// POST /instance/{org_id}/stop
pub async fn stop_instance(
    State(orchestrator): State<AppState>,
    Path(org_id): Path<String>,
) -> StatusCode {
    tracing::info!("Stopping engine for organization: {}", org_id);

    orchestrator.stop_instance(&org_id).await;
    StatusCode::NO_CONTENT
}

/// GET /instance/{org_id}/status
pub async fn instance_status(
    State(orchestrator): State<AppState>,
    Path(org_id): Path<String>,
) -> Json<InstanceStatus> {
    let running = orchestrator.is_running(&org_id).await;
    Json(InstanceStatus { running })
}

#[cfg(test)]
mod tests {
    use crate::api::create_router;
    use crate::service::orchestrator::tests::{Fixture, fixture};
    use crate::template;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app() -> (Router, Fixture) {
        let fixture = fixture();
        (create_router(fixture.orchestrator.clone()), fixture)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, payload)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_instance_creates_default() {
        let (app, _) = app();

        let (status, body) = send(&app, Method::GET, "/instance/org-42", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["org_id"], "org-42");
        assert_eq!(body["config"], template::bundled());

        let (_, versions) = send(&app, Method::GET, "/instance/org-42/versions", None).await;
        assert_eq!(versions.as_array().map(Vec::len), Some(1));
        assert_eq!(versions[0]["version_number"], 1);
    }

    #[tokio::test]
    async fn test_unknown_organization_is_not_found() {
        let (app, _) = app();

        let (status, body) = send(&app, Method::GET, "/instance/org-missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("org-missing"));

        let (status, _) = send(&app, Method::POST, "/instance/org-missing/default", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_instance_conflicts() {
        let (app, _) = app();
        let body = json!({ "config": { "sources": {}, "sinks": {} } });

        let (status, created) =
            send(&app, Method::POST, "/instance/org-7", Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["config"], json!({ "sources": {}, "sinks": {} }));

        let (status, _) = send(&app, Method::POST, "/instance/org-7", Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_create_instance_rejects_invalid_config() {
        let (app, _) = app();

        let (status, _) = send(
            &app,
            Method::POST,
            "/instance/org-7",
            Some(json!({ "config": ["not", "a", "pipeline"] })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_config_records_version() {
        let (app, _) = app();
        send(&app, Method::GET, "/instance/org-7", None).await;

        let (status, version) = send(
            &app,
            Method::PUT,
            "/instance/org-7/config",
            Some(json!({
                "config": { "sources": { "in": { "type": "socket", "address": "0.0.0.0:9100" } } },
                "actor_id": "member-1"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(version["version_number"], 2);

        let (_, ports) = send(&app, Method::GET, "/instance/org-7/ports", None).await;
        assert_eq!(ports["api"]["port"], "8686");
        assert_eq!(ports["configured"][0]["port"], "9100");
        assert_eq!(ports["configured"][0]["protocol"], "tcp");
    }

    #[tokio::test]
    async fn test_start_status_stop() {
        let (app, fixture) = app();

        let (status, started) = send(&app, Method::POST, "/instance/org-7/start", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(started["container_id"].is_string());

        let (_, body) = send(&app, Method::GET, "/instance/org-7/status", None).await;
        assert_eq!(body, json!({ "running": true }));

        let (status, _) = send(&app, Method::POST, "/instance/org-7/stop", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = send(&app, Method::GET, "/instance/org-7/status", None).await;
        assert_eq!(body, json!({ "running": false }));
        assert_eq!(fixture.runtime.container_count(), 0);
    }

    #[tokio::test]
    async fn test_start_timeout_is_gateway_timeout() {
        let (app, fixture) = app();
        fixture.runtime.set_probe_output("");

        let (status, body) = send(&app, Method::POST, "/instance/org-7/start", None).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert!(body["error"].as_str().unwrap().contains("vector-org-7"));
        assert_eq!(fixture.runtime.container_count(), 0);
    }
}
