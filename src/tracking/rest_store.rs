// src/tracking/rest_store.rs
use crate::error::{BridgeError, Result};
use crate::models::MetricPoint;
use crate::tracking::store::{RunStatus, TrackingStore};
use reqwest::blocking::{Client, Response};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

const API_PREFIX: &str = "api/2.0/mlflow";
const ARTIFACTS_PREFIX: &str = "api/2.0/mlflow-artifacts/artifacts";
const ARTIFACT_SCHEME: &str = "mlflow-artifacts:";

#[derive(Debug, Deserialize)]
struct Experiment {
    experiment_id: String,
    #[serde(default)]
    lifecycle_stage: String,
}

#[derive(Debug, Deserialize)]
struct GetExperimentResponse {
    experiment: Experiment,
}

#[derive(Debug, Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct RunInfo {
    run_id: String,
    artifact_uri: String,
}

#[derive(Debug, Deserialize)]
struct Run {
    info: RunInfo,
}

#[derive(Debug, Deserialize)]
struct CreateRunResponse {
    run: Run,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

/// 通过 MLflow REST API 写入远程跟踪服务器
pub struct RestStore {
    base_url: String,
    client: Client,
    user: Option<String>,
    artifact_uris: HashMap<String, String>, // 运行ID → artifact_uri
}

impl RestStore {
    pub fn new(base_url: &str, user: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            user: user.map(|u| u.to_string()).or_else(|| std::env::var("USER").ok()),
            artifact_uris: HashMap::new(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, method)
    }

    fn post(&self, method: &str, body: serde_json::Value) -> Result<Response> {
        debug!("POST {}", method);
        let response = self.client.post(self.endpoint(method)).json(&body).send()?;
        check_status(response)
    }

    fn artifact_uri(&self, run_id: &str) -> Result<String> {
        if let Some(uri) = self.artifact_uris.get(run_id) {
            return Ok(uri.clone());
        }
        #[derive(Deserialize)]
        struct GetRunResponse {
            run: Run,
        }
        let response = self
            .client
            .get(self.endpoint("runs/get"))
            .query(&[("run_id", run_id)])
            .send()?;
        let run: GetRunResponse = check_status(response)?.json()?;
        Ok(run.run.info.artifact_uri)
    }
}

/// 把非 2xx 的响应转成带有服务器错误码的错误
fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.json::<ErrorResponse>().unwrap_or_default();
    Err(BridgeError::Tracking(format!(
        "{} {}: {}",
        status, body.error_code, body.message
    )))
}

/// 根据 run 的 artifact_uri 得到上传地址
///
/// 只支持 `mlflow-artifacts:/<path>` 与 `mlflow-artifacts://<host>/<path>`，
/// 即服务器以 `--serve-artifacts` 方式代理产物存储的情况。
pub fn artifact_upload_url(base_url: &str, artifact_uri: &str, artifact_dir: Option<&str>, file_name: &str) -> Result<String> {
    let rest = artifact_uri
        .strip_prefix(ARTIFACT_SCHEME)
        .ok_or_else(|| BridgeError::UnsupportedTrackingUri(artifact_uri.to_string()))?;
    let path = match rest.strip_prefix("//") {
        // skip the authority part
        Some(with_host) => with_host.find('/').map_or("", |i| &with_host[i..]),
        None => rest,
    };

    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if let Some(dir) = artifact_dir {
        segments.extend(dir.split('/').filter(|s| !s.is_empty()));
    }
    segments.push(file_name);

    // 每一段单独做百分号编码，文件名里的 '#'、'?' 不会截断地址
    let mut url = Url::parse(base_url)
        .map_err(|e| BridgeError::Tracking(format!("Invalid tracking URL '{}': {}", base_url, e)))?;
    url.path_segments_mut()
        .map_err(|_| BridgeError::Tracking(format!("Tracking URL cannot have a path: {}", base_url)))?
        .pop_if_empty()
        .extend(ARTIFACTS_PREFIX.split('/'))
        .extend(segments);
    Ok(url.to_string())
}

impl TrackingStore for RestStore {
    fn get_or_create_experiment(&mut self, name: &str) -> Result<String> {
        let response = self
            .client
            .get(self.endpoint("experiments/get-by-name"))
            .query(&[("experiment_name", name)])
            .send()?;

        if response.status() == StatusCode::NOT_FOUND {
            let created: CreateExperimentResponse = self.post("experiments/create", json!({ "name": name }))?.json()?;
            info!("Created experiment '{}' with id {}", name, created.experiment_id);
            return Ok(created.experiment_id);
        }

        let found: GetExperimentResponse = check_status(response)?.json()?;
        if found.experiment.lifecycle_stage == "deleted" {
            return Err(BridgeError::Tracking(format!(
                "Cannot use deleted experiment '{}' (id {})",
                name, found.experiment.experiment_id
            )));
        }
        Ok(found.experiment.experiment_id)
    }

    fn create_run(&mut self, experiment_id: &str, run_name: Option<&str>) -> Result<String> {
        let mut tags = vec![
            json!({ "key": "mlflow.source.type", "value": "LOCAL" }),
            json!({ "key": "mlflow.source.name", "value": env!("CARGO_PKG_NAME") }),
        ];
        if let Some(user) = &self.user {
            tags.push(json!({ "key": "mlflow.user", "value": user }));
        }
        let mut body = json!({
            "experiment_id": experiment_id,
            "start_time": chrono::Utc::now().timestamp_millis(),
            "tags": tags,
        });
        if let Some(name) = run_name {
            body["run_name"] = json!(name);
        }

        let created: CreateRunResponse = self.post("runs/create", body)?.json()?;
        let info = created.run.info;
        self.artifact_uris.insert(info.run_id.clone(), info.artifact_uri);
        Ok(info.run_id)
    }

    fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()> {
        self.post(
            "runs/log-parameter",
            json!({ "run_id": run_id, "key": key, "value": value }),
        )?;
        Ok(())
    }

    fn log_metric(&mut self, run_id: &str, point: &MetricPoint, timestamp_ms: i64) -> Result<()> {
        self.post(
            "runs/log-metric",
            json!({
                "run_id": run_id,
                "key": point.key,
                "value": point.value,
                "timestamp": timestamp_ms,
                "step": point.step,
            }),
        )?;
        Ok(())
    }

    fn log_artifact(&mut self, run_id: &str, local_file: &Path, artifact_dir: Option<&str>) -> Result<()> {
        let artifact_uri = self.artifact_uri(run_id)?;
        let file_name = local_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| BridgeError::Tracking(format!("Artifact has no file name: {}", local_file.display())))?;
        let url = artifact_upload_url(&self.base_url, &artifact_uri, artifact_dir, &file_name)?;

        let bytes = std::fs::read(local_file).map_err(|e| BridgeError::io(local_file, e))?;
        debug!("PUT {} ({} bytes)", url, bytes.len());
        let response = self.client.put(url).body(bytes).send()?;
        check_status(response)?;
        Ok(())
    }

    fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<()> {
        self.post(
            "runs/update",
            json!({
                "run_id": run_id,
                "status": status.as_str(),
                "end_time": chrono::Utc::now().timestamp_millis(),
            }),
        )?;
        Ok(())
    }
}
