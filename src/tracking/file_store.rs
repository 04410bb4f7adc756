// src/tracking/file_store.rs
use crate::error::{BridgeError, Result};
use crate::models::MetricPoint;
use crate::tracking::store::{RunStatus, TrackingStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const META_FILE: &str = "meta.yaml";
const DEFAULT_EXPERIMENT_ID: &str = "0";
const SOURCE_TYPE_LOCAL: u8 = 4;

/// 实验目录下的 meta.yaml
#[derive(Debug, Serialize, Deserialize)]
struct ExperimentMeta {
    artifact_location: String,
    #[serde(default)]
    creation_time: Option<i64>,
    experiment_id: String,
    #[serde(default)]
    last_update_time: Option<i64>,
    lifecycle_stage: String,
    name: String,
}

/// 运行目录下的 meta.yaml
#[derive(Debug, Serialize, Deserialize)]
struct RunMeta {
    artifact_uri: String,
    end_time: Option<i64>,
    entry_point_name: String,
    experiment_id: String,
    lifecycle_stage: String,
    run_id: String,
    run_name: String,
    run_uuid: String,
    source_name: String,
    source_type: u8,
    source_version: String,
    start_time: i64,
    status: u8,
    tags: Vec<String>,
    user_id: String,
}

/// 以 MLflow 本地目录格式（mlruns/）写入的跟踪存储，可直接用 `mlflow ui` 浏览
pub struct FileStore {
    root: PathBuf,
    user: String,
    run_dirs: HashMap<String, PathBuf>, // 本进程创建的运行ID → 运行目录
}

impl FileStore {
    /// 打开（必要时初始化）存储根目录
    pub fn new(root: impl AsRef<Path>, user: Option<&str>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| BridgeError::io(root, e))?;
        let root = std::path::absolute(root).map_err(|e| BridgeError::io(root, e))?;

        let trash = root.join(".trash");
        fs::create_dir_all(&trash).map_err(|e| BridgeError::io(&trash, e))?;

        let user = user
            .map(|u| u.to_string())
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "unknown".to_string());

        let store = Self {
            root,
            user,
            run_dirs: HashMap::new(),
        };
        if !store.root.join(DEFAULT_EXPERIMENT_ID).join(META_FILE).exists() {
            store.write_experiment(DEFAULT_EXPERIMENT_ID, "Default")?;
        }
        Ok(store)
    }

    fn write_experiment(&self, experiment_id: &str, name: &str) -> Result<()> {
        let dir = self.root.join(experiment_id);
        fs::create_dir_all(&dir).map_err(|e| BridgeError::io(&dir, e))?;
        let now = chrono::Utc::now().timestamp_millis();
        let meta = ExperimentMeta {
            artifact_location: file_uri(&dir),
            creation_time: Some(now),
            experiment_id: experiment_id.to_string(),
            last_update_time: Some(now),
            lifecycle_stage: "active".to_string(),
            name: name.to_string(),
        };
        write_yaml(&dir.join(META_FILE), &meta)
    }

    /// 列出根目录下所有带 meta.yaml 的实验
    fn list_experiments(&self) -> Result<Vec<ExperimentMeta>> {
        let entries = fs::read_dir(&self.root).map_err(|e| BridgeError::io(&self.root, e))?;
        let mut experiments = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BridgeError::io(&self.root, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            let meta_path = entry.path().join(META_FILE);
            if meta_path.is_file() {
                experiments.push(read_yaml::<ExperimentMeta>(&meta_path)?);
            }
        }
        Ok(experiments)
    }

    fn run_dir(&self, run_id: &str) -> Result<PathBuf> {
        if let Some(dir) = self.run_dirs.get(run_id) {
            return Ok(dir.clone());
        }
        for experiment in self.list_experiments()? {
            let candidate = self.root.join(&experiment.experiment_id).join(run_id);
            if candidate.join(META_FILE).is_file() {
                return Ok(candidate);
            }
        }
        Err(BridgeError::Tracking(format!("Run '{}' not found under {}", run_id, self.root.display())))
    }

    fn write_tag(&self, run_dir: &Path, key: &str, value: &str) -> Result<()> {
        let path = keyed_path(&run_dir.join("tags"), key)?;
        write_file(&path, value.as_bytes())
    }
}

impl TrackingStore for FileStore {
    fn get_or_create_experiment(&mut self, name: &str) -> Result<String> {
        let experiments = self.list_experiments()?;
        if let Some(existing) = experiments.iter().find(|e| e.name == name) {
            if existing.lifecycle_stage != "active" {
                return Err(BridgeError::Tracking(format!(
                    "Cannot use deleted experiment '{}' (id {})",
                    name, existing.experiment_id
                )));
            }
            debug!("Reusing experiment '{}' (id {})", name, existing.experiment_id);
            return Ok(existing.experiment_id.clone());
        }

        let next_id = experiments
            .iter()
            .filter_map(|e| e.experiment_id.parse::<u64>().ok())
            .max()
            .map_or(0, |max| max + 1);
        let experiment_id = next_id.to_string();
        self.write_experiment(&experiment_id, name)?;
        info!("Created experiment '{}' with id {}", name, experiment_id);
        Ok(experiment_id)
    }

    fn create_run(&mut self, experiment_id: &str, run_name: Option<&str>) -> Result<String> {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let run_dir = self.root.join(experiment_id).join(&run_id);
        for sub in ["artifacts", "metrics", "params", "tags"] {
            let dir = run_dir.join(sub);
            fs::create_dir_all(&dir).map_err(|e| BridgeError::io(&dir, e))?;
        }

        let meta = RunMeta {
            artifact_uri: file_uri(&run_dir.join("artifacts")),
            end_time: None,
            entry_point_name: String::new(),
            experiment_id: experiment_id.to_string(),
            lifecycle_stage: "active".to_string(),
            run_id: run_id.clone(),
            run_name: run_name.unwrap_or_default().to_string(),
            run_uuid: run_id.clone(),
            source_name: String::new(),
            source_type: SOURCE_TYPE_LOCAL,
            source_version: String::new(),
            start_time: chrono::Utc::now().timestamp_millis(),
            status: RunStatus::Running.as_code(),
            tags: Vec::new(),
            user_id: self.user.clone(),
        };
        write_yaml(&run_dir.join(META_FILE), &meta)?;

        if let Some(name) = run_name {
            self.write_tag(&run_dir, "mlflow.runName", name)?;
        }
        self.write_tag(&run_dir, "mlflow.user", &self.user)?;
        self.write_tag(&run_dir, "mlflow.source.type", "LOCAL")?;
        self.write_tag(&run_dir, "mlflow.source.name", env!("CARGO_PKG_NAME"))?;

        self.run_dirs.insert(run_id.clone(), run_dir);
        Ok(run_id)
    }

    fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()> {
        let path = keyed_path(&self.run_dir(run_id)?.join("params"), key)?;
        if path.is_file() {
            let existing = fs::read_to_string(&path).map_err(|e| BridgeError::io(&path, e))?;
            if existing != value {
                return Err(BridgeError::Tracking(format!(
                    "Changing param values is not allowed. Param '{}' was '{}', new value '{}'",
                    key, existing, value
                )));
            }
            return Ok(());
        }
        write_file(&path, value.as_bytes())
    }

    fn log_metric(&mut self, run_id: &str, point: &MetricPoint, timestamp_ms: i64) -> Result<()> {
        let path = keyed_path(&self.run_dir(run_id)?.join("metrics"), &point.key)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| BridgeError::io(&path, e))?;
        writeln!(file, "{} {} {}", timestamp_ms, point.value, point.step).map_err(|e| BridgeError::io(&path, e))
    }

    fn log_artifact(&mut self, run_id: &str, local_file: &Path, artifact_dir: Option<&str>) -> Result<()> {
        let artifacts = self.run_dir(run_id)?.join("artifacts");
        let dest_dir = match artifact_dir {
            Some(dir) if !dir.is_empty() => keyed_path(&artifacts, dir)?,
            _ => artifacts,
        };
        fs::create_dir_all(&dest_dir).map_err(|e| BridgeError::io(&dest_dir, e))?;

        let file_name = local_file
            .file_name()
            .ok_or_else(|| BridgeError::Tracking(format!("Artifact has no file name: {}", local_file.display())))?;
        let dest = dest_dir.join(file_name);
        fs::copy(local_file, &dest).map_err(|e| BridgeError::io(local_file, e))?;
        Ok(())
    }

    fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<()> {
        let meta_path = self.run_dir(run_id)?.join(META_FILE);
        let mut meta: RunMeta = read_yaml(&meta_path)?;
        meta.status = status.as_code();
        meta.end_time = Some(chrono::Utc::now().timestamp_millis());
        write_yaml(&meta_path, &meta)
    }
}

/// 检查参数/指标/产物名称，禁止绝对路径与 ".." 之类的目录穿越
pub fn validate_key(key: &str) -> Result<()> {
    let valid_chars = key
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ' ' | '/' | ':'));
    let bad_component = key.split('/').any(|part| part == "..");
    if key.is_empty() || key.starts_with('/') || !valid_chars || bad_component {
        return Err(BridgeError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// 键可以包含 "/"，对应子目录
fn keyed_path(dir: &Path, key: &str) -> Result<PathBuf> {
    validate_key(key)?;
    let path = dir.join(key);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BridgeError::io(parent, e))?;
    }
    Ok(path)
}

fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).map_err(|e| BridgeError::io(path, e))
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_yaml::to_string(value).map_err(|e| BridgeError::Yaml {
        path: path.to_path_buf(),
        source: e,
    })?;
    write_file(path, text.as_bytes())
}

fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| BridgeError::io(path, e))?;
    serde_yaml::from_str(&text).map_err(|e| BridgeError::Yaml {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn run_meta(store: &FileStore, run_id: &str) -> RunMeta {
        read_yaml(&store.run_dir(run_id).unwrap().join(META_FILE)).unwrap()
    }

    #[test]
    fn test_new_store_creates_default_experiment() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().join("mlruns");
        let store = FileStore::new(&root, Some("tester")).unwrap();

        assert!(root.join(".trash").is_dir());
        let meta: ExperimentMeta = read_yaml(&root.join("0").join(META_FILE)).unwrap();
        assert_eq!(meta.name, "Default");
        assert_eq!(meta.experiment_id, "0");
        assert_eq!(meta.lifecycle_stage, "active");
        assert!(meta.artifact_location.starts_with("file://"));
        assert!(store.root.is_absolute());
    }

    #[test]
    fn test_experiment_is_reused_by_name() {
        let temp_dir = tempdir().unwrap();
        let mut store = FileStore::new(temp_dir.path(), Some("tester")).unwrap();

        let first = store.get_or_create_experiment("plates").unwrap();
        let second = store.get_or_create_experiment("plates").unwrap();
        let other = store.get_or_create_experiment("faces").unwrap();

        assert_eq!(first, "1");
        assert_eq!(second, "1");
        assert_eq!(other, "2");
    }

    #[test]
    fn test_deleted_experiment_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let mut store = FileStore::new(temp_dir.path(), None).unwrap();
        let id = store.get_or_create_experiment("old").unwrap();

        let meta_path = temp_dir.path().join(&id).join(META_FILE);
        let text = fs::read_to_string(&meta_path).unwrap().replace("lifecycle_stage: active", "lifecycle_stage: deleted");
        fs::write(&meta_path, text).unwrap();

        let err = store.get_or_create_experiment("old").unwrap_err();
        assert!(err.to_string().contains("deleted experiment"));
    }

    #[test]
    fn test_run_layout_and_logging() {
        let temp_dir = tempdir().unwrap();
        let mut store = FileStore::new(temp_dir.path(), Some("tester")).unwrap();
        let exp = store.get_or_create_experiment("plates").unwrap();
        let run_id = store.create_run(&exp, Some("exp3")).unwrap();
        assert_eq!(run_id.len(), 32);

        let run_dir = temp_dir.path().join(&exp).join(&run_id);
        assert_eq!(fs::read_to_string(run_dir.join("tags/mlflow.runName")).unwrap(), "exp3");
        assert_eq!(fs::read_to_string(run_dir.join("tags/mlflow.user")).unwrap(), "tester");

        let meta = run_meta(&store, &run_id);
        assert_eq!(meta.status, 1);
        assert_eq!(meta.run_uuid, run_id);
        assert_eq!(meta.end_time, None);

        store.log_param(&run_id, "lr0", "0.01").unwrap();
        assert_eq!(fs::read_to_string(run_dir.join("params/lr0")).unwrap(), "0.01");

        store.log_metric(&run_id, &MetricPoint::new("GIoU/box", 0.45, 3), 1000).unwrap();
        store.log_metric(&run_id, &MetricPoint::new("GIoU/box", 0.4, 4), 2000).unwrap();
        assert_eq!(
            fs::read_to_string(run_dir.join("metrics/GIoU/box")).unwrap(),
            "1000 0.45 3\n2000 0.4 4\n"
        );

        let source = temp_dir.path().join("hyp.yaml");
        fs::write(&source, "lr0: 0.01\n").unwrap();
        store.log_artifact(&run_id, &source, None).unwrap();
        store.log_artifact(&run_id, &source, Some("weights/sub")).unwrap();
        assert!(run_dir.join("artifacts/hyp.yaml").is_file());
        assert!(run_dir.join("artifacts/weights/sub/hyp.yaml").is_file());

        store.end_run(&run_id, RunStatus::Finished).unwrap();
        let meta = run_meta(&store, &run_id);
        assert_eq!(meta.status, 3);
        assert!(meta.end_time.is_some());
    }

    #[test]
    fn test_param_cannot_change_value() {
        let temp_dir = tempdir().unwrap();
        let mut store = FileStore::new(temp_dir.path(), None).unwrap();
        let exp = store.get_or_create_experiment("plates").unwrap();
        let run_id = store.create_run(&exp, None).unwrap();

        store.log_param(&run_id, "epochs", "300").unwrap();
        // 相同的值可以重复写入
        store.log_param(&run_id, "epochs", "300").unwrap();
        assert!(store.log_param(&run_id, "epochs", "100").is_err());
    }

    #[test]
    fn test_run_found_by_scanning_after_reopen() {
        let temp_dir = tempdir().unwrap();
        let run_id = {
            let mut store = FileStore::new(temp_dir.path(), None).unwrap();
            let exp = store.get_or_create_experiment("plates").unwrap();
            store.create_run(&exp, None).unwrap()
        };

        let mut reopened = FileStore::new(temp_dir.path(), None).unwrap();
        reopened.end_run(&run_id, RunStatus::Failed).unwrap();
        assert_eq!(run_meta(&reopened, &run_id).status, 4);
        assert!(reopened.end_run("missing", RunStatus::Failed).is_err());
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("lr0").is_ok());
        assert!(validate_key("mAP-50-95").is_ok());
        assert!(validate_key("GIoU/box").is_ok());
        assert!(validate_key("metrics/mAP_0.5:0.95").is_ok());

        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("../escape").is_err());
        assert!(validate_key("a/../../b").is_err());
        assert!(validate_key("bad\nkey").is_err());
    }
}
