use crate::error::Result;
use crate::file_utils::collect_artifact_files;
use crate::models::MetricPoint;
use crate::tracking::store::{RunStatus, TrackingStore};
use std::path::Path;
use tracing::{debug, warn};

/// 一次打开的运行
///
/// 调用 [`ActiveRun::finish`] 后运行被标记为 FINISHED；
/// 如果在此之前被 drop（例如某一步返回了错误），运行会被标记为 FAILED。
pub struct ActiveRun<'s> {
    store: &'s mut dyn TrackingStore,
    experiment_id: String,
    run_id: String,
    ended: bool,
}

impl<'s> ActiveRun<'s> {
    /// 选择（必要时创建）实验并在其中开启一个新运行
    pub fn start(store: &'s mut dyn TrackingStore, experiment_name: &str, run_name: Option<&str>) -> Result<Self> {
        let experiment_id = store.get_or_create_experiment(experiment_name)?;
        let run_id = store.create_run(&experiment_id, run_name)?;
        debug!(%experiment_id, %run_id, "run created");
        Ok(Self {
            store,
            experiment_id,
            run_id,
            ended: false,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    pub fn log_param(&mut self, key: &str, value: &str) -> Result<()> {
        debug!(key, value, "log_param");
        self.store.log_param(&self.run_id, key, value)
    }

    pub fn log_metric(&mut self, point: &MetricPoint) -> Result<()> {
        debug!(key = %point.key, value = point.value, step = point.step, "log_metric");
        let timestamp = chrono::Utc::now().timestamp_millis();
        self.store.log_metric(&self.run_id, point, timestamp)
    }

    /// 上传文件或目录，返回上传的文件数量
    pub fn log_artifact(&mut self, path: &Path) -> Result<usize> {
        let files = collect_artifact_files(path)?;
        for (file, artifact_dir) in &files {
            debug!(file = %file.display(), dir = artifact_dir.as_deref().unwrap_or(""), "log_artifact");
            self.store.log_artifact(&self.run_id, file, artifact_dir.as_deref())?;
        }
        Ok(files.len())
    }

    /// 正常结束运行
    pub fn finish(mut self) -> Result<()> {
        self.ended = true;
        self.store.end_run(&self.run_id, RunStatus::Finished)
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        if let Err(e) = self.store.end_run(&self.run_id, RunStatus::Failed) {
            warn!("Failed to mark run {} as failed: {}", self.run_id, e);
        } else {
            warn!("Run {} ended with status FAILED", self.run_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::store::testing::{Call, RecordingStore};

    #[test]
    fn test_finish_marks_run_finished() {
        let mut store = RecordingStore::new();
        {
            let mut run = ActiveRun::start(&mut store, "exp", None).unwrap();
            assert_eq!(run.run_id(), "run-0");
            assert_eq!(run.experiment_id(), "1");
            run.log_param("lr0", "0.01").unwrap();
            run.log_metric(&MetricPoint::new("box", 0.5, 2)).unwrap();
            run.finish().unwrap();
        }
        assert_eq!(
            store.calls,
            vec![
                Call::Experiment("exp".to_string()),
                Call::CreateRun("1".to_string()),
                Call::Param("lr0".to_string(), "0.01".to_string()),
                Call::Metric("box".to_string(), 0.5, 2),
                Call::EndRun(RunStatus::Finished),
            ]
        );
    }

    #[test]
    fn test_drop_without_finish_marks_run_failed() {
        let mut store = RecordingStore::new();
        store.fail_param_at = Some(0);
        let result = (|| -> Result<()> {
            let mut run = ActiveRun::start(&mut store, "exp", None)?;
            run.log_param("lr0", "0.01")?;
            run.finish()
        })();
        assert!(result.is_err());
        assert_eq!(store.calls.last(), Some(&Call::EndRun(RunStatus::Failed)));
        // 只结束一次
        let ends = store.calls.iter().filter(|c| matches!(c, Call::EndRun(_))).count();
        assert_eq!(ends, 1);
    }
}
