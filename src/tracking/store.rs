use crate::error::Result;
use crate::models::MetricPoint;
use std::path::Path;

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

impl RunStatus {
    /// REST 接口使用的状态名
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
        }
    }

    /// 本地 meta.yaml 中记录的状态码
    pub fn as_code(&self) -> u8 {
        match self {
            RunStatus::Running => 1,
            RunStatus::Finished => 3,
            RunStatus::Failed => 4,
        }
    }
}

/// 实验跟踪存储的最小接口
///
/// 所有调用都是同步的；一个进程内只有一个使用者。
pub trait TrackingStore {
    /// 按名称查找实验，不存在时创建，返回实验ID
    fn get_or_create_experiment(&mut self, name: &str) -> Result<String>;

    /// 在实验下创建一个处于 RUNNING 状态的运行，返回运行ID
    fn create_run(&mut self, experiment_id: &str, run_name: Option<&str>) -> Result<String>;

    fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()>;

    fn log_metric(&mut self, run_id: &str, point: &MetricPoint, timestamp_ms: i64) -> Result<()>;

    /// 上传单个文件；`artifact_dir` 为运行产物区内的相对目录
    fn log_artifact(&mut self, run_id: &str, local_file: &Path, artifact_dir: Option<&str>) -> Result<()>;

    fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<()>;
}
