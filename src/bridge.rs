// src/bridge.rs
use crate::file_utils::RunFiles;
use crate::models::Config;
use crate::results_parser::log_metrics_from_results;
use crate::tracking::{ActiveRun, TrackingStore};
use crate::yaml_parser::log_params_from_yaml;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// 一次上报的结果统计
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub experiment_id: String,
    pub run_id: String,
    pub params: usize,
    pub metrics: usize,
    pub artifacts: usize,
}

/// 把一个训练目录的全部产物上报到跟踪存储
///
/// 顺序：hyp.yaml 参数 → results.txt 指标 → opt.yaml 参数 → 上传四个产物 → 结束运行。
/// 任何一步失败都会立即返回，运行被标记为 FAILED。
pub fn run_bridge(config: &Config, store: &mut dyn TrackingStore) -> Result<RunSummary> {
    let base_dir = Path::new(&config.general.base_dir);
    let files = RunFiles::resolve(base_dir, &config.files)?;
    let experiment_name = config.general.experiment_name.as_str();

    let mut run = ActiveRun::start(store, experiment_name, config.tracking.run_name.as_deref())
        .with_context(|| format!("Failed to start run in experiment '{}'", experiment_name))?;
    info!("MLflow run started for experiment: {}", experiment_name);

    // 超参数
    let mut params = log_params_from_yaml(&mut run, &files.hparams)
        .with_context(|| format!("Failed to log hyperparameters from {}", files.hparams.display()))?;

    // 指标
    let metrics = log_metrics_from_results(
        &mut run,
        &files.results,
        &config.metrics.default_header,
        config.metrics.header_mode,
    )
    .with_context(|| format!("Failed to log metrics from {}", files.results.display()))?;

    // 训练选项
    params += log_params_from_yaml(&mut run, &files.options)
        .with_context(|| format!("Failed to log training options from {}", files.options.display()))?;

    // 权重与原始文件作为产物上传
    let mut artifacts = 0;
    for path in files.all() {
        artifacts += run
            .log_artifact(path)
            .with_context(|| format!("Failed to upload artifact {}", path.display()))?;
    }
    info!("Uploaded {} artifact files", artifacts);

    let summary = RunSummary {
        experiment_id: run.experiment_id().to_string(),
        run_id: run.run_id().to_string(),
        params,
        metrics,
        artifacts,
    };
    run.finish().context("Failed to end run")?;
    info!("MLflow run ended successfully");
    Ok(summary)
}
