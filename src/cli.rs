use crate::models::{Config, HeaderMode};
use clap::Parser;
use std::path::PathBuf;

/// 把训练输出（hyp.yaml、results.txt、opt.yaml、weights）上报到 MLflow
#[derive(Parser, Debug)]
#[command(name = "mlflow-bridge", version, long_about = None)]
pub struct Cli {
    /// 训练输出目录
    pub base_dir: Option<PathBuf>,

    /// 实验名称
    #[arg(short, long)]
    pub experiment: Option<String>,

    /// 配置文件路径（默认读取 ./mlflow_bridge.toml，如果存在）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 本地 mlruns 目录或 http(s):// 跟踪服务器
    #[arg(long)]
    pub tracking_uri: Option<String>,

    #[arg(long)]
    pub run_name: Option<String>,

    /// results.txt 首行的处理方式
    #[arg(long, value_enum)]
    pub header_mode: Option<HeaderMode>,

    /// 输出更多日志（-v: debug, -vv: trace）
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// 命令行参数覆盖配置文件中的值
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(base_dir) = &self.base_dir {
            config.general.base_dir = base_dir.to_string_lossy().into_owned();
        }
        if let Some(experiment) = &self.experiment {
            config.general.experiment_name = experiment.clone();
        }
        if let Some(uri) = &self.tracking_uri {
            config.tracking.tracking_uri = uri.clone();
        }
        if let Some(run_name) = &self.run_name {
            config.tracking.run_name = Some(run_name.clone());
        }
        if let Some(mode) = self.header_mode {
            config.metrics.header_mode = mode;
        }
    }
}
