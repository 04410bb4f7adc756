use crate::models::metric::HeaderMode;
use serde::Deserialize;

/// 未提供表头时 results.txt 使用的默认列名
pub const DEFAULT_HEADER: [&str; 17] = [
    "Epoch",
    "gpu_mem",
    "GIoU/box",
    "Obj",
    "Cls",
    "kpt",
    "kpt_val",
    "total",
    "batch",
    "img_size",
    "P",
    "R",
    "mAP-50",
    "mAP-50-95",
    "val_GIoU",
    "val_obj",
    "val_cls",
];

/// 应用程序配置结构
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub tracking: TrackingConfig,
    pub files: FilesConfig,
    pub metrics: MetricsConfig,
}

/// 通用配置
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    pub base_dir: String,
    pub experiment_name: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            base_dir: ".".to_string(),
            experiment_name: "TestExperiment1".to_string(),
        }
    }
}

/// 跟踪存储配置
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TrackingConfig {
    pub tracking_uri: String,
    #[serde(deserialize_with = "crate::models::utils::deserialize_optional_string")]
    pub run_name: Option<String>,
    #[serde(deserialize_with = "crate::models::utils::deserialize_optional_string")]
    pub user: Option<String>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracking_uri: "./mlruns".to_string(),
            run_name: None,
            user: None,
        }
    }
}

/// 训练目录下各产物的文件名
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FilesConfig {
    pub hparams_file: String,
    pub results_file: String,
    pub options_file: String,
    pub weights_path: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            hparams_file: "hyp.yaml".to_string(),
            results_file: "results.txt".to_string(),
            options_file: "opt.yaml".to_string(),
            weights_path: "weights".to_string(),
        }
    }
}

/// 指标文件解析配置
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub header_mode: HeaderMode,
    pub default_header: Vec<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            header_mode: HeaderMode::Auto,
            default_header: DEFAULT_HEADER.iter().map(|s| s.to_string()).collect(),
        }
    }
}
