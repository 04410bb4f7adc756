use crate::models::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// 未通过 --config 指定时查找的配置文件
pub const DEFAULT_CONFIG_PATH: &str = "mlflow_bridge.toml";

pub const DEFAULT_CONFIG: &str = r#"# mlflow-bridge 配置文件
# 命令行参数优先于这里的设置

[general]
# 训练输出目录
base_dir = "."
experiment_name = "TestExperiment1"

[tracking]
# 本地目录（mlruns 格式）或 http(s):// 跟踪服务器地址
tracking_uri = "./mlruns"
# 留空表示不设置
run_name = ""
user = ""

[files]
hparams_file = "hyp.yaml"
results_file = "results.txt"
options_file = "opt.yaml"
weights_path = "weights"

[metrics]
# auto: 自动判断首行是否为表头; present: 有表头; absent: 无表头
header_mode = "auto"
default_header = [
    "Epoch", "gpu_mem", "GIoU/box", "Obj", "Cls", "kpt", "kpt_val", "total", "batch",
    "img_size", "P", "R", "mAP-50", "mAP-50-95", "val_GIoU", "val_obj", "val_cls",
]
"#;

/// 加载配置文件
///
/// - 显式指定的路径不存在时，先在该位置写入默认配置
/// - 未指定且默认路径不存在时，直接使用内置默认值
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config_path = match config_path {
        Some(path) => {
            if !path.exists() {
                create_default_config(path)?;
                info!("Created default config file at {}", path.display());
            }
            path
        }
        None => {
            let path = Path::new(DEFAULT_CONFIG_PATH);
            if !path.exists() {
                debug!("No {} found, using built-in defaults", DEFAULT_CONFIG_PATH);
                return Ok(Config::default());
            }
            path
        }
    };

    // 读取配置文件内容
    let config_content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

    // 解析TOML配置
    let config: Config = toml::from_str(&config_content)
        .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

    debug!("Loaded configuration from {}", config_path.display());
    Ok(config)
}

fn create_default_config(config_path: &Path) -> Result<()> {
    fs::write(config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to create default config file: {}", config_path.display()))?;

    Ok(())
}
