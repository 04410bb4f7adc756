// src/yaml_parser.rs
use crate::error::{BridgeError, Result};
use crate::models::{ParameterValue, scalar_key_string};
use crate::tracking::ActiveRun;
use serde_yaml::Value;
use std::path::Path;
use tracing::info;

/// 解析 hyp.yaml / opt.yaml 顶层映射，按文件中的顺序返回键值对
///
/// 不做扁平化：嵌套的列表和映射整体作为一个参数值。
pub fn parse_params_file(file_path: &Path) -> Result<Vec<(String, ParameterValue)>> {
    let contents = std::fs::read_to_string(file_path).map_err(|e| BridgeError::io(file_path, e))?;
    if contents.trim().is_empty() {
        return Err(BridgeError::NotAMapping { path: file_path.to_path_buf() });
    }

    let yaml_value: Value = serde_yaml::from_str(&contents).map_err(|e| BridgeError::Yaml {
        path: file_path.to_path_buf(),
        source: e,
    })?;

    let mapping = match &yaml_value {
        Value::Mapping(map) => map,
        Value::Tagged(tagged) => match &tagged.value {
            Value::Mapping(map) => map,
            _ => return Err(BridgeError::NotAMapping { path: file_path.to_path_buf() }),
        },
        _ => return Err(BridgeError::NotAMapping { path: file_path.to_path_buf() }),
    };

    mapping
        .iter()
        .map(|(key, value)| -> Result<(String, ParameterValue)> {
            let key_str = scalar_key_string(key).ok_or_else(|| BridgeError::UnsupportedKey {
                path: file_path.to_path_buf(),
                key: format!("{:?}", key),
            })?;
            Ok((key_str, ParameterValue::from_yaml(value)))
        })
        .collect()
}

/// 把 YAML 文件中的每个键值对作为运行参数上报，返回上报的数量
pub fn log_params_from_yaml(run: &mut ActiveRun<'_>, file_path: &Path) -> Result<usize> {
    let params = parse_params_file(file_path)?;
    for (key, value) in &params {
        run.log_param(key, &value.to_param_string())?;
    }
    info!("Logged {} parameters from {}", params.len(), file_path.display());
    Ok(params.len())
}
