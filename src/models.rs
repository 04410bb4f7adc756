// models.rs - 作为模块目录入口文件（Rust 2018+ 风格）
// 导出所有子模块
pub mod config;
pub mod metric;
pub mod parameter_value;
pub mod utils;

// 重新导出常用类型，保持API一致性
pub use config::{Config, FilesConfig};
pub use metric::{HeaderMode, MetricPoint};
pub use parameter_value::{ParameterValue, scalar_key_string};
