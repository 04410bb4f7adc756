pub mod file_store;
pub mod rest_store;
pub mod run;
pub mod store;

pub use file_store::FileStore;
pub use rest_store::RestStore;
pub use run::ActiveRun;
pub use store::{RunStatus, TrackingStore};

use crate::error::{BridgeError, Result};
use tracing::info;

/// 根据 tracking URI 打开对应的存储
///
/// - `http://` / `https://` → MLflow 跟踪服务器
/// - `file://<path>` 或普通路径 → 本地 mlruns 目录
pub fn open_store(tracking_uri: &str, user: Option<&str>) -> Result<Box<dyn TrackingStore>> {
    if tracking_uri.starts_with("http://") || tracking_uri.starts_with("https://") {
        info!("Using MLflow tracking server at {}", tracking_uri);
        return Ok(Box::new(RestStore::new(tracking_uri, user)?));
    }

    let path = match tracking_uri.strip_prefix("file://") {
        Some(path) => path,
        None if tracking_uri.contains("://") || tracking_uri.is_empty() => {
            return Err(BridgeError::UnsupportedTrackingUri(tracking_uri.to_string()));
        }
        None => tracking_uri,
    };
    info!("Using local tracking directory {}", path);
    Ok(Box::new(FileStore::new(path, user)?))
}
