use crate::error::{BridgeError, Result};
use crate::models::FilesConfig;
use anyhow::Context;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 一次训练输出目录中需要上报的四个产物
#[derive(Debug, Clone, PartialEq)]
pub struct RunFiles {
    pub hparams: PathBuf,
    pub results: PathBuf,
    pub options: PathBuf,
    pub weights: PathBuf,
}

impl RunFiles {
    /// 拼接路径并检查所有文件都存在
    pub fn resolve(base_dir: &Path, files: &FilesConfig) -> anyhow::Result<Self> {
        // 检查目录是否存在
        if !base_dir.exists() {
            anyhow::bail!("Base directory '{}' does not exist", base_dir.display());
        }

        if !base_dir.is_dir() {
            anyhow::bail!("'{}' is not a directory", base_dir.display());
        }

        let run_files = Self {
            hparams: base_dir.join(&files.hparams_file),
            results: base_dir.join(&files.results_file),
            options: base_dir.join(&files.options_file),
            weights: base_dir.join(&files.weights_path),
        };

        for path in run_files.all() {
            std::fs::metadata(path)
                .with_context(|| format!("Required training artifact is missing: {}", path.display()))?;
        }
        Ok(run_files)
    }

    /// 按上传顺序返回所有产物：权重、hyp、results、opt
    pub fn all(&self) -> [&Path; 4] {
        [&self.weights, &self.hparams, &self.results, &self.options]
    }
}

/// 展开要上传的产物
///
/// 普通文件直接上传到产物区根目录；目录会被递归遍历，
/// 其中的文件保留相对路径，挂在以目录名命名的子目录下。
pub fn collect_artifact_files(path: &Path) -> Result<Vec<(PathBuf, Option<String>)>> {
    let metadata = std::fs::metadata(path).map_err(|e| BridgeError::io(path, e))?;
    if !metadata.is_dir() {
        return Ok(vec![(path.to_path_buf(), None)]);
    }

    let dir_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut files = Vec::new();
    for entry in WalkDir::new(path).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let io_err = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop while walking artifact directory"));
            BridgeError::io(path, io_err)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        // 相对父目录（使用 "/" 分隔）拼在目录名之后
        let relative_parent = entry
            .path()
            .strip_prefix(path)
            .ok()
            .and_then(|rel| rel.parent())
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default();

        let artifact_dir = match (dir_name.is_empty(), relative_parent.is_empty()) {
            (true, true) => None,
            (true, false) => Some(relative_parent),
            (false, true) => Some(dir_name.clone()),
            (false, false) => Some(format!("{}/{}", dir_name, relative_parent)),
        };
        files.push((entry.into_path(), artifact_dir));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_run_dir(dir: &Path) {
        fs::write(dir.join("hyp.yaml"), "lr0: 0.01\n").unwrap();
        fs::write(dir.join("results.txt"), "0/299 0.1 0.2\n").unwrap();
        fs::write(dir.join("opt.yaml"), "epochs: 300\n").unwrap();
        fs::write(dir.join("weights"), b"\x00\x01").unwrap();
    }

    #[test]
    fn test_resolve_run_files() {
        let temp_dir = tempdir().unwrap();
        write_run_dir(temp_dir.path());

        let files = RunFiles::resolve(temp_dir.path(), &FilesConfig::default()).unwrap();
        assert_eq!(files.hparams, temp_dir.path().join("hyp.yaml"));
        assert_eq!(files.weights, temp_dir.path().join("weights"));

        // 上传顺序
        let names: Vec<_> = files
            .all()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["weights", "hyp.yaml", "results.txt", "opt.yaml"]);
    }

    #[test]
    fn test_resolve_nonexistent_dir() {
        let result = RunFiles::resolve(Path::new("/nonexistent/directory"), &FilesConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_file_instead_of_dir() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("file.txt");
        fs::write(&file_path, "test").unwrap();

        assert!(RunFiles::resolve(&file_path, &FilesConfig::default()).is_err());
    }

    #[test]
    fn test_resolve_missing_artifact() {
        let temp_dir = tempdir().unwrap();
        write_run_dir(temp_dir.path());
        fs::remove_file(temp_dir.path().join("opt.yaml")).unwrap();

        let err = RunFiles::resolve(temp_dir.path(), &FilesConfig::default()).unwrap_err();
        assert!(err.to_string().contains("opt.yaml"));
    }

    #[test]
    fn test_collect_single_file() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("best.pt");
        fs::write(&file, "w").unwrap();

        let files = collect_artifact_files(&file).unwrap();
        assert_eq!(files, vec![(file, None)]);
    }

    #[test]
    fn test_collect_directory_recursively() {
        let temp_dir = tempdir().unwrap();
        let weights = temp_dir.path().join("weights");
        fs::create_dir_all(weights.join("epochs")).unwrap();
        fs::write(weights.join("best.pt"), "b").unwrap();
        fs::write(weights.join("last.pt"), "l").unwrap();
        fs::write(weights.join("epochs").join("epoch_10.pt"), "e").unwrap();

        let files = collect_artifact_files(&weights).unwrap();
        let summary: Vec<(String, Option<String>)> = files
            .iter()
            .map(|(p, dir)| (p.file_name().unwrap().to_string_lossy().into_owned(), dir.clone()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("best.pt".to_string(), Some("weights".to_string())),
                ("epoch_10.pt".to_string(), Some("weights/epochs".to_string())),
                ("last.pt".to_string(), Some("weights".to_string())),
            ]
        );
    }

    #[test]
    fn test_collect_missing_path() {
        assert!(collect_artifact_files(Path::new("/nonexistent/weights")).is_err());
    }
}
