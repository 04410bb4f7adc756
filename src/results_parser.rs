// src/results_parser.rs
use crate::error::{BridgeError, Result};
use crate::models::{HeaderMode, MetricPoint};
use crate::tracking::ActiveRun;
use std::path::Path;
use tracing::{debug, info};

/// 去掉所有 '.' 和 '-' 后剩余字符是否全部为数字
///
/// 只由 '.'/'-' 组成的 token 去掉后为空串，同样视为数字；
/// '/' 不会被去掉，所以 "3/300" 不是数字。
pub fn is_numeric_like(token: &str) -> bool {
    token
        .chars()
        .filter(|c| *c != '.' && *c != '-')
        .all(|c| c.is_ascii_digit())
}

/// 可以作为指标值上报：数字形式，且去掉 '.'/'-' 后至少剩一个数字
///
/// "--"、"." 这类单元格在表头判断中算数字，但上报时跳过。
fn is_metric_value(token: &str) -> bool {
    is_numeric_like(token) && token.chars().any(|c| c.is_ascii_digit())
}

/// 启发式判断一行是否为表头：非数字 token 多于数字 token
pub fn is_header(line: &str) -> bool {
    let (numeric, non_numeric) = line
        .split_whitespace()
        .fold((0usize, 0usize), |(num, other), part| {
            if is_numeric_like(part) { (num + 1, other) } else { (num, other + 1) }
        });
    non_numeric > numeric
}

/// 解析 results.txt 的全部内容，返回按文件顺序排列的指标点
///
/// `path` 只用于错误信息。
pub fn parse_results(
    path: &Path,
    contents: &str,
    default_header: &[String],
    mode: HeaderMode,
) -> Result<Vec<MetricPoint>> {
    let mut lines = contents.lines().enumerate().peekable();
    let first_line = match lines.peek() {
        Some(&(_, line)) => line.trim(),
        None => return Err(BridgeError::EmptyMetrics { path: path.to_path_buf() }),
    };

    let has_header = match mode {
        HeaderMode::Auto => is_header(first_line),
        HeaderMode::Present => true,
        HeaderMode::Absent => false,
    };

    let file_header: Vec<String>;
    let header: &[String] = if has_header {
        file_header = first_line.split_whitespace().map(str::to_string).collect();
        lines.next();
        debug!("Using header from {}: {:?}", path.display(), file_header);
        &file_header
    } else {
        default_header
    };

    let mut points = Vec::new();
    for (index, line) in lines {
        let line_no = index + 1;
        let data: Vec<&str> = line.split_whitespace().collect();
        let step = parse_step(data.first().copied()).ok_or_else(|| BridgeError::InvalidStep {
            path: path.to_path_buf(),
            line: line_no,
            token: data.first().copied().unwrap_or("").to_string(),
        })?;

        for (key, value) in header.iter().skip(1).zip(data.iter().skip(1)) {
            if !is_metric_value(value) {
                continue;
            }
            let parsed: f64 = value.parse().map_err(|_| BridgeError::InvalidMetricValue {
                path: path.to_path_buf(),
                line: line_no,
                key: key.clone(),
                token: value.to_string(),
            })?;
            points.push(MetricPoint::new(key.as_str(), parsed, step));
        }
    }
    Ok(points)
}

/// "<step>/<total>" → step
fn parse_step(token: Option<&str>) -> Option<i64> {
    let token = token?;
    let prefix = token.split('/').next().unwrap_or(token);
    prefix.parse().ok()
}

/// 读取 results.txt 并把每个数值单元格作为指标上报，返回上报的数量
///
/// 整个文件先解析完成再开始上报，格式错误时不会留下半份指标。
pub fn log_metrics_from_results(
    run: &mut ActiveRun<'_>,
    file_path: &Path,
    default_header: &[String],
    mode: HeaderMode,
) -> Result<usize> {
    let contents = std::fs::read_to_string(file_path).map_err(|e| BridgeError::io(file_path, e))?;
    let points = parse_results(file_path, &contents, default_header, mode)?;

    for point in &points {
        run.log_metric(point)?;
    }
    info!("Logged {} metric values from {}", points.len(), file_path.display());
    Ok(points.len())
}
