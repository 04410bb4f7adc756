use serde::Deserialize;

/// 一个待上报的指标点
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub key: String, // 指标名，取自表头
    pub value: f64,
    pub step: i64, // 训练轮次，取自首列 "<step>/<total>"
}

impl MetricPoint {
    pub fn new(key: impl Into<String>, value: f64, step: i64) -> Self {
        Self {
            key: key.into(),
            value,
            step,
        }
    }
}

/// results.txt 首行的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HeaderMode {
    /// 按启发式规则判断首行是否为表头
    #[default]
    Auto,
    /// 首行一定是表头
    Present,
    /// 文件没有表头，使用默认列名
    Absent,
}
