use std::sync::LazyLock;

use anyhow::Result;
use prometheus::*;

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("ps_search_count", "count of the ranking requests", &["mode"])
        .unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "ps_search_duration",
        "duration of the ranking requests in seconds, including enrichment wait",
        &["mode"]
    )
    .unwrap()
});

static METRIC_ENRICH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "ps_enrich_count",
        "outcome of the background color feature tasks",
        &["outcome"]
    )
    .unwrap()
});

/// 后台特征计算任务的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// 写入缓存
    Stored,
    /// 代数过期或会话已关闭，结果被丢弃
    Discarded,
    /// 图片获取失败
    FetchFailed,
    /// 图片解码失败
    DecodeFailed,
}

impl EnrichOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Discarded => "discarded",
            Self::FetchFailed => "fetch_failed",
            Self::DecodeFailed => "decode_failed",
        }
    }
}

pub fn inc_search_count(mode: &str) {
    METRIC_SEARCH_COUNT.with_label_values(&[mode]).inc();
}

pub fn inc_search_duration(mode: &str, duration: f32) {
    METRIC_SEARCH_DURATION.with_label_values(&[mode]).observe(duration as f64);
}

pub fn inc_enrich_count(outcome: EnrichOutcome) {
    METRIC_ENRICH_COUNT.with_label_values(&[outcome.as_str()]).inc();
}

/// 以文本格式导出所有指标
pub fn gather_text() -> Result<String> {
    let encoder = TextEncoder::new();
    Ok(encoder.encode_to_string(&prometheus::gather())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_contains_counters() {
        inc_search_count("text");
        inc_enrich_count(EnrichOutcome::Stored);
        let text = gather_text().unwrap();
        assert!(text.contains("ps_search_count"));
        assert!(text.contains("outcome=\"stored\""));
    }
}
