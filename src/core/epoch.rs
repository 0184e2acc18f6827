use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

/// 时间戳统一为 Unix epoch 秒（f64）
pub type Epoch = f64;

const ISO_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// 解析 epoch 数字或 ISO-8601 字符串（可带 `Z` 后缀，按 UTC 处理）
pub fn parse_epoch(s: &str) -> Option<Epoch> {
    let s = s.trim();
    if let Ok(v) = s.parse::<f64>() {
        return v.is_finite().then_some(v);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(to_epoch(&dt.with_timezone(&Utc)));
    }
    let s = s.strip_suffix('Z').unwrap_or(s);
    ISO_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(s, fmt)
            .ok()
            .map(|naive| to_epoch(&Utc.from_utc_datetime(&naive)))
    })
}

fn to_epoch(dt: &DateTime<Utc>) -> Epoch {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) * 1e-9
}

/// 微秒精度的 ISO 表示（日志用）
pub fn format_epoch(epoch: Epoch) -> String {
    let micros = (epoch * 1e6).round() as i64;
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1000) as u32;
    match DateTime::<Utc>::from_timestamp(secs, nanos) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        None => format!("{epoch}"),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EpochRepr {
    Number(f64),
    Text(String),
}

/// serde：字段可为数字或 ISO 字符串
pub fn deserialize_epoch<'de, D>(deserializer: D) -> Result<Epoch, D::Error>
where
    D: Deserializer<'de>,
{
    match EpochRepr::deserialize(deserializer)? {
        EpochRepr::Number(v) => Ok(v),
        EpochRepr::Text(s) => parse_epoch(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {s:?}"))),
    }
}
