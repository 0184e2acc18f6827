use std::collections::BTreeMap;
use std::fmt;

use crate::extract::WriteOutcome;

/// 一次抽取的写出统计
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractionReport {
    /// 处理过的段数（含跳过的）
    pub segments: u64,
    /// 实际写入 sink 的字节数
    pub bytes_written: u64,
    pub copied: u64,
    pub trimmed: u64,
    pub skipped: u64,
    /// 按 `NET_STA_LOC_CHA` 聚合
    pub per_source: BTreeMap<String, SourceStats>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceStats {
    pub segments: u64,
    pub bytes: u64,
}

impl ExtractionReport {
    pub fn record(&mut self, source_name: &str, outcome: WriteOutcome) {
        self.segments += 1;
        self.bytes_written += outcome.bytes();
        match outcome {
            WriteOutcome::Copied(_) => self.copied += 1,
            WriteOutcome::Trimmed(_) => self.trimmed += 1,
            WriteOutcome::Skipped => self.skipped += 1,
        }

        let entry = self.per_source.entry(source_name.to_string()).or_default();
        entry.segments += 1;
        entry.bytes += outcome.bytes();
    }
}

fn human_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;
    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

impl fmt::Display for ExtractionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "╔══════════════════════════════════════════════════╗")?;
        writeln!(f, "║           mseed-extract Report                   ║")?;
        writeln!(f, "╠══════════════════════════════════════════════════╣")?;
        writeln!(f, "║ Written:    {:>36} ║", human_bytes(self.bytes_written))?;
        writeln!(f, "║ Segments:   {:>36} ║", self.segments)?;
        writeln!(
            f,
            "║   copied {:>8}  trimmed {:>8}  skipped {:>8} ║",
            self.copied, self.trimmed, self.skipped
        )?;
        if !self.per_source.is_empty() {
            writeln!(f, "╠──────────────────────────────────────────────────╣")?;
            for (name, s) in &self.per_source {
                writeln!(
                    f,
                    "║ {:<22} {:>8}  {:>14} ║",
                    name,
                    s.segments,
                    human_bytes(s.bytes)
                )?;
            }
        }
        write!(f, "╚══════════════════════════════════════════════════╝")
    }
}
