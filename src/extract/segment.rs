use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::epoch::{format_epoch, Epoch};
use crate::error::{ExtractError, Result};
use crate::storage::{Record, RecordTrimmer};

/// 单个段写出的结果
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// 原样复制的字节数
    Copied(u64),
    /// 解码裁剪后重编码写出的字节数
    Trimmed(u64),
    /// 与请求窗口不相交，或裁剪后无样本
    Skipped,
}

impl WriteOutcome {
    pub fn bytes(&self) -> u64 {
        match self {
            WriteOutcome::Copied(n) | WriteOutcome::Trimmed(n) => *n,
            WriteOutcome::Skipped => 0,
        }
    }
}

/// 输出的最小单位
#[derive(Clone)]
pub enum DataSegment {
    FileRange(FileRangeSegment),
    Record(RecordSegment),
}

impl DataSegment {
    /// 预估字节数；记录段裁剪后实际写出可能更少
    pub fn num_bytes(&self) -> u64 {
        match self {
            DataSegment::FileRange(s) => s.num_bytes,
            DataSegment::Record(s) => s.record.len(),
        }
    }

    pub fn source_name(&self) -> &str {
        match self {
            DataSegment::FileRange(s) => &s.source_name,
            DataSegment::Record(s) => &s.source_name,
        }
    }

    pub fn write<W: Write + ?Sized>(&self, sink: &mut W) -> Result<WriteOutcome> {
        match self {
            DataSegment::FileRange(s) => s.write(sink),
            DataSegment::Record(s) => s.write(sink),
        }
    }
}

impl std::fmt::Debug for DataSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSegment::FileRange(s) => f
                .debug_struct("FileRange")
                .field("source", &s.source_name)
                .field("path", &s.path)
                .field("start_byte", &s.start_byte)
                .field("num_bytes", &s.num_bytes)
                .finish(),
            DataSegment::Record(s) => f
                .debug_struct("Record")
                .field("source", &s.source_name)
                .field("offset", &s.record.offset)
                .field("len", &s.record.len())
                .field("window", &(s.start_time, s.end_time))
                .finish(),
        }
    }
}

/// 文件中一段连续字节，原样复制
#[derive(Clone, Debug)]
pub struct FileRangeSegment {
    pub source_name: Arc<str>,
    pub path: PathBuf,
    pub start_byte: u64,
    pub num_bytes: u64,
}

impl FileRangeSegment {
    fn write<W: Write + ?Sized>(&self, sink: &mut W) -> Result<WriteOutcome> {
        let mut file = File::open(&self.path).map_err(|e| ExtractError::io(&self.path, e))?;
        file.seek(SeekFrom::Start(self.start_byte))
            .map_err(|e| ExtractError::io(&self.path, e))?;

        // 读满后再写，短读不产生半段输出
        let len = usize::try_from(self.num_bytes).map_err(|_| {
            ExtractError::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "range too large"),
            )
        })?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)
            .map_err(|e| ExtractError::io(&self.path, e))?;

        sink.write_all(&buf).map_err(ExtractError::Sink)?;
        Ok(WriteOutcome::Copied(self.num_bytes))
    }
}

/// 块边界附近的单条记录，写出时按请求窗口决定复制或裁剪
#[derive(Clone)]
pub struct RecordSegment {
    pub source_name: Arc<str>,
    pub record: Record,
    pub sample_rate: f64,
    pub start_time: Epoch,
    pub end_time: Epoch,
    pub codec: Arc<dyn RecordTrimmer>,
}

impl RecordSegment {
    fn write<W: Write + ?Sized>(&self, sink: &mut W) -> Result<WriteOutcome> {
        let rec_start = self.record.start_epoch();
        let rec_end = self.record.end_epoch();

        if !(rec_start < self.end_time && rec_end > self.start_time) {
            return Ok(WriteOutcome::Skipped);
        }

        let partial = rec_start < self.start_time || rec_end > self.end_time;
        if self.sample_rate > 0.0 && partial {
            tracing::debug!(
                "Trimming record {} @ {}",
                self.source_name,
                format_epoch(rec_start)
            );
            let out = self
                .codec
                .trim_record(&self.record.raw, self.start_time, self.end_time)?;
            if out.is_empty() {
                return Ok(WriteOutcome::Skipped);
            }
            sink.write_all(&out).map_err(ExtractError::Sink)?;
            return Ok(WriteOutcome::Trimmed(out.len() as u64));
        }

        sink.write_all(&self.record.raw).map_err(ExtractError::Sink)?;
        Ok(WriteOutcome::Copied(self.record.len()))
    }
}
