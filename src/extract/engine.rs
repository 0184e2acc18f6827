use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::config::ExtractorConfig;
use crate::core::epoch::{format_epoch, Epoch};
use crate::core::IndexRow;
use crate::error::{ConfigError, ExtractError, IndexError, Result};
use crate::extract::path::PathRewrite;
use crate::extract::segment::{DataSegment, FileRangeSegment, RecordSegment};
use crate::index::{resolve, ResolvedRange};
use crate::stats::ExtractionReport;
use crate::storage::{MseedCodec, MseedScanner, RecordIter, RecordScanner, RecordTrimmer};

/// 校验通过的一行：解析后的字节区间 + 改写后的文件路径
#[derive(Clone, Debug)]
pub struct ExtractionRequest {
    pub source_name: Arc<str>,
    pub file_path: PathBuf,
    pub start_time: Epoch,
    pub end_time: Epoch,
    pub range: ResolvedRange,
    /// 整块复制时的字节数
    pub section_bytes: u64,
    pub sample_rate: f64,
}

/// 抽取引擎。只持有只读配置，可在多个请求间并发共享
#[derive(Clone)]
pub struct Extractor {
    path_rewrite: Option<PathRewrite>,
    request_limit: u64,
    scanner: Arc<dyn RecordScanner>,
    codec: Arc<dyn RecordTrimmer>,
}

impl Extractor {
    pub fn new(config: &ExtractorConfig) -> Result<Self, ConfigError> {
        let path_rewrite = config
            .path_rewrite
            .as_ref()
            .map(|rw| PathRewrite::new(&rw.pattern, &rw.replacement))
            .transpose()?;
        Ok(Self {
            path_rewrite,
            request_limit: config.request_limit,
            scanner: Arc::new(MseedScanner),
            codec: Arc::new(MseedCodec),
        })
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn RecordScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn RecordTrimmer>) -> Self {
        self.codec = codec;
        self
    }

    /// 校验阶段：解析全部行并累计字节预算。任何一行失败则整个请求失败，不产生输出。
    ///
    /// 预算只在 `request_limit > 0` 时生效，但行列表总是完整构建。
    pub fn plan<I>(&self, rows: I) -> Result<Vec<ExtractionRequest>>
    where
        I: IntoIterator<Item = IndexRow>,
    {
        let mut requests = Vec::new();
        let mut total_bytes: u64 = 0;

        for row in rows {
            let source_name = row.source_name();
            let start = row.requested_start_time;
            let end = row.requested_end_time;

            let range = resolve(start, end, &row).map_err(|e| index_access(&source_name, e))?;
            total_bytes = total_bytes.saturating_add(range.byte_len());
            if self.request_limit > 0 && total_bytes > self.request_limit {
                return Err(ExtractError::RequestLimitExceeded {
                    limit: self.request_limit,
                });
            }

            let file_path = self.rewrite_path(&row.file_name);
            match file_path.try_exists() {
                Ok(true) => {}
                Ok(false) => {
                    return Err(index_access(&source_name, IndexError::MissingFile(file_path)));
                }
                Err(source) => {
                    return Err(index_access(
                        &source_name,
                        IndexError::Stat {
                            path: file_path,
                            source,
                        },
                    ));
                }
            }

            requests.push(ExtractionRequest {
                source_name: Arc::from(source_name),
                file_path,
                start_time: start,
                end_time: end,
                range,
                section_bytes: row.block_length,
                sample_rate: row.sample_rate,
            });
        }

        if total_bytes == 0 {
            return Err(ExtractError::NoData);
        }
        Ok(requests)
    }

    /// 先完整校验，再返回惰性段流
    pub fn extract<I>(&self, rows: I) -> Result<SegmentStream>
    where
        I: IntoIterator<Item = IndexRow>,
    {
        let requests = self.plan(rows)?;
        let planned_bytes = requests.iter().map(|r| r.range.byte_len()).sum();
        Ok(SegmentStream {
            requests: requests.into_iter(),
            current: None,
            failed: false,
            planned_bytes,
            scanner: Arc::clone(&self.scanner),
            codec: Arc::clone(&self.codec),
        })
    }

    /// 用同一窗口覆盖所有行的请求时间后抽取
    pub fn extract_window<I>(&self, start: Epoch, end: Epoch, rows: I) -> Result<SegmentStream>
    where
        I: IntoIterator<Item = IndexRow>,
    {
        self.extract(rows.into_iter().map(|row| row.with_request(start, end)))
    }

    fn rewrite_path(&self, file_name: &str) -> PathBuf {
        match &self.path_rewrite {
            Some(rw) => PathBuf::from(rw.apply(file_name)),
            None => PathBuf::from(file_name),
        }
    }
}

/// 只在这里附加上下文；日志由最终报告错误的调用方负责
fn index_access(source_name: &str, source: IndexError) -> ExtractError {
    debug!("Rejecting request at {}: {}", source_name, source);
    ExtractError::IndexAccess {
        source_name: source_name.to_string(),
        source,
    }
}

struct RowScan {
    request: ExtractionRequest,
    records: RecordIter,
}

/// 惰性段序列：按行顺序、行内按偏移升序产出。
///
/// 中途 drop 会关闭正在扫描的文件；出错后不再产出。
pub struct SegmentStream {
    requests: std::vec::IntoIter<ExtractionRequest>,
    current: Option<RowScan>,
    failed: bool,
    planned_bytes: u64,
    scanner: Arc<dyn RecordScanner>,
    codec: Arc<dyn RecordTrimmer>,
}

impl SegmentStream {
    /// 校验阶段累计的字节数（裁剪前的上界）
    pub fn planned_bytes(&self) -> u64 {
        self.planned_bytes
    }

    /// 逐段写入 `sink`；失败时已写出的段保留
    pub fn write_to<W: Write + ?Sized>(self, sink: &mut W) -> Result<ExtractionReport> {
        let mut report = ExtractionReport::default();
        for segment in self {
            let segment = segment?;
            let outcome = segment.write(sink)?;
            report.record(segment.source_name(), outcome);
        }
        sink.flush().map_err(ExtractError::Sink)?;
        Ok(report)
    }

    fn fail(&mut self, err: ExtractError) -> Option<Result<DataSegment>> {
        self.failed = true;
        self.current = None;
        Some(Err(err))
    }

    fn next_record(&mut self) -> Option<Result<DataSegment>> {
        let scan = self.current.as_mut()?;
        let end_offset = scan.request.range.end.offset;
        match scan.records.next() {
            None => {
                self.current = None;
                None
            }
            Some(Err(e)) => self.fail(e.into()),
            Some(Ok(record)) if record.offset >= end_offset => {
                self.current = None;
                None
            }
            Some(Ok(record)) => {
                let last = record.offset + record.len() >= end_offset;
                let req = &scan.request;
                let segment = DataSegment::Record(RecordSegment {
                    source_name: Arc::clone(&req.source_name),
                    record,
                    sample_rate: req.sample_rate,
                    start_time: req.start_time,
                    end_time: req.end_time,
                    codec: Arc::clone(&self.codec),
                });
                if last {
                    self.current = None;
                }
                Some(Ok(segment))
            }
        }
    }
}

impl Iterator for SegmentStream {
    type Item = Result<DataSegment>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            if self.current.is_some() {
                if let Some(item) = self.next_record() {
                    return Some(item);
                }
                continue;
            }

            let req = self.requests.next()?;
            debug!(
                "Extracting {} ({} - {}) from {}",
                req.source_name,
                format_epoch(req.start_time),
                format_epoch(req.end_time),
                req.file_path.display()
            );

            if !req.range.needs_refinement() {
                return Some(Ok(DataSegment::FileRange(FileRangeSegment {
                    source_name: req.source_name,
                    path: req.file_path,
                    start_byte: req.range.start.offset,
                    num_bytes: req.section_bytes,
                })));
            }

            match self.scanner.open_scan(&req.file_path, req.range.start.offset) {
                Ok(records) => {
                    self.current = Some(RowScan {
                        request: req,
                        records,
                    })
                }
                Err(e) => return self.fail(e.into()),
            }
        }
    }
}
