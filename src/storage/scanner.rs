use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::core::Epoch;
use crate::error::ScanError;
use crate::storage::header::{header_extent, RecordHeader, MIN_RECORD_LENGTH};

/// 扫描得到的一条完整记录（原始字节 + 解析后的头）
#[derive(Clone, Debug)]
pub struct Record {
    pub offset: u64,
    pub header: RecordHeader,
    pub raw: Vec<u8>,
}

impl Record {
    pub fn start_epoch(&self) -> Epoch {
        self.header.start_epoch()
    }

    pub fn end_epoch(&self) -> Epoch {
        self.header.end_epoch()
    }

    pub fn len(&self) -> u64 {
        self.raw.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

pub type RecordIter = Box<dyn Iterator<Item = Result<Record, ScanError>> + Send>;

/// 记录扫描能力：从任意记录对齐的偏移开始顺序读取
pub trait RecordScanner: Send + Sync {
    fn open_scan(&self, path: &Path, start_offset: u64) -> Result<RecordIter, ScanError>;
}

/// 基于文件的 miniSEED 2 扫描器
#[derive(Clone, Copy, Debug, Default)]
pub struct MseedScanner;

impl RecordScanner for MseedScanner {
    fn open_scan(&self, path: &Path, start_offset: u64) -> Result<RecordIter, ScanError> {
        let open_err = |source| ScanError::Open {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(open_err)?;
        file.seek(SeekFrom::Start(start_offset)).map_err(open_err)?;
        Ok(Box::new(MseedRecords {
            reader: BufReader::new(file),
            offset: start_offset,
            done: false,
        }))
    }
}

/// 惰性记录迭代器；drop 时关闭文件句柄。出错后不再产出
pub struct MseedRecords {
    reader: BufReader<File>,
    offset: u64,
    done: bool,
}

impl MseedRecords {
    fn read_record(&mut self) -> Result<Option<Record>, ScanError> {
        let offset = self.offset;
        let mut raw = vec![0u8; MIN_RECORD_LENGTH];
        let got = read_full(&mut self.reader, &mut raw).map_err(|source| ScanError::Read { offset, source })?;
        if got == 0 {
            return Ok(None);
        }
        if got < MIN_RECORD_LENGTH {
            return Err(ScanError::Truncated {
                offset,
                wanted: MIN_RECORD_LENGTH,
                got,
            });
        }

        // blockette 链可能延伸到数据区起点
        let extent = header_extent(&raw);
        self.fill_to(&mut raw, extent, offset)?;
        let header = RecordHeader::parse(&raw, offset)?;
        let reclen = header.record_length;
        self.fill_to(&mut raw, reclen, offset)?;

        self.offset += reclen as u64;
        Ok(Some(Record {
            offset,
            header,
            raw,
        }))
    }

    /// 把 `raw` 读满到 `len` 字节（已够长则不动）
    fn fill_to(&mut self, raw: &mut Vec<u8>, len: usize, offset: u64) -> Result<(), ScanError> {
        let have = raw.len();
        if len <= have {
            return Ok(());
        }
        raw.resize(len, 0);
        let got = read_full(&mut self.reader, &mut raw[have..])
            .map_err(|source| ScanError::Read { offset, source })?;
        if got < len - have {
            return Err(ScanError::Truncated {
                offset,
                wanted: len,
                got: have + got,
            });
        }
        Ok(())
    }
}

impl Iterator for MseedRecords {
    type Item = Result<Record, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// 读满 `buf` 或遇到 EOF，返回实际读取字节数
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
