use std::path::PathBuf;

/// 单行索引的解析/定位错误（校验阶段被包装为 `ExtractError::IndexAccess`）
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    #[error("time index is empty")]
    EmptyTimeIndex,

    #[error("malformed time index entry {entry:?}: {reason}")]
    Malformed { entry: String, reason: &'static str },

    #[error("data file does not exist: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("cannot stat data file {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 记录扫描错误
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read failed at offset {offset}: {source}")]
    Read {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("truncated record at offset {offset}: wanted {wanted} bytes, got {got}")]
    Truncated { offset: u64, wanted: usize, got: usize },

    #[error("invalid record header at offset {offset}: {reason}")]
    InvalidHeader { offset: u64, reason: &'static str },

    #[error("record at offset {offset} has no blockette 1000")]
    MissingRecordLength { offset: u64 },
}

/// 记录解码 / 裁剪 / 重编码错误
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("unsupported data encoding {0}")]
    UnsupportedEncoding(u8),

    #[error("record header: {0}")]
    Header(&'static str),

    #[error("payload too short: need {need} bytes, have {have}")]
    ShortPayload { need: usize, have: usize },

    #[error("steim frame decode: {0}")]
    Steim(&'static str),

    #[error("trimmed record needs {0} bytes, above the 2^16 record limit")]
    RecordTooLarge(usize),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid path rewrite pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// 抽取请求的错误
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    /// 所有行解析后的总字节数为 0
    #[error("no matching data")]
    NoData,

    #[error("result exceeds limit of {limit} bytes")]
    RequestLimitExceeded { limit: u64 },

    #[error("error accessing data index for {source_name}: {source}")]
    IndexAccess {
        source_name: String,
        #[source]
        source: IndexError,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write to output failed: {0}")]
    Sink(#[source] std::io::Error),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl ExtractError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;
