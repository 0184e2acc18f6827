use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::core::epoch::Epoch;
use crate::error::IndexError;

/// 末尾哨兵：表示“块结束”，使用前解析为 (block_end_time, block_end_offset)
pub const LATEST: &str = "latest";

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub time: Epoch,
    pub offset: u64,
}

/// 块内稀疏时间索引：按时间严格递增的 (timestamp, byte_offset) 检查点。
///
/// 编码格式：`"<epoch>=><offset>,...,latest=><offset>"`。
/// 哨兵不展开成真实条目，`resolved_len` / `get` 在查询时虚拟拼接，保证 O(log n) 查找不需要拷贝。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeIndex {
    points: Vec<Checkpoint>,
    ends_latest: bool,
}

impl TimeIndex {
    pub fn points(&self) -> &[Checkpoint] {
        &self.points
    }

    pub fn ends_latest(&self) -> bool {
        self.ends_latest
    }

    /// 含哨兵的条目数
    pub fn resolved_len(&self) -> usize {
        self.points.len() + usize::from(self.ends_latest)
    }

    pub fn is_empty(&self) -> bool {
        self.resolved_len() == 0
    }

    /// 第 i 个条目；哨兵位置返回 `block_end`
    pub fn get(&self, i: usize, block_end: Checkpoint) -> Option<Checkpoint> {
        match self.points.get(i) {
            Some(p) => Some(*p),
            None if self.ends_latest && i == self.points.len() => Some(block_end),
            None => None,
        }
    }

    /// 在含哨兵的虚拟序列上做 partition_point（谓词须对前缀为 true）
    pub fn partition_point(&self, block_end: Checkpoint, pred: impl Fn(&Checkpoint) -> bool) -> usize {
        let n = self.points.partition_point(&pred);
        if n == self.points.len() && self.ends_latest && pred(&block_end) {
            n + 1
        } else {
            n
        }
    }
}

impl FromStr for TimeIndex {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entries: Vec<&str> = s
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .collect();

        let mut points: Vec<Checkpoint> = Vec::with_capacity(entries.len());
        let mut ends_latest = false;
        for (i, entry) in entries.iter().enumerate() {
            let malformed = |reason| IndexError::Malformed {
                entry: entry.to_string(),
                reason,
            };
            let (time, offset) = entry
                .split_once("=>")
                .ok_or_else(|| malformed("missing '=>'"))?;

            if time.trim() == LATEST {
                if i + 1 != entries.len() {
                    return Err(malformed("'latest' must be the final entry"));
                }
                ends_latest = true;
                continue;
            }

            let time: Epoch = time
                .trim()
                .parse()
                .map_err(|_| malformed("timestamp is not a number"))?;
            let offset: u64 = offset
                .trim()
                .parse()
                .map_err(|_| malformed("offset is not an unsigned integer"))?;

            if let Some(prev) = points.last() {
                if time <= prev.time || offset <= prev.offset {
                    return Err(malformed("entries must be strictly increasing"));
                }
            }
            points.push(Checkpoint { time, offset });
        }

        Ok(Self {
            points,
            ends_latest,
        })
    }
}

impl<'de> Deserialize<'de> for TimeIndex {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
