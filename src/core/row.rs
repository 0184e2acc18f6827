use serde::Deserialize;

use crate::core::epoch::{deserialize_epoch, Epoch};
use crate::core::time_index::{Checkpoint, TimeIndex};

/// 索引查询层产出的一行（只读）：一个数据块的位置、覆盖时间与稀疏时间索引，以及请求窗口
#[derive(Clone, Debug, Deserialize)]
pub struct IndexRow {
    pub network: String,
    pub station: String,
    #[serde(default)]
    pub location: String,
    pub channel: String,
    /// 0 表示非时序数据，永不做采样级裁剪
    pub sample_rate: f64,
    pub block_start_offset: u64,
    pub block_length: u64,
    #[serde(deserialize_with = "deserialize_epoch")]
    pub block_start_time: Epoch,
    #[serde(deserialize_with = "deserialize_epoch")]
    pub block_end_time: Epoch,
    pub time_index: TimeIndex,
    pub file_name: String,
    #[serde(deserialize_with = "deserialize_epoch")]
    pub requested_start_time: Epoch,
    #[serde(deserialize_with = "deserialize_epoch")]
    pub requested_end_time: Epoch,
}

impl IndexRow {
    /// `NET_STA_LOC_CHA`
    pub fn source_name(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.network, self.station, self.location, self.channel
        )
    }

    pub fn block_end_offset(&self) -> u64 {
        self.block_start_offset + self.block_length
    }

    pub fn block_start(&self) -> Checkpoint {
        Checkpoint {
            time: self.block_start_time,
            offset: self.block_start_offset,
        }
    }

    /// 哨兵解析目标
    pub fn block_end(&self) -> Checkpoint {
        Checkpoint {
            time: self.block_end_time,
            offset: self.block_end_offset(),
        }
    }

    pub fn with_request(mut self, start: Epoch, end: Epoch) -> Self {
        self.requested_start_time = start;
        self.requested_end_time = end;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_catalog_row() {
        let json = r#"{
            "network": "IU", "station": "ANMO", "location": "00", "channel": "BHZ",
            "sample_rate": 20.0,
            "block_start_offset": 1000, "block_length": 500,
            "block_start_time": "1970-01-01T00:01:40", "block_end_time": 110.0,
            "time_index": "100.0=>1000,105.0=>1200,latest=>1500",
            "file_name": "/data/IU/ANMO.mseed",
            "requested_start_time": 102.0, "requested_end_time": "1970-01-01T00:01:48Z"
        }"#;
        let row: IndexRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.source_name(), "IU_ANMO_00_BHZ");
        assert_eq!(row.block_start_time, 100.0);
        assert_eq!(row.requested_end_time, 108.0);
        assert_eq!(row.block_end().offset, 1500);
        assert!(row.time_index.ends_latest());
    }

    #[test]
    fn rejects_bad_time_index() {
        let json = r#"{
            "network": "IU", "station": "ANMO", "channel": "BHZ", "sample_rate": 0,
            "block_start_offset": 0, "block_length": 1,
            "block_start_time": 0, "block_end_time": 1,
            "time_index": "0=>zero", "file_name": "x",
            "requested_start_time": 0, "requested_end_time": 1
        }"#;
        assert!(serde_json::from_str::<IndexRow>(json).is_err());
    }
}
