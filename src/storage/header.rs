use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};

use crate::core::Epoch;
use crate::error::ScanError;

// miniSEED 2 固定头（48B）字段偏移
pub const FIXED_HEADER_SIZE: usize = 48;
const QUALITY: usize = 6;
const BTIME: usize = 20;
const NUM_SAMPLES: usize = 30;
const RATE_FACTOR: usize = 32;
const RATE_MULT: usize = 34;
const ACTIVITY_FLAGS: usize = 36;
const TIME_CORRECTION: usize = 40;
const DATA_OFFSET: usize = 44;
const FIRST_BLOCKETTE: usize = 46;

const TIME_CORRECTION_APPLIED: u8 = 0x02;

/// 最小记录长度 2^7；blockette 链必须落在这一前缀内
pub const MIN_RECORD_LENGTH: usize = 1 << 7;
pub const MAX_RECORD_EXP: u8 = 16;
const MIN_RECORD_EXP: u8 = 7;
const MAX_BLOCKETTES: usize = 32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    pub fn u16(self, b: &[u8]) -> u16 {
        let v = [b[0], b[1]];
        match self {
            ByteOrder::Big => u16::from_be_bytes(v),
            ByteOrder::Little => u16::from_le_bytes(v),
        }
    }

    pub fn i16(self, b: &[u8]) -> i16 {
        self.u16(b) as i16
    }

    pub fn u32(self, b: &[u8]) -> u32 {
        let v = [b[0], b[1], b[2], b[3]];
        match self {
            ByteOrder::Big => u32::from_be_bytes(v),
            ByteOrder::Little => u32::from_le_bytes(v),
        }
    }

    pub fn i32(self, b: &[u8]) -> i32 {
        self.u32(b) as i32
    }

    pub fn u64(self, b: &[u8]) -> u64 {
        let mut v = [0u8; 8];
        v.copy_from_slice(&b[..8]);
        match self {
            ByteOrder::Big => u64::from_be_bytes(v),
            ByteOrder::Little => u64::from_le_bytes(v),
        }
    }

    pub fn put_u16(self, b: &mut [u8], v: u16) {
        let bytes = match self {
            ByteOrder::Big => v.to_be_bytes(),
            ByteOrder::Little => v.to_le_bytes(),
        };
        b[..2].copy_from_slice(&bytes);
    }

    pub fn put_u32(self, b: &mut [u8], v: u32) {
        let bytes = match self {
            ByteOrder::Big => v.to_be_bytes(),
            ByteOrder::Little => v.to_le_bytes(),
        };
        b[..4].copy_from_slice(&bytes);
    }

    pub fn put_u64(self, b: &mut [u8], v: u64) {
        let bytes = match self {
            ByteOrder::Big => v.to_be_bytes(),
            ByteOrder::Little => v.to_le_bytes(),
        };
        b[..8].copy_from_slice(&bytes);
    }

    fn from_word_order(flag: u8) -> Self {
        if flag == 0 {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }

    fn word_order_flag(self) -> u8 {
        match self {
            ByteOrder::Big => 1,
            ByteOrder::Little => 0,
        }
    }
}

/// 解析后的记录头（固定头 + blockette 100/1000/1001）
#[derive(Clone, Debug, PartialEq)]
pub struct RecordHeader {
    pub order: ByteOrder,
    /// BTIME（含 B1001 微秒），未加时间校正
    pub btime: Epoch,
    /// 未应用的时间校正（秒）；已应用时为 0
    pub pending_correction: f64,
    pub num_samples: usize,
    pub sample_rate: f64,
    pub data_offset: usize,
    pub encoding: u8,
    pub data_order: ByteOrder,
    pub record_length: usize,
    b1000_pos: usize,
    b1001_pos: Option<usize>,
}

impl RecordHeader {
    /// 从记录前缀解析（至少 `MIN_RECORD_LENGTH` 字节）；`offset` 仅用于错误定位
    pub fn parse(buf: &[u8], offset: u64) -> Result<Self, ScanError> {
        let invalid = |reason| ScanError::InvalidHeader { offset, reason };
        if buf.len() < FIXED_HEADER_SIZE {
            return Err(invalid("shorter than the fixed header"));
        }
        if !b"DRQM".contains(&buf[QUALITY]) {
            return Err(invalid("bad data quality indicator"));
        }

        let order = detect_order(buf).ok_or_else(|| invalid("implausible start time"))?;
        let btime = decode_btime(order, &buf[BTIME..BTIME + 10])
            .ok_or_else(|| invalid("invalid start time"))?;

        let correction = if buf[ACTIVITY_FLAGS] & TIME_CORRECTION_APPLIED == 0 {
            f64::from(order.i32(&buf[TIME_CORRECTION..])) * 1e-4
        } else {
            0.0
        };

        let mut header = Self {
            order,
            btime,
            pending_correction: correction,
            num_samples: usize::from(order.u16(&buf[NUM_SAMPLES..])),
            sample_rate: nominal_rate(
                order.i16(&buf[RATE_FACTOR..]),
                order.i16(&buf[RATE_MULT..]),
            ),
            data_offset: usize::from(order.u16(&buf[DATA_OFFSET..])),
            encoding: 0,
            data_order: ByteOrder::Big,
            record_length: 0,
            b1000_pos: 0,
            b1001_pos: None,
        };

        let mut pos = usize::from(order.u16(&buf[FIRST_BLOCKETTE..]));
        let mut seen_b1000 = false;
        for _ in 0..MAX_BLOCKETTES {
            if pos < FIXED_HEADER_SIZE || pos + 4 > buf.len() {
                break;
            }
            let kind = order.u16(&buf[pos..]);
            let next = usize::from(order.u16(&buf[pos + 2..]));
            match kind {
                100 if pos + 8 <= buf.len() => {
                    let rate = f32::from_bits(order.u32(&buf[pos + 4..]));
                    if rate.is_finite() && rate >= 0.0 {
                        header.sample_rate = f64::from(rate);
                    }
                }
                1000 if pos + 8 <= buf.len() => {
                    let exp = buf[pos + 6];
                    if !(MIN_RECORD_EXP..=MAX_RECORD_EXP).contains(&exp) {
                        return Err(invalid("record length exponent out of range"));
                    }
                    header.encoding = buf[pos + 4];
                    header.data_order = ByteOrder::from_word_order(buf[pos + 5]);
                    header.record_length = 1usize << exp;
                    header.b1000_pos = pos;
                    seen_b1000 = true;
                }
                1001 if pos + 8 <= buf.len() => {
                    header.btime += f64::from(buf[pos + 5] as i8) * 1e-6;
                    header.b1001_pos = Some(pos);
                }
                _ => {}
            }
            if next <= pos {
                break;
            }
            pos = next;
        }

        if !seen_b1000 {
            return Err(ScanError::MissingRecordLength { offset });
        }
        if header.data_offset > header.record_length {
            return Err(invalid("data offset beyond record end"));
        }
        Ok(header)
    }

    pub fn start_epoch(&self) -> Epoch {
        self.btime + self.pending_correction
    }

    /// 最后一个样本的时间
    pub fn end_epoch(&self) -> Epoch {
        if self.sample_rate > 0.0 && self.num_samples > 0 {
            self.start_epoch() + (self.num_samples - 1) as f64 / self.sample_rate
        } else {
            self.start_epoch()
        }
    }

    /// 改写记录头中的开始时间，使 `start_epoch()` 等于 `start`
    pub fn write_start(&self, buf: &mut [u8], start: Epoch) {
        let btime = start - self.pending_correction;
        let micros = (btime * 1e6).round() as i64;
        let (fields, residual) = encode_btime(micros);
        let o = self.order;
        o.put_u16(&mut buf[BTIME..], fields.year);
        o.put_u16(&mut buf[BTIME + 2..], fields.day);
        buf[BTIME + 4] = fields.hour;
        buf[BTIME + 5] = fields.minute;
        buf[BTIME + 6] = fields.second;
        buf[BTIME + 7] = 0;
        o.put_u16(&mut buf[BTIME + 8..], fields.fract);
        if let Some(pos) = self.b1001_pos {
            buf[pos + 5] = residual as u8;
        }
    }

    /// blockette 是否都位于数据区之前（重编码时整体拷贝头部）
    pub fn blockettes_fit(&self) -> bool {
        self.b1000_pos + 8 <= self.data_offset
            && self.b1001_pos.map_or(true, |p| p + 8 <= self.data_offset)
    }

    pub fn write_num_samples(&self, buf: &mut [u8], n: u16) {
        self.order.put_u16(&mut buf[NUM_SAMPLES..], n);
    }

    /// 改写 B1000 的编码 / 字序 / 记录长度
    pub fn write_layout(&self, buf: &mut [u8], encoding: u8, data_order: ByteOrder, exp: u8) {
        buf[self.b1000_pos + 4] = encoding;
        buf[self.b1000_pos + 5] = data_order.word_order_flag();
        buf[self.b1000_pos + 6] = exp;
    }
}

/// 解析头部所需的前缀长度：至少 `MIN_RECORD_LENGTH`，数据区起点更靠后时延伸到数据区起点
pub(crate) fn header_extent(buf: &[u8]) -> usize {
    let data_offset = if buf.len() < FIXED_HEADER_SIZE {
        0
    } else {
        detect_order(buf).map_or(0, |o| usize::from(o.u16(&buf[DATA_OFFSET..])))
    };
    data_offset.clamp(MIN_RECORD_LENGTH, 1 << MAX_RECORD_EXP)
}

fn plausible(order: ByteOrder, buf: &[u8]) -> bool {
    let year = order.u16(&buf[BTIME..]);
    let day = order.u16(&buf[BTIME + 2..]);
    (1900..=2100).contains(&year) && (1..=366).contains(&day)
}

fn detect_order(buf: &[u8]) -> Option<ByteOrder> {
    [ByteOrder::Big, ByteOrder::Little]
        .into_iter()
        .find(|o| plausible(*o, buf))
}

fn decode_btime(order: ByteOrder, b: &[u8]) -> Option<Epoch> {
    let year = order.u16(b);
    let day = order.u16(&b[2..]);
    let (hour, minute, second) = (b[4], b[5], b[6]);
    let fract = order.u16(&b[8..]);
    if hour > 23 || minute > 59 || second > 60 || fract > 9999 {
        return None;
    }
    let midnight = NaiveDate::from_yo_opt(i32::from(year), u32::from(day))?.and_hms_opt(0, 0, 0)?;
    let base = Utc.from_utc_datetime(&midnight).timestamp();
    let secs = base + i64::from(hour) * 3600 + i64::from(minute) * 60 + i64::from(second);
    Some(secs as f64 + f64::from(fract) * 1e-4)
}

pub(crate) struct BtimeFields {
    pub year: u16,
    pub day: u16,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub fract: u16,
}

/// 微秒 → BTIME 字段 + 不足 100µs 的余数（写入 B1001）
pub(crate) fn encode_btime(micros: i64) -> (BtimeFields, i64) {
    let secs = micros.div_euclid(1_000_000);
    let sub = micros.rem_euclid(1_000_000);
    let dt = DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default();
    (
        BtimeFields {
            year: dt.year() as u16,
            day: dt.ordinal() as u16,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
            fract: (sub / 100) as u16,
        },
        sub % 100,
    )
}

/// 名义采样率（因子 / 乘子），同 SEED 约定
fn nominal_rate(factor: i16, multiplier: i16) -> f64 {
    let mut rate = match factor {
        f if f > 0 => f64::from(f),
        f if f < 0 => -1.0 / f64::from(f),
        _ => 0.0,
    };
    if multiplier > 0 {
        rate *= f64::from(multiplier);
    } else if multiplier < 0 {
        rate = -rate / f64::from(multiplier);
    }
    rate
}
