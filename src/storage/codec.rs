use crate::core::Epoch;
use crate::error::CodecError;
use crate::storage::header::{RecordHeader, MAX_RECORD_EXP};
use crate::storage::steim::{self, Steim};

pub const ENC_INT16: u8 = 1;
pub const ENC_INT32: u8 = 3;
pub const ENC_FLOAT32: u8 = 4;
pub const ENC_FLOAT64: u8 = 5;
pub const ENC_STEIM1: u8 = 10;
pub const ENC_STEIM2: u8 = 11;

/// 记录解码 / 采样级裁剪 / 重编码能力
pub trait RecordCodec: Send + Sync {
    type Series;

    fn decode(&self, raw: &[u8]) -> Result<Self::Series, CodecError>;

    /// 裁剪到半开区间 `[start, end)`
    fn trim(&self, series: Self::Series, start: Epoch, end: Epoch) -> Result<Self::Series, CodecError>;

    /// 空序列编码为空字节
    fn encode(&self, series: &Self::Series) -> Result<Vec<u8>, CodecError>;
}

/// `RecordCodec` 的 object-safe 外观：decode → trim → encode
pub trait RecordTrimmer: Send + Sync {
    fn trim_record(&self, raw: &[u8], start: Epoch, end: Epoch) -> Result<Vec<u8>, CodecError>;
}

impl<C: RecordCodec> RecordTrimmer for C {
    fn trim_record(&self, raw: &[u8], start: Epoch, end: Epoch) -> Result<Vec<u8>, CodecError> {
        let series = self.decode(raw)?;
        let series = self.trim(series, start, end)?;
        self.encode(&series)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Samples {
    Int(Vec<i32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Int(v) => v.len(),
            Samples::Float32(v) => v.len(),
            Samples::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slice(self, range: std::ops::Range<usize>) -> Self {
        match self {
            Samples::Int(v) => Samples::Int(v[range].to_vec()),
            Samples::Float32(v) => Samples::Float32(v[range].to_vec()),
            Samples::Float64(v) => Samples::Float64(v[range].to_vec()),
        }
    }
}

/// 解码后的单条记录：样本 + 原始头部模板（重编码时沿用 blockette）
#[derive(Clone, Debug)]
pub struct DecodedSeries {
    pub start: Epoch,
    pub sample_rate: f64,
    pub samples: Samples,
    pub source_encoding: u8,
    header: RecordHeader,
    template: Vec<u8>,
}

/// miniSEED 2 编解码：INT16/INT32/FLOAT32/FLOAT64/Steim1/Steim2 解码；
/// 整数重编码为 INT32（INT16 源保持 INT16），浮点保持原宽度
#[derive(Clone, Copy, Debug, Default)]
pub struct MseedCodec;

impl RecordCodec for MseedCodec {
    type Series = DecodedSeries;

    fn decode(&self, raw: &[u8]) -> Result<DecodedSeries, CodecError> {
        let header =
            RecordHeader::parse(raw, 0).map_err(|_| CodecError::Header("unparseable record header"))?;
        if raw.len() < header.record_length {
            return Err(CodecError::ShortPayload {
                need: header.record_length,
                have: raw.len(),
            });
        }
        if !header.blockettes_fit() {
            return Err(CodecError::Header("blockettes overlap the data section"));
        }

        let n = header.num_samples;
        let order = header.data_order;
        let data = &raw[header.data_offset..header.record_length];
        let need = |width: usize| {
            if data.len() < n * width {
                Err(CodecError::ShortPayload {
                    need: header.data_offset + n * width,
                    have: header.record_length,
                })
            } else {
                Ok(())
            }
        };

        let samples = match header.encoding {
            ENC_INT16 => {
                need(2)?;
                Samples::Int(data.chunks_exact(2).take(n).map(|b| i32::from(order.i16(b))).collect())
            }
            ENC_INT32 => {
                need(4)?;
                Samples::Int(data.chunks_exact(4).take(n).map(|b| order.i32(b)).collect())
            }
            ENC_FLOAT32 => {
                need(4)?;
                Samples::Float32(
                    data.chunks_exact(4)
                        .take(n)
                        .map(|b| f32::from_bits(order.u32(b)))
                        .collect(),
                )
            }
            ENC_FLOAT64 => {
                need(8)?;
                Samples::Float64(
                    data.chunks_exact(8)
                        .take(n)
                        .map(|b| f64::from_bits(order.u64(b)))
                        .collect(),
                )
            }
            ENC_STEIM1 => Samples::Int(steim::decode(Steim::V1, data, order, n)?),
            ENC_STEIM2 => Samples::Int(steim::decode(Steim::V2, data, order, n)?),
            other => return Err(CodecError::UnsupportedEncoding(other)),
        };

        Ok(DecodedSeries {
            start: header.start_epoch(),
            sample_rate: header.sample_rate,
            samples,
            source_encoding: header.encoding,
            template: raw[..header.data_offset].to_vec(),
            header,
        })
    }

    fn trim(&self, series: DecodedSeries, start: Epoch, end: Epoch) -> Result<DecodedSeries, CodecError> {
        if series.sample_rate <= 0.0 {
            return Ok(series);
        }
        // 保留 t_i ∈ [start, end)，t_i = t0 + i / rate；容差 1µs（秒为单位，再换算成样本数）
        const EPS_SECS: f64 = 1e-6;
        let n = series.samples.len();
        let index_at = |t: Epoch| {
            let x = ((t - series.start - EPS_SECS) * series.sample_rate).ceil();
            x.clamp(0.0, n as f64) as usize
        };
        let first = index_at(start);
        let last = index_at(end).max(first);

        let start = series.start + first as f64 / series.sample_rate;
        Ok(DecodedSeries {
            start,
            samples: series.samples.slice(first..last),
            ..series
        })
    }

    fn encode(&self, series: &DecodedSeries) -> Result<Vec<u8>, CodecError> {
        let n = series.samples.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        let header = &series.header;
        let (encoding, width) = match &series.samples {
            Samples::Int(_) if series.source_encoding == ENC_INT16 => (ENC_INT16, 2),
            Samples::Int(_) => (ENC_INT32, 4),
            Samples::Float32(_) => (ENC_FLOAT32, 4),
            Samples::Float64(_) => (ENC_FLOAT64, 8),
        };

        let need = header.data_offset + n * width;
        let reclen = header.record_length.max(need.next_power_of_two());
        let exp = reclen.trailing_zeros() as u8;
        if exp > MAX_RECORD_EXP || n > usize::from(u16::MAX) {
            return Err(CodecError::RecordTooLarge(need));
        }

        let mut buf = vec![0u8; reclen];
        buf[..header.data_offset].copy_from_slice(&series.template);
        header.write_start(&mut buf, series.start);
        header.write_num_samples(&mut buf, n as u16);
        let order = header.order;
        header.write_layout(&mut buf, encoding, order, exp);

        let data = &mut buf[header.data_offset..];
        match &series.samples {
            Samples::Int(v) if encoding == ENC_INT16 => {
                for (chunk, s) in data.chunks_exact_mut(2).zip(v) {
                    order.put_u16(chunk, *s as i16 as u16);
                }
            }
            Samples::Int(v) => {
                for (chunk, s) in data.chunks_exact_mut(4).zip(v) {
                    order.put_u32(chunk, *s as u32);
                }
            }
            Samples::Float32(v) => {
                for (chunk, s) in data.chunks_exact_mut(4).zip(v) {
                    order.put_u32(chunk, s.to_bits());
                }
            }
            Samples::Float64(v) => {
                for (chunk, s) in data.chunks_exact_mut(8).zip(v) {
                    order.put_u64(chunk, s.to_bits());
                }
            }
        }
        Ok(buf)
    }
}
