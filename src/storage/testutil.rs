//! 测试用：合成 miniSEED 2 记录

use std::path::PathBuf;

use crate::storage::header::{encode_btime, ByteOrder};

pub use crate::storage::codec::{ENC_FLOAT64, ENC_INT16, ENC_INT32, ENC_STEIM1};

pub struct RecordSpec {
    pub start: f64,
    /// 整数 Hz 或 1/整数 Hz
    pub sample_rate: f64,
    pub samples: Vec<i32>,
    pub encoding: u8,
    pub order: ByteOrder,
    pub record_exp: u8,
    /// 0.0001 秒单位，未应用
    pub time_correction: i32,
    pub sequence: u32,
}

impl Default for RecordSpec {
    fn default() -> Self {
        Self {
            start: 1_577_836_800.0,
            sample_rate: 1.0,
            samples: (0..10).collect(),
            encoding: ENC_INT32,
            order: ByteOrder::Big,
            record_exp: 9,
            time_correction: 0,
            sequence: 1,
        }
    }
}

const DATA_OFFSET: usize = 64;

pub fn mk_record(spec: &RecordSpec) -> Vec<u8> {
    let reclen = 1usize << spec.record_exp;
    let o = spec.order;
    let mut buf = vec![0u8; reclen];

    buf[0..6].copy_from_slice(format!("{:06}", spec.sequence % 1_000_000).as_bytes());
    buf[6] = b'D';
    buf[7] = b' ';
    buf[8..13].copy_from_slice(b"TEST ");
    buf[13..15].copy_from_slice(b"00");
    buf[15..18].copy_from_slice(b"BHZ");
    buf[18..20].copy_from_slice(b"XX");

    let micros = (spec.start * 1e6).round() as i64;
    let (t, residual) = encode_btime(micros);
    o.put_u16(&mut buf[20..], t.year);
    o.put_u16(&mut buf[22..], t.day);
    buf[24] = t.hour;
    buf[25] = t.minute;
    buf[26] = t.second;
    o.put_u16(&mut buf[28..], t.fract);

    o.put_u16(&mut buf[30..], spec.samples.len() as u16);
    let (factor, mult): (i16, i16) = if spec.sample_rate >= 1.0 || spec.sample_rate == 0.0 {
        (spec.sample_rate as i16, 1)
    } else {
        (-((1.0 / spec.sample_rate).round() as i16), 1)
    };
    o.put_u16(&mut buf[32..], factor as u16);
    o.put_u16(&mut buf[34..], mult as u16);
    buf[39] = 2;
    o.put_u32(&mut buf[40..], spec.time_correction as u32);
    o.put_u16(&mut buf[44..], DATA_OFFSET as u16);
    o.put_u16(&mut buf[46..], 48);

    // B1000 @48 → B1001 @56
    o.put_u16(&mut buf[48..], 1000);
    o.put_u16(&mut buf[50..], 56);
    buf[52] = spec.encoding;
    buf[53] = u8::from(o == ByteOrder::Big);
    buf[54] = spec.record_exp;
    o.put_u16(&mut buf[56..], 1001);
    o.put_u16(&mut buf[58..], 0);
    buf[61] = residual as u8;

    let data = &mut buf[DATA_OFFSET..];
    match spec.encoding {
        ENC_INT16 => {
            for (i, v) in spec.samples.iter().enumerate() {
                o.put_u16(&mut data[i * 2..], *v as i16 as u16);
            }
        }
        ENC_INT32 => {
            for (i, v) in spec.samples.iter().enumerate() {
                o.put_u32(&mut data[i * 4..], *v as u32);
            }
        }
        ENC_FLOAT64 => {
            for (i, v) in spec.samples.iter().enumerate() {
                o.put_u64(&mut data[i * 8..], f64::from(*v).to_bits());
            }
        }
        ENC_STEIM1 => write_steim1(data, o, &spec.samples),
        other => panic!("testutil cannot encode {other}"),
    }
    buf
}

/// 简单 Steim1 编码：能装 4×8 位就装，否则 2×16 位，否则 1×32 位
fn write_steim1(data: &mut [u8], o: ByteOrder, samples: &[i32]) {
    let mut diffs = vec![0i32];
    diffs.extend(samples.windows(2).map(|w| w[1].wrapping_sub(w[0])));

    let mut words: Vec<(u32, u32)> = Vec::new();
    let mut i = 0;
    while i < diffs.len() {
        let rest = &diffs[i..];
        let fits = |n: usize, lo: i32, hi: i32| rest.len() >= n && rest[..n].iter().all(|d| (lo..=hi).contains(d));
        if fits(4, -128, 127) {
            let w = rest[..4]
                .iter()
                .fold(0u32, |acc, d| (acc << 8) | (*d as u8 as u32));
            words.push((1, w));
            i += 4;
        } else if fits(2, -32768, 32767) {
            let w = ((rest[0] as u16 as u32) << 16) | (rest[1] as u16 as u32);
            words.push((2, w));
            i += 2;
        } else {
            words.push((3, rest[0] as u32));
            i += 1;
        }
    }

    let mut words = words.into_iter().peekable();
    let mut fi = 0;
    loop {
        let frame = &mut data[fi * 64..(fi + 1) * 64];
        let mut nibbles = 0u32;
        let first = if fi == 0 {
            o.put_u32(&mut frame[4..], samples.first().copied().unwrap_or(0) as u32);
            o.put_u32(&mut frame[8..], samples.last().copied().unwrap_or(0) as u32);
            3
        } else {
            1
        };
        for w in first..16 {
            let Some((code, word)) = words.next() else {
                break;
            };
            nibbles |= code << (30 - 2 * w);
            o.put_u32(&mut frame[w * 4..], word);
        }
        o.put_u32(frame, nibbles);
        if words.peek().is_none() {
            break;
        }
        fi += 1;
    }
}

pub fn unique_tmp_dir(tag: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("mseed-extract-{}-{}", tag, nanos));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
