use crate::error::CodecError;
use crate::storage::header::ByteOrder;

const FRAME_BYTES: usize = 64;
const WORDS_PER_FRAME: usize = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Steim {
    V1,
    V2,
}

/// 解码 Steim1/Steim2 帧序列为 `n` 个整数样本。
///
/// 第 0 帧的 w1/w2 是正向/反向积分常数 X0/Xn；第一个差分相对于上一条记录，解码时丢弃。
pub fn decode(version: Steim, data: &[u8], order: ByteOrder, n: usize) -> Result<Vec<i32>, CodecError> {
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut diffs: Vec<i32> = Vec::with_capacity(n + 8);
    let mut x0 = None;
    let mut xn = 0i32;

    'frames: for (fi, frame) in data.chunks_exact(FRAME_BYTES).enumerate() {
        let nibbles = order.u32(frame);
        for w in 1..WORDS_PER_FRAME {
            let word = order.u32(&frame[w * 4..]);
            if fi == 0 && w == 1 {
                x0 = Some(word as i32);
                continue;
            }
            if fi == 0 && w == 2 {
                xn = word as i32;
                continue;
            }
            let code = (nibbles >> (30 - 2 * w)) & 0b11;
            match version {
                Steim::V1 => unpack_v1(code, word, &mut diffs),
                Steim::V2 => unpack_v2(code, word, &mut diffs)?,
            }
            if diffs.len() >= n {
                break 'frames;
            }
        }
    }

    let x0 = x0.ok_or(CodecError::Steim("no frames in payload"))?;
    if diffs.len() < n {
        return Err(CodecError::Steim("fewer differences than samples"));
    }

    let mut samples = Vec::with_capacity(n);
    samples.push(x0);
    for d in &diffs[1..n] {
        let prev = samples[samples.len() - 1];
        samples.push(i32::wrapping_add(prev, *d));
    }

    if samples[n - 1] != xn {
        tracing::warn!(
            "Steim integrity check failed: last sample {} != Xn {}",
            samples[n - 1],
            xn
        );
    }
    Ok(samples)
}

fn sext(v: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((v << shift) as i32) >> shift
}

fn push_fields(word: u32, bits: u32, count: u32, out: &mut Vec<i32>) {
    let mask = (1u32 << bits) - 1;
    for k in (0..count).rev() {
        out.push(sext((word >> (k * bits)) & mask, bits));
    }
}

fn unpack_v1(code: u32, word: u32, out: &mut Vec<i32>) {
    match code {
        1 => push_fields(word, 8, 4, out),
        2 => push_fields(word, 16, 2, out),
        3 => out.push(word as i32),
        _ => {}
    }
}

fn unpack_v2(code: u32, word: u32, out: &mut Vec<i32>) -> Result<(), CodecError> {
    let dnib = word >> 30;
    match (code, dnib) {
        (0, _) => {}
        (1, _) => push_fields(word, 8, 4, out),
        (2, 1) => push_fields(word, 30, 1, out),
        (2, 2) => push_fields(word, 15, 2, out),
        (2, 3) => push_fields(word, 10, 3, out),
        (3, 0) => push_fields(word, 6, 5, out),
        (3, 1) => push_fields(word, 5, 6, out),
        (3, 2) => push_fields(word, 4, 7, out),
        _ => return Err(CodecError::Steim("invalid steim2 sub-code")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(words: [u32; 16]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn steim1_mixed_widths() {
        // w3: 四个 8 位差分；w4: 两个 16 位；w5: 一个 32 位
        let nibbles = (1u32 << (30 - 6)) | (2u32 << (30 - 8)) | (3u32 << (30 - 10));
        let mut words = [0u32; 16];
        words[0] = nibbles;
        words[1] = 10; // X0
        words[3] = u32::from_be_bytes([0x00, 0x01, 0xFE, 0x03]); // 0, 1, -2, 3
        words[4] = ((300u32) << 16) | (0xFFFFu32 & (-5i16 as u16 as u32)); // 300, -5
        words[5] = 100_000;
        // 10, 11, 9, 12, 312, 307, 100307
        words[2] = 100_307; // Xn
        let out = decode(Steim::V1, &frame(words), ByteOrder::Big, 7).unwrap();
        assert_eq!(out, vec![10, 11, 9, 12, 312, 307, 100_307]);
    }

    #[test]
    fn steim2_sub_codes() {
        let nibbles = (2u32 << (30 - 6)) | (3u32 << (30 - 8)) | (2u32 << (30 - 10));
        let mut words = [0u32; 16];
        words[0] = nibbles;
        words[1] = 0;
        // w3: dnib=3，三个 10 位：[ignored 0], 5, -3
        words[3] = (3u32 << 30) | (0 << 20) | (5 << 10) | (0x3FF & (-3i32 as u32));
        // w4: dnib=2，七个 4 位：1..7
        words[4] = (2u32 << 30) | (1 << 24) | (2 << 20) | (3 << 16) | (4 << 12) | (5 << 8) | (6 << 4) | 7;
        // w5: dnib=1，一个 30 位：-1000
        words[5] = (1u32 << 30) | (0x3FFF_FFFF & (-1000i32 as u32));
        // 0, 5, 2, 3, 5, 8, 12, 17, 23, 30, -970
        words[2] = (-970i32) as u32;
        let out = decode(Steim::V2, &frame(words), ByteOrder::Big, 11).unwrap();
        assert_eq!(out, vec![0, 5, 2, 3, 5, 8, 12, 17, 23, 30, -970]);
    }

    #[test]
    fn short_payload_is_an_error() {
        let mut words = [0u32; 16];
        words[0] = 3u32 << (30 - 6);
        words[3] = 1;
        assert!(decode(Steim::V1, &frame(words), ByteOrder::Big, 5).is_err());
    }
}
