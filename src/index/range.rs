use crate::core::{Checkpoint, Epoch, IndexRow};
use crate::error::IndexError;

/// 区间一端：时间、字节偏移，以及该端是否落在块内部（需逐记录扫描细化）
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RangeEndpoint {
    pub time: Epoch,
    pub offset: u64,
    pub needs_refinement: bool,
}

impl RangeEndpoint {
    fn at(point: Checkpoint, needs_refinement: bool) -> Self {
        Self {
            time: point.time,
            offset: point.offset,
            needs_refinement,
        }
    }
}

/// 覆盖请求窗口的最小字节区间。约定 `start.offset <= end.offset`
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ResolvedRange {
    pub start: RangeEndpoint,
    pub end: RangeEndpoint,
}

impl ResolvedRange {
    pub fn byte_len(&self) -> u64 {
        self.end.offset.saturating_sub(self.start.offset)
    }

    pub fn needs_refinement(&self) -> bool {
        self.start.needs_refinement || self.end.needs_refinement
    }
}

/// 用行内时间索引把 `[start, end)` 映射到字节区间。
///
/// 请求未完整覆盖块时二分查找：
/// - 起点取时间 `<= start` 的最右条目（没有则取 0）
/// - 终点取时间 `> end` 的最左条目（越界则取最后一条，末尾哨兵按块结束解析）
pub fn resolve(start: Epoch, end: Epoch, row: &IndexRow) -> Result<ResolvedRange, IndexError> {
    let block_start = row.block_start();
    let block_end = row.block_end();

    let trim_start = start > row.block_start_time;
    let trim_end = end < row.block_end_time;
    if !trim_start && !trim_end {
        return Ok(ResolvedRange {
            start: RangeEndpoint::at(block_start, false),
            end: RangeEndpoint::at(block_end, false),
        });
    }

    let tix = &row.time_index;
    if tix.is_empty() {
        return Err(IndexError::EmptyTimeIndex);
    }
    let n = tix.resolved_len();

    let s_index = tix
        .partition_point(block_end, |c| c.time <= start)
        .saturating_sub(1);
    let e_index = tix
        .partition_point(block_end, |c| c.time <= end)
        .min(n - 1);

    let (Some(s), Some(e)) = (tix.get(s_index, block_end), tix.get(e_index, block_end)) else {
        return Err(IndexError::EmptyTimeIndex);
    };

    // 非法索引（偏移倒序）下也维持 start <= end
    let e = if e.offset < s.offset { s } else { e };

    Ok(ResolvedRange {
        start: RangeEndpoint::at(s, trim_start),
        end: RangeEndpoint::at(e, trim_end),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TimeIndex;

    fn mk_row(time_index: &str) -> IndexRow {
        IndexRow {
            network: "XX".into(),
            station: "TEST".into(),
            location: "".into(),
            channel: "BHZ".into(),
            sample_rate: 20.0,
            block_start_offset: 1000,
            block_length: 500,
            block_start_time: 100.0,
            block_end_time: 110.0,
            time_index: time_index.parse::<TimeIndex>().unwrap(),
            file_name: "/nonexistent".into(),
            requested_start_time: 100.0,
            requested_end_time: 110.0,
        }
    }

    #[test]
    fn interior_window_refines_both_ends() {
        let row = mk_row("100.0=>1000,105.0=>1200,latest=>0");
        let r = resolve(102.0, 108.0, &row).unwrap();
        assert_eq!(
            r.start,
            RangeEndpoint {
                time: 100.0,
                offset: 1000,
                needs_refinement: true
            }
        );
        assert_eq!(
            r.end,
            RangeEndpoint {
                time: 110.0,
                offset: 1500,
                needs_refinement: true
            }
        );
        assert!(r.needs_refinement());
        assert_eq!(r.byte_len(), 500);
    }

    #[test]
    fn full_block_uses_block_bounds() {
        let row = mk_row("100.0=>1000,105.0=>1200,latest=>0");
        for (s, e) in [(100.0, 110.0), (50.0, 200.0), (100.0, 110.5)] {
            let r = resolve(s, e, &row).unwrap();
            assert_eq!(r.start.offset, 1000);
            assert_eq!(r.end.offset, 1500);
            assert!(!r.needs_refinement());
        }
    }

    #[test]
    fn end_picks_first_checkpoint_after_request() {
        let row = mk_row("100.0=>1000,103.0=>1100,105.0=>1200,107.0=>1300,latest=>0");
        let r = resolve(103.5, 104.0, &row).unwrap();
        assert_eq!((r.start.time, r.start.offset), (103.0, 1100));
        assert_eq!((r.end.time, r.end.offset), (105.0, 1200));

        // 恰好落在检查点上：起点取该点，终点取下一个
        let r = resolve(105.0, 105.0, &row).unwrap();
        assert_eq!(r.start.offset, 1200);
        assert_eq!(r.end.offset, 1300);
    }

    #[test]
    fn only_one_end_refined() {
        let row = mk_row("100.0=>1000,105.0=>1200,latest=>0");
        let r = resolve(100.0, 104.0, &row).unwrap();
        assert!(!r.start.needs_refinement);
        assert!(r.end.needs_refinement);
        assert_eq!((r.start.offset, r.end.offset), (1000, 1200));

        let r = resolve(106.0, 120.0, &row).unwrap();
        assert!(r.start.needs_refinement);
        assert!(!r.end.needs_refinement);
        assert_eq!((r.start.offset, r.end.offset), (1200, 1500));
    }

    #[test]
    fn clamps_without_sentinel() {
        let row = mk_row("100.0=>1000,105.0=>1200");
        let r = resolve(106.0, 109.0, &row).unwrap();
        // 没有哨兵：终点夹到最后一条
        assert_eq!((r.start.offset, r.end.offset), (1200, 1200));
        assert_eq!(r.byte_len(), 0);
    }

    #[test]
    fn window_before_block_start_clamps_to_first() {
        let row = mk_row("100.0=>1000,105.0=>1200,latest=>0");
        let r = resolve(90.0, 95.0, &row).unwrap();
        assert_eq!((r.start.offset, r.end.offset), (1000, 1000));
        assert!(!r.start.needs_refinement);
        assert!(r.end.needs_refinement);
    }

    #[test]
    fn empty_index_is_an_error_only_when_trimming() {
        let row = mk_row("");
        assert!(resolve(100.0, 110.0, &row).is_ok());
        assert!(matches!(
            resolve(101.0, 109.0, &row),
            Err(IndexError::EmptyTimeIndex)
        ));
    }

    #[test]
    fn large_index_lookup() {
        let entries: Vec<String> = (0..10_000)
            .map(|i| format!("{}=>{}", 100.0 + i as f64 * 0.001, 1000 + i * 4))
            .collect();
        let mut row = mk_row(&entries.join(","));
        row.block_length = 40_000;
        let r = resolve(104.0005, 105.0005, &row).unwrap();
        assert_eq!(r.start.offset, 1000 + 4000 * 4);
        assert_eq!(r.end.offset, 1000 + 5001 * 4);
    }
}
