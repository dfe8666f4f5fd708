use ahash::AHashMap;

use crate::models::{RangePoint, RangeSeries, SeriesPoint};

/// Pair a low and a high series into a range series.
///
/// Only timestamps present in both inputs are kept (inner join). The output follows
/// `high`'s order. An empty result means "no range to display".
pub fn merge_range(low: &[SeriesPoint], high: &[SeriesPoint]) -> RangeSeries {
    let lookup: AHashMap<i64, f64> = low.iter().map(|p| (p.timestamp, p.value)).collect();
    high.iter()
        .filter_map(|h| {
            lookup.get(&h.timestamp).map(|&low| RangePoint {
                timestamp: h.timestamp,
                low,
                high: h.value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(points: &[(i64, f64)]) -> Vec<SeriesPoint> {
        points.iter().map(|&(t, v)| SeriesPoint::new(t, v)).collect()
    }

    #[test]
    fn keeps_only_shared_timestamps() {
        let low = s(&[(1, 5.0), (2, 7.0)]);
        let high = s(&[(1, 9.0), (3, 11.0)]);
        assert_eq!(
            merge_range(&low, &high),
            vec![RangePoint {
                timestamp: 1,
                low: 5.0,
                high: 9.0
            }]
        );
    }

    #[test]
    fn disjoint_or_empty_inputs_give_empty_range() {
        assert!(merge_range(&s(&[(1, 1.0)]), &s(&[(2, 2.0)])).is_empty());
        assert!(merge_range(&[], &s(&[(2, 2.0)])).is_empty());
        assert!(merge_range(&s(&[(1, 1.0)]), &[]).is_empty());
    }

    #[test]
    fn output_is_bounded_by_shorter_input() {
        let low = s(&[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0)]);
        let high = s(&[(2, 20.0), (4, 40.0), (6, 60.0)]);
        let got = merge_range(&low, &high);
        assert!(got.len() <= low.len().min(high.len()));
        assert_eq!(got.iter().map(|r| r.timestamp).collect::<Vec<_>>(), vec![2, 4]);
        assert!(got.iter().all(|r| r.low * 10.0 == r.high));
    }
}
