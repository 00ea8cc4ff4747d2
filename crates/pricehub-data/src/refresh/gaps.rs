//! 누락 구간 계산.
//!
//! 심볼의 로컬 저장 범위 [min, max]와 요청 범위 [from, to]를 비교해
//! 업스트림에서 가져와야 하는 최소한의 구간을 계산합니다.
//! 모든 날짜 연산은 달력 날짜(하루) 단위입니다.

use chrono::Days;

use pricehub_core::{RefreshWindow, TradeDateBounds};

/// 업스트림 전송에 안전한 형태로 구간을 정규화합니다.
///
/// 업스트림 차트 질의는 시작과 끝이 같은 시점으로 해석되는 구간을
/// 거부하므로, `to_date <= from_date`면 끝을 하루 늘립니다.
pub fn normalize_window_for_fetch(window: RefreshWindow) -> RefreshWindow {
    if window.to_date > window.from_date {
        return window;
    }

    RefreshWindow {
        from_date: window.from_date,
        to_date: window
            .to_date
            .checked_add_days(Days::new(1))
            .unwrap_or(window.to_date),
    }
}

/// 요청 범위의 꼬리(마지막 저장 거래일 이후) 누락 구간을 계산합니다.
///
/// 백그라운드 갱신 경로에서 사용합니다. 반환되는 구간은 항상
/// 정규화되어 있습니다.
pub fn missing_tail_window(
    request_from: chrono::NaiveDate,
    request_to: chrono::NaiveDate,
    bounds: Option<&TradeDateBounds>,
) -> Option<RefreshWindow> {
    if request_from > request_to {
        return None;
    }

    let window = match bounds {
        // 로컬 데이터가 전혀 없으면 요청 범위 전체
        None => RefreshWindow {
            from_date: request_from,
            to_date: request_to,
        },
        Some(bounds) => {
            if bounds.max_trade_date >= request_to {
                return None;
            }
            let gap_start = bounds.max_trade_date.checked_add_days(Days::new(1))?;
            if gap_start > request_to {
                return None;
            }
            RefreshWindow {
                from_date: gap_start,
                to_date: request_to,
            }
        }
    };

    Some(normalize_window_for_fetch(window))
}

/// 요청 범위의 선행+후행 누락 구간을 계산합니다 (선행 구간 먼저).
///
/// 최초 적재용 동기 하이드레이션 경로에서 사용합니다. 반환 구간은
/// 호출자가 전송 직전에 [`normalize_window_for_fetch`]로 정규화합니다.
pub fn missing_windows_for_range(
    request_from: chrono::NaiveDate,
    request_to: chrono::NaiveDate,
    bounds: Option<&TradeDateBounds>,
) -> Vec<RefreshWindow> {
    if request_from > request_to {
        return Vec::new();
    }

    let Some(bounds) = bounds else {
        return vec![RefreshWindow {
            from_date: request_from,
            to_date: request_to,
        }];
    };

    let mut windows = Vec::new();

    if request_from < bounds.min_trade_date {
        if let Some(gap_end) = bounds.min_trade_date.checked_sub_days(Days::new(1)) {
            if request_from <= gap_end {
                windows.push(RefreshWindow {
                    from_date: request_from,
                    to_date: gap_end,
                });
            }
        }
    }

    if bounds.max_trade_date < request_to {
        if let Some(gap_start) = bounds.max_trade_date.checked_add_days(Days::new(1)) {
            if gap_start <= request_to {
                windows.push(RefreshWindow {
                    from_date: gap_start,
                    to_date: request_to,
                });
            }
        }
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn d(key: &str) -> NaiveDate {
        NaiveDate::parse_from_str(key, "%Y-%m-%d").unwrap()
    }

    fn bounds(min: &str, max: &str) -> TradeDateBounds {
        TradeDateBounds {
            symbol: "TEST".to_string(),
            min_trade_date: d(min),
            max_trade_date: d(max),
        }
    }

    #[test]
    fn test_tail_window_none_when_covered() {
        let b = bounds("2024-01-01", "2024-03-01");
        assert_eq!(
            missing_tail_window(d("2024-01-01"), d("2024-03-01"), Some(&b)),
            None
        );
        assert_eq!(
            missing_tail_window(d("2024-01-01"), d("2024-02-15"), Some(&b)),
            None
        );
    }

    #[test]
    fn test_tail_window_without_bounds_is_whole_range() {
        assert_eq!(
            missing_tail_window(d("2024-01-01"), d("2024-02-01"), None),
            Some(RefreshWindow {
                from_date: d("2024-01-01"),
                to_date: d("2024-02-01"),
            })
        );
    }

    #[test]
    fn test_tail_window_without_bounds_single_day_is_expanded() {
        assert_eq!(
            missing_tail_window(d("2024-02-01"), d("2024-02-01"), None),
            Some(RefreshWindow {
                from_date: d("2024-02-01"),
                to_date: d("2024-02-02"),
            })
        );
    }

    #[test]
    fn test_tail_window_starts_after_local_max() {
        let b = bounds("2024-01-01", "2024-02-10");
        assert_eq!(
            missing_tail_window(d("2024-01-01"), d("2024-03-01"), Some(&b)),
            Some(RefreshWindow {
                from_date: d("2024-02-11"),
                to_date: d("2024-03-01"),
            })
        );
    }

    #[test]
    fn test_tail_window_one_day_gap_is_expanded() {
        // 마지막 저장일이 요청 끝의 하루 전이면 {to, to+1}로 확장된다
        let b = bounds("2024-01-01", "2024-02-29");
        assert_eq!(
            missing_tail_window(d("2024-01-01"), d("2024-03-01"), Some(&b)),
            Some(RefreshWindow {
                from_date: d("2024-03-01"),
                to_date: d("2024-03-02"),
            })
        );
    }

    #[test]
    fn test_tail_window_invalid_request() {
        assert_eq!(missing_tail_window(d("2024-03-01"), d("2024-01-01"), None), None);
    }

    #[test]
    fn test_range_windows_without_bounds() {
        let windows = missing_windows_for_range(d("2024-01-01"), d("2024-02-01"), None);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].from_date, d("2024-01-01"));
        assert_eq!(windows[0].to_date, d("2024-02-01"));
    }

    #[test]
    fn test_range_windows_front_and_tail() {
        let b = bounds("2024-02-01", "2024-02-20");
        let windows = missing_windows_for_range(d("2024-01-15"), d("2024-03-01"), Some(&b));
        assert_eq!(
            windows,
            vec![
                RefreshWindow {
                    from_date: d("2024-01-15"),
                    to_date: d("2024-01-31"),
                },
                RefreshWindow {
                    from_date: d("2024-02-21"),
                    to_date: d("2024-03-01"),
                },
            ]
        );
    }

    #[test]
    fn test_range_windows_fully_covered() {
        let b = bounds("2024-01-01", "2024-03-01");
        assert!(missing_windows_for_range(d("2024-01-15"), d("2024-02-15"), Some(&b)).is_empty());
    }

    #[test]
    fn test_range_windows_front_only() {
        let b = bounds("2024-02-01", "2024-03-01");
        let windows = missing_windows_for_range(d("2024-01-01"), d("2024-02-15"), Some(&b));
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].to_date, d("2024-01-31"));
    }

    proptest! {
        /// 정규화된 꼬리 구간은 항상 전송 가능한 형태다 (to > from).
        #[test]
        fn prop_tail_window_is_strictly_non_empty(
            from_offset in 0i64..3650,
            len in 0i64..3650,
            max_offset in -400i64..400,
        ) {
            let base = d("2015-01-01");
            let request_from = base + Days::new(from_offset as u64);
            let request_to = request_from + Days::new(len as u64);
            let local_max = if max_offset >= 0 {
                request_to.checked_add_days(Days::new(max_offset as u64)).unwrap()
            } else {
                request_to.checked_sub_days(Days::new((-max_offset) as u64)).unwrap()
            };
            let local_min = local_max.checked_sub_days(Days::new(30)).unwrap();
            let b = TradeDateBounds {
                symbol: "TEST".to_string(),
                min_trade_date: local_min,
                max_trade_date: local_max,
            };

            if let Some(window) = missing_tail_window(request_from, request_to, Some(&b)) {
                prop_assert!(window.to_date > window.from_date);
                prop_assert!(window.from_date > b.max_trade_date);
            } else {
                // 구간이 없다는 것은 로컬 데이터가 요청 끝을 덮거나
                // 요청 자체가 비어 있다는 뜻이다
                prop_assert!(b.max_trade_date >= request_to || request_from > request_to);
            }
        }

        /// 선행/후행 구간은 로컬 저장 범위와 겹치지 않는다.
        #[test]
        fn prop_range_windows_do_not_overlap_bounds(
            from_offset in 0i64..3650,
            len in 0i64..3650,
            min_offset in 0i64..400,
            span in 0i64..400,
        ) {
            let base = d("2015-01-01");
            let request_from = base + Days::new(from_offset as u64);
            let request_to = request_from + Days::new(len as u64);
            let local_min = base + Days::new(min_offset as u64);
            let local_max = local_min + Days::new(span as u64);
            let b = TradeDateBounds {
                symbol: "TEST".to_string(),
                min_trade_date: local_min,
                max_trade_date: local_max,
            };

            let windows = missing_windows_for_range(request_from, request_to, Some(&b));
            prop_assert!(windows.len() <= 2);
            for window in windows {
                prop_assert!(window.from_date <= window.to_date);
                // 로컬 저장 범위 내부와 겹치지 않는다
                prop_assert!(
                    window.to_date < local_min || window.from_date > local_max
                );
            }
        }
    }
}
