use chrono::{Datelike, NaiveDate, Weekday};

/// Number of Monday–Friday days in `[start, end]`, both bounds included.
///
/// Plain calendar count: public holidays and per-employee schedules are not
/// considered. Returns 0 when `end < start`.
pub fn count_weekdays(start: NaiveDate, end: NaiveDate) -> u32 {
    if end < start {
        return 0;
    }

    let total_days = (end - start).num_days() + 1;
    let full_weeks = total_days / 7;
    let mut count = full_weeks * 5;

    // leftover (< 7) days
    let tail_start = start + chrono::Duration::days(full_weeks * 7);
    count += tail_start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as i64;

    count as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[rstest]
    // Mon 2026-06-01 .. Sun 2026-06-07
    #[case(d(2026, 6, 1), d(2026, 6, 7), 5)]
    // single Saturday
    #[case(d(2026, 6, 6), d(2026, 6, 6), 0)]
    // single Monday
    #[case(d(2026, 6, 1), d(2026, 6, 1), 1)]
    // whole June 2026: 22 weekdays
    #[case(d(2026, 6, 1), d(2026, 6, 30), 22)]
    // February 2026 starts on a Sunday: 20 weekdays
    #[case(d(2026, 2, 1), d(2026, 2, 28), 20)]
    // Fri -> Mon spans a weekend
    #[case(d(2026, 6, 5), d(2026, 6, 8), 2)]
    fn test_count_weekdays(#[case] start: NaiveDate, #[case] end: NaiveDate, #[case] expected: u32) {
        assert_eq!(count_weekdays(start, end), expected);
    }

    #[test]
    fn test_reversed_range_is_empty() {
        assert_eq!(count_weekdays(d(2026, 6, 30), d(2026, 6, 1)), 0);
    }

    #[test]
    fn test_matches_naive_walk_over_a_year() {
        let start = d(2026, 1, 1);
        for offset in 0..366 {
            let end = start + chrono::Duration::days(offset);
            let naive = start
                .iter_days()
                .take_while(|day| *day <= end)
                .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
                .count() as u32;
            assert_eq!(count_weekdays(start, end), naive, "end = {end}");
        }
    }
}
