//! Daily run times for the scheduler.

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime, TimeZone};

/// First scheduled instant strictly after `now`, looking at most one day ahead.
///
/// Times that do not exist locally (DST gaps) are skipped.
pub fn next_run_after(now: DateTime<Local>, times: &[NaiveTime]) -> Option<DateTime<Local>> {
    let today = now.date_naive();
    [today, today + ChronoDuration::days(1)]
        .into_iter()
        .flat_map(|date| {
            times
                .iter()
                .filter_map(move |time| Local.from_local_datetime(&date.and_time(*time)).earliest())
        })
        .filter(|candidate| *candidate > now)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn local(h: u32, m: u32) -> DateTime<Local> {
        let naive = NaiveDate::from_ymd_opt(2026, 5, 12)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap();
        Local.from_local_datetime(&naive).earliest().unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_picks_next_time_today() {
        let times = [t(8, 0), t(12, 0), t(18, 0)];
        assert_eq!(next_run_after(local(9, 30), &times), Some(local(12, 0)));
        // exact match moves on to the following slot
        assert_eq!(next_run_after(local(12, 0), &times), Some(local(18, 0)));
    }

    #[test]
    fn test_wraps_to_tomorrow() {
        let next = next_run_after(local(21, 0), &[t(8, 0), t(18, 0)]).unwrap();
        assert_eq!(next, local(8, 0) + ChronoDuration::days(1));
    }

    #[test]
    fn test_no_times_means_no_run() {
        assert_eq!(next_run_after(local(9, 0), &[]), None);
    }
}
