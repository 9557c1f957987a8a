use chrono::{
    DateTime, Datelike as _, Local, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime,
    Weekday,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "freq", rename_all = "snake_case")]
pub enum Frequency {
    Weekly { weekday: Weekday },
    Monthly,
}

/// Recurrence rule carried by every occurrence of a recurring lesson.
/// `until` is an inclusive date bound.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Recurrence {
    pub frequency: Frequency,
    pub until: NaiveDate,
}

impl Recurrence {
    pub fn weekly(weekday: Weekday, until: NaiveDate) -> Recurrence {
        Recurrence {
            frequency: Frequency::Weekly { weekday },
            until,
        }
    }

    pub fn monthly(until: NaiveDate) -> Recurrence {
        Recurrence {
            frequency: Frequency::Monthly,
            until,
        }
    }

    /// Expands the rule into occurrence start times. The sequence is finite
    /// and a pure function of the rule and the anchor, so it can be walked
    /// any number of times.
    ///
    /// Weekly rules whose anchor falls on the wrong weekday are shifted
    /// forward day by day until the weekday matches. Monthly rules keep the
    /// anchor's day of month; a shorter target month clamps to its last day
    /// without losing the anchor, so a lesson on the 31st falls on Feb 29
    /// and returns to Mar 31.
    ///
    /// Stepping works on the local calendar, not on absolute time: every
    /// occurrence keeps the anchor's wall-clock time even when the series
    /// crosses a daylight-saving change.
    pub fn occurrences(&self, first: DateTime<Local>) -> Occurrences {
        let anchor = match self.frequency {
            Frequency::Weekly { weekday } => {
                let mut aligned = first.date_naive();
                while aligned.weekday() != weekday {
                    aligned = aligned + chrono::Duration::days(1);
                }
                aligned
            }
            Frequency::Monthly => first.date_naive(),
        };

        Occurrences {
            recurrence: *self,
            anchor,
            time: first.time(),
            step: 0,
        }
    }
}

pub struct Occurrences {
    recurrence: Recurrence,
    anchor: NaiveDate,
    time: NaiveTime,
    step: u32,
}

impl Iterator for Occurrences {
    type Item = DateTime<Local>;

    fn next(&mut self) -> Option<DateTime<Local>> {
        let date = match self.recurrence.frequency {
            Frequency::Weekly { .. } => self.anchor + chrono::Duration::weeks(self.step as i64),
            Frequency::Monthly => self.anchor.checked_add_months(Months::new(self.step))?,
        };

        if date > self.recurrence.until {
            return None;
        }

        self.step += 1;
        Some(resolve_local(date.and_time(self.time)))
    }
}

/// A stepped wall-clock time can fall inside a clock-change gap; move it
/// forward to the first instant that exists. An ambiguous repeated hour
/// resolves to its earlier side.
fn resolve_local(mut naive: NaiveDateTime) -> DateTime<Local> {
    loop {
        match naive.and_local_timezone(Local) {
            LocalResult::Single(at) => return at,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => naive = naive + chrono::Duration::hours(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike as _, TimeZone as _};

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, 0, 0).single().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekly_expansion() {
        // 2024-01-01 is a Monday
        let rule = Recurrence::weekly(Weekday::Mon, date(2024, 1, 22));
        let occurrences: Vec<_> = rule.occurrences(at(2024, 1, 1, 14)).collect();

        assert_eq!(
            occurrences,
            vec![
                at(2024, 1, 1, 14),
                at(2024, 1, 8, 14),
                at(2024, 1, 15, 14),
                at(2024, 1, 22, 14),
            ]
        );
    }

    #[test]
    fn test_weekly_aligns_anchor_to_weekday() {
        // anchor is a Monday, rule wants Wednesdays
        let rule = Recurrence::weekly(Weekday::Wed, date(2024, 1, 10));
        let occurrences: Vec<_> = rule.occurrences(at(2024, 1, 1, 9)).collect();

        assert_eq!(occurrences, vec![at(2024, 1, 3, 9), at(2024, 1, 10, 9)]);
    }

    #[test]
    fn test_end_before_start_is_empty() {
        let rule = Recurrence::weekly(Weekday::Mon, date(2023, 12, 25));
        assert_eq!(rule.occurrences(at(2024, 1, 1, 14)).count(), 0);

        let rule = Recurrence::monthly(date(2023, 12, 31));
        assert_eq!(rule.occurrences(at(2024, 1, 1, 14)).count(), 0);
    }

    #[test]
    fn test_end_on_first_occurrence() {
        let rule = Recurrence::weekly(Weekday::Mon, date(2024, 1, 1));
        let occurrences: Vec<_> = rule.occurrences(at(2024, 1, 1, 14)).collect();

        assert_eq!(occurrences, vec![at(2024, 1, 1, 14)]);
    }

    #[test]
    fn test_monthly_expansion() {
        let rule = Recurrence::monthly(date(2024, 4, 15));
        let occurrences: Vec<_> = rule.occurrences(at(2024, 1, 15, 10)).collect();

        assert_eq!(
            occurrences,
            vec![
                at(2024, 1, 15, 10),
                at(2024, 2, 15, 10),
                at(2024, 3, 15, 10),
                at(2024, 4, 15, 10),
            ]
        );
    }

    #[test]
    fn test_monthly_clamps_short_months_and_keeps_anchor() {
        let rule = Recurrence::monthly(date(2024, 5, 31));
        let occurrences: Vec<_> = rule.occurrences(at(2024, 1, 31, 10)).collect();

        assert_eq!(
            occurrences,
            vec![
                at(2024, 1, 31, 10),
                at(2024, 2, 29, 10),
                at(2024, 3, 31, 10),
                at(2024, 4, 30, 10),
                at(2024, 5, 31, 10),
            ]
        );
    }

    #[test]
    fn test_weekly_keeps_weekday_and_time_across_clock_changes() {
        // a full year of Fridays spans both daylight-saving changes in
        // zones that observe them
        let rule = Recurrence::weekly(Weekday::Fri, date(2024, 12, 27));
        let occurrences: Vec<_> = rule.occurrences(at(2024, 1, 5, 0)).collect();

        assert_eq!(occurrences.len(), 52);
        for occurrence in occurrences {
            assert_eq!(occurrence.weekday(), Weekday::Fri);
            assert_eq!(occurrence.time(), at(2024, 1, 5, 0).time());
        }
    }

    #[test]
    fn test_monthly_series_survives_clock_changes() {
        // 02:30 does not exist on a spring-forward day; the series must
        // keep going instead of ending there
        let rule = Recurrence::monthly(date(2024, 12, 10));
        let start = Local
            .with_ymd_and_hms(2024, 1, 10, 2, 30, 0)
            .single()
            .unwrap();
        let occurrences: Vec<_> = rule.occurrences(start).collect();

        assert_eq!(occurrences.len(), 12);
        for occurrence in occurrences {
            assert_eq!(occurrence.day(), 10);
        }
    }

    #[test]
    fn test_expansion_is_restartable() {
        let rule = Recurrence::weekly(Weekday::Fri, date(2024, 3, 1));
        let first: Vec<_> = rule.occurrences(at(2024, 1, 1, 16)).collect();
        let second: Vec<_> = rule.occurrences(at(2024, 1, 1, 16)).collect();

        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}
