//! Urgency classification for the todo feed.
//!
//! This module is a pure function of `(scheduledFor, completed, canStartNow, now)`
//! plus a policy. It holds no state and performs no I/O, so the store can
//! re-run it on every fetch and every optimistic write.

use chrono::{DateTime, Days, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use super::todo::{Schedule, Todo};

/// Urgency tier, ordered by display priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Overdue,
    Now,
    Upcoming,
    #[default]
    Later,
}

impl Urgency {
    /// Sort rank: overdue(0) < now(1) < upcoming(2) < later(3).
    pub fn rank(self) -> u8 {
        match self {
            Urgency::Overdue => 0,
            Urgency::Now => 1,
            Urgency::Upcoming => 2,
            Urgency::Later => 3,
        }
    }

    pub fn is_urgent(self) -> bool {
        matches!(self, Urgency::Overdue | Urgency::Now)
    }
}

/// Result of classifying one todo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub urgency: Urgency,
    pub is_overdue: bool,
}

/// Window boundaries for the urgency tiers.
///
/// Rules, in order:
/// 1. completed -> `later`, never overdue
/// 2. unscheduled -> `now` when `canStartNow`, otherwise `later`
/// 3. day-only schedule `d`: `d < today` overdue, `d == today` now,
///    `d <= today + upcoming_horizon_days` upcoming, else later
/// 4. timed schedule `t`: `t + overdue_grace < now` overdue;
///    `t <= now + now_lead` and (already started or on today's date) now;
///    `t <= now + upcoming_horizon_days` upcoming; else later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencyPolicy {
    /// Offset that defines the local calendar day.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_now_lead_minutes")]
    pub now_lead_minutes: i64,
    #[serde(default)]
    pub overdue_grace_minutes: i64,
    #[serde(default = "default_upcoming_horizon_days")]
    pub upcoming_horizon_days: u32,
}

fn default_now_lead_minutes() -> i64 {
    30
}

fn default_upcoming_horizon_days() -> u32 {
    7
}

impl Default for UrgencyPolicy {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            now_lead_minutes: default_now_lead_minutes(),
            overdue_grace_minutes: 0,
            upcoming_horizon_days: default_upcoming_horizon_days(),
        }
    }
}

impl UrgencyPolicy {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Today's local calendar date.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset()).date_naive()
    }

    pub fn classify(&self, todo: &Todo, now: DateTime<Utc>) -> Classification {
        let urgency = self.urgency_of(
            todo.scheduled_for.as_ref(),
            todo.completed,
            todo.can_start_now,
            now,
        );
        Classification {
            urgency,
            is_overdue: urgency == Urgency::Overdue,
        }
    }

    /// Write the derived fields back onto the todo.
    pub fn annotate(&self, todo: &mut Todo, now: DateTime<Utc>) {
        let c = self.classify(todo, now);
        todo.urgency = c.urgency;
        todo.is_overdue = c.is_overdue;
    }

    pub fn urgency_of(
        &self,
        schedule: Option<&Schedule>,
        completed: bool,
        can_start_now: bool,
        now: DateTime<Utc>,
    ) -> Urgency {
        if completed {
            return Urgency::Later;
        }
        match schedule {
            None if can_start_now => Urgency::Now,
            None => Urgency::Later,
            Some(Schedule::Day(day)) => self.day_urgency(*day, now),
            Some(Schedule::At(at)) => self.instant_urgency(*at, now),
        }
    }

    fn day_urgency(&self, day: NaiveDate, now: DateTime<Utc>) -> Urgency {
        let today = self.today(now);
        let horizon = today
            .checked_add_days(Days::new(u64::from(self.upcoming_horizon_days)))
            .unwrap_or(NaiveDate::MAX);

        if day < today {
            Urgency::Overdue
        } else if day == today {
            Urgency::Now
        } else if day <= horizon {
            Urgency::Upcoming
        } else {
            Urgency::Later
        }
    }

    fn instant_urgency(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> Urgency {
        let grace = Duration::minutes(self.overdue_grace_minutes);
        let lead = Duration::minutes(self.now_lead_minutes);
        let horizon = Duration::days(i64::from(self.upcoming_horizon_days));

        if at + grace < now {
            Urgency::Overdue
        } else if at <= now + lead
            && (at <= now || Schedule::At(at).local_date(self.offset()) == self.today(now))
        {
            Urgency::Now
        } else if at <= now + horizon {
            Urgency::Upcoming
        } else {
            Urgency::Later
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    /// Wednesday 2025-03-05 12:00 UTC
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 5, 12, 0, 0).unwrap()
    }

    fn day(d: u32) -> Schedule {
        Schedule::Day(NaiveDate::from_ymd_opt(2025, 3, d).unwrap())
    }

    fn at(d: u32, h: u32, m: u32) -> Schedule {
        Schedule::At(Utc.with_ymd_and_hms(2025, 3, d, h, m, 0).unwrap())
    }

    #[rstest]
    #[case::yesterday(day(4), Urgency::Overdue)]
    #[case::today(day(5), Urgency::Now)]
    #[case::tomorrow(day(6), Urgency::Upcoming)]
    #[case::horizon_edge(day(12), Urgency::Upcoming)]
    #[case::past_horizon(day(13), Urgency::Later)]
    fn day_schedule_boundaries(#[case] schedule: Schedule, #[case] expected: Urgency) {
        let policy = UrgencyPolicy::default();
        assert_eq!(policy.urgency_of(Some(&schedule), false, false, now()), expected);
    }

    #[rstest]
    #[case::one_minute_late(at(5, 11, 59), Urgency::Overdue)]
    #[case::exactly_now(at(5, 12, 0), Urgency::Now)]
    #[case::lead_edge(at(5, 12, 30), Urgency::Now)]
    #[case::past_lead(at(5, 12, 31), Urgency::Upcoming)]
    #[case::horizon_edge(at(12, 12, 0), Urgency::Upcoming)]
    #[case::past_horizon(at(12, 12, 1), Urgency::Later)]
    fn instant_schedule_boundaries(#[case] schedule: Schedule, #[case] expected: Urgency) {
        let policy = UrgencyPolicy::default();
        assert_eq!(policy.urgency_of(Some(&schedule), false, false, now()), expected);
    }

    #[test]
    fn grace_delays_overdue() {
        let policy = UrgencyPolicy {
            overdue_grace_minutes: 15,
            ..UrgencyPolicy::default()
        };
        assert_eq!(policy.urgency_of(Some(&at(5, 11, 45)), false, false, now()), Urgency::Now);
        assert_eq!(
            policy.urgency_of(Some(&at(5, 11, 44)), false, false, now()),
            Urgency::Overdue
        );
    }

    #[test]
    fn lead_window_does_not_cross_midnight() {
        let policy = UrgencyPolicy::default();
        let late = Utc.with_ymd_and_hms(2025, 3, 5, 23, 50, 0).unwrap();
        // 00:10 tomorrow is inside the 30 minute lead but on another day
        assert_eq!(
            policy.urgency_of(Some(&at(6, 0, 10)), false, false, late),
            Urgency::Upcoming
        );
    }

    #[test]
    fn offset_moves_the_calendar_day() {
        // 12:00 UTC is 21:00 in UTC+9, still the 5th; 16:00 UTC is the 6th there.
        let policy = UrgencyPolicy {
            utc_offset_minutes: 9 * 60,
            ..UrgencyPolicy::default()
        };
        let evening = Utc.with_ymd_and_hms(2025, 3, 5, 16, 0, 0).unwrap();
        assert_eq!(policy.urgency_of(Some(&day(5)), false, false, now()), Urgency::Now);
        assert_eq!(
            policy.urgency_of(Some(&day(5)), false, false, evening),
            Urgency::Overdue
        );
    }

    #[rstest]
    #[case::plain(false, Urgency::Later)]
    #[case::startable(true, Urgency::Now)]
    fn unscheduled_todos(#[case] can_start_now: bool, #[case] expected: Urgency) {
        let policy = UrgencyPolicy::default();
        assert_eq!(policy.urgency_of(None, false, can_start_now, now()), expected);
    }

    #[test]
    fn completed_todos_are_never_overdue() {
        let policy = UrgencyPolicy::default();
        let todo = Todo::new("t1", "x").scheduled(day(1)).completed_at(now());
        let c = policy.classify(&todo, now());
        assert_eq!(c.urgency, Urgency::Later);
        assert!(!c.is_overdue);
    }

    #[test]
    fn yesterday_is_overdue() {
        let policy = UrgencyPolicy::default();
        let mut todo = Todo::new("t1", "x").scheduled(day(4));
        policy.annotate(&mut todo, now());
        assert_eq!(todo.urgency, Urgency::Overdue);
        assert!(todo.is_overdue);
    }

    #[test]
    fn classification_is_deterministic() {
        let policy = UrgencyPolicy::default();
        let todo = Todo::new("t1", "x").scheduled(at(5, 12, 10));
        let first = policy.classify(&todo, now());
        for _ in 0..10 {
            assert_eq!(policy.classify(&todo, now()), first);
        }
    }

    #[test]
    fn rank_orders_tiers() {
        let mut tiers = vec![Urgency::Later, Urgency::Now, Urgency::Overdue, Urgency::Upcoming];
        tiers.sort_by_key(|u| u.rank());
        assert_eq!(
            tiers,
            vec![Urgency::Overdue, Urgency::Now, Urgency::Upcoming, Urgency::Later]
        );
    }
}
