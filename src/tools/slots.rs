//! Free/busy arithmetic for meeting suggestions.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};

/// Step between consecutive candidate start times.
pub const SLOT_STEP_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSpan {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Candidate slots of exactly `duration` inside `window` that avoid every busy
/// interval. Starts advance by `step`, so slots overlap each other when the
/// duration is longer than the step.
pub fn free_slots(
    busy: &[TimeSpan],
    window: TimeSpan,
    duration: Duration,
    step: Duration,
) -> Vec<TimeSpan> {
    let mut slots = Vec::new();
    if duration <= Duration::zero() || step <= Duration::zero() || window.end <= window.start {
        return slots;
    }

    let mut sorted = busy.to_vec();
    sorted.sort_by_key(|span| span.start);

    let mut cursor = window.start;
    for span in &sorted {
        let gap_end = span.start.min(window.end);
        if gap_end - cursor >= duration {
            emit_slots(&mut slots, cursor, gap_end, duration, step);
        }
        // Contained or earlier intervals never move the cursor back
        if span.end > cursor {
            cursor = span.end;
        }
    }
    if window.end - cursor >= duration {
        emit_slots(&mut slots, cursor, window.end, duration, step);
    }

    slots
}

fn emit_slots(
    slots: &mut Vec<TimeSpan>,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
    duration: Duration,
    step: Duration,
) {
    let mut start = from;
    while start + duration <= until {
        slots.push(TimeSpan::new(start, start + duration));
        start += step;
    }
}

/// True when the slot starts no earlier than `start_hour` and ends no later
/// than `end_hour` on the same local day in `tz`.
pub fn within_working_hours<Tz: TimeZone>(
    slot: &TimeSpan,
    tz: &Tz,
    start_hour: u32,
    end_hour: u32,
) -> bool {
    let local_start = slot.start.with_timezone(tz);
    let local_end = slot.end.with_timezone(tz);

    if local_start.hour() < start_hour || local_start.hour() >= end_hour {
        return false;
    }

    let same_day = local_start.date_naive() == local_end.date_naive();
    match NaiveTime::from_hms_opt(end_hour, 0, 0) {
        Some(limit) => same_day && local_end.time() <= limit,
        // An end hour of 24 means "until midnight"
        None => same_day || local_end.num_seconds_from_midnight() == 0,
    }
}

/// Up to `max` slots spread evenly over `candidates`.
pub fn pick_spread(candidates: &[TimeSpan], max: usize) -> Vec<TimeSpan> {
    if max == 0 {
        return Vec::new();
    }
    let stride = (candidates.len() / max).max(1);
    candidates.iter().step_by(stride).take(max).copied().collect()
}

/// First step boundary (relative to the Unix epoch) at or after `instant`.
pub fn align_up(instant: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    let step_secs = step.num_seconds();
    if step_secs <= 0 {
        return instant;
    }
    let secs = instant.timestamp();
    let remainder = secs.rem_euclid(step_secs);
    if remainder == 0 && instant.timestamp_subsec_nanos() == 0 {
        return instant;
    }
    let aligned = secs - remainder + step_secs;
    DateTime::from_timestamp(aligned, 0).unwrap_or(instant)
}
