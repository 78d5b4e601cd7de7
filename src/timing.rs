use crate::config::BASE_CIRCLE_DIAMETER;
use crate::score::Judgement;
use serde::Deserialize;

// Approach time segments (ms), keyed on AR around the midpoint 5.
const APPROACH_BASE_LOW: f64 = 1800.0;
const APPROACH_SLOPE_LOW: f64 = 120.0;
const APPROACH_BASE_HIGH: f64 = 1200.0;
const APPROACH_SLOPE_HIGH: f64 = 150.0;

// Hit window tables (ms), linear on OD.
const WINDOW_300_BASE: f64 = 80.0;
const WINDOW_300_SLOPE: f64 = 6.0;
const WINDOW_100_BASE: f64 = 140.0;
const WINDOW_100_SLOPE: f64 = 8.0;
const WINDOW_50_BASE: f64 = 200.0;
const WINDOW_50_SLOPE: f64 = 10.0;

// Spinner requirement, full spins per second keyed on OD.
const SPINS_PER_SECOND_MIN: f64 = 3.0;
const SPINS_PER_SECOND_MID: f64 = 5.0;
const SPINS_PER_SECOND_MAX: f64 = 7.5;

/// Difficulty settings of one beatmap. Values are nominally 0-10 but are
/// evaluated unclamped since maps legitimately use extremes.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DifficultyRecord {
    pub cs: f32,
    pub ar: f32,
    pub od: f32,
    pub hp: f32,
    pub slider_multiplier: f64,
    pub slider_tick_rate: f64,
    pub stack_leniency: f32,
}

/// Circle radius in playfield pixels for a circle-size value.
pub fn circle_radius(cs: f32) -> f32 {
    BASE_CIRCLE_DIAMETER * (1.0 - 0.7 * (cs - 5.0) / 5.0) / 2.0
}

/// Time in ms a hit object is visible before its start time. Three linear
/// segments meeting at AR 5.
pub fn approach_time_ms(ar: f32) -> f64 {
    let ar = ar as f64;
    if ar < 5.0 {
        APPROACH_BASE_LOW - APPROACH_SLOPE_LOW * ar
    } else {
        APPROACH_BASE_HIGH - APPROACH_SLOPE_HIGH * (ar - 5.0)
    }
}

/// Required full spins for a spinner of the given duration.
pub fn required_spins(od: f32, duration_ms: f64) -> u32 {
    let od = od as f64;
    let per_second = if od < 5.0 {
        SPINS_PER_SECOND_MIN + (SPINS_PER_SECOND_MID - SPINS_PER_SECOND_MIN) * od / 5.0
    } else {
        SPINS_PER_SECOND_MID + (SPINS_PER_SECOND_MAX - SPINS_PER_SECOND_MID) * (od - 5.0) / 5.0
    };
    ((duration_ms / 1000.0 * per_second).floor() as u32).max(1)
}

/// Hit window half-widths in ms, derived from OD.
#[derive(Debug, Clone, Copy)]
pub struct HitWindows {
    pub window_300: f64,
    pub window_100: f64,
    pub window_50: f64,
}

impl HitWindows {
    pub fn from_od(od: f32) -> Self {
        let od = od as f64;
        Self {
            window_300: WINDOW_300_BASE - WINDOW_300_SLOPE * od,
            window_100: WINDOW_100_BASE - WINDOW_100_SLOPE * od,
            window_50: WINDOW_50_BASE - WINDOW_50_SLOPE * od,
        }
    }

    /// Best judgement whose window still contains `delta_abs`. A delta
    /// exactly on a boundary belongs to the stricter window.
    pub fn judgement_for_delta(&self, delta_abs: f64) -> Judgement {
        if delta_abs <= self.window_300 {
            Judgement::Hit300
        } else if delta_abs <= self.window_100 {
            Judgement::Hit100
        } else if delta_abs <= self.window_50 {
            Judgement::Hit50
        } else {
            Judgement::Miss
        }
    }
}

/// One timing point as parsed upstream. An inherited point's `ms_per_beat`
/// is negative and encodes a slider-velocity multiplier instead of a tempo.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TimingPointRecord {
    pub offset: f64,
    pub ms_per_beat: f64,
    pub inherited: bool,
    pub sample_set: u8,
    pub volume: u8,
}

/// Tempo and velocity state active at some query time.
#[derive(Debug, Clone, Copy)]
pub struct ActiveTiming {
    pub beat_length: f64,
    /// Percent velocity multiplier; 100 means unmodified.
    pub velocity_multiplier: f64,
    pub sample_set: u8,
    pub volume: u8,
}

const FALLBACK_BEAT_LENGTH: f64 = 500.0;

/// Timing points sorted by offset, queried once per slider at processing
/// time and per judgement for sample volumes.
#[derive(Debug, Clone)]
pub struct TimingPoints {
    points: Vec<TimingPointRecord>,
}

impl TimingPoints {
    pub fn new(mut points: Vec<TimingPointRecord>) -> Self {
        points.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Latest point with offset <= `time`, clamped to the first point when
    /// the query precedes all of them.
    pub fn active_at(&self, time: f64) -> ActiveTiming {
        if self.points.is_empty() {
            return ActiveTiming {
                beat_length: FALLBACK_BEAT_LENGTH,
                velocity_multiplier: 100.0,
                sample_set: 0,
                volume: 100,
            };
        }
        let after = self.points.partition_point(|p| p.offset <= time);
        let index = after.saturating_sub(1);
        let point = self.points[index];

        let beat_length = self.points[..=index]
            .iter()
            .rev()
            .find(|p| !p.inherited)
            .or_else(|| self.points.iter().find(|p| !p.inherited))
            .map_or(FALLBACK_BEAT_LENGTH, |p| p.ms_per_beat);
        let velocity_multiplier = if point.inherited { -point.ms_per_beat } else { 100.0 };

        ActiveTiming {
            beat_length,
            velocity_multiplier,
            sample_set: point.sample_set,
            volume: point.volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0.0 => 1800.0)]
    #[test_case(4.0 => 1320.0)]
    #[test_case(5.0 => 1200.0)]
    #[test_case(9.0 => 600.0)]
    #[test_case(10.0 => 450.0)]
    fn approach_time_segments(ar: f32) -> f64 {
        approach_time_ms(ar)
    }

    #[test]
    fn circle_radius_shrinks_with_cs() {
        assert_eq!(circle_radius(5.0), 32.0);
        assert!(circle_radius(7.0) < circle_radius(4.0));
        // Unclamped beyond 10 by design.
        assert!(circle_radius(12.0) < circle_radius(10.0));
    }

    #[test]
    fn window_boundary_belongs_to_stricter_judgement() {
        let windows = HitWindows::from_od(5.0);
        assert_eq!(windows.window_300, 50.0);
        assert_eq!(windows.judgement_for_delta(50.0), Judgement::Hit300);
        assert_eq!(windows.judgement_for_delta(51.0), Judgement::Hit100);
        assert_eq!(windows.judgement_for_delta(100.0), Judgement::Hit100);
        assert_eq!(windows.judgement_for_delta(101.0), Judgement::Hit50);
        assert_eq!(windows.judgement_for_delta(150.0), Judgement::Hit50);
        assert_eq!(windows.judgement_for_delta(151.0), Judgement::Miss);
    }

    fn uninherited(offset: f64, ms_per_beat: f64) -> TimingPointRecord {
        TimingPointRecord { offset, ms_per_beat, inherited: false, sample_set: 1, volume: 100 }
    }

    fn inherited(offset: f64, multiplier: f64) -> TimingPointRecord {
        TimingPointRecord {
            offset,
            ms_per_beat: -multiplier,
            inherited: true,
            sample_set: 1,
            volume: 100,
        }
    }

    #[test]
    fn query_before_first_point_clamps() {
        let points = TimingPoints::new(vec![uninherited(1000.0, 500.0)]);
        let active = points.active_at(0.0);
        assert_eq!(active.beat_length, 500.0);
        assert_eq!(active.velocity_multiplier, 100.0);
    }

    #[test]
    fn inherited_point_carries_beat_length_forward() {
        let points = TimingPoints::new(vec![
            uninherited(0.0, 500.0),
            inherited(2000.0, 150.0),
            uninherited(4000.0, 400.0),
        ]);

        let at_inherited = points.active_at(3000.0);
        assert_eq!(at_inherited.beat_length, 500.0);
        assert_eq!(at_inherited.velocity_multiplier, 150.0);

        let after = points.active_at(4500.0);
        assert_eq!(after.beat_length, 400.0);
        assert_eq!(after.velocity_multiplier, 100.0);
    }

    #[test]
    fn required_spins_scale_with_od_and_duration() {
        assert_eq!(required_spins(5.0, 1000.0), 5);
        assert_eq!(required_spins(0.0, 1000.0), 3);
        assert_eq!(required_spins(10.0, 2000.0), 15);
        // Very short spinners still require one spin.
        assert_eq!(required_spins(0.0, 100.0), 1);
    }
}
