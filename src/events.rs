use crate::beatmap::{ProcessedBeatmap, ProcessedKind};
use crate::config::GameplayConfig;
use crate::geometry::{mirror, Point};
use crate::score::HitSound;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayEventKind {
    /// The 50-window of a circle or slider head has closed; unhit heads
    /// become passive misses.
    HeadHitWindowEnd,
    SliderTick { index: usize },
    SliderRepeat { index: usize },
    /// Follow-state sample for the slider tail, taken slightly before the
    /// actual end time.
    SliderEndCheck,
    SliderEnd,
    /// Sustained over the spinner's whole interval, polled every tick.
    SpinnerSpin,
    SpinnerEnd,
}

/// One atomic judgeable moment. Generated once per session, time-sorted,
/// consumed in order and never regenerated.
#[derive(Debug, Clone)]
pub struct PlayEvent {
    pub kind: PlayEventKind,
    pub object: usize,
    pub time: f64,
    /// Close of a sustained interval; only spinner spans carry one.
    pub end_time: Option<f64>,
    pub position: Option<Point>,
    pub hit_sound: Option<HitSound>,
}

/// Flattens every hit object into the chronological judgement queue — the
/// single source of truth for what can be judged when.
pub fn schedule(map: &ProcessedBeatmap, config: &GameplayConfig) -> Vec<PlayEvent> {
    let mut events = Vec::new();
    for (index, object) in map.objects.iter().enumerate() {
        match &object.kind {
            ProcessedKind::Circle => {
                events.push(PlayEvent {
                    kind: PlayEventKind::HeadHitWindowEnd,
                    object: index,
                    time: object.start_time + map.windows.window_50,
                    end_time: None,
                    position: Some(object.position),
                    hit_sound: None,
                });
            }
            ProcessedKind::Slider(data) => {
                events.push(PlayEvent {
                    kind: PlayEventKind::HeadHitWindowEnd,
                    object: index,
                    time: object.start_time + map.windows.window_50,
                    end_time: None,
                    position: Some(object.position),
                    hit_sound: None,
                });
                for (tick, &completion) in data.tick_completions.iter().enumerate() {
                    events.push(PlayEvent {
                        kind: PlayEventKind::SliderTick { index: tick },
                        object: index,
                        time: object.start_time + completion * data.cycle_duration,
                        end_time: None,
                        position: Some(data.path.point_at(mirror(completion) as f32)),
                        hit_sound: None,
                    });
                }
                for repeat in 1..data.repeat {
                    // Odd traversal counts land on the far end of the path.
                    let position = if repeat % 2 == 1 {
                        data.path.end_point()
                    } else {
                        data.path.start_point()
                    };
                    events.push(PlayEvent {
                        kind: PlayEventKind::SliderRepeat { index: repeat as usize },
                        object: index,
                        time: object.start_time + f64::from(repeat) * data.cycle_duration,
                        end_time: None,
                        position: Some(position),
                        hit_sound: Some(object.hit_sound),
                    });
                }
                let duration = object.duration();
                let check_offset = duration - config.slider_end_check_offset_ms;
                let check_time = object.start_time + check_offset.max(duration / 2.0);
                let check_completion = (check_time - object.start_time) / data.cycle_duration;
                events.push(PlayEvent {
                    kind: PlayEventKind::SliderEndCheck,
                    object: index,
                    time: check_time,
                    end_time: None,
                    position: Some(data.path.point_at(mirror(check_completion) as f32)),
                    hit_sound: None,
                });
                events.push(PlayEvent {
                    kind: PlayEventKind::SliderEnd,
                    object: index,
                    time: object.end_time,
                    end_time: None,
                    position: Some(object.end_position),
                    hit_sound: Some(object.hit_sound),
                });
            }
            ProcessedKind::Spinner(_) => {
                events.push(PlayEvent {
                    kind: PlayEventKind::SpinnerSpin,
                    object: index,
                    time: object.start_time,
                    end_time: Some(object.end_time),
                    position: Some(object.position),
                    hit_sound: None,
                });
                events.push(PlayEvent {
                    kind: PlayEventKind::SpinnerEnd,
                    object: index,
                    time: object.end_time,
                    end_time: None,
                    position: Some(object.position),
                    hit_sound: Some(object.hit_sound),
                });
            }
        }
    }
    events.sort_by(|a, b| a.time.total_cmp(&b.time));
    events
}
