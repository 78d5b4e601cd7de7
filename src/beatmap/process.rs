use crate::beatmap::{stacking, Beatmap, BeatmapError, RawKind};
use crate::config::GameplayConfig;
use crate::geometry::{split_sections, CurveSection, Point, SliderPath};
use crate::score::HitSound;
use crate::timing::{
    approach_time_ms, circle_radius, required_spins, DifficultyRecord, HitWindows, TimingPoints,
};
use log::info;
use std::sync::mpsc;
use std::thread;

// Ticks degenerate when the step gets this small (broken velocity values).
const MIN_TICK_STEP: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComboInfo {
    /// Combo group number, 1-based.
    pub combo_num: u32,
    /// Position within the group, 1-based.
    pub index_in_combo: u32,
    pub color_index: u32,
}

/// Tempo state resolved at a slider's start time.
#[derive(Debug, Clone, Copy)]
pub struct SliderTimingInfo {
    pub ms_per_beat: f64,
    /// Percent velocity multiplier from the active inherited point.
    pub multiplier: f64,
    /// Travel speed of the slider ball in playfield px per ms.
    pub velocity: f64,
}

#[derive(Debug, Clone)]
pub struct SliderData {
    pub path: SliderPath,
    pub timing: SliderTimingInfo,
    pub repeat: u32,
    pub length: f32,
    /// Completion values in (0, repeat) at which ticks sit, ascending,
    /// never on a whole-repeat boundary.
    pub tick_completions: Vec<f64>,
    /// Duration of one traversal of the path in ms.
    pub cycle_duration: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct SpinnerData {
    pub required_spins: u32,
}

#[derive(Debug, Clone)]
pub enum ProcessedKind {
    Circle,
    Slider(SliderData),
    Spinner(SpinnerData),
}

#[derive(Debug, Clone)]
pub struct ProcessedHitObject {
    pub start_time: f64,
    pub end_time: f64,
    pub position: Point,
    pub end_position: Point,
    pub combo: ComboInfo,
    pub hit_sound: HitSound,
    pub stack_height: i32,
    pub kind: ProcessedKind,
}

impl ProcessedHitObject {
    pub fn is_circle(&self) -> bool {
        matches!(self.kind, ProcessedKind::Circle)
    }

    pub fn is_slider(&self) -> bool {
        matches!(self.kind, ProcessedKind::Slider(_))
    }

    pub fn is_spinner(&self) -> bool {
        matches!(self.kind, ProcessedKind::Spinner(_))
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// A beatmap after processing: immutable for the lifetime of a play
/// session, shared read-only with the renderer.
#[derive(Debug)]
pub struct ProcessedBeatmap {
    pub objects: Vec<ProcessedHitObject>,
    pub difficulty: DifficultyRecord,
    pub timing: TimingPoints,
    pub approach_time: f64,
    pub windows: HitWindows,
    pub circle_radius: f32,
    /// Object indices back-to-front: later-ending objects render further
    /// back, ties broken so the later start draws on top.
    pub draw_order: Vec<usize>,
}

impl ProcessedBeatmap {
    pub fn process(raw: &Beatmap, config: &GameplayConfig) -> Result<Self, BeatmapError> {
        crate::beatmap::validate(raw)?;

        let difficulty = raw.difficulty;
        let timing = TimingPoints::new(raw.timing_points.clone());
        let approach_time = approach_time_ms(difficulty.ar);
        let windows = HitWindows::from_od(difficulty.od);
        let radius = circle_radius(difficulty.cs);

        let paths = flatten_slider_paths(raw);

        let mut objects = Vec::with_capacity(raw.hit_objects.len());
        let mut combo_num = 0u32;
        let mut index_in_combo = 0u32;
        let mut color_index = 0u32;

        for (i, record) in raw.hit_objects.iter().enumerate() {
            if record.new_combo || i == 0 {
                combo_num += 1 + record.combo_skip;
                index_in_combo = 1;
                if i > 0 {
                    color_index = (color_index + 1 + record.combo_skip) % config.combo_color_count;
                }
            } else {
                index_in_combo += 1;
            }
            let combo = ComboInfo { combo_num, index_in_combo, color_index };

            let position = record.position();
            let (kind, end_time, end_position) = match &record.kind {
                RawKind::Circle => (ProcessedKind::Circle, record.time, position),
                RawKind::Spinner { end_time } => {
                    let data = SpinnerData {
                        required_spins: required_spins(difficulty.od, end_time - record.time),
                    };
                    (ProcessedKind::Spinner(data), *end_time, position)
                }
                RawKind::Slider { repeat, length, .. } => {
                    let path = match paths[i].clone() {
                        Some(path) => path,
                        None => return Err(BeatmapError::DegenerateSlider { index: i }),
                    };
                    let active = timing.active_at(record.time);
                    let velocity = 100.0 * difficulty.slider_multiplier
                        / (active.beat_length * active.velocity_multiplier / 100.0);
                    let timing_info = SliderTimingInfo {
                        ms_per_beat: active.beat_length,
                        multiplier: active.velocity_multiplier,
                        velocity,
                    };
                    let cycle_duration = f64::from(*length) / velocity;
                    let end_time = record.time + f64::from(*repeat) * cycle_duration;
                    let end_position =
                        if repeat % 2 == 0 { path.start_point() } else { path.end_point() };
                    let tick_completions = tick_completions(
                        velocity,
                        active.beat_length,
                        difficulty.slider_tick_rate,
                        f64::from(*length),
                        *repeat,
                    );
                    let data = SliderData {
                        path,
                        timing: timing_info,
                        repeat: *repeat,
                        length: *length,
                        tick_completions,
                        cycle_duration,
                    };
                    (ProcessedKind::Slider(data), end_time, end_position)
                }
            };

            objects.push(ProcessedHitObject {
                start_time: record.time,
                end_time,
                position,
                end_position,
                combo,
                hit_sound: record.hit_sound,
                stack_height: 0,
                kind,
            });
        }

        stacking::apply_stacking(&mut objects, approach_time, difficulty.stack_leniency, config);

        let mut draw_order: Vec<usize> = (0..objects.len()).collect();
        draw_order.sort_by(|&a, &b| {
            objects[b]
                .end_time
                .total_cmp(&objects[a].end_time)
                .then(objects[a].start_time.total_cmp(&objects[b].start_time))
        });

        info!(
            "processed beatmap \"{}\": {} hit objects, approach {approach_time:.0}ms",
            raw.title,
            objects.len()
        );

        Ok(Self {
            objects,
            difficulty,
            timing,
            approach_time,
            windows,
            circle_radius: radius,
            draw_order,
        })
    }
}

/// Ticks sit at equal velocity-derived steps within each traversal of the
/// path, mirrored on odd (reverse) cycles so they occupy the same world
/// positions every pass.
fn tick_completions(
    velocity: f64,
    beat_length: f64,
    tick_rate: f64,
    length: f64,
    repeat: u32,
) -> Vec<f64> {
    let step = velocity * beat_length / tick_rate / length;
    if !step.is_finite() || step < MIN_TICK_STEP {
        return Vec::new();
    }
    let mut base = Vec::new();
    let mut v = step;
    while v < 1.0 - 1e-9 {
        base.push(v);
        v += step;
    }
    let mut completions = Vec::with_capacity(base.len() * repeat as usize);
    for cycle in 0..repeat {
        if cycle % 2 == 0 {
            for &v in &base {
                completions.push(f64::from(cycle) + v);
            }
        } else {
            for &v in base.iter().rev() {
                completions.push(f64::from(cycle) + (1.0 - v));
            }
        }
    }
    completions
}

/// Flattens every slider path up front. The work is pure (control points
/// in, points out), so it fans out over worker threads and joins before
/// processing continues; nothing else runs concurrently with it.
fn flatten_slider_paths(raw: &Beatmap) -> Vec<Option<SliderPath>> {
    let jobs: Vec<(usize, Vec<CurveSection>, f32)> = raw
        .hit_objects
        .iter()
        .enumerate()
        .filter_map(|(i, record)| match &record.kind {
            RawKind::Slider { length, curve_type, control_points, .. } => {
                Some((i, split_sections(*curve_type, control_points), *length))
            }
            _ => None,
        })
        .collect();

    let mut paths: Vec<Option<SliderPath>> = vec![None; raw.hit_objects.len()];
    if jobs.is_empty() {
        return paths;
    }

    let workers = thread::available_parallelism().map_or(1, |n| n.get()).min(jobs.len());
    let (tx, rx) = mpsc::channel();
    thread::scope(|scope| {
        for worker in 0..workers {
            let tx = tx.clone();
            let jobs = &jobs;
            scope.spawn(move || {
                for (index, sections, length) in jobs.iter().skip(worker).step_by(workers) {
                    let path = (!sections.is_empty()).then(|| SliderPath::new(sections, *length));
                    // Processing outlives every worker, the send cannot fail.
                    let _ = tx.send((*index, path));
                }
            });
        }
        drop(tx);
        for (index, path) in rx {
            paths[index] = path;
        }
    });
    paths
}
