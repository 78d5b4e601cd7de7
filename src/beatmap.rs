pub mod process;
pub mod stacking;

use crate::config::GameplayConfig;
use crate::geometry::{CurveKind, Point};
use crate::score::HitSound;
use crate::timing::{DifficultyRecord, TimingPointRecord};
use log::{info, warn};
use std::error::Error;
use std::fmt;
use std::sync::mpsc;
use std::thread;

pub use process::{
    ComboInfo, ProcessedBeatmap, ProcessedHitObject, ProcessedKind, SliderData, SliderTimingInfo,
    SpinnerData,
};

/// Kind-specific fields of a raw hit object record, as produced by the
/// upstream text parser.
#[derive(Debug, Clone)]
pub enum RawKind {
    Circle,
    Slider {
        repeat: u32,
        length: f32,
        curve_type: CurveKind,
        control_points: Vec<Point>,
    },
    Spinner {
        end_time: f64,
    },
}

#[derive(Debug, Clone)]
pub struct HitObjectRecord {
    pub time: f64,
    pub x: f32,
    pub y: f32,
    pub new_combo: bool,
    pub combo_skip: u32,
    pub hit_sound: HitSound,
    pub kind: RawKind,
}

impl HitObjectRecord {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A parsed beatmap before processing. Field semantics match the `.osu`
/// format conventions; the textual format itself is parsed upstream.
#[derive(Debug, Clone)]
pub struct Beatmap {
    pub title: String,
    pub audio_file: String,
    pub hit_objects: Vec<HitObjectRecord>,
    pub timing_points: Vec<TimingPointRecord>,
    pub difficulty: DifficultyRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeatmapError {
    NoHitObjects,
    NoTimingPoints,
    MissingAudio,
    DegenerateSlider { index: usize },
    NonFiniteTime { index: usize },
    UnorderedHitObjects { index: usize },
}

impl fmt::Display for BeatmapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeatmapError::NoHitObjects => write!(f, "beatmap contains no hit objects"),
            BeatmapError::NoTimingPoints => write!(f, "beatmap contains no timing points"),
            BeatmapError::MissingAudio => write!(f, "beatmap references no audio file"),
            BeatmapError::DegenerateSlider { index } => {
                write!(f, "slider at index {index} has no usable geometry")
            }
            BeatmapError::NonFiniteTime { index } => {
                write!(f, "hit object at index {index} has a non-finite time")
            }
            BeatmapError::UnorderedHitObjects { index } => {
                write!(f, "hit object at index {index} starts before its predecessor")
            }
        }
    }
}

impl Error for BeatmapError {}

/// Structural validation. A failing map is defective and gets excluded from
/// its set instead of aborting the import.
pub fn validate(map: &Beatmap) -> Result<(), BeatmapError> {
    if map.hit_objects.is_empty() {
        return Err(BeatmapError::NoHitObjects);
    }
    if map.timing_points.is_empty() {
        return Err(BeatmapError::NoTimingPoints);
    }
    if map.audio_file.is_empty() {
        return Err(BeatmapError::MissingAudio);
    }
    for (index, object) in map.hit_objects.iter().enumerate() {
        if !object.time.is_finite() {
            return Err(BeatmapError::NonFiniteTime { index });
        }
        // Activation, stacking and the event queue all assume start
        // times never go backwards.
        if index > 0 && object.time < map.hit_objects[index - 1].time {
            return Err(BeatmapError::UnorderedHitObjects { index });
        }
        match &object.kind {
            RawKind::Slider { repeat, length, control_points, .. } => {
                if *repeat == 0 || control_points.len() < 2 || !length.is_finite() || *length <= 0.0
                {
                    return Err(BeatmapError::DegenerateSlider { index });
                }
            }
            RawKind::Spinner { end_time } => {
                if !end_time.is_finite() {
                    return Err(BeatmapError::NonFiniteTime { index });
                }
            }
            RawKind::Circle => {}
        }
    }
    Ok(())
}

/// Result of importing a set of sibling beatmaps. Defective maps are
/// counted and skipped, never fatal for the rest of the set.
#[derive(Debug)]
pub struct BeatmapSetImport {
    pub maps: Vec<ProcessedBeatmap>,
    pub defective: usize,
}

pub fn import_set(maps: Vec<Beatmap>, config: &GameplayConfig) -> BeatmapSetImport {
    let total = maps.len();
    let mut imported = Vec::with_capacity(total);
    let mut defective = 0;
    for map in maps {
        match ProcessedBeatmap::process(&map, config) {
            Ok(processed) => imported.push(processed),
            Err(err) => {
                warn!("skipping defective beatmap \"{}\": {err}", map.title);
                defective += 1;
            }
        }
    }
    if defective > 0 {
        info!("{defective} of {total} beatmaps were not imported because they were defective");
    }
    BeatmapSetImport { maps: imported, defective }
}

/// Runs [`import_set`] on a background thread so a large set does not block
/// the tick loop; the receiver delivers the finished import exactly once.
pub fn import_set_background(
    maps: Vec<Beatmap>,
    config: GameplayConfig,
) -> mpsc::Receiver<BeatmapSetImport> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let import = import_set(maps, &config);
        // The receiver may have been dropped on shutdown.
        let _ = tx.send(import);
    });
    rx
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::score::HitSound;

    pub(crate) fn plain_difficulty() -> DifficultyRecord {
        DifficultyRecord {
            cs: 4.0,
            ar: 5.0,
            od: 5.0,
            hp: 5.0,
            slider_multiplier: 1.0,
            slider_tick_rate: 1.0,
            stack_leniency: 0.7,
        }
    }

    pub(crate) fn circle(time: f64, x: f32, y: f32) -> HitObjectRecord {
        HitObjectRecord {
            time,
            x,
            y,
            new_combo: false,
            combo_skip: 0,
            hit_sound: HitSound { flags: 0, sample_set: 1, volume: 100 },
            kind: RawKind::Circle,
        }
    }

    pub(crate) fn plain_map(objects: Vec<HitObjectRecord>) -> Beatmap {
        Beatmap {
            title: "test".to_owned(),
            audio_file: "audio.mp3".to_owned(),
            hit_objects: objects,
            timing_points: vec![TimingPointRecord {
                offset: 0.0,
                ms_per_beat: 500.0,
                inherited: false,
                sample_set: 1,
                volume: 100,
            }],
            difficulty: plain_difficulty(),
        }
    }

    #[test]
    fn empty_map_is_defective() {
        let map = plain_map(vec![]);
        assert_eq!(validate(&map), Err(BeatmapError::NoHitObjects));
    }

    #[test]
    fn zero_length_slider_is_defective() {
        let mut map = plain_map(vec![circle(0.0, 100.0, 100.0)]);
        map.hit_objects[0].kind = RawKind::Slider {
            repeat: 1,
            length: 0.0,
            curve_type: CurveKind::Linear,
            control_points: vec![Point::new(100.0, 100.0), Point::new(200.0, 100.0)],
        };
        assert_eq!(validate(&map), Err(BeatmapError::DegenerateSlider { index: 0 }));
    }

    #[test]
    fn out_of_order_objects_are_defective() {
        let map = plain_map(vec![circle(2000.0, 100.0, 100.0), circle(1000.0, 200.0, 200.0)]);
        assert_eq!(validate(&map), Err(BeatmapError::UnorderedHitObjects { index: 1 }));

        // Simultaneous starts are fine.
        let tied = plain_map(vec![circle(1000.0, 100.0, 100.0), circle(1000.0, 200.0, 200.0)]);
        assert_eq!(validate(&tied), Ok(()));
    }

    #[test]
    fn defective_sibling_does_not_abort_the_set() {
        let good = plain_map(vec![circle(1000.0, 100.0, 100.0)]);
        let bad = plain_map(vec![]);
        let import = import_set(vec![good, bad], &GameplayConfig::default());
        assert_eq!(import.maps.len(), 1);
        assert_eq!(import.defective, 1);
    }

    #[test]
    fn background_import_signals_completion() {
        let maps = vec![plain_map(vec![circle(0.0, 50.0, 50.0)])];
        let rx = import_set_background(maps, GameplayConfig::default());
        let import = rx.recv().unwrap();
        assert_eq!(import.maps.len(), 1);
    }
}
