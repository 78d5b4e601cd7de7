//! Gameplay simulation core for an osu!-style rhythm game.
//!
//! A parsed beatmap goes in one end ([`beatmap::Beatmap`]), a processed,
//! immutable form comes out ([`beatmap::ProcessedBeatmap`]), and a
//! [`play::PlaySession`] runs the per-tick judgement loop against it,
//! synced to an external audio clock through [`clock::TimeSource`].
//! Rendering, text parsing and audio decoding live outside this crate.

pub mod beatmap;
pub mod clock;
pub mod config;
pub mod events;
pub mod geometry;
pub mod judgement;
pub mod play;
pub mod score;
pub mod timing;

pub use beatmap::{
    import_set, import_set_background, Beatmap, BeatmapError, BeatmapSetImport, HitObjectRecord,
    ProcessedBeatmap, RawKind,
};
pub use clock::{PlayClock, TimeSource};
pub use config::GameplayConfig;
pub use geometry::{CurveKind, Point};
pub use judgement::{InputState, ObjectPhase};
pub use play::{OnscreenObject, PlaySession};
pub use score::{FeedbackEvent, HitSound, Judgement, ScoreCounter};
pub use timing::{DifficultyRecord, HitWindows, TimingPointRecord};
