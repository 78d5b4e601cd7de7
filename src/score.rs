use crate::config::GameplayConfig;
use crate::timing::DifficultyRecord;
use log::debug;

// Raw scoring values for sub-events that never carry a timing grade.
pub const SLIDER_TICK_VALUE: u32 = 10;
pub const SLIDER_EDGE_VALUE: u32 = 30;
pub const SPINNER_SPIN_VALUE: u32 = 100;
pub const SPINNER_BONUS_VALUE: u32 = 1000;

/// Timed judgement outcome of a single hit object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgement {
    Miss,
    Hit50,
    Hit100,
    Hit300,
}

impl Judgement {
    pub fn raw_value(self) -> u32 {
        match self {
            Judgement::Miss => 0,
            Judgement::Hit50 => 50,
            Judgement::Hit100 => 100,
            Judgement::Hit300 => 300,
        }
    }
}

/// Sample descriptor forwarded to the external sound-emission system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitSound {
    pub flags: u8,
    pub sample_set: u8,
    pub volume: u8,
}

/// Discrete feedback emitted during judgement, drained once per tick by the
/// session owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackEvent {
    HitSound(HitSound),
    ComboBreak,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JudgementCounts {
    pub hit300: u32,
    pub hit100: u32,
    pub hit50: u32,
    pub miss: u32,
}

/// Running score totals for one play session. The only continuously mutated
/// state during gameplay; feeding it an identical judgement sequence always
/// reproduces the same totals.
#[derive(Debug, Clone)]
pub struct ScoreCounter {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub accuracy: f64,
    pub counts: JudgementCounts,
    total_value: u64,
    total_count: u64,
    difficulty_multiplier: u32,
    mod_multiplier: f64,
    combo_break_threshold: u32,
    feedback: Vec<FeedbackEvent>,
}

fn difficulty_multiplier(difficulty: &DifficultyRecord) -> u32 {
    let sum = difficulty.cs.floor() + difficulty.hp.floor() + difficulty.od.floor();
    match sum as i32 {
        i32::MIN..=5 => 2,
        6..=12 => 3,
        13..=17 => 4,
        18..=24 => 5,
        _ => 6,
    }
}

impl ScoreCounter {
    pub fn new(difficulty: &DifficultyRecord, config: &GameplayConfig) -> Self {
        Self {
            score: 0,
            combo: 0,
            max_combo: 0,
            accuracy: 1.0,
            counts: JudgementCounts::default(),
            total_value: 0,
            total_count: 0,
            difficulty_multiplier: difficulty_multiplier(difficulty),
            mod_multiplier: config.mod_multiplier,
            combo_break_threshold: config.combo_break_threshold,
            feedback: Vec::new(),
        }
    }

    /// Registers one scored event.
    ///
    /// * `combo_independent` — the raw value gets no combo bonus and does
    ///   not enter the accuracy tally (slider ticks, repeats, spin awards).
    /// * `suppress_combo_increment` — the combo stays as is (aggregate
    ///   slider/spinner judgements, whose sub-events already counted).
    /// * `non_consumable` — an aggregate addition whose edges already
    ///   emitted their own sounds; emits no hit-sound feedback.
    pub fn add(
        &mut self,
        raw: u32,
        combo_independent: bool,
        suppress_combo_increment: bool,
        non_consumable: bool,
        hit_sound: Option<HitSound>,
    ) {
        if !combo_independent {
            self.total_count += 1;
            self.total_value += u64::from(raw);
            self.accuracy = self.total_value as f64 / (self.total_count as f64 * 300.0);
        }

        if raw == 0 {
            if self.combo > self.combo_break_threshold {
                self.feedback.push(FeedbackEvent::ComboBreak);
            }
            self.combo = 0;
            return;
        }

        let combo_bonus = if combo_independent {
            0.0
        } else {
            f64::from(raw)
                * (f64::from(self.combo.saturating_sub(1))
                    * f64::from(self.difficulty_multiplier)
                    * self.mod_multiplier)
                / 25.0
        };
        self.score += (f64::from(raw) + combo_bonus).floor() as u64;

        if !suppress_combo_increment {
            self.combo += 1;
            if self.combo > self.max_combo {
                self.max_combo = self.combo;
                debug!("new max combo {}", self.max_combo);
            }
        }

        if !non_consumable
            && let Some(sound) = hit_sound
        {
            self.feedback.push(FeedbackEvent::HitSound(sound));
        }
    }

    /// Records a final per-object judgement in the grade counts.
    pub fn tally(&mut self, judgement: Judgement) {
        match judgement {
            Judgement::Hit300 => self.counts.hit300 += 1,
            Judgement::Hit100 => self.counts.hit100 += 1,
            Judgement::Hit50 => self.counts.hit50 += 1,
            Judgement::Miss => self.counts.miss += 1,
        }
    }

    pub fn drain_feedback(&mut self) -> Vec<FeedbackEvent> {
        std::mem::take(&mut self.feedback)
    }
}
