use crate::beatmap::{ProcessedBeatmap, ProcessedKind, SliderData};
use crate::config::GameplayConfig;
use crate::events::{PlayEvent, PlayEventKind};
use crate::geometry::{normalized_angle_delta, Point};
use crate::score::{
    HitSound, Judgement, ScoreCounter, SLIDER_EDGE_VALUE, SLIDER_TICK_VALUE, SPINNER_BONUS_VALUE,
    SPINNER_SPIN_VALUE,
};
use cgmath::MetricSpace;
use log::debug;
use std::f64::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectPhase {
    Idle,
    Active,
    Hit,
    Missed,
    Resolved,
}

/// Which sub-events of a slider have been hit so far. The aggregate
/// judgement is derived from these at the slider's end.
#[derive(Debug, Clone, Copy, Default)]
pub struct SliderScoring {
    pub head_hit: bool,
    pub head_judged: bool,
    pub ticks_hit: u32,
    pub repeats_hit: u32,
    pub end_hit: bool,
    pub end_checked: bool,
}

/// Angular integration state of a spinner. Total radians only ever grow.
#[derive(Debug, Clone, Copy)]
pub struct SpinnerMotion {
    last_angle: Option<f32>,
    velocity: f64,
    last_accel_time: f64,
    pub total_radians: f64,
    pub completed_spins: u32,
    pub bonus_spins: u32,
    pub cleared: bool,
}

impl Default for SpinnerMotion {
    fn default() -> Self {
        Self {
            last_angle: None,
            velocity: 0.0,
            last_accel_time: f64::NEG_INFINITY,
            total_radians: 0.0,
            completed_spins: 0,
            bonus_spins: 0,
            cleared: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectState {
    pub phase: ObjectPhase,
    pub judgement: Option<Judgement>,
    pub hit_time: Option<f64>,
    pub resolved_at: Option<f64>,
    pub slider: Option<SliderScoring>,
    pub spinner: Option<SpinnerMotion>,
}

/// Per-tick input sample in playfield coordinates.
#[derive(Debug, Clone, Copy)]
pub struct InputState {
    pub cursor: Point,
    pub button_held: bool,
}

/// Per-object judgement state machine. Converts (event, input, time)
/// triples into score additions; owns no timing of its own.
pub struct JudgementEngine {
    pub states: Vec<ObjectState>,
    circle_radius: f32,
    follow_radius: f32,
    spinner_acceleration: f64,
    spinner_deceleration_delay: f64,
    spinner_velocity_cap: f64,
    activation_cursor: usize,
    first_unresolved: usize,
}

impl JudgementEngine {
    pub fn new(map: &ProcessedBeatmap, config: &GameplayConfig) -> Self {
        let states = map
            .objects
            .iter()
            .map(|object| ObjectState {
                phase: ObjectPhase::Idle,
                judgement: None,
                hit_time: None,
                resolved_at: None,
                slider: object.is_slider().then(SliderScoring::default),
                spinner: object.is_spinner().then(SpinnerMotion::default),
            })
            .collect();
        Self {
            states,
            circle_radius: map.circle_radius,
            follow_radius: map.circle_radius * config.follow_radius_factor,
            spinner_acceleration: config.spinner_acceleration,
            spinner_deceleration_delay: config.spinner_deceleration_delay_ms,
            spinner_velocity_cap: config.spinner_velocity_cap,
            activation_cursor: 0,
            first_unresolved: 0,
        }
    }

    pub fn all_resolved(&self) -> bool {
        self.first_unresolved >= self.states.len()
    }

    /// Idle objects whose approach window has opened become Active.
    pub fn activate(&mut self, map: &ProcessedBeatmap, time: f64) {
        while self.activation_cursor < self.states.len() {
            let object = &map.objects[self.activation_cursor];
            if object.start_time - map.approach_time > time {
                break;
            }
            let state = &mut self.states[self.activation_cursor];
            if state.phase == ObjectPhase::Idle {
                state.phase = ObjectPhase::Active;
            }
            self.activation_cursor += 1;
        }
    }

    fn advance_unresolved(&mut self) {
        while self.first_unresolved < self.states.len()
            && self.states[self.first_unresolved].phase == ObjectPhase::Resolved
        {
            self.first_unresolved += 1;
        }
    }

    fn resolve(&mut self, index: usize, judgement: Judgement, score: &mut ScoreCounter, time: f64) {
        let state = &mut self.states[index];
        state.judgement = Some(judgement);
        state.resolved_at = Some(time);
        state.phase = ObjectPhase::Resolved;
        score.tally(judgement);
        self.advance_unresolved();
    }

    fn in_follow_circle(&self, input: InputState, position: Option<Point>) -> bool {
        input.button_held
            && position.is_some_and(|p| input.cursor.distance(p) <= self.follow_radius)
    }

    /// Handles a button-press edge: at most one head (the earliest active
    /// unhit one under the cursor) is attempted per press.
    pub fn try_hit(
        &mut self,
        map: &ProcessedBeatmap,
        score: &mut ScoreCounter,
        cursor: Point,
        time: f64,
    ) {
        for index in self.first_unresolved..self.activation_cursor {
            let state = &self.states[index];
            if state.phase != ObjectPhase::Active {
                continue;
            }
            let object = &map.objects[index];
            if object.is_spinner() {
                continue;
            }
            if let Some(slider) = &state.slider
                && slider.head_judged
            {
                continue;
            }
            if cursor.distance(object.position) > self.circle_radius {
                continue;
            }

            // First object under the cursor consumes the press whether or
            // not the timing qualifies.
            let delta = time - object.start_time;
            if delta.abs() > map.windows.window_50 {
                return;
            }
            match object.kind {
                ProcessedKind::Circle => {
                    let judgement = map.windows.judgement_for_delta(delta.abs());
                    score.add(judgement.raw_value(), false, false, false, Some(object.hit_sound));
                    self.states[index].hit_time = Some(time);
                    self.states[index].phase = ObjectPhase::Hit;
                    self.resolve(index, judgement, score, time);
                }
                ProcessedKind::Slider(_) => {
                    let state = &mut self.states[index];
                    if let Some(slider) = &mut state.slider {
                        slider.head_hit = true;
                        slider.head_judged = true;
                    }
                    state.hit_time = Some(time);
                    state.phase = ObjectPhase::Hit;
                    score.add(SLIDER_EDGE_VALUE, true, false, false, Some(object.hit_sound));
                }
                ProcessedKind::Spinner(_) => unreachable!("spinners are skipped above"),
            }
            return;
        }
    }

    /// Judges one due event from the queue. Events arrive in time order;
    /// a future event or a spent object is an internal error and a no-op.
    pub fn judge_event(
        &mut self,
        map: &ProcessedBeatmap,
        score: &mut ScoreCounter,
        event: &PlayEvent,
        input: InputState,
        now: f64,
    ) {
        if event.time > now {
            debug_assert!(false, "judging an event {}ms in the future", event.time - now);
            return;
        }
        let index = event.object;
        if self.states[index].phase == ObjectPhase::Resolved {
            // The window-end of an already hit head is the one normal case.
            debug_assert!(
                event.kind == PlayEventKind::HeadHitWindowEnd,
                "re-judging a resolved object"
            );
            return;
        }
        let object = &map.objects[index];
        let tracking = self.in_follow_circle(input, event.position);

        match event.kind {
            PlayEventKind::HeadHitWindowEnd => match &object.kind {
                ProcessedKind::Circle => {
                    score.add(0, false, false, false, None);
                    self.states[index].phase = ObjectPhase::Missed;
                    self.resolve(index, Judgement::Miss, score, now);
                }
                ProcessedKind::Slider(_) => {
                    let state = &mut self.states[index];
                    if let Some(slider) = &mut state.slider
                        && !slider.head_judged
                    {
                        slider.head_judged = true;
                        state.phase = ObjectPhase::Missed;
                        // Breaks combo; accuracy waits for the aggregate.
                        score.add(0, true, false, false, None);
                    }
                }
                ProcessedKind::Spinner(_) => {}
            },
            PlayEventKind::SliderTick { .. } => {
                if tracking {
                    if let Some(slider) = &mut self.states[index].slider {
                        slider.ticks_hit += 1;
                    }
                    let sound = HitSound {
                        flags: 0,
                        sample_set: object.hit_sound.sample_set,
                        volume: object.hit_sound.volume,
                    };
                    score.add(SLIDER_TICK_VALUE, true, false, false, Some(sound));
                } else {
                    score.add(0, true, false, false, None);
                }
            }
            PlayEventKind::SliderRepeat { .. } => {
                if tracking {
                    if let Some(slider) = &mut self.states[index].slider {
                        slider.repeats_hit += 1;
                    }
                    score.add(SLIDER_EDGE_VALUE, true, false, false, event.hit_sound);
                } else {
                    score.add(0, true, false, false, None);
                }
            }
            PlayEventKind::SliderEndCheck => {
                if let Some(slider) = &mut self.states[index].slider {
                    slider.end_checked = true;
                    slider.end_hit = tracking;
                }
            }
            PlayEventKind::SliderEnd => {
                let scoring = self.states[index].slider.unwrap_or_default();
                if scoring.end_hit {
                    score.add(SLIDER_EDGE_VALUE, true, false, false, event.hit_sound);
                }
                if let ProcessedKind::Slider(data) = &object.kind {
                    let judgement = slider_aggregate(data, &scoring);
                    score.add(judgement.raw_value(), false, true, true, None);
                    self.resolve(index, judgement, score, now);
                }
            }
            PlayEventKind::SpinnerSpin => {
                // Sustained; integrated per tick through `spin`.
            }
            PlayEventKind::SpinnerEnd => {
                if let ProcessedKind::Spinner(data) = &object.kind {
                    let motion = self.states[index].spinner.unwrap_or_default();
                    let progress =
                        motion.total_radians / (TAU * f64::from(data.required_spins.max(1)));
                    let judgement = spinner_judgement(progress);
                    // Per-spin awards already extended the combo, so the
                    // terminal judgement only scores and plays its sound.
                    score.add(judgement.raw_value(), false, true, false, event.hit_sound);
                    self.resolve(index, judgement, score, now);
                }
            }
        }
    }

    /// Polls every spinner whose span contains `now`.
    pub fn spin_active(
        &mut self,
        map: &ProcessedBeatmap,
        score: &mut ScoreCounter,
        input: InputState,
        now: f64,
        dt: f64,
    ) {
        for index in self.first_unresolved..self.activation_cursor {
            let object = &map.objects[index];
            if object.is_spinner() && object.start_time <= now && now <= object.end_time {
                self.spin(map, score, index, input, now, dt);
            }
        }
    }

    /// Integrates one tick of spinner motion. Total radians are the
    /// absolute angle traveled, so progress never goes backwards.
    pub fn spin(
        &mut self,
        map: &ProcessedBeatmap,
        score: &mut ScoreCounter,
        index: usize,
        input: InputState,
        now: f64,
        dt: f64,
    ) {
        let ProcessedKind::Spinner(data) = &map.objects[index].kind else {
            return;
        };
        if self.states[index].phase == ObjectPhase::Resolved || dt <= 0.0 {
            return;
        }
        let center = map.objects[index].position;
        let Some(motion) = &mut self.states[index].spinner else {
            return;
        };

        if input.button_held {
            let angle = (input.cursor.y - center.y).atan2(input.cursor.x - center.x);
            if let Some(prev) = motion.last_angle {
                let delta = normalized_angle_delta(prev, angle);
                if delta != 0.0 {
                    let direction = if delta > 0.0 { 1.0 } else { -1.0 };
                    motion.velocity += direction * self.spinner_acceleration * dt;
                    motion.last_accel_time = now;
                }
            }
            motion.last_angle = Some(angle);
        } else {
            motion.last_angle = None;
        }

        if now - motion.last_accel_time > self.spinner_deceleration_delay {
            let brake = self.spinner_acceleration * dt;
            if motion.velocity.abs() <= brake {
                motion.velocity = 0.0;
            } else {
                motion.velocity -= motion.velocity.signum() * brake;
            }
        }
        motion.velocity = motion
            .velocity
            .clamp(-self.spinner_velocity_cap, self.spinner_velocity_cap);

        motion.total_radians += motion.velocity.abs() * dt;

        let whole_spins = (motion.total_radians / TAU).floor() as u32;
        let mut counted = motion.completed_spins + motion.bonus_spins;
        while counted < whole_spins {
            counted += 1;
            if motion.completed_spins < data.required_spins {
                motion.completed_spins += 1;
                if motion.completed_spins == data.required_spins {
                    motion.cleared = true;
                    debug!("spinner {index} cleared");
                }
                score.add(SPINNER_SPIN_VALUE, true, false, false, None);
            } else {
                motion.bonus_spins += 1;
                score.add(SPINNER_BONUS_VALUE, true, false, false, None);
            }
        }
        if self.states[index].phase == ObjectPhase::Active && input.button_held {
            self.states[index].phase = ObjectPhase::Hit;
        }
    }
}

fn slider_aggregate(data: &SliderData, scoring: &SliderScoring) -> Judgement {
    let total = 2 + data.tick_completions.len() as u32 + data.repeat.saturating_sub(1);
    let hits = u32::from(scoring.head_hit)
        + scoring.ticks_hit
        + scoring.repeats_hit
        + u32::from(scoring.end_hit);
    let fraction = f64::from(hits) / f64::from(total);
    if fraction >= 1.0 {
        Judgement::Hit300
    } else if fraction >= 0.5 {
        Judgement::Hit100
    } else if fraction > 0.0 {
        Judgement::Hit50
    } else {
        Judgement::Miss
    }
}

fn spinner_judgement(progress: f64) -> Judgement {
    if progress >= 1.0 {
        Judgement::Hit300
    } else if progress > 0.9 {
        Judgement::Hit100
    } else if progress > 0.75 {
        Judgement::Hit50
    } else {
        Judgement::Miss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beatmap::tests::{circle, plain_map};
    use crate::beatmap::ProcessedBeatmap;
    use crate::events;
    use pretty_assertions::assert_eq;

    fn single_circle() -> (ProcessedBeatmap, Vec<PlayEvent>, GameplayConfig) {
        let config = GameplayConfig::default();
        let map =
            ProcessedBeatmap::process(&plain_map(vec![circle(1000.0, 100.0, 100.0)]), &config)
                .unwrap();
        let queue = events::schedule(&map, &config);
        (map, queue, config)
    }

    fn held_at(x: f32, y: f32) -> InputState {
        InputState { cursor: Point::new(x, y), button_held: true }
    }

    #[test]
    fn exact_press_scores_300() {
        let (map, _, config) = single_circle();
        let mut engine = JudgementEngine::new(&map, &config);
        let mut score = ScoreCounter::new(&map.difficulty, &config);
        engine.activate(&map, 1000.0);
        engine.try_hit(&map, &mut score, Point::new(100.0, 100.0), 1000.0);
        assert_eq!(engine.states[0].judgement, Some(Judgement::Hit300));
        assert_eq!(score.score, 300);
        assert_eq!(score.combo, 1);
    }

    #[test]
    fn late_press_inside_50_window_scores_50() {
        let (map, _, config) = single_circle();
        let mut engine = JudgementEngine::new(&map, &config);
        let mut score = ScoreCounter::new(&map.difficulty, &config);
        engine.activate(&map, 1120.0);
        engine.try_hit(&map, &mut score, Point::new(100.0, 100.0), 1120.0);
        assert_eq!(engine.states[0].judgement, Some(Judgement::Hit50));
    }

    #[test]
    fn press_outside_circle_is_ignored() {
        let (map, _, config) = single_circle();
        let mut engine = JudgementEngine::new(&map, &config);
        let mut score = ScoreCounter::new(&map.difficulty, &config);
        engine.activate(&map, 1000.0);
        engine.try_hit(&map, &mut score, Point::new(400.0, 300.0), 1000.0);
        assert_eq!(engine.states[0].phase, ObjectPhase::Active);
        assert_eq!(score.score, 0);
    }

    #[test]
    fn window_end_turns_unhit_circle_into_miss() {
        let (map, queue, config) = single_circle();
        let mut engine = JudgementEngine::new(&map, &config);
        let mut score = ScoreCounter::new(&map.difficulty, &config);
        engine.activate(&map, queue[0].time);
        let idle_input = InputState { cursor: Point::new(0.0, 0.0), button_held: false };
        engine.judge_event(&map, &mut score, &queue[0], idle_input, queue[0].time);
        assert_eq!(engine.states[0].judgement, Some(Judgement::Miss));
        assert_eq!(score.combo, 0);
        assert_eq!(score.counts.miss, 1);
    }

    #[test]
    fn window_end_after_hit_is_a_no_op() {
        let (map, queue, config) = single_circle();
        let mut engine = JudgementEngine::new(&map, &config);
        let mut score = ScoreCounter::new(&map.difficulty, &config);
        engine.activate(&map, 1000.0);
        engine.try_hit(&map, &mut score, Point::new(100.0, 100.0), 1000.0);
        let before = score.score;
        engine.judge_event(&map, &mut score, &queue[0], held_at(100.0, 100.0), queue[0].time);
        assert_eq!(score.score, before);
        assert_eq!(score.counts.miss, 0);
    }

    #[test]
    fn spinner_progress_is_monotonic_under_mixed_deltas() {
        let config = GameplayConfig::default();
        let mut record = circle(0.0, 256.0, 192.0);
        record.kind = crate::beatmap::RawKind::Spinner { end_time: 3000.0 };
        let map = ProcessedBeatmap::process(&plain_map(vec![record]), &config).unwrap();
        let mut engine = JudgementEngine::new(&map, &config);
        let mut score = ScoreCounter::new(&map.difficulty, &config);
        engine.activate(&map, 0.0);

        let mut previous = 0.0;
        for step in 0..180 {
            let t = step as f64 * 16.0;
            // Mostly forward motion with some reversals and idle frames.
            let angle = match step % 7 {
                0..=4 => t * 0.02,
                5 => -t * 0.02,
                _ => 0.0,
            } as f32;
            let input = InputState {
                cursor: Point::new(256.0 + 100.0 * angle.cos(), 192.0 + 100.0 * angle.sin()),
                button_held: step % 11 != 10,
            };
            engine.spin(&map, &mut score, 0, input, t, 16.0);
            let total = engine.states[0].spinner.unwrap().total_radians;
            assert!(total >= previous, "total radians went backwards at step {step}");
            previous = total;
        }
    }

    #[test]
    fn spun_out_spinner_finishes_with_300() {
        let config = GameplayConfig::default();
        let mut record = circle(0.0, 256.0, 192.0);
        record.kind = crate::beatmap::RawKind::Spinner { end_time: 1000.0 };
        let map = ProcessedBeatmap::process(&plain_map(vec![record]), &config).unwrap();
        let queue = events::schedule(&map, &config);
        let mut engine = JudgementEngine::new(&map, &config);
        let mut score = ScoreCounter::new(&map.difficulty, &config);
        engine.activate(&map, 0.0);

        let required = match &map.objects[0].kind {
            ProcessedKind::Spinner(data) => data.required_spins,
            _ => unreachable!(),
        };
        // Force the motion past the requirement, then finalize.
        if let Some(motion) = &mut engine.states[0].spinner {
            motion.total_radians = TAU * f64::from(required) + 0.1;
        }
        let idle = InputState { cursor: Point::new(256.0, 192.0), button_held: false };
        engine.spin(&map, &mut score, 0, idle, 999.0, 16.0);
        assert_eq!(engine.states[0].spinner.unwrap().completed_spins, required);

        let end = queue.iter().find(|e| e.kind == PlayEventKind::SpinnerEnd).unwrap();
        engine.judge_event(&map, &mut score, end, idle, end.time);
        assert_eq!(engine.states[0].judgement, Some(Judgement::Hit300));
    }

    #[test]
    fn spinner_end_neither_extends_combo_nor_stays_silent() {
        let config = GameplayConfig::default();
        let mut record = circle(0.0, 256.0, 192.0);
        record.kind = crate::beatmap::RawKind::Spinner { end_time: 2000.0 };
        let map = ProcessedBeatmap::process(&plain_map(vec![record]), &config).unwrap();
        let queue = events::schedule(&map, &config);
        let mut engine = JudgementEngine::new(&map, &config);
        let mut score = ScoreCounter::new(&map.difficulty, &config);
        engine.activate(&map, 0.0);

        let required = match &map.objects[0].kind {
            ProcessedKind::Spinner(data) => data.required_spins,
            _ => unreachable!(),
        };
        // Two bonus spins past the requirement.
        if let Some(motion) = &mut engine.states[0].spinner {
            motion.total_radians = TAU * f64::from(required + 2) + 0.1;
        }
        let idle = InputState { cursor: Point::new(256.0, 192.0), button_held: false };
        engine.spin(&map, &mut score, 0, idle, 1999.0, 16.0);

        // Every counted spin extends the combo, bonus spins included.
        assert_eq!(score.combo, required + 2);

        let end = queue.iter().find(|e| e.kind == PlayEventKind::SpinnerEnd).unwrap();
        score.drain_feedback();
        engine.judge_event(&map, &mut score, end, idle, end.time);
        assert_eq!(engine.states[0].judgement, Some(Judgement::Hit300));
        // The terminal judgement scores without another combo step and
        // carries the spinner's hit sound.
        assert_eq!(score.max_combo, required + 2);
        assert_eq!(score.combo, required + 2);
        assert_eq!(
            score.drain_feedback(),
            vec![crate::score::FeedbackEvent::HitSound(map.objects[0].hit_sound)]
        );
    }

    #[test]
    fn abandoned_slider_aggregates_to_miss() {
        let config = GameplayConfig::default();
        let mut record = circle(0.0, 100.0, 100.0);
        record.kind = crate::beatmap::RawKind::Slider {
            repeat: 1,
            length: 100.0,
            curve_type: crate::geometry::CurveKind::Linear,
            control_points: vec![Point::new(100.0, 100.0), Point::new(200.0, 100.0)],
        };
        let map = ProcessedBeatmap::process(&plain_map(vec![record]), &config).unwrap();
        let queue = events::schedule(&map, &config);
        let mut engine = JudgementEngine::new(&map, &config);
        let mut score = ScoreCounter::new(&map.difficulty, &config);
        let idle = InputState { cursor: Point::new(0.0, 0.0), button_held: false };

        for event in &queue {
            engine.activate(&map, event.time);
            engine.judge_event(&map, &mut score, event, idle, event.time);
        }
        assert_eq!(engine.states[0].judgement, Some(Judgement::Miss));
        assert_eq!(score.counts.miss, 1);
        assert_eq!(score.combo, 0);
    }
}
