use crate::beatmap::{ProcessedBeatmap, ProcessedKind};
use crate::clock::{PlayClock, TimeSource};
use crate::config::GameplayConfig;
use crate::events::{self, PlayEvent};
use crate::geometry::Point;
use crate::judgement::{InputState, JudgementEngine, ObjectPhase};
use crate::score::{FeedbackEvent, Judgement, ScoreCounter};
use log::info;
use std::f64::consts::TAU;
use std::sync::Arc;

/// Read-only per-tick view of one hit object, handed to the renderer.
#[derive(Debug, Clone, Copy)]
pub struct OnscreenObject {
    pub index: usize,
    pub position: Point,
    pub phase: ObjectPhase,
    pub judgement: Option<Judgement>,
    /// Approach progress, 0 when the object appears and 1 at its start
    /// time.
    pub approach: f32,
    /// Full spins so far, present for spinners only.
    pub spins_spun: Option<f64>,
}

/// One play-through of a processed beatmap. Owns every piece of mutable
/// gameplay state; dropping it aborts the session with nothing leaking
/// into the next one.
pub struct PlaySession {
    map: Arc<ProcessedBeatmap>,
    config: GameplayConfig,
    clock: PlayClock,
    queue: Vec<PlayEvent>,
    queue_cursor: usize,
    engine: JudgementEngine,
    pub score: ScoreCounter,
    previous_button: bool,
    last_tick_time: Option<f64>,
    current_time: f64,
    finished: bool,
}

impl PlaySession {
    pub fn new(
        map: Arc<ProcessedBeatmap>,
        config: GameplayConfig,
        source: Box<dyn TimeSource>,
    ) -> Self {
        let queue = events::schedule(&map, &config);
        let engine = JudgementEngine::new(&map, &config);
        let score = ScoreCounter::new(&map.difficulty, &config);
        let clock = PlayClock::new(source, &config);
        info!(
            "play session started: {} objects, {} events",
            map.objects.len(),
            queue.len()
        );
        Self {
            map,
            config,
            clock,
            queue,
            queue_cursor: 0,
            engine,
            score,
            previous_button: false,
            last_tick_time: None,
            current_time: 0.0,
            finished: false,
        }
    }

    /// Runs one gameplay tick at the clock's current reading.
    pub fn tick(&mut self, input: InputState) {
        let time = self.clock.now_ms();
        self.tick_at(time, input);
    }

    /// Runs one gameplay tick at an explicit song time. Input is sampled
    /// once per tick; all due events are judged in queue order.
    pub fn tick_at(&mut self, time: f64, input: InputState) {
        let dt = self
            .last_tick_time
            .map_or(0.0, |last| (time - last).max(0.0));
        self.current_time = time;

        self.engine.activate(&self.map, time);

        if input.button_held && !self.previous_button {
            self.engine.try_hit(&self.map, &mut self.score, input.cursor, time);
        }
        self.engine.spin_active(&self.map, &mut self.score, input, time, dt);

        while self
            .queue
            .get(self.queue_cursor)
            .is_some_and(|event| event.time <= time)
        {
            let event = &self.queue[self.queue_cursor];
            self.engine.judge_event(&self.map, &mut self.score, event, input, time);
            self.queue_cursor += 1;
        }

        self.previous_button = input.button_held;
        self.last_tick_time = Some(time);

        if !self.finished && self.queue_cursor == self.queue.len() && self.engine.all_resolved() {
            self.finished = true;
            info!(
                "play session finished: score {} accuracy {:.2}% max combo {}",
                self.score.score,
                self.score.accuracy * 100.0,
                self.score.max_combo
            );
        }
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn map(&self) -> &ProcessedBeatmap {
        &self.map
    }

    /// Judgement feedback accumulated since the last drain: hit sounds for
    /// the audio layer and combo-break signals.
    pub fn drain_feedback(&mut self) -> Vec<FeedbackEvent> {
        self.score.drain_feedback()
    }

    /// Back-to-front list of objects currently visible: approaching,
    /// active, or fading out after resolution.
    pub fn onscreen(&self) -> Vec<OnscreenObject> {
        let time = self.current_time;
        let fade = self.config.fade_out_ms;
        let mut visible = Vec::new();
        for &index in &self.map.draw_order {
            let object = &self.map.objects[index];
            if time < object.start_time - self.map.approach_time
                || time > object.end_time + fade
            {
                continue;
            }
            let state = &self.engine.states[index];
            if state
                .resolved_at
                .is_some_and(|resolved| time > resolved + fade)
            {
                continue;
            }
            let approach = ((time - (object.start_time - self.map.approach_time))
                / self.map.approach_time)
                .clamp(0.0, 1.0) as f32;
            let spins_spun = match object.kind {
                ProcessedKind::Spinner(_) => {
                    state.spinner.map(|motion| motion.total_radians / TAU)
                }
                _ => None,
            };
            visible.push(OnscreenObject {
                index,
                position: object.position,
                phase: state.phase,
                judgement: state.judgement,
                approach,
                spins_spun,
            });
        }
        visible
    }

    /// Discards all judgement and scoring state and re-anchors the clock;
    /// the processed beatmap and event queue are reused as-is.
    pub fn restart(&mut self) {
        self.engine = JudgementEngine::new(&self.map, &self.config);
        self.score = ScoreCounter::new(&self.map.difficulty, &self.config);
        self.queue_cursor = 0;
        self.previous_button = false;
        self.last_tick_time = None;
        self.current_time = 0.0;
        self.finished = false;
        self.clock.resync();
        info!("play session restarted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beatmap::tests::{circle, plain_map};
    use crate::beatmap::ProcessedBeatmap;
    use pretty_assertions::assert_eq;

    struct SilentSource;

    impl TimeSource for SilentSource {
        fn current_song_time_ms(&self) -> f64 {
            0.0
        }
    }

    fn session(objects: Vec<crate::beatmap::HitObjectRecord>) -> PlaySession {
        let config = GameplayConfig::default();
        let map = Arc::new(ProcessedBeatmap::process(&plain_map(objects), &config).unwrap());
        PlaySession::new(map, config, Box::new(SilentSource))
    }

    fn idle() -> InputState {
        InputState { cursor: Point::new(0.0, 0.0), button_held: false }
    }

    #[test]
    fn objects_enter_and_leave_the_snapshot() {
        let mut play = session(vec![circle(2000.0, 100.0, 100.0)]);
        play.tick_at(0.0, idle());
        assert!(play.onscreen().is_empty());

        // AR 5: visible from 800ms on.
        play.tick_at(900.0, idle());
        let visible = play.onscreen();
        assert_eq!(visible.len(), 1);
        assert!(visible[0].approach > 0.0 && visible[0].approach < 1.0);

        // Missed at 2150, faded out 175ms later.
        play.tick_at(2400.0, idle());
        assert!(play.onscreen().is_empty());
    }

    #[test]
    fn pressing_on_the_circle_scores_and_finishes() {
        let mut play = session(vec![circle(1000.0, 100.0, 100.0)]);
        play.tick_at(900.0, idle());
        play.tick_at(1000.0, InputState {
            cursor: Point::new(100.0, 100.0),
            button_held: true,
        });
        assert_eq!(play.score.score, 300);
        // Queue drains once the window-end event passes.
        play.tick_at(1200.0, idle());
        assert!(play.finished());
    }

    #[test]
    fn held_button_does_not_retrigger_hits() {
        let mut play = session(vec![circle(1000.0, 100.0, 100.0), circle(1100.0, 100.0, 100.0)]);
        let pressing = InputState { cursor: Point::new(96.0, 96.0), button_held: true };
        play.tick_at(990.0, pressing);
        // Still held: the second circle must not be hit by the same press.
        play.tick_at(1100.0, pressing);
        assert_eq!(play.score.counts.hit300 + play.score.counts.hit100, 1);
    }

    #[test]
    fn restart_discards_judgement_state() {
        let mut play = session(vec![circle(1000.0, 100.0, 100.0)]);
        play.tick_at(1000.0, InputState {
            cursor: Point::new(100.0, 100.0),
            button_held: true,
        });
        play.tick_at(1200.0, idle());
        assert!(play.finished());

        play.restart();
        assert!(!play.finished());
        assert_eq!(play.score.score, 0);
        assert_eq!(play.score.combo, 0);
        play.tick_at(900.0, idle());
        assert!(play.onscreen().iter().all(|o| o.judgement.is_none()));
    }
}
