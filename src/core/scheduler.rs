/// Generation scheduler — a host-agnostic state machine that turns elapsed
/// time into chapters.
///
/// The scheduler owns no timer. The host calls `tick(now)` from whatever
/// loop it has (a frame callback, a game loop, a test) and receives the
/// chapters that became due, at most `frame_cap` per tick.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::core::config::SchedulerConfig;
use crate::core::pipeline::EngineError;
use crate::schema::chapter::Chapter;

/// Anything that can produce the next chapter in sequence.
pub trait ChapterSource {
    fn next_chapter(&mut self) -> Result<Chapter, EngineError>;
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Generation failed mid-batch. `chapters` holds what the batch
    /// produced before the failure; the scheduler is now paused.
    #[error("chapter generation failed after {count} chapters in this batch: {source}", count = .chapters.len())]
    BatchFailed {
        chapters: Vec<Chapter>,
        #[source]
        source: EngineError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speed {
    /// `chapters` every `interval`.
    PerInterval { chapters: u32, interval: Duration },
    /// `frame_cap` chapters every tick.
    Unlimited,
}

impl Speed {
    pub fn per_second(chapters: u32) -> Self {
        Speed::PerInterval {
            chapters,
            interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Running,
    Paused,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    speed: Speed,
    state: SchedulerState,
    frame_cap: u32,
    last_tick: Option<Duration>,
    paused_at: Option<Duration>,
    /// Fractional progress toward the next chapter, in
    /// nanoseconds times chapters per interval.
    credit: u128,
    /// Chapters due but not yet produced.
    backlog: u64,
    produced: u64,
    last_error: Option<String>,
}

impl Scheduler {
    pub fn new(speed: Speed, frame_cap: u32) -> Self {
        Self {
            speed,
            state: SchedulerState::Running,
            frame_cap: frame_cap.max(1),
            last_tick: None,
            paused_at: None,
            credit: 0,
            backlog: 0,
            produced: 0,
            last_error: None,
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        let speed = if config.unlimited {
            Speed::Unlimited
        } else {
            Speed::PerInterval {
                chapters: config.chapters_per_interval,
                interval: Duration::from_millis(config.interval_ms),
            }
        };
        Self::new(speed, config.frame_cap)
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn frame_cap(&self) -> u32 {
        self.frame_cap
    }

    pub fn backlog(&self) -> u64 {
        self.backlog
    }

    /// Chapters produced since construction.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Change speed. Chapters already due stay due; partial progress
    /// toward the next one is dropped.
    pub fn set_speed(&mut self, speed: Speed) {
        self.credit = 0;
        self.speed = speed;
        tracing::debug!(?speed, "scheduler speed changed");
    }

    pub fn set_frame_cap(&mut self, frame_cap: u32) {
        self.frame_cap = frame_cap.max(1);
    }

    /// Pause at `now`. Time up to `now` still counts; nothing more is
    /// produced until `resume`.
    pub fn pause(&mut self, now: Duration) {
        if self.state != SchedulerState::Running {
            return;
        }
        self.accrue(now);
        self.state = SchedulerState::Paused;
        self.paused_at = Some(now);
        tracing::debug!(at_ms = now.as_millis() as u64, "scheduler paused");
    }

    /// Resume at `now`. The paused gap becomes backlog, emitted as a
    /// catch-up burst over the following ticks.
    pub fn resume(&mut self, now: Duration) {
        if self.state != SchedulerState::Paused {
            return;
        }
        let gap = self
            .paused_at
            .map_or(Duration::ZERO, |at| now.saturating_sub(at));
        self.credit_time(gap);
        self.state = SchedulerState::Running;
        self.paused_at = None;
        self.last_error = None;
        self.last_tick = Some(now);
        tracing::debug!(gap_ms = gap.as_millis() as u64, backlog = self.backlog, "scheduler resumed");
    }

    /// Add `elapsed` worth of chapters to the backlog without a tick, for
    /// hosts that were suspended. While paused, the reported time counts
    /// as part of the paused gap, so `resume` does not credit it again.
    /// A stopped scheduler ignores it.
    pub fn catch_up(&mut self, elapsed: Duration) {
        match self.state {
            SchedulerState::Stopped => return,
            SchedulerState::Paused => {
                if let Some(at) = self.paused_at.as_mut() {
                    *at = at.saturating_add(elapsed);
                }
            }
            SchedulerState::Running => {}
        }
        self.credit_time(elapsed);
    }

    fn credit_time(&mut self, elapsed: Duration) {
        if let Speed::PerInterval { chapters, interval } = self.speed {
            let interval = interval.as_nanos();
            if interval == 0 {
                return;
            }
            self.credit += elapsed.as_nanos() * u128::from(chapters);
            let due = self.credit / interval;
            self.credit %= interval;
            self.backlog = self
                .backlog
                .saturating_add(u64::try_from(due).unwrap_or(u64::MAX));
        }
    }

    /// Stop production. The backlog is discarded.
    pub fn stop(&mut self) {
        self.state = SchedulerState::Stopped;
        self.backlog = 0;
        self.credit = 0;
        self.paused_at = None;
        tracing::debug!(produced = self.produced, "scheduler stopped");
    }

    /// Restart a stopped scheduler, counting time from `now`.
    pub fn start(&mut self, now: Duration) {
        if self.state == SchedulerState::Stopped {
            self.state = SchedulerState::Running;
            self.last_tick = Some(now);
            self.last_error = None;
        }
    }

    fn accrue(&mut self, now: Duration) {
        let elapsed = match self.last_tick {
            Some(last) => now.saturating_sub(last),
            None => Duration::ZERO,
        };
        self.last_tick = Some(now);
        self.credit_time(elapsed);
    }

    /// Produce the chapters due at `now`, in sequence order. Paused and
    /// stopped schedulers produce nothing. A generation failure pauses the
    /// scheduler and records the error; the chapters produced before it
    /// are returned inside the error.
    pub fn tick<S: ChapterSource + ?Sized>(
        &mut self,
        now: Duration,
        source: &mut S,
    ) -> Result<Vec<Chapter>, SchedulerError> {
        if self.state != SchedulerState::Running {
            return Ok(Vec::new());
        }
        self.accrue(now);

        let batch = match self.speed {
            Speed::Unlimited => u64::from(self.frame_cap),
            Speed::PerInterval { interval, .. } if interval.is_zero() => u64::from(self.frame_cap),
            Speed::PerInterval { .. } => self.backlog.min(u64::from(self.frame_cap)),
        };

        let mut chapters = Vec::with_capacity(batch as usize);
        for _ in 0..batch {
            match source.next_chapter() {
                Ok(chapter) => {
                    self.produced += 1;
                    if matches!(self.speed, Speed::PerInterval { .. }) {
                        self.backlog = self.backlog.saturating_sub(1);
                    }
                    chapters.push(chapter);
                }
                Err(source) => {
                    tracing::error!(error = %source, produced = chapters.len(), "generation failed, pausing scheduler");
                    self.last_error = Some(source.to_string());
                    self.state = SchedulerState::Paused;
                    self.paused_at = Some(now);
                    return Err(SchedulerError::BatchFailed { chapters, source });
                }
            }
        }
        if !chapters.is_empty() {
            tracing::trace!(count = chapters.len(), backlog = self.backlog, "tick produced chapters");
        }
        Ok(chapters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::schema::branch::NodeId;

    /// Produces numbered empty chapters, optionally failing at one sequence.
    struct Counter {
        next: u64,
        fail_at: Option<u64>,
    }

    impl Counter {
        fn new() -> Self {
            Self { next: 1, fail_at: None }
        }
    }

    impl ChapterSource for Counter {
        fn next_chapter(&mut self) -> Result<Chapter, EngineError> {
            if self.fail_at == Some(self.next) {
                return Err(EngineError::DuplicateChapter {
                    sequence: self.next,
                    attempts: 8,
                });
            }
            let chapter = Chapter {
                sequence: self.next,
                title: format!("Chapter {}", self.next),
                paragraphs: Vec::new(),
                word_count: 0,
                generated_at: Utc::now(),
                branch: NodeId::new("root"),
                quest: None,
                events: Vec::new(),
            };
            self.next += 1;
            Ok(chapter)
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn every_100ms() -> Scheduler {
        Scheduler::new(
            Speed::PerInterval {
                chapters: 1,
                interval: ms(100),
            },
            25,
        )
    }

    #[test]
    fn steady_cadence() {
        let mut scheduler = every_100ms();
        let mut source = Counter::new();
        let mut total = 0;
        for t in (0..=500).step_by(100) {
            total += scheduler.tick(ms(t), &mut source).unwrap().len();
        }
        assert_eq!(total, 5);
    }

    #[test]
    fn fractional_progress_carries_between_ticks() {
        let mut scheduler = every_100ms();
        let mut source = Counter::new();
        let mut total = 0;
        for t in (0..=1000).step_by(30) {
            total += scheduler.tick(ms(t), &mut source).unwrap().len();
        }
        // Last tick at 990 ms.
        assert_eq!(total, 9);
    }

    #[test]
    fn resume_bursts_the_paused_gap() {
        let mut scheduler = every_100ms();
        let mut source = Counter::new();
        for t in (0..=500).step_by(100) {
            scheduler.tick(ms(t), &mut source).unwrap();
        }
        scheduler.pause(ms(500));
        assert!(scheduler.tick(ms(1000), &mut source).unwrap().is_empty());
        scheduler.resume(ms(1500));

        let burst = scheduler.tick(ms(1500), &mut source).unwrap();
        let sequences: Vec<u64> = burst.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, (6..=15).collect::<Vec<u64>>());

        let next = scheduler.tick(ms(1600), &mut source).unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].sequence, 16);
    }

    #[test]
    fn frame_cap_spreads_backlog() {
        let mut scheduler = Scheduler::new(
            Speed::PerInterval {
                chapters: 1,
                interval: ms(10),
            },
            4,
        );
        let mut source = Counter::new();
        scheduler.tick(ms(0), &mut source).unwrap();
        assert_eq!(scheduler.tick(ms(100), &mut source).unwrap().len(), 4);
        assert_eq!(scheduler.backlog(), 6);
        assert_eq!(scheduler.tick(ms(100), &mut source).unwrap().len(), 4);
        assert_eq!(scheduler.tick(ms(100), &mut source).unwrap().len(), 2);
        assert_eq!(scheduler.tick(ms(100), &mut source).unwrap().len(), 0);
    }

    #[test]
    fn unlimited_runs_until_stopped() {
        let mut scheduler = Scheduler::new(Speed::Unlimited, 7);
        let mut source = Counter::new();
        for t in 0..3 {
            assert_eq!(scheduler.tick(ms(t), &mut source).unwrap().len(), 7);
        }
        scheduler.stop();
        assert!(scheduler.tick(ms(4), &mut source).unwrap().is_empty());
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(scheduler.produced(), 21);

        scheduler.start(ms(5));
        assert_eq!(scheduler.tick(ms(5), &mut source).unwrap().len(), 7);
    }

    #[test]
    fn catch_up_adds_backlog() {
        let mut scheduler = every_100ms();
        let mut source = Counter::new();
        scheduler.tick(ms(0), &mut source).unwrap();
        scheduler.catch_up(ms(350));
        assert_eq!(scheduler.backlog(), 3);
        assert_eq!(scheduler.tick(ms(0), &mut source).unwrap().len(), 3);
    }

    #[test]
    fn catch_up_while_paused_is_not_counted_twice() {
        let mut scheduler = every_100ms();
        let mut source = Counter::new();
        scheduler.tick(ms(0), &mut source).unwrap();
        scheduler.pause(ms(0));
        scheduler.catch_up(ms(1000));
        assert_eq!(scheduler.backlog(), 10);
        scheduler.resume(ms(1000));
        assert_eq!(scheduler.backlog(), 10);

        let burst = scheduler.tick(ms(1000), &mut source).unwrap();
        let sequences: Vec<u64> = burst.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, (1..=10).collect::<Vec<u64>>());
        assert_eq!(scheduler.tick(ms(1100), &mut source).unwrap().len(), 1);
    }

    #[test]
    fn pause_gap_beyond_reported_catch_up_still_counts() {
        let mut scheduler = every_100ms();
        let mut source = Counter::new();
        scheduler.tick(ms(0), &mut source).unwrap();
        scheduler.pause(ms(0));
        scheduler.catch_up(ms(400));
        scheduler.resume(ms(1000));
        assert_eq!(scheduler.backlog(), 10);
        assert_eq!(scheduler.tick(ms(1000), &mut source).unwrap().len(), 10);
    }

    #[test]
    fn stopped_scheduler_ignores_catch_up() {
        let mut scheduler = every_100ms();
        scheduler.stop();
        scheduler.catch_up(ms(1000));
        assert_eq!(scheduler.backlog(), 0);
    }

    #[test]
    fn failure_pauses_and_keeps_partial_batch() {
        let mut scheduler = every_100ms();
        let mut source = Counter {
            next: 1,
            fail_at: Some(3),
        };
        scheduler.tick(ms(0), &mut source).unwrap();
        match scheduler.tick(ms(500), &mut source) {
            Err(SchedulerError::BatchFailed { chapters, source }) => {
                assert_eq!(chapters.len(), 2);
                assert!(matches!(source, EngineError::DuplicateChapter { sequence: 3, .. }));
            }
            Ok(chapters) => panic!("expected failure, got {} chapters", chapters.len()),
        }
        assert_eq!(scheduler.state(), SchedulerState::Paused);
        assert!(scheduler.last_error().is_some());
        // Chapters that were due remain due.
        assert_eq!(scheduler.backlog(), 3);
        assert!(scheduler.tick(ms(600), &mut source).unwrap().is_empty());

        source.fail_at = None;
        scheduler.resume(ms(600));
        assert!(scheduler.last_error().is_none());
        let chapters = scheduler.tick(ms(600), &mut source).unwrap();
        assert_eq!(chapters.first().map(|c| c.sequence), Some(3));
    }

    #[test]
    fn speed_change_keeps_due_chapters() {
        let mut scheduler = every_100ms();
        let mut source = Counter::new();
        scheduler.tick(ms(0), &mut source).unwrap();
        scheduler.pause(ms(300));
        assert_eq!(scheduler.backlog(), 3);
        scheduler.set_speed(Speed::per_second(1));
        scheduler.resume(ms(300));
        assert_eq!(scheduler.tick(ms(300), &mut source).unwrap().len(), 3);
        assert_eq!(scheduler.tick(ms(1300), &mut source).unwrap().len(), 1);
    }

    #[test]
    fn from_config_defaults() {
        let scheduler = Scheduler::from_config(&SchedulerConfig::default());
        assert_eq!(scheduler.speed(), Speed::per_second(1));
        assert_eq!(scheduler.frame_cap(), 25);
        assert_eq!(scheduler.state(), SchedulerState::Running);
    }
}
