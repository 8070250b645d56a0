//! WASM bindings for storyloom — drives an endless chronicle from a web page.

use std::time::Duration;
use wasm_bindgen::prelude::*;

use storyloom::core::content::ContentPack;
use storyloom::core::persistence::Snapshot;
use storyloom::core::pipeline::StoryEngine;
use storyloom::core::scheduler::{Scheduler, SchedulerError, SchedulerState, Speed};
use storyloom::schema::branch::Transition;
use storyloom::schema::chapter::Chapter;

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct TickOutput<'a> {
    chapters: &'a [Chapter],
    error: Option<String>,
    state: &'static str,
    backlog: u64,
}

#[derive(serde::Serialize)]
struct OptionInfo {
    index: usize,
    label: String,
}

#[derive(serde::Serialize)]
struct NodeInfo {
    node: String,
    text: String,
    ending: Option<String>,
    options: Vec<OptionInfo>,
}

#[derive(serde::Serialize)]
struct ChoiceInfo {
    ending: Option<String>,
    node: Option<String>,
    changed: Vec<String>,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------
fn at(now_ms: f64) -> Duration {
    if now_ms.is_finite() && now_ms > 0.0 {
        Duration::try_from_secs_f64(now_ms / 1000.0).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    }
}

fn state_label(state: SchedulerState) -> &'static str {
    match state {
        SchedulerState::Running => "running",
        SchedulerState::Paused => "paused",
        SchedulerState::Stopped => "stopped",
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

// ---------------------------------------------------------------------------
// StoryHandle, the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct StoryHandle {
    engine: StoryEngine,
    scheduler: Scheduler,
    history: Vec<Chapter>,
}

#[wasm_bindgen]
impl StoryHandle {
    /// Create a story from the built-in pack, or from `pack_ron` when given.
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64, pack_ron: Option<String>) -> Result<StoryHandle, JsError> {
        let pack = match pack_ron {
            Some(ref src) => ContentPack::parse_ron(src),
            None => ContentPack::builtin(),
        }
        .map_err(|e| JsError::new(&format!("Content pack error: {e}")))?;

        let engine = StoryEngine::builder()
            .seed(seed)
            .content(pack)
            .build()
            .map_err(|e| JsError::new(&format!("Engine build error: {e}")))?;
        let scheduler = Scheduler::from_config(&engine.config().scheduler);

        Ok(StoryHandle {
            engine,
            scheduler,
            history: Vec::new(),
        })
    }

    /// Produce whatever is due at `now_ms` (milliseconds since the page
    /// started). Returns `{chapters, error, state, backlog}` as JSON.
    pub fn tick(&mut self, now_ms: f64) -> Result<String, JsError> {
        let (chapters, error) = match self.scheduler.tick(at(now_ms), &mut self.engine) {
            Ok(chapters) => (chapters, None),
            Err(SchedulerError::BatchFailed { chapters, source }) => (chapters, Some(source.to_string())),
        };
        let json = to_json(&TickOutput {
            chapters: &chapters,
            error,
            state: state_label(self.scheduler.state()),
            backlog: self.scheduler.backlog(),
        })?;
        self.history.extend(chapters);
        Ok(json)
    }

    pub fn pause(&mut self, now_ms: f64) {
        self.scheduler.pause(at(now_ms));
    }

    pub fn resume(&mut self, now_ms: f64) {
        self.scheduler.resume(at(now_ms));
    }

    pub fn start(&mut self, now_ms: f64) {
        self.scheduler.start(at(now_ms));
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    /// `chapters` every `interval_ms` milliseconds.
    pub fn set_speed(&mut self, chapters: u32, interval_ms: u32) {
        self.scheduler.set_speed(Speed::PerInterval {
            chapters,
            interval: Duration::from_millis(u64::from(interval_ms)),
        });
    }

    pub fn set_unlimited(&mut self) {
        self.scheduler.set_speed(Speed::Unlimited);
    }

    pub fn set_frame_cap(&mut self, frame_cap: u32) {
        self.scheduler.set_frame_cap(frame_cap);
    }

    pub fn state(&self) -> String {
        state_label(self.scheduler.state()).to_string()
    }

    pub fn chapter_count(&self) -> usize {
        self.history.len()
    }

    /// The current node and its options as JSON.
    pub fn options(&self) -> Result<String, JsError> {
        let node = self
            .engine
            .graph()
            .node(self.engine.current_node())
            .map_err(|e| JsError::new(&format!("Graph error: {e}")))?;
        to_json(&NodeInfo {
            node: node.id.to_string(),
            text: node.text.clone(),
            ending: self.engine.ending().map(str::to_string),
            options: self
                .engine
                .current_options()
                .iter()
                .enumerate()
                .map(|(index, option)| OptionInfo {
                    index,
                    label: option.label.clone(),
                })
                .collect(),
        })
    }

    /// Take option `index`. Returns the new node or ending and the names of
    /// the characters whose state changed.
    pub fn choose(&mut self, index: usize) -> Result<String, JsError> {
        let outcome = self
            .engine
            .choose(index)
            .map_err(|e| JsError::new(&format!("Choice error: {e}")))?;
        let (node, ending) = match outcome.next {
            Transition::Node(node) => (Some(node.to_string()), None),
            Transition::Ending(ending) => (None, Some(ending)),
        };
        to_json(&ChoiceInfo {
            ending,
            node,
            changed: outcome.applied.into_iter().map(|s| s.name).collect(),
        })
    }

    /// Every character's current state as JSON.
    pub fn characters(&self) -> Result<String, JsError> {
        let states: Vec<_> = self.engine.relationships().characters().collect();
        to_json(&states)
    }

    /// Full engine state plus the chapters produced so far, as JSON.
    pub fn snapshot(&self) -> Result<String, JsError> {
        to_json(&self.engine.snapshot(self.history.clone()))
    }

    /// Restore from a `snapshot` string. The scheduler is stopped; call
    /// `start` to continue.
    pub fn restore(&mut self, snapshot_json: &str) -> Result<(), JsError> {
        let snapshot: Snapshot = serde_json::from_str(snapshot_json)
            .map_err(|e| JsError::new(&format!("Invalid snapshot JSON: {e}")))?;
        self.history = self
            .engine
            .restore(snapshot)
            .map_err(|e| JsError::new(&format!("Restore error: {e}")))?;
        self.scheduler.stop();
        Ok(())
    }
}
