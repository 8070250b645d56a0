/// Endless Chronicle example — the scheduler driving the built-in pack on a
/// simulated clock.
///
/// A sequence: steady production → pause → resume with a catch-up burst →
///             a choice at the current node → unlimited speed → save.
///
/// Time is simulated so the run finishes instantly; a real host would pass
/// the elapsed time since startup to each tick.
///
/// Run with: cargo run --example endless_chronicle

use std::time::Duration;

use storyloom::core::persistence::{save_with_retry, MemoryStore, SnapshotStore};
use storyloom::core::pipeline::StoryEngine;
use storyloom::core::scheduler::{Scheduler, Speed};
use storyloom::schema::chapter::Chapter;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut engine = StoryEngine::builder()
        .seed(1871)
        .config_path("genre_data/engine.ron")
        .build()
        .expect("Failed to build engine");

    let mut scheduler = Scheduler::from_config(&engine.config().scheduler);
    scheduler.set_speed(Speed::per_second(2));
    let mut chronicle: Vec<Chapter> = Vec::new();

    // --- Three seconds of steady production ---
    for t in (0..=3000).step_by(500) {
        let produced = scheduler
            .tick(Duration::from_millis(t), &mut engine)
            .expect("Generation failed");
        for chapter in &produced {
            print_headline(chapter);
        }
        chronicle.extend(produced);
    }

    // --- The host is suspended for four seconds ---
    scheduler.pause(Duration::from_millis(3000));
    println!("\n(paused)\n");
    scheduler.resume(Duration::from_millis(7000));
    println!("(resumed with {} chapters owed)\n", scheduler.backlog());
    let burst = scheduler
        .tick(Duration::from_millis(7000), &mut engine)
        .expect("Generation failed");
    for chapter in &burst {
        print_headline(chapter);
    }
    chronicle.extend(burst);

    // --- Take the first option at the current node ---
    if let Some(option) = engine.current_options().first() {
        println!("\n> {}", option.label);
        let outcome = engine.choose(0).expect("Choice failed");
        println!("  now: {:?}\n", outcome.next);
    }

    // --- As fast as the frame cap allows ---
    scheduler.set_speed(Speed::Unlimited);
    scheduler.set_frame_cap(10);
    for frame in 0..3u64 {
        let produced = scheduler
            .tick(Duration::from_millis(7000 + frame * 16), &mut engine)
            .expect("Generation failed");
        println!("frame {}: {} chapters", frame, produced.len());
        chronicle.extend(produced);
    }

    // --- Print the most recent chapter in full ---
    if let Some(last) = chronicle.last() {
        println!("\n=== Chapter {}: {} ===", last.sequence, last.title);
        for paragraph in &last.paragraphs {
            println!("\n{}", paragraph);
        }
        println!();
    }

    // --- Save ---
    let mut store = MemoryStore::new();
    save_with_retry(&mut store, &engine.snapshot(chronicle.clone()), 3).expect("Save failed");
    let saved = store.load().expect("Load failed").expect("Nothing saved");
    println!(
        "Saved {} chapters; next is {} at node '{}'",
        saved.chapters.len(),
        saved.next_sequence,
        saved.current_node
    );
}

fn print_headline(chapter: &Chapter) {
    let extras = match (&chapter.quest, chapter.events.len()) {
        (Some(quest), 0) => format!(" [{}]", quest),
        (Some(quest), n) => format!(" [{}, {} events]", quest, n),
        (None, 0) => String::new(),
        (None, n) => format!(" [{} events]", n),
    };
    println!("{:>4}. {} ({} words){}", chapter.sequence, chapter.title, chapter.word_count, extras);
}
