/// Corpus Audit — generates a corpus and reports how hard each pool was used.
///
/// Usage: corpus_audit [--chapters <n>] [--seed <n>] [--pack <path>] [--config <path>]

use std::process;

use storyloom::core::pipeline::StoryEngine;
use storyloom::schema::chapter::count_words;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Usage: corpus_audit [--chapters <n>] [--seed <n>] [--pack <path>] [--config <path>]");
        process::exit(0);
    }

    let mut chapters: Option<u64> = None;
    let mut seed: u64 = 42;
    let mut pack_path = None;
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--chapters" if i + 1 < args.len() => {
                i += 1;
                chapters = args[i].parse().ok();
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            "--pack" if i + 1 < args.len() => {
                i += 1;
                pack_path = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let mut builder = StoryEngine::builder().seed(seed);
    if let Some(ref path) = pack_path {
        builder = builder.content_path(path);
    }
    if let Some(ref path) = config_path {
        builder = builder.config_path(path);
    }
    let mut engine = match builder.build() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    let total = chapters.unwrap_or(engine.config().target_corpus_size);
    println!("Generating {} chapters from pack '{}' (seed {})", total, engine.pack_name(), seed);

    let mut words = 0usize;
    let mut shortest = usize::MAX;
    let mut quests = 0u64;
    let mut events = 0u64;
    for n in 1..=total {
        match engine.next_chapter() {
            Ok(chapter) => {
                let count = count_words(&chapter.paragraphs);
                words += count;
                shortest = shortest.min(count);
                quests += u64::from(chapter.quest.is_some());
                events += chapter.events.len() as u64;
            }
            Err(e) => {
                eprintln!("ERROR: chapter {} failed: {}", n, e);
                process::exit(1);
            }
        }
    }

    println!("\n=== Corpus ===\n");
    println!("  Chapters:        {}", total);
    println!("  Average words:   {}", words / total.max(1) as usize);
    println!("  Shortest:        {}", if total == 0 { 0 } else { shortest });
    println!("  With quests:     {}", quests);
    println!("  World events:    {}", events);

    println!("\n=== Pools ===\n");
    println!(
        "  {:<26} {:>6} {:>8} {:>6} {:>8} {:>7}",
        "pool", "size", "draws", "max", "ceiling", "unused"
    );
    let mut over_ceiling = 0;
    for report in engine.pool_report() {
        let ceiling = report.ceiling.map_or("-".to_string(), |c| c.to_string());
        let flag = if report.pressured { "  pressured" } else { "" };
        println!(
            "  {:<26} {:>6} {:>8} {:>6} {:>8} {:>7}{}",
            report.pool.as_str(),
            report.size,
            report.total_draws,
            report.max_uses,
            ceiling,
            report.unused,
            flag
        );
        if report.ceiling.is_some_and(|c| report.max_uses > c) {
            over_ceiling += 1;
        }
    }

    let dupes = engine.corpus().duplicate_titles();
    println!("\n=== Titles ===\n");
    if dupes.is_empty() {
        println!("  No repeated titles");
    }
    for (title, count) in dupes.iter().take(20) {
        println!("  {:>3}x  {}", count, title);
    }
    if dupes.len() > 20 {
        println!("  ... and {} more", dupes.len() - 20);
    }

    if over_ceiling > 0 {
        eprintln!("\nERROR: {} pools exceeded their reuse ceiling", over_ceiling);
        process::exit(1);
    }
}
