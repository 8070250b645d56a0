/// Preview — interactive shell for reading chapters and taking choices.
///
/// Usage: preview [--pack <path>] [--config <path>] [--seed <n>]
///
/// Commands:
///   next [n]          generate the next n chapters (default 1)
///   options           list the choices at the current node
///   choose <i>        take option i
///   characters        show every character's scores
///   pools             show pool usage
///   save <path>       write a snapshot
///   load <path>       restore a snapshot
///   seed <n>          restart with a new seed
///   help              list commands
///   quit              exit

use std::io::{self, BufRead, Write};

use storyloom::core::persistence::{save_with_retry, RonFileStore, SnapshotStore};
use storyloom::core::pipeline::StoryEngine;
use storyloom::schema::branch::Transition;
use storyloom::schema::chapter::Chapter;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut pack_path = None;
    let mut config_path = None;
    let mut seed: u64 = 42;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--pack" if i + 1 < args.len() => {
                i += 1;
                pack_path = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            "--help" | "-h" => {
                print_usage();
                return;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let build = |seed: u64| {
        let mut builder = StoryEngine::builder().seed(seed);
        if let Some(ref path) = pack_path {
            builder = builder.content_path(path);
        }
        if let Some(ref path) = config_path {
            builder = builder.config_path(path);
        }
        builder.build()
    };

    let mut engine = match build(seed) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };
    let mut history: Vec<Chapter> = Vec::new();

    println!("Pack: {}", engine.pack_name());
    println!("Seed: {}", seed);
    println!("Type 'help' for commands.\n");
    print_node(&engine);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("preview> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
            }
            "next" | "n" => {
                let count: usize = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(1);
                for _ in 0..count {
                    match engine.next_chapter() {
                        Ok(chapter) => {
                            print_chapter(&chapter);
                            history.push(chapter);
                        }
                        Err(e) => {
                            println!("Generation failed: {}", e);
                            break;
                        }
                    }
                }
            }
            "options" | "o" => {
                print_node(&engine);
            }
            "choose" | "c" => {
                let Some(index) = parts.get(1).and_then(|s| s.parse::<usize>().ok()) else {
                    println!("Usage: choose <i>");
                    continue;
                };
                match engine.choose(index) {
                    Ok(outcome) => {
                        for state in &outcome.applied {
                            println!(
                                "  {}: trust {}, friendship {}, romance {}, loyalty {}",
                                state.name,
                                state.scores.trust,
                                state.scores.friendship,
                                state.scores.romance,
                                state.scores.loyalty
                            );
                        }
                        match outcome.next {
                            Transition::Node(_) => print_node(&engine),
                            Transition::Ending(ending) => println!("\n*** Ending reached: {} ***\n", ending),
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
            "characters" | "chars" => {
                for state in engine.relationships().characters() {
                    println!(
                        "  {:<8} trust {:>3}  friendship {:>3}  romance {:>3}  loyalty {:>3}  flags [{}]",
                        state.name,
                        state.scores.trust,
                        state.scores.friendship,
                        state.scores.romance,
                        state.scores.loyalty,
                        {
                            let mut flags: Vec<&str> = state.flags.iter().map(String::as_str).collect();
                            flags.sort_unstable();
                            flags.join(", ")
                        }
                    );
                }
            }
            "pools" => {
                for report in engine.pool_report() {
                    println!(
                        "  {:<26} size {:>4}  draws {:>6}  max {:>3}{}",
                        report.pool.as_str(),
                        report.size,
                        report.total_draws,
                        report.max_uses,
                        if report.pressured { "  pressured" } else { "" }
                    );
                }
            }
            "save" => {
                let Some(path) = parts.get(1) else {
                    println!("Usage: save <path>");
                    continue;
                };
                let mut store = RonFileStore::new(*path);
                match save_with_retry(&mut store, &engine.snapshot(history.clone()), 3) {
                    Ok(()) => println!("Saved {} chapters to {}", history.len(), path),
                    Err(e) => println!("Save failed: {}", e),
                }
            }
            "load" => {
                let Some(path) = parts.get(1) else {
                    println!("Usage: load <path>");
                    continue;
                };
                match RonFileStore::new(*path).load() {
                    Ok(Some(snapshot)) => match engine.restore(snapshot) {
                        Ok(chapters) => {
                            history = chapters;
                            println!("Restored {} chapters", history.len());
                            print_node(&engine);
                        }
                        Err(e) => println!("Restore failed: {}", e),
                    },
                    Ok(None) => println!("No snapshot at {}", path),
                    Err(e) => println!("Load failed: {}", e),
                }
            }
            "seed" => {
                let Some(new_seed) = parts.get(1).and_then(|s| s.parse::<u64>().ok()) else {
                    println!("Usage: seed <n>");
                    continue;
                };
                match build(new_seed) {
                    Ok(fresh) => {
                        engine = fresh;
                        history.clear();
                        println!("Restarted with seed {}", new_seed);
                    }
                    Err(e) => println!("{}", e),
                }
            }
            _ => {
                println!("Unknown command: {}. Type 'help' for commands.", cmd);
            }
        }
    }
}

fn print_chapter(chapter: &Chapter) {
    println!("\n--- Chapter {}: {} ---", chapter.sequence, chapter.title);
    for paragraph in &chapter.paragraphs {
        println!("\n{}", paragraph);
    }
    let mut notes = Vec::new();
    if let Some(ref quest) = chapter.quest {
        notes.push(format!("quest: {}", quest));
    }
    for event in &chapter.events {
        notes.push(format!("event: {}", event.name()));
    }
    println!("\n[{} words, node {}{}{}]\n", chapter.word_count, chapter.branch, if notes.is_empty() { "" } else { ", " }, notes.join(", "));
}

fn print_node(engine: &StoryEngine) {
    if let Some(ending) = engine.ending() {
        println!("The story has ended ({}). Chapters can still be generated.", ending);
        return;
    }
    if let Ok(node) = engine.graph().node(engine.current_node()) {
        println!("[{}] {}", node.id, node.text);
    }
    let options = engine.current_options();
    if options.is_empty() {
        println!("  (no choices here)");
    }
    for (i, option) in options.iter().enumerate() {
        println!("  {}: {}", i, option.label);
    }
}

fn print_usage() {
    println!("Usage: preview [--pack <path>] [--config <path>] [--seed <n>]");
}

fn print_help() {
    println!("Commands:");
    println!("  next [n]        generate the next n chapters (default 1)");
    println!("  options         list the choices at the current node");
    println!("  choose <i>      take option i");
    println!("  characters      show every character's scores");
    println!("  pools           show pool usage");
    println!("  save <path>     write a snapshot");
    println!("  load <path>     restore a snapshot");
    println!("  seed <n>        restart with a new seed");
    println!("  quit            exit");
}
