/// Content Linter — checks a content pack for capacity and reachability
/// problems before it is used for a long run.
///
/// Usage: content_linter [<pack.ron>] [--config <path>]

use rustc_hash::FxHashSet;
use std::path::Path;
use std::process;

use storyloom::core::config::{fair_share, EngineConfig};
use storyloom::core::content::ContentPack;
use storyloom::core::pipeline::StoryEngine;
use storyloom::schema::branch::{NodeId, OptionTarget};
use storyloom::schema::event::EventEffect;
use storyloom::schema::fragment::{Category, PoolId, ReusePolicy};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Usage: content_linter [<pack.ron>] [--config <path>]");
        process::exit(0);
    }

    let mut pack_path = None;
    let mut config_path = None;
    let mut i = 1;
    while i < args.len() {
        if args[i] == "--config" && i + 1 < args.len() {
            i += 1;
            config_path = Some(args[i].clone());
        } else if pack_path.is_none() {
            pack_path = Some(args[i].clone());
        }
        i += 1;
    }

    let pack = match pack_path {
        Some(ref path) => ContentPack::load_from_ron(Path::new(path)),
        None => ContentPack::builtin(),
    };
    let pack = match pack {
        Ok(pack) => pack,
        Err(e) => {
            eprintln!("ERROR: Failed to load content pack: {}", e);
            process::exit(1);
        }
    };
    let config = match config_path {
        Some(ref path) => EngineConfig::load_from_ron(Path::new(path)),
        None => Ok(EngineConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: Failed to load config: {}", e);
            process::exit(1);
        }
    };

    println!("Loaded pack '{}': {} pools, {} nodes", pack.name, pack.pools.len(), pack.graph.nodes.len());

    let (errors, warnings) = lint_pack(&pack, &config);

    println!("\n=== Content Lint Report ===\n");
    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }
    for warning in &warnings {
        println!("WARNING: {}", warning);
    }
    for error in &errors {
        println!("ERROR: {}", error);
    }
    println!("\nSummary: {} errors, {} warnings", errors.len(), warnings.len());

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn lint_pack(pack: &ContentPack, config: &EngineConfig) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Structural validation is the engine's own.
    if let Err(e) = StoryEngine::builder()
        .config(config.clone())
        .content(pack.clone())
        .build()
    {
        errors.push(format!("Engine rejected the pack: {}", e));
    }

    // Paragraph capacity against the expected demand of a full corpus.
    let mix = config.category_mix;
    let total_weight: u32 = Category::PARAGRAPH.iter().map(|c| mix.weight(*c)).sum();
    let (min, max) = config.paragraphs_per_chapter;
    let per_chapter = (min + max) as f64 / 2.0;
    for category in Category::PARAGRAPH {
        let weight = mix.weight(category);
        let specs: Vec<_> = pack.pools.iter().filter(|p| p.category == category).collect();
        let size: usize = specs.iter().map(|p| p.texts().len()).sum();
        if specs.is_empty() {
            if weight > 0 {
                errors.push(format!("No pool for paragraph category '{}'", category.name()));
            }
            continue;
        }
        if total_weight == 0 || weight == 0 {
            continue;
        }
        let ceiling = config.reuse_ceiling.for_pool(config.target_corpus_size, size);
        let demand = config.target_corpus_size as f64 * per_chapter * f64::from(weight) / f64::from(total_weight);
        let capacity = size as f64 * f64::from(ceiling);
        if capacity < demand {
            warnings.push(format!(
                "Category '{}' can serve {} draws but a {}-chapter corpus needs about {}",
                category.name(),
                capacity as u64,
                config.target_corpus_size,
                demand as u64
            ));
        }
    }

    // Bounded pools whose fair share already exceeds the ceiling.
    for spec in &pack.pools {
        let size = spec.texts().len();
        if size == 0 {
            errors.push(format!("Pool '{}' has no fragments", spec.id));
            continue;
        }
        if spec.reuse_policy() == ReusePolicy::Bounded {
            let ceiling = config.reuse_ceiling.for_pool(config.target_corpus_size, size);
            let share = fair_share(config.target_corpus_size, size);
            if share > ceiling {
                warnings.push(format!(
                    "Pool '{}' has {} fragments; fair share {} is above its ceiling {}",
                    spec.id, size, share, ceiling
                ));
            }
        }
        if spec.category.is_paragraph() && size < 3 {
            warnings.push(format!(
                "Pool '{}' has only {} fragments (minimum 3 recommended)",
                spec.id, size
            ));
        }
    }

    // Value pools nothing binds to.
    let mut referenced: FxHashSet<&PoolId> = pack.paragraph_slots.values().collect();
    referenced.extend(pack.quests.iter().flat_map(|q| q.slots.values()));
    referenced.extend([&pack.title.subject, &pack.title.verb, &pack.title.modifier]);
    for spec in &pack.pools {
        if matches!(spec.category, Category::Value | Category::TitlePart) && !referenced.contains(&spec.id) {
            warnings.push(format!("Pool '{}' is never referenced", spec.id));
        }
    }

    // Event odds
    for event in &pack.events {
        if event.odds <= 0.0 {
            warnings.push(format!("Event category '{}' can never fire", event.category.name()));
        }
    }

    // Nodes unreachable from the root, by options or by world events.
    let mut edges: Vec<(Option<&NodeId>, &NodeId)> = Vec::new();
    for node in &pack.graph.nodes {
        for option in &node.options {
            if let OptionTarget::Node(target) = &option.target {
                edges.push((Some(&node.id), target));
            }
        }
    }
    for event in &pack.events {
        for entry in &event.entries {
            for effect in &entry.effects {
                if let EventEffect::Branch { node } = effect {
                    edges.push((None, node));
                }
            }
        }
    }
    let mut reached: FxHashSet<&NodeId> = FxHashSet::default();
    reached.insert(&pack.graph.root);
    // Event branches can fire from anywhere.
    reached.extend(edges.iter().filter(|(from, _)| from.is_none()).map(|(_, to)| *to));
    let mut frontier: Vec<&NodeId> = reached.iter().copied().collect();
    while let Some(current) = frontier.pop() {
        for (_, to) in edges.iter().filter(|(from, _)| *from == Some(current)) {
            if reached.insert(*to) {
                frontier.push(*to);
            }
        }
    }
    for node in &pack.graph.nodes {
        if !reached.contains(&node.id) {
            warnings.push(format!("Node '{}' is unreachable from '{}'", node.id, pack.graph.root));
        }
    }

    let endings = pack
        .graph
        .nodes
        .iter()
        .flat_map(|n| &n.options)
        .filter(|o| matches!(o.target, OptionTarget::Ending(_)))
        .count();
    let terminals = pack.graph.nodes.iter().filter(|n| n.is_terminal()).count();
    if endings == 0 && terminals == 0 {
        warnings.push("Graph has no endings and no terminal nodes".to_string());
    }

    (errors, warnings)
}
