use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use rai_ai::auth::{ChainedTokenCredential, EvaluationCredential, InferenceCredential};
use rai_ai::chat::ChatComposer;
use rai_ai::eval::{
    storage_role_command, AzureRaiAnnotator, ContentSafetyEvaluator, EvaluationRunner,
    GroundednessEvaluator,
};
use rai_ai::fetch::{prep_sources, HttpPageFetcher, PrepStatus};
use rai_ai::llm::AzureOpenAiChat;
use rai_ai::retrieve::load_corpus;
use rai_core::cache::DocumentCache;
use rai_core::config::AppConfig;
use rai_core::domain::ScenarioCategory;
use rai_core::scenario::load_scenarios;
use tracing::info;

const RULE: &str = "================================================================================";
const EXIT_WORDS: [&str; 3] = ["quit", "exit", "q"];

fn is_exit_word(input: &str) -> bool {
    let lowered = input.to_lowercase();
    EXIT_WORDS.iter().any(|w| *w == lowered)
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn banner(title: &str) {
    println!("{RULE}");
    println!("RAI Demo - {title}");
    println!("{RULE}");
}

pub fn prep(cfg: &AppConfig) -> Result<()> {
    banner("Data Preparation");
    println!("\nConfigured sources:");
    for (i, s) in cfg.sources.iter().enumerate() {
        println!("  {}. {}", i + 1, s.name);
        println!("     {}", s.url);
    }

    let cache = DocumentCache::open(cfg.data_cache_path.clone());
    println!("\nFetching sources into {} ...", cache.root().display());
    let report = prep_sources(&cfg.sources, &HttpPageFetcher::new(), &cache)?;

    for o in report.outcomes.iter() {
        match &o.status {
            PrepStatus::Cached { chars, .. } => println!("  ok    {} ({chars} chars)", o.source_name),
            PrepStatus::Failed { code, message } => {
                println!("  fail  {} [{code}] {message}", o.source_name)
            }
        }
    }

    if report.cached_count() == 0 {
        bail!("No sources were cached. Check network connectivity and source URLs.");
    }

    let chunks = load_corpus(&cfg.sources, &cache, &cfg.retrieval);
    println!("\n{RULE}");
    println!(
        "Cached {} of {} sources ({} chunks)",
        report.cached_count(),
        report.outcomes.len(),
        chunks.len()
    );
    println!("{RULE}");

    println!("\nSample chunks (first 3):");
    for (i, c) in chunks.iter().take(3).enumerate() {
        println!("\nChunk {}:", i + 1);
        println!("  Source: {} ({})", c.source_name, c.url);
        println!("  Length: {} chars", c.text.chars().count());
        println!("  Preview: {}", preview(&c.text, 150));
    }
    println!("\nData preparation complete. Ready for chat and evaluation.");
    Ok(())
}

pub fn chat(cfg: &AppConfig) -> Result<()> {
    banner("Interactive Chat");

    let cache = DocumentCache::open(cfg.data_cache_path.clone());
    let chunks = load_corpus(&cfg.sources, &cache, &cfg.retrieval);
    if chunks.is_empty() {
        println!("\nNo cached data found. Run `raidemo prep` first; answers will say there is not enough information.");
    } else {
        println!("\nLoaded {} cached chunks", chunks.len());
    }

    println!("Inference endpoint: {}", cfg.inference.endpoint);
    println!("  Deployment: {}", cfg.inference.deployment_name);
    let credential = InferenceCredential::new(ChainedTokenCredential::default_chain(env_lookup));
    let llm = AzureOpenAiChat::for_inference(&cfg.inference, credential)
        .context("Failed to initialize the inference client")?;
    let composer = ChatComposer::new(&llm, &chunks, cfg.retrieval.top_k);

    println!("\n{RULE}");
    println!("Ask questions about the cached sources.");
    println!("Type 'quit' or 'exit' to end the session.");
    println!("{RULE}\n");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("You: ");
        io::stdout().flush().ok();
        let line = match lines.next() {
            Some(l) => l.context("Failed to read input")?,
            None => break,
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit_word(question) {
            break;
        }

        println!("\nThinking...");
        match composer.answer(question) {
            Ok(answer) => {
                println!("\nAssistant: {}", answer.answer_text);
                if !answer.citations.is_empty() {
                    println!("\nOffered context (chunks shown to the model):");
                    for (i, c) in answer.citations.iter().enumerate() {
                        println!("\n  [{}] {} ({})", i + 1, c.source_name, c.url);
                        println!("      {}", c.snippet);
                    }
                }
            }
            Err(e) => println!("\nError: {e}\n"),
        }
        println!("\n{}\n", "-".repeat(80));
    }
    println!("\nGoodbye!");
    Ok(())
}

pub fn eval(cfg: &AppConfig) -> Result<()> {
    banner("Safety Evaluation");
    println!("\nScenarios: {}", cfg.scenarios_path.display());
    println!("  Project: {}", cfg.evaluation.project_name);
    println!("  Resource group: {}", cfg.evaluation.resource_group);
    println!("\nReminder: ensure your identity has Storage Blob Data Contributor on the eval resource group.");
    println!("  Example: {}", storage_role_command(&cfg.evaluation));

    // Separate chains per client so no token crosses from one scope to another.
    let judge = AzureOpenAiChat::for_evaluation(
        &cfg.evaluation,
        EvaluationCredential::new(ChainedTokenCredential::default_chain(env_lookup)),
    )
    .context("Failed to initialize the evaluation judge")?;
    let annotator = AzureRaiAnnotator::new(
        &cfg.evaluation,
        EvaluationCredential::new(ChainedTokenCredential::default_chain(env_lookup)),
    )
    .context("Failed to initialize the safety annotator")?;
    println!("\nJudge endpoint: {}", judge.endpoint().base_url());
    println!("  Deployment: {}", judge.deployment());

    let groundedness = GroundednessEvaluator::new(&judge);
    let harmful = ContentSafetyEvaluator::new(&annotator);
    let mut runner = EvaluationRunner::new(
        &groundedness,
        &harmful,
        cfg.evaluation.project_name.clone(),
        cfg.reports_dir.clone(),
    );

    println!("\n{RULE}\nRunning evaluations...\n{RULE}");
    let summary = runner
        .run(&cfg.scenarios_path)
        .context("Evaluation failed; check that the scenario file is valid")?;
    info!(phase = ?runner.phase(), "evaluation finished");

    for r in summary.results.iter() {
        let score = r
            .score
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<14} {:<16} {:<7} score={score}",
            r.scenario_id,
            r.category.as_str(),
            serde_json::to_value(r.outcome)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
        );
        if let Some(e) = r.error.as_deref() {
            println!("      error: {e}");
        }
    }

    println!("\nSummary:");
    for category in ScenarioCategory::ALL {
        let c = summary.counts.get(&category).copied().unwrap_or_default();
        println!(
            "  {category}: passed={} failed={} errored={}",
            c.passed, c.failed, c.errored
        );
    }
    for (category, path) in summary.reports.written.iter() {
        println!("  {category} report: {}", path.display());
    }
    if let Some(p) = summary.summary_csv.as_ref() {
        println!("  summary: {}", p.display());
    }
    for (category, e) in summary.reports.failures.iter() {
        println!("  {category} report NOT written: {e}");
    }
    if let Some(e) = summary.summary_error.as_ref() {
        println!("  summary NOT written: {e}");
    }

    if !summary.reports.is_complete() || summary.summary_error.is_some() {
        bail!("Some reports could not be written");
    }
    Ok(())
}

pub fn validate_scenarios(path: &Path) -> Result<()> {
    let records = load_scenarios(path)
        .with_context(|| format!("Invalid scenario file {}", path.display()))?;
    println!("Valid JSONL: {} scenarios\n", records.len());
    for (i, r) in records.iter().enumerate() {
        let query: String = r.query.chars().take(70).collect();
        println!("  [{}] ({}) {query}", i + 1, r.category);
    }
    println!("\nScenarios ready for evaluation");
    Ok(())
}
