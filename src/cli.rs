use std::error::Error;

use atty::Stream;
use clap::{Args, Parser, Subcommand};
use kalima_rs::config::{
    Config, DEFAULT_API_BASE, DEFAULT_DATABASE_URL, DEFAULT_LEXICON_NAME, DEFAULT_MAX_LEN,
    DEFAULT_MIN_LEN,
};
use kalima_rs::{DailyWord, NormalizedWord, Selector, SiwarClient, WordService, WordStore, YearWord};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "kalima_rs=info";

#[derive(Parser, Debug)]
#[command(
    name = "kalima-rs",
    about = "Pick daily Arabic words from the Siwar dictionary",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Settings {
    /// Base URL of the Siwar external API.
    #[arg(long, global = true, env = "KSAA_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// API key sent in the `apikey` header.
    #[arg(long, global = true, env = "KSAA_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Lexicon identifier; skips the lookup by name.
    #[arg(long, global = true, env = "KSAA_LEXICON_ID")]
    lexicon_id: Option<String>,

    /// Display name (or part of it) of the lexicon to draw from.
    #[arg(long, global = true, env = "KSAA_LEXICON_NAME", default_value = DEFAULT_LEXICON_NAME)]
    lexicon_name: String,

    /// SQLite database holding the daily cache and the year plan.
    #[arg(long, global = true, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database_url: String,

    /// Shortest accepted word, diacritics excluded.
    #[arg(long, global = true, env = "WORD_MIN_LEN", default_value_t = DEFAULT_MIN_LEN)]
    min_len: usize,

    /// Longest accepted word, diacritics excluded.
    #[arg(long, global = true, env = "WORD_MAX_LEN", default_value_t = DEFAULT_MAX_LEN)]
    max_len: usize,
}

impl Settings {
    fn to_config(&self) -> Config {
        let mut config = Config::default()
            .with_api_base(&self.api_base)
            .with_lexicon_name(&self.lexicon_name)
            .with_length_bounds(self.min_len, self.max_len)
            .with_database_url(&self.database_url);
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key);
        }
        if let Some(id) = &self.lexicon_id {
            config = config.with_lexicon_id(id);
        }
        config
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show today's word (Riyadh calendar day).
    Today {
        /// Discard the cached word and pick a different one.
        #[arg(long)]
        refresh: bool,
    },
    /// Draw a batch of distinct words that all carry definitions.
    Words {
        /// Number of words to draw.
        #[arg(default_value_t = 5)]
        count: usize,
    },
    /// Operations on the year plan.
    #[command(subcommand)]
    Plan(PlanCommand),
    /// Serve the HTTP API (requires the `web` feature).
    Serve {
        /// Address to bind.
        #[arg(long, env = "KALIMA_ADDR", default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
    },
}

#[derive(Subcommand, Debug)]
enum PlanCommand {
    /// Replace the stored plan with `count` freshly drawn words.
    Build {
        #[arg(default_value_t = 365)]
        count: usize,
    },
    /// Show the planned word for a day index (1-based).
    Show { index: u32 },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(dispatch(cli))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = cli.settings.to_config();
    config.validate()?;
    let store = WordStore::connect(&config.database_url).await?;
    let client = SiwarClient::new(&config)?;
    let service = WordService::new(Selector::new(client, config), store);

    match cli.command {
        Command::Today { refresh } => handle_today(&service, refresh, cli.json).await,
        Command::Words { count } => {
            let (min_len, max_len) = (cli.settings.min_len, cli.settings.max_len);
            handle_words(&service, count, min_len, max_len, cli.json).await
        }
        Command::Plan(PlanCommand::Build { count }) => {
            handle_plan_build(&service, count, cli.json).await
        }
        Command::Plan(PlanCommand::Show { index }) => {
            handle_plan_show(&service, index, cli.json).await
        }
        Command::Serve { addr } => serve(service, addr).await,
    }
}

#[cfg(feature = "web")]
async fn serve(
    service: WordService<SiwarClient>,
    addr: std::net::SocketAddr,
) -> Result<(), Box<dyn Error>> {
    kalima_rs::web::serve(kalima_rs::web::WebConfig { addr }, service).await?;
    Ok(())
}

#[cfg(not(feature = "web"))]
async fn serve(
    _service: WordService<SiwarClient>,
    _addr: std::net::SocketAddr,
) -> Result<(), Box<dyn Error>> {
    Err("The HTTP server is disabled. Rebuild with `--features web` to enable it.".into())
}

async fn handle_today(
    service: &WordService<SiwarClient>,
    refresh: bool,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let word = service.today(refresh).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&word)?);
    } else {
        print_daily(&word);
    }
    Ok(())
}

async fn handle_words(
    service: &WordService<SiwarClient>,
    count: usize,
    min_len: usize,
    max_len: usize,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    if count == 0 {
        return Err("Word count must be at least 1".into());
    }
    let words = service.words(count, min_len, max_len).await?;
    if as_json {
        let payload = json!({
            "count": words.len(),
            "min_len": min_len,
            "max_len": max_len,
            "words": words,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_word_table(&words);
    }
    Ok(())
}

async fn handle_plan_build(
    service: &WordService<SiwarClient>,
    count: usize,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    if count == 0 {
        return Err("Plan size must be at least 1".into());
    }
    let stored = service.build_year_plan(count).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&json!({ "stored": stored }))?);
    } else {
        println!("Stored {stored} planned words.");
    }
    Ok(())
}

async fn handle_plan_show(
    service: &WordService<SiwarClient>,
    index: u32,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let word = service
        .year_word(index)
        .await?
        .ok_or_else(|| format!("No planned word for day {index}"))?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&word)?);
    } else {
        print_planned(&word);
    }
    Ok(())
}

fn print_daily(word: &DailyWord) {
    println!("Date: {}", word.date);
    println!("Word: {} ({} letters)", word.word, word.length);
    if word.bare != word.word {
        println!("Bare: {}", word.bare);
    }
    if let Some(id) = &word.entry_id {
        println!("Entry ID: {id}");
    }
    println!("Source: {}", word.source);
    match &word.definition {
        Some(definition) => render_markdown_block("Definition", definition),
        None => println!("\nDefinition: <unavailable>"),
    }
}

fn print_planned(word: &YearWord) {
    println!("Day {}: {} ({} letters)", word.day_index, word.word, word.length);
    if let Some(id) = &word.entry_id {
        println!("Entry ID: {id}");
    }
    if word.senses.is_empty() {
        println!("\nSenses: <none>");
        return;
    }
    let body = word
        .senses
        .iter()
        .map(|sense| format!("- {sense}"))
        .collect::<Vec<_>>()
        .join("\n");
    render_markdown_block("Senses", &body);
}

fn print_word_table(words: &[NormalizedWord]) {
    if words.is_empty() {
        println!("No words drawn.");
        return;
    }
    let width = words
        .iter()
        .map(|word| word.word.chars().count())
        .max()
        .unwrap_or(4)
        .max("WORD".len());
    println!("{:<width$}  {:>3}  {}", "WORD", "LEN", "DEFINITION", width = width);
    println!("{:-<width$}  {:->3}  {}", "", "", "----------", width = width);
    for word in words {
        println!(
            "{:<width$}  {:>3}  {}",
            word.word,
            word.length,
            word.definition().unwrap_or("<definition unavailable>"),
            width = width
        );
    }
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(title: &str, body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    println!("\n{title}:");
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}
