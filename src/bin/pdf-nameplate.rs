//! PDF Nameplate CLI tool
//!
//! Generates personalized cover pages and health reports, or serves them
//! through a Telegram bot.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use pdf_nameplate::config::AppConfig;
use pdf_nameplate::generate::{normalize_name, Generated, Personalizer};
use pdf_nameplate::pdf::inspect;

/// PDF Nameplate - Put a name on PDF templates
#[derive(Parser)]
#[command(name = "pdf-nameplate")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Cover page with name and college ID
    pdf-nameplate cover --name \"Jane Doe\" --college-id 23/V/KPC-CST/36

    # Health report, opened when done
    pdf-nameplate report --name \"Jane Doe\" --open

    # Check where the anchor label sits in a template
    pdf-nameplate inspect assets/pdf/Cover_Page.pdf --anchor \"Name:\"

    # Run the chat bot (reads TELEGRAM_BOT_TOKEN from the environment or .env)
    pdf-nameplate bot")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the name and college ID onto the cover page
    Cover {
        /// Full name
        #[arg(short, long)]
        name: String,

        /// College ID (upper-cased)
        #[arg(long)]
        college_id: String,

        /// Open the output file after creation
        #[arg(long)]
        open: bool,
    },

    /// Write the name onto the health report
    Report {
        /// Full name (upper-cased)
        #[arg(short, long)]
        name: String,

        /// Open the output file after creation
        #[arg(long)]
        open: bool,
    },

    /// Prompt for the details and generate the health report
    Interactive {
        /// Also generate the cover page with the entered college ID
        #[arg(long)]
        with_cover: bool,

        /// Open the output files after creation
        #[arg(long)]
        open: bool,
    },

    /// Serve generation through the Telegram bot
    Bot,

    /// Show pages, sizes and anchor positions of a PDF
    Inspect {
        /// PDF file to inspect
        input: PathBuf,

        /// Label to search for on every page
        #[arg(long)]
        anchor: Option<String>,
    },
}

fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Cover { name, college_id, open } => cmd_cover(config, &name, &college_id, open),
        Commands::Report { name, open } => cmd_report(config, &name, open),
        Commands::Interactive { with_cover, open } => cmd_interactive(config, with_cover, open),
        Commands::Bot => cmd_bot(config),
        Commands::Inspect { input, anchor } => cmd_inspect(&input, anchor.as_deref()),
    }
}

/// Open a file with the system default application
fn open_file(path: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(path).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(path).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

fn finish(generated: &Generated, open: bool) -> Result<()> {
    eprintln!("Output: {}", generated.path.display());
    if generated.placements.is_empty() {
        eprintln!("Warning: nothing was placed; the output matches the template");
    }
    if open {
        open_file(&generated.path)?;
    }
    Ok(())
}

fn cmd_cover(config: AppConfig, name: &str, college_id: &str, open: bool) -> Result<()> {
    let personalizer = Personalizer::new(config);

    eprintln!("Generating cover page...");
    let generated = personalizer.generate_cover_page(name, college_id)?;

    finish(&generated, open)
}

fn cmd_report(config: AppConfig, name: &str, open: bool) -> Result<()> {
    let personalizer = Personalizer::new(config);

    eprintln!("Generating health report...");
    let generated = personalizer.generate_report(name)?;

    finish(&generated, open)
}

/// Ask on stdout, read one trimmed line; empty input takes the default
fn prompt(input: &mut impl BufRead, question: &str, default: &str) -> Result<String> {
    print!("{} (default: {}): ", question, default);
    io::stdout().flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();

    Ok(if answer.is_empty() { default.to_string() } else { answer.to_string() })
}

fn cmd_interactive(config: AppConfig, with_cover: bool, open: bool) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    println!("Welcome to the Health Report Generator!");
    let name = normalize_name(&prompt(&mut input, "Please enter your full name", &config.default_name)?);
    let college_id = prompt(&mut input, "Please enter your college ID", &config.default_college_id)?;

    let personalizer = Personalizer::new(config);

    println!("Generating your health report for {}...", name);
    let report = personalizer.generate_report(&name)?;
    println!("Health report PDF generated: {}", report.path.display());
    finish(&report, open)?;

    if with_cover {
        let cover = personalizer.generate_cover_page(&name, &college_id)?;
        println!("Cover page PDF generated: {}", cover.path.display());
        finish(&cover, open)?;
    }

    Ok(())
}

fn cmd_bot(config: AppConfig) -> Result<()> {
    let token = AppConfig::bot_token()?;
    let personalizer = Personalizer::new(config);

    for template in [personalizer.config().cover_template(), personalizer.config().report_template()] {
        if !template.exists() {
            log::warn!("Template {} is missing; requests for it will fail", template.display());
        }
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime
        .block_on(pdf_nameplate::bot::run(personalizer, &token))
        .context("Bot stopped")?;
    Ok(())
}

fn cmd_inspect(input: &Path, anchor: Option<&str>) -> Result<()> {
    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }

    let metadata = inspect(input, anchor)?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);

    if let Some(title) = metadata.title {
        println!("Title: {}", title);
    }
    if let Some(author) = metadata.author {
        println!("Author: {}", author);
    }

    for page in &metadata.pages {
        let mut line = format!("  [{}] {:.1} x {:.1}", page.index, page.size.width, page.size.height);
        for hit in &page.anchor_hits {
            line.push_str(&format!(
                "  hit at ({:.1}, {:.1}) {:.1}x{:.1}",
                hit.x, hit.y, hit.width, hit.height
            ));
        }
        println!("{}", line);
    }

    Ok(())
}
