mod config;

use std::time::Duration;

use clap::{Parser, Subcommand};
use restamp_core::CustomizeOptions;
use restamp_dom::Document;
use restamp_mark::Locator;
use restamp_watch::Customizer;
use tracing::info;

#[derive(Parser)]
#[command(name = "restamp")]
#[command(about = "Replace a hosted chat UI's branding watermark with custom copyright text")]
struct Cli {
    #[arg(short = 'f', long, global = true, help = "Path to restamp.toml")]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Scan {
        #[arg(help = "URL or HTML file to inspect")]
        target: String,
    },
    Apply {
        #[arg(help = "HTML file to rewrite")]
        input: String,
        #[arg(short, long, help = "Write the result here instead of stdout")]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "restamp=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let options = match load_options(cli.config.as_deref()) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Scan { target } => run_scan(target, options).await,
        Commands::Apply { input, output } => run_apply(input, output, options).await,
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn load_options(path: Option<&str>) -> Result<CustomizeOptions, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(config::RestampConfig::from_file(path)?.into_options()),
        None => Ok(CustomizeOptions::default()),
    }
}

async fn load_html(target: &str) -> Result<(String, String), Box<dyn std::error::Error>> {
    if target.starts_with("http://") || target.starts_with("https://") {
        let url = url::Url::parse(target)?;
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; restamp/0.1)")
            .timeout(Duration::from_secs(30))
            .build()?;
        let resp = client.get(url.clone()).send().await?;
        info!(url = %url, status = resp.status().as_u16(), "fetched page");
        let html = resp.text().await?;
        Ok((html, url.to_string()))
    } else {
        let html = std::fs::read_to_string(target)?;
        Ok((html, format!("file://{}", target)))
    }
}

async fn run_scan(
    target: String,
    options: CustomizeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let (html, url) = load_html(&target).await?;
    let doc = Document::parse(&html, &url)?;
    let locator = Locator::from_options(&options)?;

    println!("scanning {} for the watermark...", url);
    match locator.find(&doc) {
        Some((el, evidence)) => {
            println!("\n--- watermark candidate ---");
            println!("heuristic: {:?}", evidence.kind);
            println!("selector: {}", evidence.selector);
            println!("evidence: {}", evidence.evidence);
            println!("element: {}", snippet(&doc.outer_html(el)));
        }
        None => println!("no watermark candidate found"),
    }

    Ok(())
}

async fn run_apply(
    input: String,
    output: Option<String>,
    options: CustomizeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let html = std::fs::read_to_string(&input)?;
    let retry_window = options.retry_delays_ms.iter().copied().max().unwrap_or(0);
    let doc = Document::parse(&html, &format!("file://{}", input))?.shared();

    let customizer = Customizer::new(doc.clone(), options)?;
    customizer.start();
    if !customizer.is_customized() {
        // A static file will not mutate, but honor the full retry window
        // before giving up, as the browser build does.
        tokio::time::sleep(Duration::from_millis(retry_window + 100)).await;
    }
    customizer.stop();

    let rewritten = match doc.lock() {
        Ok(doc) => doc.to_html(),
        Err(_) => return Err("document lock poisoned".into()),
    };

    if customizer.is_customized() {
        println!("watermark replaced");
    } else {
        println!("no watermark found, output unchanged");
    }

    match output {
        Some(path) => std::fs::write(path, rewritten)?,
        None => print!("{}", rewritten),
    }

    Ok(())
}

fn snippet(html: &str) -> String {
    let mut out: String = html.chars().take(200).collect();
    if html.chars().count() > 200 {
        out.push('…');
    }
    out
}
