use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use js_test_tool::{
    Browser, BrowserKind, RunReport, RunnerAssets, ServerConfig, SuiteDescription, SuiteReport,
    SuiteServer,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run JavaScript test suites in a browser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run suites and report their results
    Run(RunArgs),
    /// Serve suite pages for debugging in a browser
    Dev(ServeArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Suite description files (YAML)
    #[arg(required = true)]
    suites: Vec<PathBuf>,

    /// Port to listen on (0 picks a free one)
    #[arg(short, long, default_value_t = 0)]
    port: u16,

    /// Directory holding the jasmine/ and jasmine2/ framework files
    #[arg(long, env = "JS_TEST_TOOL_RUNNER_DIR")]
    runner_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    serve: ServeArgs,

    /// Browser used to execute the pages
    #[arg(long, value_enum, default_value_t = BrowserChoice::Chrome)]
    browser: BrowserChoice,

    /// Path to Chrome executable
    #[arg(long)]
    chrome_path: Option<String>,

    /// Disable Chrome's sandbox (needed in some containers)
    #[arg(long)]
    no_sandbox: bool,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Seconds to wait for each suite's results
    #[arg(long, env = "JS_TEST_TOOL_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,

    /// Also write results as JSON to this file
    #[arg(long)]
    json_out: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BrowserChoice {
    Chrome,
    Static,
}

impl RunArgs {
    fn browser_kind(&self) -> BrowserKind {
        match self.browser {
            BrowserChoice::Static => BrowserKind::Static,
            BrowserChoice::Chrome => match BrowserKind::chrome_auto() {
                BrowserKind::Chrome { no_sandbox, .. } => BrowserKind::Chrome {
                    chrome_path: self.chrome_path.clone(),
                    no_sandbox: no_sandbox || self.no_sandbox,
                    headless: !self.headed,
                },
                other => other,
            },
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Dev(args) => dev(args).await.map(|_| true),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn load_suites(paths: &[PathBuf]) -> anyhow::Result<Vec<SuiteDescription>> {
    paths
        .iter()
        .map(|path| {
            SuiteDescription::from_file(path)
                .with_context(|| format!("Invalid suite description {}", path.display()))
        })
        .collect()
}

/// Fail before launching a browser when a suite's framework cannot load.
async fn check_runner_scripts(
    suites: &[SuiteDescription],
    runner_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let assets = RunnerAssets::new(runner_dir.map(Path::to_path_buf));
    for suite in suites {
        let missing = assets.missing_scripts(suite.runner(), false).await;
        if !missing.is_empty() {
            anyhow::bail!(
                "Suite '{}' needs {} under /runner/; point --runner-dir (or JS_TEST_TOOL_RUNNER_DIR) at a directory holding jasmine/ and jasmine2/",
                suite.suite_name(),
                missing.join(", ")
            );
        }
    }
    Ok(())
}

/// Returns whether every suite passed.
async fn run(args: RunArgs) -> anyhow::Result<bool> {
    let suites = load_suites(&args.serve.suites)?;
    check_runner_scripts(&suites, args.serve.runner_dir.as_deref()).await?;
    let server = SuiteServer::start(
        suites,
        ServerConfig {
            port: args.serve.port,
            runner_dir: args.serve.runner_dir.clone(),
            dev_mode: false,
        },
    )
    .await?;

    let kind = args.browser_kind();
    log::info!("Launching {} browser", kind.name());
    let mut browser = Browser::launch(kind)
        .await
        .context("Failed to start browser")?
        .with_timeout(Duration::from_secs(args.timeout_secs));

    let mut report = RunReport::new();
    for name in server.suite_names() {
        let outcome = browser
            .get_page_results(&server.suite_url(name))
            .await
            .map_err(|e| e.to_string());
        report.push(SuiteReport::new(name.as_str(), outcome));
    }

    if let Err(e) = browser.quit().await {
        log::warn!("Failed to close browser: {}", e);
    }

    println!("{}", report);

    if let Some(path) = &args.json_out {
        let json = report.to_json()?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Wrote JSON results to {}", path.display());
    }

    Ok(report.is_success())
}

async fn dev(args: ServeArgs) -> anyhow::Result<()> {
    let suites = load_suites(&args.suites)?;
    let server = SuiteServer::start(
        suites,
        ServerConfig {
            port: args.port,
            runner_dir: args.runner_dir,
            dev_mode: true,
        },
    )
    .await?;

    println!("Serving suites in dev mode. Open in a browser:");
    for name in server.suite_names() {
        println!("  {}", server.suite_url(name));
    }
    println!("Press Ctrl-C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    log::info!("Shutting down");
    Ok(())
}
