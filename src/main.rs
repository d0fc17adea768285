use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sitewatch::config::LoggingConfig;
use sitewatch::models::{load_sites, WatchTarget};
use sitewatch::plugins::traits::Recipient;
use sitewatch::plugins::{ConsoleNotifier, EmailNotifier, Notifier};
use sitewatch::scheduler::report_critical;
use sitewatch::scraper::ChromeBackend;
use sitewatch::{AppConfig, SchedulerStats, SiteScheduler};

#[derive(Parser, Debug)]
#[command(name = "sitewatch", version, about = "Emails you when a web page element changes")]
struct Cli {
    /// Base config file (defaults to config/default.*)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch every configured site until all of them stop
    Run {
        /// Log notifications instead of emailing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate the config and site files, then exit
    Check,
    /// Send a test email with the configured SMTP settings
    TestEmail {
        #[arg(long)]
        to: String,
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    let _guard = init_tracing(&config.logging)?;

    info!("Starting Sitewatch...");

    match cli.command.unwrap_or(Command::Run { dry_run: false }) {
        Command::Run { dry_run } => run(config, dry_run).await,
        Command::Check => check(&config),
        Command::TestEmail { to, name } => test_email(&config, to, name).await,
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive("sitewatch=info".parse()?);
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &logging.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}

async fn run(config: AppConfig, dry_run: bool) -> Result<()> {
    let notifier: Arc<dyn Notifier> = if dry_run {
        info!("Dry run, notifications will only be logged");
        Arc::new(ConsoleNotifier::new())
    } else {
        Arc::new(EmailNotifier::new(&config.smtp, &config.sender)?)
    };

    let sites = load_sites(&config.scheduler.sites_dir)?;
    if sites.targets.is_empty() {
        warn!(
            dir = %config.scheduler.sites_dir.display(),
            "No valid site configurations found, nothing to watch"
        );
        return Ok(());
    }

    match supervise(&config, sites.targets, Arc::clone(&notifier)).await {
        Ok(stats) => {
            info!(
                rounds = stats.rounds,
                polls = stats.polls,
                notifications = stats.notifications_sent,
                "All sites have stopped"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Sitewatch has encountered a critical error");
            let operator = config.operator.as_ref().map(|operator| operator.recipient());
            report_critical(notifier.as_ref(), operator.as_ref(), &e).await;
            Err(e.into())
        }
    }
}

async fn supervise(
    config: &AppConfig,
    targets: Vec<WatchTarget>,
    notifier: Arc<dyn Notifier>,
) -> sitewatch::Result<SchedulerStats> {
    let backend = ChromeBackend::launch(&config.browser)?;
    let mut scheduler = SiteScheduler::new(Box::new(backend), notifier, &config.scheduler);

    for target in targets {
        scheduler.add_target(target).await;
    }

    scheduler.run().await
}

fn check(config: &AppConfig) -> Result<()> {
    let sites = load_sites(&config.scheduler.sites_dir)?;

    println!("Config OK. SMTP server: {}:{}", config.smtp.host, config.smtp.port);
    for target in &sites.targets {
        println!(
            "  ok    {} ({} recipient(s), every {}s)",
            target.name,
            target.recipients.len(),
            target.poll_interval.as_secs()
        );
    }
    for skipped in &sites.skipped {
        println!("  skip  {}: {}", skipped.path.display(), skipped.reason);
    }

    if !sites.skipped.is_empty() {
        anyhow::bail!("{} site configuration(s) are invalid", sites.skipped.len());
    }
    Ok(())
}

async fn test_email(config: &AppConfig, to: String, name: Option<String>) -> Result<()> {
    let notifier = EmailNotifier::new(&config.smtp, &config.sender)?;
    let recipient = Recipient::new(to, name);

    if !notifier.test_connection().await? {
        anyhow::bail!("SMTP server {}:{} rejected the connection", config.smtp.host, config.smtp.port);
    }

    notifier
        .send(
            &recipient,
            "Test Email from Sitewatch",
            "This is a test email from Sitewatch. If you've received this, it means that your SMTP setup is working!",
        )
        .await?;

    println!("Email sent to {} with no issues.", recipient);
    Ok(())
}
