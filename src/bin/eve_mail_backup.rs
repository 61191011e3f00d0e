use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use eve_mail_backup::auth::{self, AuthError};
use eve_mail_backup::backup::{BackupOptions, archive_mailbox};
use eve_mail_backup::config::{Config, default_config_path, load_config, write_template};
use eve_mail_backup::esi::{EsiClient, http_client};
use eve_mail_backup::mail::{MailError, PageLimits};
use eve_mail_backup::Archiver;

#[derive(Parser)]
#[command(name = "eve_mail_backup")]
#[command(about = "Back up EVE Online mail to text files", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,

    #[command(flatten)]
    backup: BackupArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and save every mail (default)
    Backup(BackupArgs),

    /// Write a template config file to edit
    InitConfig {
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Print the SSO authorization URL and exit
    AuthorizeUrl {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct BackupArgs {
    /// Config file (defaults to <config dir>/eve_mail_backup/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory the mail files are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    client_id: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Stop listing after this many pages
    #[arg(long)]
    max_pages: Option<u32>,

    /// Keep going when a single mail fails
    #[arg(long)]
    skip_failed: bool,

    /// Print the sign-in URL without opening a browser
    #[arg(long)]
    no_browser: bool,
}

impl BackupArgs {
    fn apply(&self, cfg: &mut Config) {
        if let Some(dir) = &self.output_dir {
            cfg.output_dir = dir.clone();
        }
        if let Some(id) = &self.client_id {
            cfg.client_id = id.clone();
        }
        if let Some(t) = self.timeout {
            cfg.request_timeout_secs = t;
        }
        if self.max_pages.is_some() {
            cfg.max_pages = self.max_pages;
        }
    }
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("eve_mail_backup=info"),
    )
    .init();

    if let Err(e) = run(Cli::parse()) {
        print_raw_payload(&e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.cmd.unwrap_or(Command::Backup(cli.backup)) {
        Command::InitConfig { path } => {
            let path = match path {
                Some(p) => p,
                None => default_config_path()?,
            };
            write_template(&path)?;
            println!(
                "Created template config at {} - edit it and run again",
                path.display()
            );
            Ok(())
        }

        Command::AuthorizeUrl { config } => {
            let cfg = resolve_config(config.as_deref())?;
            let (url, _csrf) = auth::authorize_url(&cfg)?;
            println!("{url}");
            Ok(())
        }

        Command::Backup(args) => {
            let mut cfg = resolve_config(args.config.as_deref())?;
            args.apply(&mut cfg);
            cfg.validate()
                .map_err(|e| anyhow!("Configuration error: {e}"))?;
            backup(&cfg, &args)
        }
    }
}

fn resolve_config(path: Option<&std::path::Path>) -> Result<Config> {
    let mut cfg = load_config(path)?;
    cfg.apply_env();
    Ok(cfg)
}

fn backup(cfg: &Config, args: &BackupArgs) -> Result<()> {
    let http = http_client(cfg.request_timeout()).context("Failed to build HTTP client")?;

    let credential = auth::login(cfg, &http, !args.no_browser).context("Sign-in failed")?;
    let esi = EsiClient::from_config(cfg, http, credential);

    let identity = esi
        .verify()
        .inspect_err(|e| {
            if let Some(body) = e.raw_body() {
                eprintln!("{body}");
            }
        })
        .context("Failed to verify character")?;
    println!("Signed in as {} ({})", identity.name, identity.id);

    let archiver = Archiver::new(&cfg.output_dir, cfg.wrap_width);
    let opts = BackupOptions {
        limits: PageLimits {
            max_pages: cfg.max_pages,
        },
        skip_failed: args.skip_failed,
    };

    let report = archive_mailbox(&esi, &identity, &archiver, &opts)?;

    println!(
        "Saved {} of {} mails to {}",
        report.saved.len(),
        report.listed,
        archiver.output_dir().display()
    );
    if !report.skipped.is_empty() {
        return Err(anyhow!(
            "{} mails could not be saved: {:?}",
            report.skipped.len(),
            report.skipped
        ));
    }
    Ok(())
}

/// Dump the server payload behind a failed sign-in or listing.
///
/// Single-mail failures already printed theirs on the way out of the fetcher.
fn print_raw_payload(err: &anyhow::Error) {
    for cause in err.chain() {
        let body = match (
            cause.downcast_ref::<AuthError>(),
            cause.downcast_ref::<MailError>(),
        ) {
            (Some(e), _) => e.raw_body(),
            (_, Some(MailError::Api(e))) => e.raw_body(),
            _ => None,
        };
        if let Some(body) = body {
            eprintln!("{body}");
            return;
        }
    }
}
