//! Command-line front end over the core operations.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use verity::archive::keyfile::Keyfile;
use verity::config::{load_config, save_config, Config};
use verity::engine::policy::PolicyUpdateOptions;
use verity::error::{Error, Result};
use verity::fco::prop::HashDisplay;
use verity::ops::{self, ArtifactKind, EXIT_FAILURE};
use verity::print::report::ReportLevel;
use verity::tty;

#[derive(Parser)]
#[command(name = "verity", version, about = "Host-based file integrity monitor")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Signed config file
    #[arg(short, long, default_value = "verity.cfg", global = true)]
    config: PathBuf,

    /// Print only fatal errors
    #[arg(long, global = true, conflicts_with = "verbose")]
    silent: bool,

    /// Verbose progress output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Passphrase for the local key (prompted when omitted)
    #[arg(long, global = true, value_name = "PASSPHRASE")]
    local_passphrase: Option<String>,

    /// Passphrase for the site key (prompted when omitted)
    #[arg(long, global = true, value_name = "PASSPHRASE")]
    site_passphrase: Option<String>,

    /// Reporting level 0-4
    #[arg(short = 'l', long, global = true, value_name = "LEVEL")]
    report_level: Option<u8>,

    /// Render digests as base64 instead of hex
    #[arg(long, global = true)]
    base64: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the site and local keyfiles
    Genkeys {
        #[arg(long, default_value = "site.key")]
        site: PathBuf,
        #[arg(long, default_value = "local.key")]
        local: PathBuf,
    },
    /// Write the signed config file from a TOML source
    CreateCfg {
        /// Plain TOML input
        input: PathBuf,
        /// Site keyfile that signs the config
        #[arg(long, default_value = "site.key")]
        site: PathBuf,
    },
    /// Write the signed policy file from policy source text
    CreatePol {
        /// Plain policy-language input
        input: PathBuf,
    },
    /// Create the baseline database
    Init,
    /// Check the filesystem against the baseline
    Check,
    /// Fold a report into the baseline database
    UpdateDb {
        report: PathBuf,
        /// Skip the interactive editor round trip
        #[arg(long)]
        accept_all: bool,
    },
    /// Reconcile a new signed policy against the database
    UpdatePolicy {
        policy: PathBuf,
        /// Fail on any conflict, leaving the database untouched
        #[arg(long)]
        secure_mode: bool,
        /// Restore access times touched by the partial rescan
        #[arg(long)]
        erase_footprints: bool,
        /// Keep rescan reads out of the page cache
        #[arg(long)]
        direct_io: bool,
    },
    /// Print the database as text
    PrintDb,
    /// Print a report as text
    PrintReport { report: PathBuf },
    /// Change a keyfile passphrase
    ChangePassphrase { keyfile: PathBuf },
    /// Re-sign an artifact under the current local key
    ReEncrypt {
        artifact: PathBuf,
        /// Keyfile whose public half verifies the artifact today
        #[arg(long)]
        old_keyfile: PathBuf,
        /// `db` or `report`
        #[arg(long, default_value = "db")]
        kind: String,
    },
}

fn init_tracing(silent: bool, verbose: bool) {
    let default = if silent {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn passphrase(supplied: &Option<String>, what: &str) -> Result<String> {
    match supplied {
        Some(p) => Ok(p.clone()),
        None => tty::read_passphrase(&format!("Enter {what} passphrase: ")),
    }
}

fn load_cfg(cli: &Cli) -> Result<Config> {
    load_config(&cli.config, None)
}

fn run(cli: &Cli) -> Result<u8> {
    let hashes = if cli.base64 { HashDisplay::Base64 } else { HashDisplay::Hex };

    match &cli.command {
        Command::Genkeys { site, local } => {
            let site_pass = match &cli.site_passphrase {
                Some(p) => p.clone(),
                None => tty::read_new_passphrase("site")?,
            };
            let local_pass = match &cli.local_passphrase {
                Some(p) => p.clone(),
                None => tty::read_new_passphrase("local")?,
            };
            ops::generate_keys(site, &site_pass, local, &local_pass)?;
            Ok(0)
        }
        Command::CreateCfg { input, site } => {
            let text = std::fs::read_to_string(input)
                .map_err(|source| Error::IoPath { path: input.clone(), source })?;
            let config = Config::from_toml(&text)?;
            let keyfile = Keyfile::load(site)?;
            let signing = keyfile.unlock(&passphrase(&cli.site_passphrase, "site")?)?;
            save_config(&cli.config, &config, &signing)?;
            Ok(0)
        }
        Command::CreatePol { input } => {
            let config = load_cfg(cli)?;
            let text = std::fs::read_to_string(input)
                .map_err(|source| Error::IoPath { path: input.clone(), source })?;
            let keyfile = Keyfile::load(&config.site_keyfile)?;
            let signing = keyfile.unlock(&passphrase(&cli.site_passphrase, "site")?)?;
            ops::save_policy_text(&config.policy_file, &text, &signing)?;
            Ok(0)
        }
        Command::Init => {
            let config = load_cfg(cli)?;
            let pass = passphrase(&cli.local_passphrase, "local")?;
            ops::init(&config, &pass)?;
            Ok(0)
        }
        Command::Check => {
            let config = load_cfg(cli)?;
            let pass = passphrase(&cli.local_passphrase, "local")?;
            let level = level_of(cli, &config)?;
            let (text, status) = ops::check(&config, &pass, level, hashes)?;
            print!("{text}");
            Ok(status)
        }
        Command::UpdateDb { report, accept_all } => {
            let config = load_cfg(cli)?;
            let pass = passphrase(&cli.local_passphrase, "local")?;
            ops::update_db(&config, &pass, report, !accept_all)?;
            Ok(0)
        }
        Command::UpdatePolicy { policy, secure_mode, erase_footprints, direct_io } => {
            let config = load_cfg(cli)?;
            let pass = passphrase(&cli.local_passphrase, "local")?;
            let opts = PolicyUpdateOptions {
                secure_mode: *secure_mode,
                erase_footprints: *erase_footprints,
                direct_io: *direct_io,
            };
            let report = ops::update_policy(&config, &pass, policy, opts)?;
            let level = level_of(cli, &config)?;
            print!("{}", verity::print::report::render_report(&report, level, hashes));
            Ok(0)
        }
        Command::PrintDb => {
            let config = load_cfg(cli)?;
            print!("{}", ops::print_db(&config, hashes)?);
            Ok(0)
        }
        Command::PrintReport { report } => {
            let config = load_cfg(cli)?;
            let level = level_of(cli, &config)?;
            print!("{}", ops::print_report(&config, report, level, hashes)?);
            Ok(0)
        }
        Command::ChangePassphrase { keyfile } => {
            let old = tty::read_passphrase("Enter current passphrase: ")?;
            let new = tty::read_new_passphrase("new")?;
            ops::change_passphrase(keyfile, &old, &new)?;
            Ok(0)
        }
        Command::ReEncrypt { artifact, old_keyfile, kind } => {
            let config = load_cfg(cli)?;
            let kind = match kind.as_str() {
                "db" => ArtifactKind::Database,
                "report" => ArtifactKind::Report,
                other => {
                    return Err(Error::ConfigParse(format!("unknown artifact kind '{other}'")))
                }
            };
            let old = Keyfile::load(old_keyfile)?;
            let current = Keyfile::load(&config.local_keyfile)?;
            let signing = current.unlock(&passphrase(&cli.local_passphrase, "local")?)?;
            ops::re_encrypt(artifact, kind, old.public(), &signing)?;
            Ok(0)
        }
    }
}

fn level_of(cli: &Cli, config: &Config) -> Result<ReportLevel> {
    let n = cli.report_level.unwrap_or(config.report_level);
    ReportLevel::from_number(n)
        .ok_or_else(|| Error::ConfigParse(format!("report level {n} is out of range")))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.silent, cli.verbose);

    match run(&cli) {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            eprintln!("verity: [{}] {err}", err.id());
            if let Some(extra) = err.extra() {
                eprintln!("verity: {extra}");
            }
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
