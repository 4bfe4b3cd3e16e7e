mod session;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::style::Stylize;
use globalactions_core::actions::HostSnapshot;
use globalactions_core::config::MenuConfig;
use globalactions_core::policy::PolicyFlags;

use session::{CompletionResponse, Session, SessionOptions};

/// Interactive driver for the global actions menu on a virtual clock.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Menu configuration file (`name = value` lines).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Start with the keyguard showing.
    #[arg(long)]
    locked: bool,
    /// Start with a restricted keyguard.
    #[arg(long)]
    restricted: bool,
    /// Start before device provisioning completes.
    #[arg(long)]
    unprovisioned: bool,
    /// Simulate a device without a radio; airplane mode then applies immediately.
    #[arg(long)]
    no_telephony: bool,
    /// Write a transcript of the session to this file.
    #[arg(long, value_name = "FILE")]
    transcript: Option<PathBuf>,
    /// Disable colored output.
    #[arg(long)]
    plain: bool,
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match args.config.as_deref() {
        Some(path) => load_config(path)?,
        None => MenuConfig::default(),
    };
    let options = SessionOptions {
        config,
        flags: PolicyFlags::new(args.locked, !args.unprovisioned)
            .with_restricted_keyguard(args.restricted),
        snapshot: HostSnapshot {
            has_telephony: !args.no_telephony,
            ..HostSnapshot::default()
        },
        transcript: args.transcript.clone(),
        ..SessionOptions::default()
    };
    let mut session = Session::new(options).context("failed to start emulator session")?;

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut line = String::new();

    writeln!(
        writer,
        "Global actions emulator ready. Type `help` for commands, \
         `complete <text>` to test completion or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "[+{}ms]> ", session.now().elapsed().as_millis())?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = if trimmed.eq_ignore_ascii_case("reload") {
            match args.config.as_deref() {
                Some(path) => {
                    let config = load_config(path)?;
                    session.reload(&config)?
                }
                None => vec!["ERR no --config file to reload".to_string()],
            }
        } else if let Some(buffer) = trimmed.strip_prefix("complete ") {
            describe_completion(session.handle_completion(buffer, buffer.len())?)
        } else {
            session.handle_command(trimmed)?
        };

        for response in responses {
            writeln!(writer, "{}", paint(&response, args.plain))?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn load_config(path: &Path) -> Result<MenuConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    MenuConfig::parse(&text).with_context(|| format!("invalid configuration in {}", path.display()))
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn describe_completion(response: CompletionResponse) -> Vec<String> {
    match response {
        CompletionResponse::NoMatches => vec!["completion: no matches".to_string()],
        CompletionResponse::Applied { replacement } => vec![format!(
            "completion: {}{}",
            replacement.value,
            if replacement.append_space { " " } else { "" }
        )],
        CompletionResponse::Suggestions { options } => {
            vec![format!("completion: {}", options.join("  "))]
        }
    }
}

fn paint(line: &str, plain: bool) -> String {
    if plain {
        return line.to_string();
    }
    if line.starts_with("OK") {
        line.green().to_string()
    } else if line.starts_with("ERR") {
        line.red().to_string()
    } else if line.starts_with("EFFECT") {
        line.cyan().bold().to_string()
    } else if line.starts_with("  [") {
        line.white().to_string()
    } else {
        line.to_string()
    }
}
