use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::ops::Add;
use std::path::{Path, PathBuf};
use std::time::Duration;

use globalactions_core::actions::{Action, ActionKind, CatalogFactory, Effect, HostSnapshot};
use globalactions_core::config::MenuConfig;
use globalactions_core::menu::MenuController;
use globalactions_core::policy::PolicyFlags;
use globalactions_core::registry::ActionRegistry;
use globalactions_core::repl::catalog::{self, CommandSpec};
use globalactions_core::repl::commands::{CommandError, CommandExecutor, CommandOutcome};
use globalactions_core::repl::completion::{CompletionEngine, Replacement};
use globalactions_core::repl::status::{StatusFormatter, StatusSnapshot};
use globalactions_core::session::{
    ActionEffects, MenuSession, SelectOutcome, SessionEvent, SessionTiming,
};
use globalactions_core::telemetry::TelemetryInstant;

/// Virtual clock reading in microseconds since the emulator started.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct VirtualInstant(u64);

impl VirtualInstant {
    pub fn elapsed(self) -> Duration {
        Duration::from_micros(self.0)
    }
}

impl Add<Duration> for VirtualInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        VirtualInstant(self.0.saturating_add(micros))
    }
}

impl TelemetryInstant for VirtualInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

/// Effect sink standing in for the platform: effects are logged and queued
/// for the next response.
#[derive(Default)]
pub struct RecordingEffects {
    performed: Vec<Effect>,
}

impl RecordingEffects {
    fn take(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.performed)
    }
}

impl ActionEffects for RecordingEffects {
    fn perform(&mut self, effect: Effect) {
        log::info!("effect: {effect}");
        self.performed.push(effect);
    }
}

/// Everything needed to stand up a session.
pub struct SessionOptions {
    pub config: MenuConfig,
    pub flags: PolicyFlags,
    pub snapshot: HostSnapshot,
    pub transcript: Option<PathBuf>,
    pub header: &'static str,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            config: MenuConfig::default(),
            flags: PolicyFlags::new(false, true),
            snapshot: HostSnapshot::default(),
            transcript: None,
            header: "Global actions emulator transcript",
        }
    }
}

#[derive(Debug)]
pub enum CompletionResponse {
    NoMatches,
    Applied { replacement: Replacement },
    Suggestions { options: Vec<&'static str> },
}

type Executor = CommandExecutor<CatalogFactory, RecordingEffects, VirtualInstant>;

pub struct Session {
    executor: Executor,
    transcript: Option<TranscriptLogger>,
    clock: VirtualInstant,
    completion: CompletionEngine,
}

impl Session {
    pub fn new(options: SessionOptions) -> io::Result<Self> {
        let transcript = options
            .transcript
            .as_deref()
            .map(|path| TranscriptLogger::new(path, options.header))
            .transpose()?;

        let registry = ActionRegistry::from_config(&options.config);
        let controller = MenuController::new(registry, CatalogFactory::new(options.snapshot));
        let session = MenuSession::new(
            controller,
            RecordingEffects::default(),
            SessionTiming::default(),
        );

        Ok(Self {
            executor: CommandExecutor::new(session, options.flags),
            transcript,
            clock: VirtualInstant::default(),
            completion: CompletionEngine::new(),
        })
    }

    pub fn now(&self) -> VirtualInstant {
        self.clock
    }

    /// Re-reads configuration into the live session.
    pub fn reload(&mut self, config: &MenuConfig) -> io::Result<Vec<String>> {
        let elapsed = self.clock.elapsed();
        self.executor
            .session_mut()
            .settings_changed(config, self.clock);
        let mut lines = vec![format!(
            "OK reload visible={}",
            self.executor.session().controller().visible_count()
        )];
        lines.extend(self.describe_menu());
        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.clock.elapsed();
        self.record(elapsed, TranscriptRole::Host, trimmed)?;

        let mut lines = match self.executor.execute(trimmed, self.clock) {
            Ok(outcome) => self.describe_outcome(outcome),
            Err(CommandError::Parse(err)) => vec![format!("ERR syntax {err}")],
            Err(CommandError::UnknownTopic(topic)) => vec![
                format!("No help available for `{topic}`."),
                format!("Available topics: {}", help_topic_list()),
            ],
            Err(err) => vec![format!("ERR {err}")],
        };

        for effect in self.executor.session_mut().effects_mut().take() {
            lines.push(format!("EFFECT {effect}"));
        }

        self.record_output(self.clock.elapsed(), &lines)?;
        Ok(lines)
    }

    pub fn handle_completion(
        &mut self,
        buffer: &str,
        cursor: usize,
    ) -> io::Result<CompletionResponse> {
        let cursor = cursor.min(buffer.len());
        let (prefix, suffix) = buffer.split_at(cursor);
        let elapsed = self.clock.elapsed();
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.log_completion_request(elapsed, prefix, suffix, cursor)?;
        }

        let result = self.completion.complete(buffer, cursor);
        let options: Vec<&'static str> = result.options.iter().copied().collect();
        let response = match (options.len(), result.replacement) {
            (0, _) | (1, None) => CompletionResponse::NoMatches,
            (1, Some(replacement)) => CompletionResponse::Applied { replacement },
            _ => CompletionResponse::Suggestions { options },
        };

        if let Some(transcript) = self.transcript.as_mut() {
            transcript.log_completion(elapsed, &response)?;
        }
        Ok(response)
    }

    fn describe_outcome(&mut self, outcome: CommandOutcome<VirtualInstant>) -> Vec<String> {
        match outcome {
            CommandOutcome::Opened { visible, immediate } => {
                let mut lines = vec![format!("OK open root visible={visible}")];
                match immediate {
                    Some(outcome) => {
                        lines.push(format!("fired lone action: {}", describe_select(outcome)));
                    }
                    None => lines.extend(self.describe_menu()),
                }
                lines
            }
            CommandOutcome::Selected(outcome) => vec![format!("OK {}", describe_select(outcome))],
            CommandOutcome::Held(effect) => vec![format!("OK hold {effect}")],
            CommandOutcome::Dismissing => vec!["OK dismissing".to_string()],
            CommandOutcome::Waited { until, events } => {
                self.clock = until;
                let mut lines = vec![format!(
                    "OK wait now=+{}ms events={}",
                    until.elapsed().as_millis(),
                    events.len()
                )];
                for event in &events {
                    lines.push(format!("  {}", describe_event(*event)));
                    if matches!(event, SessionEvent::Shown(_) | SessionEvent::Refreshed) {
                        lines.extend(self.describe_menu());
                    }
                }
                lines
            }
            CommandOutcome::PolicyUpdated(flags) => {
                let mut lines = vec![format!(
                    "OK policy locked={} restricted={} provisioned={}",
                    flags.locked, flags.restricted_keyguard, flags.provisioned
                )];
                lines.extend(self.describe_menu());
                lines
            }
            CommandOutcome::EventApplied(event) => vec![format!("OK event {event:?}")],
            CommandOutcome::Status(snapshot) => describe_status(&snapshot),
            CommandOutcome::Help(topic) => describe_help(topic),
        }
    }

    /// One line per visible action, prefixed with its selection index.
    fn describe_menu(&self) -> Vec<String> {
        let controller = self.executor.session().controller();
        let mut lines = Vec::new();
        for (index, action) in controller.visible().enumerate() {
            lines.push(format!("  [{index}] {}", describe_action(action)));
        }
        for error in controller.errors() {
            lines.push(format!("  config: {error}"));
        }
        lines
    }

    fn record(&mut self, elapsed: Duration, role: TranscriptRole, line: &str) -> io::Result<()> {
        match self.transcript.as_mut() {
            Some(transcript) => transcript.append_line(elapsed, role, line),
            None => Ok(()),
        }
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.record(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn describe_action(action: &Action) -> String {
    let mut text = format!("{} ({})", action.label(), action.key());
    match action.kind() {
        ActionKind::Toggle { machine, .. } => {
            text.push_str(&format!(" toggle={}", machine.state()));
        }
        ActionKind::LongPress { long_press, .. } => text.push_str(&format!(" hold={long_press}")),
        ActionKind::SinglePress { .. } => {}
    }
    if action.opens().is_some() {
        text.push_str(" submenu");
    }
    if !action.is_enabled() {
        text.push_str(" disabled");
    }
    text
}

fn describe_select(outcome: SelectOutcome) -> String {
    match outcome {
        SelectOutcome::Performed(effect) => format!("performed {effect}"),
        SelectOutcome::Deferred(effect) => format!("deferred {effect}"),
        SelectOutcome::Toggled { target, press } => format!(
            "toggle {} -> {}{}",
            target.label(),
            press.state,
            if press.awaiting_confirmation {
                " (awaiting host)"
            } else {
                ""
            }
        ),
        SelectOutcome::SubmenuPending => "reboot submenu pending".to_string(),
        SelectOutcome::ExitedEmergencyCallback => "exit emergency callback mode".to_string(),
    }
}

fn describe_event(event: SessionEvent) -> String {
    match event {
        SessionEvent::Dismissed => "dismissed".to_string(),
        SessionEvent::Shown(variant) => format!("shown {variant}"),
        SessionEvent::Refreshed => "refreshed".to_string(),
        SessionEvent::ToggleTimedOut(key) => format!("{key} confirmation timed out"),
    }
}

fn describe_status(snapshot: &StatusSnapshot) -> Vec<String> {
    let mut text = String::new();
    match write_status(&StatusFormatter::new(snapshot), &mut text) {
        Ok(()) => text.lines().map(str::to_string).collect(),
        Err(_) => vec!["ERR status formatting".to_string()],
    }
}

fn write_status(formatter: &StatusFormatter<'_>, out: &mut String) -> fmt::Result {
    formatter.write_menu_line(out)?;
    out.push('\n');
    formatter.write_policy_line(out)?;
    out.push('\n');
    formatter.write_toggles_line(out)?;
    out.push('\n');
    formatter.write_pending_line(out)
}

fn describe_help(topic: Option<&'static CommandSpec>) -> Vec<String> {
    match topic {
        Some(spec) => vec![format!("{:<52} - {}", spec.usage, spec.summary)],
        None => {
            let mut lines = vec!["Available commands:".to_string()];
            for spec in catalog::commands() {
                lines.push(format!("  {:<52} - {}", spec.usage, spec.summary));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
            lines
        }
    }
}

fn help_topic_list() -> String {
    catalog::commands()
        .iter()
        .map(|spec| spec.name)
        .collect::<Vec<_>>()
        .join(", ")
}

struct TranscriptLogger {
    writer: BufWriter<File>,
}

impl TranscriptLogger {
    fn new(path: &Path, header: &str) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        writeln!(logger.writer, "# {header}")?;
        writeln!(logger.writer, "# Timestamps are virtual milliseconds since session start")?;
        writeln!(logger.writer)?;
        logger.writer.flush()?;
        Ok(logger)
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }

    fn log_completion_request(
        &mut self,
        elapsed: Duration,
        prefix: &str,
        suffix: &str,
        cursor: usize,
    ) -> io::Result<()> {
        let message = format!("[TAB] prefix={prefix:?} suffix={suffix:?} cursor={cursor}");
        self.append_line(elapsed, TranscriptRole::Host, &message)
    }

    fn log_completion(
        &mut self,
        elapsed: Duration,
        response: &CompletionResponse,
    ) -> io::Result<()> {
        match response {
            CompletionResponse::NoMatches => {
                self.append_line(elapsed, TranscriptRole::Emulator, "completion: no matches")
            }
            CompletionResponse::Applied { replacement } => {
                let message = format!(
                    "completion applied: {} (range={}..{})",
                    replacement.value, replacement.start, replacement.end
                );
                self.append_line(elapsed, TranscriptRole::Emulator, &message)
            }
            CompletionResponse::Suggestions { options } => {
                let summary = format!("completion options ({})", options.len());
                self.append_line(elapsed, TranscriptRole::Emulator, &summary)?;
                for option in options {
                    self.append_line(elapsed, TranscriptRole::Emulator, &format!("  {option}"))?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
