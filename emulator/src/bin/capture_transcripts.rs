use std::io;
use std::path::PathBuf;

use globalactions_core::actions::HostSnapshot;
use globalactions_core::config::MenuConfig;
use globalactions_core::policy::PolicyFlags;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, SessionOptions};

const TRANSCRIPT_DIR: &str = "transcripts";

const SUBMENU_CONFIG: &str = "\
root = power, restart, screenshot, airplane
reboot = restart, reboot_systemui, reboot_recovery, reboot_bootloader
advanced_reboot = on
";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Scenario {
    RebootSubmenu,
    Toggles,
    Keyguard,
}

impl Scenario {
    const ALL: [Scenario; 3] = [Scenario::RebootSubmenu, Scenario::Toggles, Scenario::Keyguard];

    fn file_name(self) -> &'static str {
        match self {
            Scenario::RebootSubmenu => "reboot-submenu.log",
            Scenario::Toggles => "toggles.log",
            Scenario::Keyguard => "keyguard.log",
        }
    }

    fn header(self) -> &'static str {
        match self {
            Scenario::RebootSubmenu => "Global actions emulator reboot submenu transcript",
            Scenario::Toggles => "Global actions emulator toggle transcript",
            Scenario::Keyguard => "Global actions emulator keyguard transcript",
        }
    }
}

fn main() -> io::Result<()> {
    env_logger::init();
    for scenario in Scenario::ALL {
        record_scenario(scenario)?;
    }
    Ok(())
}

fn record_scenario(scenario: Scenario) -> io::Result<()> {
    let config = match scenario {
        Scenario::RebootSubmenu => MenuConfig::parse(SUBMENU_CONFIG)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?,
        Scenario::Toggles | Scenario::Keyguard => MenuConfig::default(),
    };
    let flags = match scenario {
        Scenario::Keyguard => PolicyFlags::new(true, true).with_restricted_keyguard(true),
        Scenario::RebootSubmenu | Scenario::Toggles => PolicyFlags::new(false, true),
    };

    let mut session = Session::new(SessionOptions {
        config,
        flags,
        snapshot: HostSnapshot::default(),
        transcript: Some(PathBuf::from(TRANSCRIPT_DIR).join(scenario.file_name())),
        header: scenario.header(),
    })?;

    match scenario {
        Scenario::RebootSubmenu => record_reboot_submenu(&mut session),
        Scenario::Toggles => record_toggles(&mut session),
        Scenario::Keyguard => record_keyguard(&mut session),
    }
}

fn record_reboot_submenu(session: &mut Session) -> io::Result<()> {
    session.handle_completion("s", 1)?;
    session.handle_completion("sel", 3)?;
    session.handle_completion("help ", "help ".len())?;

    for line in [
        "open",
        "select 1",
        "status",
        "wait 300ms",
        "select 2",
        "wait 10ms",
        "open",
        "select 2",
        "wait 500ms",
    ] {
        session.handle_command(line)?;
    }
    Ok(())
}

fn record_toggles(session: &mut Session) -> io::Result<()> {
    session.handle_completion("event ", "event ".len())?;
    session.handle_completion("event torch ", "event torch ".len())?;

    for line in [
        "open",
        "select 6",
        "status",
        "event airplane on",
        "wait 10ms",
        "open",
        "select 6",
        "wait 10s",
        "open",
        "select 8",
        "wait 150ms",
        "event torch on",
        "event ecm on",
        "open",
        "select 6",
    ] {
        session.handle_command(line)?;
    }
    Ok(())
}

fn record_keyguard(session: &mut Session) -> io::Result<()> {
    for line in [
        "open",
        "restrict off",
        "lock off",
        "provision off",
        "event affordance off",
        "hold 0",
        "wait 10ms",
        "help wait",
        "select 99",
    ] {
        session.handle_command(line)?;
    }
    Ok(())
}
