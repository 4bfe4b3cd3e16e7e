//! Menu configuration: stock key lists plus a small `name = value` text format.
//!
//! ```text
//! # keys shown in the root menu, in order
//! root = power, restart, airplane
//! reboot = restart, reboot_recovery
//! disable = airplane
//! advanced_reboot = on
//! emergency_affordance = false
//! ```
//!
//! Settings not mentioned keep their stock value. Later lines override
//! earlier ones; `enable`/`disable` accumulate.

use heapless::LinearMap;
use thiserror::Error;
use winnow::ascii::space0;
use winnow::combinator::{alt, delimited, eof, opt, preceded, terminated};
use winnow::token::{take_till, take_while};
use winnow::{ModalResult, Parser};

use crate::actions::{KeyError, MenuKey, MenuVariant, catalog};
use crate::registry::{KeyList, MAX_ENABLEMENT_FLAGS};

/// Stock root menu order.
pub const DEFAULT_ROOT_KEYS: [MenuKey; 12] = [
    catalog::POWER,
    catalog::RESTART,
    catalog::EMERGENCY,
    catalog::LOCKDOWN,
    catalog::LOGOUT,
    catalog::SCREENSHOT,
    catalog::AIRPLANE,
    catalog::SILENT,
    catalog::FLASHLIGHT,
    catalog::BUGREPORT,
    catalog::USERS,
    catalog::SETTINGS,
];

/// Stock reboot submenu order.
pub const DEFAULT_REBOOT_KEYS: [MenuKey; 4] = [
    catalog::RESTART,
    catalog::REBOOT_SYSTEMUI,
    catalog::REBOOT_RECOVERY,
    catalog::REBOOT_BOOTLOADER,
];

/// Host configuration read at session open and on settings changes.
#[derive(Clone, Debug)]
pub struct MenuConfig {
    pub root: KeyList,
    pub reboot: KeyList,
    pub enablement: LinearMap<MenuKey, bool, MAX_ENABLEMENT_FLAGS>,
    pub advanced_reboot: bool,
    pub emergency_affordance: bool,
}

impl MenuConfig {
    /// Configuration without any keys or flags.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            root: KeyList::new(),
            reboot: KeyList::new(),
            enablement: LinearMap::new(),
            advanced_reboot: false,
            emergency_affordance: false,
        }
    }

    #[must_use]
    pub fn keys(&self, variant: MenuVariant) -> &[MenuKey] {
        match variant {
            MenuVariant::Root => &self.root,
            MenuVariant::Reboot => &self.reboot,
        }
    }

    /// Parses configuration text on top of the stock defaults.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for (index, raw) in text.lines().enumerate() {
            config.apply_line(index + 1, raw)?;
        }
        Ok(config)
    }

    fn apply_line(&mut self, line: usize, raw: &str) -> Result<(), ConfigError> {
        let mut input = raw;
        let Some((name, value)) = statement
            .parse_next(&mut input)
            .map_err(|_| ConfigError::Syntax { line })?
        else {
            return Ok(());
        };

        match name {
            "root" => self.root = key_list(line, value)?,
            "reboot" => self.reboot = key_list(line, value)?,
            "enable" | "disable" => {
                let enabled = name == "enable";
                for key in key_list(line, value)? {
                    self.enablement
                        .insert(key, enabled)
                        .map_err(|_| ConfigError::TooManyKeys { line })?;
                }
            }
            "advanced_reboot" => self.advanced_reboot = boolean(line, value)?,
            "emergency_affordance" => self.emergency_affordance = boolean(line, value)?,
            _ => return Err(ConfigError::UnknownSetting { line }),
        }

        Ok(())
    }
}

impl Default for MenuConfig {
    fn default() -> Self {
        let mut config = Self::empty();
        config.root = DEFAULT_ROOT_KEYS.iter().copied().collect();
        config.reboot = DEFAULT_REBOOT_KEYS.iter().copied().collect();
        config
    }
}

/// Errors raised while reading configuration text. Line numbers are 1-based.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("line {line}: expected `name = value`")]
    Syntax { line: usize },
    #[error("line {line}: unknown setting")]
    UnknownSetting { line: usize },
    #[error("line {line}: {source}")]
    InvalidKey { line: usize, source: KeyError },
    #[error("line {line}: too many keys")]
    TooManyKeys { line: usize },
    #[error("line {line}: expected true/false/on/off")]
    InvalidBool { line: usize },
}

impl ConfigError {
    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            ConfigError::Syntax { line }
            | ConfigError::UnknownSetting { line }
            | ConfigError::InvalidKey { line, .. }
            | ConfigError::TooManyKeys { line }
            | ConfigError::InvalidBool { line } => *line,
        }
    }
}

fn setting_name<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

fn comment<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    preceded('#', take_till(0.., ['\r', '\n'])).parse_next(input)
}

fn assignment<'s>(input: &mut &'s str) -> ModalResult<(&'s str, &'s str)> {
    (
        terminated(setting_name, (space0, '=', space0)),
        take_till(0.., '#').map(str::trim_end),
    )
        .parse_next(input)
}

/// One line: blank, comment only, or an assignment with optional trailing comment.
fn statement<'s>(input: &mut &'s str) -> ModalResult<Option<(&'s str, &'s str)>> {
    delimited(space0, opt(assignment), (space0, opt(comment), eof)).parse_next(input)
}

fn list_item<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(1.., |c: char| !c.is_whitespace() && c != ',').parse_next(input)
}

fn separator(input: &mut &str) -> ModalResult<()> {
    (space0, ',', space0).void().parse_next(input)
}

fn key_list(line: usize, value: &str) -> Result<KeyList, ConfigError> {
    let mut keys = KeyList::new();
    let mut input = value;

    while !input.is_empty() {
        if !keys.is_empty() {
            separator
                .parse_next(&mut input)
                .map_err(|_| ConfigError::Syntax { line })?;
        }
        let token = list_item
            .parse_next(&mut input)
            .map_err(|_| ConfigError::Syntax { line })?;
        let key = MenuKey::new(token).map_err(|source| ConfigError::InvalidKey { line, source })?;
        keys.push(key)
            .map_err(|_| ConfigError::TooManyKeys { line })?;
    }

    Ok(keys)
}

fn boolean(line: usize, value: &str) -> Result<bool, ConfigError> {
    let mut input = value;
    let parsed: ModalResult<bool> = terminated(
        alt((
            "true".value(true),
            "on".value(true),
            "yes".value(true),
            "false".value(false),
            "off".value(false),
            "no".value(false),
        )),
        eof,
    )
    .parse_next(&mut input);
    parsed.map_err(|_| ConfigError::InvalidBool { line })
}
