//! Shared REPL grammar specification expressed as a static node graph.
//!
//! The parser, the completion engine and the help output all interpret the
//! same structure, keeping keywords and argument layouts in sync.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Open,
    Select,
    Hold,
    Dismiss,
    Wait,
    Lock,
    Restrict,
    Provision,
    Event,
    Status,
    Help,
}

/// Host notification selected by the `event` command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubcommandTag {
    Airplane,
    Ringer,
    Torch,
    Ecm,
    Affordance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChoiceTag {
    On,
    Off,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueSpec {
    /// Position in the visible action list.
    Index,
    /// Literal such as `250ms` or `2s`.
    Duration {
        suggestions: &'static [&'static str],
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub grammar: &'static Node,
    pub usage: &'static str,
    pub summary: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node {
    End,
    Argument {
        label: &'static str,
        value: ValueSpec,
        next: &'static Node,
    },
    Choice(&'static [ChoiceBranch]),
    Subcommands(&'static [SubcommandBranch]),
    /// Optional free-form help topic.
    Topic { next: &'static Node },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChoiceBranch {
    pub keyword: &'static str,
    pub tag: ChoiceTag,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubcommandBranch {
    pub name: &'static str,
    pub tag: SubcommandTag,
    pub grammar: &'static Node,
}

const END: Node = Node::End;

const INDEX_GRAMMAR: Node = Node::Argument {
    label: "index",
    value: ValueSpec::Index,
    next: &END,
};

const WAIT_SUGGESTIONS: [&str; 4] = ["150ms", "300ms", "500ms", "10s"];

const WAIT_GRAMMAR: Node = Node::Argument {
    label: "duration",
    value: ValueSpec::Duration {
        suggestions: &WAIT_SUGGESTIONS,
    },
    next: &END,
};

const SWITCH_CHOICES: [ChoiceBranch; 2] = [
    ChoiceBranch {
        keyword: "on",
        tag: ChoiceTag::On,
    },
    ChoiceBranch {
        keyword: "off",
        tag: ChoiceTag::Off,
    },
];

const SWITCH_GRAMMAR: Node = Node::Choice(&SWITCH_CHOICES);

const EVENT_SUBCOMMANDS: [SubcommandBranch; 5] = [
    SubcommandBranch {
        name: "airplane",
        tag: SubcommandTag::Airplane,
        grammar: &SWITCH_GRAMMAR,
    },
    SubcommandBranch {
        name: "ringer",
        tag: SubcommandTag::Ringer,
        grammar: &SWITCH_GRAMMAR,
    },
    SubcommandBranch {
        name: "torch",
        tag: SubcommandTag::Torch,
        grammar: &SWITCH_GRAMMAR,
    },
    SubcommandBranch {
        name: "ecm",
        tag: SubcommandTag::Ecm,
        grammar: &SWITCH_GRAMMAR,
    },
    SubcommandBranch {
        name: "affordance",
        tag: SubcommandTag::Affordance,
        grammar: &SWITCH_GRAMMAR,
    },
];

const EVENT_GRAMMAR: Node = Node::Subcommands(&EVENT_SUBCOMMANDS);

const HELP_GRAMMAR: Node = Node::Topic { next: &END };

const COMMANDS: [CommandSpec; 11] = [
    CommandSpec {
        name: "open",
        tag: CommandTag::Open,
        grammar: &END,
        usage: "open",
        summary: "Open the root menu with the current lock/provisioning flags.",
    },
    CommandSpec {
        name: "select",
        tag: CommandTag::Select,
        grammar: &INDEX_GRAMMAR,
        usage: "select <index>",
        summary: "Press the visible action at <index>.",
    },
    CommandSpec {
        name: "hold",
        tag: CommandTag::Hold,
        grammar: &INDEX_GRAMMAR,
        usage: "hold <index>",
        summary: "Long-press the visible action at <index>.",
    },
    CommandSpec {
        name: "dismiss",
        tag: CommandTag::Dismiss,
        grammar: &END,
        usage: "dismiss",
        summary: "Schedule a dismiss of the showing menu.",
    },
    CommandSpec {
        name: "wait",
        tag: CommandTag::Wait,
        grammar: &WAIT_GRAMMAR,
        usage: "wait <duration>",
        summary: "Advance the virtual clock, running deferred commands as they fall due.",
    },
    CommandSpec {
        name: "lock",
        tag: CommandTag::Lock,
        grammar: &SWITCH_GRAMMAR,
        usage: "lock on|off",
        summary: "Report a keyguard change.",
    },
    CommandSpec {
        name: "restrict",
        tag: CommandTag::Restrict,
        grammar: &SWITCH_GRAMMAR,
        usage: "restrict on|off",
        summary: "Report a restricted keyguard change.",
    },
    CommandSpec {
        name: "provision",
        tag: CommandTag::Provision,
        grammar: &SWITCH_GRAMMAR,
        usage: "provision on|off",
        summary: "Report a device provisioning change.",
    },
    CommandSpec {
        name: "event",
        tag: CommandTag::Event,
        grammar: &EVENT_GRAMMAR,
        usage: "event airplane|ringer|torch|ecm|affordance on|off",
        summary: "Deliver a host notification through the event inbox.",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        grammar: &END,
        usage: "status",
        summary: "Show menu, toggle and scheduler state.",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        grammar: &HELP_GRAMMAR,
        usage: "help [command]",
        summary: "List commands or describe one.",
    },
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_and_findable() {
        for (index, command) in COMMANDS.iter().enumerate() {
            assert!(
                COMMANDS[index + 1..]
                    .iter()
                    .all(|other| other.name != command.name)
            );
            assert_eq!(find(command.name).map(|spec| spec.tag), Some(command.tag));
        }
        assert_eq!(find("SELECT").map(|spec| spec.tag), Some(CommandTag::Select));
        assert!(find("reboot").is_none());
    }
}
