#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the menu REPL.
//!
//! The lexer uses `regal` to produce a bounded token stream, while the parser
//! composes `winnow` combinators over that token slice, steered by the static
//! node graph in [`super::catalog`].

use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
use thiserror::Error;
use winnow::combinator::opt;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::token::any;

use super::catalog::{self, ChoiceTag, CommandTag, Node, SubcommandTag, ValueSpec};

/// Maximum number of tokens produced per REPL line. Commands remain short and bounded.
pub const MAX_TOKENS: usize = 16;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Lexical token kinds recognized by the REPL grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Unsuffixed integer literal.
    #[regex(r"[0-9]+")]
    Integer,
    /// Identifier or keyword (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9_-]*")]
    Ident,
    /// Inline whitespace is ignored.
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

/// Bounded token buffer to avoid dynamic allocation in `no_std` environments.
pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    #[error("token buffer exhausted after {processed} items")]
    TooManyTokens { processed: usize },
    #[error("lexer engine error")]
    Engine,
}

/// Grammar errors emitted by the parser.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GrammarErrorKind<'a> {
    #[error("expected {expected}, found `{lexeme}` at {span:?}")]
    UnexpectedToken {
        expected: &'static str,
        lexeme: &'a str,
        span: Range<usize>,
    },
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("unknown command `{lexeme}`")]
    UnknownCommand { lexeme: &'a str },
    #[error("invalid index literal at {span:?}")]
    InvalidIndex { span: Range<usize> },
    #[error("invalid duration literal at {span:?}")]
    InvalidDuration { span: Range<usize> },
    #[error("unsupported token `{lexeme}` at {span:?}")]
    InvalidToken { span: Range<usize>, lexeme: &'a str },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error(transparent)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) => GrammarErrorKind::UnexpectedToken {
                    expected,
                    lexeme: tok.lexeme,
                    span: tok.span.clone(),
                },
                None => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn invalid_index(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidIndex {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_duration(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidDuration {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError<'a> {
    #[error(transparent)]
    Lex(LexError),
    #[error(transparent)]
    Grammar(GrammarError<'a>),
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Open,
    Select(usize),
    Hold(usize),
    Dismiss,
    Wait(Duration),
    Lock(bool),
    Restrict(bool),
    Provision(bool),
    Event(EventCommand),
    Status,
    Help(HelpCommand<'a>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventCommand {
    pub topic: SubcommandTag,
    pub on: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

type Input<'src, 'slice> = &'slice [Token<'src>];
type GrammarResult<'src, T> = ModalResult<T, GrammarError<'src>>;

impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    type Inner = Self;

    fn from_input(input: &Input<'src, 'slice>) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn into_inner(self) -> Result<Self::Inner, Self> {
        Ok(self)
    }
}

pub(crate) fn parse_tokens_partial<'src, 'slice>(
    tokens: &'slice [Token<'src>],
) -> Result<(Command<'src>, &'slice [Token<'src>]), GrammarError<'src>>
where
    'src: 'slice,
{
    let mut input = tokens;
    match command.parse_next(&mut input) {
        Ok(command) => Ok((command, input)),
        Err(ErrMode::Backtrack(error) | ErrMode::Cut(error)) => Err(error),
        Err(ErrMode::Incomplete(_)) => Err(GrammarError::unexpected("token", input.first())),
    }
}

/// Tokenize the provided line.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        push_token(&mut buffer, record.token, lexeme, span)?;
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let span = start..start + partial.fragment.len();
        push_token(&mut buffer, TokenKind::Error, partial.fragment, span)?;
    }

    Ok(buffer)
}

fn push_token<'a>(
    buffer: &mut TokenBuffer<'a>,
    kind: TokenKind,
    lexeme: &'a str,
    span: Range<usize>,
) -> Result<(), LexError> {
    buffer
        .push(Token { kind, lexeme, span })
        .map_err(|_| LexError::TooManyTokens {
            processed: MAX_TOKENS + 1,
        })
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a REPL command from the provided line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
    }

    let (command, rest) = parse_tokens_partial(tokens.as_slice()).map_err(ParseError::Grammar)?;

    if let Some(token) = rest.iter().find(|token| token.kind != TokenKind::Eol) {
        return Err(ParseError::Grammar(GrammarError::unexpected(
            "end of command",
            Some(token),
        )));
    }

    Ok(command)
}

fn command<'src, 'slice>(input: &mut Input<'src, 'slice>) -> GrammarResult<'src, Command<'src>>
where
    'src: 'slice,
{
    let keyword = token_of(TokenKind::Ident, "command keyword").parse_next(input)?;
    let spec = catalog::find(keyword.lexeme).ok_or(ErrMode::Cut(GrammarError {
        kind: GrammarErrorKind::UnknownCommand {
            lexeme: keyword.lexeme,
        },
    }))?;

    let mut state = CommandState::new(spec.tag);
    parse_node(spec.grammar, input, &mut state)?;
    state.finish()
}

fn parse_node<'src, 'slice>(
    node: &'static Node,
    input: &mut Input<'src, 'slice>,
    state: &mut CommandState<'src>,
) -> GrammarResult<'src, ()>
where
    'src: 'slice,
{
    match node {
        Node::End => Ok(()),
        Node::Argument { label, value, next } => {
            parse_value(input, *value, *label, state)?;
            parse_node(next, input, state)
        }
        Node::Choice(choices) => {
            let label = choices.first().map_or("keyword", |choice| choice.keyword);
            let branch = keyword_in(*choices, |choice| choice.keyword, label).parse_next(input)?;
            state.switch = Some(branch.tag == ChoiceTag::On);
            Ok(())
        }
        Node::Subcommands(branches) => {
            let label = branches.first().map_or("subcommand", |branch| branch.name);
            let branch = keyword_in(*branches, |branch| branch.name, label).parse_next(input)?;
            state.subcommand = Some(branch.tag);
            parse_node(branch.grammar, input, state)
        }
        Node::Topic { next } => {
            state.help_topic = opt(token_of(TokenKind::Ident, "topic"))
                .parse_next(input)?
                .map(|token| token.lexeme);
            parse_node(next, input, state)
        }
    }
}

fn parse_value<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    spec: ValueSpec,
    label: &'static str,
    state: &mut CommandState<'src>,
) -> GrammarResult<'src, ()>
where
    'src: 'slice,
{
    match spec {
        ValueSpec::Index => {
            let token = token_of(TokenKind::Integer, label).parse_next(input)?;
            let index = token
                .lexeme
                .parse::<usize>()
                .map_err(|_| ErrMode::Cut(GrammarError::invalid_index(&token)))?;
            state.index = Some(index);
        }
        ValueSpec::Duration { .. } => {
            let token = token_of(TokenKind::Duration, label).parse_next(input)?;
            state.duration = Some(parse_duration(&token).map_err(ErrMode::Cut)?);
        }
    }
    Ok(())
}

/// Values collected while walking a command's grammar.
struct CommandState<'a> {
    tag: CommandTag,
    index: Option<usize>,
    duration: Option<Duration>,
    switch: Option<bool>,
    subcommand: Option<SubcommandTag>,
    help_topic: Option<&'a str>,
}

impl<'a> CommandState<'a> {
    const fn new(tag: CommandTag) -> Self {
        Self {
            tag,
            index: None,
            duration: None,
            switch: None,
            subcommand: None,
            help_topic: None,
        }
    }

    fn finish(self) -> GrammarResult<'a, Command<'a>> {
        let missing = |expected| ErrMode::Backtrack(GrammarError::unexpected(expected, None));
        match self.tag {
            CommandTag::Open => Ok(Command::Open),
            CommandTag::Dismiss => Ok(Command::Dismiss),
            CommandTag::Status => Ok(Command::Status),
            CommandTag::Help => Ok(Command::Help(HelpCommand {
                topic: self.help_topic,
            })),
            CommandTag::Select => self
                .index
                .map(Command::Select)
                .ok_or_else(|| missing("index")),
            CommandTag::Hold => self.index.map(Command::Hold).ok_or_else(|| missing("index")),
            CommandTag::Wait => self
                .duration
                .map(Command::Wait)
                .ok_or_else(|| missing("duration")),
            CommandTag::Lock => self.switch.map(Command::Lock).ok_or_else(|| missing("on")),
            CommandTag::Restrict => self
                .switch
                .map(Command::Restrict)
                .ok_or_else(|| missing("on")),
            CommandTag::Provision => self
                .switch
                .map(Command::Provision)
                .ok_or_else(|| missing("on")),
            CommandTag::Event => match (self.subcommand, self.switch) {
                (Some(topic), Some(on)) => Ok(Command::Event(EventCommand { topic, on })),
                (None, _) => Err(missing("airplane")),
                (Some(_), None) => Err(missing("on")),
            },
        }
    }
}

/// Reports `label` as missing; a trailing line ending counts as end of input.
fn expected<'src>(label: &'static str, found: Option<&Token<'src>>) -> ErrMode<GrammarError<'src>> {
    let found = found.filter(|token| token.kind != TokenKind::Eol);
    ErrMode::Backtrack(GrammarError::unexpected(label, found))
}

fn token_of<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl ModalParser<Input<'src, 'slice>, Token<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        any.verify(|token: &Token<'src>| token.kind == kind)
            .parse_next(input)
            .map_err(|_: ErrMode<GrammarError<'src>>| expected(label, input.first()))
    }
}

/// Matches an identifier against `branches`, case-insensitively.
fn keyword_in<'src, 'slice, B>(
    branches: &'static [B],
    name: fn(&B) -> &'static str,
    label: &'static str,
) -> impl ModalParser<Input<'src, 'slice>, &'static B, GrammarError<'src>>
where
    'src: 'slice,
    B: 'static,
{
    move |input: &mut Input<'src, 'slice>| {
        any.verify_map(|token: Token<'src>| {
            if token.kind != TokenKind::Ident {
                return None;
            }
            branches
                .iter()
                .find(|branch| name(branch).eq_ignore_ascii_case(token.lexeme))
        })
        .parse_next(input)
        .map_err(|_: ErrMode<GrammarError<'src>>| expected(label, input.first()))
    }
}

fn parse_duration<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    let text = token.lexeme;
    if let Some(rest) = text.strip_suffix("ms") {
        let millis = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_millis(millis.into()))
    } else if let Some(rest) = text.strip_suffix('s') {
        let seconds = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_secs(seconds.into()))
    } else {
        Err(GrammarError::invalid_duration(token))
    }
}
