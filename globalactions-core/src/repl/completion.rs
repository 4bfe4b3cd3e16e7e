//! Grammar-aware completion engine for the menu REPL.
//!
//! The line editor can invoke this module to look up suggestions based on the
//! current buffer contents and cursor position without pulling in `std`.
//! Candidates come from the same node graph the parser walks.

use super::catalog::{self, Node, ValueSpec};
use super::grammar::{self, Token, TokenKind};
use heapless::Vec as HeaplessVec;

const MAX_SUGGESTIONS: usize = 16;

/// Completion result returned to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionResult {
    /// Replacement metadata to apply automatically when only one candidate
    /// matches or when a longer shared prefix exists across candidates.
    pub replacement: Option<Replacement>,
    /// Candidate list corresponding to the current cursor position. An empty
    /// list indicates that no completions were found.
    pub options: HeaplessVec<&'static str, MAX_SUGGESTIONS>,
}

/// Replacement metadata describing which portion of the buffer should be
/// substituted by the completion string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub value: &'static str,
    pub append_space: bool,
}

/// Stateless completion engine that mirrors the REPL grammar.
#[derive(Default)]
pub struct CompletionEngine;

impl CompletionEngine {
    /// Creates a new completion engine.
    pub const fn new() -> Self {
        Self
    }

    /// Computes completions for the provided buffer at the supplied cursor
    /// position.
    ///
    /// The cursor must be positioned at a valid UTF-8 boundary; the caller is
    /// expected to enforce ASCII-only input.
    pub fn complete(&self, buffer: &str, cursor: usize) -> CompletionResult {
        if cursor > buffer.len() {
            return CompletionResult {
                replacement: None,
                options: HeaplessVec::new(),
            };
        }

        let upto_cursor = &buffer[..cursor];
        let prefix_start = token_start(upto_cursor);
        let prefix = &upto_cursor[prefix_start..];
        let leading = &upto_cursor[..prefix_start];

        let leading_tokens = match grammar::lex(leading) {
            Ok(tokens) => tokens,
            Err(_) => {
                return CompletionResult {
                    replacement: None,
                    options: HeaplessVec::new(),
                };
            }
        };

        if leading_tokens
            .iter()
            .any(|token| token.kind == TokenKind::Error)
        {
            return CompletionResult {
                replacement: None,
                options: HeaplessVec::new(),
            };
        }

        let context = determine_context(leading_tokens.as_slice());
        let mut matches = candidates(context);
        matches.retain(|candidate| starts_with_ignore_ascii_case(candidate, prefix));

        if matches.is_empty() {
            return CompletionResult {
                replacement: None,
                options: matches,
            };
        }

        let matches_slice = matches.as_slice();
        let mut append_space = false;
        let replacement_value = if matches_slice.len() == 1 {
            let candidate = matches_slice[0];
            append_space = should_append_space(context, candidate);
            Some(candidate)
        } else {
            let lcp = longest_common_prefix(matches_slice);
            let shared = common_prefix_len_ignore_case(prefix, lcp);
            if lcp.len() > shared { Some(lcp) } else { None }
        };

        let replacement = replacement_value.map(|value| Replacement {
            start: prefix_start,
            end: cursor,
            value,
            append_space,
        });

        CompletionResult {
            replacement,
            options: matches,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CompletionContext {
    /// Cursor sits on the command keyword.
    Commands,
    /// Cursor sits where `node` expects its next token.
    Node(&'static Node),
    None,
}

fn determine_context(tokens: &[Token<'_>]) -> CompletionContext {
    if tokens.iter().any(|token| token.kind == TokenKind::Error) {
        return CompletionContext::None;
    }

    let Some((first, rest)) = tokens.split_first() else {
        return CompletionContext::Commands;
    };
    match catalog::find(first.lexeme) {
        Some(spec) => walk(spec.grammar, rest),
        None => CompletionContext::None,
    }
}

/// Follows `node` across the already-typed `tokens`.
fn walk(node: &'static Node, tokens: &[Token<'_>]) -> CompletionContext {
    let Some((token, rest)) = tokens.split_first() else {
        return CompletionContext::Node(node);
    };

    match node {
        Node::End | Node::Choice(_) => CompletionContext::None,
        Node::Argument { next, .. } | Node::Topic { next } => walk(next, rest),
        Node::Subcommands(branches) => branches
            .iter()
            .find(|branch| equals_ignore_ascii_case(branch.name, token.lexeme))
            .map_or(CompletionContext::None, |branch| walk(branch.grammar, rest)),
    }
}

fn candidates(context: CompletionContext) -> HeaplessVec<&'static str, MAX_SUGGESTIONS> {
    let mut out = HeaplessVec::new();
    match context {
        CompletionContext::Commands | CompletionContext::Node(Node::Topic { .. }) => {
            push_all(&mut out, catalog::commands().iter().map(|command| command.name));
        }
        CompletionContext::Node(Node::Choice(choices)) => {
            push_all(&mut out, choices.iter().map(|choice| choice.keyword));
        }
        CompletionContext::Node(Node::Subcommands(branches)) => {
            push_all(&mut out, branches.iter().map(|branch| branch.name));
        }
        CompletionContext::Node(Node::Argument {
            value: ValueSpec::Duration { suggestions },
            ..
        }) => push_all(&mut out, suggestions.iter().copied()),
        CompletionContext::Node(
            Node::Argument {
                value: ValueSpec::Index,
                ..
            }
            | Node::End,
        )
        | CompletionContext::None => {}
    }
    out
}

fn push_all(
    out: &mut HeaplessVec<&'static str, MAX_SUGGESTIONS>,
    values: impl Iterator<Item = &'static str>,
) {
    for value in values {
        if out.push(value).is_err() {
            break;
        }
    }
}

fn token_start(buffer: &str) -> usize {
    let mut index = buffer.len();
    let bytes = buffer.as_bytes();
    while index > 0 {
        let byte = bytes[index - 1];
        if byte == b' ' || byte == b'\t' {
            break;
        }
        index -= 1;
    }
    index
}

fn equals_ignore_ascii_case(lhs: &str, rhs: &str) -> bool {
    lhs.eq_ignore_ascii_case(rhs)
}

fn starts_with_ignore_ascii_case(candidate: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }

    if prefix.len() > candidate.len() {
        return false;
    }

    candidate[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn common_prefix_len_ignore_case(lhs: &str, rhs: &str) -> usize {
    lhs.as_bytes()
        .iter()
        .zip(rhs.as_bytes())
        .take_while(|(l, r)| l.eq_ignore_ascii_case(r))
        .count()
}

fn longest_common_prefix(candidates: &[&'static str]) -> &'static str {
    if let Some((first, rest)) = candidates.split_first() {
        let mut prefix = *first;
        for candidate in rest {
            let len = common_prefix_len_ignore_case(prefix, candidate);
            prefix = &prefix[..len];
            if prefix.is_empty() {
                break;
            }
        }
        prefix
    } else {
        ""
    }
}

/// A unique keyword gets a trailing space when more grammar follows it.
fn should_append_space(context: CompletionContext, candidate: &'static str) -> bool {
    match context {
        CompletionContext::Commands => {
            catalog::find(candidate).is_some_and(|spec| !matches!(spec.grammar, Node::End))
        }
        CompletionContext::Node(Node::Subcommands(branches)) => branches
            .iter()
            .find(|branch| branch.name == candidate)
            .is_some_and(|branch| !matches!(branch.grammar, Node::End)),
        CompletionContext::Node(_) | CompletionContext::None => false,
    }
}
