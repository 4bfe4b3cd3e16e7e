//! REPL tooling for driving a menu session from a line-oriented front-end.
//!
//! The command grammar lives in [`catalog`] and is interpreted by the token
//! parser in [`grammar`] and the [`completion`] engine; [`commands`] executes
//! parsed lines against a session and [`status`] renders its state. Everything
//! here stays compatible with `no_std`.

pub mod catalog;
pub mod commands;
pub mod completion;
pub mod grammar;
pub mod status;
