#![no_std]

// Core of a global actions menu: the catalog of menu actions, the policy that
// filters them, toggle state tracking, deferred follow-up work and the
// per-invocation session tying it together.
//
// This crate avoids the Rust standard library so the same logic can back an
// embedded front-end and the host emulator.

pub mod actions;
pub mod config;
pub mod menu;
pub mod policy;
pub mod registry;
pub mod repl;
pub mod scheduler;
pub mod session;
pub mod telemetry;
pub mod toggle;
