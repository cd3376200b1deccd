//! Samvad is a terminal chat client for a generative-language backend that
//! streams its answers.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation store and its reducer, the streaming
//!   response decoder, the HTTP transport, and the chat orchestrator that ties
//!   a single user turn together.
//! - [`api`] defines the request, envelope, stream record, and health payloads
//!   exchanged with the backend.
//! - [`auth`] holds the identity capability and the persisted sign-in state.
//! - [`backend`] carries the server-side collaborators the client has to
//!   interpret, such as the per-client rate limiter.
//! - [`cli`] parses arguments and runs the line-oriented front-end.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod auth;
pub mod backend;
pub mod cli;
pub mod core;
pub mod utils;
