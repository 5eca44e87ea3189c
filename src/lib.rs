//! HTTP/2 server session layer.
//!
//! This library sits between a byte transport and an HTTP/2 frame engine.
//! The engine does framing, header compression and flow-control accounting,
//! the session tracks stream lifecycles, assembles inbound requests, submits
//! responses and push promises, and guards every stream with two watchdogs:
//!
//! * receive-idle, fires when the peer stops sending request input;
//! * send-idle, fires when outbound data stays blocked by flow control.
//!
//! A fired watchdog resets its own stream with `INTERNAL_ERROR`, other
//! streams of the connection are unaffected. A third timer guards the
//! acknowledgement of the server SETTINGS frame.
//!
//! # Layout
//!
//! [`Session`] is a sans-io state machine: it never reads or writes the
//! transport and never sleeps. Inbound bytes are passed to
//! [`Session::feed`], outbound bytes are taken with
//! [`Session::take_write_buf`], timers are driven with
//! [`Session::next_deadline`] and [`Session::on_timeout`].
//!
//! The frame engine plugs in through the [`FrameEngine`] trait, the session
//! receives engine events through [`Callbacks`].
//!
//! [`server::Server`] drives a session over an `ntex` io object and
//! dispatches complete requests to an application service.
#![deny(rust_2018_idioms)]

mod config;
mod consts;
mod engine;
mod error;
mod message;
mod request;
mod session;
mod stream;
mod timer;

pub mod frame;
pub mod server;

pub use self::config::Config;
pub use self::consts::{
    DEFAULT_MAX_CONCURRENT_STREAMS, DEFAULT_RECV_TIMEOUT, DEFAULT_SEND_TIMEOUT,
    DEFAULT_SETTINGS_TIMEOUT, TIMEOUT_RESET_REASON,
};
pub use self::engine::{CallbackResult, Callbacks, DataSource, FrameEngine, Submit};
pub use self::error::{
    CallbackFailure, EngineError, MessageError, SessionError, StreamError, TimerError,
};
pub use self::message::Message;
pub use self::request::Request;
pub use self::session::Session;
pub use self::stream::{SendFlags, StreamState};
pub use self::timer::{TimerId, TimerKind, Timers};
