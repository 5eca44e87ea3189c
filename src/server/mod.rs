//! Server side of the session layer.
//!
//! [`Server`] is an `ntex` service that takes an io object, creates a frame
//! engine and a [`Session`](crate::Session) for it, and runs the connection
//! until either side closes it. Every complete request is handed to the
//! application service in its own task, its response is submitted on the
//! request stream.
mod builder;
mod dispatcher;
mod error;
mod service;

pub use self::builder::ServerBuilder;
pub use self::error::ServerError;
pub use self::service::Server;
