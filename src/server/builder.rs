use std::fmt;

use ntex_service::{IntoService, Service};

use crate::{config::Config, engine::FrameEngine, message::Message, request::Request};

use super::Server;

/// Builds server with custom configuration values.
///
/// Methods can be chained in order to set the configuration values.
///
/// ```rust,ignore
/// let server = ServerBuilder::new()
///     .configure(|cfg| cfg.set_recv_timeout(Seconds(30)))
///     .finish(MyEngine::new, fn_service(handle));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ServerBuilder {
    config: Config,
}

impl ServerBuilder {
    /// Returns a new server builder instance initialized with default
    /// configuration values.
    pub fn new() -> ServerBuilder {
        ServerBuilder {
            config: Config::new(),
        }
    }

    /// Replace connection settings
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Configure connection settings
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Config) -> Config,
    {
        self.config = f(self.config);
        self
    }

    /// Creates a new configured HTTP/2 server.
    pub fn finish<F, E, S, U>(self, engine: F, service: U) -> Server<F, S>
    where
        F: Fn() -> E,
        E: FrameEngine,
        U: IntoService<S, Request>,
        S: Service<Request, Response = Message> + 'static,
        S::Error: fmt::Debug,
    {
        Server::with_config(self.config, engine, service)
    }
}
