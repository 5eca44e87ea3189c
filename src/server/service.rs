use std::{fmt, rc::Rc};

use ntex_io::{Filter, Io};
use ntex_service::{IntoService, Pipeline, Service, ServiceCtx};

use crate::{config::Config, engine::FrameEngine, message::Message, request::Request};
use crate::session::Session;

use super::{dispatcher, ServerError};

/// Http/2 server service.
///
/// `F` creates a fresh frame engine for every connection, `S` handles
/// complete requests.
pub struct Server<F, S>(Rc<ServerInner<F, S>>);

struct ServerInner<F, S> {
    config: Config,
    engine: F,
    service: Pipeline<S>,
}

impl<F, S> Clone for Server<F, S> {
    fn clone(&self) -> Self {
        Server(self.0.clone())
    }
}

impl<F, S> fmt::Debug for Server<F, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.0.config)
            .finish()
    }
}

impl<F, E, S> Server<F, S>
where
    F: Fn() -> E,
    E: FrameEngine,
    S: Service<Request, Response = Message> + 'static,
    S::Error: fmt::Debug,
{
    /// Create new instance of Server with default configuration
    pub fn new<U>(engine: F, service: U) -> Self
    where
        U: IntoService<S, Request>,
    {
        Server::with_config(Config::new(), engine, service)
    }

    pub(super) fn with_config<U>(config: Config, engine: F, service: U) -> Self
    where
        U: IntoService<S, Request>,
    {
        Server(Rc::new(ServerInner {
            config,
            engine,
            service: Pipeline::new(service.into_service()),
        }))
    }

    pub fn config(&self) -> &Config {
        &self.0.config
    }

    /// Serve one connection until it is closed
    pub async fn run<Fl: Filter>(&self, io: Io<Fl>) -> Result<(), ServerError> {
        let session = Session::new((self.0.engine)(), self.0.config)?;
        log::debug!("start http/2 session");

        dispatcher::run(io, session, self.0.service.clone()).await
    }
}

impl<Fl, F, E, S> Service<Io<Fl>> for Server<F, S>
where
    Fl: Filter,
    F: Fn() -> E,
    E: FrameEngine,
    S: Service<Request, Response = Message> + 'static,
    S::Error: fmt::Debug,
{
    type Response = ();
    type Error = ServerError;

    async fn call(
        &self,
        io: Io<Fl>,
        _: ServiceCtx<'_, Self>,
    ) -> Result<Self::Response, Self::Error> {
        self.run(io).await
    }
}
