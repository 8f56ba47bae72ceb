//! Relay assembly and lifecycle.
//!
//! [`RelayBuilder`] opens every resource in startup order:
//! validate config, open store, create fanout, create pipeline, bind the HTTP
//! listener, connect the subscriber. Any failure drops what was opened so far.
//! [`Relay::run`] then drives the HTTP server and the subscriber loop until the
//! shared shutdown token is cancelled.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::{self, ApiState, QueryService};
use crate::bus::{self, BrokerSubscriber, BusError, MessageHandler};
use crate::config::{Config, ConfigError};
use crate::fanout::LiveFanout;
use crate::interfaces::{EventStore, StorageError};
use crate::pipeline::EventPipeline;
use crate::storage;

/// Startup and run failures.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("broker: {0}")]
    Bus(#[from] BusError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Builder for [`Relay`].
///
/// Store and subscriber come from configuration unless injected.
pub struct RelayBuilder {
    config: Config,
    store: Option<Arc<dyn EventStore>>,
    subscriber: Option<Box<dyn BrokerSubscriber>>,
}

impl RelayBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: None,
            subscriber: None,
        }
    }

    /// Use `store` instead of opening the configured one.
    pub fn with_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `subscriber` instead of connecting to the configured broker.
    ///
    /// Required for the `channel` messaging type.
    pub fn with_subscriber(mut self, subscriber: Box<dyn BrokerSubscriber>) -> Self {
        self.subscriber = Some(subscriber);
        self
    }

    /// Open all resources, in startup order.
    pub async fn build(self) -> Result<Relay, RelayError> {
        let config = self.config;
        config.validate()?;

        let store = match self.store {
            Some(store) => store,
            None => storage::init_storage(&config.storage).await?,
        };

        let fanout = Arc::new(LiveFanout::new(&config.fanout));
        let pipeline = Arc::new(EventPipeline::new(store.clone(), fanout.clone()));

        let listener = TcpListener::bind(config.server.bind_address()).await?;
        let local_addr = listener.local_addr()?;

        let subscriber = match self.subscriber {
            Some(subscriber) => subscriber,
            None => bus::init_subscriber(&config.messaging).await?,
        };

        info!(
            addr = %local_addr,
            storage = %config.storage.storage_type,
            messaging = %config.messaging.messaging_type,
            "relay ready"
        );

        Ok(Relay {
            config,
            store,
            fanout,
            pipeline,
            listener,
            local_addr,
            subscriber,
            shutdown: CancellationToken::new(),
        })
    }
}

/// A fully started relay, ready to [`run`](Relay::run).
pub struct Relay {
    config: Config,
    store: Arc<dyn EventStore>,
    fanout: Arc<LiveFanout>,
    pipeline: Arc<EventPipeline>,
    listener: TcpListener,
    local_addr: SocketAddr,
    subscriber: Box<dyn BrokerSubscriber>,
    shutdown: CancellationToken,
}

impl Relay {
    /// Address the HTTP listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn store(&self) -> Arc<dyn EventStore> {
        self.store.clone()
    }

    pub fn fanout(&self) -> Arc<LiveFanout> {
        self.fanout.clone()
    }

    /// Cancelling this token stops the relay.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serve HTTP and consume broker messages until shutdown.
    ///
    /// The subscriber ending for any reason also stops the HTTP server. A
    /// subscriber error is returned after the server has drained.
    pub async fn run(self) -> Result<(), RelayError> {
        let Relay {
            config,
            store,
            fanout,
            pipeline,
            listener,
            local_addr,
            subscriber,
            shutdown,
        } = self;

        let handler: Arc<dyn MessageHandler> = pipeline;
        let subscriber_token = shutdown.clone();
        let subscriber_task = tokio::spawn(async move {
            let result = subscriber.run(handler, subscriber_token.clone()).await;
            if let Err(e) = &result {
                error!(error = %e, "subscriber stopped");
            }
            subscriber_token.cancel();
            result
        });

        let state = ApiState {
            query: Arc::new(QueryService::with_default_limit(
                store,
                config.server.recent_limit,
            )),
            fanout,
            shutdown: shutdown.clone(),
        };
        let app = api::router(state, config.server.static_dir.as_deref());

        info!(addr = %local_addr, "http server listening");
        let served = api::serve(listener, app, shutdown.clone()).await;
        shutdown.cancel();

        let subscribed = match subscriber_task.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "subscriber task panicked");
                Ok(())
            }
        };

        info!("relay stopped");
        served?;
        subscribed?;
        Ok(())
    }
}
