//! `HousieServer` builder and accept loop.
//!
//! This is the entry point for running a Housie server. It ties the layers
//! together: transport → protocol → session → rooms, plus the two
//! background sweepers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use housie_protocol::JsonCodec;
use housie_room::{GameConfig, MemoryStore, Persistence, RoomManager};
use housie_session::{Authenticator, BroadcastBus, ConnectionRegistry, RegistryConfig};
use housie_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::machine::GameStateMachine;
use crate::payment::{AcceptAllPayments, PaymentGateway};
use crate::sweeper::{spawn_heartbeat_sweeper, spawn_retention_sweeper};
use crate::HousieError;

/// Server-level settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind: String,
    /// How often the heartbeat and retention sweepers run.
    pub sweep_interval: Duration,
    /// How long an `Ended` room stays around before it's archived.
    pub retention: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            sweep_interval: Duration::from_secs(5),
            retention: Duration::from_secs(300),
        }
    }
}

/// Builder for configuring and starting a Housie server.
///
/// # Example
///
/// ```rust,ignore
/// use housie::prelude::*;
///
/// let server = HousieServer::builder()
///     .bind("0.0.0.0:8080")
///     .seed(42)
///     .build(my_auth)
///     .await?;
/// server.run().await
/// ```
pub struct HousieServerBuilder {
    config: ServerConfig,
    registry: RegistryConfig,
    game: GameConfig,
    seed: Option<u64>,
    store: Option<Arc<dyn Persistence>>,
    payments: Option<Arc<dyn PaymentGateway>>,
}

impl HousieServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            registry: RegistryConfig::default(),
            game: GameConfig::default(),
            seed: None,
            store: None,
            payments: None,
        }
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    pub fn server_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry = config;
        self
    }

    pub fn game_config(mut self, config: GameConfig) -> Self {
        self.game = config;
        self
    }

    /// Makes draw order and tickets reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Where rooms write their records. Defaults to a [`MemoryStore`].
    pub fn persistence(mut self, store: Arc<dyn Persistence>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to [`AcceptAllPayments`].
    pub fn payments(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.payments = Some(gateway);
        self
    }

    /// Validates the game config, binds the listener, and wires up the
    /// shared state.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<A: Authenticator>(self, auth: A) -> Result<HousieServer<A>, HousieError> {
        self.game.validate()?;
        let transport = WebSocketTransport::bind(&self.config.bind).await?;

        let registry = Arc::new(ConnectionRegistry::new(self.registry));
        let bus = BroadcastBus::new(registry);
        let store = self
            .store
            .unwrap_or_else(|| MemoryStore::shared() as Arc<dyn Persistence>);
        let mut rooms = RoomManager::new(Arc::new(self.game), bus, store);
        if let Some(seed) = self.seed {
            rooms = rooms.with_seed(seed);
        }

        let payments = self
            .payments
            .unwrap_or_else(|| Arc::new(AcceptAllPayments) as Arc<dyn PaymentGateway>);
        let machine = GameStateMachine::new(Arc::new(rooms), auth).with_payments(payments);

        Ok(HousieServer {
            transport,
            machine: Arc::new(machine),
            codec: Arc::new(JsonCodec),
            config: self.config,
        })
    }
}

impl Default for HousieServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Housie server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct HousieServer<A: Authenticator> {
    transport: WebSocketTransport,
    machine: Arc<GameStateMachine<A>>,
    codec: Arc<JsonCodec>,
    config: ServerConfig,
}

impl<A: Authenticator> HousieServer<A> {
    pub fn builder() -> HousieServerBuilder {
        HousieServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, HousieError> {
        Ok(self.transport.local_addr()?)
    }

    pub fn machine(&self) -> &Arc<GameStateMachine<A>> {
        &self.machine
    }

    pub fn rooms(&self) -> &Arc<RoomManager> {
        self.machine.rooms()
    }

    /// Starts the sweepers, then accepts connections until the process is
    /// terminated. Each connection is served on its own task.
    pub async fn run(mut self) -> Result<(), HousieError> {
        let every = self.config.sweep_interval;
        spawn_heartbeat_sweeper(Arc::clone(&self.machine), every);
        spawn_retention_sweeper(
            Arc::clone(self.machine.rooms()),
            every,
            self.config.retention,
        );
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Housie server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let machine = Arc::clone(&self.machine);
                    let codec = Arc::clone(&self.codec);
                    tokio::spawn(handle_connection(conn, machine, codec));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
