//! MongoDB driver binding.

use std::sync::Mutex;

use mongodb::bson::doc;
use mongodb::event::sdam::{SdamEvent, TopologyDescription};
use mongodb::event::EventHandler;
use mongodb::options::{ClientOptions, ReadPreference, SelectionCriteria};
use mongodb::Client;

use crate::config::DatabaseConfig;
use crate::database::{ConnectionMonitor, Database, DatabaseError};
use crate::health::ConnectionState;

/// What the connection state cares about in a driver event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverSignal {
    /// The deployment as a whole changed; `selectable` is whether any
    /// member can still serve operations.
    Topology { selectable: bool },
    /// A single member missed a heartbeat.
    HeartbeatFailed,
    Other,
}

impl From<&SdamEvent> for DriverSignal {
    fn from(event: &SdamEvent) -> Self {
        match event {
            SdamEvent::TopologyDescriptionChanged(change) => DriverSignal::Topology {
                selectable: has_selectable_server(&change.new_description),
            },
            SdamEvent::ServerHeartbeatFailed(failed) => {
                tracing::debug!(
                    server = %failed.server_address,
                    error = %failed.failure,
                    "Database heartbeat failed"
                );
                DriverSignal::HeartbeatFailed
            }
            _ => DriverSignal::Other,
        }
    }
}

/// A primary, or any data-bearing member reachable for reads.
fn has_selectable_server(topology: &TopologyDescription) -> bool {
    let nearest = SelectionCriteria::ReadPreference(ReadPreference::Nearest {
        options: Default::default(),
    });
    topology.has_writable_server() || topology.has_readable_server(Some(nearest))
}

/// Only topology changes move the state; one unreachable member of a
/// replica set does not take the deployment down.
fn apply(monitor: &ConnectionMonitor, signal: DriverSignal) {
    match signal {
        DriverSignal::Topology { selectable: true } => monitor.connected(),
        // The initial connect reports its own failure.
        DriverSignal::Topology { selectable: false }
            if monitor.state() == ConnectionState::Connecting => {}
        DriverSignal::Topology { selectable: false } => monitor.disconnected(),
        DriverSignal::HeartbeatFailed | DriverSignal::Other => {}
    }
}

/// MongoDB-backed [`Database`].
pub struct MongoDatabase {
    config: DatabaseConfig,
    client: Mutex<Option<Client>>,
    name: Mutex<Option<String>>,
}

impl MongoDatabase {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
            name: Mutex::new(None),
        }
    }

    async fn options(&self, monitor: ConnectionMonitor) -> Result<ClientOptions, DatabaseError> {
        let mut options = ClientOptions::parse(&self.config.uri)
            .await
            .map_err(|e| DatabaseError::Config(e.to_string()))?;

        options.max_pool_size = Some(self.config.max_pool_size);
        options.min_pool_size = Some(self.config.min_pool_size);
        options.server_selection_timeout = Some(self.config.server_selection_timeout());
        options.connect_timeout = Some(self.config.connect_timeout());
        options.app_name = Some(self.config.app_name.clone());

        // Registered once per client; the driver reconnects on its own and
        // these callbacks only mirror what it observes.
        options.sdam_event_handler = Some(EventHandler::callback(move |event: SdamEvent| {
            apply(&monitor, DriverSignal::from(&event));
        }));

        Ok(options)
    }
}

impl Database for MongoDatabase {
    async fn connect(&self, monitor: ConnectionMonitor) -> Result<(), DatabaseError> {
        monitor.connecting();
        let options = match self.options(monitor.clone()).await {
            Ok(options) => options,
            Err(e) => {
                monitor.errored(&e);
                return Err(e);
            }
        };
        let database_name = options.default_database.clone();

        let client = match Client::with_options(options) {
            Ok(client) => client,
            Err(e) => {
                let err = DatabaseError::Connect(e.to_string());
                monitor.errored(&err);
                return Err(err);
            }
        };

        // Kept even when the first ping fails: the driver's monitors keep
        // probing the deployment and report recovery through the callbacks.
        *self.name.lock().expect("database name mutex poisoned") = database_name.clone();
        *self.client.lock().expect("database client mutex poisoned") = Some(client.clone());

        // Server selection is bounded by the configured timeout, so this
        // fails fast when nothing is reachable.
        if let Err(e) = client.database("admin").run_command(doc! { "ping": 1 }).await {
            let err = DatabaseError::Connect(e.to_string());
            monitor.errored(&err);
            return Err(err);
        }

        monitor.connected();
        tracing::info!(
            database = database_name.as_deref().unwrap_or("(default)"),
            max_pool_size = self.config.max_pool_size,
            min_pool_size = self.config.min_pool_size,
            "Database ready"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        let client = self.client.lock().expect("database client mutex poisoned").take();
        if let Some(client) = client {
            client.shutdown().await;
        }
        Ok(())
    }

    fn name(&self) -> Option<String> {
        self.name.lock().expect("database name mutex poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ConnectionCell;

    #[test]
    fn test_unselectable_topology_during_connect_keeps_connecting() {
        let cell = ConnectionCell::new();
        let monitor = ConnectionMonitor::new(cell.clone());
        monitor.connecting();

        apply(&monitor, DriverSignal::Topology { selectable: false });
        assert_eq!(cell.get(), ConnectionState::Connecting);
    }

    #[test]
    fn test_member_heartbeat_failures_do_not_flap_state() {
        let cell = ConnectionCell::new();
        let monitor = ConnectionMonitor::new(cell.clone());

        apply(&monitor, DriverSignal::Topology { selectable: true });
        assert_eq!(cell.get(), ConnectionState::Connected);

        // A secondary is down but the primary keeps the deployment selectable.
        apply(&monitor, DriverSignal::HeartbeatFailed);
        apply(&monitor, DriverSignal::Topology { selectable: true });
        apply(&monitor, DriverSignal::HeartbeatFailed);
        assert_eq!(cell.get(), ConnectionState::Connected);
    }

    #[test]
    fn test_losing_every_member_disconnects_until_recovery() {
        let cell = ConnectionCell::new();
        let monitor = ConnectionMonitor::new(cell.clone());
        apply(&monitor, DriverSignal::Topology { selectable: true });

        apply(&monitor, DriverSignal::Topology { selectable: false });
        assert_eq!(cell.get(), ConnectionState::Disconnected);
        apply(&monitor, DriverSignal::Other);
        assert_eq!(cell.get(), ConnectionState::Disconnected);

        apply(&monitor, DriverSignal::Topology { selectable: true });
        assert_eq!(cell.get(), ConnectionState::Connected);
    }
}
