use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use boxoffice_core::{
    Config, Coordinator, CoordinatorHandle, ReservationClient, ReservationUpdate, SanitizedConfig,
    StatusTransport,
};

use crate::api::{WsBroadcaster, WsMessage};
use crate::metrics::ACTIVE_SESSIONS;

/// Shared application state
pub struct AppState {
    config: Config,
    client: Arc<dyn ReservationClient>,
    transport: Arc<dyn StatusTransport>,
    sessions: RwLock<HashMap<String, CoordinatorHandle>>,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    pub fn new(
        config: Config,
        client: Arc<dyn ReservationClient>,
        transport: Arc<dyn StatusTransport>,
    ) -> Self {
        Self {
            config,
            client,
            transport,
            sessions: RwLock::new(HashMap::new()),
            ws_broadcaster: WsBroadcaster::default(),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }

    /// Spawn a coordinator for a new checkout session.
    ///
    /// Every session owns exactly one coordinator, which in turn owns at
    /// most one status channel connection, so no two reservations of one
    /// session can hold an open channel simultaneously.
    pub async fn create_session(&self) -> CoordinatorHandle {
        let id = Uuid::new_v4().to_string();

        let broadcaster = self.ws_broadcaster.clone();
        let handle = Coordinator::new(
            id.clone(),
            self.config.coordinator.clone(),
            Arc::clone(&self.client),
            Arc::clone(&self.transport),
        )
        .with_update_callback(Arc::new(move |update| {
            broadcaster.broadcast(WsMessage::from(update));
        }))
        .spawn();

        self.sessions.write().await.insert(id, handle.clone());
        ACTIVE_SESSIONS.set(self.sessions.read().await.len() as i64);

        handle
    }

    pub async fn session(&self, id: &str) -> Option<CoordinatorHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove a session, returning its handle for teardown.
    pub async fn remove_session(&self, id: &str) -> Option<CoordinatorHandle> {
        let handle = self.sessions.write().await.remove(id);
        ACTIVE_SESSIONS.set(self.sessions.read().await.len() as i64);
        handle
    }
}

impl From<ReservationUpdate> for WsMessage {
    fn from(update: ReservationUpdate) -> Self {
        match update {
            ReservationUpdate::PhaseChanged { id, attempt, phase } => WsMessage::ReservationUpdate {
                reservation_id: id,
                attempt,
                phase,
            },
            ReservationUpdate::Countdown { id, remaining_secs } => WsMessage::CountdownTick {
                reservation_id: id,
                remaining_secs,
            },
        }
    }
}
