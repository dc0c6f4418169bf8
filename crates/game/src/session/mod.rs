mod adapter;
mod dispatch;
mod instruction;
mod manager;
mod player;
mod queue;
mod state;

pub use adapter::{Frontend, apply_instructions};
pub use dispatch::dispatch;
pub use instruction::{Instruction, PlayerUpdate, StructureChange};
pub use manager::ConnectionManager;
pub use player::PlayerState;
pub use queue::{ControlCommand, OutboundMessage, SessionQueues, WorkQueue};
pub use state::{ConnectionState, ConnectionStatus};

use std::thread::{self, JoinHandle};

use crate::net::{ClientMessage, ConnectionParameters, ItemType, UdpHost};

/// Application-thread handle to the networking core.
///
/// Drive it from the host loop: `start()` once, `tick()` every frame and
/// `shutdown()` on exit. Connecting spawns a dedicated network thread that
/// lives until the session ends.
pub struct Session {
    params: ConnectionParameters,
    queues: SessionQueues,
    status: ConnectionStatus,
    player: PlayerState,
    worker: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(params: ConnectionParameters) -> Self {
        Self {
            params,
            queues: SessionQueues::new(),
            status: ConnectionStatus::new(),
            player: PlayerState::new(),
            worker: None,
        }
    }

    pub fn start(&mut self) {
        self.queues.clear_all();
    }

    /// Connects to the configured server. Returns false, doing nothing, when
    /// an attempt is already in flight or a connection is established.
    pub fn connect(&mut self, username: &str) -> bool {
        let (host, port) = (self.params.host.clone(), self.params.port);
        self.connect_to(&host, port, username)
    }

    pub fn connect_to(&mut self, host: &str, port: u16, username: &str) -> bool {
        if self.status.get().is_active() {
            log::debug!("Connect ignored, a session is already active");
            return false;
        }

        // The previous worker has left its loop; let its teardown finish
        // before the shared state belongs to a new attempt.
        self.join_worker();

        if !self.status.begin_connect() {
            log::debug!("Connect ignored, a session is already active");
            return false;
        }
        self.queues.clear_all();

        self.params.host = host.to_string();
        self.params.port = port;

        let params = self.params.clone();
        let queues = self.queues.clone();
        let status = self.status.clone();
        let username = username.to_string();

        let spawned = thread::Builder::new()
            .name("kru-network".into())
            .spawn(move || network_worker(params, queues, status, username));

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                true
            }
            Err(e) => {
                log::error!("Failed to spawn network thread: {}", e);
                self.status.set(ConnectionState::Idle);
                false
            }
        }
    }

    pub fn disconnect(&self) {
        self.queues.control.push(ControlCommand::CancelConnection);
    }

    pub fn is_connected(&self) -> bool {
        self.status.connected_to_server()
    }

    pub fn is_connecting(&self) -> bool {
        self.status.trying_to_connect()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.get()
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn enqueue(&self, message: ClientMessage) {
        self.queues.outbound.push(OutboundMessage::new(message));
    }

    pub fn purchase_item(&self, item_id: u16) {
        self.enqueue(ClientMessage::PurchaseItem { item_id });
    }

    pub fn purchase(&self, item: ItemType) {
        self.purchase_item(item.id());
    }

    /// Applies every instruction the network thread has produced so far.
    pub fn tick<F: Frontend + ?Sized>(&mut self, frontend: &mut F) -> usize {
        let applied = apply_instructions(&self.queues.application, &mut self.player, frontend);

        if self.worker.as_ref().is_some_and(JoinHandle::is_finished) {
            self.join_worker();
        }
        applied
    }

    /// Cancels any active connection and waits for the network thread.
    pub fn shutdown(&mut self) {
        if self.worker.is_some() {
            self.disconnect();
        }
        self.join_worker();
    }

    fn join_worker(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        if handle.join().is_err() {
            log::error!("Network thread panicked");
            self.status.set(ConnectionState::Disconnected);
        }
        if !self.status.get().is_active() {
            log::debug!("Network thread finished ({:?})", self.status.get());
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn network_worker(
    params: ConnectionParameters,
    queues: SessionQueues,
    status: ConnectionStatus,
    username: String,
) {
    match UdpHost::connect(&params) {
        Ok(transport) => ConnectionManager::new(transport, queues, status, params, username).run(),
        Err(e) => {
            log::error!("Unable to start connection: {}", e);
            status.set(ConnectionState::Disconnected);
            queues.application.push(Instruction::ServerResponseMessage(format!(
                "Unable to reach {}:{}",
                params.host, params.port
            )));
        }
    }
}
