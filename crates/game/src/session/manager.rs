use super::dispatch::dispatch;
use super::instruction::Instruction;
use super::queue::{ControlCommand, OutboundMessage, SessionQueues};
use super::state::{ConnectionState, ConnectionStatus};
use crate::net::{
    ClientMessage, ConnectionParameters, MAX_FRAME_SIZE, Transport, TransportError,
    TransportEvent, decode_server_message, encode_client_message,
};

/// Owns the transport for one session and runs the network-thread loop.
///
/// Dropping the manager tears the session down: pending sends are flushed
/// and the transport is closed exactly once, whichever way the loop ended.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    queues: SessionQueues,
    status: ConnectionStatus,
    params: ConnectionParameters,
    username: String,
    owned: ConnectionState,
    running: bool,
    released: bool,
    recv_buffer: [u8; MAX_FRAME_SIZE],
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(
        transport: T,
        queues: SessionQueues,
        status: ConnectionStatus,
        params: ConnectionParameters,
        username: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            queues,
            status,
            params,
            username: username.into(),
            owned: ConnectionState::Connecting,
            running: true,
            released: false,
            recv_buffer: [0u8; MAX_FRAME_SIZE],
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn run(mut self) {
        log::info!(
            "Attempting to connect to {}:{}",
            self.params.host,
            self.params.port
        );

        while self.running {
            if let Err(e) = self.poll_once() {
                log::error!("Network loop stopped: {}", e);
                self.set_state(ConnectionState::Disconnected);
                self.running = false;
            }
        }
    }

    /// One pass of the loop: control commands, outbound messages, then
    /// transport events. Blocks for at most one poll interval.
    pub fn poll_once(&mut self) -> Result<(), TransportError> {
        while let Some(command) = self.queues.control.try_pop() {
            match command {
                ControlCommand::CancelConnection => return self.cancel(),
            }
        }

        if self.status.connected_to_server() {
            for message in self.queues.outbound.drain() {
                self.send(&message)?;
            }
        }

        let mut polled = false;
        while !polled && self.running {
            let event = match self.transport.check_events() {
                Some(event) => event,
                None => {
                    polled = true;
                    match self.transport.service(self.params.poll_interval())? {
                        Some(event) => event,
                        None => break,
                    }
                }
            };

            self.handle_event(event)?;
        }

        Ok(())
    }

    fn cancel(&mut self) -> Result<(), TransportError> {
        log::info!("Cancel connection");

        if self.status.connected_to_server() {
            for message in self.queues.outbound.drain() {
                self.send(&message)?;
            }
            self.send(&OutboundMessage::new(ClientMessage::Disconnect))?;
        }

        self.set_state(ConnectionState::Disconnected);
        self.running = false;
        Ok(())
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.owned = state;
        self.status.set(state);
    }

    fn send(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        let frame = match encode_client_message(message.message()) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Dropping {:?} request: {}", message.opcode(), e);
                return Ok(());
            }
        };

        log::info!("Sending {:?} request to game server", message.opcode());
        self.transport.send(self.params.channel_id, &frame)
    }

    fn handle_event(&mut self, event: TransportEvent) -> Result<(), TransportError> {
        match event {
            TransportEvent::None => log::trace!("Nothing"),
            TransportEvent::Connect => {
                log::info!("Client connected to game server");
                self.set_state(ConnectionState::Connected);

                let login = OutboundMessage::new(ClientMessage::Login {
                    username: self.username.clone(),
                    version: self.params.client_version,
                });
                self.send(&login)?;
            }
            TransportEvent::Disconnect => {
                log::info!("Client disconnected from server");
                self.set_state(ConnectionState::Disconnected);
                self.running = false;
            }
            TransportEvent::Timeout => {
                log::info!("Client connection timeout to game server");
                self.set_state(ConnectionState::TimedOut);
                self.queues.application.push(Instruction::NotifyUserOfTimeout);
                self.queues
                    .application
                    .push(Instruction::LoadSceneForDisconnectTimeout);
                self.running = false;
            }
            TransportEvent::Receive { channel, data } => self.receive(channel, &data),
        }

        Ok(())
    }

    fn receive(&mut self, channel: u8, data: &[u8]) {
        log::debug!(
            "Packet received from server - Channel ID: {}, Data length: {}",
            channel,
            data.len()
        );

        let limit = self.params.frame_limit();
        if data.len() > limit {
            log::warn!(
                "Dropping {} byte frame, larger than the {} byte limit",
                data.len(),
                limit
            );
            return;
        }

        let frame = &mut self.recv_buffer[..data.len()];
        frame.copy_from_slice(data);

        match decode_server_message(frame) {
            Ok(message) => {
                for instruction in dispatch(message, self.params.client_version) {
                    self.queues.application.push(instruction);
                }
            }
            Err(e) => log::warn!("Dropping frame: {}", e),
        }
    }

    fn teardown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        // Only undo a state this manager wrote; a newer attempt may own it now.
        if self.owned.is_active()
            && self
                .status
                .transition(self.owned, ConnectionState::Disconnected)
        {
            self.owned = ConnectionState::Disconnected;
        }
        if let Err(e) = self.transport.flush() {
            log::debug!("Flush on teardown failed: {}", e);
        }
        self.transport.close();
        log::debug!("Network session released");
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}
