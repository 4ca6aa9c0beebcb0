use tokio::sync::mpsc::{channel, Sender};

use drawboard_system::{ClientMessage, ConnectionId, RoomId, ServerMessage};

use super::connection::{ConnectionCommand, ConnectionEvent};
use crate::connection_tx_storage::ConnectionTxStorage;
use crate::server_state::ServerState;

pub type ServerTx = Sender<ConnectionCommand>;

/// The one task that owns all room state. Commands from every connection are
/// funneled through a single mpsc channel and handled to completion one at a
/// time, so registry mutations never interleave.
struct Server {
    server_state: ServerState,
    connections: ConnectionTxStorage,
}

impl Server {
    fn new() -> Self {
        Self {
            server_state: ServerState::new(),
            connections: ConnectionTxStorage::new(),
        }
    }

    async fn handle_connection_command(&mut self, command: &ConnectionCommand) {
        match command {
            ConnectionCommand::Connect { tx } => {
                let connection_id = self.server_state.create_connection();
                log::info!("[connect] {}", connection_id);
                self.connections.insert(connection_id, tx.clone());
                self.connections
                    .send(&connection_id, ConnectionEvent::Connected { connection_id })
                    .await;
            }
            ConnectionCommand::Disconnect { from } => {
                log::info!("[disconnect] {}", from);
                self.handle_disconnect(from).await;
            }
            ConnectionCommand::ClientMessage { from, message } => {
                self.handle_client_message(from, message).await;
            }
        }
    }

    async fn handle_client_message(&mut self, from: &ConnectionId, message: &ClientMessage) {
        match message {
            ClientMessage::JoinRoom { room_id } => self.handle_join_room(from, room_id).await,
            ClientMessage::StrokeStart(stroke) => {
                self.relay(from, ServerMessage::StrokeStart(stroke.clone()))
                    .await
            }
            ClientMessage::StrokeMove(stroke) => {
                self.relay(from, ServerMessage::StrokeMove(stroke.clone()))
                    .await
            }
            ClientMessage::StrokeEnd => self.relay(from, ServerMessage::StrokeEnd).await,
            ClientMessage::ClearCanvas => self.relay(from, ServerMessage::ClearCanvas).await,
            ClientMessage::CanvasStateResponse {
                target_id,
                snapshot,
            } => {
                // Targeted delivery to the requester only. If it already
                // disconnected the snapshot is dropped, there is nobody to
                // tell.
                self.connections
                    .send(
                        target_id,
                        ConnectionEvent::ServerMessage(ServerMessage::CanvasState {
                            snapshot: snapshot.clone(),
                        }),
                    )
                    .await;
            }
        }
    }

    async fn handle_join_room(&mut self, from: &ConnectionId, room_id: &RoomId) {
        // Switching rooms leaves the previous one first, with the same
        // headcount broadcast the disconnect path makes.
        let switching = self
            .server_state
            .current_room(from)
            .map_or(false, |current| current != room_id);
        if switching {
            self.leave_current_room(from).await;
        }

        let user_count = self.server_state.join_room(*from, room_id);
        let is_first_member = user_count == 1;
        log::info!("[join-room] {} -> {} ({} users)", from, room_id, user_count);

        self.connections
            .send(
                from,
                ConnectionEvent::ServerMessage(ServerMessage::RoomJoined {
                    room_id: room_id.clone(),
                    user_count,
                }),
            )
            .await;

        // Ask one existing member, and only one, for the current canvas.
        // Fire-and-forget: if the source never answers, the joiner keeps its
        // blank canvas.
        if !is_first_member {
            let source = self
                .server_state
                .members(room_id)
                .iter()
                .find(|member| *member != from)
                .copied();
            if let Some(source) = source {
                self.connections
                    .send(
                        &source,
                        ConnectionEvent::ServerMessage(ServerMessage::RequestCanvasState {
                            requester_id: *from,
                        }),
                    )
                    .await;
            }
        }

        self.broadcast(
            room_id,
            ServerMessage::RoomJoined {
                room_id: room_id.clone(),
                user_count,
            },
            Some(from),
        )
        .await;
    }

    async fn handle_disconnect(&mut self, from: &ConnectionId) {
        self.leave_current_room(from).await;
        self.connections.remove(from);
    }

    /// Forwards a drawing event to every other member of the sender's room.
    /// A sender that is not in any room gets silently ignored.
    async fn relay(&mut self, from: &ConnectionId, message: ServerMessage) {
        if let Some(room_id) = self.server_state.current_room(from).cloned() {
            self.broadcast(&room_id, message, Some(from)).await;
        } else {
            log::debug!("dropping {:?} from room-less connection {}", message, from);
        }
    }

    async fn leave_current_room(&mut self, connection_id: &ConnectionId) {
        if let Some((room_id, remaining)) = self.server_state.leave_room(connection_id) {
            if remaining > 0 {
                self.broadcast(
                    &room_id,
                    ServerMessage::RoomJoined {
                        room_id: room_id.clone(),
                        user_count: remaining,
                    },
                    None,
                )
                .await;
            }
        }
    }

    async fn broadcast(
        &mut self,
        room_id: &RoomId,
        message: ServerMessage,
        without: Option<&ConnectionId>,
    ) {
        let members: Vec<ConnectionId> = self.server_state.members(room_id).to_vec();
        for connection_id in members {
            if without == Some(&connection_id) {
                continue;
            }
            self.connections
                .send(
                    &connection_id,
                    ConnectionEvent::ServerMessage(message.clone()),
                )
                .await;
        }
    }
}

pub fn spawn_server() -> ServerTx {
    let (srv_tx, mut srv_rx) = channel::<ConnectionCommand>(16);

    tokio::spawn(async move {
        let mut server = Box::new(Server::new());

        while let Some(command) = srv_rx.recv().await {
            server.handle_connection_command(&command).await;
        }
    });

    srv_tx
}
