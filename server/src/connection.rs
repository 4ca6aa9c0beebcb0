use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use actix_web_actors::ws::{CloseCode, CloseReason};

use drawboard_system::{serde_json, ClientMessage, ConnectionId, ServerMessage};

use crate::connection_tx_storage::ConnectionTx;
use crate::server::ServerTx;

#[derive(Debug)]
pub enum ConnectionCommand {
    Connect {
        tx: ConnectionTx,
    },
    Disconnect {
        from: ConnectionId,
    },
    ClientMessage {
        from: ConnectionId,
        message: ClientMessage,
    },
}

#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { connection_id: ConnectionId },
    ServerMessage(ServerMessage),
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

enum ConnectionState {
    /// The server task has not assigned an id yet. Frames arriving in this
    /// window are held back and flushed in arrival order once it has, so the
    /// per-connection FIFO guarantee holds from the first frame.
    Idle { pending: Vec<ClientMessage> },
    Connected(ConnectionId),
}

struct ConnectionActor {
    state: ConnectionState,
    srv_tx: ServerTx,
}

/// Best-effort forwarding to the server task. A full or closed server channel
/// drops the command with a warning instead of panicking the actor.
fn forward(srv_tx: &mut ServerTx, command: ConnectionCommand) {
    if srv_tx.try_send(command).is_err() {
        log::warn!("server channel unavailable, dropping command");
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<ConnectionEvent>(32);

        if self.srv_tx.try_send(ConnectionCommand::Connect { tx }).is_err() {
            log::warn!("server channel unavailable, refusing connection");
            ctx.stop();
            return;
        }

        let addr = ctx.address().recipient();

        tokio::spawn(async move {
            let addr = addr;
            log::debug!("connection forwarding task - started");
            while let Some(msg) = rx.recv().await {
                addr.try_send(ConnectionActorMessage(msg))
                    .expect("should have enough buffer")
            }
            log::debug!("connection forwarding task - terminated");
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let ConnectionState::Connected(id) = self.state {
            forward(&mut self.srv_tx, ConnectionCommand::Disconnect { from: id });
        }

        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => {
                    log::debug!("Ingress {:?}", message);
                    match &mut self.state {
                        ConnectionState::Idle { pending } => pending.push(message),
                        ConnectionState::Connected(from) => {
                            let from = *from;
                            forward(
                                &mut self.srv_tx,
                                ConnectionCommand::ClientMessage { from, message },
                            );
                        }
                    }
                }
                Err(_) => {
                    ctx.close(Some(CloseReason {
                        code: CloseCode::Invalid,
                        description: None,
                    }));
                }
            },
            Ok(ws::Message::Close(_)) => {
                // stopping() tells the server task about the disconnect.
                ctx.stop();
            }
            _ => (),
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        match msg.0 {
            ConnectionEvent::Connected { connection_id } => {
                let previous = std::mem::replace(
                    &mut self.state,
                    ConnectionState::Connected(connection_id),
                );
                if let ConnectionState::Idle { pending } = previous {
                    for message in pending {
                        forward(
                            &mut self.srv_tx,
                            ConnectionCommand::ClientMessage {
                                from: connection_id,
                                message,
                            },
                        );
                    }
                }
            }
            ConnectionEvent::ServerMessage(message) => {
                log::debug!("Egress {:?}", message);
                let serialized = serde_json::to_string(&message).expect("must succeed");
                ctx.text(serialized);
            }
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
) -> Result<HttpResponse, Error> {
    ws::start(
        ConnectionActor {
            srv_tx: srv_tx.get_ref().clone(),
            state: ConnectionState::Idle {
                pending: Vec::new(),
            },
        },
        &req,
        stream,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::channel;

    #[test]
    fn full_server_channel_drops_command_without_panicking() {
        let (mut tx, _rx) = channel::<ConnectionCommand>(1);
        forward(&mut tx, ConnectionCommand::Disconnect { from: 1 });
        // Capacity is exhausted now; the second command must be dropped, not
        // panic the caller.
        forward(&mut tx, ConnectionCommand::Disconnect { from: 2 });
    }

    #[test]
    fn closed_server_channel_drops_command_without_panicking() {
        let (mut tx, rx) = channel::<ConnectionCommand>(1);
        drop(rx);
        forward(&mut tx, ConnectionCommand::Disconnect { from: 1 });
    }
}
