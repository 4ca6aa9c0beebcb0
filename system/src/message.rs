use serde::{Deserialize, Serialize};

/// Assigned by the server when a socket connects. Room ids come from clients.
pub type ConnectionId = u32;
pub type RoomId = String;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Pen,
    Eraser,
}

/// Payload of stroke-start and stroke-move. stroke-end and clear-canvas carry
/// nothing; the client applies its own stroke locally before sending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeData {
    pub x: f64,
    pub y: f64,
    pub color: String,
    pub brush_size: u32,
    pub tool: Tool,
}

/// Everything a client may send, tagged by the `type` field on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: RoomId },
    StrokeStart(StrokeData),
    StrokeMove(StrokeData),
    StrokeEnd,
    ClearCanvas,
    /// Answer to request-canvas-state: the snapshot is an opaque encoded
    /// image, routed to `target_id` and never inspected by the server.
    #[serde(rename_all = "camelCase")]
    CanvasStateResponse {
        target_id: ConnectionId,
        snapshot: String,
    },
}

/// Everything the server may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Join ack to the joiner, and headcount update to everyone else. One
    /// message kind serves both purposes.
    #[serde(rename_all = "camelCase")]
    RoomJoined { room_id: RoomId, user_count: usize },
    StrokeStart(StrokeData),
    StrokeMove(StrokeData),
    StrokeEnd,
    ClearCanvas,
    /// Sent to exactly one existing room member when someone joins.
    #[serde(rename_all = "camelCase")]
    RequestCanvasState { requester_id: ConnectionId },
    CanvasState { snapshot: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_room_wire_format() {
        let message: ClientMessage =
            serde_json::from_str(r#"{"type":"join-room","roomId":"abc"}"#).unwrap();
        assert_eq!(
            message,
            ClientMessage::JoinRoom {
                room_id: "abc".into()
            }
        );
    }

    #[test]
    fn stroke_move_carries_flattened_stroke_fields() {
        let message: ClientMessage = serde_json::from_str(
            r##"{"type":"stroke-move","x":10.5,"y":3.25,"color":"#ff0000","brushSize":4,"tool":"eraser"}"##,
        )
        .unwrap();
        assert_eq!(
            message,
            ClientMessage::StrokeMove(StrokeData {
                x: 10.5,
                y: 3.25,
                color: "#ff0000".into(),
                brush_size: 4,
                tool: Tool::Eraser,
            })
        );
    }

    #[test]
    fn stroke_end_has_no_payload() {
        let json = serde_json::to_string(&ServerMessage::StrokeEnd).unwrap();
        assert_eq!(json, r#"{"type":"stroke-end"}"#);
        let message: ClientMessage = serde_json::from_str(r#"{"type":"stroke-end"}"#).unwrap();
        assert_eq!(message, ClientMessage::StrokeEnd);
    }

    #[test]
    fn room_joined_uses_camel_case_fields() {
        let json = serde_json::to_string(&ServerMessage::RoomJoined {
            room_id: "abc".into(),
            user_count: 2,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"room-joined","roomId":"abc","userCount":2}"#);
    }

    #[test]
    fn canvas_state_response_round_trips() {
        let original = ClientMessage::CanvasStateResponse {
            target_id: 7,
            snapshot: "data:image/png;base64,AAAA".into(),
        };
        let json = serde_json::to_string(&original).unwrap();
        let parsed: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"resize-canvas"}"#).is_err());
    }
}
