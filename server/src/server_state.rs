use crate::session::Room;
use drawboard_system::{ConnectionId, RoomId};
use std::collections::HashMap;
use std::num::Wrapping;

/// In-memory room registry. Only the server task mutates it, one message at a
/// time, so no locking is needed.
///
/// Invariant: a room with no members is removed immediately, never kept empty.
pub struct ServerState {
    connection_id_source: Wrapping<ConnectionId>,
    pub connection_locations: HashMap<ConnectionId, RoomId>,
    pub rooms: HashMap<RoomId, Room>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            connection_id_source: Wrapping(0),
            connection_locations: HashMap::new(),
            rooms: HashMap::new(),
        }
    }

    pub fn create_connection(&mut self) -> ConnectionId {
        self.connection_id_source += Wrapping(1);
        self.connection_id_source.0
    }

    pub fn current_room(&self, connection_id: &ConnectionId) -> Option<&RoomId> {
        self.connection_locations.get(connection_id)
    }

    /// Adds the connection to the room, creating the room if it does not
    /// exist. Idempotent: joining a room twice does not duplicate the member.
    /// Returns the member count after the join.
    pub fn join_room(&mut self, connection_id: ConnectionId, room_id: &RoomId) -> usize {
        let room = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(Room::new);
        if !room.members.contains(&connection_id) {
            room.members.push(connection_id);
        }
        self.connection_locations
            .insert(connection_id, room_id.clone());
        room.members.len()
    }

    /// Removes the connection from its current room, dropping the room when
    /// it empties. No-op for a connection that is not in any room. Returns
    /// the room left and how many members remain in it.
    pub fn leave_room(&mut self, connection_id: &ConnectionId) -> Option<(RoomId, usize)> {
        let room_id = self.connection_locations.remove(connection_id)?;
        let remaining = self
            .rooms
            .get_mut(&room_id)
            .map(|room| {
                room.members.retain(|member| member != connection_id);
                room.members.len()
            })
            .unwrap_or(0);
        if remaining == 0 {
            self.rooms.remove(&room_id);
        }
        Some((room_id, remaining))
    }

    pub fn members(&self, room_id: &RoomId) -> &[ConnectionId] {
        self.rooms
            .get(room_id)
            .map(|room| room.members.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_removes_room_when_last_member_leaves() {
        let mut state = ServerState::new();
        let connection_id = state.create_connection();
        state.join_room(connection_id, &"abc".to_string());
        assert_eq!(state.leave_room(&connection_id), Some(("abc".to_string(), 0)));
        assert!(state.rooms.is_empty());
        assert!(state.connection_locations.is_empty());
    }

    #[test]
    fn it_creates_room_on_first_join() {
        let mut state = ServerState::new();
        let a = state.create_connection();
        let b = state.create_connection();
        assert_eq!(state.join_room(a, &"abc".to_string()), 1);
        assert_eq!(state.join_room(b, &"abc".to_string()), 2);
        assert_eq!(state.members(&"abc".to_string()), &[a, b]);
    }

    #[test]
    fn joining_twice_does_not_duplicate_membership() {
        let mut state = ServerState::new();
        let a = state.create_connection();
        assert_eq!(state.join_room(a, &"abc".to_string()), 1);
        assert_eq!(state.join_room(a, &"abc".to_string()), 1);
        assert_eq!(state.members(&"abc".to_string()), &[a]);
    }

    #[test]
    fn leaving_without_room_is_noop() {
        let mut state = ServerState::new();
        let a = state.create_connection();
        assert_eq!(state.leave_room(&a), None);
    }

    #[test]
    fn room_survives_while_members_remain() {
        let mut state = ServerState::new();
        let a = state.create_connection();
        let b = state.create_connection();
        state.join_room(a, &"abc".to_string());
        state.join_room(b, &"abc".to_string());
        assert_eq!(state.leave_room(&a), Some(("abc".to_string(), 1)));
        assert_eq!(state.members(&"abc".to_string()), &[b]);
    }

    #[test]
    fn connection_is_in_at_most_one_room() {
        let mut state = ServerState::new();
        let a = state.create_connection();
        state.join_room(a, &"one".to_string());
        state.leave_room(&a);
        state.join_room(a, &"two".to_string());
        assert_eq!(state.current_room(&a), Some(&"two".to_string()));
        assert!(!state.rooms.contains_key("one"));
    }
}
