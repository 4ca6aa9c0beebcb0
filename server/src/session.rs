use drawboard_system::ConnectionId;

/// One collaborative room. Members are kept in join order so that picking a
/// bootstrap source is deterministic.
pub struct Room {
    pub members: Vec<ConnectionId>,
}

impl Room {
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }
}
