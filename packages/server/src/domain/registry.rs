//! In-process session registry.
//!
//! 「いま誰がどのルームにいるか」の唯一の信頼できる情報源です。
//! 永続ストアとは独立しており、プロセス再起動で空に戻ります（その場合、
//! クライアントの次の join がルームを再作成します）。
//!
//! 本体は同期的な純粋構造体で、UI 層が `Arc<Mutex<_>>` で包んで共有します。
//! Broadcast Router と Reaper だけがこの構造体を変更します。

use std::collections::HashMap;

use super::value_object::{ConnectionId, PlayerName, SessionId};

/// One live room: its connected participants and last-activity time
struct RoomEntry {
    participants: HashMap<ConnectionId, PlayerName>,
    last_activity: i64,
}

/// Read-only view of a live room
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    /// Connection ids and display names currently in the room
    pub participants: Vec<(ConnectionId, PlayerName)>,
    /// Millisecond timestamp of the last event seen for the room
    pub last_activity: i64,
}

impl RoomSnapshot {
    /// Number of live participants
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Connection ids of all participants
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.participants.iter().map(|(id, _)| *id).collect()
    }
}

/// Result of a `join` operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Participant count of the target room after the join
    pub participant_count: usize,
    /// Implicit leave from a different room, if the connection was in one.
    /// The caller must deactivate the room if it was evicted, or notify
    /// the remaining members and refresh the persisted count if not.
    pub departed: Option<LeaveOutcome>,
}

/// Result of a `leave` operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// The room the connection was removed from
    pub session_id: SessionId,
    /// Display name the connection was registered under
    pub player_name: PlayerName,
    /// Participants remaining in the room
    pub remaining: usize,
    /// True if the room became empty and was evicted from the registry
    pub evicted: bool,
}

/// Authoritative map from session id to the live participant set.
///
/// Invariant: a session id is present here iff at least one connection
/// currently claims membership, except transiently inside a single
/// operation. Operations never fail; unknown session ids are created
/// lazily by the first joiner.
pub struct SessionRegistry {
    rooms: HashMap<SessionId, RoomEntry>,
    /// Reverse index: which room each connection is in (at most one)
    memberships: HashMap<ConnectionId, SessionId>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
            memberships: HashMap::new(),
        }
    }

    /// Add a connection to a room, creating the room if needed.
    ///
    /// If the connection is already in a different room it implicitly
    /// leaves it first; the leave outcome for that room is reported as
    /// `departed`. Rejoining the current room is a no-op besides
    /// refreshing `last_activity`.
    pub fn join(
        &mut self,
        session_id: SessionId,
        connection_id: ConnectionId,
        player_name: PlayerName,
        now: i64,
    ) -> JoinOutcome {
        let mut departed = None;

        match self.memberships.get(&connection_id) {
            Some(current) if *current == session_id => {
                // Rejoin of the same room: refresh activity only
                if let Some(entry) = self.rooms.get_mut(&session_id) {
                    entry.last_activity = now;
                    entry.participants.insert(connection_id, player_name);
                    return JoinOutcome {
                        participant_count: entry.participants.len(),
                        departed: None,
                    };
                }
            }
            Some(_) => {
                departed = self.leave(&connection_id);
            }
            None => {}
        }

        let entry = self.rooms.entry(session_id.clone()).or_insert(RoomEntry {
            participants: HashMap::new(),
            last_activity: now,
        });
        entry.participants.insert(connection_id, player_name);
        entry.last_activity = now;
        self.memberships.insert(connection_id, session_id);

        JoinOutcome {
            participant_count: entry.participants.len(),
            departed,
        }
    }

    /// Remove a connection from whichever room it is in.
    ///
    /// Evicts the room when its participant set empties and reports the
    /// eviction so the caller can deactivate the persisted session.
    pub fn leave(&mut self, connection_id: &ConnectionId) -> Option<LeaveOutcome> {
        let session_id = self.memberships.remove(connection_id)?;
        let entry = self.rooms.get_mut(&session_id)?;
        let player_name = entry.participants.remove(connection_id)?;

        let remaining = entry.participants.len();
        let evicted = remaining == 0;
        if evicted {
            self.rooms.remove(&session_id);
        }

        Some(LeaveOutcome {
            session_id,
            player_name,
            remaining,
            evicted,
        })
    }

    /// Refresh a room's last-activity time; no-op for unknown rooms
    pub fn touch(&mut self, session_id: &SessionId, now: i64) {
        if let Some(entry) = self.rooms.get_mut(session_id) {
            entry.last_activity = now;
        }
    }

    /// Get a snapshot of a live room
    pub fn get(&self, session_id: &SessionId) -> Option<RoomSnapshot> {
        self.rooms.get(session_id).map(|entry| RoomSnapshot {
            participants: entry
                .participants
                .iter()
                .map(|(id, name)| (*id, name.clone()))
                .collect(),
            last_activity: entry.last_activity,
        })
    }

    /// Check whether a connection is currently a member of a room
    pub fn is_member(&self, session_id: &SessionId, connection_id: &ConnectionId) -> bool {
        self.rooms
            .get(session_id)
            .is_some_and(|entry| entry.participants.contains_key(connection_id))
    }

    /// Number of participants in a room (0 for unknown rooms)
    pub fn participant_count(&self, session_id: &SessionId) -> usize {
        self.rooms
            .get(session_id)
            .map_or(0, |entry| entry.participants.len())
    }

    /// Number of live rooms
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Evict every room whose last activity is older than the threshold.
    ///
    /// This is a hard timeout: occupied rooms are evicted too, and their
    /// connections become orphaned (the next event from one of them fails
    /// the membership check and forces a rejoin). Sockets are not closed
    /// here.
    pub fn sweep(&mut self, now: i64, idle_threshold_millis: i64) -> Vec<SessionId> {
        let stale: Vec<SessionId> = self
            .rooms
            .iter()
            .filter(|(_, entry)| now - entry.last_activity > idle_threshold_millis)
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in &stale {
            if let Some(entry) = self.rooms.remove(session_id) {
                for connection_id in entry.participants.keys() {
                    self.memberships.remove(connection_id);
                }
            }
        }

        stale
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
