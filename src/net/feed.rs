//! Perception adapters
//!
//! `WireFeed` parses server JSON itself and keeps the persistent rune and
//! shrine tables that partial state updates are merged into. `SharedFeed`
//! reads snapshots a host engine publishes through a `SnapshotPublisher`.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::bot::driver::PerceptionSource;
use crate::game::snapshot::{
    Collectible, MatchEvent, Objective, ObservedPlayer, RuneId, ShrineId, WorldSnapshot,
};
use crate::net::inbox::{Inbox, InboxSender};
use crate::net::protocol::{decode_server_json, from_wire_id, ServerMessage, StateUpdate};

/// Wire adapter: one per bot, fed server text by the transport
pub struct WireFeed {
    inbox: Inbox<Arc<str>>,
    runes: HashMap<RuneId, Collectible>,
    shrines: HashMap<ShrineId, Objective>,
    players: Vec<ObservedPlayer>,
    tick: u32,
    time_remaining: u32,
    parse_errors: u64,
}

impl WireFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            inbox: Inbox::new(capacity),
            runes: HashMap::new(),
            shrines: HashMap::new(),
            players: Vec::new(),
            tick: 0,
            time_remaining: 0,
            parse_errors: 0,
        }
    }

    /// Handle for the transport side
    pub fn sender(&self) -> InboxSender<Arc<str>> {
        self.inbox.sender()
    }

    pub fn parse_errors(&self) -> u64 {
        self.parse_errors
    }

    pub fn rune_count(&self) -> usize {
        self.runes.len()
    }

    /// Fold one decoded message into the tables. Returns true when it was a
    /// state update, i.e. a new snapshot is due.
    pub fn apply(&mut self, message: ServerMessage, events: &mut Vec<MatchEvent>) -> bool {
        match message {
            ServerMessage::State(state) => {
                self.merge_state(state);
                return true;
            }
            ServerMessage::Event(event) => {
                if let Some(event) = event.to_match_event() {
                    self.apply_event(&event);
                    events.push(event);
                }
            }
            ServerMessage::MatchStart(start) => {
                self.runes.clear();
                self.shrines.clear();
                self.players.clear();
                events.push(MatchEvent::MatchStart(start.to_info()));
            }
            ServerMessage::MatchEnd(end) => {
                events.push(MatchEvent::MatchEnded {
                    winner_id: end.winner_id.map(from_wire_id),
                });
            }
            ServerMessage::Error { code, message } => {
                warn!(%code, %message, "Server error");
            }
            ServerMessage::Shutdown { reason } => {
                warn!(%reason, "Server shutting down");
                events.push(MatchEvent::MatchEnded { winner_id: None });
            }
            ServerMessage::InputAck { .. } | ServerMessage::Pong { .. } => {}
        }
        false
    }

    fn merge_state(&mut self, state: StateUpdate) {
        self.tick = state.tick;
        self.time_remaining = state.time_remaining;
        self.players = state.players.iter().map(|p| p.to_observed()).collect();
        for rune in state.runes.into_iter().flatten() {
            if rune.collected {
                self.runes.remove(&rune.id);
            } else {
                self.runes.insert(rune.id, rune.to_collectible());
            }
        }
        for shrine in state.shrines.into_iter().flatten() {
            self.shrines.insert(shrine.id, shrine.to_objective());
        }
    }

    /// Events can run ahead of the next state update
    fn apply_event(&mut self, event: &MatchEvent) {
        match *event {
            MatchEvent::RuneSpawned { rune_id, position } => {
                self.runes.insert(
                    rune_id,
                    Collectible {
                        id: rune_id,
                        position,
                        live: true,
                    },
                );
            }
            MatchEvent::RuneCollected { rune_id, .. } => {
                self.runes.remove(&rune_id);
            }
            MatchEvent::ShrineCaptured { shrine_id, .. } => {
                if let Some(shrine) = self.shrines.get_mut(&shrine_id) {
                    shrine.active = false;
                }
            }
            _ => {}
        }
    }

    /// Current tables as a snapshot, ordered by id
    pub fn build_snapshot(&self) -> WorldSnapshot {
        let mut collectibles: Vec<Collectible> = self.runes.values().copied().collect();
        collectibles.sort_unstable_by_key(|c| c.id);
        let mut objectives: Vec<Objective> = self.shrines.values().copied().collect();
        objectives.sort_unstable_by_key(|o| o.id);
        WorldSnapshot {
            tick: self.tick,
            time_remaining: self.time_remaining,
            players: self.players.clone(),
            collectibles,
            objectives,
        }
    }
}

impl PerceptionSource for WireFeed {
    fn sync(&mut self, events: &mut Vec<MatchEvent>) -> Option<Arc<WorldSnapshot>> {
        let mut fresh = false;
        for text in self.inbox.drain() {
            match decode_server_json(&text) {
                Ok(message) => fresh |= self.apply(message, events),
                Err(e) => {
                    self.parse_errors += 1;
                    warn!(error = %e, "Dropping unparseable server message");
                }
            }
        }
        fresh.then(|| Arc::new(self.build_snapshot()))
    }
}

struct Published {
    version: u64,
    snapshot: Option<Arc<WorldSnapshot>>,
}

struct SharedState {
    latest: RwLock<Published>,
    subscribers: Mutex<Vec<Sender<MatchEvent>>>,
}

/// Host side of the live adapter
#[derive(Clone)]
pub struct SnapshotPublisher {
    shared: Arc<SharedState>,
    event_capacity: usize,
}

impl SnapshotPublisher {
    pub fn new(event_capacity: usize) -> Self {
        Self {
            shared: Arc::new(SharedState {
                latest: RwLock::new(Published {
                    version: 0,
                    snapshot: None,
                }),
                subscribers: Mutex::new(Vec::new()),
            }),
            event_capacity,
        }
    }

    /// Replace the current snapshot wholesale
    pub fn publish(&self, snapshot: WorldSnapshot) {
        let mut latest = self.shared.latest.write();
        latest.version += 1;
        latest.snapshot = Some(Arc::new(snapshot));
    }

    /// Fan an event out to every live subscriber. Subscribers that went
    /// away are dropped; full queues lose the event.
    pub fn publish_event(&self, event: MatchEvent) {
        let mut subscribers = self.shared.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Event queue full, dropping event for one subscriber");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// A new bot-side reader. It sees the current snapshot on first sync.
    pub fn subscribe(&self) -> SharedFeed {
        let (tx, rx) = bounded(self.event_capacity);
        self.shared.subscribers.lock().push(tx);
        SharedFeed {
            shared: self.shared.clone(),
            seen_version: 0,
            events: rx,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }
}

/// Bot side of the live adapter
pub struct SharedFeed {
    shared: Arc<SharedState>,
    seen_version: u64,
    events: Receiver<MatchEvent>,
}

impl PerceptionSource for SharedFeed {
    fn sync(&mut self, events: &mut Vec<MatchEvent>) -> Option<Arc<WorldSnapshot>> {
        events.extend(self.events.try_iter());
        let latest = self.shared.latest.read();
        if latest.version == self.seen_version {
            return None;
        }
        self.seen_version = latest.version;
        latest.snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::{
        encode_json, wire_id, PlayerBuffs, PlayerStateMsg, RuneUpdate, ShrineUpdate, WireEvent,
    };
    use uuid::Uuid;

    fn rune(id: u32, collected: bool) -> RuneUpdate {
        RuneUpdate {
            id,
            rune_type: 0,
            position: [id as i32 * 65536, 0],
            collected,
        }
    }

    fn state(tick: u32, runes: Option<Vec<RuneUpdate>>) -> ServerMessage {
        ServerMessage::State(StateUpdate {
            tick,
            time_remaining: 1000 - tick,
            players: vec![PlayerStateMsg {
                player_id: wire_id(Uuid::from_u128(1)),
                position: [0, 0],
                velocity: [0, 0],
                form: 0,
                score: 0,
                alive: true,
                spawn_zone_id: -1,
                spawn_zone_active: false,
                radius: 0,
                ability_cooldown: 0,
                buffs: PlayerBuffs::default(),
            }],
            runes,
            shrines: None,
        })
    }

    fn push(feed: &WireFeed, message: &ServerMessage) {
        let text: Arc<str> = encode_json(message).unwrap().into();
        assert!(feed.sender().try_send(text).is_ok());
    }

    #[test]
    fn test_partial_rune_updates_merge() {
        let mut feed = WireFeed::new(16);
        let mut events = Vec::new();

        push(&feed, &state(1, Some(vec![rune(1, false), rune(2, false), rune(3, false)])));
        let snap = feed.sync(&mut events).unwrap();
        assert_eq!(snap.collectibles.len(), 3);

        // Only rune 2 changed; the others persist
        push(&feed, &state(2, Some(vec![rune(2, true)])));
        let snap = feed.sync(&mut events).unwrap();
        let ids: Vec<u32> = snap.collectibles.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]);

        // No rune list at all keeps everything
        push(&feed, &state(3, None));
        assert_eq!(feed.sync(&mut events).unwrap().collectibles.len(), 2);
        assert_eq!(feed.sync(&mut events), None);
    }

    #[test]
    fn test_events_update_tables_and_pass_through() {
        let mut feed = WireFeed::new(16);
        let mut events = Vec::new();
        push(&feed, &state(1, Some(vec![rune(1, false)])));
        push(
            &feed,
            &ServerMessage::Event(WireEvent::RuneCollected {
                tick: 2,
                player_id: [9; 16],
                rune_id: 1,
                rune_type: 0,
                points: 10,
            }),
        );
        let snap = feed.sync(&mut events).unwrap();
        assert!(snap.collectibles.is_empty());
        assert!(matches!(events[0], MatchEvent::RuneCollected { rune_id: 1, .. }));
    }

    #[test]
    fn test_shrine_capture_deactivates() {
        let mut feed = WireFeed::new(16);
        let mut events = Vec::new();
        let shrine = ShrineUpdate {
            id: 4,
            shrine_type: 2,
            position: [0, 0],
            active: true,
            controller: None,
        };
        let mut message = state(1, None);
        if let ServerMessage::State(ref mut s) = message {
            s.shrines = Some(vec![shrine]);
        }
        assert!(feed.apply(message, &mut events));
        feed.apply(
            ServerMessage::Event(WireEvent::ShrineCaptured {
                tick: 2,
                player_id: [1; 16],
                shrine_id: 4,
                shrine_type: 2,
            }),
            &mut events,
        );
        assert!(!feed.build_snapshot().objectives[0].active);
    }

    #[test]
    fn test_garbage_is_counted_not_fatal() {
        let mut feed = WireFeed::new(4);
        let mut events = Vec::new();
        feed.sender().try_send(Arc::from("not json")).unwrap();
        assert_eq!(feed.sync(&mut events), None);
        assert_eq!(feed.parse_errors(), 1);
    }

    #[test]
    fn test_shared_feed_versions() {
        let publisher = SnapshotPublisher::new(8);
        let mut feed = publisher.subscribe();
        let mut events = Vec::new();
        assert_eq!(feed.sync(&mut events), None);

        publisher.publish(WorldSnapshot {
            tick: 5,
            ..Default::default()
        });
        assert_eq!(feed.sync(&mut events).map(|s| s.tick), Some(5));
        assert_eq!(feed.sync(&mut events), None);
    }

    #[test]
    fn test_events_fan_out_to_each_subscriber() {
        let publisher = SnapshotPublisher::new(8);
        let mut a = publisher.subscribe();
        let mut b = publisher.subscribe();
        publisher.publish_event(MatchEvent::MatchStarted);

        let mut events = Vec::new();
        a.sync(&mut events);
        assert_eq!(events, vec![MatchEvent::MatchStarted]);
        events.clear();
        b.sync(&mut events);
        assert_eq!(events, vec![MatchEvent::MatchStarted]);
    }

    #[test]
    fn test_dropped_subscriber_pruned() {
        let publisher = SnapshotPublisher::new(8);
        let feed = publisher.subscribe();
        drop(feed);
        publisher.publish_event(MatchEvent::MatchStarted);
        assert_eq!(publisher.subscriber_count(), 0);
    }
}
