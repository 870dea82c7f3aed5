use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::app::time::now_millis;
use crate::protocol::{
    self, GameSettings, GameStatePayload, PlayerSegments, ServerMessage,
};
use crate::shared::names::sanitize_player_name;

use super::constants::{
    ASPECT_RATIO, COLOR_POOL, LINE_WIDTH, MIN_ROUND_PLAYERS, MIN_SPAWN_DIST, MOVE_SPEED,
    OUTBOUND_CAPACITY, ROUND_START_DELAY_MS, SESSION_TIMEOUT_MS, SUB_TICK_MS, SUB_TICK_RATE,
    TICK_MS,
};
use super::geometry::{fat_aabb, field_contains, line_to_line, time_at_point, translated};
use super::input::{is_valid_turn, parse_direction};
use super::partition::{cell_indices, FieldPartitions};
use super::types::{Direction, DirectionInput, Player, Point, Segment};

mod session;

pub use session::ConnectionIo;

#[derive(Debug, Clone)]
pub enum Handshake {
    Resume {
        session_id: String,
    },
    Fresh {
        username: String,
        color: Option<[f64; 3]>,
    },
}

#[derive(Debug)]
pub struct Arena {
    state: Mutex<ArenaState>,
    running: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundPhase {
    Idle,
    Countdown { ends_at: i64 },
    Playing,
}

#[derive(Debug)]
struct ConnectionEntry {
    outbound: mpsc::Sender<ServerMessage>,
    session_id: String,
    player_id: Option<String>,
    // watermark per trail source: last segment index this client already has
    last_sent_segments: HashMap<String, usize>,
    pending_redraw: bool,
}

#[derive(Debug, Clone)]
struct SessionRecord {
    user_id: String,
    name: String,
    color: [f64; 3],
    pending_deletion: bool,
    expires_at: i64,
}

#[derive(Debug)]
struct ArenaState {
    connections: HashMap<String, ConnectionEntry>,
    sessions: HashMap<String, SessionRecord>,
    players: HashMap<String, Player>,
    player_order: Vec<String>,
    phase: RoundPhase,
    prev_alive: Vec<String>,
    last_tick_end: i64,
    color_cursor: usize,
}

impl Arena {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ArenaState::new()),
            running: AtomicBool::new(false),
        }
    }

    pub async fn session_exists(&self, session_id: &str) -> bool {
        let state = self.state.lock().await;
        state.sessions.contains_key(session_id)
    }

    pub async fn open_connection(self: &Arc<Self>, handshake: Handshake) -> Option<ConnectionIo> {
        let mut state = self.state.lock().await;
        let io = state.open_connection(handshake, now_millis())?;
        drop(state);
        self.ensure_loop();
        Some(io)
    }

    pub async fn handle_text_message(&self, connection_id: &str, text: &str) -> bool {
        let Some(message) = protocol::decode_client_message(text) else {
            return true;
        };
        let mut state = self.state.lock().await;
        match message {
            protocol::ClientMessage::Join => {
                state.handle_join(connection_id);
                true
            }
            protocol::ClientMessage::Start => {
                state.start_round(now_millis());
                true
            }
            protocol::ClientMessage::Input(value) => {
                state.handle_input(connection_id, value, now_millis());
                true
            }
            protocol::ClientMessage::Redraw => {
                state.handle_redraw(connection_id);
                true
            }
            protocol::ClientMessage::Heartbeat => {
                state.handle_heartbeat(connection_id);
                true
            }
            protocol::ClientMessage::Disconnect => {
                state.close_connection(connection_id, now_millis());
                false
            }
        }
    }

    pub async fn close_connection(&self, connection_id: &str) {
        let mut state = self.state.lock().await;
        state.close_connection(connection_id, now_millis());
    }

    fn ensure_loop(self: &Arc<Self>) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let arena = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(TICK_MS));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let mut state = arena.state.lock().await;
                if state.connections.is_empty() {
                    arena.running.store(false, Ordering::SeqCst);
                    break;
                }
                state.tick(now_millis());
            }
        });
    }
}

impl ArenaState {
    fn new() -> Self {
        Self {
            connections: HashMap::new(),
            sessions: HashMap::new(),
            players: HashMap::new(),
            player_order: Vec::new(),
            phase: RoundPhase::Idle,
            prev_alive: Vec::new(),
            last_tick_end: 0,
            color_cursor: 0,
        }
    }

    fn open_connection(&mut self, handshake: Handshake, now: i64) -> Option<ConnectionIo> {
        let session_id = match handshake {
            Handshake::Resume { session_id } => {
                let expired = {
                    let record = self.sessions.get(&session_id)?;
                    record.pending_deletion && now >= record.expires_at
                };
                if expired {
                    self.expire_sessions(now);
                    return None;
                }
                let record = self.sessions.get_mut(&session_id)?;
                record.pending_deletion = false;
                session_id
            }
            Handshake::Fresh { username, color } => {
                let session_id = Uuid::new_v4().to_string();
                let user_id = Uuid::new_v4().to_string();
                let name = sanitize_player_name(&username, "Rider");
                let color = color.unwrap_or_else(|| self.next_pool_color());
                self.sessions.insert(
                    session_id.clone(),
                    SessionRecord {
                        user_id,
                        name,
                        color,
                        pending_deletion: false,
                        expires_at: 0,
                    },
                );
                session_id
            }
        };

        let connection_id = Uuid::new_v4().to_string();
        let (outbound, outbound_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_CAPACITY);
        let _ = outbound.try_send(ServerMessage::Session(session_id.clone()));
        self.connections.insert(
            connection_id.clone(),
            ConnectionEntry {
                outbound,
                session_id,
                player_id: None,
                last_sent_segments: HashMap::new(),
                pending_redraw: false,
            },
        );
        Some(ConnectionIo {
            connection_id,
            outbound_rx,
        })
    }

    fn close_connection(&mut self, connection_id: &str, now: i64) {
        let Some(connection) = self.connections.remove(connection_id) else {
            return;
        };
        let still_bound = self
            .connections
            .values()
            .any(|other| other.session_id == connection.session_id);
        if still_bound {
            return;
        }
        if let Some(record) = self.sessions.get_mut(&connection.session_id) {
            record.pending_deletion = true;
            record.expires_at = now + SESSION_TIMEOUT_MS;
        }
    }

    fn expire_sessions(&mut self, now: i64) {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, record)| record.pending_deletion && now >= record.expires_at)
            .map(|(id, _)| id.clone())
            .collect();
        for session_id in expired {
            let Some(record) = self.sessions.remove(&session_id) else {
                continue;
            };
            let user_id = record.user_id;
            if self.players.remove(&user_id).is_some() {
                self.player_order.retain(|id| id != &user_id);
                self.prev_alive.retain(|id| id != &user_id);
                for connection in self.connections.values_mut() {
                    connection.last_sent_segments.remove(&user_id);
                }
                tracing::debug!(player_id = %user_id, "session expired, player removed");
                self.broadcast(&ServerMessage::Remove(user_id));
            }
        }
    }

    fn handle_join(&mut self, connection_id: &str) {
        let Some(connection) = self.connections.get(connection_id) else {
            return;
        };
        let Some(record) = self.sessions.get(&connection.session_id) else {
            return;
        };
        let user_id = record.user_id.clone();
        if !self.players.contains_key(&user_id) {
            self.players.insert(
                user_id.clone(),
                Player {
                    id: user_id.clone(),
                    name: record.name.clone(),
                    color: record.color,
                    score: 0,
                    direction: Direction::Right,
                    segments: Vec::new(),
                    dead: true,
                    pending_inputs: VecDeque::new(),
                    starting_direction: None,
                    partitions: FieldPartitions::new(),
                },
            );
            self.player_order.push(user_id.clone());
            tracing::debug!(player_id = %user_id, "player joined");
        }

        let Some(connection) = self.connections.get_mut(connection_id) else {
            return;
        };
        connection.player_id = Some(user_id.clone());
        connection.last_sent_segments.clear();
        connection.pending_redraw = false;
        let outbound = connection.outbound.clone();

        let _ = outbound.try_send(ServerMessage::GameSettings(GameSettings {
            aspect_ratio: ASPECT_RATIO,
            line_width: LINE_WIDTH,
        }));
        let mut watermarks: Vec<(String, usize)> = Vec::new();
        for id in &self.player_order {
            let Some(player) = self.players.get(id) else {
                continue;
            };
            let _ = outbound.try_send(ServerMessage::ModifyPlayer(protocol::player_info(player)));
            let _ = outbound.try_send(ServerMessage::GameState(GameStatePayload {
                players: vec![PlayerSegments {
                    id: id.clone(),
                    missing_segments: player
                        .segments
                        .iter()
                        .map(protocol::encode_segment)
                        .collect(),
                }],
            }));
            watermarks.push((id.clone(), player.segments.len().saturating_sub(1)));
        }
        if let Some(connection) = self.connections.get_mut(connection_id) {
            for (id, watermark) in watermarks {
                connection.last_sent_segments.insert(id, watermark);
            }
        }

        self.broadcast_player_info(&user_id);
    }

    fn handle_input(&mut self, connection_id: &str, value: u8, now: i64) {
        let Some(direction) = parse_direction(value) else {
            return;
        };
        let Some(player_id) = self.connection_player_id(connection_id) else {
            return;
        };
        let phase = self.phase;
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        match phase {
            RoundPhase::Playing => {
                if player.dead {
                    return;
                }
                player.pending_inputs.push_back(DirectionInput {
                    direction,
                    received_at: now,
                });
            }
            RoundPhase::Countdown { .. } => {
                player.starting_direction = Some(direction);
            }
            RoundPhase::Idle => {}
        }
    }

    fn handle_redraw(&mut self, connection_id: &str) {
        if let Some(connection) = self.connections.get_mut(connection_id) {
            connection.last_sent_segments.clear();
            connection.pending_redraw = true;
        }
    }

    fn handle_heartbeat(&mut self, connection_id: &str) {
        let Some(connection) = self.connections.get(connection_id) else {
            return;
        };
        let session_id = connection.session_id.clone();
        if let Some(record) = self.sessions.get_mut(&session_id) {
            record.pending_deletion = false;
        }
    }

    fn connection_player_id(&self, connection_id: &str) -> Option<String> {
        self.connections
            .get(connection_id)
            .and_then(|entry| entry.player_id.clone())
    }

    fn next_pool_color(&mut self) -> [f64; 3] {
        let color = COLOR_POOL[self.color_cursor % COLOR_POOL.len()];
        self.color_cursor += 1;
        color
    }

    fn broadcast(&self, message: &ServerMessage) {
        for connection in self.connections.values() {
            let _ = connection.outbound.try_send(message.clone());
        }
    }

    fn broadcast_player_info(&self, player_id: &str) {
        let Some(player) = self.players.get(player_id) else {
            return;
        };
        self.broadcast(&ServerMessage::ModifyPlayer(protocol::player_info(player)));
    }

    fn start_round(&mut self, now: i64) {
        if self.phase != RoundPhase::Idle {
            return;
        }
        if self.players.len() < MIN_ROUND_PLAYERS {
            return;
        }
        let mut rng = rand::thread_rng();
        for id in self.player_order.clone() {
            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };
            player.dead = false;
            player.pending_inputs.clear();
            player.starting_direction = None;
            let spawn = Point {
                x: rng.gen_range(-ASPECT_RATIO + MIN_SPAWN_DIST..=ASPECT_RATIO - MIN_SPAWN_DIST),
                y: rng.gen_range(-1.0 + MIN_SPAWN_DIST..=1.0 - MIN_SPAWN_DIST),
            };
            let direction = parse_direction(rng.gen_range(0..4u8)).unwrap_or(Direction::Right);
            Self::seed_segment(player, spawn, direction);
        }
        // clients wipe their canvases on `starting`; every trail restarts at
        // index zero
        for connection in self.connections.values_mut() {
            connection.last_sent_segments.clear();
        }
        self.prev_alive = self.player_order.clone();
        self.phase = RoundPhase::Countdown {
            ends_at: now + ROUND_START_DELAY_MS,
        };
        tracing::debug!(players = self.player_order.len(), "round countdown started");
        self.broadcast(&ServerMessage::Starting);
    }

    fn seed_segment(player: &mut Player, origin: Point, direction: Direction) {
        player.direction = direction;
        let segment = Segment {
            start: origin,
            end: translated(origin, direction, LINE_WIDTH),
        };
        player.segments = vec![segment];
        player.partitions.clear();
        player.partitions.insert(&fat_aabb(&segment, LINE_WIDTH), 0);
    }

    fn begin_playing(&mut self, now: i64) {
        for id in self.player_order.clone() {
            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };
            if player.dead {
                continue;
            }
            if let Some(direction) = player.starting_direction.take() {
                let Some(seed) = player.segments.first().copied() else {
                    continue;
                };
                Self::seed_segment(player, seed.start, direction);
            }
        }
        self.phase = RoundPhase::Playing;
        self.last_tick_end = now;
        tracing::debug!("round playing");
    }

    fn finish_round(&mut self, alive: Vec<String>) {
        let winners = if alive.len() == 1 {
            alive
        } else {
            // simultaneous death: everyone alive before the fatal sub-tick
            self.prev_alive.clone()
        };
        tracing::debug!(winners = winners.len(), "round over");
        self.broadcast(&ServerMessage::RoundOver);
        for id in &winners {
            let Some(player) = self.players.get_mut(id) else {
                continue;
            };
            player.score += 1;
        }
        for id in &winners {
            self.broadcast_player_info(id);
        }
        self.phase = RoundPhase::Idle;
    }

    fn tick(&mut self, now: i64) {
        self.expire_sessions(now);

        let mut entered_playing = false;
        if let RoundPhase::Countdown { ends_at } = self.phase {
            if now >= ends_at {
                self.begin_playing(now);
                entered_playing = true;
            }
        }

        if self.phase == RoundPhase::Playing && !entered_playing {
            self.simulate(now);
            self.broadcast_deltas();
        } else {
            self.service_redraws();
        }
    }

    fn simulate(&mut self, now: i64) {
        let tick_start = self.last_tick_end as f64;
        for step in 0..SUB_TICK_RATE {
            let end_cutoff = tick_start + (step + 1) as f64 * SUB_TICK_MS;
            for id in self.player_order.clone() {
                let Some(mut player) = self.players.remove(&id) else {
                    continue;
                };
                if !player.dead {
                    self.step_player(&mut player, end_cutoff);
                }
                self.players.insert(id, player);
            }
            let alive = self.alive_ids();
            if alive.len() <= 1 {
                self.finish_round(alive);
                break;
            }
            self.prev_alive = alive;
        }

        let tick_cutoff = tick_start + SUB_TICK_RATE as f64 * SUB_TICK_MS;
        for player in self.players.values_mut() {
            // inputs that were due this tick but lost every admission race are
            // stale now; dropping them bounds the queue
            player
                .pending_inputs
                .retain(|input| input.received_at as f64 >= tick_cutoff);
            player.starting_direction = None;
        }
        self.last_tick_end = now;
    }

    fn alive_ids(&self) -> Vec<String> {
        self.player_order
            .iter()
            .filter(|id| self.players.get(*id).map(|p| !p.dead).unwrap_or(false))
            .cloned()
            .collect()
    }

    fn step_player(&self, player: &mut Player, end_cutoff: f64) {
        // admit at most one turn per sub-tick, consuming due inputs in arrival
        // order; rejected ones are discarded
        while let Some(front) = player.pending_inputs.front().copied() {
            if front.received_at as f64 >= end_cutoff {
                break;
            }
            player.pending_inputs.pop_front();
            if is_valid_turn(player.direction, front.direction) {
                Self::push_turn_segment(player, front.direction);
                break;
            }
        }

        let Some(head_index) = player.segments.len().checked_sub(1) else {
            return;
        };
        let old_end = player.segments[head_index].end;
        let new_end = translated(old_end, player.direction, MOVE_SPEED * SUB_TICK_MS / 1000.0);
        player.segments[head_index].end = new_end;

        if !field_contains(new_end) {
            // over-travel past the edge is kept; the head simply stops here
            player.dead = true;
            tracing::debug!(player_id = %player.id, "hit the boundary");
        } else {
            self.test_collisions(player, head_index, old_end, end_cutoff);
        }

        // index the final travel slice so everyone later in this sub-tick sees
        // the trail, including a head that just died
        let slice = Segment {
            start: old_end,
            end: player.segments[head_index].end,
        };
        player
            .partitions
            .insert(&fat_aabb(&slice, LINE_WIDTH), head_index);
    }

    fn test_collisions(
        &self,
        player: &mut Player,
        head_index: usize,
        old_end: Point,
        end_cutoff: f64,
    ) {
        let slice = Segment {
            start: old_end,
            end: player.segments[head_index].end,
        };
        let slice_box = fat_aabb(&slice, LINE_WIDTH);
        let cells = cell_indices(&slice_box);

        let mut hit: Option<(Point, String, usize)> = None;
        'players: for other_id in &self.player_order {
            let own = *other_id == player.id;
            let (segments, partitions): (&[Segment], &FieldPartitions) = if own {
                (&player.segments, &player.partitions)
            } else {
                let Some(other) = self.players.get(other_id) else {
                    continue;
                };
                (&other.segments, &other.partitions)
            };
            for cell in &cells {
                for &segment_index in partitions.cell(*cell) {
                    // a head cannot hit itself or the segment it just turned
                    // out of
                    if own && segment_index + 2 > head_index {
                        continue;
                    }
                    let Some(target) = segments.get(segment_index) else {
                        continue;
                    };
                    if let Some((entry, _)) =
                        line_to_line(&slice, player.direction, target, LINE_WIDTH)
                    {
                        hit = Some((entry, other_id.clone(), segment_index));
                        break 'players;
                    }
                }
            }
        }

        if let Some((entry, into, segment_index)) = hit {
            player.dead = true;
            player.segments[head_index].end = entry;
            let died_at = time_at_point(&slice, entry, end_cutoff - SUB_TICK_MS, SUB_TICK_MS);
            tracing::debug!(
                player_id = %player.id,
                into = %into,
                segment = segment_index,
                died_at = died_at as i64,
                "trail collision"
            );
        }
    }

    fn push_turn_segment(player: &mut Player, direction: Direction) {
        let Some(head) = player.segments.last().copied() else {
            return;
        };
        let (old_dx, old_dy) = player.direction.unit();
        let (new_dx, new_dy) = direction.unit();
        // corner nub: one line width forward on the new axis and one back on
        // the old axis, so perpendicular strokes connect on screen
        let start = Point {
            x: head.end.x + LINE_WIDTH * new_dx - LINE_WIDTH * old_dx,
            y: head.end.y + LINE_WIDTH * new_dy - LINE_WIDTH * old_dy,
        };
        player.segments.push(Segment { start, end: start });
        player.direction = direction;
    }

    fn broadcast_deltas(&mut self) {
        let connection_ids: Vec<String> = self.connections.keys().cloned().collect();
        for connection_id in connection_ids {
            self.send_deltas(&connection_id);
        }
    }

    fn service_redraws(&mut self) {
        let connection_ids: Vec<String> = self
            .connections
            .iter()
            .filter(|(_, connection)| connection.pending_redraw)
            .map(|(id, _)| id.clone())
            .collect();
        for connection_id in connection_ids {
            self.send_deltas(&connection_id);
        }
    }

    fn send_deltas(&mut self, connection_id: &str) {
        let Some(connection) = self.connections.get(connection_id) else {
            return;
        };
        if connection.player_id.is_none() {
            return;
        }

        let mut entries = Vec::new();
        let mut advanced: Vec<(String, usize)> = Vec::new();
        for id in &self.player_order {
            let Some(player) = self.players.get(id) else {
                continue;
            };
            let watermark = connection
                .last_sent_segments
                .get(id)
                .copied()
                .unwrap_or(0)
                .min(player.segments.len());
            let missing: Vec<_> = player.segments[watermark..]
                .iter()
                .map(protocol::encode_segment)
                .collect();
            if missing.is_empty() {
                continue;
            }
            entries.push(PlayerSegments {
                id: id.clone(),
                missing_segments: missing,
            });
            // stop short of the live head segment: it is still growing and
            // stays in the next send
            let head_index = player.segments.len() - 1;
            if watermark < head_index {
                advanced.push((id.clone(), head_index));
            }
        }

        if entries.is_empty() {
            if let Some(connection) = self.connections.get_mut(connection_id) {
                connection.pending_redraw = false;
            }
            return;
        }

        let sent = connection
            .outbound
            .try_send(ServerMessage::GameState(GameStatePayload { players: entries }))
            .is_ok();
        if !sent {
            // backpressure: the watermark stays put and the next tick retries
            return;
        }
        let Some(connection) = self.connections.get_mut(connection_id) else {
            return;
        };
        for (id, watermark) in advanced {
            connection.last_sent_segments.insert(id, watermark);
        }
        connection.pending_redraw = false;
    }
}
