mod fruit;
pub mod session;

use super::constants::{JOIN_FREEZE_MS, MAX_PLAYERS, STANDARD_GRACE_MS};
use super::grid::Grid;
use super::snake::{advance_snake, resolve_direction};
use super::types::{
  Cell, Direction, GameMode, NameBuf, Player, Scoreboard, ScoreboardEntry, WorldMode,
};
use crate::app::time::now_millis;
use crate::protocol::{self, ConfigPayload, PlayerView, StateView};
use crate::shared::names::display_name;
use session::SessionOutbound;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RoomSettings {
  pub grid: Grid,
  pub mode: GameMode,
  pub time_limit_sec: u16,
  pub tick_ms: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
  #[error("a live session already uses this name")]
  DuplicateSession,
  #[error("all player slots are taken")]
  RoomFull,
  #[error("the game is over")]
  GameOver,
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
  pub slot: usize,
  pub reattached: bool,
  pub config: ConfigPayload,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
  pub ticked: bool,
  pub finished: bool,
}

/// Shared game store. Every read and write of slots, fruits and timers goes
/// through the one lock.
#[derive(Debug)]
pub struct Room {
  state: Mutex<RoomState>,
}

#[derive(Debug)]
struct SessionEntry {
  connection: Uuid,
  outbound: Option<Arc<SessionOutbound>>,
  /// New slot whose handshake has not completed yet.
  unconfirmed: bool,
}

#[derive(Debug)]
struct RoomState {
  grid: Grid,
  mode: GameMode,
  time_limit_sec: u16,
  tick_ms: u64,
  players: Vec<Player>,
  sessions: Vec<Option<SessionEntry>>,
  fruits: Vec<Cell>,
  freeze_ms: u32,
  game_over: bool,
  started_at: i64,
  tick_count: u64,
  grace_armed: bool,
  empty_since: Option<i64>,
}

impl Room {
  pub fn new(settings: RoomSettings) -> Self {
    Self {
      state: Mutex::new(RoomState::new(settings, now_millis())),
    }
  }

  pub async fn join(&self, name: NameBuf, connection: Uuid) -> Result<JoinOutcome, JoinError> {
    let mut state = self.state.lock().await;
    state.join(name, connection, now_millis())
  }

  pub async fn mark_ready(
    &self,
    slot: usize,
    connection: Uuid,
    outbound: Arc<SessionOutbound>,
  ) -> bool {
    let mut state = self.state.lock().await;
    state.mark_ready(slot, connection, outbound)
  }

  pub async fn apply_input(&self, slot: usize, connection: Uuid, direction: Direction) {
    let mut state = self.state.lock().await;
    state.apply_input(slot, connection, direction);
  }

  pub async fn toggle_pause(&self, slot: usize, connection: Uuid) {
    let mut state = self.state.lock().await;
    state.toggle_pause(slot, connection);
  }

  pub async fn leave(&self, slot: usize, connection: Uuid) {
    let mut state = self.state.lock().await;
    state.leave(slot, connection, now_millis());
  }

  pub async fn disconnect(&self, slot: usize, connection: Uuid) {
    let mut state = self.state.lock().await;
    state.disconnect(slot, connection);
  }

  /// Runs one simulation step and hands the resulting snapshot to every
  /// ready session. Sends happen on the sessions' writer tasks, never here.
  pub async fn step(&self, dt_ms: u32) -> TickReport {
    let mut state = self.state.lock().await;
    let now = now_millis();
    let report = state.tick(dt_ms, now);
    if !report.ticked {
      return report;
    }
    let payload = state.build_state_payload(now);
    state.broadcast_state(payload);
    if report.finished {
      state.close_sessions();
    }
    report
  }

  #[cfg(test)]
  pub async fn is_game_over(&self) -> bool {
    self.state.lock().await.game_over
  }

  pub async fn scoreboard(&self) -> Scoreboard {
    self.state.lock().await.scoreboard(now_millis())
  }
}

impl RoomState {
  fn new(settings: RoomSettings, now: i64) -> Self {
    Self {
      grid: settings.grid,
      mode: settings.mode,
      time_limit_sec: settings.time_limit_sec,
      tick_ms: settings.tick_ms,
      players: (0..MAX_PLAYERS).map(|_| Player::vacant()).collect(),
      sessions: (0..MAX_PLAYERS).map(|_| None).collect(),
      fruits: Vec::new(),
      freeze_ms: 0,
      game_over: false,
      started_at: now,
      tick_count: 0,
      grace_armed: false,
      empty_since: None,
    }
  }

  fn find_by_name(&self, name: &NameBuf) -> Option<usize> {
    self.players
      .iter()
      .position(|player| player.used && player.name == *name)
  }

  fn is_bound(&self, slot: usize, connection: Uuid) -> bool {
    matches!(
      self.sessions.get(slot),
      Some(Some(entry)) if entry.connection == connection
    )
  }

  fn join(&mut self, name: NameBuf, connection: Uuid, now: i64) -> Result<JoinOutcome, JoinError> {
    if self.game_over {
      return Err(JoinError::GameOver);
    }

    let (slot, reattached) = match self.find_by_name(&name) {
      Some(slot) => {
        if self.players[slot].connected {
          return Err(JoinError::DuplicateSession);
        }
        if self.players[slot].alive {
          let player = &mut self.players[slot];
          player.active = true;
        } else {
          self.respawn_player(slot, now);
        }
        (slot, true)
      }
      None => {
        let slot = self
          .players
          .iter()
          .position(|player| !player.used)
          .ok_or(JoinError::RoomFull)?;
        let mut player = Player::vacant();
        player.name = name;
        player.used = true;
        self.players[slot] = player;
        self.respawn_player(slot, now);
        (slot, false)
      }
    };

    let player = &mut self.players[slot];
    player.connected = true;
    player.ready = false;
    self.sessions[slot] = Some(SessionEntry {
      connection,
      outbound: None,
      unconfirmed: !reattached,
    });
    self.freeze_ms = JOIN_FREEZE_MS;
    self.grace_armed = true;
    self.empty_since = None;
    self.reconcile_fruits();

    tracing::info!(
      slot,
      name = %display_name(&name),
      reattached,
      score = self.players[slot].score,
      "player joined"
    );

    Ok(JoinOutcome {
      slot,
      reattached,
      config: self.config_payload(),
    })
  }

  /// Fresh body at a free spawn; the score survives.
  fn respawn_player(&mut self, slot: usize, now: i64) {
    let (body, direction) = self.pick_spawn();
    let player = &mut self.players[slot];
    player.body = body;
    player.direction = direction;
    player.pending_direction = None;
    player.paused = false;
    player.active = true;
    player.alive = true;
    player.spawn_time = now;
    player.final_survival_ms = None;
  }

  fn mark_ready(&mut self, slot: usize, connection: Uuid, outbound: Arc<SessionOutbound>) -> bool {
    if !self.is_bound(slot, connection) {
      return false;
    }
    if let Some(Some(entry)) = self.sessions.get_mut(slot) {
      entry.outbound = Some(outbound);
      entry.unconfirmed = false;
    }
    self.players[slot].ready = true;
    true
  }

  fn apply_input(&mut self, slot: usize, connection: Uuid, direction: Direction) {
    if self.game_over || !self.is_bound(slot, connection) {
      return;
    }
    let player = &mut self.players[slot];
    if !player.is_playing() {
      return;
    }
    player.pending_direction = Some(direction);
  }

  fn toggle_pause(&mut self, slot: usize, connection: Uuid) {
    if self.game_over || !self.is_bound(slot, connection) {
      return;
    }
    let player = &mut self.players[slot];
    if !player.used || !player.active {
      return;
    }
    player.paused = !player.paused;
    let paused = player.paused;
    if !paused {
      self.freeze_ms = JOIN_FREEZE_MS;
    }
    tracing::debug!(slot, paused, "pause toggled");
  }

  fn leave(&mut self, slot: usize, connection: Uuid, now: i64) {
    if self.game_over || !self.is_bound(slot, connection) {
      return;
    }
    let player = &mut self.players[slot];
    if player.alive {
      player.kill(now);
    }
    player.active = false;
    player.paused = false;
    player.pending_direction = None;
    self.reconcile_fruits();
    tracing::info!(slot, "player left");
  }

  fn disconnect(&mut self, slot: usize, connection: Uuid) {
    if !self.is_bound(slot, connection) {
      return;
    }
    let unconfirmed = self.sessions[slot]
      .take()
      .is_some_and(|entry| entry.unconfirmed);
    let player = &mut self.players[slot];
    player.connected = false;
    player.ready = false;
    if player.active && !unconfirmed {
      tracing::info!(slot, "player disconnected, slot kept for reattachment");
      return;
    }
    tracing::info!(slot, name = %display_name(&player.name), "slot vacated");
    self.players[slot] = Player::vacant();
    self.reconcile_fruits();
  }

  fn occupied_by_snake(&self, cell: Cell) -> bool {
    self.players
      .iter()
      .filter(|player| player.used && player.alive)
      .any(|player| player.body.contains(&cell))
  }

  fn tick(&mut self, dt_ms: u32, now: i64) -> TickReport {
    if self.game_over {
      return TickReport::default();
    }
    self.tick_count += 1;

    // The freeze holds movement only; round deadlines keep running.
    if self.freeze_ms > 0 {
      self.freeze_ms = self.freeze_ms.saturating_sub(dt_ms);
      return TickReport {
        ticked: true,
        finished: self.check_end(now),
      };
    }

    for slot in 0..MAX_PLAYERS {
      self.move_player(slot, now);
    }

    self.reconcile_fruits();

    let finished = self.check_end(now);
    TickReport {
      ticked: true,
      finished,
    }
  }

  fn move_player(&mut self, slot: usize, now: i64) {
    let player = &mut self.players[slot];
    if !player.is_playing() || player.paused {
      return;
    }
    player.direction = resolve_direction(player.direction, player.pending_direction.take());
    let direction = player.direction;
    let Some(head) = player.head() else { return };

    let next = match self.grid.step(head, direction) {
      Some(next) if self.grid.world() == WorldMode::Wrap || !self.grid.is_obstacle(next) => next,
      _ => {
        self.handle_death(slot, now, "wall");
        return;
      }
    };

    if self.occupied_by_snake(next) {
      self.handle_death(slot, now, "snake");
      return;
    }

    let grew = match self.fruits.iter().position(|fruit| *fruit == next) {
      Some(index) => {
        self.fruits.remove(index);
        let relocated = self.free_cell(Some(next));
        self.fruits.insert(index, relocated);
        true
      }
      None => false,
    };

    let player = &mut self.players[slot];
    if grew {
      player.score = player.score.saturating_add(1);
    }
    advance_snake(&mut player.body, next, grew);
  }

  fn handle_death(&mut self, slot: usize, now: i64, cause: &'static str) {
    let player = &mut self.players[slot];
    player.kill(now);
    tracing::debug!(slot, cause, score = player.score, "player died");
  }

  fn any_present(&self) -> bool {
    self.players
      .iter()
      .any(|player| player.connected && player.is_playing())
  }

  fn elapsed_ms(&self, now: i64) -> i64 {
    (now - self.started_at).max(0)
  }

  fn check_end(&mut self, now: i64) -> bool {
    let ended = match self.mode {
      GameMode::Time => self.elapsed_ms(now) >= self.time_limit_sec as i64 * 1000,
      GameMode::Standard => {
        if self.any_present() {
          self.empty_since = None;
          false
        } else if !self.grace_armed {
          false
        } else {
          let since = *self.empty_since.get_or_insert(now);
          now - since >= STANDARD_GRACE_MS
        }
      }
    };
    if ended {
      self.finish(now);
    }
    ended
  }

  fn finish(&mut self, now: i64) {
    for player in self.players.iter_mut().filter(|player| player.used && player.alive) {
      player.freeze_survival(now);
    }
    self.game_over = true;
    tracing::info!(
      elapsed_ms = self.elapsed_ms(now),
      ticks = self.tick_count,
      "game over"
    );
  }

  fn time_left_sec(&self, now: i64) -> u16 {
    match self.mode {
      GameMode::Time => {
        let left = self.time_limit_sec as i64 - self.elapsed_ms(now) / 1000;
        left.clamp(0, u16::MAX as i64) as u16
      }
      GameMode::Standard => 0,
    }
  }

  fn config_payload(&self) -> ConfigPayload {
    ConfigPayload {
      width: self.grid.width(),
      height: self.grid.height(),
      mode: self.mode,
      world: self.grid.world(),
      time_limit_sec: self.time_limit_sec,
      obstacles: self.grid.obstacle_bytes(),
    }
  }

  fn state_view(&self, now: i64) -> StateView {
    let players = self
      .players
      .iter()
      .enumerate()
      .map(|(slot, player)| PlayerView {
        id: slot as u8,
        used: player.used,
        connected: player.connected,
        active: player.active,
        alive: player.alive,
        paused: player.paused,
        name: player.name,
        score: player.score,
        survival_ms: player.survival_ms(now).clamp(0, u32::MAX as i64) as u32,
        direction: player.direction,
        body: player.body.clone(),
      })
      .collect();

    StateView {
      tick_ms: self.tick_ms.min(u16::MAX as u64) as u16,
      game_over: self.game_over,
      mode: self.mode,
      world: self.grid.world(),
      width: self.grid.width(),
      height: self.grid.height(),
      time_left_sec: self.time_left_sec(now),
      freeze_ms: self.freeze_ms,
      elapsed_sec: (self.elapsed_ms(now) / 1000).clamp(0, u32::MAX as i64) as u32,
      players,
      fruits: self.fruits.clone(),
    }
  }

  fn build_state_payload(&self, now: i64) -> Vec<u8> {
    protocol::encode_state(&self.state_view(now))
  }

  fn ready_outbounds(&self) -> impl Iterator<Item = &Arc<SessionOutbound>> + '_ {
    self.players
      .iter()
      .zip(self.sessions.iter())
      .filter(|(player, _)| player.used && player.connected && player.ready)
      .filter_map(|(_, entry)| entry.as_ref()?.outbound.as_ref())
  }

  fn broadcast_state(&self, payload: Vec<u8>) {
    for outbound in self.ready_outbounds() {
      outbound.push_state(payload.clone());
    }
  }

  fn close_sessions(&self) {
    let bye = protocol::encode_empty(protocol::TYPE_BYE);
    for outbound in self.ready_outbounds() {
      outbound.push_control(bye.clone());
      outbound.close();
    }
  }

  fn scoreboard(&self, now: i64) -> Scoreboard {
    let players = self
      .players
      .iter()
      .enumerate()
      .filter(|(_, player)| player.used)
      .map(|(slot, player)| ScoreboardEntry {
        id: slot as u8,
        name: display_name(&player.name),
        connected: player.connected,
        alive: player.alive,
        score: player.score,
        survival_ms: player.survival_ms(now),
      })
      .collect();
    Scoreboard {
      game_over: self.game_over,
      elapsed_sec: (self.elapsed_ms(now) / 1000).clamp(0, u32::MAX as i64) as u32,
      players,
    }
  }
}
