use super::constants::NAME_MAX;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cell {
  pub x: u16,
  pub y: u16,
}

impl Cell {
  pub const fn new(x: u16, y: u16) -> Self {
    Self { x, y }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
  Up,
  #[default]
  Right,
  Down,
  Left,
}

impl Direction {
  pub fn from_code(code: u8) -> Option<Self> {
    match code {
      0 => Some(Direction::Up),
      1 => Some(Direction::Right),
      2 => Some(Direction::Down),
      3 => Some(Direction::Left),
      _ => None,
    }
  }

  pub fn code(self) -> u8 {
    match self {
      Direction::Up => 0,
      Direction::Right => 1,
      Direction::Down => 2,
      Direction::Left => 3,
    }
  }

  pub fn reverse(self) -> Self {
    match self {
      Direction::Up => Direction::Down,
      Direction::Right => Direction::Left,
      Direction::Down => Direction::Up,
      Direction::Left => Direction::Right,
    }
  }

  pub fn delta(self) -> (i32, i32) {
    match self {
      Direction::Up => (0, -1),
      Direction::Right => (1, 0),
      Direction::Down => (0, 1),
      Direction::Left => (-1, 0),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
  Standard,
  Time,
}

impl GameMode {
  pub fn code(self) -> u8 {
    match self {
      GameMode::Standard => 0,
      GameMode::Time => 1,
    }
  }

  pub fn from_code(code: u8) -> Option<Self> {
    match code {
      0 => Some(GameMode::Standard),
      1 => Some(GameMode::Time),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldMode {
  Wrap,
  Bounded,
}

impl WorldMode {
  pub fn code(self) -> u8 {
    match self {
      WorldMode::Wrap => 0,
      WorldMode::Bounded => 1,
    }
  }

  pub fn from_code(code: u8) -> Option<Self> {
    match code {
      0 => Some(WorldMode::Wrap),
      1 => Some(WorldMode::Bounded),
      _ => None,
    }
  }
}

/// Fixed-width, NUL-padded player name. Comparison is byte-exact, so two
/// names that only differ past `NAME_MAX` bytes are the same player.
pub type NameBuf = [u8; NAME_MAX];

#[derive(Debug, Clone)]
pub struct Player {
  pub name: NameBuf,
  pub used: bool,
  pub connected: bool,
  pub ready: bool,
  pub active: bool,
  pub alive: bool,
  pub paused: bool,
  pub direction: Direction,
  pub pending_direction: Option<Direction>,
  pub score: u32,
  pub body: Vec<Cell>,
  pub spawn_time: i64,
  pub final_survival_ms: Option<i64>,
}

impl Player {
  pub fn vacant() -> Self {
    Self {
      name: [0u8; NAME_MAX],
      used: false,
      connected: false,
      ready: false,
      active: false,
      alive: false,
      paused: false,
      direction: Direction::Right,
      pending_direction: None,
      score: 0,
      body: Vec::new(),
      spawn_time: 0,
      final_survival_ms: None,
    }
  }

  pub fn is_playing(&self) -> bool {
    self.used && self.active && self.alive
  }

  pub fn head(&self) -> Option<Cell> {
    self.body.first().copied()
  }

  /// Marks the player dead and freezes the survival clock. The first
  /// recorded duration is never overwritten.
  pub fn kill(&mut self, now: i64) {
    self.freeze_survival(now);
    self.alive = false;
  }

  pub fn freeze_survival(&mut self, now: i64) {
    if self.final_survival_ms.is_none() {
      self.final_survival_ms = Some((now - self.spawn_time).max(0));
    }
  }

  pub fn survival_ms(&self, now: i64) -> i64 {
    match self.final_survival_ms {
      Some(frozen) => frozen,
      None if self.alive => (now - self.spawn_time).max(0),
      None => 0,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreboardEntry {
  pub id: u8,
  pub name: String,
  pub connected: bool,
  pub alive: bool,
  pub score: u32,
  #[serde(rename = "survivalMs")]
  pub survival_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Scoreboard {
  #[serde(rename = "gameOver")]
  pub game_over: bool,
  #[serde(rename = "elapsedSec")]
  pub elapsed_sec: u32,
  pub players: Vec<ScoreboardEntry>,
}
