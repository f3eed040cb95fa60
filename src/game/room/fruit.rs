use super::RoomState;
use crate::game::constants::{MAX_FRUITS, MAX_SPAWN_ATTEMPTS};
use crate::game::snake::{create_snake, stacked_snake};
use crate::game::types::{Cell, Direction};
use rand::Rng;

const SPAWN_DIRECTIONS: [Direction; 4] = [
  Direction::Right,
  Direction::Down,
  Direction::Left,
  Direction::Up,
];

impl RoomState {
  pub(super) fn target_fruit_count(&self) -> usize {
    self.players
      .iter()
      .filter(|player| player.is_playing())
      .count()
      .min(MAX_FRUITS)
  }

  /// Spawns or despawns fruit until there is one per playing snake.
  pub(super) fn reconcile_fruits(&mut self) {
    let target = self.target_fruit_count();
    self.fruits.truncate(target);
    while self.fruits.len() < target {
      let cell = self.free_cell(None);
      self.fruits.push(cell);
    }
  }

  fn is_walkable(&self, cell: Cell) -> bool {
    !self.grid.is_obstacle(cell) && !self.occupied_by_snake(cell)
  }

  fn is_free(&self, cell: Cell, reserved: Option<Cell>) -> bool {
    Some(cell) != reserved && self.is_walkable(cell) && !self.fruits.contains(&cell)
  }

  /// Uniform sample over free cells, then a row-major scan, then `(0,0)`.
  pub(super) fn free_cell(&self, reserved: Option<Cell>) -> Cell {
    if self.grid.cell_count() > 0 {
      let mut rng = rand::thread_rng();
      for _ in 0..MAX_SPAWN_ATTEMPTS {
        let cell = Cell::new(
          rng.gen_range(0..self.grid.width()),
          rng.gen_range(0..self.grid.height()),
        );
        if self.is_free(cell, reserved) {
          return cell;
        }
      }
    }

    self.grid
      .cells()
      .find(|cell| self.is_free(*cell, reserved))
      .unwrap_or_default()
  }

  fn spawn_fits(&self, body: &[Cell]) -> bool {
    body.iter().all(|cell| self.is_walkable(*cell))
  }

  /// Picks a starting body and heading for a (re)spawning snake.
  pub(super) fn pick_spawn(&self) -> (Vec<Cell>, Direction) {
    if self.grid.cell_count() > 0 {
      let mut rng = rand::thread_rng();
      for _ in 0..MAX_SPAWN_ATTEMPTS {
        let head = Cell::new(
          rng.gen_range(0..self.grid.width()),
          rng.gen_range(0..self.grid.height()),
        );
        let direction = SPAWN_DIRECTIONS[rng.gen_range(0..SPAWN_DIRECTIONS.len())];
        if let Some(body) = create_snake(&self.grid, head, direction) {
          if self.spawn_fits(&body) {
            return (body, direction);
          }
        }
      }
    }

    for head in self.grid.cells() {
      for direction in SPAWN_DIRECTIONS {
        if let Some(body) = create_snake(&self.grid, head, direction) {
          if self.spawn_fits(&body) {
            return (body, direction);
          }
        }
      }
    }

    let head = self
      .grid
      .cells()
      .find(|cell| self.is_walkable(*cell))
      .unwrap_or_default();
    tracing::warn!(?head, "no room for a full spawn, stacking segments");
    (stacked_snake(head), Direction::Right)
  }
}
