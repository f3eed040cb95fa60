use super::types::{Cell, Direction, WorldMode};
use anyhow::{bail, Context};
use std::path::Path;

/// Immutable playfield. Obstacles are stored row-major and are always empty
/// in `WorldMode::Wrap`.
#[derive(Debug, Clone)]
pub struct Grid {
  width: u16,
  height: u16,
  world: WorldMode,
  obstacles: Vec<bool>,
}

impl Grid {
  pub fn wrap(width: u16, height: u16) -> Self {
    Self {
      width,
      height,
      world: WorldMode::Wrap,
      obstacles: vec![false; width as usize * height as usize],
    }
  }

  pub fn bounded(width: u16, height: u16, obstacles: Vec<bool>) -> anyhow::Result<Self> {
    let expected = width as usize * height as usize;
    if obstacles.len() != expected {
      bail!(
        "obstacle grid has {} cells, expected {}x{}={}",
        obstacles.len(),
        width,
        height,
        expected
      );
    }
    Ok(Self {
      width,
      height,
      world: WorldMode::Bounded,
      obstacles,
    })
  }

  pub fn width(&self) -> u16 {
    self.width
  }

  pub fn height(&self) -> u16 {
    self.height
  }

  pub fn world(&self) -> WorldMode {
    self.world
  }

  pub fn cell_count(&self) -> usize {
    self.width as usize * self.height as usize
  }

  pub fn in_bounds(&self, x: i32, y: i32) -> bool {
    x >= 0 && y >= 0 && x < self.width as i32 && y < self.height as i32
  }

  pub fn is_obstacle(&self, cell: Cell) -> bool {
    if cell.x >= self.width || cell.y >= self.height {
      return true;
    }
    self.obstacles[cell.y as usize * self.width as usize + cell.x as usize]
  }

  /// Next cell one step in `direction`. `None` means the move leaves a
  /// bounded world; wrapping worlds never return `None`.
  pub fn step(&self, cell: Cell, direction: Direction) -> Option<Cell> {
    let (dx, dy) = direction.delta();
    let x = cell.x as i32 + dx;
    let y = cell.y as i32 + dy;
    match self.world {
      WorldMode::Wrap => Some(Cell::new(
        x.rem_euclid(self.width as i32) as u16,
        y.rem_euclid(self.height as i32) as u16,
      )),
      WorldMode::Bounded => {
        if self.in_bounds(x, y) {
          Some(Cell::new(x as u16, y as u16))
        } else {
          None
        }
      }
    }
  }

  pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
    (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Cell::new(x, y)))
  }

  /// One byte per cell, row-major, 1 = obstacle.
  pub fn obstacle_bytes(&self) -> Vec<u8> {
    self.obstacles.iter().map(|blocked| u8::from(*blocked)).collect()
  }
}

/// Parses a text map: `#` or `X` is an obstacle, anything else is free.
/// Short rows are padded with free cells up to the longest row.
pub fn parse_map(text: &str) -> anyhow::Result<(u16, u16, Vec<bool>)> {
  let mut rows: Vec<&str> = text.lines().map(|line| line.trim_end_matches('\r')).collect();
  while rows.last().is_some_and(|row| row.trim().is_empty()) {
    rows.pop();
  }
  if rows.is_empty() {
    bail!("map is empty");
  }

  let width = rows.iter().map(|row| row.chars().count()).max().unwrap_or(0);
  if width == 0 {
    bail!("map has no columns");
  }
  if width > u16::MAX as usize || rows.len() > u16::MAX as usize {
    bail!("map is too large ({}x{})", width, rows.len());
  }

  let mut obstacles = Vec::with_capacity(width * rows.len());
  for row in &rows {
    let mut count = 0;
    for ch in row.chars() {
      obstacles.push(matches!(ch, '#' | 'X'));
      count += 1;
    }
    obstacles.extend(std::iter::repeat(false).take(width - count));
  }

  Ok((width as u16, rows.len() as u16, obstacles))
}

pub fn load_map(path: &Path) -> anyhow::Result<Grid> {
  let text = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read map file {}", path.display()))?;
  let (width, height, obstacles) =
    parse_map(&text).with_context(|| format!("invalid map file {}", path.display()))?;
  Grid::bounded(width, height, obstacles)
}
