use super::constants::{MAX_SEGMENTS, STARTING_LENGTH};
use super::grid::Grid;
use super::types::{Cell, Direction};

/// Body for a fresh spawn facing `direction`: the head at `head` and the rest
/// trailing behind it. Returns `None` if any trailing cell would leave a
/// bounded grid.
pub fn create_snake(grid: &Grid, head: Cell, direction: Direction) -> Option<Vec<Cell>> {
  let mut body = Vec::with_capacity(STARTING_LENGTH);
  body.push(head);
  let behind = direction.reverse();
  let mut cursor = head;
  for _ in 1..STARTING_LENGTH {
    cursor = grid.step(cursor, behind)?;
    body.push(cursor);
  }
  Some(body)
}

/// Degenerate spawn used when no free run of cells exists: every segment
/// stacked on the head cell.
pub fn stacked_snake(head: Cell) -> Vec<Cell> {
  vec![head; STARTING_LENGTH]
}

/// Moves the snake so `head` becomes segment 0. Grows by one segment when
/// `grew` is set and capacity allows, otherwise the oldest tail is dropped.
pub fn advance_snake(body: &mut Vec<Cell>, head: Cell, grew: bool) {
  body.insert(0, head);
  if !grew || body.len() > MAX_SEGMENTS {
    body.pop();
  }
}

/// The pending turn is applied unless it would reverse the snake into itself.
pub fn resolve_direction(current: Direction, pending: Option<Direction>) -> Direction {
  match pending {
    Some(next) if next != current.reverse() => next,
    _ => current,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn create_snake_trails_behind_head() {
    let grid = Grid::wrap(20, 10);
    let body = create_snake(&grid, Cell::new(5, 5), Direction::Right).expect("body");
    assert_eq!(body, vec![Cell::new(5, 5), Cell::new(4, 5), Cell::new(3, 5)]);
  }

  #[test]
  fn create_snake_wraps_tail_in_wrap_world() {
    let grid = Grid::wrap(20, 10);
    let body = create_snake(&grid, Cell::new(0, 2), Direction::Right).expect("body");
    assert_eq!(body, vec![Cell::new(0, 2), Cell::new(19, 2), Cell::new(18, 2)]);
  }

  #[test]
  fn create_snake_refuses_tail_outside_bounded_world() {
    let grid = Grid::bounded(5, 5, vec![false; 25]).expect("grid");
    assert!(create_snake(&grid, Cell::new(1, 2), Direction::Right).is_none());
  }

  #[test]
  fn advance_keeps_length_without_growth() {
    let mut body = vec![Cell::new(2, 0), Cell::new(1, 0), Cell::new(0, 0)];
    advance_snake(&mut body, Cell::new(3, 0), false);
    assert_eq!(body, vec![Cell::new(3, 0), Cell::new(2, 0), Cell::new(1, 0)]);
  }

  #[test]
  fn advance_grows_by_one() {
    let mut body = vec![Cell::new(2, 0), Cell::new(1, 0), Cell::new(0, 0)];
    advance_snake(&mut body, Cell::new(3, 0), true);
    assert_eq!(body.len(), 4);
    assert_eq!(body[3], Cell::new(0, 0));
  }

  #[test]
  fn advance_never_exceeds_capacity() {
    let mut body = vec![Cell::new(0, 0); MAX_SEGMENTS];
    advance_snake(&mut body, Cell::new(1, 0), true);
    assert_eq!(body.len(), MAX_SEGMENTS);
    assert_eq!(body[0], Cell::new(1, 0));
  }

  #[test]
  fn reverse_turn_is_discarded() {
    assert_eq!(
      resolve_direction(Direction::Right, Some(Direction::Left)),
      Direction::Right
    );
    assert_eq!(
      resolve_direction(Direction::Right, Some(Direction::Up)),
      Direction::Up
    );
    assert_eq!(resolve_direction(Direction::Down, None), Direction::Down);
  }
}
