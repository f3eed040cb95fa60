use crate::game::constants::{DEFAULT_HEIGHT, DEFAULT_TICK_MS, DEFAULT_WIDTH};
use crate::game::grid::{load_map, Grid};
use crate::game::room::RoomSettings;
use crate::game::types::{GameMode, WorldMode};
use anyhow::{bail, Context};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

const MIN_SIDE: u16 = 3;

/// Authoritative multiplayer snake arena server.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
  /// TCP port game clients connect to
  pub port: u16,
  /// Map file (`#` or `X` marks an obstacle), or `-` for none
  pub map: String,
  /// Game mode: standard | time | 0 | 1
  #[arg(value_parser = parse_mode)]
  pub mode: GameMode,
  /// World topology: wrap | bounded | 0 | 1
  #[arg(value_parser = parse_world)]
  pub world: WorldMode,
  /// Round length in seconds (TIME mode)
  pub time_limit: u16,
  /// Grid width when no map is used
  pub width: Option<u16>,
  /// Grid height when no map is used
  pub height: Option<u16>,
  /// Address to listen on
  #[arg(long, default_value = "0.0.0.0")]
  pub bind: IpAddr,
  /// Simulation step in milliseconds
  #[arg(long, default_value_t = DEFAULT_TICK_MS)]
  pub tick_ms: u64,
  /// Serve the HTTP scoreboard on this port
  #[arg(long)]
  pub status_port: Option<u16>,
}

/// Mode and world accept a name or their wire code.
fn parse_mode(value: &str) -> Result<GameMode, String> {
  match value.to_ascii_lowercase().as_str() {
    "standard" => Ok(GameMode::Standard),
    "time" => Ok(GameMode::Time),
    other => other
      .parse::<u8>()
      .ok()
      .and_then(GameMode::from_code)
      .ok_or_else(|| format!("unknown mode `{other}` (expected standard or time)")),
  }
}

fn parse_world(value: &str) -> Result<WorldMode, String> {
  match value.to_ascii_lowercase().as_str() {
    "wrap" => Ok(WorldMode::Wrap),
    "bounded" => Ok(WorldMode::Bounded),
    other => other
      .parse::<u8>()
      .ok()
      .and_then(WorldMode::from_code)
      .ok_or_else(|| format!("unknown world `{other}` (expected wrap or bounded)")),
  }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
  pub game_addr: SocketAddr,
  pub status_addr: Option<SocketAddr>,
  pub room: RoomSettings,
}

impl ServerConfig {
  pub fn from_args(args: Args) -> anyhow::Result<Self> {
    if args.tick_ms == 0 {
      bail!("--tick-ms must be positive");
    }
    if args.mode == GameMode::Time && args.time_limit == 0 {
      bail!("time mode needs a positive time limit");
    }

    let map = match args.map.trim() {
      "" | "-" => None,
      path => Some(PathBuf::from(path)),
    };

    let grid = match (args.world, map) {
      (WorldMode::Bounded, None) => bail!("bounded world needs a map file"),
      (WorldMode::Bounded, Some(path)) => load_map(&path)?,
      (WorldMode::Wrap, Some(path)) => {
        let mapped = load_map(&path)?;
        Grid::wrap(mapped.width(), mapped.height())
      }
      (WorldMode::Wrap, None) => Grid::wrap(
        args.width.unwrap_or(DEFAULT_WIDTH),
        args.height.unwrap_or(DEFAULT_HEIGHT),
      ),
    };
    if grid.width() < MIN_SIDE || grid.height() < MIN_SIDE {
      bail!(
        "grid {}x{} is too small (minimum {MIN_SIDE}x{MIN_SIDE})",
        grid.width(),
        grid.height()
      );
    }

    let time_limit_sec = match args.mode {
      GameMode::Time => args.time_limit,
      GameMode::Standard => 0,
    };

    Ok(Self {
      game_addr: SocketAddr::new(args.bind, args.port),
      status_addr: args
        .status_port
        .map(|port| SocketAddr::new(args.bind, port)),
      room: RoomSettings {
        grid,
        mode: args.mode,
        time_limit_sec,
        tick_ms: args.tick_ms,
      },
    })
  }

  pub fn parse() -> anyhow::Result<Self> {
    Self::from_args(Args::parse()).context("invalid launch parameters")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args(extra: &[&str]) -> Args {
    let mut argv = vec!["snake-arena-server"];
    argv.extend_from_slice(extra);
    Args::try_parse_from(argv).expect("arguments should parse")
  }

  fn write_map(contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("arena-map-{}.txt", uuid::Uuid::new_v4()));
    std::fs::write(&path, contents).unwrap();
    path
  }

  #[test]
  fn wrap_without_map_uses_defaults() {
    let config = ServerConfig::from_args(args(&["5000", "-", "standard", "wrap", "0"])).unwrap();
    assert_eq!(config.room.grid.width(), DEFAULT_WIDTH);
    assert_eq!(config.room.grid.height(), DEFAULT_HEIGHT);
    assert_eq!(config.room.tick_ms, DEFAULT_TICK_MS);
    assert_eq!(config.game_addr.port(), 5000);
    assert!(config.status_addr.is_none());
  }

  #[test]
  fn numeric_codes_and_explicit_size_are_accepted() {
    let config = ServerConfig::from_args(args(&[
      "5000", "-", "1", "0", "90", "30", "12", "--tick-ms", "80", "--status-port", "8080",
    ]))
    .unwrap();
    assert_eq!(config.room.mode, GameMode::Time);
    assert_eq!(config.room.time_limit_sec, 90);
    assert_eq!((config.room.grid.width(), config.room.grid.height()), (30, 12));
    assert_eq!(config.room.tick_ms, 80);
    assert_eq!(config.status_addr.map(|addr| addr.port()), Some(8080));
  }

  #[test]
  fn bounded_world_requires_map() {
    let error = ServerConfig::from_args(args(&["5000", "-", "standard", "bounded", "0"]))
      .unwrap_err();
    assert!(error.to_string().contains("map"));
  }

  #[test]
  fn bounded_world_loads_obstacles_from_map() {
    let path = write_map("#####\n#...#\n#...#\n#####\n");
    let config = ServerConfig::from_args(args(&[
      "5000",
      path.to_str().unwrap(),
      "standard",
      "bounded",
      "0",
    ]))
    .unwrap();
    let _ = std::fs::remove_file(&path);

    let grid = &config.room.grid;
    assert_eq!(grid.world(), WorldMode::Bounded);
    assert_eq!((grid.width(), grid.height()), (5, 4));
    assert!(grid.is_obstacle(crate::game::types::Cell::new(0, 0)));
    assert!(!grid.is_obstacle(crate::game::types::Cell::new(2, 1)));
  }

  #[test]
  fn wrap_world_takes_map_dimensions_but_no_obstacles() {
    let path = write_map("#######\n#.....#\n#######\n");
    let config =
      ServerConfig::from_args(args(&["5000", path.to_str().unwrap(), "standard", "wrap", "0"]))
        .unwrap();
    let _ = std::fs::remove_file(&path);

    let grid = &config.room.grid;
    assert_eq!(grid.world(), WorldMode::Wrap);
    assert_eq!((grid.width(), grid.height()), (7, 3));
    assert!(grid.obstacle_bytes().iter().all(|byte| *byte == 0));
  }

  #[test]
  fn empty_map_refuses_to_start() {
    let path = write_map("\n\n");
    let result =
      ServerConfig::from_args(args(&["5000", path.to_str().unwrap(), "standard", "bounded", "0"]));
    let _ = std::fs::remove_file(&path);
    assert!(result.is_err());
  }

  #[test]
  fn time_mode_requires_limit() {
    assert!(ServerConfig::from_args(args(&["5000", "-", "time", "wrap", "0"])).is_err());
  }

  #[test]
  fn unknown_mode_is_a_parse_error() {
    let argv = ["snake-arena-server", "5000", "-", "sprint", "wrap", "0"];
    assert!(Args::try_parse_from(argv).is_err());
    let argv = ["snake-arena-server", "5000", "-", "0", "2", "0"];
    assert!(Args::try_parse_from(argv).is_err());
  }

  #[test]
  fn tiny_grid_is_rejected() {
    assert!(ServerConfig::from_args(args(&["5000", "-", "standard", "wrap", "0", "2", "2"])).is_err());
  }
}
