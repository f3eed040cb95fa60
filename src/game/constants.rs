pub const MAX_PLAYERS: usize = 4;
pub const NAME_MAX: usize = 32;
pub const MAX_SEGMENTS: usize = 256;
pub const STARTING_LENGTH: usize = 3;
pub const MAX_FRUITS: usize = MAX_PLAYERS;
pub const DEFAULT_TICK_MS: u64 = 120;
pub const JOIN_FREEZE_MS: u32 = 3000;
pub const STANDARD_GRACE_MS: i64 = 10_000;
pub const MAX_SPAWN_ATTEMPTS: usize = 256;
pub const DEFAULT_WIDTH: u16 = 40;
pub const DEFAULT_HEIGHT: u16 = 20;
