pub const ASPECT_RATIO: f64 = 1.5;
pub const LINE_WIDTH: f64 = 0.002;
pub const MOVE_SPEED: f64 = 0.3;
pub const TICK_RATE: u64 = 30;
pub const SUB_TICK_RATE: u64 = 2;
pub const TICK_MS: u64 = 1000 / TICK_RATE;
pub const SUB_TICK_MS: f64 = 1000.0 / (TICK_RATE * SUB_TICK_RATE) as f64;
pub const NUM_PARTITIONS: usize = 10;
pub const MIN_SPAWN_DIST: f64 = 0.1;
pub const MIN_ROUND_PLAYERS: usize = 2;
pub const ROUND_START_DELAY_MS: i64 = 3000;
pub const SESSION_TIMEOUT_MS: i64 = 3000;
pub const HEARTBEAT_INTERVAL_MS: i64 = 1000;
pub const OUTBOUND_CAPACITY: usize = 64;

pub const COLOR_POOL: [[f64; 3]; 8] = [
  [1.0, 0.42, 0.42],
  [1.0, 0.82, 0.4],
  [0.02, 0.84, 0.63],
  [0.3, 0.67, 0.97],
  [0.94, 0.4, 0.58],
  [0.52, 0.37, 0.97],
  [0.13, 0.79, 0.59],
  [0.99, 0.77, 0.1],
];
