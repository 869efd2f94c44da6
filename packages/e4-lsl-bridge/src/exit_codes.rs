pub const SUCCESS: i32 = 0;
pub const INPUT_ERROR: i32 = 2;
pub const CONNECT_ERROR: i32 = 3;
pub const RECONNECT_EXHAUSTED: i32 = 4;
pub const SINK_ERROR: i32 = 5;
