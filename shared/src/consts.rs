pub const PARAM_LOGIN: &str = "gbLogin";
pub const PARAM_TIME: &str = "gbTime";
pub const PARAM_TOKEN: &str = "gbToken";

/// Allowed distance between the client's and the receiver's clocks, in seconds.
pub const MAX_CLIENT_TIME_DIFF: u64 = 43200;
