//! Shared string constants for the control channel (spec §4.8/§6): "line-
//! delimited textual commands `stop` and `query`; reply for `query` is the
//! string `running`." Kept here (rather than only in `core-control`) so
//! both the server and any test harness share one definition.

pub const CMD_STOP: &str = "stop";
pub const CMD_QUERY: &str = "query";
pub const REPLY_RUNNING: &str = "running";
