//! Process exit codes. Scripts driving the CLI depend on these values.

pub const EXIT_SUCCESS: i32 = 0;
/// The task or command ran but reported a failure (e.g. retries exhausted).
pub const EXIT_TASK_FAILED: i32 = 1;
/// Bad configuration, unreadable input or an unusable database.
pub const EXIT_CONFIG_ERROR: i32 = 2;
/// The task key could not be parsed.
pub const EXIT_INVALID_KEY: i32 = 3;
