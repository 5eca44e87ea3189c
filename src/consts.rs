use ntex_util::time::Seconds;

use crate::frame::{Reason, WindowSize};

// Constants
pub const MAX_WINDOW_SIZE: WindowSize = (1 << 31) - 1;
pub const DEFAULT_MAX_CONCURRENT_STREAMS: u32 = 100;
pub const DEFAULT_RECV_TIMEOUT: Seconds = Seconds(60);
pub const DEFAULT_SEND_TIMEOUT: Seconds = Seconds(60);
pub const DEFAULT_SETTINGS_TIMEOUT: Seconds = Seconds(10);

/// Reset reason for streams killed by a watchdog
pub const TIMEOUT_RESET_REASON: Reason = Reason::INTERNAL_ERROR;

