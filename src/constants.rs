use std::time::Duration;

pub const USER_AGENT: &str = concat!("HoyoCodeNotifier/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_CODES_API_BASE: &str = "https://api.ennead.cc/mihoyo";
pub const DEFAULT_CONFIG_PATH: &str = "data/config.json";
pub const DEFAULT_CODES_PATH: &str = "data/sent_codes.json";
pub const DEFAULT_SERVER_PORT: u16 = 5000;

pub const SOURCE_TIMEOUT: Duration = Duration::from_secs(10);
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
pub const STATS_TIMEOUT: Duration = Duration::from_secs(5);

// courtesy pauses towards the webhook host and the code source
pub const BETWEEN_POSTS_DELAY: Duration = Duration::from_millis(500);
pub const BETWEEN_CODES_DELAY: Duration = Duration::from_secs(2);

pub const DEFAULT_CHECK_INTERVAL: u64 = 300;
pub const MIN_CHECK_INTERVAL: u64 = 60;
pub const DEFAULT_TIMEZONE: &str = "UTC";

pub const EMBED_FOOTER: &str = "HoYo Code Notifier";
pub const TEST_EMBED_COLOR: u32 = 0x2ECC71;
