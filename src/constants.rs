//! Shared constants used across the application.

/// User agent string sent with every request to the remote daemon and media hosts.
pub const ARCHIVER_USER_AGENT: &str = concat!("tieba-thread-archiver/", env!("CARGO_PKG_VERSION"));

/// Interim status line some upstream media hosts leak into the start of a body chunk.
///
/// Exactly 23 bytes; never part of the payload.
pub const FRAMING_MARKER: &[u8; 23] = b"HTTP/1.1 100 Continue\r\n";

/// Public permalink of a thread, followed by the thread id.
pub const THREAD_URL_BASE: &str = "https://tieba.baidu.com/p/";

/// Forum landing page, followed by the url-encoded forum name.
pub const FORUM_URL_BASE: &str = "https://tieba.baidu.com/f?kw=";

/// User home page, followed by the portrait id.
pub const PROFILE_URL_BASE: &str = "https://tieba.baidu.com/home/main?id=";

/// Mirror of the mobile client's emoticon set, followed by `<code>.png`.
pub const EMOTICON_URL_BASE: &str =
    "https://cdn.jsdelivr.net/gh/microlong666/tieba_mobile_emotions/";

/// Status the remote daemon answers on its bare base URL.
pub const DAEMON_PREFLIGHT_STATUS: u16 = 422;
