#![forbid(unsafe_code)]

//! Canonical video identifier handling.
//!
//! Users paste whatever their browser shows them: a bare ID, a `watch?v=`
//! URL, a `youtu.be` short link, or an embed URL. Everything downstream
//! works with the 11-character canonical ID only.

use std::sync::OnceLock;
#[cfg(test)]
use std::sync::{Mutex, MutexGuard};

use regex::Regex;

#[cfg(test)]
static WATCH_BASE_STUB: Mutex<Option<String>> = Mutex::new(None);
#[cfg(test)]
static STUB_USE_LOCK: Mutex<()> = Mutex::new(());

#[cfg(test)]
pub(crate) fn set_watch_base_stub(base: &str) -> WatchBaseGuard {
    let guard = STUB_USE_LOCK.lock().unwrap();
    {
        let mut lock = WATCH_BASE_STUB.lock().unwrap();
        *lock = Some(base.to_owned());
    }
    WatchBaseGuard { lock: Some(guard) }
}

#[cfg(test)]
pub(crate) struct WatchBaseGuard {
    lock: Option<MutexGuard<'static, ()>>,
}

#[cfg(test)]
impl Drop for WatchBaseGuard {
    fn drop(&mut self) {
        *WATCH_BASE_STUB.lock().unwrap() = None;
        self.lock.take();
    }
}

/// Ordered URL shapes we accept. First capture wins.
fn url_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"youtube\.com/watch\?v=([A-Za-z0-9_-]{11})",
            r"youtu\.be/([A-Za-z0-9_-]{11})",
            r"youtube\.com/embed/([A-Za-z0-9_-]{11})",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("static pattern compiles"))
        .collect()
    })
}

/// Extracts the canonical video ID from a URL, or returns the input
/// unchanged when no known shape matches. Unrecognized strings are passed
/// through so the resolver can reject them with a proper upstream error.
pub fn normalize(input: &str) -> String {
    for pattern in url_patterns() {
        if let Some(captures) = pattern.captures(input) {
            return captures[1].to_owned();
        }
    }
    input.to_owned()
}

/// Renders the canonical watch URL for a video ID. Derived, never fetched.
pub fn watch_url(video_id: &str) -> String {
    #[cfg(test)]
    {
        if let Some(base) = WATCH_BASE_STUB.lock().unwrap().clone() {
            return format!("{base}/watch?v={video_id}");
        }
    }
    format!("https://www.youtube.com/watch?v={video_id}")
}
