//! Structured logging setup.
//!
//! Call [`init`] once at bootstrap; log levels come from `RUST_LOG` with an
//! `info` default. Server-provided strings go through [`sanitize_for_log`]
//! before being logged so embedded control characters cannot forge entries.

use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize the tracing subscriber. Safe to call more than once; only the
/// first call installs anything.
pub fn init() {
    INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    });
}

/// Escape control characters so remote strings are safe to log on one line.
///
/// Server-provided messages pass through this before reaching a log call;
/// a newline or ANSI escape embedded in one could otherwise forge entries.
pub fn sanitize_for_log(s: &str) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
