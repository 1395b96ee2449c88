#![deny(missing_docs)]
//! Shared logging utilities for the migration workspace.
//!
//! This crate provides the `migration_*` logging macros used across the
//! codebase, a per-thread page label that prefixes messages while a page is
//! being processed, and a minimal test initializer for the global logger.

use std::cell::RefCell;

#[doc(hidden)]
pub use log;

thread_local! {
    /// Label of the page currently processed on this thread, if any.
    static CURRENT_PAGE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Sets the page label for the current thread.
///
/// Passing `None` clears it. Prefer [`PageScope`] so the label is cleared
/// even when processing bails out early.
pub fn set_current_page(label: Option<&str>) {
    CURRENT_PAGE.with(|slot| *slot.borrow_mut() = label.map(str::to_string));
}

/// Retrieves the page label for the current thread.
pub fn current_page() -> Option<String> {
    CURRENT_PAGE.with(|slot| slot.borrow().clone())
}

/// Returns the prefix prepended by the logging macros: `"[label] "` or empty.
pub fn page_prefix() -> String {
    CURRENT_PAGE.with(|slot| match slot.borrow().as_deref() {
        Some(label) => format!("[{label}] "),
        None => String::new(),
    })
}

/// Guard that labels log output with a page until dropped.
///
/// The previous label is restored on drop, so scopes may nest.
pub struct PageScope {
    previous: Option<String>,
}

impl PageScope {
    /// Starts labelling messages on this thread with `label`.
    pub fn enter(label: &str) -> Self {
        let previous = current_page();
        set_current_page(Some(label));
        Self { previous }
    }
}

impl Drop for PageScope {
    fn drop(&mut self) {
        set_current_page(self.previous.as_deref());
    }
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! migration_trace {
    ($($arg:tt)*) => {{
        $crate::log::trace!("{}{}", $crate::page_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! migration_info {
    ($($arg:tt)*) => {{
        $crate::log::info!("{}{}", $crate::page_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! migration_debug {
    ($($arg:tt)*) => {{
        $crate::log::debug!("{}{}", $crate::page_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! migration_warn {
    ($($arg:tt)*) => {{
        $crate::log::warn!("{}{}", $crate::page_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! migration_error {
    ($($arg:tt)*) => {{
        $crate::log::error!("{}{}", $crate::page_prefix(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_scope_sets_and_restores_label() {
        assert_eq!(page_prefix(), "");
        {
            let _outer = PageScope::enter("blog");
            assert_eq!(page_prefix(), "[blog] ");
            {
                let _inner = PageScope::enter("artigo-x");
                assert_eq!(current_page().as_deref(), Some("artigo-x"));
            }
            assert_eq!(current_page().as_deref(), Some("blog"));
        }
        assert_eq!(current_page(), None);
    }
}
