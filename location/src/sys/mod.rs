//! Platform-specific location implementations.

/// Android platform implementation.
#[cfg(target_os = "android")]
pub mod android;
