//! Secret wrapper for sensitive values
//!
//! The account token and the ServerChan send key pass through logs, the
//! control panel, and Debug formatting. Wrapping them keeps the raw value
//! out of all three: Debug/Display render `[REDACTED]`, and the panel's
//! token history uses `masked()` instead of the full value.

use std::fmt;
use zeroize::Zeroize;

/// Sensitive value - redacted in Debug/Display/logs
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    /// Create a new secret value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// Whether the wrapped string is empty. An empty account token means
    /// the session is invalid.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Operator-facing rendering: last four characters, rest replaced.
    /// Short values are fully masked.
    pub fn masked(&self) -> String {
        let len = self.0.chars().count();
        if len <= 4 {
            return "****".to_string();
        }
        let tail: String = self.0.chars().skip(len - 4).collect();
        format!("****{tail}")
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}
