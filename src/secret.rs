use std::fmt;

/// A credential that must never reach logs.
///
/// Holds the counter-store token read from the environment. `Debug` and
/// `Display` print `[REDACTED]`, so configuration structs holding a
/// `Secret` can be logged whole at startup.
///
/// # Examples
///
/// ```
/// use coprocessor_gate::Secret;
///
/// let token = Secret::new("AXXXupstash-token".to_string());
/// assert_eq!(format!("{:?}", token), "[REDACTED]");
/// assert_eq!(token.expose_secret(), "AXXXupstash-token");
/// ```
// Do NOT derive Clone or Default: copies of a credential should be deliberate.
pub struct Secret<T> {
    // Must stay private; the only read path is expose_secret().
    inner: T,
}

impl<T> Secret<T> {
    /// Wraps a sensitive value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Returns the wrapped value. Do not log the result.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}
