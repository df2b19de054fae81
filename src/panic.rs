//! Rendering of panic payloads caught on the receiver thread.

use std::{any::Any, fmt};

/// Borrowed view of a panic payload that formats it for logs and errors.
///
/// `String` and `&'static str` payloads print as-is; anything else prints as
/// an opaque placeholder.
///
/// ```
/// use ackframe::panic::format_panic;
///
/// let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
/// assert_eq!(format_panic(payload.as_ref()).to_string(), "boom");
///
/// let payload: Box<dyn std::any::Any + Send> = Box::new(7_u8);
/// assert_eq!(format_panic(payload.as_ref()).to_string(), "<non-string panic payload>");
/// ```
#[derive(Clone, Copy)]
#[must_use]
pub struct PanicMessage<'a>(&'a (dyn Any + Send));

impl fmt::Display for PanicMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            f.write_str("<non-string panic payload>")
        }
    }
}

impl fmt::Debug for PanicMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PanicMessage").field(&self.to_string()).finish()
    }
}

/// Wrap `payload` for display.
pub fn format_panic(payload: &(dyn Any + Send)) -> PanicMessage<'_> { PanicMessage(payload) }
