//! Message handler interface
//!
//! The listening loop hands every reassembled text message to a
//! [`MessageHandler`]. Failures and panics raised by a handler are contained
//! by the caller and never end the connection.

use roslink_core::HandlerError;
use std::fmt;
use std::sync::Arc;

/// Receives the messages of one connection.
pub trait MessageHandler: Send + Sync + 'static {
    /// Called once after the opening handshake, before any message.
    fn on_open(&self) {}

    /// Called once per fully reassembled message, in arrival order.
    fn on_message(&self, text: String) -> Result<(), HandlerError>;
}

impl<H: MessageHandler + ?Sized> MessageHandler for Arc<H> {
    fn on_open(&self) {
        (**self).on_open()
    }

    fn on_message(&self, text: String) -> Result<(), HandlerError> {
        (**self).on_message(text)
    }
}

/// Closure-backed [`MessageHandler`], see [`from_fn`].
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(String) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    fn on_message(&self, text: String) -> Result<(), HandlerError> {
        (self.f)(text)
    }
}

/// Build a handler from a closure.
///
/// ```
/// use roslink_client::handler::{from_fn, MessageHandler};
///
/// let handler = from_fn(|text| {
///     println!("received {} bytes", text.len());
///     Ok(())
/// });
/// assert!(handler.on_message("{}".to_string()).is_ok());
/// ```
pub fn from_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(String) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    FnHandler { f }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        opened: Mutex<u32>,
        messages: Mutex<Vec<String>>,
    }

    impl MessageHandler for Recorder {
        fn on_open(&self) {
            *self.opened.lock().unwrap() += 1;
        }

        fn on_message(&self, text: String) -> Result<(), HandlerError> {
            self.messages.lock().unwrap().push(text);
            Ok(())
        }
    }

    #[test]
    fn test_shared_handler_forwards() {
        let recorder = Arc::new(Recorder::default());
        let handler: Arc<dyn MessageHandler> = Arc::new(recorder.clone());

        handler.on_open();
        handler.on_message("a".into()).unwrap();

        assert_eq!(*recorder.opened.lock().unwrap(), 1);
        assert_eq!(*recorder.messages.lock().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_closure_handler_errors() {
        let handler = from_fn(|text| {
            if text.is_empty() {
                Err(HandlerError::new("empty message"))
            } else {
                Ok(())
            }
        });

        handler.on_open();
        assert!(handler.on_message("x".into()).is_ok());
        let err = handler.on_message(String::new()).unwrap_err();
        assert_eq!(err.to_string(), "empty message");
    }
}
