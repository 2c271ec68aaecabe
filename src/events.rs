//! Subscriber lists for manager lifecycle notifications.

use std::fmt;

type Handler<T> = Box<dyn FnMut(&T)>;

/// An ordered list of callbacks invoked with a payload.
pub struct Event<T> {
    handlers: Vec<Handler<T>>,
}

impl<T> Event<T> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a callback. Callbacks run in registration order.
    pub fn subscribe<F>(&mut self, handler: F)
    where
        F: FnMut(&T) + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    pub fn trigger(&mut self, payload: &T) {
        for handler in &mut self.handlers {
            handler(payload);
        }
    }

    /// Drop every subscriber.
    pub fn reset(&mut self) {
        self.handlers.clear();
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}
