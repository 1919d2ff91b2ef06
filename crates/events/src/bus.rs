use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::event::Event;

/// A subscribed callback. Identity is the `Rc` allocation, so keep a clone
/// around if you intend to call [`EventBus::off`] later.
pub type Listener<P> = Rc<dyn Fn(&P)>;

/// Wrap a closure as a [`Listener`].
pub fn listener<P, F>(f: F) -> Listener<P>
where
    F: Fn(&P) + 'static,
{
    Rc::new(f)
}

/// Single-threaded event bus keyed by event name.
pub struct EventBus<P> {
    listeners: RefCell<HashMap<String, Vec<Listener<P>>>>,
}

impl<P> Default for EventBus<P> {
    fn default() -> Self {
        Self {
            listeners: RefCell::new(HashMap::new()),
        }
    }
}

impl<P> EventBus<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `event`. Returns false if that exact listener
    /// was already registered for the event.
    pub fn on(&self, event: &str, listener: Listener<P>) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let list = listeners.entry(event.to_string()).or_default();
        if list.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            return false;
        }
        list.push(listener);
        tracing::trace!(event, count = list.len(), "listener registered");
        true
    }

    /// Remove `listener` from `event`. Returns whether it was registered.
    pub fn off(&self, event: &str, listener: &Listener<P>) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(list) = listeners.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| !Rc::ptr_eq(l, listener));
        let removed = list.len() != before;
        if list.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    /// Invoke every listener for `event` with `payload`, in registration order.
    /// Returns the number of listeners invoked.
    ///
    /// The listener list is snapshotted first, so listeners may subscribe or
    /// unsubscribe while being dispatched; changes apply from the next emit.
    pub fn emit(&self, event: &str, payload: &P) -> usize {
        let snapshot: Vec<Listener<P>> = match self.listeners.borrow().get(event) {
            Some(list) => list.clone(),
            None => return 0,
        };
        for l in &snapshot {
            l(payload);
        }
        snapshot.len()
    }

    /// Remove all listeners for `event`, or for every event when `None`.
    pub fn clear(&self, event: Option<&str>) {
        let mut listeners = self.listeners.borrow_mut();
        match event {
            Some(name) => {
                listeners.remove(name);
            }
            None => listeners.clear(),
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.borrow().get(event).map_or(0, Vec::len)
    }
}

impl EventBus<Event> {
    /// Emit `event` on its own channel name.
    pub fn publish(&self, event: &Event) -> usize {
        self.emit(event.channel(), event)
    }
}
