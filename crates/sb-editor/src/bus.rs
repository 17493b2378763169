//! Change notification bus.
//!
//! Listeners are called synchronously, in subscription order, on the
//! thread that publishes. The editor is single-threaded, so the registry is
//! `Rc<RefCell<..>>` rather than a lock.
//!
//! `publish` works on a snapshot of the listener list and releases the
//! registry before calling anyone, so listeners may subscribe or
//! unsubscribe (themselves or others) while being notified. A listener
//! removed mid-publish is not called later in that same publish. A panic in
//! one listener is caught and logged, and the rest still run. That needs
//! unwinding: on `wasm32-unknown-unknown` a panic aborts, so the browser
//! build gets no listener isolation.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

pub type ListenerId = u64;

type Listener<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Registry<T> {
    next_id: ListenerId,
    listeners: Vec<(ListenerId, Listener<T>)>,
}

impl<T> Registry<T> {
    fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.listeners.iter().any(|(lid, _)| *lid == id)
    }
}

/// Type-erased removal, so `Subscription` does not carry the event type.
trait Detach {
    fn detach(&self, id: ListenerId) -> bool;
}

impl<T> Detach for RefCell<Registry<T>> {
    fn detach(&self, id: ListenerId) -> bool {
        self.borrow_mut().remove(id)
    }
}

/// Handle returned by `subscribe`. Dropping it keeps the listener
/// registered; call `unsubscribe` to remove it.
pub struct Subscription {
    id: ListenerId,
    registry: Weak<dyn Detach>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove the listener. Returns false if it was already gone (or the
    /// bus no longer exists).
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.detach(self.id))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Multi-subscriber publish handle. Clones share the same listeners.
pub struct NotificationBus<T> {
    registry: Rc<RefCell<Registry<T>>>,
}

impl<T> Clone for NotificationBus<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<T: 'static> Default for NotificationBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> NotificationBus<T> {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 1,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, listener: impl FnMut(&T) + 'static) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        let listener: Listener<T> = Rc::new(RefCell::new(listener));
        registry.listeners.push((id, listener));
        drop(registry);

        let weak: Weak<RefCell<Registry<T>>> = Rc::downgrade(&self.registry);
        Subscription { id, registry: weak }
    }

    /// Remove a listener by id. Safe to call from inside a listener.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.registry.borrow_mut().remove(id)
    }

    pub fn is_subscribed(&self, id: ListenerId) -> bool {
        self.registry.borrow().contains(id)
    }

    pub fn len(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify every listener with `event`.
    pub fn publish(&self, event: &T) {
        let snapshot: Vec<(ListenerId, Listener<T>)> = self.registry.borrow().listeners.clone();

        for (id, listener) in snapshot {
            if !self.is_subscribed(id) {
                continue;
            }
            // A listener that publishes on its own bus would re-enter itself.
            let Ok(mut call) = listener.try_borrow_mut() else {
                log::warn!("listener {id} is still running, skipping re-entrant notification");
                continue;
            };
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| (&mut *call)(event))) {
                log::error!("listener {id} panicked: {}", panic_message(&*payload));
            }
        }
    }

    /// Re-publish every event of this bus on `target`.
    pub fn forward_to(&self, target: &NotificationBus<T>) -> Subscription {
        let target = target.clone();
        self.subscribe(move |event| target.publish(event))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
