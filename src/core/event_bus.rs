//! Pub/Sub Event Bus for the UI thread.
//!
//! Architecture:
//! - Components subscribe to event types with callbacks (immediate invocation)
//! - emit() invokes callbacks immediately AND queues for deferred processing
//! - poll() returns queued events for batch processing in the egui frame loop
//!
//! Everything here runs on the UI thread, so the bus is `Rc<RefCell<..>>`
//! based and events need not be `Send`.
//!
//! Callback order: FIFO (first-subscribed, first-called) within same event type.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::warn;

/// Maximum events in queue before oldest are evicted
const MAX_QUEUE_SIZE: usize = 1000;

/// Marker trait for events.
pub trait Event: Any + 'static {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + 'static> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

type Callback = Rc<dyn Fn(&dyn Any)>;

/// Boxed event for queue storage
pub type BoxedEvent = Box<dyn Event>;

#[derive(Default)]
struct BusInner {
    subscribers: RefCell<HashMap<TypeId, Vec<Callback>>>,
    queue: RefCell<Vec<BoxedEvent>>,
}

impl BusInner {
    fn dispatch(&self, type_id: TypeId, event: &dyn Any) {
        // Clone the list so callbacks may subscribe/emit re-entrantly
        let callbacks = self.subscribers.borrow().get(&type_id).cloned();
        for cb in callbacks.iter().flatten() {
            cb(event);
        }
    }

    fn enqueue(&self, event: BoxedEvent) {
        let mut queue = self.queue.borrow_mut();
        if queue.len() >= MAX_QUEUE_SIZE {
            let evict_count = queue.len() / 2;
            warn!("EventBus queue full ({} events), evicting oldest {}", queue.len(), evict_count);
            queue.drain(0..evict_count);
        }
        queue.push(event);
    }
}

/// Pub/Sub Event Bus with deferred processing support.
///
/// Callbacks fire immediately on emit(), and events are also available for
/// batch processing via poll().
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events of type E.
    pub fn subscribe<E, F>(&self, callback: F)
    where
        E: Event,
        F: Fn(&E) + 'static,
    {
        let wrapped: Callback = Rc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.inner
            .subscribers
            .borrow_mut()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(wrapped);
    }

    /// Emit event: invoke callbacks immediately AND queue for deferred processing.
    pub fn emit<E: Event + Clone>(&self, event: E) {
        self.inner.dispatch(TypeId::of::<E>(), &event);
        self.inner.enqueue(Box::new(event));
    }

    /// Poll all queued events for batch processing.
    pub fn poll(&self) -> Vec<BoxedEvent> {
        std::mem::take(&mut *self.inner.queue.borrow_mut())
    }

    /// Get an emitter handle for passing to components.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            inner: Some(Rc::clone(&self.inner)),
        }
    }

    /// Clear subscribers for type E
    pub fn unsubscribe_all<E: Event>(&self) {
        self.inner.subscribers.borrow_mut().remove(&TypeId::of::<E>());
    }

    /// Clear all subscribers and queue
    pub fn clear(&self) {
        self.inner.subscribers.borrow_mut().clear();
        self.inner.queue.borrow_mut().clear();
    }

    pub fn has_subscribers<E: Event>(&self) -> bool {
        self.inner
            .subscribers
            .borrow()
            .get(&TypeId::of::<E>())
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    pub fn queue_len(&self) -> usize {
        self.inner.queue.borrow().len()
    }
}

/// Lightweight emitter handle for components.
///
/// `EventEmitter::dummy()` is a no-op sink for components built before the
/// bus exists (and for tests that don't care about events).
#[derive(Clone, Default)]
pub struct EventEmitter {
    inner: Option<Rc<BusInner>>,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("EventEmitter")
                .field("subscriber_types", &inner.subscribers.borrow().len())
                .field("queue_len", &inner.queue.borrow().len())
                .finish(),
            None => f.write_str("EventEmitter(dummy)"),
        }
    }
}

impl EventEmitter {
    pub fn dummy() -> Self {
        Self { inner: None }
    }

    /// Emit event (no-op if dummy)
    pub fn emit<E: Event + Clone>(&self, event: E) {
        if let Some(inner) = &self.inner {
            inner.dispatch(TypeId::of::<E>(), &event);
            inner.enqueue(Box::new(event));
        }
    }
}

/// Helper: downcast BoxedEvent to concrete type
///
/// Must deref to `dyn Event` before `as_any()`: the blanket impl also covers
/// `Box<dyn Event>`, which would hand back the box instead of the event.
#[inline]
pub fn downcast_event<E: Event>(event: &BoxedEvent) -> Option<&E> {
    (**event).as_any().downcast_ref::<E>()
}
