//! Observer registries for store mutations and generated-context updates.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;

/// Notified after every successful mutation of a
/// [`SelectionStore`](crate::app::selection::SelectionStore). Carries no payload; listeners
/// re-read whatever state they need.
pub trait FilesChangeListener: Send + Sync {
    fn on_files_changed(&self) -> Result<()>;
}

impl<F> FilesChangeListener for F
where
    F: Fn() -> Result<()> + Send + Sync,
{
    fn on_files_changed(&self) -> Result<()> {
        self()
    }
}

/// Notified with the new document and status every time context is generated or cleared.
pub trait ContextUpdateListener: Send + Sync {
    fn on_context_updated(&self, text: &str, status: &str) -> Result<()>;
}

impl<F> ContextUpdateListener for F
where
    F: Fn(&str, &str) -> Result<()> + Send + Sync,
{
    fn on_context_updated(&self, text: &str, status: &str) -> Result<()> {
        self(text, status)
    }
}

/// Registry of shared listener handles.
///
/// Identity is the `Arc` allocation: registering the same handle twice is a no-op.
pub struct ListenerRegistry<L: ?Sized> {
    name: &'static str,
    listeners: RwLock<Vec<Arc<L>>>,
}

impl<L: ?Sized> ListenerRegistry<L> {
    /// `name` labels the event in diagnostics.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Returns `false` when the handle was already registered.
    pub fn register(&self, listener: Arc<L>) -> bool {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|existing| same_handle(existing, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Returns `false` when the handle was not registered.
    pub fn unregister(&self, listener: &Arc<L>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|existing| !same_handle(existing, listener));
        listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Deliver one event to every registered listener.
    ///
    /// Delivery works on a snapshot of the registry so listeners may (un)register during the
    /// callback. A listener that errors or panics is logged and skipped; the rest still run.
    /// Returns the number of listeners that failed.
    pub fn notify(&self, deliver: impl Fn(&L) -> Result<()>) -> usize {
        let snapshot: Vec<Arc<L>> = self.listeners.read().clone();
        let mut failures = 0;

        for listener in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| deliver(&listener))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failures += 1;
                    tracing::error!(event = self.name, error = %err, "listener failed");
                }
                Err(payload) => {
                    failures += 1;
                    tracing::error!(
                        event = self.name,
                        panic = %panic_message(payload.as_ref()),
                        "listener panicked"
                    );
                }
            }
        }

        failures
    }
}

impl<L: ?Sized> std::fmt::Debug for ListenerRegistry<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("name", &self.name)
            .field("listeners", &self.len())
            .finish()
    }
}

fn same_handle<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_listener(counter: &Arc<AtomicUsize>) -> Arc<dyn FilesChangeListener> {
        let counter = Arc::clone(counter);
        Arc::new(move || -> Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn duplicate_registration_delivers_once() {
        let registry: ListenerRegistry<dyn FilesChangeListener> = ListenerRegistry::new("files");
        let counter = Arc::new(AtomicUsize::new(0));
        let listener = counting_listener(&counter);

        assert!(registry.register(Arc::clone(&listener)));
        assert!(!registry.register(Arc::clone(&listener)));
        assert_eq!(registry.len(), 1);

        registry.notify(|l| l.on_files_changed());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregistering_unknown_listener_is_a_no_op() {
        let registry: ListenerRegistry<dyn FilesChangeListener> = ListenerRegistry::new("files");
        let counter = Arc::new(AtomicUsize::new(0));
        let registered = counting_listener(&counter);
        let stranger = counting_listener(&counter);

        registry.register(Arc::clone(&registered));
        assert!(!registry.unregister(&stranger));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(&registered));
        assert!(registry.is_empty());
        registry.notify(|l| l.on_files_changed());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failing_listeners_do_not_block_others() {
        let registry: ListenerRegistry<dyn FilesChangeListener> = ListenerRegistry::new("files");
        let counter = Arc::new(AtomicUsize::new(0));

        let erroring: Arc<dyn FilesChangeListener> =
            Arc::new(|| -> Result<()> { anyhow::bail!("boom") });
        let panicking: Arc<dyn FilesChangeListener> = Arc::new(|| -> Result<()> {
            panic!("listener exploded");
        });

        registry.register(erroring);
        registry.register(panicking);
        registry.register(counting_listener(&counter));

        let failures = registry.notify(|l| l.on_files_changed());
        assert_eq!(failures, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn context_listeners_receive_payload() {
        let registry: ListenerRegistry<dyn ContextUpdateListener> =
            ListenerRegistry::new("context");
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.register(Arc::new(move |text: &str, status: &str| -> Result<()> {
            sink.lock().push((text.to_owned(), status.to_owned()));
            Ok(())
        }));

        registry.notify(|l| l.on_context_updated("body", "done"));
        assert_eq!(*seen.lock(), vec![("body".to_owned(), "done".to_owned())]);
    }

    #[test]
    fn listener_may_unregister_itself_during_delivery() {
        let registry: Arc<ListenerRegistry<dyn FilesChangeListener>> =
            Arc::new(ListenerRegistry::new("files"));
        let slot: Arc<parking_lot::Mutex<Option<Arc<dyn FilesChangeListener>>>> =
            Arc::new(parking_lot::Mutex::new(None));

        let registry_ref = Arc::clone(&registry);
        let slot_ref = Arc::clone(&slot);
        let listener: Arc<dyn FilesChangeListener> = Arc::new(move || -> Result<()> {
            if let Some(me) = slot_ref.lock().take() {
                registry_ref.unregister(&me);
            }
            Ok(())
        });
        *slot.lock() = Some(Arc::clone(&listener));
        registry.register(listener);

        assert_eq!(registry.notify(|l| l.on_files_changed()), 0);
        assert!(registry.is_empty());
    }
}
