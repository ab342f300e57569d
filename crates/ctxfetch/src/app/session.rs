//! Wiring of the selection store and the context generator for one workspace.

use std::sync::{Arc, Weak};

use anyhow::Result;

use crate::app::listeners::FilesChangeListener;
use crate::app::render::{ContextGenerator, ContextRenderer, RenderedContext};
use crate::app::selection::SelectionStore;
use crate::infra::config::Config;
use crate::infra::source::FileSource;

/// Store plus generator sharing one [`FileSource`].
///
/// With auto-generation enabled every store change regenerates the document; an emptied store
/// clears it instead.
pub struct Session {
    store: Arc<SelectionStore>,
    generator: Arc<ContextGenerator>,
    auto_listener: Option<Arc<dyn FilesChangeListener>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .field("generator", &self.generator)
            .field("auto_generate", &self.auto_generate())
            .finish()
    }
}

impl Session {
    /// Build a session over `source`, enabling auto-generation when the config asks for it.
    pub fn new(source: Arc<dyn FileSource>, config: &Config) -> Self {
        let store = Arc::new(SelectionStore::new(Arc::clone(&source)));
        let generator = Arc::new(ContextGenerator::new(ContextRenderer::new(source)));
        let mut session = Self {
            store,
            generator,
            auto_listener: None,
        };
        session.set_auto_generate(config.render.auto_generate());
        session
    }

    /// Shared selection store.
    pub fn store(&self) -> &Arc<SelectionStore> {
        &self.store
    }

    /// Shared context generator.
    pub fn generator(&self) -> &Arc<ContextGenerator> {
        &self.generator
    }

    /// Render the current selection in list order and publish the result.
    pub fn generate(&self) -> RenderedContext {
        self.generator.generate(&self.store.sorted_items())
    }

    /// Whether store changes regenerate the document.
    pub fn auto_generate(&self) -> bool {
        self.auto_listener.is_some()
    }

    /// Attach or detach the regenerate-on-change listener.
    pub fn set_auto_generate(&mut self, enabled: bool) {
        match (enabled, self.auto_listener.take()) {
            (true, Some(listener)) => self.auto_listener = Some(listener),
            (true, None) => {
                let listener = regenerate_on_change(&self.store, &self.generator);
                self.store.add_listener(Arc::clone(&listener));
                self.auto_listener = Some(listener);
                tracing::debug!("auto-generation enabled");
            }
            (false, Some(listener)) => {
                self.store.remove_listener(&listener);
                tracing::debug!("auto-generation disabled");
            }
            (false, None) => {}
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(listener) = self.auto_listener.take() {
            self.store.remove_listener(&listener);
        }
    }
}

// Weak handles: the store owns the listener, so a strong handle back would leak both.
fn regenerate_on_change(
    store: &Arc<SelectionStore>,
    generator: &Arc<ContextGenerator>,
) -> Arc<dyn FilesChangeListener> {
    let store: Weak<SelectionStore> = Arc::downgrade(store);
    let generator: Weak<ContextGenerator> = Arc::downgrade(generator);

    Arc::new(move || -> Result<()> {
        let (Some(store), Some(generator)) = (store.upgrade(), generator.upgrade()) else {
            return Ok(());
        };
        let items = store.sorted_items();
        if items.is_empty() {
            generator.clear_generated();
        } else {
            generator.generate(&items);
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;

    use crate::app::listeners::ContextUpdateListener;
    use crate::domain::model::LineRange;
    use crate::infra::source::MemoryFileSource;

    fn session_with(auto_generate: bool) -> (Session, Arc<MemoryFileSource>) {
        let source = Arc::new(MemoryFileSource::new());
        let mut config = Config::default();
        config.render.set_auto_generate(auto_generate);
        (Session::new(source.clone(), &config), source)
    }

    #[test]
    fn manual_generation_uses_sorted_items() {
        let (session, source) = session_with(false);
        let zeta = source.insert("zeta.txt", "z");
        let alpha = source.insert("alpha.txt", "a");

        session.store().add_file(&zeta);
        session.store().add_file(&alpha);
        assert!(!session.generator().has_context());

        let rendered = session.generate();
        let alpha_at = rendered.text.find("## File: alpha.txt").unwrap();
        let zeta_at = rendered.text.find("## File: zeta.txt").unwrap();
        assert!(alpha_at < zeta_at);
        assert_eq!(rendered.status, "Context generated: 2 file(s)");
    }

    #[test]
    fn auto_generation_follows_store_changes() {
        let (session, source) = session_with(true);
        let file = source.insert("lib.rs", "fn a() {}\nfn b() {}\n");

        let statuses = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&statuses);
        let listener: Arc<dyn ContextUpdateListener> =
            Arc::new(move |_text: &str, status: &str| -> Result<()> {
                sink.lock().push(status.to_owned());
                Ok(())
            });
        session.generator().add_listener(listener);

        assert!(session.auto_generate());
        session
            .store()
            .add_snippet(&file, LineRange::new(1, 1).unwrap());
        assert!(session.generator().current().text.contains("fn b() {}"));

        session.store().clear();
        assert!(!session.generator().has_context());

        assert_eq!(
            *statuses.lock(),
            vec![
                "Context generated: 0 file(s), 1 snippet(s)".to_owned(),
                String::new()
            ]
        );
    }

    #[test]
    fn toggling_auto_generation_detaches_listener() {
        let (mut session, source) = session_with(true);
        let file = source.insert("a.txt", "alpha");

        session.set_auto_generate(true);
        session.set_auto_generate(false);
        assert!(!session.auto_generate());

        session.store().add_file(&file);
        assert!(!session.generator().has_context());
    }

    #[test]
    fn dropping_session_leaves_shared_store_quiet() {
        let (session, source) = session_with(true);
        let file = source.insert("a.txt", "alpha");
        let store = Arc::clone(session.store());
        let generator = Arc::clone(session.generator());
        drop(session);

        store.add_file(&file);
        assert!(!generator.has_context());
    }
}
