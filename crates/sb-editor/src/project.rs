//! Multi-page project.
//!
//! A project keeps every page's tree and exactly one live `EditorSession`
//! for the active page. Switching pages stores the active tree and opens a
//! new session (new history, new token) for the target. Project-level
//! subscribers are attached to a bus that the active session's history
//! forwards into, so they keep receiving updates across switches.

use crate::bus::{NotificationBus, Subscription};
use crate::config::EditorConfig;
use crate::error::EditorError;
use crate::history::{Clock, HistoryState, system_clock};
use crate::session::{EditorSession, SessionToken};
use sb_core::{DocumentError, Operation, Tree};

/// Name of the page a new project starts with.
pub const DEFAULT_PAGE: &str = "home";

#[derive(Debug, Clone)]
struct Page {
    name: String,
    /// Last stored tree. Stale for the active page until it is stored.
    tree: Tree,
}

pub struct Project {
    config: EditorConfig,
    clock: Clock,
    pages: Vec<Page>,
    active: usize,
    session: EditorSession,
    bus: NotificationBus<HistoryState>,
    link: Subscription,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("pages", &self.page_names())
            .field("active", &self.active_page())
            .field("session", &self.session)
            .finish()
    }
}

impl Project {
    pub fn new(config: EditorConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: EditorConfig, clock: Clock) -> Self {
        let tree = Tree::default();
        let bus = NotificationBus::new();
        let session = EditorSession::with_clock(tree.clone(), config.clone(), clock.clone());
        let link = session.history().bus().forward_to(&bus);
        Self {
            config,
            clock,
            pages: vec![Page {
                name: DEFAULT_PAGE.to_string(),
                tree,
            }],
            active: 0,
            session,
            bus,
            link,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn session(&self) -> &EditorSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut EditorSession {
        &mut self.session
    }

    /// Token of the active session, handed to async work.
    pub fn token(&self) -> SessionToken {
        self.session.token()
    }

    /// Listen to history changes of whichever page is active.
    pub fn subscribe(&self, listener: impl FnMut(&HistoryState) + 'static) -> Subscription {
        self.bus.subscribe(listener)
    }

    pub fn bus(&self) -> &NotificationBus<HistoryState> {
        &self.bus
    }

    // ─── Pages ───────────────────────────────────────────────────────────

    pub fn page_names(&self) -> Vec<&str> {
        self.pages.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn active_page(&self) -> &str {
        &self.pages[self.active].name
    }

    fn index_of(&self, name: &str) -> Result<usize, EditorError> {
        self.pages
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| EditorError::PageNotFound(name.to_string()))
    }

    /// Current tree of `name`, live for the active page.
    pub fn page_tree(&self, name: &str) -> Result<Tree, EditorError> {
        let index = self.index_of(name)?;
        Ok(if index == self.active {
            self.session.current_tree()
        } else {
            self.pages[index].tree.clone()
        })
    }

    pub fn add_page(&mut self, name: &str) -> Result<(), EditorError> {
        self.insert_page(name, Tree::default())
    }

    fn insert_page(&mut self, name: &str, tree: Tree) -> Result<(), EditorError> {
        if self.pages.iter().any(|p| p.name == name) {
            return Err(EditorError::DuplicatePage(name.to_string()));
        }
        log::debug!("add page `{name}`");
        self.pages.push(Page {
            name: name.to_string(),
            tree,
        });
        Ok(())
    }

    pub fn rename_page(&mut self, from: &str, to: &str) -> Result<(), EditorError> {
        let index = self.index_of(from)?;
        if from != to && self.pages.iter().any(|p| p.name == to) {
            return Err(EditorError::DuplicatePage(to.to_string()));
        }
        self.pages[index].name = to.to_string();
        Ok(())
    }

    /// Remove a page. Removing the active page switches to the first
    /// remaining one.
    pub fn remove_page(&mut self, name: &str) -> Result<(), EditorError> {
        let index = self.index_of(name)?;
        if self.pages.len() == 1 {
            return Err(EditorError::LastPage);
        }
        log::debug!("remove page `{name}`");
        self.pages.remove(index);
        if index == self.active {
            self.active = 0;
            self.open_session(self.pages[0].tree.clone());
        } else if index < self.active {
            self.active -= 1;
        }
        Ok(())
    }

    /// Store the active page and open a fresh session on `name`.
    pub fn switch_page(&mut self, name: &str) -> Result<(), EditorError> {
        let target = self.index_of(name)?;
        if target == self.active {
            return Ok(());
        }
        self.store_active();
        self.active = target;
        self.open_session(self.pages[target].tree.clone());
        Ok(())
    }

    /// Replace (or create) page `name` from a persisted JSON document.
    pub fn load_page(&mut self, name: &str, json: &str) -> Result<(), EditorError> {
        let tree = Tree::from_json(json)?;
        match self.index_of(name) {
            Ok(index) => {
                self.pages[index].tree = tree.clone();
                if index == self.active {
                    self.open_session(tree);
                }
                Ok(())
            }
            Err(_) => self.insert_page(name, tree),
        }
    }

    pub fn export_page(&self, name: &str) -> Result<String, EditorError> {
        let tree = self.page_tree(name)?;
        Ok(tree.to_json().map_err(DocumentError::from)?)
    }

    fn store_active(&mut self) {
        self.pages[self.active].tree = self.session.current_tree();
    }

    fn open_session(&mut self, tree: Tree) {
        let session = EditorSession::with_clock(tree, self.config.clone(), self.clock.clone());
        let link = session.history().bus().forward_to(&self.bus);
        let old = std::mem::replace(&mut self.link, link);
        old.unsubscribe();
        let previous = std::mem::replace(&mut self.session, session);
        log::debug!(
            "page `{}` opened, session {} replaces {}",
            self.active_page(),
            self.session.token(),
            previous.token()
        );
        self.bus.publish(self.session.history().current());
    }

    // ─── Async completions ───────────────────────────────────────────────

    /// Apply an operation produced by async work started under `token`.
    ///
    /// Fails with `StaleSession` if the page was switched (or reloaded)
    /// since. Otherwise the operation is checked against the tree as it is
    /// now, not as it was when the work started.
    pub fn apply_deferred(&mut self, token: SessionToken, op: &Operation) -> Result<Tree, EditorError> {
        if token != self.session.token() {
            log::warn!(
                "dropping deferred \"{}\": session {token} is stale (active {})",
                op.description(),
                self.session.token()
            );
            return Err(EditorError::StaleSession(token.value()));
        }
        Ok(self.session.apply_operation(op)?)
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}
