pub mod bus;
pub mod config;
pub mod error;
pub mod history;
pub mod navigator;
pub mod project;
pub mod session;
pub mod shortcuts;

pub use bus::{ListenerId, NotificationBus, Subscription};
pub use config::EditorConfig;
pub use error::EditorError;
pub use history::{Clock, HistoryEngine, HistoryState};
pub use navigator::{Navigator, OutlineRow};
pub use project::Project;
pub use session::{Dispatch, EditorSession, SessionToken};
pub use shortcuts::{ShortcutAction, ShortcutMap};
