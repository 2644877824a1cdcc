pub mod api;
pub mod config;
pub mod handlers;
pub mod language;
pub mod presenter;
pub mod response;
pub mod router;
pub mod session;
pub mod speech;
pub mod state_machine;
pub mod system;
pub mod visualizer;

pub use config::Config;
pub use router::{route, InfoKind, RoutedCommand, SearchEngine};
pub use session::{Adapters, MicAccess, Session};
