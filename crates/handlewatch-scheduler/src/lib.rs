pub mod backoff;
pub mod book;
pub mod config;
pub mod key_lock;
pub mod manager;
pub mod notifier;
pub mod persistence;
pub mod registry;
pub mod state;

pub use backoff::*;
pub use book::*;
pub use config::*;
pub use key_lock::*;
pub use manager::*;
pub use notifier::*;
pub use persistence::*;
pub use registry::*;
pub use state::*;
