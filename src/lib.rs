pub mod agenda;
pub mod app;
pub mod config;
pub mod errors;
pub mod generator;
pub mod handlers;
pub mod models;
pub mod recurrence;
pub mod stats;
pub mod storage;
pub mod state;
pub mod sync;

pub use app::router;
pub use config::Config;
pub use generator::{generate, generate_at};
pub use recurrence::{is_due, Recurrence};
pub use state::AppState;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use sync::{merge, CompletionStore};
