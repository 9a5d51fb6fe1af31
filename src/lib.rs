pub mod config;
pub mod error;
pub mod ident;
pub mod server;
pub mod storage;

pub use config::ServerConfig;
pub use error::{AppError, AppResult};
pub use ident::{EntryId, Kind};
pub use storage::{ContentStore, SharedStore};
