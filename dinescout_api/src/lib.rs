mod client;
mod errors;
pub mod types;
pub mod user_agent;
pub use self::client::{Client, DEFAULT_ARCHIVE_URL};
pub use self::errors::Error;
