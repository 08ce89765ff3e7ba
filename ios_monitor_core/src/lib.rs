pub mod query;
pub mod remote;
pub mod server;
pub mod settings;
pub mod telemetry;

pub use rcon;
pub use serde_json;
