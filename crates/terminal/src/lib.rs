pub mod error;
pub mod gateway;
pub mod handlers;
pub mod key;
pub mod storage;

pub use error::TerminalError;
pub use gateway::GatewayClient;
pub use handlers::Terminals;
