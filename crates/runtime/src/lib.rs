pub mod builtins;
pub mod handler;
pub mod registry;
pub mod server;
pub mod supervision;

pub use handler::{HandlerEntry, HandlerError, HandlerReturn, MessageHandler, PayloadHandler};
pub use registry::{Registry, RegistryError};
pub use server::{build_response, serve_one, RequestContext};
