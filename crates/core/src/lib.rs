pub mod config;
pub mod envelope;
pub mod error;
pub mod validate;

pub use config::{load_dotenv, ConfigError, RuntimeConfig, SidecarConfig, TerminalConfig};
pub use envelope::{
    CallingConvention, Envelope, ErrorDetails, ErrorEnvelope, ErrorKind, ResponseItem, Route,
    Severity,
};
pub use error::SchemaError;
