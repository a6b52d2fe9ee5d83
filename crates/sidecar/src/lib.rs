pub mod classify;
pub mod client;
pub mod health;
pub mod worker;

pub use client::{call_runtime, RuntimeCallError};
pub use health::Counters;
pub use worker::{run, Worker};
