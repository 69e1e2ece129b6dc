//! HTTP clients for the engine's API surface

mod engine_client;
mod process_client;

pub use engine_client::EngineClient;
pub use process_client::{
    ProcessActionResponse, ProcessClient, ProcessData, ProcessRequestData, ProcessSearchQuery,
};
