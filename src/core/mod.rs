pub mod chat_stream;
pub mod config;
pub mod export;
pub mod message;
pub mod orchestrator;
pub mod settings;
pub mod store;
pub mod stream_decoder;
