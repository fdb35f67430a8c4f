pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod rag;
pub mod retrieval;
pub mod server;
pub mod shutdown;
pub mod triage;
pub mod workflow;
