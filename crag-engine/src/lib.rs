pub mod commands;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod rag;
