// src/core/mod.rs
pub mod model;
pub mod registry;
pub mod store;
pub mod types;
pub mod vocabulary;
