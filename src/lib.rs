pub mod app;
pub mod archive;
pub mod config;
pub mod container;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod output;
pub mod process;
pub mod sources;
pub mod store;
pub mod styles;
pub mod tasks;
