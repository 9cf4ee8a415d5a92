pub mod adapters;
pub mod config;
pub mod error;
pub mod forms;
pub mod session;
pub mod web;
