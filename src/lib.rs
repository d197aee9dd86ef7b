pub mod api;
pub mod cell;
pub mod config;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod panel;
pub mod types;
pub mod view;
