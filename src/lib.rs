pub mod chat;
pub mod config;
pub mod errors;
pub mod mount;
pub mod sandbox;
pub mod session;
pub mod steps;
pub mod tree;
pub mod ui;
