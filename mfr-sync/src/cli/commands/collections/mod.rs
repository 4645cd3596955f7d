//! `collections` command

pub mod handler;

pub use handler::handle_collections_command;
