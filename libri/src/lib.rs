//! The `libri` node crate: configuration, CLI, on-disk store contract, and the process
//! wiring that turns `libri-core`/`libri-crypto`/`libri-document`/`libri-pipeline` into a
//! running librarian.

pub mod cli;
pub mod config;
pub mod node;
pub mod store;

pub use config::Config;
pub use node::{Node, Registry};
