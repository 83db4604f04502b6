pub mod document;
mod parse;

pub use document::{Document, Mutation, NodeId, SharedDocument};
