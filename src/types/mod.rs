//! Core types for Chatflow.

pub mod block;
pub mod event;
pub mod message;

pub use block::*;
pub use event::*;
pub use message::*;
