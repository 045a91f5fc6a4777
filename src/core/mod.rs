//! Core abstractions of the route registry
//!
//! This module provides the error type, the handler and collaborator traits,
//! the DI value model and a reference DI container.

pub mod container;
pub mod context;
pub mod controller;
pub mod error;
pub mod traits;

// Re-export commonly used types
pub use container::{Collaborators, Container};
pub use context::{Args, Component, Expr, Factory, Invocable, Invocation, Locals, ResolveMap};
pub use controller::{Action, Callback, Controller, Member};
pub use error::{ErrorCode, RouterError, RouterResult};
pub use traits::*;
