//! Declarative route registry with a DI-resolved request pipeline.
//!
//! Routes are declared against a [`RouteRegistry`], compiled once onto a
//! [`ServerAdapter`], and every matched request runs through redirect, action
//! resolution, an optional filter gate and dependency resolution before the
//! action is invoked.

pub mod config;
pub mod core;
pub mod logging;
pub mod route;
pub mod server;
pub mod utils;

pub use crate::core::{
    Callback, Collaborators, Container, Controller, ErrorCode, Flow, Invocable, RouterError,
    RouterResult, ServerAdapter,
};
pub use config::RoutesConfig;
pub use route::{compile, ResourceConfig, RouteConfig, RouteMethod, RouteRegistry};
pub use server::Dispatcher;
