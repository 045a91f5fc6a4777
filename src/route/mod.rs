//! Declarative route registration and dispatch
//!
//! Routes are declared on a [`RouteRegistry`], bound once onto a server by
//! [`compile`], and served per request by a [`RoutePipeline`].

pub mod compiler;
pub mod descriptor;
pub mod pipeline;
pub mod registry;

#[cfg(test)]
mod tests;

pub use compiler::{compile, CompileReport};
pub use descriptor::{
    FilterRef, RouteAction, RouteConfig, RouteDescriptor, RouteMethod, RouteSpec, ACTION_PARAM,
    CONTROLLER_PARAM, DEFAULT_ACTION,
};
pub use pipeline::RoutePipeline;
pub use registry::{Fallback, ResourceConfig, RouteRegistry, RouteStats};
