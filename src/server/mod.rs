//! Reference server adapter

pub mod dispatcher;

pub use dispatcher::Dispatcher;
