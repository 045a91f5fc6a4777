//! Controllers and the actions they expose

use std::{collections::HashMap, fmt, sync::Arc};

use serde_json::Value as JsonValue;

use super::{
    context::Invocable,
    traits::{ErrorHandler, Handler},
};

/// A plain callback; the shape decides how the pipeline calls it.
#[derive(Clone)]
pub enum Callback {
    /// `(req, res, next)`
    Standard(Arc<dyn Handler>),
    /// `(err, req, res, next)`
    Error(Arc<dyn ErrorHandler>),
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Standard(_) => f.write_str("Callback::Standard"),
            Callback::Error(_) => f.write_str("Callback::Error"),
        }
    }
}

/// Unit of work for a matched route
#[derive(Clone, Debug)]
pub enum Action {
    Invocable(Invocable),
    Callback(Callback),
}

impl From<Invocable> for Action {
    fn from(invocable: Invocable) -> Self {
        Action::Invocable(invocable)
    }
}

impl From<Callback> for Action {
    fn from(callback: Callback) -> Self {
        Action::Callback(callback)
    }
}

/// A controller member: either something callable or a plain property
#[derive(Clone, Debug)]
pub enum Member {
    Action(Action),
    Property(JsonValue),
}

impl Member {
    pub fn as_action(&self) -> Option<&Action> {
        match self {
            Member::Action(action) => Some(action),
            Member::Property(_) => None,
        }
    }
}

/// Named collection of members, looked up by action name at request time
#[derive(Clone, Debug)]
pub struct Controller {
    name: String,
    members: HashMap<String, Member>,
}

impl Controller {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: HashMap::new(),
        }
    }

    /// Add a callable member
    pub fn action(mut self, name: impl Into<String>, action: impl Into<Action>) -> Self {
        self.members.insert(name.into(), Member::Action(action.into()));
        self
    }

    /// Add a non-callable member
    pub fn property(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.members.insert(name.into(), Member::Property(value));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }
}
