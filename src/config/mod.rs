use std::{collections::BTreeMap, fs, str::FromStr};

use log::{debug, trace, LevelFilter};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{
    core::{
        context::ResolveMap,
        error::{ErrorContext, RouterError, RouterResult},
    },
    route::{FilterRef, ResourceConfig, RouteConfig, RouteMethod, CONTROLLER_PARAM},
    utils::request::has_path_param,
};

/// Declarative route table, typically loaded from YAML
#[derive(Default, Debug, Serialize, Deserialize, Validate)]
pub struct RoutesConfig {
    #[validate(nested)]
    #[serde(default)]
    pub routes: Vec<RouteEntry>,

    #[validate(nested)]
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,

    /// Redirect target for requests no route handled
    #[validate(length(min = 1))]
    pub otherwise: Option<String>,

    #[validate(nested)]
    pub log: Option<Log>,
}

// Config file load and validation
impl RoutesConfig {
    pub fn load_from_yaml<P>(path: P) -> RouterResult<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path)
            .with_context(&format!("Unable to read conf file from {path}"))?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    pub fn from_yaml(conf_str: &str) -> RouterResult<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: RoutesConfig = serde_yaml::from_str(conf_str)
            .map_err(|e| RouterError::Validation(format!("Unable to parse yaml conf: {e}")))?;

        trace!("Loaded conf: {conf:?}");

        conf.validate()
            .map_err(|e| RouterError::Validation(format!("Conf file valid failed: {e}")))?;

        Ok(conf)
    }

    pub fn to_yaml(&self) -> RouterResult<String> {
        serde_yaml::to_string(self).with_context("Unable to serialize conf")
    }
}

fn validate_method(method: &str) -> Result<(), ValidationError> {
    RouteMethod::from_str(method)
        .map(|_| ())
        .map_err(|_| ValidationError::new("unknown_method"))
}

fn resolve_map(entries: &BTreeMap<String, String>) -> Option<ResolveMap> {
    (!entries.is_empty()).then(|| {
        entries
            .iter()
            .fold(ResolveMap::new(), |map, (name, service)| map.with(name.clone(), service.clone()))
    })
}

/// One route of the table
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "RouteEntry::validate_target"))]
pub struct RouteEntry {
    #[validate(length(min = 1))]
    pub path: String,

    #[validate(custom(function = "validate_method"))]
    pub method: Option<String>,

    pub controller: Option<String>,
    pub action: Option<String>,

    #[serde(alias = "redirectTo")]
    pub redirect_to: Option<String>,

    /// Name of a registered filter
    pub filter: Option<String>,

    /// Local name to service name
    #[serde(default)]
    pub resolve: BTreeMap<String, String>,
}

impl RouteEntry {
    fn validate_target(&self) -> Result<(), ValidationError> {
        if self.redirect_to.is_none()
            && self.controller.is_none()
            && !has_path_param(&self.path, CONTROLLER_PARAM)
        {
            return Err(ValidationError::new("controller_or_redirect_required"));
        }
        Ok(())
    }

    pub fn to_route_config(&self) -> RouterResult<RouteConfig> {
        Ok(RouteConfig {
            method: self
                .method
                .as_deref()
                .map(RouteMethod::from_str)
                .transpose()?,
            controller: self.controller.clone(),
            action: self.action.clone(),
            handler: None,
            redirect_to: self.redirect_to.clone(),
            filter: self.filter.clone().map(FilterRef::Named),
            resolve: resolve_map(&self.resolve),
        })
    }
}

/// Controller-backed resource: verb to action name
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "ResourceEntry::validate_actions"))]
pub struct ResourceEntry {
    #[validate(length(min = 1))]
    pub path: String,

    #[validate(length(min = 1))]
    pub controller: String,

    #[validate(length(min = 1))]
    pub actions: BTreeMap<String, String>,

    pub filter: Option<String>,

    #[serde(default)]
    pub resolve: BTreeMap<String, String>,
}

impl ResourceEntry {
    fn validate_actions(&self) -> Result<(), ValidationError> {
        for method in self.actions.keys() {
            validate_method(method)?;
        }
        Ok(())
    }

    pub fn to_resource_config(&self) -> RouterResult<ResourceConfig> {
        let actions = self
            .actions
            .iter()
            .map(|(method, action)| Ok((RouteMethod::from_str(method)?, action.clone())))
            .collect::<RouterResult<Vec<_>>>()?;

        Ok(ResourceConfig {
            controller: Some(self.controller.clone()),
            actions,
            filter: self.filter.clone().map(FilterRef::Named),
            resolve: resolve_map(&self.resolve),
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Log {
    #[serde(default = "Log::default_level")]
    #[validate(custom(function = "Log::validate_level"))]
    pub level: String,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

impl Log {
    fn default_level() -> String {
        "info".to_string()
    }

    fn validate_level(level: &str) -> Result<(), ValidationError> {
        LevelFilter::from_str(level)
            .map(|_| ())
            .map_err(|_| ValidationError::new("unknown_log_level"))
    }

    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.level).unwrap_or(LevelFilter::Info)
    }
}
