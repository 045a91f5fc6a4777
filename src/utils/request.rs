use std::collections::BTreeMap;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};

/// Request handed to every handler in the chain.
///
/// `params` holds the path parameters of the layer currently being executed;
/// the dispatcher overwrites them before each handler runs.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub params: BTreeMap<String, String>,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            ..Default::default()
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Path parameter captured by the matched route pattern
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Retrieves the value of a specific header.
    ///
    /// Returns `None` if the header is not present or its value is not valid UTF-8.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|value| value.to_str().ok())
    }
}

/// Returns true if `path` declares a parameter segment called `name`.
///
/// Both the `:name` and the `{name}` spellings are recognised.
pub fn has_path_param(path: &str, name: &str) -> bool {
    path.split('/').any(|segment| {
        segment.strip_prefix(':') == Some(name)
            || segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                == Some(name)
    })
}

/// Rewrites `:name` segments into the `{name}` form understood by the path matcher.
pub fn normalize_path_pattern(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) if !name.is_empty() => format!("{{{name}}}"),
            _ => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}
