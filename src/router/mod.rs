// Route table for the management API.
//
// Descriptors are registered once at startup and are read-only afterwards.
// Matching prefers literal segments over parameters, left to right; among
// equally specific candidates the first registered wins. Registering the same
// method and path shape twice fails the build.

pub mod dispatch;
pub mod lifecycle;
pub mod routes;

use axum::http::Method;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::handlers::Action;
use crate::middleware::{Gate, ValidationGate};
use crate::validation::Schema;
use lifecycle::RequestState;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route {method} {path} is already registered")]
    Duplicate { method: Method, path: String },

    #[error("route {method} {path}: gate '{gate}' validates after authentication")]
    GateOrder {
        method: Method,
        path: String,
        gate: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Self {
        let segments = split_path(raw)
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(segment.to_string()),
            })
            .collect();

        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Match concrete path segments, returning the captured parameters
    pub fn matches(&self, path: &[&str]) -> Option<Vec<(String, String)>> {
        if path.len() != self.segments.len() {
            return None;
        }

        let mut params = Vec::new();
        for (segment, value) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(literal) if literal == value => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => params.push((name.clone(), value.to_string())),
            }
        }
        Some(params)
    }

    /// One flag per segment, `true` for literals. Compared lexicographically.
    fn specificity(&self) -> Vec<bool> {
        self.segments
            .iter()
            .map(|s| matches!(s, Segment::Literal(_)))
            .collect()
    }

    /// Pattern with parameter names erased: `/users/:userId` and `/users/:id`
    /// describe the same route.
    fn shape(&self) -> Vec<Option<&str>> {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(l) => Some(l.as_str()),
                Segment::Param(_) => None,
            })
            .collect()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// An immutable route: method, path pattern, ordered gates and the one
/// operation it dispatches to.
pub struct RouteDescriptor {
    pub method: Method,
    pub pattern: PathPattern,
    pub gates: Vec<Arc<dyn Gate>>,
    pub action: Action,
}

impl RouteDescriptor {
    pub fn gate_names(&self) -> Vec<&'static str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    pub fn requires_auth(&self) -> bool {
        self.gates.iter().any(|g| g.stage() == RequestState::Authenticating)
    }

    pub fn has_validator(&self) -> bool {
        self.gates.iter().any(|g| g.stage() == RequestState::Validating)
    }
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("method", &self.method)
            .field("pattern", &self.pattern.raw)
            .field("gates", &self.gate_names())
            .field("action", &self.action)
            .finish()
    }
}

pub struct RouteTableBuilder {
    prefix: String,
    routes: Vec<RouteDescriptor>,
    blanket: Vec<Arc<dyn Gate>>,
}

impl fmt::Debug for RouteTableBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTableBuilder")
            .field("prefix", &self.prefix)
            .field("routes", &self.routes)
            .field(
                "blanket",
                &self.blanket.iter().map(|g| g.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl RouteTableBuilder {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
            routes: Vec::new(),
            blanket: Vec::new(),
        }
    }

    /// Append a gate to every route registered from now on
    pub fn use_gate(&mut self, gate: Arc<dyn Gate>) -> &mut Self {
        tracing::debug!("Blanket gate '{}' installed under {}", gate.name(), self.prefix);
        self.blanket.push(gate);
        self
    }

    /// Register a route with an optional validator followed by the blanket gates
    pub fn route(
        &mut self,
        method: Method,
        path: &str,
        validator: Option<Schema>,
        action: Action,
    ) -> Result<&mut Self, RouteError> {
        let gates = validator
            .map(|schema| Arc::new(ValidationGate::new(schema)) as Arc<dyn Gate>)
            .into_iter()
            .collect();
        self.register(method, path, gates, action)
    }

    /// Register a route with explicit gates; blanket gates are appended after them
    pub fn register(
        &mut self,
        method: Method,
        path: &str,
        gates: Vec<Arc<dyn Gate>>,
        action: Action,
    ) -> Result<&mut Self, RouteError> {
        let full_path = format!("{}{}", self.prefix, path);
        let pattern = PathPattern::parse(&full_path);

        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.pattern.shape() == pattern.shape())
        {
            return Err(RouteError::Duplicate {
                method,
                path: full_path,
            });
        }

        let gates: Vec<Arc<dyn Gate>> = gates.into_iter().chain(self.blanket.iter().cloned()).collect();

        let mut authenticated = false;
        for gate in &gates {
            match gate.stage() {
                RequestState::Authenticating => authenticated = true,
                RequestState::Validating if authenticated => {
                    return Err(RouteError::GateOrder {
                        method,
                        path: full_path,
                        gate: gate.name(),
                    });
                }
                _ => {}
            }
        }

        tracing::debug!("Registered route {} {} -> {:?}", method, full_path, action);
        self.routes.push(RouteDescriptor {
            method,
            pattern,
            gates,
            action,
        });
        Ok(self)
    }

    pub fn build(self) -> RouteTable {
        RouteTable { routes: self.routes }
    }
}

/// Outcome of looking up a request path
#[derive(Debug)]
pub enum Resolution<'a> {
    Matched {
        route: &'a RouteDescriptor,
        params: Vec<(String, String)>,
    },
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
}

impl RouteTable {
    pub fn descriptors(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Resolution<'_> {
        let segments: Vec<&str> = split_path(path).collect();
        let mut best: Option<(&RouteDescriptor, Vec<(String, String)>, Vec<bool>)> = None;
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.matches(&segments) else {
                continue;
            };

            if route.method != *method {
                if !allowed.contains(&route.method) {
                    allowed.push(route.method.clone());
                }
                continue;
            }

            let specificity = route.pattern.specificity();
            // Strictly greater only: ties keep the earlier registration
            let better = best.as_ref().map_or(true, |(_, _, current)| specificity > *current);
            if better {
                best = Some((route, params, specificity));
            }
        }

        match best {
            Some((route, params, _)) => Resolution::Matched { route, params },
            None if !allowed.is_empty() => Resolution::MethodNotAllowed(allowed),
            None => Resolution::NotFound,
        }
    }
}
