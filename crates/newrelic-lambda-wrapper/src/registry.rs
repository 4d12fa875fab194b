//! Handler registry keyed by `module.function`.
//!
//! Handlers are compiled into the binary and registered under a module and a
//! function name. `NEW_RELIC_LAMBDA_HANDLER` picks one of them once, at cold
//! start. The module part may use `/` as a separator (`handlers/orders.list`
//! resolves like `handlers.orders.list`).

use crate::error::HandlerError;
use lambda_runtime::{LambdaEvent, service_fn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use tower::util::BoxCloneService;

/// A type-erased user handler.
pub type Handler = BoxCloneService<LambdaEvent<Value>, Value, lambda_runtime::Error>;

/// Registered handlers, by module then function name.
#[derive(Default)]
pub struct HandlerRegistry {
    modules: BTreeMap<String, BTreeMap<String, Handler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an async function as `module.function`.
    ///
    /// Registering the same name twice replaces the earlier handler.
    #[must_use]
    pub fn register<F, Fut>(self, module: &str, function: &str, handler: F) -> Self
    where
        F: Fn(LambdaEvent<Value>) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<Value, lambda_runtime::Error>> + Send + 'static,
    {
        self.register_service(module, function, BoxCloneService::new(service_fn(handler)))
    }

    /// Registers an already boxed service as `module.function`.
    #[must_use]
    pub fn register_service(mut self, module: &str, function: &str, handler: Handler) -> Self {
        self.modules
            .entry(normalize_module(module))
            .or_default()
            .insert(function.to_string(), handler);
        self
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Lists registered handlers as `module.function`, sorted.
    pub fn names(&self) -> Vec<String> {
        self.modules
            .iter()
            .flat_map(|(module, functions)| {
                functions
                    .keys()
                    .map(move |function| format!("{module}.{function}"))
            })
            .collect()
    }

    /// Resolves a handler value such as `app.handler`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Missing`] for an absent or blank value,
    /// [`HandlerError::Malformed`] when there is no `.` separating a module
    /// from a function, and distinct errors for an unknown module and for
    /// an unknown function within a known module.
    pub fn resolve(&self, handler: Option<&str>) -> Result<Handler, HandlerError> {
        let value = handler.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            return Err(HandlerError::Missing);
        }

        let (module, function) = value
            .rsplit_once('.')
            .filter(|(module, function)| !module.is_empty() && !function.is_empty())
            .ok_or_else(|| HandlerError::Malformed(value.to_string()))?;
        let module = normalize_module(module);

        let functions = self
            .modules
            .get(&module)
            .ok_or_else(|| HandlerError::ModuleNotFound(module.clone()))?;

        functions
            .get(function)
            .cloned()
            .ok_or_else(|| HandlerError::FunctionNotFound {
                module,
                function: function.to_string(),
            })
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

fn normalize_module(module: &str) -> String {
    module.replace('/', ".")
}
