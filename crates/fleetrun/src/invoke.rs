//! # Method Tables
//!
//! A [`Handler`] is a named target exposing a table of methods. Each method
//! binds its wire signature (parameter and result descriptors) to an
//! [`Invoker`] closure. Tables are built once through [`HandlerBuilder`] and
//! immutable afterwards; the protocol addresses methods by bare name, so a
//! name can bind exactly one signature.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use fleetpack::TypeDesc;
use fleetpack::Value;
use fleetrpc::Fault;

/// A bound method body. The first argument is the chain context: the
/// previous entry's result when invoked as part of a chain, `None` for root
/// calls. Failures are returned as [`Fault`]s, never panics.
pub type Invoker =
    Arc<dyn Fn(Option<&Value>, &[Value]) -> std::result::Result<Value, Fault> + Send + Sync>;

/// Registration-time usage errors. These fail fast, before any bytes move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The method name is already bound; names carry no signature, so the
    /// protocol cannot address overloads.
    DuplicateMethod(String),
    NoSuchMethod(String),
    /// The target name is already registered.
    DuplicateTarget(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateMethod(name) => write!(f, "method {} is already registered", name),
            Self::NoSuchMethod(name) => write!(f, "no method named {}", name),
            Self::DuplicateTarget(name) => write!(f, "target {} is already registered", name),
        }
    }
}

impl std::error::Error for RegistryError {}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// One entry of a method table.
pub struct MethodSpec {
    pub name: String,
    pub param_descs: Vec<TypeDesc>,
    pub result_desc: TypeDesc,
    pub invoker: Invoker,
}

/// A named call target with its method table.
pub struct Handler {
    name: String,
    methods: DashMap<String, Arc<MethodSpec>>,
}

impl Handler {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lock-free per-name method lookup.
    pub fn method(&self, name: &str) -> Result<Arc<MethodSpec>> {
        self.methods
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::NoSuchMethod(name.to_string()))
    }
}

/// Builds a [`Handler`], validating method-name uniqueness at registration.
pub struct HandlerBuilder {
    name: String,
    methods: DashMap<String, Arc<MethodSpec>>,
}

impl HandlerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), methods: DashMap::new() }
    }

    /// Binds a method. Fails with [`RegistryError::DuplicateMethod`] if the
    /// name is already taken.
    pub fn method<F>(
        self,
        name: impl Into<String>,
        param_descs: Vec<TypeDesc>,
        result_desc: TypeDesc,
        invoker: F,
    ) -> Result<Self>
    where
        F: Fn(Option<&Value>, &[Value]) -> std::result::Result<Value, Fault>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let spec = Arc::new(MethodSpec {
            name: name.clone(),
            param_descs,
            result_desc,
            invoker: Arc::new(invoker),
        });
        let result = match self.methods.entry(name) {
            Entry::Occupied(entry) => Err(RegistryError::DuplicateMethod(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(spec);
                Ok(())
            }
        };
        result.map(|()| self)
    }

    pub fn build(self) -> Handler {
        Handler { name: self.name, methods: self.methods }
    }
}
