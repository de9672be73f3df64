//! The compiler seam.
//!
//! The harness drives any system under test through [`Compiler`] and
//! [`CompiledArtifact`]. [`model::ModelJit`] is the in-tree implementation.

use serde::Serialize;
use thiserror::Error;

use crate::access::AccessDescriptor;
use crate::registry::{ContainerHandle, StableRegistry};
use crate::value::Value;

pub mod graph;
pub mod interp;
pub mod model;
pub mod optimize;

/// Explicit handle to the method under compilation: a named body whose call
/// sites are raw reads of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetMethod {
    pub name: String,
    pub container: ContainerHandle,
    pub call_sites: Vec<AccessDescriptor>,
}

impl TargetMethod {
    pub fn raw_read(container: ContainerHandle, access: AccessDescriptor) -> Self {
        let mut name = format!(
            "read{}_{}",
            access.source_kind.descriptor(),
            access.requested_kind.descriptor()
        );
        if access.byte_offset != 0 {
            name.push_str(&format!("_off{}", access.byte_offset));
        }
        Self {
            name,
            container,
            call_sites: vec![access],
        }
    }

    /// The single read this method performs, or `None` if the method has zero
    /// or several call sites.
    pub fn single_call_site(&self) -> Option<&AccessDescriptor> {
        match self.call_sites.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("compilation of {method} failed: {message}")]
pub struct CompilationError {
    pub method: String,
    pub message: String,
}

impl CompilationError {
    pub fn new(method: &str, message: impl Into<String>) -> Self {
        Self {
            method: method.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{method} trapped: {message}")]
pub struct RuntimeTrap {
    pub method: String,
    pub message: String,
}

impl RuntimeTrap {
    pub fn new(method: &str, message: impl Into<String>) -> Self {
        Self {
            method: method.to_string(),
            message: message.into(),
        }
    }
}

pub trait Compiler {
    type Artifact: CompiledArtifact;

    /// Executes `method` without compiling it.
    fn call_uncompiled(
        &self,
        method: &TargetMethod,
        registry: &StableRegistry,
    ) -> Result<Value, RuntimeTrap>;

    /// Compiles exactly `method`. Blocks until an artifact or an error is produced.
    fn compile(
        &self,
        method: &TargetMethod,
        registry: &StableRegistry,
    ) -> Result<Self::Artifact, CompilationError>;
}

pub trait CompiledArtifact {
    fn method(&self) -> &str;

    fn invoke(&self, registry: &StableRegistry) -> Result<Value, RuntimeTrap>;

    /// Whether the compiled representation returns a constant folded from a
    /// stable read. `None` when the artifact cannot be introspected.
    fn is_constant_folded_stable_read(&self) -> Option<bool> {
        None
    }
}
