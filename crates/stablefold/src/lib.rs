pub mod access;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod harness;
pub mod jit;
pub mod matrix;
pub mod policy;
pub mod registry;
pub mod report;
pub mod value;

mod util;

pub use stablefold_kinds::{ElementKind, ReferenceWidth, TargetLayout};
