pub mod runner;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

pub use runner::{CommandRunner, ProcessRunner};
#[cfg(any(test, feature = "test-util"))]
pub use scripted::{Hold, Invocation, ScriptedRunner};
