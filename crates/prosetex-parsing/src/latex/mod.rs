//! LaTeX scanner: a character-driven state machine with a signature
//! matcher for command and environment arguments.

pub mod builder;
pub mod defaults;
pub mod signature;

pub use builder::LatexAnnotatedTextBuilder;
pub use signature::{Action, ArgumentType, CommandSignature, EnvironmentSignature};
