pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod ids;
pub mod manifest;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod source;
pub mod validator;
