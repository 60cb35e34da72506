//! CLI command implementations

mod create;
mod serve;

pub use create::{CreateArgs, cmd_create};
pub use serve::{ServeArgs, cmd_serve};
