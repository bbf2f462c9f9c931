//! Unit tests for sous modules through the public API
//!
//! Everything here runs locally: commands are plain `sh` builtins executed
//! in a temporary directory.

mod test_condition;
mod test_engine;
mod test_expander;
mod test_recipe;
mod test_template;
