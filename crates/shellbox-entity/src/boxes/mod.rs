//! Box entity.

pub mod model;

pub use model::{NewShellBox, ShellBox};
