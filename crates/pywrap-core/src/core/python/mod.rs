mod interpreter;

pub use interpreter::{resolve_base_python, BaseInterpreter};
