pub mod ast;
pub mod options;
pub mod program;
pub mod span;
pub mod syntax;
