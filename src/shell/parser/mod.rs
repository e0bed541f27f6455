pub mod ast;
mod lexer;
mod parser;

pub use lexer::RedirectOp;
pub use parser::Parser;
