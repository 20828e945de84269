mod error;
mod lexer;
mod snapshot;


pub use error::*;
pub use lexer::*;
pub use snapshot::*;
