pub mod ast;
pub mod inspect;
pub mod pipeline;
pub mod settings;
pub mod token;
pub mod typ;

pub use pipeline::{try_inspect, try_lex, try_parse, try_snapshot};
pub use settings::Settings;
