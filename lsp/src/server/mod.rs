mod config;
mod entry;
mod handlers;
mod state;
mod text;

pub use config::ServerConfig;
pub use entry::run;
pub use state::QlsLanguageServer;
