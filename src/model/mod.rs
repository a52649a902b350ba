pub mod config;
pub mod installation;
pub mod settings;
pub mod state;
