pub mod config;
pub mod profile;
pub mod security;
pub mod server;
pub mod store;
pub mod translate;
pub mod validator;
