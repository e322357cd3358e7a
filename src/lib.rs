pub mod config;
pub mod executor;
pub mod metrics;
pub mod response;
pub mod scenario;
pub mod template;
pub mod validator;
