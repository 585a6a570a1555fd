pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod node;
pub mod reporter;
pub mod shutdown;
pub mod task;
pub mod validator;
pub mod worker;
