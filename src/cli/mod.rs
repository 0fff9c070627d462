pub mod auth;
pub mod call;
pub mod output;
pub mod status;
pub mod tools;
