pub mod policy;
pub mod route;
pub mod snapshot;
