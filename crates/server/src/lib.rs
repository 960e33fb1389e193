pub mod actor;
pub mod binder;
pub mod errors;
pub mod observability;
pub mod routes;
pub mod startup;

pub use binder::{RouteBinder, Verb};
pub use startup::{build_app, run, run_with};
