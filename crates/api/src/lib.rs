//! HTTP surface for the access layer: login, logout, token introspection,
//! account administration, and the bearer and permission layers that guard
//! routes.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
