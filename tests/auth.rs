#[path = "auth/integration/mod.rs"]
mod integration;
#[path = "auth/support.rs"]
mod support;
