//! Synthetic namespace hierarchies for policy control-plane scale tests.
//!
//! This crate provisions namespace trees in a remote policy control-plane and
//! distributes namespace mapping policies that bind simulated agents to a
//! fixed number of capacity-bounded namespaces. Tag and namespace assignment
//! is deterministic so that load test runs are reproducible.
//!
//! The remote store is reached through [`tower`] services, see [`transport`].

#[cfg(test)]
mod tests;

pub mod config;
pub mod provisioning;
pub mod transport;

pub mod simharness_tracing {
    use std::sync::Once;
    use tracing_subscriber::{EnvFilter, fmt};

    static INIT: Once = Once::new();

    /// Initialize tracing for tests
    /// This sets up a tracing subscriber that will display logs during test execution.
    /// Call this at the beginning of tests that need to see tracing output.
    pub fn init() {
        INIT.call_once(|| {
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));

            let _ = fmt().with_target(false).with_test_writer().with_env_filter(filter).try_init();
        });
    }
}
