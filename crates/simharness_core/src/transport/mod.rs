//! Policy store transports.
//!
//! Each transport is a [`tower::Service`] over
//! [`StoreRequest`](crate::provisioning::api::StoreRequest):
//! - [`http::StoreHttp`] talks to a real control-plane API,
//! - [`loopback::StoreLoopback`] keeps everything in memory for tests and dry runs,
//! - [`nop::StoreNop`] acknowledges everything.

pub mod http;
pub mod loopback;
pub mod nop;
