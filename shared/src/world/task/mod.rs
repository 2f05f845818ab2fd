//! Remote procedure calls: [`RdCall`](rd_call::RdCall) on one side, [`RdEndpoint`](rd_endpoint::RdEndpoint)
//! on the other, both bound under the same id.

pub mod error;
pub mod rd_call;
pub mod rd_endpoint;
pub mod rd_task;
pub mod rpc_timeouts;
pub mod task_result;
