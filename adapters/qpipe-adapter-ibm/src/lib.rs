//! Remote QObject accelerator for qpipe.
//!
//! The `ibm` accelerator marshals kernels into a QObject envelope, POSTs it
//! to `{endpoint}/v1/jobs` with a bearer token, and decodes the hex-keyed
//! counts of the result document into one buffer per kernel. Timeouts,
//! retries and transport errors are handled by
//! [`RemoteAccelerator`](qpipe_hal::RemoteAccelerator).
//!
//! # Configuration
//!
//! | key        | meaning                                   | default                  |
//! |------------|-------------------------------------------|--------------------------|
//! | `endpoint` | service base URL                          | [`DEFAULT_ENDPOINT`]     |
//! | `token`    | API token, required before execution      | none                     |
//! | `backend`  | device name sent in the envelope          | [`DEFAULT_DEVICE`]       |
//! | `shots`    | shots per experiment                      | 1024                     |
//! | `n-qubits` | device width                              | [`DEFAULT_N_QUBITS`]     |

mod backend;
mod plugin;

pub use backend::{DEFAULT_DEVICE, DEFAULT_ENDPOINT, DEFAULT_N_QUBITS, IbmAccelerator, IbmBackend};
pub use plugin::IbmPlugin;
