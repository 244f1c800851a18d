// Control client
//
// Used by step commands (`worker tmpl`) to call the worker daemon that runs
// the current job.

mod tmpl_client;

pub use tmpl_client::{resolve_port, run_tmpl, ClientError, TmplClient};
