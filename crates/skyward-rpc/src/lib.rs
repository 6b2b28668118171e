pub mod api;
pub mod server;
pub mod types;

pub use api::SkywardApiServer;
pub use server::{RpcServer, RpcServerState};
pub use types::*;
