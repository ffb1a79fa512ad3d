// src/core/state/client.rs

//! Contains state definitions related to client connections.

use crate::connection::SessionControl;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Live sessions keyed by session id, with the handle used to close them.
pub type ClientMap = Arc<DashMap<u64, (ClientInfo, SessionControl)>>;

#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub addr: SocketAddr,
    pub session_id: u64,
    pub created: Instant,
}
