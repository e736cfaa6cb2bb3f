//! WebSocket Layer
//!
//! Real-time discussion rooms over a persistent bidirectional channel.
//!
//! ## Structure
//!
//! - **events**: wire-level event frames (inbound and outbound)
//! - **session**: per-connection state (identity, joined rooms)
//! - **authenticator**: resolves a connection credential to an identity
//! - **coordinator**: per-discussion room state machine and broadcasts
//! - **handler**: axum upgrade handler and the socket read/write loop

pub mod authenticator;
pub mod coordinator;
pub mod events;
pub mod handler;
pub mod session;

pub use authenticator::SessionAuthenticator;
pub use coordinator::{ChatError, Outbound, RoomCoordinator};
pub use events::{ClientEvent, ServerEvent};
pub use handler::ws_handler;
