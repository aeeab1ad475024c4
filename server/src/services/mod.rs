//! Domain services used by the protocol handlers.
//!
//! ARCHITECTURE
//! ============
//! Service modules own accounts, sessions and upstream content so the
//! handlers in `routes` stay focused on the frame-level state machines.

pub mod credentials;
pub mod provider;
pub mod session;
