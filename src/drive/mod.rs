//! Google Drive service adapter
//!
//! Resolves a valid (refreshed when necessary) credential for a client
//! identifier and performs the Drive API calls on its behalf.

mod client;

pub use client::{AccessCredential, DriveClient, DriveFile};
