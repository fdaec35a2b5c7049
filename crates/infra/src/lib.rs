//! Host-side stand-ins for the Banddrive engine
//!
//! - [`audio::OfflineRenderer`]: drives the engine block by block the way an
//!   audio callback would
//! - [`audio::ScopeDisplay`]: drains the visualization queue on a display tick

pub mod audio;
