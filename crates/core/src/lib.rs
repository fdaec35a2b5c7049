//! Banddrive core: a four-band distortion processor
//!
//! All real-time DSP lives under [`domain`]; hosts drive it through
//! [`domain::MultibandDistortion`] and [`domain::SharedControls`].

pub mod domain;
