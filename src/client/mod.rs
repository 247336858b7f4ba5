//! Client half of the relay: reports the local position and draws everyone else's.

pub mod geolocation;
pub mod renderer;
pub mod reporter;
pub mod session;
