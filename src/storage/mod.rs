//! Durable on-disk persistence for collected samples.

mod rotating;

pub use rotating::RotatingSink;
