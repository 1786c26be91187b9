//! The `utils` module provides definitions shared across the `popmqtt` broker:
//! the error taxonomy and logging initialisation.

pub mod error;
pub mod logging;
