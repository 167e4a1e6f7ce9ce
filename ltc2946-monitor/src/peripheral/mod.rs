//! Peripheral chip drivers.
//!
//! Drivers here are generic over the hw_trait interfaces, so they run on
//! any bus implementation.

pub mod ltc2946;
