// Copyright (c) 2023 MASSA LABS <info@massa.net>

//! Ordered key-value backend abstraction for FluxDB.
//!
//! The engine never talks to a concrete database: it goes through
//! [`StoreController`], which exposes exactly the operations the versioned
//! store needs (point get, ranged scan, first-at-or-after lookup for the
//! reverse-block-num index keys, and atomic batch writes spanning the three
//! key families).

mod constants;
mod controller;
mod error;
mod settings;
mod store_batch;

pub use constants::*;
pub use controller::*;
pub use error::*;
pub use settings::*;
pub use store_batch::*;
