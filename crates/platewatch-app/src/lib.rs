// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod forms;
pub mod ids;
pub mod keys;
pub mod map;
pub mod model;
pub mod query;
pub mod review;
pub mod state;
pub mod store;
pub mod table;

pub use forms::*;
pub use ids::*;
pub use keys::*;
pub use map::*;
pub use model::*;
pub use query::*;
pub use review::*;
pub use state::*;
pub use store::*;
pub use table::*;
