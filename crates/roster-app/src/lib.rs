// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod directory;
pub mod edits;
pub mod error;
pub mod forms;
pub mod ids;
pub mod list;
pub mod model;
pub mod normalize;
pub mod paging;
pub mod state;

pub use directory::*;
pub use edits::*;
pub use error::*;
pub use forms::*;
pub use ids::*;
pub use list::*;
pub use model::*;
pub use paging::*;
pub use state::*;
