//! Application module: exposes the view model used by the TUI and runtime.
//!
//! The `App` model lives in `app::model` and holds the latest session
//! snapshot plus cursor and prompt state.

mod model;

pub use model::*;
