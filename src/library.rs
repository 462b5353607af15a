//! Track loading: walks a folder, keeps the audio files and turns them into
//! an ordered list of [`Track`]s.

mod display;
mod model;
mod probe;
mod scan;

pub use model::*;
pub use scan::scan;
