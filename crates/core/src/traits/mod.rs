pub mod checkpoint;
pub mod event_sink;
pub mod matrix_meta;
pub mod process;

pub use checkpoint::*;
pub use event_sink::*;
pub use matrix_meta::*;
pub use process::*;
