//! Shared helpers: Arrow column handling, Parquet IO and logging.

pub mod arrow;
pub mod io;
pub mod logging;
