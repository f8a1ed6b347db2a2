//! Argument parsing, query loading and the retry driver behind the `ragqa` binary.

pub mod args;
pub mod driver;
pub mod queries;

pub use args::{parse_run_args, RunArgs};
pub use driver::{Driver, DriverOutcome, Mode};
pub use queries::{load_queries_file, samples_from_queries};
