//! Response runner: retrieve passages for each query, format the prompt,
//! call the generator, and append the results to an NDJSON file.

pub mod output;
pub mod report;
pub mod runner;

pub use output::append_jsonl;
pub use report::{ItemFailure, ProbaRecord, ProbaReport, ResponseRecord, RunReport};
pub use runner::{RagCall, ResponseRunner, RunnerComponents, RunnerInput};
