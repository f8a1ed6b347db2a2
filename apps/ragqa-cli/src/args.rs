use anyhow::{bail, Context, Result};
use std::path::PathBuf;

pub const USAGE: &str = "Usage: ragqa run [--queries-file FILE] [--proba K] [query...]";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunArgs {
    pub queries_file: Option<PathBuf>,
    /// Score the top-K next tokens instead of generating a response.
    pub proba: Option<usize>,
    pub queries: Vec<String>,
}

/// Parse everything after `run`.
pub fn parse_run_args(args: &[String]) -> Result<RunArgs> {
    let mut out = RunArgs::default();
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--queries-file" => {
                let path = it.next().context("--queries-file needs a path")?;
                out.queries_file = Some(PathBuf::from(path));
            }
            "--proba" => {
                let k = it.next().context("--proba needs a number")?;
                let k: usize = k.parse().with_context(|| format!("--proba expects a positive integer, got '{}'", k))?;
                if k == 0 { bail!("--proba must be > 0"); }
                out.proba = Some(k);
            }
            flag if flag.starts_with("--") => bail!("Unknown option {}\n{}", flag, USAGE),
            query => out.queries.push(query.to_string()),
        }
    }
    if out.queries.is_empty() && out.queries_file.is_none() { bail!("No queries given\n{}", USAGE); }
    Ok(out)
}
