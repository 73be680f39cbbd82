//! Command line surface

use std::path::PathBuf;

use clap::Parser;

use crate::domain::sort_order::FetchPlan;

#[derive(Parser, Debug)]
#[command(name = "kindle-shelf")]
#[command(version)]
#[command(
    about = "Extracts an account's e-book ownership list to JSON and CSV",
    long_about = "Signs into the account, then reconstructs the full e-book list from the \
        capped ownership endpoint by querying it under six sort orders and merging the \
        results. Libraries beyond roughly 2000 items cannot be fully recovered; that is \
        a limit of the endpoint, not of this tool."
)]
pub struct Args {
    /// Account e-mail address
    pub email: String,

    /// Account password; prompted for on the terminal when omitted
    pub password: Option<String>,

    /// Only fetch the latest items: a single descending-date pass, capped
    /// at the endpoint's 1000-record ceiling
    #[arg(long)]
    pub latest: bool,

    /// Directory the output files and diagnostics are written into
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Items per page request (the endpoint refuses batches above 100)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub batch_size: Option<u32>,

    /// Explicit configuration file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Args {
    /// The sort-order plan this invocation asks for.
    pub fn fetch_plan(&self) -> FetchPlan {
        if self.latest {
            FetchPlan::latest()
        } else {
            FetchPlan::full()
        }
    }
}
