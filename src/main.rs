//! Registry Sync - deletes everything from a Docker registry that the desired
//! state does not declare

use registry_sync::cli::{Args, Runner};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse_args();
    let runner = Runner::new(args);

    match runner.run().await {
        Ok(report) => {
            runner.print_report(&report);
            if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                runner
                    .output()
                    .error(&format!("{} deletions failed", report.failures.len()));
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            runner.output().error(&err.to_string());
            if !err.report.deleted.is_empty() {
                runner.print_report(&err.report);
            }
            ExitCode::FAILURE
        }
    }
}
