//! Wires arguments, configuration and the reconciler together

use crate::cli::args::Args;
use crate::common::Timer;
use crate::desired_state::DesiredState;
use crate::logging::Logger;
use crate::reconcile::{ReconcileError, ReconcileReport, Reconciler};
use crate::registry::RegistryClient;

pub struct Runner {
    args: Args,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        // stdout carries only the report in json mode
        let output = if args.quiet || args.output == "json" {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };

        Self { args, output }
    }

    pub fn output(&self) -> &Logger {
        &self.output
    }

    pub async fn run(&self) -> Result<ReconcileReport, ReconcileError> {
        let timer = Timer::start("Registry sync");
        self.output.section("Registry Sync");

        self.args.validate()?;
        let desired = DesiredState::from_path(&self.args.file)?;
        self.output.info(&format!(
            "Loaded {} declared repositories from {}",
            desired.len(),
            self.args.file.display()
        ));

        let credentials = self.args.credentials()?;
        let config = self.args.registry_config();
        let client = RegistryClient::builder(credentials)
            .with_config(config)
            .with_output(self.output.clone())
            .build()?;
        self.output
            .info(&format!("Target registry: {}", client.address()));

        let options = self.args.reconcile_options();
        if options.dry_run {
            self.output
                .info("Dry run mode - nothing will be deleted");
        }

        self.output.subsection("Reconciling");
        let report = Reconciler::new(&client, &desired)
            .with_options(options)
            .with_observer(&self.output)
            .run()
            .await?;

        timer.log_elapsed(&self.output);
        Ok(report)
    }

    /// Print `report` in the requested format, even in quiet mode
    pub fn print_report(&self, report: &ReconcileReport) {
        match self.render_report(report) {
            Ok(rendered) => println!("{}", rendered),
            Err(e) => self.output.error(&format!("Failed to render report: {}", e)),
        }
    }

    pub fn render_report(&self, report: &ReconcileReport) -> serde_json::Result<String> {
        if self.args.output == "json" {
            return serde_json::to_string_pretty(report);
        }

        let counts = [
            ("Repositories scanned", report.repositories_scanned),
            ("Tags scanned", report.tags_scanned),
            ("Repositories removed", report.deleted_repositories.len()),
            ("Tags removed", report.deleted.len()),
            ("Delete requests", report.delete_calls),
            ("Skipped", report.skipped.len()),
            ("Failed", report.failures.len()),
        ];

        let mut lines = vec!["--- Summary ---".to_string()];
        lines.extend(counts.iter().map(|(key, value)| format!("  {}: {}", key, value)));

        let changes = report.summary_lines();
        lines.push(String::new());
        lines.push("📋 Changes".to_string());
        if changes.is_empty() {
            lines.push("  (No items to display)".to_string());
        }
        lines.extend(changes.iter().map(|line| format!("  • {}", line)));

        if report.is_clean() {
            lines.push("✅ Registry matches the desired state".to_string());
        }

        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::DeletedTag;
    use clap::Parser;

    fn runner(extra: &[&str]) -> Runner {
        let mut argv = vec![
            "registry-sync",
            "-r",
            "registry.local",
            "-u",
            "ci",
            "-f",
            "state.yaml",
        ];
        argv.extend_from_slice(extra);
        Runner::new(Args::try_parse_from(argv).unwrap())
    }

    fn report() -> ReconcileReport {
        ReconcileReport {
            repositories_scanned: 1,
            tags_scanned: 2,
            deleted: vec![DeletedTag {
                repository: "app".to_string(),
                tag: "old".to_string(),
                digest: Some(format!("sha256:{}", "a".repeat(64))),
            }],
            delete_calls: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_json_mode_silences_status_output() {
        assert!(runner(&["-o", "json"]).output().quiet);
        assert!(!runner(&[]).output().quiet);
    }

    #[test]
    fn test_json_report_is_the_whole_output() {
        let rendered = runner(&["-o", "json"]).render_report(&report()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["delete_calls"], 1);
        assert_eq!(parsed["deleted"][0]["tag"], "old");
    }

    #[test]
    fn test_quiet_mode_still_renders_report() {
        let runner = runner(&["-q"]);
        assert!(runner.output().quiet);

        let rendered = runner.render_report(&report()).unwrap();
        assert!(rendered.contains("Tags removed: 1"));
        assert!(rendered.contains("app:old"));
    }
}
