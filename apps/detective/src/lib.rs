use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre;
use tracing_subscriber::EnvFilter;

use detective_service::{DetectiveService, InvestigationReport};
use detective_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = detective_cli::VERSION,
	rename_all = "kebab",
	styles = detective_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Agent name recorded on the investigation. Defaults to `agent.name`.
	#[arg(long, short = 'a', value_name = "NAME")]
	pub agent: Option<String>,
	/// Print the report as JSON.
	#[arg(long)]
	pub json: bool,
	#[arg(value_name = "QUESTION", num_args = 1.., required = true)]
	pub question: Vec<String>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = detective_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let question = question_text(&args.question)?;
	let db = Db::connect(&config.storage.postgres).await?;
	let service = DetectiveService::new(config, db);
	let report = service.investigate(&question, args.agent.as_deref()).await?;

	if args.json {
		println!("{}", serde_json::to_string_pretty(&report)?);
	} else {
		println!("{}", render_report(&report));
	}

	if !report.success {
		tracing::warn!(question_id = %report.question_id, "Investigation did not complete.");
	}

	Ok(())
}

fn question_text(words: &[String]) -> color_eyre::Result<String> {
	let question = words.join(" ");
	let question = question.trim();

	if question.is_empty() {
		return Err(eyre::eyre!("Question must be non-empty."));
	}

	Ok(question.to_string())
}

fn render_report(report: &InvestigationReport) -> String {
	format!(
		"{}\n\nInvestigation {} | steps: {} | duration: {} ms",
		report.answer, report.question_id, report.steps, report.duration_ms
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn question_words_are_joined_and_trimmed() {
		let words = vec!["Why".to_string(), "did".to_string(), "sales drop? ".to_string()];

		assert_eq!(question_text(&words).expect("non-empty"), "Why did sales drop?");
		assert!(question_text(&["  ".to_string()]).is_err());
	}

	#[test]
	fn args_require_a_question() {
		assert!(Args::try_parse_from(["detective", "-c", "detective.toml"]).is_err());

		let args = Args::try_parse_from([
			"detective",
			"-c",
			"detective.toml",
			"--agent",
			"auditor",
			"why",
			"now",
		])
		.expect("valid arguments");

		assert_eq!(args.agent.as_deref(), Some("auditor"));
		assert_eq!(args.question, vec!["why", "now"]);
	}
}
