use anyhow::Context;
use github_review_stats::api::Api;
use github_review_stats::cli;
use github_review_stats::credits;
use github_review_stats::paginate::SystemClock;
use github_review_stats::store::{FileRepoCache, ResultsDir};
use log::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let matches = cli::build_credits_cli().get_matches();
    cli::init_logging(matches.get_one::<String>("log-level").map(String::as_str));

    let opts = cli::credit_options(&matches)?;
    let cache = FileRepoCache::new(
        matches
            .get_one::<String>("repo-cache")
            .context("missing --repo-cache")?,
    );
    let mut sink = ResultsDir::new(
        matches
            .get_one::<String>("results-dir")
            .context("missing --results-dir")?,
    );
    let api = Api::new(cli::api_config(&matches))?;

    let reports = credits::run(&api, &opts, &cache, &mut sink, &SystemClock).await?;
    for report in &reports {
        info!(
            "{}: {} credits -> {}",
            report.repo,
            report.lines,
            sink.file_for(&report.repo).display()
        );
    }
    Ok(())
}
