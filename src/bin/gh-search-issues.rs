use github_review_stats::api::Api;
use github_review_stats::cli;
use github_review_stats::paginate::SystemClock;
use github_review_stats::search;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let matches = cli::build_search_cli().get_matches();
    cli::init_logging(matches.get_one::<String>("log-level").map(String::as_str));

    let opts = cli::search_options(&matches)?;
    let api = Api::new(cli::api_config(&matches))?;
    for line in search::run(&api, &opts, &SystemClock).await? {
        println!("{}", line);
    }
    Ok(())
}
