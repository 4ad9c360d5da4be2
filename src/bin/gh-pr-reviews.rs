use github_review_stats::api::Api;
use github_review_stats::cli;
use github_review_stats::paginate::SystemClock;
use github_review_stats::reviews;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let matches = cli::build_reviews_cli().get_matches();
    cli::init_logging(matches.get_one::<String>("log-level").map(String::as_str));

    let opts = cli::review_list_options(&matches);
    let api = Api::new(cli::api_config(&matches))?;
    for line in reviews::run(&api, &opts, &SystemClock).await? {
        println!("{}", line);
    }
    Ok(())
}
