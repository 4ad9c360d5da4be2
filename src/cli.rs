use crate::config::Config;
use crate::credits::{parse_date_floor, CreditOptions, DEFAULT_SINCE};
use crate::error::Result;
use crate::reviews::{ReviewListOptions, PULLS_PAGE_SIZE};
use crate::search::SearchOptions;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

fn with_common_args(cmd: Command) -> Command {
    cmd.version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("authtoken")
                .long("authtoken")
                .env("GITHUB_TOKEN")
                .hide_env_values(true)
                .required(true)
                .num_args(1)
                .help("OAuth2 token for access to the GitHub API"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .num_args(1)
                .help("Override RUST_LOG level (e.g., info, debug)"),
        )
}

fn per_page_arg(default: &'static str) -> Arg {
    Arg::new("per-page")
        .long("per-page")
        .value_parser(value_parser!(u32).range(1..=100))
        .default_value(default)
        .help("Items requested per page")
}

pub fn build_search_cli() -> Command {
    with_common_args(Command::new("gh-search-issues"))
        .about("Search GitHub issues and pull requests, oldest first")
        .arg(
            Arg::new("query")
                .required(true)
                .help("Search qualifiers, e.g. 'is:pr repo:owner/name'"),
        )
        .arg(
            Arg::new("since")
                .long("since")
                .num_args(1)
                .help("Drop hits created before this date (YYYY-MM-DD)"),
        )
        .arg(per_page_arg("100"))
}

pub fn build_reviews_cli() -> Command {
    with_common_args(Command::new("gh-pr-reviews"))
        .about("Print every review record on the pull requests of one repository")
        .arg(
            Arg::new("owner")
                .long("owner")
                .required(true)
                .num_args(1)
                .help("The GitHub user or organization name"),
        )
        .arg(
            Arg::new("repo")
                .long("repo")
                .required(true)
                .num_args(1)
                .help("Repository under the owner"),
        )
        .arg(
            Arg::new("state")
                .long("state")
                .value_parser(["open", "closed", "all"])
                .default_value("closed")
                .help("Pull request state to list"),
        )
        .arg(
            Arg::new("number")
                .long("number")
                .value_parser(value_parser!(u64))
                .help("Only report this pull request"),
        )
        .arg(per_page_arg("50"))
}

pub fn build_credits_cli() -> Command {
    with_common_args(Command::new("gh-review-credits"))
        .about("Credit approving reviewers and LGTM commenters of merged pull requests")
        .arg(
            Arg::new("owner")
                .long("owner")
                .required(true)
                .num_args(1)
                .help("The GitHub organization name"),
        )
        .arg(
            Arg::new("repo")
                .long("repo")
                .num_args(1)
                .help("Only process this repository"),
        )
        .arg(
            Arg::new("number")
                .long("number")
                .value_parser(value_parser!(u64))
                .help("Only process this pull request number"),
        )
        .arg(
            Arg::new("since")
                .long("since")
                .default_value(DEFAULT_SINCE)
                .help("Ignore pull requests merged before this date (YYYY-MM-DD)"),
        )
        .arg(
            Arg::new("results-dir")
                .long("results-dir")
                .default_value("results")
                .help("Directory receiving one <repo>.txt per repository"),
        )
        .arg(
            Arg::new("repo-cache")
                .long("repo-cache")
                .default_value("repos.txt")
                .help("File caching the organization's repository names"),
        )
        .arg(
            Arg::new("refresh-cache")
                .long("refresh-cache")
                .action(ArgAction::SetTrue)
                .help("Re-list repositories even when the cache file exists"),
        )
        .arg(per_page_arg("50"))
}

pub fn init_logging(level: Option<&str>) {
    // Explicit level wins; otherwise RUST_LOG, defaulting to info.
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(lvl) = level {
        builder.parse_filters(lvl);
    }
    builder.init();
}

fn string(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.get_one::<String>(id).cloned()
}

fn per_page(matches: &ArgMatches) -> u32 {
    matches.get_one::<u32>("per-page").copied().unwrap_or(PULLS_PAGE_SIZE)
}

pub fn api_config(matches: &ArgMatches) -> Config {
    Config::with_token(string(matches, "authtoken").unwrap_or_default())
}

pub fn search_options(matches: &ArgMatches) -> Result<SearchOptions> {
    let since = string(matches, "since")
        .map(|s| parse_date_floor(&s))
        .transpose()?;
    Ok(SearchOptions {
        query: string(matches, "query").unwrap_or_default(),
        since,
        per_page: per_page(matches),
    })
}

pub fn review_list_options(matches: &ArgMatches) -> ReviewListOptions {
    ReviewListOptions {
        owner: string(matches, "owner").unwrap_or_default(),
        repo: string(matches, "repo").unwrap_or_default(),
        state: string(matches, "state").unwrap_or_else(|| "closed".into()),
        number: matches.get_one::<u64>("number").copied(),
        per_page: per_page(matches),
    }
}

pub fn credit_options(matches: &ArgMatches) -> Result<CreditOptions> {
    let since = string(matches, "since").unwrap_or_else(|| DEFAULT_SINCE.to_string());
    Ok(CreditOptions {
        owner: string(matches, "owner").unwrap_or_default(),
        repo: string(matches, "repo"),
        number: matches.get_one::<u64>("number").copied(),
        since: parse_date_floor(&since)?,
        refresh_cache: matches.get_flag("refresh-cache"),
        per_page: per_page(matches),
    })
}
