use std::path::PathBuf;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use gitminer::graphql::Substitutions;
use gitminer::models::{SubjectStatus, UserMetricsRecord};
use gitminer::queries::profile::{UserProfileStats, ViewerLogin};
use gitminer::{
    Client, Config, PersonalAccessTokenAuthenticator, ProfileMetricsMiner,
    RepositoryContributionsMiner, UserMetricsMiner,
};

#[derive(Parser, Debug)]
#[command(name = "gitminer")]
#[command(version = "0.1.0")]
#[command(about = "Mine GitHub activity metrics over the GraphQL API")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output format (json, text)
    #[arg(short, long, default_value = "json", global = true)]
    format: String,

    /// Output file (defaults to stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine activity metrics for one or more user logins
    Users {
        /// Logins to mine
        logins: Vec<String>,

        /// File with one login per line, merged with the positional logins
        #[arg(long)]
        from_file: Option<PathBuf>,

        /// Span start as %Y-%m-%dT%H:%M:%SZ (defaults to account creation)
        #[arg(long)]
        start: Option<String>,

        /// Span end as %Y-%m-%dT%H:%M:%SZ (defaults to now)
        #[arg(long)]
        end: Option<String>,
    },

    /// Mine per-contributor commit totals for repository links
    Repos {
        /// Repository links, e.g. https://github.com/owner/name
        links: Vec<String>,

        /// File with one link per line, merged with the positional links
        #[arg(long)]
        from_file: Option<PathBuf>,
    },

    /// Mine lifetime metrics for logins, spanning from account creation
    Lifetime {
        /// Logins to mine
        logins: Vec<String>,

        /// File with one login per line, merged with the positional logins
        #[arg(long)]
        from_file: Option<PathBuf>,

        /// Span end as %Y-%m-%dT%H:%M:%SZ (defaults to now)
        #[arg(long)]
        end: Option<String>,
    },

    /// Fetch the lifetime profile statistics of one login
    Profile {
        login: String,
    },

    /// Print the remaining GraphQL quota and its reset time
    RateLimit,

    /// Print the login the configured token authenticates as
    Whoami,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("gitminer=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::from_env()?;

    let client = Client::builder()
        .protocol(&config.github_protocol)
        .host(&config.github_host)
        .enterprise(config.github_enterprise)
        .authenticator(PersonalAccessTokenAuthenticator::new(&config.github_token))
        .build()?;

    match args.command {
        Command::Users {
            logins,
            from_file,
            start,
            end,
        } => {
            let subjects = gather_subjects(logins, from_file)?;
            if subjects.is_empty() {
                anyhow::bail!("no logins given");
            }
            let start = start
                .as_deref()
                .map(gitminer::util::parse_timestamp)
                .transpose()?;
            let end = end
                .as_deref()
                .map(gitminer::util::parse_timestamp)
                .transpose()?;

            let mut miner = UserMetricsMiner::new(&client).page_size(config.page_size);
            let pb = progress_bar(subjects.len() as u64, "users");
            for login in &subjects {
                miner.run(login, start, end).await;
                pb.inc(1);
            }
            pb.finish_and_clear();

            report_exceptions(&miner.exceptions);

            // A single failed subject answers with an error object rather
            // than a one-row table of nulls.
            if let [record] = miner.records.as_slice() {
                if record.status != SubjectStatus::Mined {
                    let body = serde_json::json!({
                        "error": format!("could not mine user {}", record.login),
                    });
                    write_output(&serde_json::to_string_pretty(&body)?, &args.output)?;
                    std::process::exit(1);
                }
            }

            let rendered = match args.format.as_str() {
                "text" => format_user_text(&miner.records),
                _ => serde_json::to_string_pretty(&miner.records)?,
            };
            write_output(&rendered, &args.output)?;
        }

        Command::Repos { links, from_file } => {
            let subjects = gather_subjects(links, from_file)?;
            if subjects.is_empty() {
                anyhow::bail!("no repository links given");
            }

            let mut miner = RepositoryContributionsMiner::new(&client).page_size(config.page_size);
            let pb = progress_bar(subjects.len() as u64, "repos");
            for link in &subjects {
                miner.run(link).await;
                pb.inc(1);
            }
            pb.finish_and_clear();

            report_exceptions(&miner.exceptions);

            let body = serde_json::json!({
                "cumulated": miner.cumulated,
                "commits": miner.commits,
            });
            write_output(&serde_json::to_string_pretty(&body)?, &args.output)?;
        }

        Command::Lifetime {
            logins,
            from_file,
            end,
        } => {
            let subjects = gather_subjects(logins, from_file)?;
            if subjects.is_empty() {
                anyhow::bail!("no logins given");
            }
            let end = end
                .as_deref()
                .map(gitminer::util::parse_timestamp)
                .transpose()?;

            let mut miner = ProfileMetricsMiner::new(&client).page_size(config.page_size);
            let pb = progress_bar(subjects.len() as u64, "users");
            for login in &subjects {
                miner.run(login, end).await;
                pb.inc(1);
            }
            pb.finish_and_clear();

            report_exceptions(&miner.exceptions);

            if let [record] = miner.records.as_slice() {
                if record.status != SubjectStatus::Mined {
                    let body = serde_json::json!({
                        "error": format!("could not mine user {}", record.login),
                    });
                    write_output(&serde_json::to_string_pretty(&body)?, &args.output)?;
                    std::process::exit(1);
                }
            }

            write_output(&serde_json::to_string_pretty(&miner.records)?, &args.output)?;
        }

        Command::Profile { login } => {
            let result = client
                .execute(
                    &UserProfileStats::query(),
                    &Substitutions::new().bind("user", login.as_str()),
                )
                .await;
            match result {
                Ok(data) => {
                    let stats = UserProfileStats::stats(&data)?;
                    write_output(&serde_json::to_string_pretty(&stats)?, &args.output)?;
                }
                Err(e) if e.is_query_failure() => {
                    let body = serde_json::json!({
                        "error": format!("could not fetch profile for {login}"),
                    });
                    write_output(&serde_json::to_string_pretty(&body)?, &args.output)?;
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Command::RateLimit => {
            let snapshot = client.rate_limit().await?;
            println!(
                "remaining {} of quota, resets at {}",
                snapshot.remaining, snapshot.reset_at
            );
        }

        Command::Whoami => {
            let data = client
                .execute(&ViewerLogin::query(), &Substitutions::new())
                .await?;
            println!("{}", ViewerLogin::login(&data)?);
        }
    }

    Ok(())
}

fn gather_subjects(mut subjects: Vec<String>, from_file: Option<PathBuf>) -> anyhow::Result<Vec<String>> {
    if let Some(path) = from_file {
        let content = std::fs::read_to_string(&path)?;
        subjects.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from),
        );
    }
    Ok(subjects)
}

fn progress_bar(len: u64, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit}"
            ))
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

fn report_exceptions(exceptions: &[String]) {
    if !exceptions.is_empty() {
        tracing::warn!(
            count = exceptions.len(),
            subjects = ?exceptions,
            "some subjects failed and carry sentinel rows"
        );
    }
}

fn write_output(rendered: &str, output: &Option<PathBuf>) -> anyhow::Result<()> {
    if let Some(path) = output {
        std::fs::write(path, rendered)?;
        tracing::info!("output written to {}", path.display());
    } else {
        println!("{}", rendered);
    }
    Ok(())
}

fn format_user_text(records: &[UserMetricsRecord]) -> String {
    let mut output = String::new();
    for record in records {
        output.push_str(&format!("\n=== {} ===\n", record.login));
        match (&record.counters, record.lifetime_days) {
            (Some(counters), Some(days)) => {
                output.push_str(&format!("Lifetime: {} days\n", days));
                output.push_str(&format!("Commits: {}\n", counters.commits));
                output.push_str(&format!("Issues: {}\n", counters.issues));
                output.push_str(&format!("Pull requests: {}\n", counters.pull_requests));
                output.push_str(&format!(
                    "Pull request reviews: {}\n",
                    counters.pull_request_reviews
                ));
                output.push_str(&format!("Repositories: {}\n", counters.repositories));
                output.push_str(&format!("Gists: {}\n", counters.gists));
            }
            _ => output.push_str("Could not be mined\n"),
        }
    }
    output
}
