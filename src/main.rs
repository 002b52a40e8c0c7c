use ftl_news::clients::{
    AiClient, ArticleClient, DigestMailer, HnClient, MailClient, SimilarityModel,
};
use ftl_news::config::Config;
use ftl_news::db::Repository;
use ftl_news::error::{AppError, Result};
use ftl_news::{pipeline, taxonomy};

const USAGE: &str = r#"Usage: ftl-news <command>

Commands:
  run                        Run the full pipeline (ingest, scrape, analyze, match, digest)
  ingest                     Pull new stories from the feed
  scrape [--retry-failed]    Fetch article text and comments for new stories
  analyze [--retry-failed]   Generate summaries, categories and scores
  match                      Match analyzed articles against user profiles
  digest                     Send unsent digests to users
  add-user <email> <slugs> [description]
                             Create a user with comma-separated category slugs
"#;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("");
    let retry_failed = args.iter().any(|a| a == "--retry-failed");

    let config = Config::load()?;
    let repo = Repository::new(&config.db_path).await?;

    let feed = HnClient::new(config.hn_base_url.clone());
    let fetcher = ArticleClient::new();
    let ai = config.ai_api_key.clone().map(AiClient::new);
    let mailer = config.mail_api_key.clone().map(|key| {
        MailClient::new(
            config.mail_api_url.clone(),
            key,
            config.from_email.clone(),
        )
    });

    match command {
        "run" => {
            let ai = ai.ok_or_else(|| AppError::Config("ai_api_key is not set".into()))?;
            pipeline::run_all(
                &repo,
                &feed,
                &fetcher,
                &ai,
                Some(&ai as &dyn SimilarityModel),
                mailer.as_ref().map(|m| m as &dyn DigestMailer),
                &config,
            )
            .await?;
        }

        "ingest" => {
            let report = pipeline::ingest::run(&repo, &feed, config.top_stories_limit).await?;
            println!(
                "Ingested {} new stories ({} updated, {} failed)",
                report.inserted, report.updated, report.failed
            );
        }

        "scrape" => {
            if retry_failed {
                let cleared = repo.reset_scrape_failures().await?;
                println!("Cleared {cleared} scrape failure markers");
            }
            let report = pipeline::scrape::run(&repo, &feed, &fetcher, &config).await?;
            println!("Scraped {} links ({} failed)", report.scraped, report.failed);
        }

        "analyze" => {
            let ai = ai.ok_or_else(|| AppError::Config("ai_api_key is not set".into()))?;
            if retry_failed {
                let cleared = repo.reset_analyze_failures().await?;
                println!("Cleared {cleared} analysis failure markers");
            }
            let report = pipeline::analyze::run(&repo, &ai, &config).await?;
            println!(
                "Analyzed {} contents ({} failed)",
                report.analyzed, report.failed
            );
        }

        "match" => {
            let report =
                pipeline::matcher::run(&repo, ai.as_ref().map(|a| a as &dyn SimilarityModel), &config)
                    .await?;
            println!(
                "Matched {} articles across {} users",
                report.matched, report.users
            );
        }

        "digest" => {
            let mailer =
                mailer.ok_or_else(|| AppError::Config("mail_api_key is not set".into()))?;
            let report = pipeline::digest::run(&repo, &mailer, &config).await?;
            println!(
                "Sent {} digests ({} users skipped, {} failed)",
                report.sent, report.skipped, report.failed
            );
        }

        "add-user" => {
            let email = args
                .get(2)
                .ok_or_else(|| AppError::Config("add-user requires an email".into()))?;
            let slugs: Vec<String> = args
                .get(3)
                .map(|s| s.split(',').map(|c| c.trim().to_string()).collect())
                .unwrap_or_default();
            let description = args.get(4).cloned().unwrap_or_default();

            let invalid: Vec<&String> = slugs
                .iter()
                .filter(|s| !taxonomy::is_valid_slug(s))
                .collect();
            if !invalid.is_empty() {
                return Err(AppError::Config(format!("unknown categories: {invalid:?}")));
            }

            let id = repo.create_user(email.clone(), slugs, description).await?;
            println!("Created user {id} ({email})");
        }

        _ => {
            eprint!("{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}
