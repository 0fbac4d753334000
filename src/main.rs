use anyhow::{Context, Result};
use clap::Parser;
use mibitracker::{
    ChannelSource, Config, ConfigOverrides, MibiRequests, RequestOptions, runtime::RealRuntime,
};
use reqwest::Response;
use std::path::PathBuf;

/// mibitracker - MibiTracker API client
///
/// Credentials come from the flags below or from the environment:
/// MIBITRACKER_URL, MIBITRACKER_TOKEN, or MIBITRACKER_EMAIL and
/// MIBITRACKER_PASSWORD.
///
/// Examples:
///   mibitracker get images -p run__label=20180101_run
///   mibitracker upload-channel 42 /data/run/CD45.tiff
#[derive(Parser, Debug)]
#[command(author, version = env!("MIBITRACKER_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the MibiTracker instance (also via MIBITRACKER_URL)
    #[arg(long, value_name = "URL", global = true)]
    url: Option<String>,

    /// Login email (also via MIBITRACKER_EMAIL)
    #[arg(long, value_name = "EMAIL", global = true)]
    email: Option<String>,

    /// Login password (also via MIBITRACKER_PASSWORD)
    #[arg(long, value_name = "PASSWORD", global = true)]
    password: Option<String>,

    /// Previously issued token; skips the login (also via MIBITRACKER_TOKEN)
    #[arg(long, value_name = "TOKEN", global = true)]
    token: Option<String>,

    /// Retries for transient server errors (also via MIBITRACKER_MAX_RETRIES)
    #[arg(long = "max-retries", value_name = "N", global = true)]
    max_retries: Option<usize>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// GET a route and print the response body
    Get(GetArgs),

    /// POST to a route and print the response body
    Post(BodyArgs),

    /// PUT to a route and print the response body
    Put(BodyArgs),

    /// DELETE a route
    Delete(RouteArgs),

    /// Upload a TIFF channel for an image
    UploadChannel(UploadArgs),

    /// Log in and print the issued token
    Token,
}

#[derive(clap::Args, Debug)]
struct RouteArgs {
    /// API route, e.g. "images/1/"
    #[arg(value_name = "ROUTE")]
    route: String,
}

#[derive(clap::Args, Debug)]
struct GetArgs {
    /// API route, e.g. "images/"
    #[arg(value_name = "ROUTE")]
    route: String,

    /// Query parameter (repeatable)
    #[arg(long = "param", short = 'p', value_name = "KEY=VALUE", value_parser = parse_key_val)]
    params: Vec<(String, String)>,
}

#[derive(clap::Args, Debug)]
struct BodyArgs {
    /// API route, e.g. "images/1/"
    #[arg(value_name = "ROUTE")]
    route: String,

    /// Form field (repeatable)
    #[arg(long = "data", short = 'd', value_name = "KEY=VALUE", value_parser = parse_key_val)]
    data: Vec<(String, String)>,

    /// JSON body
    #[arg(long, value_name = "JSON", conflicts_with = "data", value_parser = parse_json)]
    json: Option<serde_json::Value>,
}

#[derive(clap::Args, Debug)]
struct UploadArgs {
    /// Id of the image the channel belongs to
    #[arg(value_name = "IMAGE_ID")]
    image_id: u64,

    /// TIFF file to upload
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Filename to send instead of the file's own name
    #[arg(long, value_name = "NAME")]
    filename: Option<String>,
}

impl BodyArgs {
    fn options(self) -> RequestOptions {
        match self.json {
            Some(json) => RequestOptions::new().json(json),
            None if self.data.is_empty() => RequestOptions::new(),
            None => RequestOptions::new().form(self.data),
        }
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", s))?;
    if key.is_empty() {
        return Err(format!("empty key in {:?}", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_json(s: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {}", e))
}

async fn print_response(response: Response) -> Result<()> {
    let body = response
        .text()
        .await
        .context("Failed to read response body")?;
    if !body.is_empty() {
        println!("{}", body);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        url: cli.url,
        email: cli.email,
        password: cli.password,
        token: cli.token,
        max_retries: cli.max_retries,
    };
    let config = Config::load(&RealRuntime, overrides)?;
    let mr = MibiRequests::from_config(&config).await?;

    let response = match cli.command {
        Commands::Get(args) => {
            let mut options = RequestOptions::new();
            for (key, value) in args.params {
                options = options.query(key, value);
            }
            mr.get(&args.route, options).await?
        }
        Commands::Post(args) => {
            let route = args.route.clone();
            mr.post(&route, args.options()).await?
        }
        Commands::Put(args) => {
            let route = args.route.clone();
            mr.put(&route, args.options()).await?
        }
        Commands::Delete(args) => mr.delete(&args.route, RequestOptions::new()).await?,
        Commands::UploadChannel(args) => {
            mr.upload_channel(
                args.image_id,
                ChannelSource::path(args.path),
                args.filename.as_deref(),
            )
            .await?
        }
        Commands::Token => {
            println!("{}", mr.token());
            return Ok(());
        }
    };

    print_response(response).await
}
