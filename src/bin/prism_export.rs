//! Export existing Prism resources as Terraform configuration
//!
//! ```bash
//! prism-export --subdomain acme --token $TOKEN --output ./generated-terraform
//! ```
//!
//! Single-dash long flags (`-subdomain acme`, `-output=dir`) are accepted too.

use anyhow::Result;
use clap::Parser;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use prism_provider::client::PrismClient;
use prism_provider::config::{
    ConfigError, ENV_API_TOKEN, ENV_BASE_URL, ENV_REGION, ENV_SUBDOMAIN, ProviderConfig,
    ProviderSettings, Region,
};
use prism_provider::context::Context;
use prism_provider::export::{ExportSummary, Exporter};

#[derive(Parser)]
#[command(name = "prism-export")]
#[command(about = "Generate Terraform configuration and an import script from an existing Prism account", long_about = None)]
#[command(version)]
struct Cli {
    /// Prism subdomain
    #[arg(long, env = ENV_SUBDOMAIN)]
    subdomain: Option<String>,

    /// Prism API token
    #[arg(long, env = ENV_API_TOKEN, hide_env_values = true)]
    token: Option<String>,

    /// Output directory for generated files
    #[arg(short, long, default_value = "./generated-terraform")]
    output: PathBuf,

    /// API region: prism or prism-eu
    #[arg(long, env = ENV_REGION)]
    region: Option<String>,

    /// Override the API base URL
    #[arg(long, env = ENV_BASE_URL)]
    base_url: Option<String>,
}

/// Long flags that may also be spelled with a single dash
const LONG_FLAGS: &[&str] = &["subdomain", "token", "output", "region", "base-url", "help", "version"];

/// Log filter, e.g. `PRISM_LOG=prism_provider=debug`
const LOG_ENV: &str = "PRISM_LOG";

/// Rewrite `-name` and `-name=value` to `--name` for the known long flags.
/// Arguments after a bare `--` are left alone.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut normalized = Vec::new();
    let mut passthrough = false;
    for arg in args {
        if passthrough {
            normalized.push(arg);
            continue;
        }
        let rewritten = match arg.to_str() {
            Some("--") => {
                passthrough = true;
                None
            }
            Some(text) if text.starts_with('-') && !text.starts_with("--") => {
                let name = text[1..].split('=').next().unwrap_or_default();
                LONG_FLAGS
                    .contains(&name)
                    .then(|| OsString::from(format!("-{}", text)))
            }
            _ => None,
        };
        normalized.push(rewritten.unwrap_or(arg));
    }
    normalized
}

fn parse_cli<I>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = OsString>,
{
    Cli::try_parse_from(normalize_args(args))
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn flag_error(err: &ConfigError) -> String {
    match err {
        ConfigError::MissingSubdomain => format!(
            "Prism subdomain is required (use --subdomain or the {} environment variable)",
            ENV_SUBDOMAIN
        ),
        ConfigError::MissingToken => format!(
            "API token is required (use --token or the {} environment variable)",
            ENV_API_TOKEN
        ),
        other => other.to_string(),
    }
}

fn print_summary(ctx: &Context, cli: &Cli, summary: &ExportSummary) {
    let output = ctx.output.as_ref();

    output.blank();
    output.success("Successfully generated Terraform configuration!");
    output.key_value("Output directory", &cli.output.display().to_string());
    output.key_value("AWS accounts", &summary.accounts.to_string());
    output.key_value("Permission sets", &summary.permission_sets.to_string());
    output.key_value("Users", &summary.users.to_string());
    output.key_value("Groups", &summary.groups.to_string());
    output.key_value("Group memberships", &summary.memberships.to_string());
    output.key_value("Assignment rows", &summary.assignment_rows.to_string());
    output.key_value("Account variables", &summary.variables.to_string());

    output.subsection("Generated files");
    for file in &summary.files {
        if let Some(name) = file.file_name() {
            output.list_item(&name.to_string_lossy());
        }
    }

    if !summary.warnings.is_empty() {
        output.blank();
        output.warning(&format!(
            "{} warning(s) during export; affected group memberships were skipped",
            summary.warnings.len()
        ));
    }

    output.next_steps(&[
        format!("cd {}", cli.output.display()),
        "Review the generated files".to_string(),
        "Run: terraform init".to_string(),
        "Run: ./import.sh".to_string(),
        "Run: terraform plan".to_string(),
    ]);
}

fn run(cli: &Cli, ctx: &Context) -> Result<bool> {
    let settings = ProviderSettings {
        prism_subdomain: cli.subdomain.clone(),
        api_token: cli.token.clone(),
        region: cli.region.clone(),
        base_url: cli.base_url.clone(),
    };

    // clap already applied the environment fallbacks
    let config = match ProviderConfig::resolve_with(&settings, |_| None) {
        Ok(config) => config,
        Err(errors) => {
            for err in &errors {
                ctx.output.error(&flag_error(err));
            }
            return Ok(false);
        }
    };

    ctx.output.info("Connecting to Prism API...");
    ctx.output.lavender(&format!("  {}", config.base_url));
    let client = match PrismClient::new(&config) {
        Ok(client) => client,
        Err(err) => {
            ctx.output.error(&format!("Unable to create API client: {}", err));
            return Ok(false);
        }
    };

    let region = (config.region != Region::default()).then(|| config.region.to_string());
    let summary = Exporter::new(ctx, &client)
        .with_region(region)
        .run(&cli.output)?;

    print_summary(ctx, cli, &summary);
    Ok(true)
}

fn main() -> ExitCode {
    let cli = match parse_cli(std::env::args_os()) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // Help and version go to stdout and are not failures
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging();

    let ctx = Context::new();
    match run(&cli, &ctx) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            ctx.output.error(&format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}
