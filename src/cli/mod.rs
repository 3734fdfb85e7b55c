use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::host::Host;
use crate::infra::boot;
use crate::infra::config::AppConfig;

#[derive(Parser)]
#[command(name = "mcp-autoload")]
#[command(about = "Serve tools, resources and prompts discovered on disk over MCP")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load components and serve them (default)
    Serve,
    /// Load components and print what was found
    List {
        /// Print the registry summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load components and report errors and warnings
    Check,
    /// Health check a running server
    Health {
        /// Service URL to check
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    run_commands(cli.command.unwrap_or(Commands::Serve)).await
}

pub async fn run_commands(command: Commands) -> ExitCode {
    let cfg = match command {
        Commands::Health { .. } => None,
        _ => match AppConfig::load() {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                eprintln!("❌ Configuration error: {e}");
                return ExitCode::FAILURE;
            }
        },
    };

    match (command, cfg) {
        (Commands::Serve, Some(cfg)) => match boot::run_server(cfg, Host::with_builtins()).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("❌ Server failed: {e}");
                ExitCode::FAILURE
            }
        },
        (Commands::List { json }, Some(cfg)) => {
            let (registry, _) = boot::build_registry(&cfg, Host::with_builtins()).await;
            print!("{}", render_listing(&registry, json));
            ExitCode::SUCCESS
        }
        (Commands::Check, Some(cfg)) => {
            let (_, report) = boot::build_registry(&cfg, Host::with_builtins()).await;
            print!("{}", render_report(&report));
            if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        (Commands::Health { url }, _) => match health_check(&url).await {
            Ok(_) => {
                println!("✅ Service is healthy");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("❌ Health check failed: {e}");
                ExitCode::FAILURE
            }
        },
        (_, None) => ExitCode::FAILURE,
    }
}

fn render_listing(registry: &crate::registry::Registry, json: bool) -> String {
    let summary = crate::api::registry::RegistrySummary::of(registry);
    if json {
        return serde_json::to_string_pretty(&summary).unwrap_or_default() + "\n";
    }
    let mut out = String::new();
    out.push_str(&format!("🔧 Tools ({}):\n", summary.tools.len()));
    for name in &summary.tools {
        out.push_str(&format!("  {name}\n"));
    }
    out.push_str(&format!("📄 Resources ({}):\n", summary.resources.len()));
    for r in &summary.resources {
        out.push_str(&format!("  {} ({})\n", r.uri, r.name));
    }
    out.push_str(&format!("💬 Prompts ({}):\n", summary.prompts.len()));
    for name in &summary.prompts {
        out.push_str(&format!("  {name}\n"));
    }
    out
}

fn render_report(report: &crate::registry::LoadReport) -> String {
    let mut out = format!(
        "Loaded {} tools, {} resources, {} prompts\n",
        report.tools, report.resources, report.prompts
    );
    for e in &report.errors {
        out.push_str(&format!("❌ {e}\n"));
    }
    for w in &report.warnings {
        out.push_str(&format!("⚠️  {w}\n"));
    }
    if report.is_clean() {
        out.push_str("✅ No errors\n");
    }
    out
}

async fn health_check(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/healthz", url))
        .timeout(std::time::Duration::from_millis(500))
        .send()
        .await?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(format!("HTTP {}", response.status()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("tools/hello");
        fs::create_dir_all(&tool).unwrap();
        fs::write(tool.join("tool.json"), r#"{"name": "hello", "description": "Hi", "execute": "echo"}"#).unwrap();
        dir
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["mcp-autoload", "list", "--json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::List { json: true })));
        let cli = Cli::try_parse_from(["mcp-autoload"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[tokio::test]
    async fn listing_and_report_render_loaded_components() {
        let dir = fixture();
        let mut cfg = AppConfig::default();
        cfg.autoload.base_dir = dir.path().to_path_buf();
        let (registry, report) = boot::build_registry(&cfg, Host::with_builtins()).await;

        let text = render_listing(&registry, false);
        assert!(text.contains("Tools (1)"));
        assert!(text.contains("hello"));
        let json: serde_json::Value = serde_json::from_str(&render_listing(&registry, true)).unwrap();
        assert_eq!(json["tools"][0], "hello");

        assert!(render_report(&report).contains("No errors"));
    }

    #[tokio::test]
    #[serial]
    async fn check_fails_when_a_component_is_broken() {
        let dir = fixture();
        let broken = dir.path().join("tools/broken");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join("tool.toml"), "name = \n").unwrap();
        env::remove_var("MCP_AUTOLOAD_CONFIG");
        env::set_var("COMPONENTS_DIR", dir.path());

        assert_eq!(run_commands(Commands::Check).await, ExitCode::FAILURE);

        fs::remove_dir_all(&broken).unwrap();
        assert_eq!(run_commands(Commands::Check).await, ExitCode::SUCCESS);
        env::remove_var("COMPONENTS_DIR");
    }

    #[tokio::test]
    #[serial]
    async fn bad_config_fails_fast() {
        env::set_var("PORT", "not-a-port");
        assert_eq!(run_commands(Commands::List { json: false }).await, ExitCode::FAILURE);
        env::remove_var("PORT");
    }

    #[tokio::test]
    async fn health_check_ok_and_error_paths() {
        use httpmock::prelude::*;
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/healthz");
            then.status(200).body("ok");
        });
        assert!(health_check(&server.base_url()).await.is_ok());
        assert_eq!(run_commands(Commands::Health { url: server.base_url() }).await, ExitCode::SUCCESS);

        let bad = MockServer::start();
        bad.mock(|when, then| {
            when.method(GET).path("/healthz");
            then.status(500);
        });
        assert!(health_check(&bad.base_url()).await.is_err());
    }
}
