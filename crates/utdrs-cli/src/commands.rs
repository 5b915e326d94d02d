//! CLI command definitions and handlers

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::{error, info};
use utdrs_api::{load_sample, sample_path, shutdown_signal, AnalyzeResponse, AppConfig, DetectionServer};
use utdrs_core::model::DataType;
use utdrs_engine::{DetectionPipeline, DetectionResult, ANOMALY_SCORE_COLUMN};
use utdrs_rules::RuleSet;

/// Main CLI structure
#[derive(Parser)]
#[command(name = "utdrs")]
#[command(about = "Unified Threat Detection and Response System")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Analyze a CSV file
    Analyze {
        /// Input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Data type of the input
        #[arg(short = 't', long = "type")]
        data_type: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Output file for results
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fixed seed for reproducible anomaly scores
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show the bundled sample dataset for a data type
    Sample {
        /// Data type
        #[arg(short = 't', long = "type")]
        data_type: String,
    },

    /// Print the active known-threat rules
    Rules {
        /// Only rules for this data type
        #[arg(short = 't', long = "type")]
        data_type: Option<String>,
    },

    /// Show system information
    Info,
}

/// Output format options
#[derive(Clone, Debug, PartialEq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    JsonPretty,
}

/// Command execution result
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Execute CLI commands
pub struct CommandExecutor {
    config: AppConfig,
}

impl CommandExecutor {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Execute a CLI command
    pub async fn execute(&self, command: Commands) -> Result<CommandResult> {
        match command {
            Commands::Serve { host, port } => self.execute_serve(host, port).await,
            Commands::Analyze {
                input,
                data_type,
                format,
                output,
                seed,
            } => {
                let executor_config = self.config.clone();
                tokio::task::spawn_blocking(move || {
                    CommandExecutor::new(executor_config).execute_analyze(input, &data_type, format, output, seed)
                })
                .await?
            }
            Commands::Sample { data_type } => self.execute_sample(&data_type),
            Commands::Rules { data_type } => self.execute_rules(data_type.as_deref()),
            Commands::Info => self.execute_info(),
        }
    }

    async fn execute_serve(&self, host: Option<String>, port: Option<u16>) -> Result<CommandResult> {
        let mut server_config = self.config.server.clone();
        if let Some(host) = host {
            server_config.host = host;
        }
        if let Some(port) = port {
            server_config.port = port;
        }

        let pipeline = DetectionPipeline::new(self.config.pipeline_config()?)?;
        let server = DetectionServer::new(server_config.clone(), pipeline);

        println!("Starting server on {}:{}", server_config.host, server_config.port);
        println!("Dashboard: {}", server_config.dashboard_url());
        println!("Press Ctrl+C to stop");

        server.run_with_shutdown(shutdown_signal()).await?;

        Ok(CommandResult {
            success: true,
            message: "Server stopped".to_string(),
            data: None,
        })
    }

    /// Run the pipeline on a local file
    pub fn execute_analyze(
        &self,
        input: PathBuf,
        tag: &str,
        format: OutputFormat,
        output: Option<PathBuf>,
        seed: Option<u64>,
    ) -> Result<CommandResult> {
        let mut pipeline_config = self.config.pipeline_config()?;
        if seed.is_some() {
            pipeline_config.forest.seed = seed;
        }
        let pipeline = DetectionPipeline::new(pipeline_config)?;

        let result = match pipeline.analyze_path(&input, tag) {
            Ok(result) => result,
            Err(e) => {
                error!("Analysis of {} failed: {}", input.display(), e);
                eprintln!("Error ({} stage): {}", e.stage, e.source);
                let partial = e.partial.as_ref().map(serde_json::to_value).transpose()?;
                return Ok(CommandResult {
                    success: false,
                    message: e.to_string(),
                    data: partial,
                });
            }
        };

        let rendered = render_analysis(&result, &format)?;
        match output {
            Some(path) => {
                std::fs::write(&path, &rendered)?;
                info!("Wrote results to {}", path.display());
            }
            None => println!("{}", rendered),
        }

        Ok(CommandResult {
            success: true,
            message: format!(
                "{} anomalies, {} known threats, risk {}",
                result.total_anomalies(),
                result.total_known_threats(),
                result.risk_level()
            ),
            data: Some(serde_json::to_value(AnalyzeResponse::from(result))?),
        })
    }

    fn execute_sample(&self, tag: &str) -> Result<CommandResult> {
        let data_type: DataType = tag.parse()?;
        let dir = &self.config.server.sample_dir;
        let path = sample_path(dir, data_type);
        let raw = load_sample(dir, data_type)?;

        println!("{} ({} rows)", path.display(), raw.len());
        println!("Columns: {}", raw.headers().join(", "));

        Ok(CommandResult {
            success: true,
            message: format!("Sample data for {}", data_type),
            data: Some(serde_json::json!({
                "path": path,
                "rows": raw.len(),
                "columns": raw.headers(),
            })),
        })
    }

    fn execute_rules(&self, tag: Option<&str>) -> Result<CommandResult> {
        let rules = self.config.rules.resolve()?;
        let selected = match tag {
            Some(tag) => {
                let data_type: DataType = tag.parse()?;
                let mut only = RuleSet::empty();
                only.rules.insert(data_type, rules.for_type(data_type).to_vec());
                only
            }
            None => rules,
        };

        println!("{}", selected.to_json_pretty()?);

        Ok(CommandResult {
            success: true,
            message: format!("{} rule(s)", selected.len()),
            data: Some(serde_json::to_value(&selected)?),
        })
    }

    fn execute_info(&self) -> Result<CommandResult> {
        let info = serde_json::json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "repository": env!("CARGO_PKG_REPOSITORY"),
            "data_types": DataType::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            "features": ["isolation-forest", "known-threat-rules", "rest-api", "cli"]
        });

        println!("{}", serde_json::to_string_pretty(&info)?);

        Ok(CommandResult {
            success: true,
            message: "System information".to_string(),
            data: Some(info),
        })
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

/// Render a detection result in the requested format
pub fn render_analysis(result: &DetectionResult, format: &OutputFormat) -> Result<String> {
    let output = match format {
        OutputFormat::Text => {
            let mut text = String::new();
            writeln!(
                text,
                "Analysis {} ({} data, {} rows)",
                result.analysis_id(),
                result.data_type(),
                result.total_rows()
            )?;
            writeln!(text, "Anomalies: {}", result.total_anomalies())?;
            for record in result.anomalies().iter() {
                let score = result
                    .anomalies()
                    .schema()
                    .position(ANOMALY_SCORE_COLUMN)
                    .and_then(|p| record.get(p))
                    .and_then(|v| v.as_f64())
                    .unwrap_or_default();
                writeln!(text, "  row {} (score {:.3})", record.index, score)?;
            }
            writeln!(text, "Known threats: {}", result.total_known_threats())?;
            for record in result.known_threats().iter() {
                writeln!(text, "  row {}", record.index)?;
            }
            write!(text, "Risk level: {}", result.risk_level())?;
            text
        }
        OutputFormat::Json => serde_json::to_string(&AnalyzeResponse::from(result.clone()))?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&AnalyzeResponse::from(result.clone()))?,
    };
    Ok(output)
}
