//! Tests for the cli crate

use clap::Parser;
use std::path::PathBuf;
use utdrs_api::AppConfig;
use utdrs_cli::commands::{render_analysis, Cli, CommandExecutor, Commands, OutputFormat};
use utdrs_core::model::DataType;
use utdrs_core::record::RawRecordSet;
use utdrs_engine::DetectionPipeline;

const AUTH_CSV: &str = "timestamp,user_id,login_status,geolocation,auth_method\n\
2025-04-01T12:00:00,alice,success,US,password\n\
2025-04-01T12:01:00,bob,failed,US,password\n\
2025-04-01T12:02:00,carol,failed,DE,mfa\n";

#[test]
fn test_cli_parsing_info() {
    let args = vec!["utdrs", "info"];
    let cli = Cli::try_parse_from(args).unwrap();

    match cli.command {
        Commands::Info => {} // Expected
        _ => panic!("Expected Info command"),
    }
}

#[test]
fn test_cli_parsing_serve() {
    let args = vec!["utdrs", "serve", "--host", "127.0.0.1", "--port", "8080"];
    let cli = Cli::try_parse_from(args).unwrap();

    match cli.command {
        Commands::Serve { host, port } => {
            assert_eq!(host, Some("127.0.0.1".to_string()));
            assert_eq!(port, Some(8080));
        }
        _ => panic!("Expected Serve command"),
    }
}

#[test]
fn test_cli_parsing_analyze() {
    let args = vec![
        "utdrs", "analyze", "--input", "logins.csv", "--type", "authentication", "--format", "json-pretty",
        "--seed", "7",
    ];
    let cli = Cli::try_parse_from(args).unwrap();

    match cli.command {
        Commands::Analyze {
            input,
            data_type,
            format,
            output,
            seed,
        } => {
            assert_eq!(input, PathBuf::from("logins.csv"));
            assert_eq!(data_type, "authentication");
            assert_eq!(format, OutputFormat::JsonPretty);
            assert_eq!(output, None);
            assert_eq!(seed, Some(7));
        }
        _ => panic!("Expected Analyze command"),
    }
}

#[test]
fn test_cli_parsing_analyze_defaults_to_text() {
    let args = vec!["utdrs", "analyze", "-i", "traffic.csv", "-t", "network"];
    let cli = Cli::try_parse_from(args).unwrap();

    match cli.command {
        Commands::Analyze { format, .. } => assert_eq!(format, OutputFormat::Text),
        _ => panic!("Expected Analyze command"),
    }
}

#[test]
fn test_cli_parsing_global_config() {
    let args = vec!["utdrs", "rules", "--config", "utdrs.toml", "--type", "email"];
    let cli = Cli::try_parse_from(args).unwrap();

    assert_eq!(cli.config, Some(PathBuf::from("utdrs.toml")));
    match cli.command {
        Commands::Rules { data_type } => assert_eq!(data_type, Some("email".to_string())),
        _ => panic!("Expected Rules command"),
    }
}

#[test]
fn test_cli_parsing_analyze_requires_input() {
    let args = vec!["utdrs", "analyze", "--type", "network"];
    assert!(Cli::try_parse_from(args).is_err());
}

#[test]
fn test_execute_analyze_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("logins.csv");
    let output = dir.path().join("result.json");
    std::fs::write(&input, AUTH_CSV).unwrap();

    let executor = CommandExecutor::default();
    let result = executor
        .execute_analyze(input, "authentication", OutputFormat::Json, Some(output.clone()), Some(3))
        .unwrap();

    assert!(result.success);
    let data = result.data.unwrap();
    assert_eq!(data["total_known_threats"], 2);
    assert_eq!(data["risk_level"], "medium");

    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();
    assert_eq!(written["known_threats"][0]["user_id"], "bob");
}

#[test]
fn test_execute_analyze_failure_is_unsuccessful() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("logins.csv");
    std::fs::write(&input, AUTH_CSV).unwrap();

    let executor = CommandExecutor::default();
    let result = executor
        .execute_analyze(input, "email", OutputFormat::Text, None, None)
        .unwrap();

    assert!(!result.success);
    assert!(result.message.contains("normalize"));
    assert!(result.data.is_none());
}

#[tokio::test]
async fn test_execute_rules_for_one_type() {
    let executor = CommandExecutor::new(AppConfig::default());
    let result = executor
        .execute(Commands::Rules {
            data_type: Some("authentication".to_string()),
        })
        .await
        .unwrap();

    assert!(result.success);
    let data = result.data.unwrap();
    assert_eq!(data["rules"]["authentication"][0]["name"], "failed_login");
    assert!(data["rules"].get("email").is_none());
}

#[tokio::test]
async fn test_execute_sample_reads_configured_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("sample_authentication_data.csv"), AUTH_CSV).unwrap();

    let mut config = AppConfig::default();
    config.server.sample_dir = dir.path().to_path_buf();
    let executor = CommandExecutor::new(config);

    let result = executor
        .execute(Commands::Sample {
            data_type: "authentication".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(result.data.unwrap()["rows"], 3);

    let unknown = executor
        .execute(Commands::Sample {
            data_type: "firewall".to_string(),
        })
        .await;
    assert!(unknown.is_err());
}

#[tokio::test]
async fn test_execute_info() {
    let executor = CommandExecutor::default();
    let result = executor.execute(Commands::Info).await.unwrap();

    assert!(result.success);
    assert_eq!(result.data.unwrap()["data_types"].as_array().unwrap().len(), 5);
}

#[test]
fn test_render_text_lists_threat_rows() {
    let raw = RawRecordSet::from_csv_str(AUTH_CSV).unwrap();
    let pipeline = DetectionPipeline::builder().seed(5).build().unwrap();
    let result = pipeline.analyze(&raw, DataType::Authentication).unwrap();

    let text = render_analysis(&result, &OutputFormat::Text).unwrap();
    assert!(text.contains("Known threats: 2"));
    assert!(text.contains("  row 1"));
    assert!(text.ends_with("Risk level: medium"));
}
