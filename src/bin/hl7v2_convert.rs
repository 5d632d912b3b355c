use clap::{Arg, ArgAction, Command};
use octofhir_hl7v2::{ConverterConfig, Hl7v2Converter};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let matches = Command::new("hl7v2-convert")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Octofhir Team")
        .about("Convert HL7v2 messages into FHIR R4 transaction bundles")
        .arg(
            Arg::new("input")
                .value_name("FILE")
                .help("File with one or more HL7v2 messages")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON converter configuration")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("terminology-url")
                .short('t')
                .long("terminology-url")
                .value_name("URL")
                .help("FHIR base URL of the terminology store holding sender ConceptMaps"),
        )
        .arg(
            Arg::new("mapping-prefix")
                .long("mapping-prefix")
                .value_name("PREFIX")
                .help("Prefix of sender ConceptMap ids"),
        )
        .arg(
            Arg::new("pretty")
                .long("pretty")
                .help("Pretty-print the JSON output")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ConverterConfig::from_json_file(path)?,
        None => ConverterConfig::default(),
    };
    if let Some(url) = matches.get_one::<String>("terminology-url") {
        config = config.with_terminology_url(url.clone());
    }
    if let Some(prefix) = matches.get_one::<String>("mapping-prefix") {
        config = config.with_mapping_id_prefix(prefix.clone());
    }
    let pretty = matches.get_flag("pretty");

    let Some(input) = matches.get_one::<PathBuf>("input") else {
        return Err("missing input file".into());
    };
    let text = tokio::fs::read_to_string(input).await?;

    let converter = Hl7v2Converter::from_config(config)?;
    let results = converter.convert_text(&text).await;

    let mut failures = 0usize;
    for result in &results {
        if !result.is_success() {
            failures += 1;
        }
        let json = if pretty {
            serde_json::to_string_pretty(result)?
        } else {
            serde_json::to_string(result)?
        };
        println!("{json}");
    }

    tracing::info!(
        "Converted {} message(s), {} failed",
        results.len(),
        failures
    );

    if failures > 0 {
        std::process::exit(2);
    }
    Ok(())
}
