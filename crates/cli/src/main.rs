use anyhow::Context;
use clap::{Parser, Subcommand};
use fhir::CdsHooks;
use pama_core::{
    apply_suggestion, constants::ORDER_SELECT_TRIGGER, controller::search_options, CdsConfig,
    CdsService, OrderCommand, TriggerGate, TriggerHandler, VocabularyKind, WidgetState,
};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pama")]
#[command(about = "PAMA imaging decision-support CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a vocabulary (procedures or reasons)
    Search {
        kind: VocabularyKind,
        /// Query text; a trailing space disables type-ahead on the last term
        query: String,
        /// Maximum number of results (defaults to the configured search limit)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List the options shown before any typing
    Options { kind: VocabularyKind },
    /// Generate hook context from a widget state file (`-` reads stdin)
    Context {
        state: PathBuf,
        /// Trigger point to generate context for
        #[arg(long, default_value = ORDER_SELECT_TRIGGER)]
        trigger: String,
    },
    /// Replay a session message and print the commands it produces
    Message {
        message: PathBuf,
        #[arg(long, default_value = ORDER_SELECT_TRIGGER)]
        trigger: String,
    },
    /// Replay a system-action batch and print the commands it produces
    SystemActions {
        batch: PathBuf,
        #[arg(long, default_value = ORDER_SELECT_TRIGGER)]
        trigger: String,
    },
    /// Apply a card suggestion and print the commands it produces
    Suggestion { suggestion: PathBuf },
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn commands_json(commands: &[OrderCommand]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(commands)?)
}

/// Run `command` against `service`, returning the JSON to print.
fn run(command: Commands, service: &CdsService) -> anyhow::Result<String> {
    match command {
        Commands::Search { kind, query, limit } => {
            let limit = limit.unwrap_or(service.config().search().search_limit);
            let options = search_options(service.index(kind), &query, limit);
            Ok(serde_json::to_string_pretty(&options)?)
        }
        Commands::Options { kind } => {
            Ok(serde_json::to_string_pretty(&service.default_options(kind))?)
        }
        Commands::Context { state, trigger } => {
            let widget: WidgetState = serde_json::from_str(&read_input(&state)?)
                .context("widget state does not match the expected shape")?;
            let handler = service.registry().get(&trigger)?;
            let context = handler.generate_context(&widget);
            Ok(CdsHooks::context_render(&context)?)
        }
        Commands::Message { message, trigger } => {
            let message = CdsHooks::message_parse(&read_input(&message)?)?;
            let handler = service.registry().get(&trigger)?;

            let mut commands: Vec<OrderCommand> = Vec::new();
            let done = handler.on_message(&message, &mut commands)?;
            Ok(serde_json::to_string_pretty(&serde_json::json!({
                "done": done,
                "commands": commands,
            }))?)
        }
        Commands::SystemActions { batch, trigger } => {
            let actions = CdsHooks::actions_parse(&read_input(&batch)?)?;
            let handler = service.registry().get(&trigger)?;

            let mut commands: Vec<OrderCommand> = Vec::new();
            handler.on_system_actions(&actions, &mut commands);
            commands_json(&commands)
        }
        Commands::Suggestion { suggestion } => {
            let suggestion = CdsHooks::suggestion_parse(&read_input(&suggestion)?)?;

            let mut commands: Vec<OrderCommand> = Vec::new();
            apply_suggestion(&suggestion, &mut commands)?;
            commands_json(&commands)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'pama --help' for commands");
        return Ok(());
    };

    let config = CdsConfig::from_lookup(|name| std::env::var(name).ok())?;
    let service = CdsService::new(config)?;

    if let Commands::Context { trigger, .. } = &command {
        if let TriggerGate::Explicit(tag) = service.registry().get(trigger)?.gate() {
            eprintln!("note: {trigger} sends this context only after {tag} fires");
        }
    }

    println!("{}", run(command, &service)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::io::Write;

    fn service() -> CdsService {
        CdsService::new(CdsConfig::default()).expect("service")
    }

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(args)
            .expect("arguments")
            .command
            .expect("command")
    }

    fn input(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(json.as_bytes()).expect("write input");
        file
    }

    fn output(command: Commands) -> Value {
        let text = run(command, &service()).expect("run");
        serde_json::from_str(&text).expect("json output")
    }

    #[test]
    fn search_honours_limit() {
        let out = output(parse(&["pama", "search", "procedures", "computed ", "--limit", "3"]));
        assert_eq!(out.as_array().expect("options").len(), 3);
    }

    #[test]
    fn rejects_unknown_vocabulary() {
        assert!(Cli::try_parse_from(["pama", "options", "drugs"]).is_err());
    }

    #[test]
    fn options_lists_reasons() {
        let out = output(parse(&["pama", "options", "reasons"]));
        assert_eq!(out[0]["label"], "Low back pain (finding)");
    }

    #[test]
    fn context_renders_draft_request() {
        let state = input(r#"{"patientId":"p1","draft":{"studyCoding":{"code":"72148"}}}"#);
        let path = state.path().to_str().expect("utf-8 path");

        let out = output(parse(&["pama", "context", path]));
        assert_eq!(
            out["draftOrders"]["entry"][0]["resource"]["subject"]["reference"],
            "Patient/p1"
        );
    }

    #[test]
    fn message_replay_reports_done() {
        let message = input(r#"{"messageType":"ui.done"}"#);
        let path = message.path().to_str().expect("utf-8 path");

        let out = output(parse(&["pama", "message", path]));
        assert_eq!(out["done"], true);
        assert_eq!(out["commands"], serde_json::json!([]));
    }

    #[test]
    fn system_actions_replay_applies_rating() {
        let batch = input(
            r#"[{"type":"update","resource":{"id":"r1","extension":[{
                "url":"http://fhir.org/argonaut/Extension/pama-rating",
                "valueCodeableConcept":{"coding":[{"code":"not-appropriate"}]}}]}}]"#,
        );
        let path = batch.path().to_str().expect("utf-8 path");

        let out = output(parse(&["pama", "system-actions", path]));
        assert_eq!(out[0]["type"], "APPLY_PAMA_RATING");
        assert_eq!(out[0]["rating"], "not-appropriate");
    }

    #[test]
    fn malformed_suggestion_fails() {
        let suggestion = input(r#"{"actions":[{"type":"update","resource":{"id":"x"}}]}"#);
        let path = suggestion.path().to_str().expect("utf-8 path");

        assert!(run(parse(&["pama", "suggestion", path]), &service()).is_err());
    }
}
