//! KEYSTONE CLI
//!
//! Inspect the default policy table and synthesize stack manifests into
//! templates.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use keystone_compose::{schema_for, Manifest, PolicyTable, TemplateSynthesizer};
use keystone_core::ResourceKind;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
const LOG_ENV: &str = "KEYSTONE_LOG";

const DEFAULT_FILTER: &str = "keystone_compose=info,keystone_cli=info";

#[derive(Parser)]
#[command(name = "keystone")]
#[command(about = "KEYSTONE - declarative resource composition with safe defaults", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List resource kinds
    Kinds,
    /// Print the default field values of a kind
    Defaults {
        /// Kind tag, e.g. `queue`
        kind: String,
        /// Policy table to read instead of the built-in one
        #[arg(short, long)]
        policy: Option<PathBuf>,
    },
    /// Describe a kind's fields, children and attributes
    Describe {
        /// Kind tag, e.g. `function`
        kind: String,
        /// Policy table to read instead of the built-in one
        #[arg(short, long)]
        policy: Option<PathBuf>,
    },
    /// Synthesize a stack manifest
    Synth {
        /// Path to the manifest
        manifest: PathBuf,
        /// Policy table to read instead of the built-in one
        #[arg(short, long)]
        policy: Option<PathBuf>,
        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the bound graph instead of the template
        #[arg(long)]
        graph: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Kinds => {
            print!("{}", render_kinds(PolicyTable::builtin()));
            Ok(())
        }
        Commands::Defaults { kind, policy } => {
            let table = load_policy(policy.as_deref())?;
            println!("{}", render_defaults(&table, &kind)?);
            Ok(())
        }
        Commands::Describe { kind, policy } => {
            let table = load_policy(policy.as_deref())?;
            print!("{}", render_describe(&table, &kind)?);
            Ok(())
        }
        Commands::Synth {
            manifest,
            policy,
            output,
            graph,
        } => {
            let table = load_policy(policy.as_deref())?;
            let rendered = synth(&manifest, &table, graph)?;
            match output {
                Some(path) => {
                    fs::write(&path, rendered + "\n")
                        .wrap_err_with(|| format!("writing {}", path.display()))?;
                    info!(output = %path.display(), "template written");
                }
                None => println!("{}", rendered),
            }
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_policy(path: Option<&Path>) -> Result<PolicyTable> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)
                .wrap_err_with(|| format!("reading policy {}", path.display()))?;
            let table = PolicyTable::from_json(&json)
                .wrap_err_with(|| format!("loading policy {}", path.display()))?;
            info!(policy = %path.display(), version = %table.version(), "policy table loaded");
            Ok(table)
        }
        None => Ok(PolicyTable::builtin().clone()),
    }
}

fn parse_kind(kind: &str) -> Result<ResourceKind> {
    kind.parse::<ResourceKind>().map_err(|e| {
        let known: Vec<&str> = ResourceKind::ALL.iter().map(ResourceKind::tag).collect();
        eyre!("{} (known kinds: {})", e, known.join(", "))
    })
}

fn render_kinds(table: &PolicyTable) -> String {
    let mut out = String::new();
    for kind in ResourceKind::ALL {
        let schema = schema_for(kind);
        let children: Vec<&str> = schema.children.iter().map(ResourceKind::tag).collect();
        let attributes: Vec<&str> = schema.attributes.iter().map(|a| a.tag()).collect();
        let _ = write!(out, "{:<18} attributes: {}", kind.tag(), attributes.join(", "));
        if !children.is_empty() {
            let _ = write!(out, "; children: {}", children.join(", "));
        }
        if !table.contains(kind) {
            out.push_str(" (no defaults)");
        }
        out.push('\n');
    }
    out
}

fn render_defaults(table: &PolicyTable, kind: &str) -> Result<String> {
    let kind = parse_kind(kind)?;
    let defaults = table.defaults_for(kind)?;
    Ok(serde_json::to_string_pretty(defaults)?)
}

fn render_describe(table: &PolicyTable, kind: &str) -> Result<String> {
    let kind = parse_kind(kind)?;
    let schema = schema_for(kind);
    let defaults = table.defaults_for(kind).ok();

    let mut out = format!("{} (policy {})\n", kind, table.version());
    for field in schema.fields {
        let default = defaults
            .and_then(|d| d.get(field.name))
            .map(serde_json::to_string)
            .transpose()?
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {:<30} {:<9} {:<44} default: {}",
            field.name,
            if field.required { "required" } else { "optional" },
            field.ty.to_string(),
            default
        );
    }
    let _ = writeln!(out, "  child order: {:?}", schema.child_order);
    Ok(out)
}

fn synth(manifest: &Path, table: &PolicyTable, graph: bool) -> Result<String> {
    let json = fs::read_to_string(manifest)
        .wrap_err_with(|| format!("reading manifest {}", manifest.display()))?;
    let manifest = Manifest::from_json(&json)?;
    let synthesized = manifest.compose(table, TemplateSynthesizer::new())?;

    let rendered = if graph {
        serde_json::to_string_pretty(&synthesized.graph)?
    } else {
        synthesized.artifact.to_json_pretty()?
    };
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MANIFEST: &str = r#"{
        "stack": { "name": "Shop" },
        "resources": [
            { "kind": "table", "name": "OrdersTable" },
            { "kind": "function", "name": "Worker",
              "insert": { "environment": {
                  "TABLE": { "ref": { "target": "OrdersTable", "attribute": "name" } } } } }
        ]
    }"#;

    fn temp_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from(["keystone", "synth", "shop.json", "--graph"]).unwrap();
        assert!(matches!(cli.command, Commands::Synth { graph: true, .. }));
    }

    #[test]
    fn test_render_kinds_lists_every_kind() {
        let out = render_kinds(PolicyTable::builtin());
        assert_eq!(out.lines().count(), ResourceKind::ALL.len());
        assert!(out.contains("topic"));
        assert!(out.contains("children: subscription"));
    }

    #[test]
    fn test_render_defaults() {
        let out = render_defaults(PolicyTable::builtin(), "queue").unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["visibility_timeout"], 30);
    }

    #[test]
    fn test_unknown_kind() {
        let err = render_defaults(PolicyTable::builtin(), "cluster").unwrap_err();
        assert!(err.to_string().contains("known kinds"));
    }

    #[test]
    fn test_describe_marks_required_fields() {
        let out = render_describe(PolicyTable::builtin(), "function").unwrap();
        assert!(out.contains("memory_size"));
        assert!(out.contains("required"));
        assert!(out.contains("default: 512"));
    }

    #[test]
    fn test_custom_policy_file() {
        let policy = temp_file(r#"{"version": "1.2.0", "kinds": {"queue": {"visibility_timeout": 90}}}"#);
        let table = load_policy(Some(policy.path())).unwrap();
        let out = render_defaults(&table, "queue").unwrap();
        assert!(out.contains("90"));
        assert!(render_defaults(&table, "table").is_err());
    }

    #[test]
    fn test_incompatible_policy_file() {
        let policy = temp_file(r#"{"version": "2.0.0", "kinds": {}}"#);
        assert!(load_policy(Some(policy.path())).is_err());
    }

    #[test]
    fn test_synth_template_and_graph() {
        let manifest = temp_file(MANIFEST);
        let table = PolicyTable::builtin();

        let template: serde_json::Value =
            serde_json::from_str(&synth(manifest.path(), table, false).unwrap()).unwrap();
        assert_eq!(template["stack"]["name"], "Shop");
        assert_eq!(template["resources"]["Worker"]["depends_on"][0], "OrdersTable");

        let graph: serde_json::Value =
            serde_json::from_str(&synth(manifest.path(), table, true).unwrap()).unwrap();
        assert_eq!(graph["edges"][0]["from"], "OrdersTable");
    }

    #[test]
    fn test_synth_reports_composition_error() {
        let manifest = temp_file(
            r#"{"resources": [{"kind": "queue", "name": "A"}, {"kind": "queue", "name": "A"}]}"#,
        );
        let err = synth(manifest.path(), PolicyTable::builtin(), false).unwrap_err();
        assert!(err.to_string().contains("Duplicate logical name"));
    }
}
