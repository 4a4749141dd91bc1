//! Command-line interface for the GPIDL toolchain
//!
//! Usage:
//!   gpidl validate <spec.jsonc>                      - Check a spec document
//!   gpidl synth <spec.jsonc> -o <out.json>           - Synthesize the encoding table
//!   gpidl render <encoding.json> -o <outdir>         - Render an encoding table
//!   gpidl count-forms <spec.jsonc>                   - Per-instruction leaf form counts
//!
//! Exit codes: 0 success, 1 validation or rendering failure, 2 unreadable or
//! unparseable input.

use clap::{Arg, ArgAction, Command};
use gpidl_analysis::validate_document;
use gpidl_babel::{FormatRegistry, RenderOptions};
use gpidl_config::{GpidlConfig, Loader};
use gpidl_parser::{parse_document, Spec};
use gpidl_synth::{synthesize, EncodingTable};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    let matches = Command::new("gpidl")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A toolchain for GPU instruction-set description documents")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .help("TOML configuration file layered over the built-in defaults"),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a spec document and report every violation")
                .arg(Arg::new("spec").help("Path to the spec JSONC file").required(true)),
        )
        .subcommand(
            Command::new("synth")
                .about("Synthesize the encoding table from a valid spec")
                .arg(Arg::new("spec").help("Path to the spec JSONC file").required(true))
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .help("Output JSON path")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("render")
                .about("Render an encoding table into browsable pages")
                .arg(
                    Arg::new("table")
                        .help("Path to the encoding table JSON")
                        .required_unless_present("list-formats"),
                )
                .arg(
                    Arg::new("outdir")
                        .long("outdir")
                        .short('o')
                        .help("Output directory for rendered pages")
                        .required_unless_present("list-formats"),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .help("Output format")
                        .default_value("html"),
                )
                .arg(
                    Arg::new("list-formats")
                        .long("list-formats")
                        .help("List available output formats")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("count-forms")
                .about("Count flattened leaf forms per instruction")
                .arg(Arg::new("spec").help("Path to the spec JSONC file").required(true)),
        )
        .get_matches();

    let config = load_config(matches.get_one::<String>("config"));

    match matches.subcommand() {
        Some(("validate", sub)) => {
            let spec = sub.get_one::<String>("spec").expect("spec is required");
            handle_validate(spec);
        }
        Some(("synth", sub)) => {
            let spec = sub.get_one::<String>("spec").expect("spec is required");
            let output = sub.get_one::<String>("output").expect("output is required");
            handle_synth(spec, output, &config);
        }
        Some(("render", sub)) => {
            if sub.get_flag("list-formats") {
                handle_list_formats();
                return;
            }
            let table = sub.get_one::<String>("table").expect("table is required");
            let outdir = sub.get_one::<String>("outdir").expect("outdir is required");
            let format = sub.get_one::<String>("format").expect("format has a default");
            handle_render(table, outdir, format, &config);
        }
        Some(("count-forms", sub)) => {
            let spec = sub.get_one::<String>("spec").expect("spec is required");
            handle_count_forms(spec);
        }
        _ => unreachable!("subcommand is required"),
    }
}

fn load_config(path: Option<&String>) -> GpidlConfig {
    let loader = match path {
        Some(path) => Loader::new().with_file(path),
        None => Loader::new(),
    };
    loader.build().unwrap_or_else(|e| {
        eprintln!("configuration error: {e}");
        process::exit(2);
    })
}

fn read_file(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error: cannot read {path}: {e}");
        process::exit(2);
    })
}

/// Parse a JSONC spec file, exiting with status 2 on malformed input.
fn load_spec_document(path: &str) -> Value {
    parse_document(&read_file(path)).unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(2);
    })
}

/// Run the validator; print diagnostics and exit 1 if any are found.
fn require_valid(doc: &Value) {
    let diagnostics = validate_document(doc);
    if !diagnostics.is_empty() {
        for diagnostic in &diagnostics {
            eprintln!("{diagnostic}");
        }
        eprintln!("total errors: {}", diagnostics.len());
        process::exit(1);
    }
}

fn handle_validate(spec_path: &str) {
    let doc = load_spec_document(spec_path);
    require_valid(&doc);
    println!("OK: spec format valid");
}

fn handle_synth(spec_path: &str, output: &str, config: &GpidlConfig) {
    let doc = load_spec_document(spec_path);
    require_valid(&doc);

    let spec = Spec::from_value(&doc).unwrap_or_else(|e| {
        eprintln!("invalid spec: {e}");
        process::exit(2);
    });
    let table = synthesize(&spec).unwrap_or_else(|e| {
        eprintln!("synthesis error: {e}");
        process::exit(1);
    });

    let mut json = if config.synth.pretty {
        serde_json::to_string_pretty(&table)
    } else {
        serde_json::to_string(&table)
    }
    .unwrap_or_else(|e| {
        eprintln!("error: cannot serialize encoding table: {e}");
        process::exit(1);
    });
    json.push('\n');

    fs::write(output, json).unwrap_or_else(|e| {
        eprintln!("error: cannot write {output}: {e}");
        process::exit(1);
    });
    println!("Wrote {output}");
}

fn handle_list_formats() {
    let registry = FormatRegistry::with_defaults();
    println!("Available output formats:\n");
    for name in registry.list_formats() {
        let description = registry
            .get(&name)
            .map(|f| f.description().to_string())
            .unwrap_or_default();
        println!("  {name}");
        println!("    {description}");
        println!();
    }
}

fn handle_render(table_path: &str, outdir: &str, format: &str, config: &GpidlConfig) {
    let table: EncodingTable = serde_json::from_str(&read_file(table_path)).unwrap_or_else(|e| {
        eprintln!("failed to parse encoding table: {e}");
        process::exit(2);
    });

    let registry = FormatRegistry::with_defaults();
    let options = RenderOptions {
        bits_per_row: config.render.bits_per_row,
        instructions_dir: config.render.instructions_dir.clone(),
        title: config.render.title.clone(),
    };
    let pages = registry.serialize(&table, format, &options).unwrap_or_else(|e| {
        eprintln!("render error: {e}");
        process::exit(1);
    });

    let root = Path::new(outdir);
    for page in &pages {
        let target = root.join(&page.path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).unwrap_or_else(|e| {
                eprintln!("error: cannot create {}: {e}", parent.display());
                process::exit(1);
            });
        }
        fs::write(&target, &page.contents).unwrap_or_else(|e| {
            eprintln!("error: cannot write {}: {e}", target.display());
            process::exit(1);
        });
    }
    println!("Wrote {} pages to {outdir}", pages.len());
}

fn handle_count_forms(spec_path: &str) {
    let doc = load_spec_document(spec_path);
    let Some(instructions) = doc.get("instructions").and_then(Value::as_object) else {
        eprintln!("invalid spec: 'instructions' is not an object");
        process::exit(2);
    };

    let mut counts: Vec<(&String, usize)> = instructions
        .iter()
        .filter_map(|(name, inst)| {
            inst.as_object().map(|inst| {
                let count = inst
                    .get("forms")
                    .and_then(Value::as_object)
                    .map(|forms| forms.values().map(count_flat_forms).sum())
                    .unwrap_or(0);
                (name, count)
            })
        })
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    for (name, count) in counts {
        println!("{count:4} {name}");
    }
}

/// Nested `forms` mappings are containers; every leaf below counts once.
fn count_flat_forms(form: &Value) -> usize {
    match form.get("forms").and_then(Value::as_object) {
        Some(children) => children.values().map(count_flat_forms).sum(),
        None => 1,
    }
}
