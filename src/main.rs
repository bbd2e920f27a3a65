// Main entry point for the moviedb CLI
// This provides an interactive shell to run entity queries against a data store

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use moviedb::config::DEFAULT_CONFIG_FILE;
use moviedb::{Parameters, Session, SessionFactory, Value};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// moviedb - query a movie database with an entity query language
#[derive(ClapParser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Persistence config file
    #[arg(short, long, env = "MOVIEDB_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Profile of the config file to open
    #[arg(short = 'P', long, default_value = "movies")]
    profile: String,

    /// Execute a single query and exit
    #[arg(short, long)]
    execute: Option<String>,

    /// Bind a query parameter, as name=value (repeatable)
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<(String, Value)>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn parse_param(input: &str) -> Result<(String, Value), String> {
    let (name, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", input))?;
    let name = name.trim().trim_start_matches(':');
    if name.is_empty() {
        return Err(format!("missing parameter name in '{}'", input));
    }
    Ok((name.to_string(), Value::parse_literal(value.trim())))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let factory = SessionFactory::from_config(&args.config, &args.profile).with_context(|| {
        format!(
            "cannot open profile '{}' of {}",
            args.profile,
            args.config.display()
        )
    })?;
    let session = factory.open_session();
    let mut params: Parameters = args.params.into_iter().collect();

    // If a query was provided, run it and exit
    if let Some(query) = args.execute {
        return execute_query(&session, &query, &params);
    }

    // Interactive REPL (Read-Eval-Print Loop)
    println!("╔════════════════════════════════════════════╗");
    println!("║         moviedb Interactive Shell          ║");
    println!("╚════════════════════════════════════════════╝");
    println!();
    println!("Profile '{}' from {}", args.profile, args.config.display());
    println!("Type queries or '.help' for help");
    println!("Type '.exit' to quit");
    println!();

    repl(&factory, &session, &mut params)
}

fn repl(factory: &SessionFactory, session: &Session<'_>, params: &mut Parameters) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("moviedb> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            // EOF
            println!();
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.starts_with('.') {
            let mut words = input.splitn(3, char::is_whitespace);
            match (words.next(), words.next(), words.next()) {
                (Some(".exit" | ".quit"), _, _) => {
                    println!("Goodbye!");
                    break;
                }
                (Some(".help"), _, _) => print_help(),
                (Some(".param"), Some(name), Some(value)) => {
                    let name = name.trim_start_matches(':').to_string();
                    let value = Value::parse_literal(value.trim());
                    println!("{} = {} ({})", name, value, value.type_name());
                    params.insert(name, value);
                }
                (Some(".param"), _, _) => println!("Usage: .param <name> <value>"),
                (Some(".params"), _, _) => print_params(params),
                (Some(".clear"), _, _) => {
                    params.clear();
                    println!("Parameters cleared");
                }
                (Some(".entities"), _, _) => print_entities(factory),
                _ => {
                    println!("Unknown command: {}", input);
                    println!("Type '.help' for help");
                }
            }
            continue;
        }

        if let Err(e) = execute_query(session, input, params) {
            eprintln!("Error: {}", e);
        }
    }

    Ok(())
}

fn execute_query(session: &Session<'_>, query: &str, params: &Parameters) -> Result<()> {
    let result = session.query(query, params)?;
    println!("{}", result.format());
    Ok(())
}

fn print_params(params: &Parameters) {
    if params.is_empty() {
        println!("No parameters bound");
        return;
    }
    let mut names: Vec<&String> = params.keys().collect();
    names.sort();
    for name in names {
        if let Some(value) = params.get(name) {
            println!("  :{} = {} ({})", name, value, value.type_name());
        }
    }
}

fn print_entities(factory: &SessionFactory) {
    for entity in factory.executor().metamodel().entities() {
        let attributes: Vec<&str> = entity.columns().map(|a| a.name).collect();
        let relations: Vec<String> = entity
            .relations
            .iter()
            .map(|r| format!("{} -> {}", r.name, r.target))
            .collect();
        println!("  {}", entity.name);
        println!("    attributes: {}", attributes.join(", "));
        if !relations.is_empty() {
            println!("    relations:  {}", relations.join(", "));
        }
    }
}

fn print_help() {
    println!("╔════════════════════════════════════════════╗");
    println!("║               moviedb Help                 ║");
    println!("╚════════════════════════════════════════════╝");
    println!();
    println!("Special Commands:");
    println!("  .help                Show this help message");
    println!("  .param <name> <val>  Bind a parameter (dates as YYYY-MM-DD)");
    println!("  .params              List bound parameters");
    println!("  .clear               Unbind all parameters");
    println!("  .entities            List entities, attributes and relations");
    println!("  .exit, .quit         Exit the shell");
    println!();
    println!("Queries:");
    println!("    SELECT p FROM Person p ORDER BY p.identity");
    println!("    SELECT p FROM Person p WHERE p.identity = :identity");
    println!("    SELECT DISTINCT p FROM Person p JOIN p.roles r JOIN r.film f");
    println!("      JOIN f.countries c WHERE c.name = :name");
    println!("    SELECT p FROM Person p WHERE YEAR(p.birthDate) = :year");
    println!();
    println!("Notes:");
    println!("  - Keywords are case-insensitive, entity and attribute names are not");
    println!("  - Every FROM and JOIN needs an alias");
    println!("  - String literals must be in single quotes");
    println!();
}
