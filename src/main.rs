//! iniconf CLI - inspect and edit layered ini configuration files.

use clap::Parser;
use iniconf::cli::{Cli, Commands, Output, ValuesResult};
use iniconf::command::{self, CommandVerb, RemoteCommand};
use iniconf::{ConfigInstance, Error, IniContainer, IniOptions, IniValue, Result};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;
    init_logging(cli.verbose);

    match run(cli) {
        Ok(result) => output(&result, human),
        Err(e) => {
            if human {
                eprintln!("Error: {}", e);
            } else {
                eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
            }
            process::exit(1);
        }
    }
}

/// Log to stderr. `-v` forces debug, otherwise `RUST_LOG` or warnings only.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("iniconf=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ValuesResult> {
    // One-shot commands: no autosave timer, no file watch
    let mut options = IniOptions::new(&cli.application, &cli.name)
        .autosave_interval(None)
        .watch(false);
    if let Some(dir) = &cli.dir {
        options = options.directory(dir);
    }

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Other(format!("Failed to create runtime: {}", e)))?
        .block_on(run_command(cli.command, options))
}

async fn run_command(command: Commands, options: IniOptions) -> Result<ValuesResult> {
    let container = IniContainer::new(options);
    container.load().await?;
    let file = container.paths().file.display().to_string();

    let (values, saved) = match command {
        Commands::Show { section } => {
            let instances = match section {
                Some(name) => vec![container.register_untyped(&name)?],
                None => container.register_all_untyped()?,
            };
            let values: Vec<IniValue> = instances.iter().flat_map(|i| i.ini_values()).collect();
            (values, false)
        }
        Commands::Get { section, key } => {
            let instance = container.register_untyped(&section)?;
            (vec![value_for_key(&instance, &key)?], false)
        }
        Commands::Set {
            section,
            key,
            value,
        } => {
            let instance = container.register_untyped_with_keys(&section, &[&key])?;
            let target = value_for_key(&instance, &key)?;
            target.set_text(&value)?;
            container.save().await?;
            (vec![target], true)
        }
        Commands::Reset { section, key } => {
            let instance = container.register_untyped(&section)?;
            let targets = match key {
                Some(key) => vec![value_for_key(&instance, &key)?],
                None => instance.ini_values(),
            };
            for target in &targets {
                target.reset()?;
            }
            container.save().await?;
            // Let the defaults and constants layers show through again
            container.reload(false).await?;
            (targets, true)
        }
        Commands::Exec { path } => {
            let remote: RemoteCommand = path.parse()?;
            let values = command::execute(&container, &remote)?;
            let mutates = remote.verb != CommandVerb::Get;
            if mutates {
                container.save().await?;
            }
            (values, mutates)
        }
    };

    let values = values
        .iter()
        .map(IniValue::info)
        .collect::<Result<Vec<_>>>()?;
    Ok(ValuesResult {
        file,
        values,
        saved,
    })
}

fn value_for_key(instance: &ConfigInstance, key: &str) -> Result<IniValue> {
    let property = instance
        .descriptor()
        .property_by_ini_key(key)
        .ok_or_else(|| Error::UnknownProperty(format!("{}.{}", instance.name(), key)))?;
    instance.ini_value(property.name())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
