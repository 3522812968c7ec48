//! CLI for resolving a resource-set manifest and printing diagnostics

use clap::{Parser, Subcommand};
use modwire::{resolve_set, CandidateIndex, ResolveOptions, Resolver};
use modwire::{render, ResourceId, ResourceSetManifest};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(name = "modwire")]
#[clap(about = "Resolve a resource set and explain every decision")]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[clap(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a manifest and print the wiring plus diagnostics
    Resolve {
        /// Path to the resource-set manifest (JSON)
        #[clap(short, long)]
        manifest: PathBuf,

        /// Root resource id to resolve (repeatable; defaults to every
        /// resource in the manifest)
        #[clap(short, long)]
        root: Vec<String>,

        /// Publish a wiring even when some roots stay unresolved
        #[clap(long)]
        allow_partial: bool,

        /// Emit the full resolution result as JSON
        #[clap(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "modwire=debug" } else { "modwire=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.parse()?),
        )
        .with_ansi(false)
        .init();

    match args.command {
        Command::Resolve {
            manifest,
            root,
            allow_partial,
            json,
        } => {
            let text = std::fs::read_to_string(&manifest)?;
            let resources = ResourceSetManifest::from_json(&text)?.into_resources()?;
            info!(resources = resources.len(), "manifest loaded");

            let index = CandidateIndex::new(&resources);
            let options = ResolveOptions { allow_partial };
            let resolution = if root.is_empty() {
                resolve_set(&index, options)
            } else {
                let mut resolver = Resolver::new(&index, options);
                resolver.resolve_all(root.iter().map(|id| ResourceId::new(id.as_str())));
                resolver.finish()
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&resolution)?);
            } else {
                print_summary(&resolution);
            }

            if resolution.is_fully_resolved() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn print_summary(resolution: &modwire::Resolution) {
    for root in resolution.roots() {
        println!("{}: {:?}", root, resolution.state(root));
    }

    if let Some(wiring) = resolution.wiring() {
        if !wiring.is_empty() {
            println!("\nwiring:");
            for binding in wiring.bindings() {
                println!("  {} -> {}", binding.requirement, binding.capability);
            }
        }
    } else {
        println!("\nno wiring published (resolution incomplete)");
    }

    let report = resolution.report();
    if report.is_empty() {
        println!("\nreport: no diagnostics");
    } else {
        println!("\nreport:");
        let rendered: Vec<String> = report
            .resources()
            .map(|resource| render::explain(report, resource))
            .collect();
        print!("{}", rendered.join(""));
    }
}
