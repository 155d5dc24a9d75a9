//! Command-line interface for dita-tidy

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};

#[cfg(feature = "cli")]
use dita_tidy::{Config, Project};

#[cfg(feature = "cli")]
use tracing_subscriber::EnvFilter;

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "dita-tidy")]
#[command(author, version, about = "DITA identifier deduplication and mini-TOC maintenance", long_about = None)]
struct Cli {
    /// Log decisions about skipped files and rejected lists
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Name of the escrow directory created in the project root
    #[arg(long, global = true, value_name = "NAME")]
    escrow_dir: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Rename duplicate identifiers and rewrite the references to them
    Dedup {
        /// Project directory
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Only print the planned renames
        #[arg(long)]
        dry_run: bool,
    },

    /// Report child topics missing from their parent's mini-TOC
    Toc {
        /// Map file
        #[arg(value_name = "MAP")]
        map: PathBuf,
    },

    /// List title-only heading topics, or give them a mini-TOC
    #[command(name = "empty-headings")]
    EmptyHeadings {
        /// Map file
        #[arg(value_name = "MAP")]
        map: PathBuf,

        /// Write a mini-TOC into every empty heading
        #[arg(long)]
        fix: bool,
    },

    /// List topics the map does not reference, or move them to escrow
    Unreferenced {
        /// Map file
        #[arg(value_name = "MAP")]
        map: PathBuf,

        /// Directory to scan (defaults to the map's directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Move every unreferenced topic into escrow
        #[arg(long = "move")]
        move_files: bool,
    },
}

/// Route library `log` records to stderr. `RUST_LOG` applies unless
/// `--verbose` asks for everything down to debug.
#[cfg(feature = "cli")]
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let mut config = Config::default();
    if let Some(name) = cli.escrow_dir {
        config = config.with_escrow_dir_name(name);
    }

    let result = match cli.command {
        Commands::Dedup { dir, dry_run } => cmd_dedup(&dir, dry_run, config, cli.json),
        Commands::Toc { map } => cmd_toc(&map, config, cli.json),
        Commands::EmptyHeadings { map, fix } => cmd_empty_headings(&map, fix, config, cli.json),
        Commands::Unreferenced {
            map,
            dir,
            move_files,
        } => cmd_unreferenced(&map, dir, move_files, config, cli.json),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

#[cfg(feature = "cli")]
type CmdResult = Result<i32, Box<dyn std::error::Error>>;

#[cfg(feature = "cli")]
fn map_dir(map: &Path) -> PathBuf {
    map.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(feature = "cli")]
fn cmd_dedup(dir: &Path, dry_run: bool, config: Config, json_output: bool) -> CmdResult {
    let mut project = Project::with_config(dir, config);

    if dry_run {
        let plan = project.plan_duplicates()?;
        if json_output {
            let renames: Vec<_> = plan
                .renames()
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "file": r.file,
                        "original": r.original,
                        "replacement": r.replacement,
                        "kind": r.kind.to_string(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&renames)?);
        } else {
            for rename in plan.renames() {
                println!(
                    "{}: {} -> {} ({})",
                    rename.file.display(),
                    rename.original,
                    rename.replacement,
                    rename.kind
                );
            }
            println!("{} duplicates would be fixed", plan.duplicates_fixed());
        }
        return Ok(0);
    }

    let report = project.remove_duplicate_ids();
    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(0);
    }

    println!("{}", report.summary());
    if !report.log_success {
        println!(
            "Warning: the audit log in {} could not be written",
            project.escrow().dir().display()
        );
    }
    for error in &report.errors {
        println!("  - {}", error);
    }
    Ok(0)
}

#[cfg(feature = "cli")]
fn cmd_toc(map: &Path, config: Config, json_output: bool) -> CmdResult {
    let project = Project::with_config(map_dir(map), config);
    let defects = project.validate_toc(map);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&defects)?);
    } else if defects.is_empty() {
        println!("✓ No mini-TOC defects");
    } else {
        for defect in &defects {
            println!("{}: {}", defect.owner, defect.message);
        }
        println!();
        println!("{} defects", defects.len());
    }
    Ok(if defects.is_empty() { 0 } else { 1 })
}

#[cfg(feature = "cli")]
fn cmd_empty_headings(map: &Path, fix: bool, config: Config, json_output: bool) -> CmdResult {
    let mut project = Project::with_config(map_dir(map), config);

    if fix {
        let summary = project.fix_all_empty_headings(map);
        if json_output {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            for message in &summary.messages {
                println!("{}", message);
            }
            println!("Fixed {} empty headings, {} failed", summary.fixed, summary.failed);
        }
        return Ok(if summary.failed == 0 { 0 } else { 1 });
    }

    let headings = project.find_empty_headings(map);
    if json_output {
        println!("{}", serde_json::to_string_pretty(&headings)?);
    } else {
        for heading in &headings {
            println!(
                "{} ({}): {}",
                heading.file_name,
                heading.href,
                heading.child_hrefs.join(", ")
            );
        }
        println!("{} empty headings", headings.len());
    }
    Ok(0)
}

#[cfg(feature = "cli")]
fn cmd_unreferenced(
    map: &Path,
    dir: Option<PathBuf>,
    move_files: bool,
    config: Config,
    json_output: bool,
) -> CmdResult {
    let root = dir.unwrap_or_else(|| map_dir(map));
    let mut project = Project::with_config(&root, config);
    let files = project.find_unreferenced(map, None);

    if !move_files {
        if json_output {
            println!("{}", serde_json::to_string_pretty(&files)?);
        } else {
            for file in &files {
                if file.folder.is_empty() {
                    println!("{}", file.file_name);
                } else {
                    println!("{}/{}", file.folder, file.file_name);
                }
            }
            println!("{} unreferenced files", files.len());
        }
        return Ok(0);
    }

    let mut failed = 0;
    for file in &files {
        match project.move_unreferenced(&file.path) {
            Ok(record) => println!("Moved {}", record.relative.display()),
            Err(e) => {
                failed += 1;
                println!("Failed {}: {}", file.path.display(), e);
            }
        }
    }
    println!("Moved {} files, {} failed", files.len() - failed, failed);
    Ok(if failed == 0 { 0 } else { 1 })
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
