use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use go_instrument::config::{discover, InstrumentConfig};
use go_instrument::deps;
use go_instrument::edit::write_atomic;
use go_instrument::go::SourceUnit;
use go_instrument::instrument::{
    default_filter, Hygiene, Instrumenter, PatchTemplate, Rewrite, SuffixGenerator,
};
use rayon::prelude::*;
use similar::{ChangeTag, TextDiff};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::{DirEntry, WalkDir};

#[derive(Parser)]
#[command(name = "go-instrument")]
#[command(about = "Inject instrumentation templates into Go source files", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./instrument.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log more (-v debug, -vv trace); RUST_LOG is used otherwise
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Instrument Go files with the templates found in patch files
    Instrument {
        /// Go files or directories to instrument
        #[arg(short, long, required = true, num_args = 1..)]
        source: Vec<PathBuf>,

        /// Patch files holding templates (overrides the config file)
        #[arg(short, long, num_args = 1..)]
        patches: Vec<PathBuf>,

        /// Write the result here instead of stdout (single source file only)
        #[arg(short, long, conflicts_with = "replace")]
        output: Option<PathBuf>,

        /// Overwrite the source files in place
        #[arg(short, long)]
        replace: bool,

        /// Regex of function names to leave alone
        #[arg(long)]
        exclude_func: Option<String>,

        /// Also instrument *_test.go files found in directories
        #[arg(long)]
        include_tests: bool,

        /// Compute everything but write nothing
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Print the computed edits as JSON
        #[arg(long)]
        emit_edits: bool,
    },

    /// Show the templates a set of patch files provides
    Templates {
        /// Patch files to inspect
        #[arg(short, long, required = true, num_args = 1..)]
        patches: Vec<PathBuf>,
    },

    /// Copy module dependencies out of the module cache and redirect go.mod
    VendorDeps {
        /// Go module root (directory holding go.mod)
        #[arg(long)]
        project: PathBuf,

        /// Regex selecting dependency module paths
        #[arg(long)]
        path_pattern: Option<String>,

        /// Where module copies are stored, relative to the project
        #[arg(long)]
        pkgmod_dir: Option<PathBuf>,

        /// Select nothing instead of everything when the pattern matches no module
        #[arg(long)]
        no_fallback: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = env::current_dir().context("cannot determine working directory")?;
    let config = discover(cli.config.as_deref(), &cwd)?;

    match cli.command {
        Commands::Instrument {
            source,
            patches,
            output,
            replace,
            exclude_func,
            include_tests,
            dry_run,
            diff,
            emit_edits,
        } => {
            let mut config = config;
            if !patches.is_empty() {
                config.patches = patches;
            }
            if exclude_func.is_some() {
                config.exclude_func = exclude_func;
            }
            if include_tests {
                config.skip_tests = false;
            }
            let mode = if dry_run {
                OutputMode::DryRun
            } else if replace {
                OutputMode::InPlace
            } else if let Some(path) = output {
                OutputMode::File(path)
            } else {
                OutputMode::Stdout
            };
            cmd_instrument(&config, &source, mode, diff, emit_edits)
        }

        Commands::Templates { patches } => cmd_templates(&patches),

        Commands::VendorDeps {
            project,
            path_pattern,
            pkgmod_dir,
            no_fallback,
        } => {
            let mut vendor = config.vendor;
            if path_pattern.is_some() {
                vendor.path_pattern = path_pattern;
            }
            if let Some(dir) = pkgmod_dir {
                vendor.pkgmod_dir = dir;
            }
            if no_fallback {
                vendor.fallback_to_all = false;
            }
            let report = deps::vendor(&project, &vendor)?;
            for dir in &report.copied {
                eprintln!("{} copied {}", "✓".green(), dir.display());
            }
            for line in &report.replaces {
                eprint!("{} {}", "+".green(), line);
            }
            eprintln!(
                "{} module(s) copied, {} replace directive(s) added",
                report.copied.len(),
                report.replaces.len()
            );
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

enum OutputMode {
    Stdout,
    File(PathBuf),
    InPlace,
    DryRun,
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name == "vendor" || name == "testdata" || name.starts_with('.')
}

/// Go files named on the command line plus those found under directories.
fn discover_go_files(sources: &[PathBuf], skip_tests: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for source in sources {
        if source.is_file() {
            files.push(source.clone());
            continue;
        }
        if !source.is_dir() {
            bail!("source not found: {}", source.display());
        }
        for entry in WalkDir::new(source)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_skipped_dir(entry))
        {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_file()
                && name.ends_with(".go")
                && !(skip_tests && name.ends_with("_test.go"))
            {
                files.push(entry.path().to_path_buf());
            }
        }
    }
    files.dedup();
    Ok(files)
}

fn load_patches(paths: &[PathBuf]) -> Result<Vec<SourceUnit>> {
    if paths.is_empty() {
        bail!("no patch files given (use --patches or set `patches` in the config)");
    }
    paths
        .iter()
        .map(|path| {
            SourceUnit::read(path).with_context(|| format!("loading patch {}", path.display()))
        })
        .collect()
}

/// Helper: Show unified diff between original and instrumented content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!("{}", format!("--- {} (original)", file.display()).dimmed());
    println!("{}", format!("+++ {} (instrumented)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn instrument_file(
    instrumenter: &Instrumenter,
    path: &Path,
    patches: &[SourceUnit],
) -> Result<(String, Rewrite)> {
    let target = SourceUnit::read(path)?;
    let rewrite = instrumenter.rewrite(&target, patches)?;
    Ok((target.content().to_string(), rewrite))
}

fn cmd_instrument(
    config: &InstrumentConfig,
    sources: &[PathBuf],
    mode: OutputMode,
    show_diff: bool,
    emit_edits: bool,
) -> Result<()> {
    let patches = load_patches(&config.patches)?;
    let patch_paths: HashSet<PathBuf> = config
        .patches
        .iter()
        .filter_map(|path| path.canonicalize().ok())
        .collect();

    let files: Vec<PathBuf> = discover_go_files(sources, config.skip_tests)?
        .into_iter()
        .filter(|path| {
            path.canonicalize()
                .map_or(true, |canonical| !patch_paths.contains(&canonical))
        })
        .collect();
    if files.is_empty() {
        bail!("no Go files found");
    }
    if files.len() > 1 && matches!(mode, OutputMode::Stdout | OutputMode::File(_)) {
        bail!(
            "{} source files found; use --replace or --dry-run for more than one file",
            files.len()
        );
    }

    let exclude = config
        .exclude_regex()
        .context("invalid --exclude-func pattern")?;
    let instrumenter = Instrumenter::new(default_filter(exclude))
        .validate_output(config.validate_output);

    let results: Vec<(PathBuf, Result<(String, Rewrite)>)> = files
        .into_par_iter()
        .map(|path| {
            let result = instrument_file(&instrumenter, &path, &patches);
            (path, result)
        })
        .collect();

    let mut instrumented = 0;
    let mut unchanged = 0;
    let mut failed = 0;

    for (path, result) in results {
        let (original, rewrite) = match result {
            Ok(done) => done,
            Err(e) => {
                eprintln!("{} {}: {:#}", "✗".red(), path.display(), e);
                failed += 1;
                continue;
            }
        };

        if rewrite.is_unchanged() {
            eprintln!("{} {}: nothing to instrument", "⊙".yellow(), path.display());
            unchanged += 1;
        } else {
            eprintln!(
                "{} {}: {}",
                "✓".green(),
                path.display(),
                rewrite.instrumented.join(", ")
            );
            instrumented += 1;
        }

        if show_diff && !rewrite.is_unchanged() {
            display_diff(&path, &original, &rewrite.content);
        }
        if emit_edits {
            println!("{}", serde_json::to_string_pretty(&rewrite.edits)?);
        }

        match &mode {
            OutputMode::DryRun => {}
            OutputMode::Stdout => {
                if !show_diff && !emit_edits {
                    print!("{}", rewrite.content);
                }
            }
            OutputMode::File(out) => write_atomic(out, rewrite.content.as_bytes())
                .with_context(|| format!("writing {}", out.display()))?,
            OutputMode::InPlace => {
                if !rewrite.is_unchanged() {
                    write_atomic(&path, rewrite.content.as_bytes())
                        .with_context(|| format!("writing {}", path.display()))?;
                }
            }
        }
    }

    eprintln!("{}", "Summary:".bold());
    eprintln!("  {} instrumented", format!("{}", instrumented).green());
    eprintln!("  {} unchanged", format!("{}", unchanged).yellow());
    eprintln!("  {} failed", format!("{}", failed).red());

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_templates(paths: &[PathBuf]) -> Result<()> {
    let hygiene = Hygiene::new(SuffixGenerator::global());
    let mut found = 0;

    for path in paths {
        let unit = SourceUnit::read(path)?;
        let imports: Vec<_> = unit.import_specs().collect();
        println!("{}", path.display().to_string().bold());

        for decl in unit.functions() {
            match PatchTemplate::from_decl(path, decl, &imports) {
                Ok(template) => {
                    found += 1;
                    let renamed = hygiene.prepare(&template, path, &HashSet::new());
                    println!("{} {}", "✓".green(), decl.name);
                    println!("{}", renamed.to_go());
                }
                Err(mismatch) => {
                    println!("{} {}: {}", "⊘".yellow(), decl.name, mismatch.reason);
                }
            }
        }
    }

    if found == 0 {
        bail!("no valid patch found");
    }
    Ok(())
}
