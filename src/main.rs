use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use literal_patcher::config::{load_from_path, PatchConfig};
use literal_patcher::{
    load, patch_file, preview_file, verify, verify_document, PatchReport, RuleOutcome,
    VerifyReport,
};
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "literal-patcher")]
#[command(about = "Ordered literal find-and-replace patching with marker verification", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply patch sets to their target files
    Apply {
        /// Directory relative targets resolve against (defaults to the current directory)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Specific patch set to apply (otherwise applies all in patches/)
        #[arg(short, long)]
        patches: Option<PathBuf>,

        /// Override the target file named in the patch set (needs exactly one patch set)
        #[arg(short, long)]
        target: Option<PathBuf>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Exit with status 1 if any anchor is missing or any marker is absent
        #[arg(long)]
        strict: bool,

        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which rules would apply, without writing
    Status {
        #[arg(short, long)]
        root: Option<PathBuf>,

        #[arg(short, long)]
        patches: Option<PathBuf>,

        /// Override the target file named in the patch set (needs exactly one patch set)
        #[arg(short, long)]
        target: Option<PathBuf>,
    },

    /// Check that every marker of each patch set is present in its target
    Verify {
        #[arg(short, long)]
        root: Option<PathBuf>,

        #[arg(short, long)]
        patches: Option<PathBuf>,

        /// Override the target file named in the patch set (needs exactly one patch set)
        #[arg(short, long)]
        target: Option<PathBuf>,
    },

    /// List the rules and markers of each patch set
    List {
        #[arg(short, long)]
        root: Option<PathBuf>,

        #[arg(short, long)]
        patches: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let ansi = !matches!(cli.command, Commands::Apply { json: true, .. });
    init_logging(ansi);

    match cli.command {
        Commands::Apply {
            root,
            patches,
            target,
            dry_run,
            diff,
            strict,
            json,
        } => cmd_apply(ApplyOptions {
            root,
            patches,
            target,
            dry_run,
            show_diff: diff,
            strict,
            json,
        }),

        Commands::Status {
            root,
            patches,
            target,
        } => cmd_status(root, patches, target),

        Commands::Verify {
            root,
            patches,
            target,
        } => cmd_verify(root, patches, target),

        Commands::List { root, patches } => cmd_list(root, patches),
    }
}

/// Diagnostics go to stderr; stdout is reserved for the report.
fn init_logging(ansi: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .try_init();
}

fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(path) => path
            .canonicalize()
            .with_context(|| format!("root directory {} does not exist", path.display())),
        None => env::current_dir().context("cannot determine current directory"),
    }
}

/// Helper: Discover all .toml patch sets in a patches/ directory.
///
/// Discovery order:
/// 1. `<root>/patches`
/// 2. `./patches` relative to the current working directory
fn discover_patch_files(root: &Path) -> Result<Vec<PathBuf>> {
    let cwd_patches_dir = env::current_dir().ok().map(|cwd| cwd.join("patches"));
    let candidate_dirs: Vec<PathBuf> = std::iter::once(root.join("patches"))
        .chain(cwd_patches_dir)
        .collect();

    for patches_dir in candidate_dirs {
        if !patches_dir.exists() {
            continue;
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&patches_dir).max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
            {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort();

        if !files.is_empty() {
            return Ok(files);
        }
    }

    anyhow::bail!(
        "No .toml patch sets found in either ./patches or {}/patches",
        root.display()
    )
}

fn patch_files(root: &Path, patches: Option<PathBuf>) -> Result<Vec<PathBuf>> {
    match patches {
        Some(path) => Ok(vec![path]),
        None => discover_patch_files(root),
    }
}

/// Reject `--target` when it would funnel several patch sets into one file.
fn check_target_override(target: Option<&Path>, files: &[PathBuf]) -> Result<()> {
    if target.is_some() && files.len() != 1 {
        anyhow::bail!(
            "--target needs exactly one patch set but {} were selected; pick one with --patches",
            files.len()
        );
    }
    Ok(())
}

fn resolve_target(config: &PatchConfig, root: &Path, target: Option<&Path>) -> PathBuf {
    target
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.target_path(root))
}

fn load_config(path: &Path) -> Result<PatchConfig> {
    Ok(load_from_path(path)?)
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

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

fn print_rule(id: &str, outcome: &RuleOutcome, dry_run: bool) {
    match outcome {
        RuleOutcome::Applied { replacements } => {
            let verb = if dry_run { "Would apply" } else { "Applied" };
            println!("  {} {}: {} ({} replacement(s))", "✓".green(), id, verb, replacements);
        }
        RuleOutcome::AlreadyApplied => {
            println!("  {} {}: Already applied", "⊙".yellow(), id);
        }
        RuleOutcome::AnchorNotFound { hint } => {
            eprintln!("  {} {}: {}", "✗".red(), id, "Anchor not found".red());
            match hint {
                Some(hint) => eprintln!("    Closest match: {}", hint),
                None => eprintln!("    No similar line in target"),
            }
        }
    }
}

fn print_verification(report: &VerifyReport) {
    for check in &report.checks {
        let value = if check.present {
            "true".green()
        } else {
            "false".red()
        };
        println!("{}: {}", check.label, value);
    }
    println!("File size: {}", report.char_count);
}

struct ApplyOptions {
    root: Option<PathBuf>,
    patches: Option<PathBuf>,
    target: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
    strict: bool,
    json: bool,
}

#[derive(Serialize)]
struct PatchSetOutput {
    patch_set: PathBuf,
    dry_run: bool,
    report: PatchReport,
    verification: VerifyReport,
}

fn cmd_apply(opts: ApplyOptions) -> Result<()> {
    let root = resolve_root(opts.root)?;
    let files = patch_files(&root, opts.patches)?;
    check_target_override(opts.target.as_deref(), &files)?;

    let mut outputs = Vec::new();
    let mut total_applied = 0;
    let mut total_already_applied = 0;
    let mut total_missing = 0;
    let mut total_absent_markers = 0;

    for patch_file_path in files {
        if !opts.json {
            println!("Loading patches from {}...", patch_file_path.display());
        }

        let config = load_config(&patch_file_path)?;
        let target = resolve_target(&config, &root, opts.target.as_deref());

        let (report, verification, diff) = if opts.dry_run {
            let (report, before, after) = preview_file(&target, &config.rules)
                .with_context(|| format!("failed to read {}", target.display()))?;
            let verification = verify_document(&target, &after, &config.markers);
            (report, verification, Some((before, after)))
        } else {
            // Capture file contents before applying (for diff output)
            let before = if opts.show_diff {
                Some(load(&target).with_context(|| format!("failed to read {}", target.display()))?)
            } else {
                None
            };

            let report = patch_file(&target, &config.rules, config.meta.line_ending)
                .with_context(|| format!("failed to patch {}", target.display()))?;
            let verification = verify(&target, &config.markers)
                .with_context(|| format!("failed to verify {}", target.display()))?;

            let diff = match before {
                Some(before) => Some((before, load(&target)?)),
                None => None,
            };
            (report, verification, diff)
        };

        if opts.show_diff && !opts.json {
            if let Some((before, after)) = &diff {
                if before != after {
                    display_diff(&target, before, after);
                }
            }
        }

        total_applied += report.applied();
        total_already_applied += report.already_applied();
        total_missing += report.missing_anchors();
        total_absent_markers += verification.checks.iter().filter(|c| !c.present).count();

        if opts.json {
            outputs.push(PatchSetOutput {
                patch_set: patch_file_path,
                dry_run: opts.dry_run,
                report,
                verification,
            });
            continue;
        }

        println!("Target: {}", target.display());
        if opts.dry_run {
            println!("{}", "  [DRY RUN - showing what would be applied]".cyan());
        }
        for rule in &report.rules {
            print_rule(&rule.id, &rule.outcome, opts.dry_run);
        }
        println!();
        print_verification(&verification);
        println!();
    }

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    } else {
        println!("{}", "Summary:".bold());
        println!("  {} applied", format!("{}", total_applied).green());
        println!(
            "  {} already applied",
            format!("{}", total_already_applied).yellow()
        );
        println!("  {} anchor(s) not found", format!("{}", total_missing).red());
        println!(
            "  {} marker(s) absent",
            format!("{}", total_absent_markers).red()
        );
    }

    if opts.strict && (total_missing > 0 || total_absent_markers > 0) {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_status(
    root: Option<PathBuf>,
    patches: Option<PathBuf>,
    target_override: Option<PathBuf>,
) -> Result<()> {
    let root = resolve_root(root)?;
    let files = patch_files(&root, patches)?;
    check_target_override(target_override.as_deref(), &files)?;

    println!("{}", "Patch Status Report".bold());
    println!("Root: {}", root.display());
    println!();

    for patch_file_path in files {
        let config = load_config(&patch_file_path)?;
        let target = resolve_target(&config, &root, target_override.as_deref());
        let (report, _, _) = preview_file(&target, &config.rules)
            .with_context(|| format!("failed to read {}", target.display()))?;

        println!(
            "{} ({})",
            config.meta.name.bold(),
            target.display().to_string().dimmed()
        );
        for rule in &report.rules {
            match &rule.outcome {
                RuleOutcome::Applied { .. } => {
                    println!("  {} {} (not applied)", "⊙".yellow(), rule.id)
                }
                RuleOutcome::AlreadyApplied => {
                    println!("  {} {} (applied)", "✓".green(), rule.id)
                }
                other => println!("  {} {} ({})", "✗".red(), rule.id, other),
            }
        }
        println!();
    }

    Ok(())
}

fn cmd_verify(
    root: Option<PathBuf>,
    patches: Option<PathBuf>,
    target_override: Option<PathBuf>,
) -> Result<()> {
    let root = resolve_root(root)?;
    let files = patch_files(&root, patches)?;
    check_target_override(target_override.as_deref(), &files)?;

    println!("{}", "Verifying markers...".bold());
    println!();

    let mut absent = 0;
    for patch_file_path in files {
        let config = load_config(&patch_file_path)?;
        let target = resolve_target(&config, &root, target_override.as_deref());
        let report = verify(&target, &config.markers)
            .with_context(|| format!("failed to verify {}", target.display()))?;

        println!("Target: {}", target.display());
        print_verification(&report);
        println!();

        absent += report.checks.iter().filter(|c| !c.present).count();
    }

    if absent > 0 {
        eprintln!("{} {} marker(s) absent", "✗".red(), absent);
        std::process::exit(1);
    }

    println!("{} all markers present", "✓".green());
    Ok(())
}

fn cmd_list(root: Option<PathBuf>, patches: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(root)?;

    for patch_file_path in patch_files(&root, patches)? {
        let config = load_config(&patch_file_path)?;

        println!(
            "{} {}",
            config.meta.name.bold(),
            format!("({})", patch_file_path.display()).dimmed()
        );
        if let Some(description) = &config.meta.description {
            println!("  {}", description);
        }
        println!("  Target: {}", config.meta.target);
        println!("  Rules:");
        for rule in &config.rules {
            let guard = match &rule.skip_if_present {
                Some(_) => " [guarded]",
                None => "",
            };
            println!("    - {} (count {}){}", rule.id, rule.count, guard);
        }
        println!("  Markers:");
        for marker in &config.markers {
            println!("    - {}: {:?}", marker.label, marker.text);
        }
        println!();
    }

    Ok(())
}
