//! reqtrace - Trace requirements through specs, code and tests
//!
//! reqtrace reads `requirement` and spec clause directives from `.rst`
//! documents, `@implements` / `@tests` annotations from C, C++, Rust and
//! Python sources, links them into a traceability graph and reports the gaps.

use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use owo_colors::OwoColorize;
use reqtrace::config::find_project_root;
use reqtrace::output::{
    render_diff, render_gap_analysis, render_spec_mapping, render_status, render_verification,
    timestamp, write_matrix,
};
use reqtrace::validate::{EXIT_FAILED, EXIT_NO_REQUIREMENTS, EXIT_PASSED, Validation, render_validation};
use reqtrace::{Analysis, Project};
use reqtrace_api::MatrixDocument;
use reqtrace_core::{
    FileKind, FuzzyMatcher, Requirement, RequirementDiff, Sources, SpecMapping, WalkSources,
};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Requirements traceability for specs, code and tests")]
struct Cli {
    /// Path to config file (default: <root>/reqtrace.yaml)
    #[clap(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Project root (default: nearest directory with reqtrace.yaml or .git)
    #[clap(long = "root", short = 'C', global = true)]
    root: Option<PathBuf>,

    /// Read code references and test cases from a needs document instead of
    /// scanning sources
    #[clap(long, global = true)]
    code_refs: Option<PathBuf>,

    /// Show debug logging and complete lists
    #[clap(long, short = 'v', global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan sources and write the code reference document
    Extract {
        /// Output file (default: the configured code_refs path)
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Write matrix.json, matrix.csv, matrix.html and gap_analysis.md
    Matrix {
        /// Output directory (default: the configured output_dir)
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,

        /// Leave out the generation timestamp
        #[clap(long)]
        no_timestamp: bool,
    },

    /// Print the gap analysis
    Gaps {
        /// Output file (default: stdout)
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Look for unannotated implementations of requirements
    Verify {
        /// Output file (default: stdout)
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,

        /// Fail if the effective implementation rate is below this percentage
        #[clap(long)]
        min_coverage: Option<f64>,

        /// Fail if any non-exempt requirement has no implementation at all
        #[clap(long)]
        fail_on_critical_gaps: bool,
    },

    /// Report how requirements map onto spec clauses
    Specs {
        /// Output file (default: stdout)
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,

        /// Fail on invalid or missing spec links
        #[clap(long)]
        strict: bool,
    },

    /// Compare requirements against a baseline
    Diff {
        /// Baseline matrix.json, or a directory of requirement documents
        #[clap(long)]
        baseline: PathBuf,

        /// Output file (default: stdout)
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Check traceability and exit non-zero on failure
    Validate {
        /// Treat warnings as errors
        #[clap(long)]
        strict: bool,

        /// Exit with code 2 when no requirements are found
        #[clap(long)]
        ci: bool,
    },

    /// Print a traceability summary (default)
    Status,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = run(cli)?;
    if code != EXIT_PASSED {
        std::process::exit(code);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<i32> {
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => {
            let cwd = std::env::current_dir().wrap_err("Failed to get current directory")?;
            find_project_root(&cwd)
        }
    };
    debug!("project root: {}", root.display());

    let project = Project::open(&root, cli.config.as_deref())?;
    let code_refs = cli.code_refs.as_deref();

    match cli.command.unwrap_or(Command::Status) {
        Command::Extract { output } => run_extract(&project, output),
        Command::Matrix {
            output,
            no_timestamp,
        } => run_matrix(&project, code_refs, output, no_timestamp),
        Command::Gaps { output } => {
            let analysis = analyze(&project, code_refs)?;
            let report = render_gap_analysis(&project.name(), &analysis, None);
            emit(&report, output.as_deref())?;
            Ok(EXIT_PASSED)
        }
        Command::Verify {
            output,
            min_coverage,
            fail_on_critical_gaps,
        } => run_verify(&project, code_refs, output, min_coverage, fail_on_critical_gaps),
        Command::Specs { output, strict } => run_specs(&project, code_refs, output, strict),
        Command::Diff { baseline, output } => run_diff(&project, code_refs, &baseline, output),
        Command::Validate { strict, ci } => run_validate(&project, code_refs, strict, ci),
        Command::Status => {
            let analysis = analyze(&project, code_refs)?;
            print!("{}", render_status(&project.name(), &analysis, cli.verbose));
            Ok(EXIT_PASSED)
        }
    }
}

fn analyze(project: &Project, code_refs: Option<&Path>) -> Result<Analysis> {
    eprintln!(
        "{} Scanning {}...",
        "->".blue().bold(),
        project.root.display()
    );
    let analysis = project.analyze(code_refs)?;
    eprintln!(
        "   Found {} requirements, {} code references, {} test cases",
        analysis.graph.requirements.len().to_string().green(),
        analysis.graph.code_refs.len().to_string().green(),
        analysis.graph.test_cases.len().to_string().green()
    );
    Ok(analysis)
}

/// Write `content` to `path`, or to stdout when there is no path.
fn emit(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, content)
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} Wrote {}", "OK".green().bold(), path.display());
        }
        None => print!("{content}"),
    }
    Ok(())
}

fn run_extract(project: &Project, output: Option<PathBuf>) -> Result<i32> {
    // Always a fresh scan: this is what produces the needs document
    let analysis = analyze(project, None)?;
    let doc = project.needs_document(&analysis.graph);

    let path = output.unwrap_or_else(|| project.resolve(&project.config.code_refs));
    emit(&doc.to_json()?, Some(&path))?;
    Ok(EXIT_PASSED)
}

fn run_matrix(
    project: &Project,
    code_refs: Option<&Path>,
    output: Option<PathBuf>,
    no_timestamp: bool,
) -> Result<i32> {
    let analysis = analyze(project, code_refs)?;
    let generated = if no_timestamp { None } else { Some(timestamp()?) };
    let dir = output.unwrap_or_else(|| project.resolve(&project.config.output_dir));

    let files = write_matrix(&dir, &project.name(), &analysis, generated)?;

    eprintln!("{} Traceability matrix generated:", "OK".green().bold());
    eprintln!("   HTML: {}", files.html.display());
    eprintln!("   JSON: {}", files.json.display());
    eprintln!("   CSV: {}", files.csv.display());
    eprintln!("   Gap analysis: {}", files.gap_analysis.display());
    Ok(EXIT_PASSED)
}

fn run_verify(
    project: &Project,
    code_refs: Option<&Path>,
    output: Option<PathBuf>,
    min_coverage: Option<f64>,
    fail_on_critical_gaps: bool,
) -> Result<i32> {
    let analysis = analyze(project, code_refs)?;
    let index = project.source_index()?;
    let catalog = project.patterns()?;
    debug!(files = index.len(), patterns = catalog.len(), "fuzzy matching");

    let report = FuzzyMatcher::new(&catalog, &index).verify(&analysis.graph);
    emit(&render_verification(&report, &analysis.graph), output.as_deref())?;

    let mut code = EXIT_PASSED;
    let rate = report.effective_implementation_rate();
    if let Some(min) = min_coverage
        && rate < min
    {
        eprintln!(
            "{} Effective implementation rate {:.1}% is below {:.1}%",
            "!".red().bold(),
            rate,
            min
        );
        code = EXIT_FAILED;
    }
    if fail_on_critical_gaps {
        let critical: Vec<&str> = report
            .critical_gaps(&project.config.classification)
            .map(|v| v.id.as_str())
            .collect();
        if !critical.is_empty() {
            eprintln!(
                "{} {} requirements have no implementation: {}",
                "!".red().bold(),
                critical.len(),
                critical.join(", ")
            );
            code = EXIT_FAILED;
        }
    }
    Ok(code)
}

fn run_specs(
    project: &Project,
    code_refs: Option<&Path>,
    output: Option<PathBuf>,
    strict: bool,
) -> Result<i32> {
    let analysis = analyze(project, code_refs)?;
    let mapping = SpecMapping::analyze(&analysis.graph, &project.config.classification);
    emit(&render_spec_mapping(&mapping, &analysis.graph), output.as_deref())?;

    if strict && !mapping.is_clean() {
        eprintln!(
            "{} {} invalid spec links, {} requirements missing spec links",
            "!".red().bold(),
            mapping.invalid_links.len(),
            mapping.missing_spec_links.len()
        );
        return Ok(EXIT_FAILED);
    }
    Ok(EXIT_PASSED)
}

/// Requirements of a baseline: a matrix JSON file, or a directory whose
/// `.rst` documents are scanned.
fn load_baseline(path: &Path) -> Result<Vec<Requirement>> {
    if path.is_dir() {
        let extraction = WalkSources::new(path)
            .kinds([FileKind::Directive])
            .extract()?;
        return Ok(extraction.requirements);
    }

    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read baseline: {}", path.display()))?;
    let doc = MatrixDocument::from_json(&content)
        .wrap_err_with(|| format!("Failed to parse baseline: {}", path.display()))?;
    Ok(doc.to_requirements())
}

fn run_diff(
    project: &Project,
    code_refs: Option<&Path>,
    baseline: &Path,
    output: Option<PathBuf>,
) -> Result<i32> {
    let analysis = analyze(project, code_refs)?;
    let baseline = load_baseline(baseline)?;
    let current: Vec<Requirement> = analysis
        .graph
        .requirements
        .iter()
        .map(|r| r.requirement.clone())
        .collect();

    let diff = RequirementDiff::compute(&current, &baseline);
    emit(&render_diff(&diff), output.as_deref())?;
    Ok(EXIT_PASSED)
}

fn run_validate(
    project: &Project,
    code_refs: Option<&Path>,
    strict: bool,
    ci: bool,
) -> Result<i32> {
    if !project.has_requirements_dir() {
        let dir = project.resolve(&project.config.requirements_dir);
        if ci {
            println!("Error: requirements directory not found: {}", dir.display());
            return Ok(EXIT_NO_REQUIREMENTS);
        }
        eprintln!(
            "{} requirements directory not found: {}",
            "!".yellow().bold(),
            dir.display()
        );
    }

    let analysis = analyze(project, code_refs)?;
    if analysis.graph.requirements.is_empty() {
        if ci {
            println!("Error: No requirements found in RST files");
            return Ok(EXIT_NO_REQUIREMENTS);
        }
        eprintln!(
            "{} No requirements found in RST files",
            "!".yellow().bold()
        );
    }

    let validation = Validation::run(&analysis.graph, &project.config.classification);
    print!("{}", render_validation(&validation, &analysis.gaps, strict));
    Ok(validation.exit_code(strict))
}
