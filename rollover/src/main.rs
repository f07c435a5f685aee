use std::{
    collections::{BTreeSet, HashSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rollover::core::{ExtractionOptions, split_note_lines};
use rollover::exclusions::filter_excluded_headings;
use rollover::extract::{extract_todos, remove_empty_todos};
use rollover::sections::{content_between_headings, group_todos_by_heading};

#[derive(Debug, Parser)]
#[command(
    name = "rollover",
    about = "Markdown todo extraction built on the rollover crate",
    version
)]
struct Cli {
    /// Enable verbose logging for debugging.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract unfinished todos from one or more Markdown notes.
    Extract(ExtractArgs),

    /// Print the content between two headings of a note.
    Sections(SectionsArgs),

    /// Extract todos grouped under chosen headings.
    Group(GroupArgs),
}

#[derive(Debug, Args)]
struct ExtractArgs {
    /// Markdown files or directories containing Markdown files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Load extraction options from a JSON file; flags below override it.
    #[arg(long)]
    options: Option<PathBuf>,

    /// Carry each todo's indented children along with it.
    #[arg(long)]
    children: bool,

    /// Status characters that mark a todo as done (grapheme-aware).
    #[arg(long)]
    done_markers: Option<String>,

    /// Characters accepted as list bullets.
    #[arg(long)]
    bullet_symbols: Option<String>,

    /// Also extract headings (other than the first line of a note).
    #[arg(long)]
    subheadings: bool,

    /// Also extract plain non-checkbox bullets.
    #[arg(long)]
    bullets: bool,

    /// Keep only children that are themselves todos, bullets, or headings.
    #[arg(long)]
    filter_children: bool,

    /// Drop completed children together with their subtrees.
    #[arg(long)]
    no_completed_children: bool,

    /// Preserve top-level non-todo lines (headings, prose) in the output.
    #[arg(long)]
    preserve_non_bullets: bool,

    /// Only extract todos under this heading.
    #[arg(long)]
    heading: Option<String>,

    /// Remove everything under this heading before extraction (repeatable).
    #[arg(long = "exclude-heading")]
    exclude_headings: Vec<String>,

    /// Drop bodyless checkboxes from the output.
    #[arg(long)]
    remove_empty: bool,

    /// Emit JSON instead of plain lines.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct SectionsArgs {
    /// Markdown note to slice.
    input: PathBuf,

    /// Heading line the slice starts after (exact line match).
    #[arg(long)]
    from: String,

    /// Heading line the slice ends before (exact line match).
    #[arg(long)]
    until: Option<String>,
}

#[derive(Debug, Args)]
struct GroupArgs {
    /// Markdown note to group.
    input: PathBuf,

    /// Heading line to collect todos under (repeatable, order preserved).
    #[arg(long = "heading", required = true)]
    headings: Vec<String>,

    /// Carry each todo's indented children along with it.
    #[arg(long)]
    children: bool,

    /// Status characters that mark a todo as done (grapheme-aware).
    #[arg(long)]
    done_markers: Option<String>,

    /// Emit JSON instead of plain lines.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    match cli.command {
        Commands::Extract(args) => handle_extract(args, verbose),
        Commands::Sections(args) => handle_sections(args, verbose),
        Commands::Group(args) => handle_group(args, verbose),
    }
}

fn handle_extract(args: ExtractArgs, verbose: bool) -> Result<()> {
    let opts = build_options(&args)?;
    let expanded = expand_inputs(&args.inputs, verbose)?;
    if expanded.is_empty() {
        anyhow::bail!("no Markdown files found in the provided inputs");
    }

    let mut results = Vec::new();
    for path in expanded {
        if verbose {
            eprintln!("Extracting from {:?}", path);
        }
        let text =
            fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
        let lines = split_note_lines(&text);
        let lines = filter_excluded_headings(&lines, &args.exclude_headings);
        let mut todos = extract_todos(&lines, &opts);
        if args.remove_empty {
            todos = remove_empty_todos(&todos);
        }
        results.push((path, todos));
    }

    if args.json {
        #[derive(serde::Serialize)]
        struct JsonOutput<'a> {
            path: String,
            todos: &'a [String],
        }

        let payload: Vec<JsonOutput<'_>> = results
            .iter()
            .map(|(path, todos)| JsonOutput {
                path: path.display().to_string(),
                todos,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for (idx, (path, todos)) in results.iter().enumerate() {
            if results.len() > 1 {
                println!("== {} ==", path.display());
            }
            for line in todos {
                println!("{line}");
            }
            if results.len() > 1 && idx + 1 < results.len() {
                println!();
            }
        }
    }
    Ok(())
}

fn build_options(args: &ExtractArgs) -> Result<ExtractionOptions> {
    let mut opts = match &args.options {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading options file {:?}", path))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing options file {:?}", path))?
        }
        None => ExtractionOptions::default(),
    };

    if args.children {
        opts.with_children = true;
    }
    if let Some(markers) = &args.done_markers {
        opts.done_status_markers = markers.clone();
    }
    if let Some(symbols) = &args.bullet_symbols {
        opts.bullet_symbols = symbols.clone();
    }
    if args.subheadings {
        opts.with_subheadings = true;
    }
    if args.bullets {
        opts.with_bullets = true;
    }
    if args.filter_children {
        opts.filter_children = true;
    }
    if args.no_completed_children {
        opts.with_completed_children = false;
    }
    if args.preserve_non_bullets {
        opts.preserve_non_bullet_points = true;
    }
    if let Some(heading) = &args.heading {
        opts.daily_note_heading = Some(heading.clone());
    }

    opts.validate().context("invalid extraction options")?;
    Ok(opts)
}

fn handle_sections(args: SectionsArgs, verbose: bool) -> Result<()> {
    let SectionsArgs { input, from, until } = args;
    if verbose {
        eprintln!("Slicing {:?}", input);
    }
    let text = fs::read_to_string(&input).with_context(|| format!("reading {:?}", input))?;
    let lines = split_note_lines(&text);
    for line in content_between_headings(&lines, &from, until.as_deref()) {
        println!("{line}");
    }
    Ok(())
}

fn handle_group(args: GroupArgs, verbose: bool) -> Result<()> {
    let GroupArgs {
        input,
        headings,
        children,
        done_markers,
        json,
    } = args;
    if verbose {
        eprintln!("Grouping {:?}", input);
    }

    let mut opts = ExtractionOptions {
        with_children: children,
        ..Default::default()
    };
    if let Some(markers) = done_markers {
        opts.done_status_markers = markers;
    }
    opts.validate().context("invalid extraction options")?;

    let text = fs::read_to_string(&input).with_context(|| format!("reading {:?}", input))?;
    let lines = split_note_lines(&text);
    let grouped = group_todos_by_heading(&lines, &headings, &opts);

    if grouped.is_empty() {
        eprintln!("No chosen headings found in the note.");
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&grouped)?);
    } else {
        for (idx, (heading, todos)) in grouped.iter().enumerate() {
            println!("{heading}");
            for line in todos {
                println!("{line}");
            }
            if idx + 1 < grouped.len() {
                println!();
            }
        }
    }
    Ok(())
}

fn expand_inputs(paths: &[PathBuf], verbose: bool) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut visited = BTreeSet::new();
    for path in paths {
        let canonical =
            fs::canonicalize(path).with_context(|| format!("resolving path {:?}", path))?;
        let meta = fs::metadata(&canonical)
            .with_context(|| format!("reading metadata for {:?}", canonical))?;
        if meta.is_dir() {
            if verbose {
                eprintln!("Scanning directory {:?}", canonical);
            }
            let mut found = Vec::new();
            let mut seen = HashSet::new();
            visit_dir(&canonical, &mut found, &mut seen, verbose)?;
            for file in found {
                if visited.insert(file.clone()) {
                    out.push(file);
                }
            }
        } else if meta.is_file() {
            if canonical
                .extension()
                .map(|ext| ext == "md")
                .unwrap_or(false)
            {
                if verbose {
                    eprintln!("Adding file {:?}", canonical);
                }
                if visited.insert(canonical.clone()) {
                    out.push(canonical);
                }
            } else {
                anyhow::bail!("{:?} is not a .md file", canonical);
            }
        }
    }
    Ok(out)
}

fn visit_dir(
    path: &Path,
    out: &mut Vec<PathBuf>,
    visited: &mut HashSet<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let canonical = fs::canonicalize(path)?;
    if !visited.insert(canonical.clone()) {
        return Ok(());
    }

    let metadata = fs::metadata(&canonical)?;
    if metadata.is_dir() {
        if verbose {
            eprintln!("Visiting directory {:?}", canonical);
        }
        for entry in fs::read_dir(&canonical)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_symlink() {
                continue;
            }
            visit_dir(&entry.path(), out, visited, verbose)?;
        }
    } else if metadata.is_file() {
        if canonical
            .extension()
            .map(|ext| ext == "md")
            .unwrap_or(false)
        {
            if verbose {
                eprintln!("Found Markdown file {:?}", canonical);
            }
            out.push(canonical);
        }
    }
    Ok(())
}
