use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use opgraph_archive::read_replacements_file;
use opgraph_import::{ImportConfig, ImportRequest, Importer, ProjectLocks, ValidationReport};
use opgraph_model::ProjectConfiguration;
use opgraph_store::{FsBlobStore, InMemoryBlobStore};
use opgraph_types::{EntityId, EntityKind, ImportToken, ProjectId};
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Init(args) => cmd_init(args, format),
        Command::Validate(args) => cmd_validate(args, format),
        Command::Import(args) => cmd_import(args, format),
        Command::Check(args) => cmd_check(args, format),
        Command::Show(args) => cmd_show(args, format),
    }
}

// ---------------------------------------------------------------------------
// Snapshot and request helpers
// ---------------------------------------------------------------------------

fn load_project(path: &Path) -> anyhow::Result<ProjectConfiguration> {
    let data = fs::read(path).with_context(|| format!("reading project {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parsing project {}", path.display()))
}

fn save_project(path: &Path, config: &ProjectConfiguration) -> anyhow::Result<()> {
    let data = serde_json::to_vec_pretty(config)?;
    fs::write(path, data).with_context(|| format!("writing project {}", path.display()))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ImportConfig> {
    match path {
        Some(path) => ImportConfig::load(path).with_context(|| format!("loading config {}", path.display())),
        None => Ok(ImportConfig::default()),
    }
}

fn build_request(source: &SourceArgs, token: Option<&str>) -> anyhow::Result<ImportRequest> {
    let mut request = ImportRequest::new(&source.archive);
    if let Some(path) = &source.replacements {
        request = request.with_replacements(read_replacements_file(path)?);
    }
    if let Some(token) = token {
        request = request.with_token(ImportToken::new(token)?);
    }
    Ok(request)
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_init(args: InitArgs, format: OutputFormat) -> anyhow::Result<()> {
    if args.project.exists() {
        bail!("{} already exists", args.project.display());
    }
    let id = match &args.id {
        Some(raw) => raw.parse::<ProjectId>()?,
        None => ProjectId::new(),
    };
    save_project(&args.project, &ProjectConfiguration::new(id))?;
    match format {
        OutputFormat::Json => print_json(&json!({ "project": id, "path": args.project })),
        OutputFormat::Text => {
            println!("{} Initialized project {}", "✓".green().bold(), id.to_string().cyan());
            println!("  Snapshot: {}", args.project.display().to_string().bold());
            Ok(())
        }
    }
}

fn cmd_validate(args: ValidateArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_project(&args.project)?;
    let importer = Importer::with_default_mergers(load_config(args.source.config.as_deref())?);
    let request = build_request(&args.source, None)?;
    // Validation never touches blobs.
    let report = importer.validate(&config, &request, &InMemoryBlobStore::new())?;

    match format {
        OutputFormat::Json => print_json(&validation_json(&report))?,
        OutputFormat::Text => print_validation(&report),
    }
    if !report.is_clean() {
        bail!("{} issue(s) found", report.issue_count());
    }
    Ok(())
}

fn validation_json(report: &ValidationReport) -> serde_json::Value {
    let kinds: Vec<_> = report
        .validations
        .iter()
        .map(|v| {
            json!({
                "kind": v.kind,
                "affected": v.affected,
                "issues": v.issues.iter().map(ToString::to_string).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({ "clean": report.is_clean(), "kinds": kinds })
}

fn print_validation(report: &ValidationReport) {
    for v in &report.validations {
        let mark = if v.is_clean() { "✓".green() } else { "✗".red() };
        println!("{mark} {}: {} affected", v.kind.to_string().bold(), v.affected.len());
        for issue in &v.issues {
            println!("    {}", issue.to_string().red());
        }
    }
}

fn cmd_import(args: ImportArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut config = load_project(&args.project)?;
    let importer = Importer::with_default_mergers(load_config(args.source.config.as_deref())?);
    let request = build_request(&args.source, args.token.as_deref())?;
    let blobs = FsBlobStore::open(&args.blobs)?;
    let locks = ProjectLocks::new();

    let report = importer.import_locked(&locks, &mut config, &request, &blobs)?;
    let output = args.output.as_deref().unwrap_or(args.project.as_path());
    save_project(output, &config)?;

    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            println!("{} Imported {}", "✓".green().bold(), args.source.archive.display().to_string().bold());
            print!("{report}");
            println!("  Snapshot: {}", output.display());
            Ok(())
        }
    }
}

fn cmd_check(args: ProjectArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_project(&args.project)?;
    let violations = config.check_invariants();
    match format {
        OutputFormat::Json => print_json(&violations)?,
        OutputFormat::Text if violations.is_empty() => {
            println!("{} {} entities, no violations", "✓".green().bold(), config.entity_count());
        }
        OutputFormat::Text => {
            for v in &violations {
                println!("{} {v}", "✗".red());
            }
        }
    }
    if !violations.is_empty() {
        bail!("{} violation(s)", violations.len());
    }
    Ok(())
}

fn cmd_show(args: ProjectArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_project(&args.project)?;
    if format == OutputFormat::Json {
        return print_json(&config);
    }

    println!("Project {}", config.project().to_string().cyan());
    println!("{}", "Directories".bold());
    for dir in config.child_directories(None) {
        print_directory(&config, dir.id, 1);
    }
    for file in config.files_in(None) {
        println!("  {}", file.name);
    }
    println!("{}", "Sections".bold());
    for section in config.child_sections(None) {
        print_section(&config, section.id, 1);
    }
    for kind in EntityKind::MERGE_ORDER.into_iter().filter(EntityKind::is_singleton) {
        if config.singleton(kind)?.is_some() {
            println!("{} {}", kind.to_string().bold(), "set".green());
        }
    }
    Ok(())
}

fn print_directory(config: &ProjectConfiguration, id: EntityId, depth: usize) {
    let indent = "  ".repeat(depth);
    let Some(dir) = config.directory(id) else {
        return;
    };
    println!("{indent}{}/", dir.name.blue().bold());
    for child in config.child_directories(Some(id)) {
        print_directory(config, child.id, depth + 1);
    }
    for file in config.files_in(Some(id)) {
        let size = file.content.as_ref().map(|c| c.size).unwrap_or(0);
        println!("{indent}  {} {}", file.name, format!("({size} B)").dimmed());
    }
}

fn print_section(config: &ProjectConfiguration, id: EntityId, depth: usize) {
    let indent = "  ".repeat(depth);
    let Some(section) = config.section(id) else {
        return;
    };
    println!("{indent}{} {}", section.name.yellow(), format!("#{}", section.place).dimmed());
    for compound in &section.compounds {
        let name = config.name_of(EntityKind::Compound, *compound).unwrap_or("?");
        println!("{indent}  compound {}", name.cyan());
    }
    for process in &section.processes {
        let name = config.name_of(EntityKind::Process, *process).unwrap_or("?");
        println!("{indent}  process {}", name.green());
    }
    for child in config.child_sections(Some(id)) {
        print_section(config, child.id, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opgraph_archive::{DirectoryWire, FileWire};
    use std::path::PathBuf;

    fn write_json(path: PathBuf, value: &impl serde::Serialize) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_vec(value).unwrap()).unwrap();
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("p.json");
        let args = || InitArgs {
            project: project.clone(),
            id: Some("00000000-0000-0000-0000-0000000000aa".into()),
        };
        cmd_init(args(), OutputFormat::Json).unwrap();
        assert!(cmd_init(args(), OutputFormat::Json).is_err());

        let config = load_project(&project).unwrap();
        assert_eq!(config.project(), ProjectId::from_u128(0xaa));
    }

    #[test]
    fn import_writes_snapshot_and_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("p.json");
        let archive = dir.path().join("archive");
        let blobs = dir.path().join("blobs");
        let docs = EntityId::from_u128(1);
        let readme = EntityId::from_u128(2);

        write_json(
            archive.join("directories").join(format!("{docs}.json")),
            &DirectoryWire {
                id: docs,
                name: "docs".into(),
                parent_directory: None,
            },
        );
        write_json(
            archive.join("files").join(format!("{readme}.json")),
            &FileWire {
                id: readme,
                name: "README".into(),
                directory: Some(docs),
                last_update: None,
                last_update_by: None,
            },
        );
        let payload = archive.join("files/content").join(readme.to_string()).join("README");
        fs::create_dir_all(payload.parent().unwrap()).unwrap();
        fs::write(&payload, b"read me").unwrap();

        cmd_init(
            InitArgs {
                project: project.clone(),
                id: None,
            },
            OutputFormat::Json,
        )
        .unwrap();
        cmd_import(
            ImportArgs {
                project: project.clone(),
                source: SourceArgs {
                    archive,
                    replacements: None,
                    config: None,
                },
                blobs: blobs.clone(),
                token: Some("T1".into()),
                output: None,
            },
            OutputFormat::Json,
        )
        .unwrap();

        let config = load_project(&project).unwrap();
        assert_eq!(config.file_path(readme).unwrap(), "docs/README");
        let stored = blobs.join(config.project().to_string()).join("docs/README");
        assert_eq!(fs::read(stored).unwrap(), b"read me");
        cmd_check(ProjectArgs { project }, OutputFormat::Text).unwrap();
    }

    #[test]
    fn validate_fails_on_issues() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("p.json");
        let archive = dir.path().join("archive");
        let orphan = EntityId::from_u128(3);
        write_json(
            archive.join("directories").join(format!("{orphan}.json")),
            &DirectoryWire {
                id: orphan,
                name: "orphan".into(),
                parent_directory: Some(EntityId::from_u128(99)),
            },
        );
        save_project(&project, &ProjectConfiguration::new(ProjectId::new())).unwrap();

        let err = cmd_validate(
            ValidateArgs {
                project,
                source: SourceArgs {
                    archive,
                    replacements: None,
                    config: None,
                },
            },
            OutputFormat::Text,
        )
        .unwrap_err();
        assert!(err.to_string().contains("1 issue"));
    }
}
