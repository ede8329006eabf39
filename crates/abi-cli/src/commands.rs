use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use walkdir::WalkDir;

use abi_cache::{ArtifactHistory, CacheConfig, DiffCache, DirectoryHistory, StaticHistory};
use abi_diff::{AbiDiff, ChangeKind};
use abi_jar::{AbiJar, AbiJarWriter};
use abi_node::{ClassNode, ClassNodeReader};
use abi_types::{ArtifactDigest, DependencyDescriptor, FileIdentityHash, PathHash};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => CacheConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => CacheConfig::default(),
    };
    match cli.command {
        Command::Pack(args) => cmd_pack(args),
        Command::Index(args) => cmd_index(args, &cli.format),
        Command::Record(args) => cmd_record(args),
        Command::Diff(args) => cmd_diff(args, &cli.format, config),
    }
}

fn cmd_pack(args: PackArgs) -> anyhow::Result<()> {
    let (count, digest) = pack_directory(&args.dir, &args.output)?;
    println!(
        "{} Packed {} classes into {}",
        "✓".green().bold(),
        count.to_string().bold(),
        args.output.display()
    );
    println!("  Digest: {}", digest.to_hex().yellow());
    Ok(())
}

#[derive(Serialize)]
struct IndexRow {
    path_hash: String,
    offset: u64,
    size: u32,
    digest: String,
}

fn cmd_index(args: IndexArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let jar = AbiJar::open(&args.jar)?;
    let index = jar.read_node_index()?;
    let mut rows: Vec<IndexRow> = index
        .iter()
        .map(|(hash, entry)| IndexRow {
            path_hash: hash.to_string(),
            offset: entry.offset,
            size: entry.size,
            digest: entry.digest.to_hex(),
        })
        .collect();
    rows.sort_by_key(|row| row.offset);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => {
            println!("{} nodes in {}", rows.len().to_string().bold(), jar.path().display());
            for row in &rows {
                println!(
                    "  {}  {:>10}  {:>8}  {}",
                    row.path_hash.yellow(),
                    row.offset,
                    row.size,
                    row.digest.dimmed()
                );
            }
        }
    }
    Ok(())
}

fn cmd_record(args: RecordArgs) -> anyhow::Result<()> {
    let history = DirectoryHistory::open(&args.history)?;
    let digest = history.record(&args.jar)?;
    println!("{} Recorded {}", "✓".green().bold(), args.jar.display());
    println!("  Digest: {}", digest.to_hex().yellow());
    Ok(())
}

fn cmd_diff(args: DiffArgs, format: &OutputFormat, config: CacheConfig) -> anyhow::Result<()> {
    let identity = file_identity(&args.new);
    let diff = match (&args.old, &args.history, &args.old_digest) {
        (Some(old), _, _) => {
            let digest = ArtifactDigest::of_file(old)?;
            let descriptor = DependencyDescriptor::incremental(&args.new, digest, identity);
            compute_diff(StaticHistory::new().with(digest, old), config, &descriptor)?
        }
        (None, Some(history), Some(hex)) => {
            let digest = ArtifactDigest::from_hex(hex)?;
            let descriptor = DependencyDescriptor::incremental(&args.new, digest, identity);
            compute_diff(DirectoryHistory::open(history)?, config, &descriptor)?
        }
        _ => {
            let descriptor = DependencyDescriptor::first_build(&args.new, identity);
            compute_diff(StaticHistory::new(), config, &descriptor)?
        }
    };

    let rows = change_rows(&diff);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("No ABI changes ({} classes unchanged).", diff.unchanged);
                return Ok(());
            }
            for row in &rows {
                let marker = match row.kind {
                    ChangeKind::Added => "+".green().bold(),
                    ChangeKind::Changed => "~".yellow().bold(),
                    ChangeKind::Deleted => "-".red().bold(),
                };
                println!("{} {}", marker, row.class);
            }
            let stats = diff.stats();
            println!(
                "\n{} added, {} changed, {} deleted, {} unchanged",
                stats.added.to_string().green(),
                stats.changed.to_string().yellow(),
                stats.deleted.to_string().red(),
                stats.unchanged
            );
        }
    }
    Ok(())
}

/// Identity of an artifact across builds: its path, not its content.
fn file_identity(path: &Path) -> FileIdentityHash {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    FileIdentityHash::new(PathHash::of(&canonical.to_string_lossy()).as_u64())
}

fn compute_diff(
    history: impl ArtifactHistory + 'static,
    config: CacheConfig,
    descriptor: &DependencyDescriptor,
) -> anyhow::Result<Arc<AbiDiff<ClassNode>>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let cache = DiffCache::new(ClassNodeReader, history, config, runtime.handle().clone())?;
    let result = runtime.block_on(cache.get(descriptor));
    cache.shutdown();
    result.with_context(|| format!("diffing {}", descriptor.file.display()))
}

/// Write every `*.json` class node under `dir` into an artifact at `output`.
///
/// Entries are named after their path relative to `dir`, with `.json`
/// replaced by `.class`.
pub(crate) fn pack_directory(dir: &Path, output: &Path) -> anyhow::Result<(usize, ArtifactDigest)> {
    let mut writer = AbiJarWriter::new();
    let mut count = 0;
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        if !entry.file_type().is_file() || !is_json {
            continue;
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut node: ClassNode = serde_json::from_str(&content)
            .with_context(|| format!("parsing class node {}", path.display()))?;
        node.normalize();
        writer.add_node(&inner_path(dir, path)?, &node)?;
        count += 1;
    }
    let digest = writer.finish(output)?;
    Ok((count, digest))
}

fn inner_path(root: &Path, file: &Path) -> anyhow::Result<String> {
    let relative: PathBuf = file.strip_prefix(root)?.with_extension("class");
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

#[derive(Debug, Serialize)]
pub(crate) struct ChangeRow {
    pub kind: ChangeKind,
    pub class: String,
    pub path_hash: String,
}

/// Flatten a diff into rows sorted by class name.
pub(crate) fn change_rows(diff: &AbiDiff<ClassNode>) -> Vec<ChangeRow> {
    let mut rows: Vec<ChangeRow> = diff
        .items()
        .filter_map(|item| {
            let node = item.new_node().or(item.old_node())?;
            Some(ChangeRow {
                kind: item.kind(),
                class: node.display_name(),
                path_hash: item.source().path_hash.to_string(),
            })
        })
        .collect();
    rows.sort_by(|a, b| a.class.cmp(&b.class));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_class(root: &Path, rel: &str, json: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, json).unwrap();
    }

    #[test]
    fn pack_names_entries_after_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("classes");
        write_class(
            &classes,
            "com/example/Foo.json",
            r#"{"name": "com/example/Foo", "access": 1, "superclass": null}"#,
        );
        write_class(&classes, "com/example/notes.txt", "ignored");
        let out = dir.path().join("lib.abijar");

        let (count, digest) = pack_directory(&classes, &out).unwrap();
        assert_eq!(count, 1);
        assert_eq!(ArtifactDigest::of_file(&out).unwrap(), digest);

        let jar = AbiJar::open(&out).unwrap();
        assert!(jar.contains("com/example/Foo.class"));
        let index = jar.read_node_index().unwrap();
        assert!(index.contains(&PathHash::of("com/example/Foo.class")));
    }

    #[test]
    fn pack_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        write_class(dir.path(), "Bad.json", "{ not json");
        let err = pack_directory(dir.path(), &dir.path().join("out.abijar")).unwrap_err();
        assert!(err.to_string().contains("Bad.json"));
    }

    #[test]
    fn diff_of_packed_directories() {
        let dir = tempfile::tempdir().unwrap();
        let v1 = dir.path().join("v1");
        let v2 = dir.path().join("v2");
        write_class(&v1, "a/Kept.json", r#"{"name": "a/Kept", "access": 1}"#);
        write_class(&v1, "a/Gone.json", r#"{"name": "a/Gone", "access": 1}"#);
        write_class(&v2, "a/Kept.json", r#"{"name": "a/Kept", "access": 1}"#);
        write_class(&v2, "a/Fresh.json", r#"{"name": "a/Fresh", "access": 1}"#);
        let old = dir.path().join("old.abijar");
        let new = dir.path().join("new.abijar");
        let (_, old_digest) = pack_directory(&v1, &old).unwrap();
        pack_directory(&v2, &new).unwrap();

        let descriptor =
            DependencyDescriptor::incremental(&new, old_digest, file_identity(&new));
        let diff = compute_diff(
            StaticHistory::new().with(old_digest, &old),
            CacheConfig::default(),
            &descriptor,
        )
        .unwrap();

        let rows = change_rows(&diff);
        let summary: Vec<_> = rows.iter().map(|r| (r.class.as_str(), r.kind)).collect();
        assert_eq!(
            summary,
            vec![("a.Fresh", ChangeKind::Added), ("a.Gone", ChangeKind::Deleted)]
        );
        assert_eq!(diff.unchanged, 1);
    }

    #[test]
    fn file_identity_is_stable_for_a_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.abijar");
        std::fs::write(&path, b"v1").unwrap();
        let first = file_identity(&path);
        std::fs::write(&path, b"v2").unwrap();
        assert_eq!(file_identity(&path), first);
        assert_ne!(file_identity(&dir.path().join("other.abijar")), first);
    }
}
