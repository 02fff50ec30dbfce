//! pack command - Build a registry from a directory tree of programs

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context as _, Result};

use super::Context;
use crate::core::types::{ProgramBinary, ProgramFormat, ProgramIdentifier};
use crate::registry::BinaryRegistryWriter;
use crate::ui::output;

/// Pack every program under `src` into a registry at `dst`.
pub fn pack(ctx: &Context, src: &Path, dst: &Path, json: bool) -> Result<()> {
    if !src.is_dir() {
        bail!("Source {} is not a directory", src.display());
    }

    let mut files = Vec::new();
    collect_files(src, &mut files)
        .with_context(|| format!("Failed to scan {}", src.display()))?;
    if files.is_empty() {
        output::warn(
            format!("no programs found under {}", src.display()),
            ctx.verbosity,
        );
    }

    let programs = name_programs(src, &files)?;

    let mut writer = BinaryRegistryWriter::with_config(dst, &ctx.config);
    for (id, format, file) in programs {
        let bytes =
            fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
        let slot = writer
            .store_program(&id, &ProgramBinary::new(format, bytes))
            .with_context(|| format!("Failed to store {}", id))?;
        output::debug(format!("{} -> {}", id, slot), ctx.verbosity);
    }

    let summary = writer
        .write_index()
        .with_context(|| format!("Failed to publish registry to {}", dst.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        output::success(
            format!(
                "Packed {} programs ({} distinct binaries) into {}",
                summary.identifiers,
                summary.binaries,
                dst.display()
            ),
            ctx.verbosity,
        );
    }
    Ok(())
}

/// Identifier and format for `file` found under `src`.
///
/// `<src>/a/b/name.ext` becomes `("a.b", "name")`. `.spv` files are SPIR-V,
/// anything else is raw.
pub fn identifier_for(src: &Path, file: &Path) -> Result<(ProgramIdentifier, ProgramFormat)> {
    let rel = file
        .strip_prefix(src)
        .with_context(|| format!("{} is not under {}", file.display(), src.display()))?;

    let name = rel
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("File name of {} is not valid UTF-8", file.display()))?;

    let dirs = rel
        .parent()
        .map(|parent| {
            parent
                .components()
                .map(|c| c.as_os_str().to_str())
                .collect::<Option<Vec<_>>>()
        })
        .unwrap_or(Some(Vec::new()))
        .ok_or_else(|| anyhow!("Directory of {} is not valid UTF-8", file.display()))?;

    let format = match rel.extension().and_then(|e| e.to_str()) {
        Some("spv") => ProgramFormat::Spirv,
        _ => ProgramFormat::Raw,
    };

    let id = ProgramIdentifier::new(dirs.join("."), name)
        .with_context(|| format!("Cannot name program {}", file.display()))?;
    Ok((id, format))
}

/// Identifier and format for each of `files`.
///
/// Fails if two files map to the same identifier, e.g. `x.spv` next to
/// `x.bin`, or `a.b/x.spv` and `a/b/x.spv`.
fn name_programs<'a>(
    src: &Path,
    files: &'a [PathBuf],
) -> Result<Vec<(ProgramIdentifier, ProgramFormat, &'a Path)>> {
    let mut seen: HashMap<ProgramIdentifier, &Path> = HashMap::new();
    let mut programs = Vec::with_capacity(files.len());
    for file in files {
        let (id, format) = identifier_for(src, file)?;
        if let Some(first) = seen.insert(id.clone(), file.as_path()) {
            bail!(
                "{} and {} both map to program {}",
                first.display(),
                file.display(),
                id
            );
        }
        programs.push((id, format, file.as_path()));
    }
    Ok(programs)
}

/// Regular files under `dir`, depth first in name order. Hidden entries are
/// skipped.
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), out)?;
        } else if file_type.is_file() {
            out.push(entry.path());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn nested_spirv_file() {
        let (id, format) = identifier_for(
            Path::new("/src"),
            Path::new("/src/dEQP-VK/api/smoke/triangle/vert.spv"),
        )
        .unwrap();
        assert_eq!(id.test_case_path(), "dEQP-VK.api.smoke.triangle");
        assert_eq!(id.program_name(), "vert");
        assert_eq!(format, ProgramFormat::Spirv);
    }

    #[test]
    fn top_level_raw_file() {
        let (id, format) =
            identifier_for(Path::new("/src"), Path::new("/src/blob.bin")).unwrap();
        assert_eq!(id.test_case_path(), "");
        assert_eq!(id.program_name(), "blob");
        assert_eq!(format, ProgramFormat::Raw);
    }

    #[test]
    fn distinct_files_are_named() {
        let src = Path::new("/src");
        let files = vec![PathBuf::from("/src/a/x.spv"), PathBuf::from("/src/a/y.bin")];
        let programs = name_programs(src, &files).unwrap();
        assert_eq!(programs.len(), 2);
        assert_eq!(programs[1].0.program_name(), "y");
        assert_eq!(programs[1].1, ProgramFormat::Raw);
        assert_eq!(programs[1].2, Path::new("/src/a/y.bin"));
    }

    #[test]
    fn same_stem_different_extension_is_rejected() {
        let files = vec![PathBuf::from("/src/t/x.bin"), PathBuf::from("/src/t/x.spv")];
        let err = name_programs(Path::new("/src"), &files).unwrap_err().to_string();
        assert!(err.contains("/src/t/x.bin"), "{}", err);
        assert!(err.contains("/src/t/x.spv"), "{}", err);
    }

    #[test]
    fn dotted_directory_collides_with_nested() {
        let files = vec![PathBuf::from("/src/a.b/x.spv"), PathBuf::from("/src/a/b/x.spv")];
        let err = name_programs(Path::new("/src"), &files).unwrap_err().to_string();
        assert!(err.contains("both map to program"), "{}", err);
    }

    #[test]
    fn collect_skips_hidden_and_sorts() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("b")).unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        fs::write(temp.path().join("b/z.spv"), b"z").unwrap();
        fs::write(temp.path().join("a.spv"), b"a").unwrap();
        fs::write(temp.path().join(".hidden"), b"h").unwrap();
        fs::write(temp.path().join(".git/x"), b"x").unwrap();

        let mut files = Vec::new();
        collect_files(temp.path(), &mut files).unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(temp.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(rel, vec![PathBuf::from("a.spv"), PathBuf::from("b/z.spv")]);
    }
}
