#![allow(dead_code)]

use std::{
    collections::HashSet,
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::Result;
use lib_famflow::{
    config::PipelineConfig,
    error::Error,
    tool::{ToolInvocation, ToolRunner},
};

pub const NEWICK: &str = "(AMP1:0.1,(AMP2:0.2,AMP3:0.3):0.05);\n";
pub const ALPHABET: &str = r#"["A", "C", "D", "E"]"#;
pub const COLOR_MAP: &str = r##"{"A": "#ff0000", "C": "#00aa00", "D": "blue"}"##;
pub const HEIGHTS: &str = "max expected height = 4.32\nResidue heights\n1: 0.5 0.0 0.25 0.0\n2: 1.0 0.5 0.0 0.0\n";

/// A configuration rooted in `directory`, with a gzip archive holding the given family sizes and logo resources.
pub fn prepare_analysis(directory: &Path, families: &[(&str, usize)]) -> Result<PipelineConfig> {
    let config = PipelineConfig {
        analysis_dir: directory.join("analysis"),
        data_dir: directory.join("data"),
        threads: 2,
        ..Default::default()
    };
    std::fs::create_dir_all(&config.analysis_dir)?;
    std::fs::create_dir_all(&config.data_dir)?;

    write_gzip(&config.archive_path(), &archive(families))?;
    write_xz(&config.alphabet_path(), ALPHABET)?;
    write_gzip(&config.color_map_path(), COLOR_MAP)?;
    Ok(config)
}

/// A FASTA archive with accessions numbered across all families.
pub fn archive(families: &[(&str, usize)]) -> String {
    let mut archive = String::new();
    let mut accession = 0;
    for (family, size) in families {
        for _ in 0..*size {
            accession += 1;
            archive.push_str(&format!(
                ">AMP10.000_{accession:03} Some peptide | {family}\nKKLLKWLLKLLKKLL\n"
            ));
        }
    }
    archive
}

pub fn write_gzip(path: &Path, content: &str) -> Result<()> {
    let mut encoder = flate2::write::GzEncoder::new(File::create(path)?, flate2::Compression::default());
    encoder.write_all(content.as_bytes())?;
    encoder.finish()?;
    Ok(())
}

pub fn write_xz(path: &Path, content: &str) -> Result<()> {
    let mut encoder = xz2::write::XzEncoder::new(File::create(path)?, 6);
    encoder.write_all(content.as_bytes())?;
    encoder.finish()?;
    Ok(())
}

/// Stands in for the external tools without spawning processes.
#[derive(Default)]
pub struct MockRunner {
    pub missing: HashSet<String>,
    /// `(tool, family)` pairs that fail.
    pub failing: HashSet<(String, String)>,
    pub invocations: Mutex<Vec<ToolInvocation>>,
}

impl MockRunner {
    pub fn without(program: &str) -> Self {
        Self {
            missing: [program.to_string()].into(),
            ..Default::default()
        }
    }

    pub fn failing(tool: &str, family: &str) -> Self {
        Self {
            failing: [(tool.to_string(), family.to_string())].into(),
            ..Default::default()
        }
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    fn record(&self, invocation: &ToolInvocation) -> lib_famflow::error::Result<()> {
        self.invocations.lock().unwrap().push(invocation.clone());
        if self
            .failing
            .contains(&(invocation.tool.clone(), invocation.family.clone()))
        {
            Err(Error::ToolExecutionFailed {
                family: invocation.family.clone(),
                tool: invocation.tool.clone(),
                status: Some(1),
                detail: "mock failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl ToolRunner for MockRunner {
    fn locate(&self, program: &str) -> lib_famflow::error::Result<PathBuf> {
        if self.missing.contains(program) {
            Err(Error::ToolNotFound {
                tool: program.to_string(),
            })
        } else {
            Ok(Path::new("/mock/bin").join(program))
        }
    }

    fn run(&self, invocation: &ToolInvocation, expected_output: &Path) -> lib_famflow::error::Result<()> {
        self.record(invocation)?;
        let content = match invocation.tool.as_str() {
            "FastTree" => NEWICK.to_string(),
            tool => format!("{tool} output for {}\n", invocation.family),
        };
        std::fs::write(expected_output, content).unwrap();
        Ok(())
    }

    fn capture(&self, invocation: &ToolInvocation) -> lib_famflow::error::Result<String> {
        self.record(invocation)?;
        Ok(HEIGHTS.to_string())
    }
}

/// Shell scripts imitating the external tools, written once per test binary.
#[cfg(unix)]
pub fn fake_tools() -> &'static Path {
    use std::{os::unix::fs::PermissionsExt, sync::OnceLock};

    static TOOLS: OnceLock<tempfile::TempDir> = OnceLock::new();
    TOOLS
        .get_or_init(|| {
            let directory = tempfile::tempdir().unwrap();
            let scripts = [
                (
                    "muscle",
                    "while [ $# -gt 0 ]; do\n  case \"$1\" in\n    -in) input=\"$2\"; shift ;;\n    -out) output=\"$2\"; shift ;;\n  esac\n  shift\ndone\ncp \"$input\" \"$output\"\n".to_string(),
                ),
                (
                    "FastTree",
                    format!(
                        "while [ $# -gt 0 ]; do\n  case \"$1\" in\n    -out) output=\"$2\"; shift ;;\n  esac\n  shift\ndone\nprintf '%s\\n' '{}' > \"$output\"\n",
                        NEWICK.trim()
                    ),
                ),
                (
                    "hmmbuild",
                    "printf 'HMMER3/f\\nNAME  %s\\n//\\n' \"$3\" > \"$4\"\n".to_string(),
                ),
                (
                    "hmmlogo",
                    format!("printf '{}'\n", HEIGHTS.replace('\n', "\\n")),
                ),
                ("slow", "exec sleep 10\n".to_string()),
                ("broken", "echo 'broken input' >&2\nexit 2\n".to_string()),
            ];

            for (name, body) in scripts {
                let path = directory.path().join(name);
                std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            }
            directory
        })
        .path()
}

/// Points every tool of the configuration at the fake tools.
#[cfg(unix)]
pub fn use_fake_tools(config: &mut PipelineConfig) {
    let tool = |name: &str| fake_tools().join(name).to_string_lossy().into_owned();
    config.alignment.program = tool("muscle");
    config.tree.program = tool("FastTree");
    config.profile.program = tool("hmmbuild");
    config.logo.program = tool("hmmlogo");
}

/// All files below `directory` with their contents, sorted by path.
pub fn snapshot(directory: &Path) -> Result<Vec<(PathBuf, Vec<u8>)>> {
    let mut files = Vec::new();
    let mut pending = vec![directory.to_path_buf()];
    while let Some(directory) = pending.pop() {
        for entry in std::fs::read_dir(directory)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push((path.clone(), std::fs::read(&path)?));
            }
        }
    }
    files.sort();
    Ok(files)
}
