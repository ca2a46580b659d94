use std::{
    ffi::OsString,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{
    config::PipelineConfig,
    error::{Error, Result},
    store::{ArtifactKind, ArtifactStore},
    tool::{ToolInvocation, ToolRunner},
};

use super::{
    Stage, StageKind, WorkItem, build_stage,
    logo::load_logo_style,
    tree::{RateModel, SubstitutionModel, TreeModel},
};

/// Records invocations and fakes the outputs of the tools.
#[derive(Default)]
struct RecordingRunner {
    invocations: Mutex<Vec<ToolInvocation>>,
    captured_output: String,
}

impl ToolRunner for RecordingRunner {
    fn locate(&self, program: &str) -> Result<PathBuf> {
        Ok(Path::new("/opt/bin").join(program))
    }

    fn run(&self, invocation: &ToolInvocation, expected_output: &Path) -> Result<()> {
        self.invocations.lock().unwrap().push(invocation.clone());
        std::fs::write(expected_output, "output").unwrap();
        Ok(())
    }

    fn capture(&self, invocation: &ToolInvocation) -> Result<String> {
        self.invocations.lock().unwrap().push(invocation.clone());
        Ok(self.captured_output.clone())
    }
}

impl RecordingRunner {
    fn last_args(&self) -> Vec<OsString> {
        self.invocations.lock().unwrap().last().unwrap().args.clone()
    }
}

fn store_with(artifacts: &[(&str, ArtifactKind, &str)]) -> (tempfile::TempDir, ArtifactStore) {
    let directory = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(directory.path());
    store.ensure_layout().unwrap();
    for (family, kind, content) in artifacts {
        std::fs::write(store.path(family, *kind), content).unwrap();
    }
    (directory, store)
}

fn prepared_stage(kind: StageKind, config: &PipelineConfig, tools: &dyn ToolRunner) -> Box<dyn Stage> {
    let mut stage = build_stage(kind, config).unwrap().unwrap();
    stage.prepare(tools).unwrap();
    assert_eq!(stage.kind(), kind);
    stage
}

fn args(values: &[&dyn AsRef<std::ffi::OsStr>]) -> Vec<OsString> {
    values.iter().map(|value| value.as_ref().to_os_string()).collect()
}

#[test]
fn stage_order_matches_artifacts() {
    let outputs: Vec<_> = StageKind::ALL.iter().map(StageKind::output).collect();
    assert_eq!(outputs, ArtifactKind::ALL);
    assert_eq!(StageKind::ProfileBuilding.input(), Some(ArtifactKind::Alignment));
    assert_eq!(StageKind::Fasta.input(), None);
    assert_eq!(StageKind::TreeInference.to_string(), "tree-inference");
}

#[test]
fn work_item_requires_input() {
    let (_directory, store) = store_with(&[("F1", ArtifactKind::Fasta, ">A\nMKV\n")]);

    match WorkItem::prepare(&store, "F1", StageKind::TreeInference) {
        Err(Error::InputMissing { family, kind, .. }) => {
            assert_eq!(family, "F1");
            assert_eq!(kind, ArtifactKind::Alignment);
        }
        other => panic!("unexpected result {other:?}"),
    }

    let item = WorkItem::prepare(&store, "F1", StageKind::Alignment).unwrap();
    assert_eq!(item.input, store.path("F1", ArtifactKind::Fasta));
    assert_eq!(item.output, store.path("F1", ArtifactKind::Alignment));
    assert_eq!(item.staging, store.staging_path("F1", ArtifactKind::Alignment));
}

#[test]
fn work_item_requires_predecessor() {
    let (_directory, store) = store_with(&[
        ("F1", ArtifactKind::Fasta, ">A\nMKV\n"),
        ("F1", ArtifactKind::Alignment, ">A\nMKV\n"),
    ]);

    assert!(matches!(
        WorkItem::prepare(&store, "F1", StageKind::ProfileBuilding),
        Err(Error::InputMissing { kind: ArtifactKind::TreeAscii, .. })
    ));
    assert!(matches!(
        WorkItem::prepare(&store, "F1", StageKind::Fasta),
        Err(Error::Config(_))
    ));
}

#[test]
fn work_item_commit() {
    let (_directory, store) = store_with(&[("F1", ArtifactKind::Fasta, ">A\nMKV\n")]);
    let item = WorkItem::prepare(&store, "F1", StageKind::Alignment).unwrap();

    std::fs::write(&item.staging, ">A\nMKV\n").unwrap();
    item.commit().unwrap();
    assert!(store.is_complete("F1", ArtifactKind::Alignment));
    assert!(!item.staging.exists());

    std::fs::write(&item.staging, ">A\n").unwrap();
    item.discard();
    assert!(!item.staging.exists());
}

#[test]
fn alignment_arguments() {
    let (_directory, store) = store_with(&[("F1", ArtifactKind::Fasta, ">A\nMKV\n")]);
    let tools = RecordingRunner::default();
    let stage = prepared_stage(StageKind::Alignment, &PipelineConfig::default(), &tools);

    let item = WorkItem::prepare(&store, "F1", StageKind::Alignment).unwrap();
    stage.run(&item, &tools).unwrap();

    let invocation = tools.invocations.lock().unwrap()[0].clone();
    assert_eq!(invocation.program, Path::new("/opt/bin/muscle"));
    assert_eq!(invocation.family, "F1");
    assert_eq!(
        invocation.args,
        args(&[&"-in", &item.input, &"-out", &item.staging, &"-maxiters", &"1", &"-diags"])
    );

    let mut config = PipelineConfig::default();
    config.alignment.diags = false;
    config.alignment.max_iterations = 2;
    let stage = prepared_stage(StageKind::Alignment, &config, &tools);
    stage.run(&item, &tools).unwrap();
    assert_eq!(
        tools.last_args(),
        args(&[&"-in", &item.input, &"-out", &item.staging, &"-maxiters", &"2"])
    );
}

#[test]
fn tree_models() {
    let model: TreeModel = "WAG+CAT".parse().unwrap();
    assert_eq!(model.substitution, SubstitutionModel::Wag);
    assert_eq!(model.rate, RateModel::Cat);
    assert_eq!(model.arguments(), ["-wag"]);

    let model: TreeModel = "lg+gamma".parse().unwrap();
    assert_eq!(model.arguments(), ["-lg", "-gamma"]);
    assert_eq!(model.to_string(), "LG+GAMMA");

    let model: TreeModel = "JTT".parse().unwrap();
    assert!(model.arguments().is_empty());

    assert!(matches!("WAG+".parse::<TreeModel>(), Err(Error::Config(_))));
    assert!(matches!("DAYHOFF".parse::<TreeModel>(), Err(Error::Config(_))));
}

#[test]
fn tree_inference_arguments() {
    let (_directory, store) = store_with(&[
        ("F1", ArtifactKind::Fasta, ">A\nMKV\n"),
        ("F1", ArtifactKind::Alignment, ">A\nMKV\n"),
    ]);
    let tools = RecordingRunner::default();
    let stage = prepared_stage(StageKind::TreeInference, &PipelineConfig::default(), &tools);

    let item = WorkItem::prepare(&store, "F1", StageKind::TreeInference).unwrap();
    stage.run(&item, &tools).unwrap();
    assert_eq!(
        tools.last_args(),
        args(&[&"-wag", &"-boot", &"1000", &"-out", &item.staging, &item.input])
    );
}

#[test]
fn profile_arguments() {
    let (_directory, store) = store_with(&[
        ("F1", ArtifactKind::Fasta, ">A\nMKV\n"),
        ("F1", ArtifactKind::Alignment, ">A\nMKV\n"),
        ("F1", ArtifactKind::TreeNewick, "(A,B);\n"),
        ("F1", ArtifactKind::TreeAscii, "tree\n"),
    ]);
    let tools = RecordingRunner::default();
    let stage = prepared_stage(StageKind::ProfileBuilding, &PipelineConfig::default(), &tools);

    let item = WorkItem::prepare(&store, "F1", StageKind::ProfileBuilding).unwrap();
    stage.run(&item, &tools).unwrap();
    assert_eq!(
        tools.last_args(),
        args(&[&"--amino", &"-n", &"F1", &item.staging, &item.input])
    );
}

#[test]
fn unresolved_tool() {
    let (_directory, store) = store_with(&[("F1", ArtifactKind::Fasta, ">A\nMKV\n")]);
    let tools = RecordingRunner::default();
    let stage = build_stage(StageKind::Alignment, &PipelineConfig::default())
        .unwrap()
        .unwrap();

    let item = WorkItem::prepare(&store, "F1", StageKind::Alignment).unwrap();
    assert!(matches!(
        stage.run(&item, &tools),
        Err(Error::ToolNotFound { .. })
    ));
}

#[test]
fn tree_rendering() {
    let (_directory, store) = store_with(&[
        ("F1", ArtifactKind::Fasta, ">A\nMKV\n"),
        ("F1", ArtifactKind::Alignment, ">A\nMKV\n"),
        ("F1", ArtifactKind::TreeNewick, "(A:1,B:1);\n"),
        ("F2", ArtifactKind::Fasta, ">A\nMKV\n"),
        ("F2", ArtifactKind::Alignment, ">A\nMKV\n"),
        ("F2", ArtifactKind::TreeNewick, "(A:1,(B:1;\n"),
    ]);
    let tools = RecordingRunner::default();
    let stage = prepared_stage(StageKind::TreeRendering, &PipelineConfig::default(), &tools);

    let item = WorkItem::prepare(&store, "F1", StageKind::TreeRendering).unwrap();
    stage.run(&item, &tools).unwrap();
    let drawing = std::fs::read_to_string(&item.staging).unwrap();
    assert!(drawing.contains(" A\n"), "{drawing}");
    assert!(drawing.contains(" B\n"), "{drawing}");

    let item = WorkItem::prepare(&store, "F2", StageKind::TreeRendering).unwrap();
    assert!(matches!(
        stage.run(&item, &tools),
        Err(Error::MalformedTree { family, .. }) if family == "F2"
    ));
    assert!(tools.invocations.lock().unwrap().is_empty());
}

fn write_xz(path: &Path, content: &str) {
    let mut encoder = xz2::write::XzEncoder::new(std::fs::File::create(path).unwrap(), 6);
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

fn write_gzip(path: &Path, content: &str) {
    let mut encoder = flate2::write::GzEncoder::new(
        std::fs::File::create(path).unwrap(),
        flate2::Compression::default(),
    );
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

#[test]
fn logo_resources() {
    let directory = tempfile::tempdir().unwrap();
    let alphabet = directory.path().join("alph.json");
    let color_map = directory.path().join("cmap.json");
    write_xz(&alphabet, r#"["A", "C", "D"]"#);
    write_gzip(&color_map, r##"{"A": "#ff0000", "C": "green"}"##);

    let style = load_logo_style(&alphabet, &color_map).unwrap();
    assert_eq!(style.symbols(), ['A', 'C', 'D']);
    assert_eq!(style.color('A'), "#ff0000");
    assert_eq!(style.color('D'), "black");

    std::fs::write(&alphabet, "\"ACDE\"").unwrap();
    let style = load_logo_style(&alphabet, &color_map).unwrap();
    assert_eq!(style.symbols(), ['A', 'C', 'D', 'E']);
}

#[test]
fn broken_logo_resources() {
    let directory = tempfile::tempdir().unwrap();
    let alphabet = directory.path().join("alph.json");
    let color_map = directory.path().join("cmap.json");
    std::fs::write(&color_map, "{}").unwrap();

    assert!(matches!(
        load_logo_style(&alphabet, &color_map),
        Err(Error::ResourceLoadFailed { path, .. }) if path == alphabet
    ));

    std::fs::write(&alphabet, r#"["A", "CC"]"#).unwrap();
    assert!(matches!(
        load_logo_style(&alphabet, &color_map),
        Err(Error::ResourceLoadFailed { .. })
    ));

    std::fs::write(&alphabet, r#"["A", "A"]"#).unwrap();
    assert!(matches!(
        load_logo_style(&alphabet, &color_map),
        Err(Error::ResourceLoadFailed { .. })
    ));

    write_xz(&alphabet, "[\"A\"");
    assert!(matches!(
        load_logo_style(&alphabet, &color_map),
        Err(Error::ResourceLoadFailed { .. })
    ));
}

#[test]
fn logo_rendering() {
    let (directory, store) = store_with(&[
        ("F1", ArtifactKind::Fasta, ">A\nMKV\n"),
        ("F1", ArtifactKind::Alignment, ">A\nMKV\n"),
        ("F1", ArtifactKind::TreeNewick, "(A,B);\n"),
        ("F1", ArtifactKind::TreeAscii, "tree\n"),
        ("F1", ArtifactKind::HmmProfile, "HMMER3/f\n"),
    ]);
    let mut config = PipelineConfig::default();
    config.data_dir = directory.path().to_path_buf();
    std::fs::write(config.alphabet_path(), r#"["A", "C"]"#).unwrap();
    std::fs::write(config.color_map_path(), r#"{"A": "red"}"#).unwrap();

    let tools = RecordingRunner {
        captured_output: "max expected height = 4.32\n1: 0.5 0.0\n2: 1.0 2.0\n".to_string(),
        ..Default::default()
    };
    let stage = prepared_stage(StageKind::LogoRendering, &config, &tools);
    let item = WorkItem::prepare(&store, "F1", StageKind::LogoRendering).unwrap();
    stage.run(&item, &tools).unwrap();

    assert_eq!(tools.last_args(), args(&[&"--no_indel", &item.input]));
    let svg = std::fs::read_to_string(&item.staging).unwrap();
    assert_eq!(svg.matches("class=\"residue\"").count(), 3);
    assert!(svg.contains("red"));

    let tools = RecordingRunner {
        captured_output: "1: 0.5\n".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        stage.run(&item, &tools),
        Err(Error::Parse { line: 1, .. })
    ));
}

#[test]
fn logo_resources_load_during_prepare() {
    let directory = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::default();
    config.data_dir = directory.path().to_path_buf();

    let mut stage = build_stage(StageKind::LogoRendering, &config)
        .unwrap()
        .unwrap();
    assert!(matches!(
        stage.prepare(&RecordingRunner::default()),
        Err(Error::ResourceLoadFailed { .. })
    ));
}
