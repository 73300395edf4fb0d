use bioprov_core::{
    BioprovError, File, ParamKind, Parameter, PresetProgram, Program, RunStatus, Sample,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn aligner() -> PresetProgram {
    PresetProgram::new(Program::with_path("aligner", "/opt/bin/aligner"))
        .input("-q", "query")
        .output("-o", "hits", "_hits.tsv")
        .extra_flag(Parameter::with_kind("--threads", 2, ParamKind::Misc))
}

fn sample_with_query(dir: &Path, name: &str) -> (Sample, PathBuf) {
    let query = dir.join(format!("{}.fna", name));
    std::fs::write(&query, ">c1\nACGT\n").expect("write query");
    let sample = Sample::new(name).with_files(File::new(&query, Some("query")));
    (sample, query)
}

#[test]
fn aligner_binding_registers_outputs() {
    let dir = TempDir::new().expect("tmp dir");
    let (mut sample, query) = sample_with_query(dir.path(), "in");

    let mut preset = aligner();
    preset.create_func(&mut sample, None).expect("bind");

    // No prefix tag: outputs go to ./<sample name>
    let expected = std::env::current_dir().unwrap().join("in_hits.tsv");
    assert_eq!(sample.files["hits"].path(), expected.as_path());

    let cmd = &sample.programs["aligner"].cmd;
    assert!(cmd.contains(&query.display().to_string()));
    assert!(cmd.contains(&expected.display().to_string()));
    assert!(cmd.starts_with("/opt/bin/aligner --threads 2"));
    assert!(preset.ready);
    assert_eq!(preset.sample.as_deref(), Some("in"));
}

#[test]
fn missing_query_tag_raises_before_command() {
    let mut sample = Sample::new("empty").with_files(File::new("/d/reads.fq", Some("reads")));
    let mut preset = aligner();

    match preset.create_func(&mut sample, None) {
        Err(BioprovError::TagNotFound {
            tag,
            sample,
            available,
        }) => {
            assert_eq!(tag, "query");
            assert_eq!(sample, "empty");
            assert_eq!(available, vec!["reads".to_string()]);
        }
        other => panic!("expected TagNotFound, got {:?}", other),
    }
    assert!(!preset.program.cmd.contains("-q"));
    assert!(!sample.programs.contains_key("aligner"));
}

#[test]
fn rebinding_leaves_only_second_sample_paths() {
    let dir = TempDir::new().expect("tmp dir");
    let (mut first, first_query) = sample_with_query(dir.path(), "first");
    let (mut second, second_query) = sample_with_query(dir.path(), "second");

    let mut preset = aligner();
    preset.create_func(&mut first, None).expect("bind first");
    preset.create_func(&mut second, None).expect("bind second");

    let values: Vec<&str> = preset
        .program
        .params
        .values()
        .map(|p| p.value.as_str())
        .collect();
    assert!(values.iter().all(|v| !v.contains("first")));
    assert!(values.contains(&second_query.display().to_string().as_str()));
    assert!(!preset.program.cmd.contains(&first_query.display().to_string()));
    assert_eq!(
        preset.program.params_of_kind(ParamKind::Input).count(),
        1
    );
    assert_eq!(
        preset.program.params_of_kind(ParamKind::Output).count(),
        1
    );
    // Sample-independent flags survive
    assert!(preset.program.params.contains_key("--threads"));
}

#[test]
fn failed_rebind_keeps_previous_binding() {
    let dir = TempDir::new().expect("tmp dir");
    let (mut first, first_query) = sample_with_query(dir.path(), "first");
    let mut reads_only = Sample::new("reads_only").with_files(File::new(&first_query, Some("reads")));

    let mut preset = aligner();
    preset.create_func(&mut first, None).expect("bind first");
    let bound_cmd = preset.program.cmd.clone();

    let err = preset.create_func(&mut reads_only, None).unwrap_err();
    assert!(matches!(err, BioprovError::TagNotFound { .. }));

    assert!(preset.ready);
    assert_eq!(preset.sample.as_deref(), Some("first"));
    assert_eq!(preset.program.cmd, bound_cmd);
    assert!(preset.program.cmd.contains(&first_query.display().to_string()));
    assert_eq!(reads_only.files.len(), 1);
    assert!(reads_only.programs.is_empty());
}

#[test]
fn missing_binary_never_runs() {
    let dir = TempDir::new().expect("tmp dir");
    let (mut sample, _) = sample_with_query(dir.path(), "s1");

    let mut preset = aligner();
    assert!(!preset.program.found);
    preset.create_func(&mut sample, None).expect("bind");

    match preset.run(&mut sample) {
        Err(BioprovError::ProgramNotFound { program }) => assert_eq!(program, "aligner"),
        other => panic!("expected ProgramNotFound, got {:?}", other),
    }
    assert!(sample.programs["aligner"].runs.is_empty());
    assert!(!sample.files["hits"].exists());
}

#[test]
fn run_status_is_pending_then_finished() {
    let dir = TempDir::new().expect("tmp dir");
    let (mut sample, query) = sample_with_query(dir.path(), "s1");

    let mut preset = PresetProgram::new(Program::new("cat")).input("", "query");
    preset.create_func(&mut sample, None).expect("bind");

    let pending = bioprov_core::Run::new("cat", preset.program.cmd.clone(), Some("s1"));
    assert_eq!(pending.status(), RunStatus::Pending);

    preset.run(&mut sample).expect("preset run");
    let recorded = &sample.programs["cat"].runs["1"];
    assert_eq!(recorded.status(), RunStatus::Finished);
    assert_eq!(recorded.stdout, ">c1\nACGT\n");
    assert_eq!(recorded.sample.as_deref(), Some("s1"));
    assert!(recorded.cmd.ends_with(&query.display().to_string()));
    assert_eq!(preset.program.runs.len(), 1);
}
