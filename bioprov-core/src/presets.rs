//! Ready-made presets for common tools

use crate::error::{BioprovError, Result};
use crate::parameter::{ParamKind, Parameter};
use crate::preset::PresetProgram;
use crate::program::Program;
use std::path::Path;

/// Ranks accepted by `kaiju2table -r`
pub const TAXONOMIC_RANKS: &[&str] = &[
    "superkingdom",
    "phylum",
    "class",
    "order",
    "family",
    "genus",
    "species",
];

/// Gene prediction on an assembly. Outputs are named after the assembly.
pub fn prodigal(input_tag: &str) -> PresetProgram {
    PresetProgram::new(Program::new("prodigal"))
        .input("-i", input_tag)
        .output("-a", "proteins", "_proteins.faa")
        .output("-d", "genes", "_genes.fna")
        .output("-s", "scores", "_scores.cds")
        .preffix_tag(input_tag)
}

/// Files Prokka writes into its output directory, by tag and extension
pub const PROKKA_OUTPUTS: &[(&str, &str)] = &[
    ("prokka_proteins", ".faa"),
    ("prokka_contigs", ".fna"),
    ("prokka_genes", ".ffn"),
    ("submit_contigs", ".fsa"),
    ("feature_table", ".tbl"),
    ("sequin", ".sqn"),
    ("genbank", ".gbk"),
    ("gff", ".gff"),
    ("prokka_log", ".log"),
    ("prokka_stats", ".txt"),
];

/// Whole-genome annotation with Prokka. Output goes to `<assembly stem>_prokka/`
/// and every file inside is registered by extension. `--force` lets a rerun
/// reuse an existing directory.
pub fn prokka(input_tag: &str, threads: usize) -> PresetProgram {
    let preset = PresetProgram::new(Program::new("prokka"))
        .extra_flag(Parameter::with_kind("--cpus", threads, ParamKind::Misc))
        .extra_flag(Parameter::flag("--force"))
        .name_flag("--prefix")
        .output_dir("--outdir", "prokka_dir", "_prokka")
        .input("", input_tag)
        .preffix_tag(input_tag);
    PROKKA_OUTPUTS
        .iter()
        .fold(preset, |preset, (tag, extension)| preset.dir_output(*tag, *extension))
}

fn blast(blast_type: &str, db: &str, query_tag: &str, outformat: u32) -> Result<PresetProgram> {
    if let Some(parent) = Path::new(db).parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(BioprovError::invalid_input(format!(
                "directory of the {} database '{}' does not exist",
                blast_type, db
            )));
        }
    }
    let hits_tag = format!("{}_hits", blast_type);
    let hits_suffix = format!("_{}_hits.txt", blast_type);
    Ok(PresetProgram::new(Program::new(blast_type))
        .extra_flag(Parameter::with_kind("-db", db, ParamKind::Misc))
        .extra_flag(Parameter::with_kind("-outfmt", outformat, ParamKind::Misc))
        .input("-query", query_tag)
        .output("-out", hits_tag, hits_suffix))
}

/// Nucleotide BLAST of the `query_tag` file against `db`
pub fn blastn(db: &str, query_tag: &str, outformat: u32) -> Result<PresetProgram> {
    blast("blastn", db, query_tag, outformat)
}

/// Protein BLAST of the `query_tag` file against `db`
pub fn blastp(db: &str, query_tag: &str, outformat: u32) -> Result<PresetProgram> {
    blast("blastp", db, query_tag, outformat)
}

/// Taxonomic classification of paired-end reads tagged `r1` and `r2`
pub fn kaiju(kaijudb: &str, nodes: &str, threads: usize, r1: &str, r2: &str) -> PresetProgram {
    PresetProgram::new(Program::new("kaiju"))
        .extra_flag(Parameter::with_kind("-t", nodes, ParamKind::Misc))
        .extra_flag(Parameter::with_kind("-f", kaijudb, ParamKind::Misc))
        .extra_flag(Parameter::with_kind("-z", threads, ParamKind::Misc))
        .input("-i", r1)
        .input("-j", r2)
        .output("-o", "kaiju_output", "_kaiju.out")
}

/// Summary table of a kaiju output at a taxonomic rank. The program is
/// tagged `kaiju2table_<rank>` so one sample can hold a report per rank.
pub fn kaiju2table(rank: &str, nodes: &str, names: &str, kaiju_output: &str) -> Result<PresetProgram> {
    if !TAXONOMIC_RANKS.contains(&rank) {
        return Err(BioprovError::invalid_input(format!(
            "invalid taxonomic rank '{}'; choose one of {}",
            rank,
            TAXONOMIC_RANKS.join(", ")
        )));
    }
    let report_tag = format!("kaiju_report_{}", rank);
    let report_suffix = format!("_{}.tsv", report_tag);
    Ok(PresetProgram::new(Program::new("kaiju2table").tagged(format!("kaiju2table_{}", rank)))
        .extra_flag(Parameter::with_kind("-t", nodes, ParamKind::Misc))
        .extra_flag(Parameter::with_kind("-n", names, ParamKind::Misc))
        .extra_flag(Parameter::with_kind("-r", rank, ParamKind::Misc))
        .output("-o", report_tag, report_suffix)
        .input("", kaiju_output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::File;
    use crate::sample::Sample;
    use tempfile::TempDir;

    #[test]
    fn test_prodigal_outputs() {
        let dir = TempDir::new().unwrap();
        let assembly = dir.path().join("ecoli.fna");
        std::fs::write(&assembly, ">c\nACGT\n").unwrap();
        let mut sample = Sample::new("ecoli").with_files(File::new(&assembly, Some("assembly")));

        let mut preset = prodigal("assembly");
        preset.create_func(&mut sample, None).unwrap();
        for (tag, name) in [
            ("proteins", "ecoli_proteins.faa"),
            ("genes", "ecoli_genes.fna"),
            ("scores", "ecoli_scores.cds"),
        ] {
            assert_eq!(sample.files[tag].path(), dir.path().join(name).as_path());
        }
        assert!(sample.programs.contains_key("prodigal"));
    }

    #[test]
    fn test_prokka_outputs_by_extension() {
        let dir = TempDir::new().unwrap();
        let assembly = dir.path().join("ecoli.fna");
        std::fs::write(&assembly, ">c\nACGT\n").unwrap();
        let mut sample = Sample::new("ecoli").with_files(File::new(&assembly, Some("assembly")));

        let mut preset = prokka("assembly", 2);
        preset.create_func(&mut sample, None).unwrap();

        let outdir = dir.path().join("ecoli_prokka");
        assert_eq!(sample.files["prokka_dir"].path(), Path::new(&format!("{}/", outdir.display())));
        assert_eq!(sample.files["gff"].path(), outdir.join("ecoli.gff").as_path());
        assert_eq!(sample.files["prokka_proteins"].path(), outdir.join("ecoli.faa").as_path());
        assert_eq!(sample.files["genbank"].path(), outdir.join("ecoli.gbk").as_path());
        assert_eq!(sample.files.len(), 1 + 1 + PROKKA_OUTPUTS.len());

        let cmd = &sample.programs["prokka"].cmd;
        assert!(cmd.contains("--cpus 2 --force --prefix ecoli"));
        assert!(cmd.contains(&format!("--outdir {}", outdir.display())));
        assert!(cmd.ends_with(&assembly.display().to_string()));
    }

    #[test]
    fn test_kaiju2table_tagged_by_rank() {
        let genus = kaiju2table("genus", "nodes.dmp", "names.dmp", "kaiju_output").unwrap();
        assert_eq!(genus.name(), "kaiju2table_genus");
        assert_eq!(genus.program.name, "kaiju2table");
    }

    #[test]
    fn test_blastn_command() {
        let preset = blastn("/tmp/ref", "query", 6).unwrap();
        assert!(preset.program.cmd.ends_with("-db /tmp/ref -outfmt 6"));
        assert_eq!(preset.output_files["-out"].0, "blastn_hits");
    }

    #[test]
    fn test_blast_db_directory_checked() {
        assert!(blastp("/nonexistent/dir/ref", "query", 6).is_err());
    }

    #[test]
    fn test_kaiju2table_rank() {
        assert!(kaiju2table("phylum", "nodes.dmp", "names.dmp", "kaiju_output").is_ok());
        let err = kaiju2table("kingdom", "nodes.dmp", "names.dmp", "kaiju_output").unwrap_err();
        assert!(err.to_string().contains("kingdom"));
    }

    #[test]
    fn test_kaiju_inputs() {
        let preset = kaiju("db.fmi", "nodes.dmp", 4, "R1", "R2");
        assert_eq!(preset.input_files["-i"], "R1");
        assert_eq!(preset.input_files["-j"], "R2");
        assert!(preset.program.cmd.contains("-z 4"));
    }
}
