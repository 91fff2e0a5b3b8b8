//! Integration tests for the batch quality-assessment pipeline.

use sample_qc::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use approx::assert_relative_eq;

fn log_text(total: u64, unique: u64) -> String {
    format!(
        "# novoalign (V2.07.13)\n\
         #     Paired Reads:     {}\n\
         #     Read Sequences:   {}\n\
         #     Unique Alignment: {}\n\
         #     Multi Mapped:     12345\n",
        total / 2,
        total,
        unique
    )
}

/// Write a small but complete batch: sample sheet, count matrix and one
/// aligner log per sample.
///
/// The batch holds two wildtype replicates, a three-replicate deletion
/// strain whose third replicate is shallow, retains target expression and
/// disagrees with its siblings, and a clean single-replicate compound
/// strain (deletion plus overexpression).
fn write_batch(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
    let samples = dir.join("samples.csv");
    fs::write(
        &samples,
        "genotype,replicate,fastqFileName,treatment,timePoint\n\
         CNAG_WT,1,run_1/wt_1.fastq.gz,EtOH,30\n\
         CNAG_WT,2,run_1/wt_2.fastq.gz,EtOH,30\n\
         CNAG_A,1,run_1/mutA_1.fastq.gz,EtOH,30\n\
         CNAG_A,2,run_1/mutA_2.fastq.gz,EtOH,30\n\
         CNAG_A,3,run_2/mutA_3.fastq.gz,EtOH,30\n\
         CNAG_B.CNAG_C_over,1,run_2/compound_1.fastq.gz,EtOH,30\n",
    )
    .unwrap();

    let counts = dir.join("counts.csv");
    fs::write(
        &counts,
        "gene_id,wt_1_read_count.tsv,wt_2_read_count.tsv,mutA_1_read_count.tsv,\
         mutA_2_read_count.tsv,mutA_3_read_count.tsv,compound_1_read_count.tsv\n\
         CNAG_A,100,100,5,10,40,80\n\
         CNAG_B,50,50,50,52,150,5\n\
         CNAG_C,20,20,20,21,60,120\n\
         NAT,0,0,10,12,8,14\n\
         G1,200,200,200,204,600,210\n\
         G2,300,300,300,306,900,310\n",
    )
    .unwrap();

    let logs = dir.join("logs");
    fs::create_dir(&logs).unwrap();
    let counters: [(&str, u64, u64); 6] = [
        ("wt_1", 2_000_000, 1_900_000),
        ("wt_2", 2_000_000, 1_900_000),
        ("mutA_1", 2_000_000, 1_900_000),
        ("mutA_2", 2_000_000, 1_900_000),
        ("mutA_3", 800_000, 700_000),
        ("compound_1", 2_000_000, 1_900_000),
    ];
    for (id, total, unique) in counters {
        fs::write(
            logs.join(format!("{}_novoalign.log", id)),
            log_text(total, unique),
        )
        .unwrap();
    }

    (samples, counts, logs)
}

fn conditions() -> Vec<String> {
    vec!["TREATMENT".to_string(), "TIMEPOINT".to_string()]
}

fn markers() -> Vec<String> {
    vec!["NAT".to_string()]
}

fn find_row<'a>(table: &'a SampleTable, sample_id: &str) -> &'a SampleRow {
    table
        .rows()
        .iter()
        .find(|r| r.sample_id == sample_id)
        .unwrap()
}

#[test]
fn test_full_batch_assessment() {
    let dir = TempDir::new().unwrap();
    let (samples, counts, logs_dir) = write_batch(dir.path());
    let output = dir.path().join("quality_summary.tsv");

    preflight(&counts, &output).unwrap();

    let thresholds = QcThresholds::default();
    let mut table = SampleTable::from_csv(&samples, &conditions()).unwrap();
    let matrix = ExpressionMatrix::from_csv(&counts).unwrap();
    let logs = AlignmentLogStore::from_dir(&logs_dir, "novoalign").unwrap();
    assert_eq!(table.len(), 6);
    assert_eq!(matrix.n_genes(), 6);
    assert_eq!(logs.len(), 6);

    let groups = table.group_index(&matrix);
    assert_eq!(groups.len(), 3);

    let summary = QcPipeline::new(thresholds.clone())
        .wildtype("CNAG_WT")
        .markers(markers())
        .run(&mut table, &matrix, &groups, &logs);

    let mapping = summary.mapping.unwrap();
    assert_eq!(mapping.assessed, 6);
    assert_eq!(mapping.missing_logs, 0);
    assert_eq!(mapping.flagged, 1);

    let mutation = summary.mutation.unwrap();
    assert_eq!(mutation.assessed, 4);
    assert_eq!(mutation.skipped_rows, 0);
    assert_eq!(mutation.flagged, 1);

    let marker_summary = summary.markers.unwrap();
    assert_relative_eq!(marker_summary.references["NAT"], 11.0);
    assert_eq!(marker_summary.flagged, 0);

    let concordance = summary.concordance.unwrap();
    assert_eq!(concordance.groups_scored, 2);
    assert_eq!(concordance.groups_exempt, 1);
    assert_eq!(concordance.subsets_scored, 5);
    assert_eq!(concordance.outliers, 1);

    assert_eq!(summary.audited, 1);

    // The shallow, discordant replicate with residual target expression
    // collects one flag per failed stage, in stage order.
    let bad = find_row(&table, "mutA_3");
    assert_eq!(
        bad.fired(),
        &[CheckId::TotalReads, CheckId::DeletionFow, CheckId::CovMed]
    );
    assert_eq!(bad.status(&thresholds), 37);
    assert_eq!(bad.auto_audit, Some(true));

    for id in ["wt_1", "wt_2", "mutA_1", "mutA_2", "compound_1"] {
        let row = find_row(&table, id);
        assert_eq!(row.status(&thresholds), 0, "{} should be clean", id);
        assert_eq!(row.auto_audit, None);
    }

    // Spot-check the derived metrics.
    assert_relative_eq!(find_row(&table, "mutA_1").metrics.mut_fow[0], 0.05);
    let compound = find_row(&table, "compound_1");
    assert_relative_eq!(compound.metrics.mut_fow[0], 0.1);
    assert_relative_eq!(compound.metrics.mut_fow[1], 6.0);
    assert_relative_eq!(compound.metrics.marker_fom["NAT"], 14.0 / 11.0);
    assert_relative_eq!(bad.metrics.cov_med["12"], 0.022, epsilon = 1e-3);
    assert!(bad.metrics.cov_med["123"] > 0.15);
}

#[test]
fn test_report_file_layout() {
    let dir = TempDir::new().unwrap();
    let (samples, counts, logs_dir) = write_batch(dir.path());
    let output = dir.path().join("quality_summary.tsv");

    let thresholds = QcThresholds::default();
    let mut table = SampleTable::from_csv(&samples, &conditions()).unwrap();
    let matrix = ExpressionMatrix::from_csv(&counts).unwrap();
    let logs = AlignmentLogStore::from_dir(&logs_dir, "novoalign").unwrap();
    let groups = table.group_index(&matrix);

    QcPipeline::new(thresholds.clone())
        .wildtype("CNAG_WT")
        .markers(markers())
        .run(&mut table, &matrix, &groups, &logs);

    QcReport::build(&table, &thresholds, &markers())
        .to_tsv(&output)
        .unwrap();

    let content = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 7);
    assert_eq!(
        lines[0],
        "GENOTYPE\tREPLICATE\tFASTQFILENAME\tTREATMENT\tTIMEPOINT\tSTATUS\tAUTO_AUDIT\t\
         MANUAL_AUDIT\tUSER\tNOTE\tTOTAL\tALIGN_PCT\tMUT_FOW\tNAT_FOM\t\
         COV_MED_REP123\tCOV_MED_REP12\tCOV_MED_REP13\tCOV_MED_REP23"
    );

    // Sorted by genotype, then replicate.
    let genotypes: Vec<&str> = lines[1..]
        .iter()
        .map(|l| l.split('\t').next().unwrap())
        .collect();
    assert_eq!(
        genotypes,
        [
            "CNAG_A",
            "CNAG_A",
            "CNAG_A",
            "CNAG_B.CNAG_C_over",
            "CNAG_WT",
            "CNAG_WT"
        ]
    );

    // The failed replicate's full record.
    assert_eq!(
        lines[3],
        "CNAG_A\t3\trun_2/mutA_3.fastq.gz\tEtOH\t30\t37\t1\t\t\t\t800000\t0.875\t0.400\t\
         0.727\t0.558\t0.022\t0.500\t0.489"
    );

    // A finished report blocks a rerun over the same paths.
    assert!(matches!(
        preflight(&counts, &output),
        Err(QcError::OutputExists(_))
    ));
}

#[test]
fn test_gene_list_restriction() {
    let dir = TempDir::new().unwrap();
    let (samples, counts, logs_dir) = write_batch(dir.path());

    let thresholds = QcThresholds::default();
    let mut table = SampleTable::from_csv(&samples, &conditions()).unwrap();
    let requested: Vec<String> = ["CNAG_A", "NAT", "G1", "CNAG_MISSING"]
        .iter()
        .map(|g| g.to_string())
        .collect();
    let matrix = ExpressionMatrix::from_csv(&counts)
        .unwrap()
        .restrict_genes(&requested)
        .unwrap();
    assert_eq!(matrix.n_genes(), 3);

    let logs = AlignmentLogStore::from_dir(&logs_dir, "novoalign").unwrap();
    let groups = table.group_index(&matrix);

    let summary = QcPipeline::new(thresholds.clone())
        .wildtype("CNAG_WT")
        .markers(markers())
        .run(&mut table, &matrix, &groups, &logs);

    // The compound strain's genes fell out of the restricted matrix, so
    // both tokens are placeholders and cannot fail.
    assert_eq!(summary.mutation.unwrap().skipped_genes, 2);
    let compound = find_row(&table, "compound_1");
    assert_eq!(compound.metrics.mut_fow.len(), 2);
    assert!(compound.metrics.mut_fow[0].is_nan());
    assert!(compound.metrics.mut_fow[1].is_nan());
    assert_eq!(compound.status(&thresholds), 0);

    // The failed replicate still fails on what remains.
    let bad = find_row(&table, "mutA_3");
    assert_eq!(
        bad.fired(),
        &[CheckId::TotalReads, CheckId::DeletionFow, CheckId::CovMed]
    );
}

#[test]
fn test_custom_thresholds_relax_checks() {
    let dir = TempDir::new().unwrap();
    let (samples, counts, logs_dir) = write_batch(dir.path());

    // Half the read-depth requirement, quadruple the concordance allowance.
    const RELAXED_YAML: &str = "\
TOTAL_READS:
  threshold: 500000
  status: 1
ALIGN_PCT:
  threshold: 0.85
  status: 2
MUT_FOW:
  DELETION:
    threshold: 0.2
    status: 4
  OVEREXPRESSION:
    threshold: 4.0
    status: 8
MARKER_FOM:
  threshold: 1.5
  status: 16
COV_MED:
  threshold: 0.6
  status: 32
";
    let thresholds = QcThresholds::from_yaml(RELAXED_YAML).unwrap();

    let mut table = SampleTable::from_csv(&samples, &conditions()).unwrap();
    let matrix = ExpressionMatrix::from_csv(&counts).unwrap();
    let logs = AlignmentLogStore::from_dir(&logs_dir, "novoalign").unwrap();
    let groups = table.group_index(&matrix);

    let summary = QcPipeline::new(thresholds.clone())
        .wildtype("CNAG_WT")
        .markers(markers())
        .run(&mut table, &matrix, &groups, &logs);

    // 800k reads now pass, and the full replicate set scores under the
    // relaxed concordance threshold, so only the residual expression is
    // left standing.
    assert_eq!(summary.concordance.unwrap().outliers, 0);
    let bad = find_row(&table, "mutA_3");
    assert_eq!(bad.fired(), &[CheckId::DeletionFow]);
    assert_eq!(bad.status(&thresholds), 4);
}

#[test]
fn test_duplicate_fastq_detection() {
    let dir = TempDir::new().unwrap();
    let sheet = dir.path().join("samples.csv");
    fs::write(
        &sheet,
        "GENOTYPE,REPLICATE,FASTQFILENAME,TREATMENT,TIMEPOINT\n\
         CNAG_1,1,a.fastq.gz,EtOH,30\n\
         CNAG_1,2,a.fastq.gz,EtOH,30\n\
         CNAG_2,1,b.fastq.gz,EtOH,30\n",
    )
    .unwrap();

    let dups = find_duplicate_keys(&sheet, &["FASTQFILENAME".to_string()]).unwrap();
    assert_eq!(dups, vec![("FASTQFILENAME=a.fastq.gz".to_string(), 2)]);

    // A composite key distinguishes the rows again.
    let none = find_duplicate_keys(
        &sheet,
        &["FASTQFILENAME".to_string(), "REPLICATE".to_string()],
    )
    .unwrap();
    assert!(none.is_empty());
}
