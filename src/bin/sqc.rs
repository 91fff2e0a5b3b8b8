//! sqc - Sequencing sample quality assessment CLI
//!
//! Scores a sequencing batch against configurable quality checks and
//! writes the audit-ready summary table.

use clap::{ArgAction, Parser, Subcommand};
use log::info;
use sample_qc::config::QcThresholds;
use sample_qc::data::{find_duplicate_keys, AlignmentLogStore, ExpressionMatrix, SampleTable};
use sample_qc::error::{QcError, Result};
use sample_qc::pipeline::{preflight, QcPipeline};
use sample_qc::report::QcReport;
use std::path::PathBuf;

/// Sequencing sample quality assessment
#[derive(Parser)]
#[command(name = "sqc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Silence all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess a batch and write the quality summary table
    Run {
        /// Path to the batch sample sheet CSV
        #[arg(short, long)]
        samples: PathBuf,

        /// Path to the normalized gene-by-sample count matrix CSV
        #[arg(short, long)]
        counts: PathBuf,

        /// Directory holding per-sample aligner logs
        #[arg(short, long)]
        logs_dir: PathBuf,

        /// Output path for the summary TSV (must not exist)
        #[arg(short, long)]
        output: PathBuf,

        /// Threshold document YAML (defaults to built-in thresholds)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Wildtype genotype used as the expression baseline
        #[arg(short, long)]
        wildtype: Option<String>,

        /// Resistance-marker gene ids (comma-separated)
        #[arg(short, long)]
        markers: Option<String>,

        /// Condition descriptor columns (comma-separated)
        #[arg(long, default_value = "TREATMENT,TIMEPOINT")]
        conditions: String,

        /// Compute the wildtype baseline per condition set instead of pooled
        #[arg(long)]
        condition_specific_fow: bool,

        /// Status above which rows are marked for audit
        #[arg(long, default_value = "0")]
        audit_threshold: u32,

        /// Optional file listing gene ids to restrict the matrix to
        #[arg(long)]
        gene_list: Option<PathBuf>,

        /// Aligner name embedded in the log filenames
        #[arg(long, default_value = "novoalign")]
        aligner: String,
    },

    /// List the replicate groups a batch resolves to
    Groups {
        /// Path to the batch sample sheet CSV
        #[arg(short, long)]
        samples: PathBuf,

        /// Path to the normalized gene-by-sample count matrix CSV
        #[arg(short, long)]
        counts: PathBuf,

        /// Condition descriptor columns (comma-separated)
        #[arg(long, default_value = "TREATMENT,TIMEPOINT")]
        conditions: String,

        /// Output format: text, json, or yaml
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check that key columns identify sample-sheet rows uniquely
    CheckMetadata {
        /// Path to the batch sample sheet CSV
        #[arg(short, long)]
        samples: PathBuf,

        /// Key columns that must be unique together (comma-separated)
        #[arg(short, long, default_value = "FASTQFILENAME")]
        keys: String,
    },

    /// Write the default threshold document
    ExampleConfig {
        /// Output path for the example YAML
        #[arg(short, long, default_value = "qc_config.yaml")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    stderrlog::new()
        .quiet(cli.quiet)
        .verbosity(1 + cli.verbose as usize)
        .init()
        .unwrap();

    let result = match cli.command {
        Commands::Run {
            samples,
            counts,
            logs_dir,
            output,
            config,
            wildtype,
            markers,
            conditions,
            condition_specific_fow,
            audit_threshold,
            gene_list,
            aligner,
        } => cmd_run(
            &samples,
            &counts,
            &logs_dir,
            &output,
            config.as_ref(),
            wildtype.as_deref(),
            markers.as_deref(),
            &conditions,
            condition_specific_fow,
            audit_threshold,
            gene_list.as_ref(),
            &aligner,
        ),

        Commands::Groups {
            samples,
            counts,
            conditions,
            format,
        } => cmd_groups(&samples, &counts, &conditions, &format),

        Commands::CheckMetadata { samples, keys } => cmd_check_metadata(&samples, &keys),

        Commands::ExampleConfig { output } => cmd_example_config(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Assess a batch end to end
#[allow(clippy::too_many_arguments)]
fn cmd_run(
    samples_path: &PathBuf,
    counts_path: &PathBuf,
    logs_dir: &PathBuf,
    output_path: &PathBuf,
    config_path: Option<&PathBuf>,
    wildtype: Option<&str>,
    markers_arg: Option<&str>,
    conditions_arg: &str,
    condition_specific_fow: bool,
    audit_threshold: u32,
    gene_list: Option<&PathBuf>,
    aligner: &str,
) -> Result<()> {
    preflight(counts_path, output_path)?;

    let thresholds = match config_path {
        Some(path) => QcThresholds::from_yaml_file(path)?,
        None => QcThresholds::default(),
    };

    let conditions = split_list(conditions_arg);
    let markers = markers_arg.map(split_list).unwrap_or_default();

    info!("loading sample sheet {:?}", samples_path);
    let mut table = SampleTable::from_csv(samples_path, &conditions)?;

    info!("loading expression matrix {:?}", counts_path);
    let mut matrix = ExpressionMatrix::from_csv(counts_path)?;
    if let Some(path) = gene_list {
        let genes = read_gene_list(path)?;
        info!("restricting matrix to {} listed genes", genes.len());
        matrix = matrix.restrict_genes(&genes)?;
    }

    info!("scanning {:?} for {} logs", logs_dir, aligner);
    let logs = AlignmentLogStore::from_dir(logs_dir, aligner)?;

    info!(
        "loaded {} samples, {} genes x {} matrix columns, {} logs",
        table.len(),
        matrix.n_genes(),
        matrix.n_samples(),
        logs.len()
    );

    let groups = table.group_index(&matrix);

    let mut pipeline = QcPipeline::new(thresholds.clone())
        .condition_specific_fow(condition_specific_fow)
        .audit_threshold(audit_threshold);
    if let Some(genotype) = wildtype {
        pipeline = pipeline.wildtype(genotype);
    }
    if !markers.is_empty() {
        pipeline = pipeline.markers(markers.clone());
    }

    let summary = pipeline.run(&mut table, &matrix, &groups, &logs);
    println!("{}", summary);

    QcReport::build(&table, &thresholds, &markers).to_tsv(output_path)?;
    println!("Report written to {}", output_path.display());

    Ok(())
}

/// List replicate groups
fn cmd_groups(
    samples_path: &PathBuf,
    counts_path: &PathBuf,
    conditions_arg: &str,
    format: &str,
) -> Result<()> {
    let conditions = split_list(conditions_arg);
    let table = SampleTable::from_csv(samples_path, &conditions)?;
    let matrix = ExpressionMatrix::from_csv(counts_path)?;
    let groups = table.group_index(&matrix);

    match format {
        "json" | "yaml" => {
            let entries: Vec<serde_json::Value> = groups
                .iter()
                .map(|(key, members)| {
                    serde_json::json!({
                        "genotype": key.genotype,
                        "conditions": key.conditions,
                        "replicates": members,
                    })
                })
                .collect();
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!("{}", serde_yaml::to_string(&entries)?);
            }
        }
        _ => {
            // Text format
            println!("Replicate Groups");
            println!("================");
            println!();
            for (key, members) in &groups {
                println!("{} ({} replicates)", key, members.len());
                for (replicate, sample) in members {
                    println!("  {}: {}", replicate, sample);
                }
            }
            println!();
            println!(
                "{} groups, {} grouped samples ({} sheet rows)",
                groups.len(),
                groups.values().map(|m| m.len()).sum::<usize>(),
                table.len()
            );
        }
    }

    Ok(())
}

/// Check key-column uniqueness
fn cmd_check_metadata(samples_path: &PathBuf, keys_arg: &str) -> Result<()> {
    let keys = split_list(keys_arg);
    let duplicates = find_duplicate_keys(samples_path, &keys)?;

    if duplicates.is_empty() {
        println!(
            "No duplicates: {} identifies every row uniquely",
            keys.join("+")
        );
        return Ok(());
    }

    println!("Duplicate key tuples:");
    for (key, count) in &duplicates {
        println!("  {} rows share {}", count, key);
    }
    Err(QcError::DuplicateKeys(format!(
        "{} key tuple(s) shared by multiple rows",
        duplicates.len()
    )))
}

/// Write the default threshold document
fn cmd_example_config(output_path: &PathBuf) -> Result<()> {
    let yaml = QcThresholds::default().to_yaml()?;

    std::fs::write(output_path, &yaml)?;
    eprintln!("Wrote default thresholds to {:?}", output_path);
    eprintln!();
    eprintln!("Contents:");
    println!("{}", yaml);

    Ok(())
}

fn split_list(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn read_gene_list(path: &PathBuf) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}
