// medicoes CLI - consolidation of works-measurement spreadsheets

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use medicoes_engine::aggregate::build_matrix;
use medicoes_engine::consolidate::consolidate;
use medicoes_engine::lookup::{CategoryConflict, CommitteeLookup, ContractorLookup, RegionLookup};
use medicoes_engine::partition::partition;
use medicoes_engine::report::WorkloadReport;
use medicoes_engine::scan::HeaderRules;
use medicoes_engine::schema::OutputSchema;
use medicoes_engine::sheet::Grid;
use medicoes_engine::{JobConfig, PipelineError};
use medicoes_io::{csv as csv_export, render, template, xlsx};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE: u8 = 2;
pub const EXIT_SOURCE: u8 = 3;
pub const EXIT_TEMPLATE: u8 = 4;

#[derive(Parser)]
#[command(name = "medicoes")]
#[command(about = "Consolidates works-measurement spreadsheets into one formatted workbook")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the consolidation pipeline described by a TOML job file
    #[command(after_help = "\
The job file names the four source workbooks (ledger, registry, auxiliary,
committees), the output template and the output path. With --csv the
partitions are also written as execucao.csv / problemas.csv /
gestor_faltantes.csv in the given directory.

Examples:
  medicoes run medicoes.toml
  medicoes run medicoes.toml -o CONSOLIDADO.xlsx
  medicoes run medicoes.toml --csv exports/ --summary-json resumo.json -q")]
    Run {
        /// TOML job file
        job: PathBuf,

        /// Override the output workbook path
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Also write each partition as CSV into this directory
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write a JSON run summary
        #[arg(long)]
        summary_json: Option<PathBuf>,

        /// Suppress stderr notes (skipped rows, unmatched columns)
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Build the per-region manager/inspector workload report
    #[command(after_help = "\
Examples:
  medicoes managers CONTROLES.xlsx -o RELATORIO.xlsx")]
    Managers {
        /// Roster workbook (region blocks with SEI/GESTOR/FISCAL columns)
        input: PathBuf,

        /// Output workbook
        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Suppress stderr notes
        #[arg(long, short = 'q')]
        quiet: bool,
    },
}

#[derive(Serialize)]
struct RunSummary {
    execution_rows: usize,
    problem_rows: usize,
    missing_managers: usize,
    skipped_ledger_entries: usize,
    category_conflicts: Vec<CategoryConflict>,
    unmatched_template_columns: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            job,
            output,
            csv,
            summary_json,
            quiet,
        } => cmd_run(&job, output, csv, summary_json, quiet),
        Commands::Managers {
            input,
            output,
            quiet,
        } => cmd_managers(&input, &output, quiet),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err((code, message)) => {
            eprintln!("error: {}", message);
            ExitCode::from(code)
        }
    }
}

type CmdResult = Result<(), (u8, String)>;

fn cmd_run(
    job_path: &Path,
    output_override: Option<PathBuf>,
    csv_dir: Option<PathBuf>,
    summary_json: Option<PathBuf>,
    quiet: bool,
) -> CmdResult {
    let job_text = std::fs::read_to_string(job_path)
        .map_err(|e| (EXIT_USAGE, format!("{}: {}", job_path.display(), e)))?;
    let config = JobConfig::from_toml(&job_text).map_err(|e| (EXIT_USAGE, e.to_string()))?;
    let output_path = output_override.unwrap_or_else(|| config.output.file.clone());

    // Template first: an unusable template must abort before any source work.
    let template = template::read(
        &config.template.file,
        &config.template.sheet,
        config.template.header_row,
    )
    .map_err(|e| (EXIT_TEMPLATE, e))?;
    let schema = OutputSchema::resolve(&template.titles)
        .map_err(|e| (EXIT_TEMPLATE, e.to_string()))?;

    // Each source workbook is read into grids inside its own scope, so no
    // two source books overlap their lifetimes.
    let rules = HeaderRules::committee();

    let (regions, contractors) = {
        let auxiliary =
            xlsx::import(&config.sources.auxiliary).map_err(|e| (EXIT_SOURCE, e))?;
        let aux_grid = auxiliary.sheet_ignore_case("AUXILIAR").ok_or_else(|| {
            (
                EXIT_SOURCE,
                PipelineError::SheetNotFound {
                    source: config.sources.auxiliary.display().to_string(),
                    sheet: "AUXILIAR".into(),
                }
                .to_string(),
            )
        })?;
        (RegionLookup::build(aux_grid), ContractorLookup::build(aux_grid))
    };

    let committees = {
        let book = xlsx::import(&config.sources.committees).map_err(|e| (EXIT_SOURCE, e))?;
        CommitteeLookup::build(&book, &rules)
    };

    let matrix = {
        let book = xlsx::import(&config.sources.ledger).map_err(|e| (EXIT_SOURCE, e))?;
        let ledger = first_sheet(&book, &config.sources.ledger)?;
        build_matrix(ledger).map_err(|e| (EXIT_SOURCE, e.to_string()))?
    };

    let periods = config.periods.labels();
    let final_year = config.periods.final_year_labels();
    let consolidation = {
        let book = xlsx::import(&config.sources.registry).map_err(|e| (EXIT_SOURCE, e))?;
        let registry = first_sheet(&book, &config.sources.registry)?;
        consolidate(
            registry,
            &committees,
            &regions,
            &contractors,
            &matrix,
            &periods,
            &final_year,
        )
        .map_err(|e| (EXIT_SOURCE, e.to_string()))?
    };

    let split = partition(consolidation.records, &config.labels.execution_status);

    let options = render::RenderOptions {
        schema: &schema,
        template: &template,
        execution_sheet: &config.output.execution_sheet,
        problems_sheet: &config.output.problems_sheet,
        missing_sheet: &config.output.missing_managers_sheet,
    };
    render::write_consolidated(
        &output_path,
        &options,
        &split.execution,
        &split.other,
        &consolidation.missing_managers,
    )
    .map_err(|e| (EXIT_ERROR, e))?;

    if let Some(dir) = csv_dir {
        std::fs::create_dir_all(&dir)
            .map_err(|e| (EXIT_ERROR, format!("{}: {}", dir.display(), e)))?;
        csv_export::export_partition(&dir.join("execucao.csv"), &schema, &split.execution)
            .map_err(|e| (EXIT_ERROR, e))?;
        if !split.other.is_empty() {
            csv_export::export_partition(&dir.join("problemas.csv"), &schema, &split.other)
                .map_err(|e| (EXIT_ERROR, e))?;
        }
        if !consolidation.missing_managers.is_empty() {
            csv_export::export_missing(
                &dir.join("gestor_faltantes.csv"),
                &consolidation.missing_managers,
            )
            .map_err(|e| (EXIT_ERROR, e))?;
        }
    }

    let summary = RunSummary {
        execution_rows: split.execution.len(),
        problem_rows: split.other.len(),
        missing_managers: consolidation.missing_managers.len(),
        skipped_ledger_entries: matrix.skipped_entries,
        category_conflicts: committees.conflicts.clone(),
        unmatched_template_columns: schema
            .unmatched_titles()
            .iter()
            .map(|t| t.to_string())
            .collect(),
    };
    if let Some(path) = summary_json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| (EXIT_ERROR, e.to_string()))?;
        std::fs::write(&path, json)
            .map_err(|e| (EXIT_ERROR, format!("{}: {}", path.display(), e)))?;
    }

    if !quiet {
        if summary.skipped_ledger_entries > 0 {
            eprintln!(
                "note: {} ledger entries skipped (unrecognized month/year)",
                summary.skipped_ledger_entries
            );
        }
        for title in &summary.unmatched_template_columns {
            eprintln!("note: template column '{}' matches no field, left empty", title);
        }
        for conflict in &summary.category_conflicts {
            eprintln!(
                "note: id {} listed by more than one category sheet; kept {}, replaced {}",
                conflict.id, conflict.kept, conflict.replaced
            );
        }
    }

    println!("done: {}", output_path.display());
    println!(
        "  - sheet '{}': {} works in execution",
        config.output.execution_sheet, summary.execution_rows
    );
    println!(
        "  - sheet '{}': {} works with other statuses",
        config.output.problems_sheet, summary.problem_rows
    );
    if summary.missing_managers > 0 {
        println!(
            "  - sheet '{}': {} records without manager",
            config.output.missing_managers_sheet, summary.missing_managers
        );
    }

    Ok(())
}

fn cmd_managers(input: &Path, output: &Path, quiet: bool) -> CmdResult {
    let book = xlsx::import(input).map_err(|e| (EXIT_SOURCE, e))?;
    let report = WorkloadReport::build(&book, &HeaderRules::committee());

    if report.regions.is_empty() {
        return Err((
            EXIT_SOURCE,
            format!("{}: no roster blocks recognized", input.display()),
        ));
    }

    render::write_workload(output, &report).map_err(|e| (EXIT_ERROR, e))?;

    if !quiet {
        for region in report.region_order() {
            let workload = &report.regions[region];
            eprintln!(
                "note: {}: {} managers, {} inspectors",
                region,
                workload.managers.len(),
                workload.inspectors.len()
            );
        }
    }
    println!("done: {}", output.display());
    Ok(())
}

fn first_sheet<'a>(
    book: &'a medicoes_engine::sheet::SourceBook,
    path: &Path,
) -> Result<&'a Grid, (u8, String)> {
    book.first()
        .ok_or_else(|| (EXIT_SOURCE, format!("{}: workbook has no sheets", path.display())))
}
