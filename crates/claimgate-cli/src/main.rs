//! claimgate - baseline registry and claim-promotion pipeline CLI
//!
//! The `claimgate` command exposes every pipeline operation. Each command
//! prints its JSON report on stdout; logs go to stderr.
//!
//! ## Commands
//!
//! - `compare`, `release-status`, `plan`: read-only analysis
//! - `ingest`, `normalize`, `attest`: record gates on the registry
//! - `scaffold` .. `readiness`: campaign staging under a staging directory
//! - `campaign`, `pipeline`, `preview`: sandbox projections
//! - `execute`: hash-confirmed promotion of a campaign

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, Level};

use claimgate_core::domain::release::release_status_for;
use claimgate_core::metrics::METRICS;
use claimgate_core::quality_gates::DEFAULT_MAX_METRIC_DELTA;
use claimgate_core::report::{read_json, render_comparison_md, write_json_report, write_markdown};
use claimgate_core::staging::{
    load_patch_overrides, write_draft, write_evidence_schema, write_readiness, write_validation,
    DraftOptions, IngestManifest,
};
use claimgate_core::{
    attest_file, autofill, compare_path, execute_promotion, ingest_payload_file, normalize_file,
    plan, preview_promotion, run_baseline_pipeline, run_campaign, scaffold, AttestOptions,
    BaselineRun, CampaignConfig, ClaimPolicy, DocumentStore, DraftReport, EvalReport, EvidenceMap,
    NormalizeOptions, PromotionPreview, ScaffoldReport, StagingLayout, ValidationReport,
};

#[derive(Parser)]
#[command(name = "claimgate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Baseline registry and claim-promotion pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Baseline registry file
    #[arg(
        long,
        global = true,
        env = "CLAIMGATE_REGISTRY",
        default_value = "baselines/registry.json"
    )]
    registry: PathBuf,

    /// Claim policy file (release thresholds and promotion gates)
    #[arg(long, global = true, env = "CLAIMGATE_POLICY")]
    policy: Option<PathBuf>,

    /// Also write the report to this file
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare an eval report against every baseline in the registry
    Compare {
        /// Eval report JSON
        eval: PathBuf,
        /// Print a markdown table instead of JSON
        #[arg(long)]
        markdown: bool,
    },

    /// Evaluate the release gates for external claims
    ReleaseStatus {
        /// Eval report JSON
        eval: PathBuf,
    },

    /// Build the remediation plan
    Plan {
        /// Eval report JSON
        eval: PathBuf,
    },

    /// Ingest one baseline payload into the registry
    Ingest {
        /// Baseline record JSON
        payload: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply a patch file (and optional harness alignment) to one baseline
    Normalize {
        baseline_id: String,
        /// Patch JSON file
        #[arg(long)]
        patch: Option<PathBuf>,
        /// Align suite_id and scoring_protocol to this eval report
        #[arg(long)]
        align_to: Option<PathBuf>,
        #[arg(long)]
        replace_metrics: bool,
        #[arg(long)]
        dry_run: bool,
    },

    /// Attest one external baseline against the internal harness
    Attest {
        baseline_id: String,
        /// Eval report JSON
        eval: PathBuf,
        #[arg(long, default_value_t = DEFAULT_MAX_METRIC_DELTA)]
        max_metric_delta: f64,
        #[arg(long)]
        dry_run: bool,
    },

    /// Write patch templates and the ingest manifest for a plan
    Scaffold {
        /// Eval report JSON
        eval: PathBuf,
        #[arg(long, default_value = ".claimgate/staging")]
        staging_dir: PathBuf,
    },

    /// Write the evidence schema from a scaffold
    EvidenceSchema {
        #[arg(long, default_value = ".claimgate/staging")]
        staging_dir: PathBuf,
    },

    /// Merge filled evidence into resolved patch files
    Autofill {
        /// Filled evidence JSON (shaped like the evidence schema)
        evidence: PathBuf,
        #[arg(long, default_value = ".claimgate/staging")]
        staging_dir: PathBuf,
    },

    /// Draft a campaign from the plan and resolved patches
    Draft {
        /// Eval report JSON
        eval: PathBuf,
        #[arg(long, default_value = ".claimgate/staging")]
        staging_dir: PathBuf,
        /// Ingest payloads (default: the ingest manifest)
        #[arg(long = "ingest-payload")]
        ingest_payloads: Vec<PathBuf>,
        /// Do not align patched baselines to the eval report
        #[arg(long)]
        no_align: bool,
        #[arg(long)]
        replace_metrics: bool,
        #[arg(long, default_value_t = DEFAULT_MAX_METRIC_DELTA)]
        max_metric_delta: f64,
    },

    /// Validate the drafted campaign
    Validate {
        /// Eval report JSON
        eval: PathBuf,
        #[arg(long, default_value = ".claimgate/staging")]
        staging_dir: PathBuf,
    },

    /// Summarise draft, validation and an optional preview
    Readiness {
        #[arg(long, default_value = ".claimgate/staging")]
        staging_dir: PathBuf,
        /// Preview report JSON written by `preview --out`
        #[arg(long)]
        preview: Option<PathBuf>,
    },

    /// Replay a campaign on a sandbox copy of the registry
    Campaign {
        /// Eval report JSON
        eval: PathBuf,
        /// Campaign JSON
        campaign: PathBuf,
    },

    /// Normalize and attest one baseline on a sandbox copy of the registry
    Pipeline {
        baseline_id: String,
        /// Eval report JSON
        eval: PathBuf,
        #[arg(long)]
        patch: Option<PathBuf>,
        #[arg(long)]
        no_align: bool,
        #[arg(long)]
        replace_metrics: bool,
        #[arg(long, default_value_t = DEFAULT_MAX_METRIC_DELTA)]
        max_metric_delta: f64,
    },

    /// Preview a promotion and print the confirmation hash
    Preview {
        /// Eval report JSON
        eval: PathBuf,
        /// Campaign JSON
        campaign: PathBuf,
    },

    /// Execute a previewed promotion against the registry
    Execute {
        /// Eval report JSON
        eval: PathBuf,
        /// Campaign JSON
        campaign: PathBuf,
        /// Confirmation hash from `preview`
        #[arg(long)]
        confirm: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    claimgate_core::telemetry::init_tracing(cli.json, level);
    debug!(registry = %cli.registry.display(), "claimgate starting");

    let result = run(&cli);
    METRICS.flush();
    result
}

fn run(cli: &Cli) -> Result<()> {
    let registry = cli.registry.as_path();
    let out = cli.out.as_deref();

    match &cli.command {
        Commands::Compare { eval, markdown } => {
            let eval = load_eval(eval)?;
            let report = compare_path(&eval, registry);
            if *markdown {
                let md = render_comparison_md(&report);
                if let Some(path) = out {
                    write_markdown(path, &md)?;
                }
                println!("{md}");
                return Ok(());
            }
            emit(&report, out)
        }
        Commands::ReleaseStatus { eval } => {
            let eval = load_eval(eval)?;
            let policy = load_policy(cli.policy.as_deref())?;
            let (_, status) = release_status_for(&eval, registry, &policy.release_policy);
            emit(&status, out)
        }
        Commands::Plan { eval } => {
            let eval = load_eval(eval)?;
            let policy = load_policy(cli.policy.as_deref())?;
            let (comparison, status) = release_status_for(&eval, registry, &policy.release_policy);
            let report = plan(&eval, &status, &comparison);
            emit(&report, out)?;
            ensure_ok(report.status.is_ok(), "plan")
        }
        Commands::Ingest { payload, dry_run } => {
            let report = ingest_payload_file(registry, payload, *dry_run);
            emit(&report, out)?;
            ensure_ok(report.status.is_ok(), "ingest")
        }
        Commands::Normalize {
            baseline_id,
            patch,
            align_to,
            replace_metrics,
            dry_run,
        } => {
            let align = align_to.as_deref().map(load_eval).transpose()?;
            let opts = NormalizeOptions {
                align_to: align.as_ref(),
                replace_metrics: *replace_metrics,
                dry_run: *dry_run,
            };
            let report = normalize_file(registry, baseline_id, patch.as_deref(), &opts);
            emit(&report, out)?;
            ensure_ok(report.status.is_ok(), "normalize")
        }
        Commands::Attest {
            baseline_id,
            eval,
            max_metric_delta,
            dry_run,
        } => {
            let eval = load_eval(eval)?;
            let opts = AttestOptions {
                max_metric_delta: *max_metric_delta,
                dry_run: *dry_run,
            };
            let report = attest_file(registry, baseline_id, &eval, &opts);
            emit(&report, out)?;
            ensure_ok(report.status.is_ok() && report.passed, "attest")
        }
        Commands::Scaffold { eval, staging_dir } => {
            let eval = load_eval(eval)?;
            let policy = load_policy(cli.policy.as_deref())?;
            let (comparison, status) = release_status_for(&eval, registry, &policy.release_policy);
            let claim_plan = plan(&eval, &status, &comparison);
            ensure_ok(claim_plan.status.is_ok(), "plan")?;
            let layout = StagingLayout::new(staging_dir);
            let report = scaffold(&claim_plan, &eval, &layout).context("scaffold failed")?;
            emit(&report, out)
        }
        Commands::EvidenceSchema { staging_dir } => {
            let layout = StagingLayout::new(staging_dir);
            let scaffold_report: ScaffoldReport = read_json(&layout.scaffold())?;
            let mut store = DocumentStore::new();
            let schema = write_evidence_schema(&scaffold_report, &layout, &mut store)
                .context("evidence schema failed")?;
            emit(&schema, out)
        }
        Commands::Autofill {
            evidence,
            staging_dir,
        } => {
            let layout = StagingLayout::new(staging_dir);
            let scaffold_report: ScaffoldReport = read_json(&layout.scaffold())?;
            let filled: EvidenceMap = read_json(evidence)?;
            let mut store = DocumentStore::new();
            let report = autofill(&scaffold_report, &filled, &layout, &mut store)
                .context("autofill failed")?;
            emit(&report, out)
        }
        Commands::Draft {
            eval,
            staging_dir,
            ingest_payloads,
            no_align,
            replace_metrics,
            max_metric_delta,
        } => {
            let eval = load_eval(eval)?;
            let policy = load_policy(cli.policy.as_deref())?;
            let (comparison, status) = release_status_for(&eval, registry, &policy.release_policy);
            let claim_plan = plan(&eval, &status, &comparison);
            ensure_ok(claim_plan.status.is_ok(), "plan")?;

            let layout = StagingLayout::new(staging_dir);
            let overrides_path = layout.patch_overrides();
            let overrides = if overrides_path.exists() {
                load_patch_overrides(&overrides_path)?
            } else {
                Default::default()
            };
            let payloads = if ingest_payloads.is_empty() && layout.ingest_manifest().exists() {
                read_json::<IngestManifest>(&layout.ingest_manifest())?.payload_paths
            } else {
                ingest_payloads.clone()
            };
            let opts = DraftOptions {
                align_to_eval: !*no_align,
                replace_metrics: *replace_metrics,
                max_metric_delta: *max_metric_delta,
                dry_run: false,
            };
            let report = write_draft(&claim_plan, &overrides, &payloads, &opts, &layout)
                .context("draft failed")?;
            emit(&report, out)
        }
        Commands::Validate { eval, staging_dir } => {
            let eval = load_eval(eval)?;
            let layout = StagingLayout::new(staging_dir);
            let campaign = CampaignConfig::load(&layout.campaign())?;
            let mut store = DocumentStore::new();
            let report = write_validation(&campaign, &eval, registry, &layout, &mut store)
                .context("validation failed")?;
            emit(&report, out)?;
            ensure_ok(report.is_valid(), "validate")
        }
        Commands::Readiness {
            staging_dir,
            preview,
        } => {
            let layout = StagingLayout::new(staging_dir);
            let draft_report: DraftReport = read_json(&layout.draft())?;
            let validation: ValidationReport = read_json(&layout.validation())?;
            let preview: Option<PromotionPreview> =
                preview.as_deref().map(read_json::<PromotionPreview>).transpose()?;
            let report = write_readiness(&draft_report, &validation, preview.as_ref(), &layout)
                .context("readiness failed")?;
            emit(&report, out)
        }
        Commands::Campaign { eval, campaign } => {
            let eval = load_eval(eval)?;
            let policy = load_policy(cli.policy.as_deref())?;
            let campaign = CampaignConfig::load(campaign)?;
            let report = run_campaign(registry, &campaign, &eval, &policy.release_policy);
            emit(&report, out)?;
            ensure_ok(report.status.is_ok(), "sandbox campaign")
        }
        Commands::Pipeline {
            baseline_id,
            eval,
            patch,
            no_align,
            replace_metrics,
            max_metric_delta,
        } => {
            let eval = load_eval(eval)?;
            let policy = load_policy(cli.policy.as_deref())?;
            let run = BaselineRun {
                patch_overrides_path: patch.clone(),
                align_to_eval: !*no_align,
                replace_metrics: *replace_metrics,
                max_metric_delta: *max_metric_delta,
                ..BaselineRun::new(baseline_id.as_str())
            };
            let report = run_baseline_pipeline(registry, &run, &eval, &policy.release_policy);
            emit(&report, out)?;
            ensure_ok(report.status.is_ok(), "sandbox pipeline")
        }
        Commands::Preview { eval, campaign } => {
            let eval = load_eval(eval)?;
            let policy = load_policy(cli.policy.as_deref())?;
            let campaign = CampaignConfig::load(campaign)?;
            let report = preview_promotion(registry, &campaign, &eval, &policy);
            emit(&report, out)?;
            ensure_ok(report.status.is_ok(), "preview")
        }
        Commands::Execute {
            eval,
            campaign,
            confirm,
        } => {
            let eval = load_eval(eval)?;
            let policy = load_policy(cli.policy.as_deref())?;
            let campaign = CampaignConfig::load(campaign)?;
            let report = execute_promotion(registry, &campaign, &eval, &policy, confirm);
            emit(&report, out)?;
            ensure_ok(report.committed, "execute")
        }
    }
}

fn load_eval(path: &Path) -> Result<EvalReport> {
    EvalReport::load(path).with_context(|| format!("Failed to load eval report: {:?}", path))
}

fn load_policy(path: Option<&Path>) -> Result<ClaimPolicy> {
    ClaimPolicy::load(path).context("Failed to load claim policy")
}

/// Print `report` as pretty JSON and optionally persist it.
fn emit<T: Serialize>(report: &T, out: Option<&Path>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    if let Some(path) = out {
        write_json_report(path, report)?;
    }
    Ok(())
}

fn ensure_ok(ok: bool, operation: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        anyhow::bail!("{operation} did not succeed; see the report above")
    }
}
