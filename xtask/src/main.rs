use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use scenario_cache_core::contract::parse_scenario;
use scenario_cache_core::fingerprint::{fingerprint_payload, FingerprintMode};
use scenario_cache_core::storage_keys::{ArtifactNamer, ArtifactPath, ArtifactSet, StorageRoot};
use scenario_cache_core::summary::summarize_csv;
use scenario_cache_lambda::adapters::object_store::{FsObjectStore, ObjectStore};
use scenario_cache_lambda::handlers::pipeline::check_cache;
use serde_json::{json, Value};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the scenario cache workspace",
    long_about = "A unified CLI for CI checks, Lambda packaging and offline\n\
                  inspection of scenario fingerprints, artifact layouts and summaries."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build and package the run Lambda as a bootstrap zip
    ServerlessPackage {
        /// Compilation target triple for the Lambda binary
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
        /// Directory receiving the zip
        #[arg(long, default_value = "dist")]
        out_dir: PathBuf,
    },
    /// Print the fingerprint of a request body file
    Fingerprint {
        /// JSON request body, hashed exactly as stored on disk
        file: PathBuf,
        #[arg(value_enum, long, env = "FINGERPRINT_MODE", default_value_t = ModeArg::Raw)]
        mode: ModeArg,
    },
    /// Validate a request body and print every artifact key it maps to
    Plan {
        file: PathBuf,
        #[arg(value_enum, long, env = "FINGERPRINT_MODE", default_value_t = ModeArg::Raw)]
        mode: ModeArg,
        #[arg(long, env = "SCENARIO_BUCKET", default_value = "local-bucket")]
        bucket: String,
        #[arg(long, env = "SCENARIO_STORAGE_ROOT", default_value = "diseases")]
        storage_root: String,
    },
    /// Check the cache gate for a request body against a local store mirror
    CacheStatus {
        file: PathBuf,
        /// Directory laid out like the bucket
        #[arg(long)]
        store_dir: PathBuf,
        #[arg(value_enum, long, env = "FINGERPRINT_MODE", default_value_t = ModeArg::Raw)]
        mode: ModeArg,
        #[arg(long, env = "SCENARIO_STORAGE_ROOT", default_value = "diseases")]
        storage_root: String,
    },
    /// Summarize a local replicate table and print the JSON summary
    Summarize {
        /// CSV with two metadata columns followed by time points
        file: PathBuf,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting and clippy
    Lint,
    /// Workspace tests
    Test,
    /// Run lint + test
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Raw,
    Canonical,
}

impl From<ModeArg> for FingerprintMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Raw => Self::Raw,
            ModeArg::Canonical => Self::Canonical,
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    exit(1);
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .unwrap_or_else(|error| fail(format!("failed to execute cargo: {error}")))
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn read_file(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap_or_else(|error| fail(format!("failed to read {}: {error}", path.display())))
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(error) => fail(format!("failed to render json: {error}")),
    }
}

// ── packaging ──────────────────────────────────────────────────────

fn package_run_lambda(target: &str, profile: BuildProfile, out_dir: &Path) {
    ensure_rust_target_installed(target);

    step("Build run lambda binary");
    let mut cargo_args = vec![
        "build",
        "-p",
        "scenario_cache_lambda",
        "--target",
        target,
        "--bin",
        "run_lambda",
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package lambda zip artifact");
    let binary_path = Path::new("target")
        .join(target)
        .join(profile.dir_name())
        .join("run_lambda");
    fs::create_dir_all(out_dir)
        .unwrap_or_else(|error| fail(format!("failed to create {}: {error}", out_dir.display())));

    let zip_path = out_dir.join("run_lambda.zip");
    if let Err(error) = package_lambda_zip(&binary_path, &zip_path) {
        fail(error);
    }
    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
}

fn ensure_rust_target_installed(target: &str) {
    let output = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return;
        }
    };

    let installed = String::from_utf8_lossy(&output.stdout);
    if output.status.success() && !installed.lines().any(|line| line.trim() == target) {
        fail(format!(
            "required rust target `{target}` is not installed. install it with `rustup target add {target}`"
        ));
    }
}

fn package_lambda_zip(binary_path: &Path, zip_path: &Path) -> Result<(), String> {
    let binary = fs::read(binary_path).map_err(|error| {
        format!("expected lambda binary at '{}': {error}", binary_path.display())
    })?;
    let file = fs::File::create(zip_path)
        .map_err(|error| format!("failed to create lambda zip: {error}"))?;

    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)
        .map_err(|error| format!("failed to start bootstrap entry: {error}"))?;
    zip.write_all(&binary)
        .map_err(|error| format!("failed to write bootstrap entry: {error}"))?;
    zip.finish()
        .map_err(|error| format!("failed to finish lambda zip: {error}"))?;
    Ok(())
}

// ── offline inspection ─────────────────────────────────────────────

fn plan_json(set: &ArtifactSet, root: &StorageRoot) -> Value {
    let uri = |path: &ArtifactPath| path.storage_uri(root);
    match set {
        ArtifactSet::SthSch(set) => json!({
            "interventionInput": uri(&set.intervention_input),
            "referenceSeries": uri(&set.reference_series),
            "historicalState": uri(&set.historical_state),
            "futureKKSAC": [uri(&set.future_kksac.data), uri(&set.future_kksac.summary)],
            "futureMHISAC": [uri(&set.future_mhisac.data), uri(&set.future_mhisac.summary)],
            "historicalKKSAC": [uri(&set.historical_kksac.data), uri(&set.historical_kksac.summary)],
            "historicalMHISAC": [uri(&set.historical_mhisac.data), uri(&set.historical_mhisac.summary)],
            "manifest": uri(&set.manifest),
        }),
        ArtifactSet::Trachoma(set) => json!({
            "interventionInput": uri(&set.intervention_input),
            "transmissionParams": uri(&set.transmission_params),
            "infectionTrace": uri(&set.infection_trace),
            "historicalState": uri(&set.historical_state),
            "futurePrevalence": [uri(&set.future_prevalence.data), uri(&set.future_prevalence.summary)],
            "historicalPrevalence": [uri(&set.historical_prevalence.data), uri(&set.historical_prevalence.summary)],
            "manifest": uri(&set.manifest),
        }),
    }
}

fn artifact_set_for(file: &Path, mode: FingerprintMode, storage_root: &str) -> (Value, ArtifactSet) {
    let body = read_file(file);
    let payload: Value = serde_json::from_slice(&body)
        .unwrap_or_else(|error| fail(format!("{} is not valid json: {error}", file.display())));
    let request = parse_scenario(&payload).unwrap_or_else(|error| fail(error));
    let fingerprint = fingerprint_payload(&body, mode).unwrap_or_else(|error| fail(error));

    let common = request.common();
    let set = ArtifactNamer::new(storage_root).artifact_set(common.disease, &common.unit, &fingerprint);
    let identity = json!({
        "disease": common.disease.as_str(),
        "iu": common.unit.code(),
        "replicates": common.replicate_count,
        "fingerprint": fingerprint,
    });
    (identity, set)
}

fn plan(file: &Path, mode: FingerprintMode, bucket: &str, storage_root: &str) {
    let (identity, set) = artifact_set_for(file, mode, storage_root);
    let root = StorageRoot::s3(bucket);

    print_json(&json!({
        "scenario": identity,
        "cacheGate": set
            .required_outputs()
            .iter()
            .map(|path| path.storage_uri(&root))
            .collect::<Vec<_>>(),
        "artifacts": plan_json(&set, &root),
    }));
}

fn cache_status(file: &Path, store_dir: &Path, mode: FingerprintMode, storage_root: &str) {
    let (identity, set) = artifact_set_for(file, mode, storage_root);
    let store = FsObjectStore::new(store_dir);
    let required = set.required_outputs();

    let status = check_cache(&store, &required).unwrap_or_else(|error| fail(error));
    let missing: Vec<&str> = required
        .iter()
        .filter(|path| !store.object_exists(path.key()).unwrap_or(false))
        .map(|path| path.key())
        .collect();

    print_json(&json!({
        "scenario": identity,
        "cache": status.as_str(),
        "missing": missing,
        "manifestPresent": store.object_exists(set.manifest().key()).unwrap_or(false),
    }));
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_lint() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);
}

fn ci_test() {
    step("Test scenario_cache_core");
    run_cargo(&["test", "-p", "scenario_cache_core"]);

    step("Test scenario_cache_lambda");
    run_cargo(&["test", "-p", "scenario_cache_lambda"]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { job } => {
            match job {
                CiJob::Lint => ci_lint(),
                CiJob::Test => ci_test(),
                CiJob::Check => {
                    ci_lint();
                    ci_test();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::ServerlessPackage {
            target,
            profile,
            out_dir,
        } => {
            package_run_lambda(&target, profile, &out_dir);
        }
        Commands::Fingerprint { file, mode } => {
            let body = read_file(&file);
            match fingerprint_payload(&body, mode.into()) {
                Ok(fingerprint) => println!("{fingerprint}"),
                Err(error) => fail(error),
            }
        }
        Commands::Plan {
            file,
            mode,
            bucket,
            storage_root,
        } => {
            plan(&file, mode.into(), &bucket, &storage_root);
        }
        Commands::CacheStatus {
            file,
            store_dir,
            mode,
            storage_root,
        } => {
            cache_status(&file, &store_dir, mode.into(), &storage_root);
        }
        Commands::Summarize { file } => {
            let summary = fs::File::open(&file)
                .map_err(|error| format!("failed to open {}: {error}", file.display()))
                .and_then(|reader| summarize_csv(reader).map_err(|error| error.to_string()))
                .unwrap_or_else(|error| fail(error));
            match serde_json::to_value(&summary) {
                Ok(value) => print_json(&value),
                Err(error) => fail(error),
            }
        }
    }
}
