use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the table drain workspace",
    long_about = "A unified CLI for running a local drain and the CI checks\n\
                  of the table drain workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drain a DynamoDB table once from this machine
    Drain {
        /// Table to empty
        #[arg(long, env = "DRAIN_TABLE_NAME")]
        table_name: String,
        /// Alternate endpoint, e.g. http://localhost:8000 for DynamoDB Local
        #[arg(long, env = "AWS_ENDPOINT_URL")]
        endpoint_url: Option<String>,
        /// Records per scan page
        #[arg(long)]
        page_limit: Option<u32>,
    },
    /// Run the test suites of every crate
    Test,
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::All)]
        job: CiJob,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting and clippy
    Check,
    /// Unit and integration tests
    Test,
    /// Run check + test
    All,
}

const TEST_PACKAGES: &[&str] = &["table_drain_core", "table_drain_lambda"];

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str], envs: &[(&str, &str)]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .envs(envs.iter().copied())
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    run_cargo_with_env(args, &[]);
}

fn run_cargo_with_env(args: &[&str], envs: &[(&str, &str)]) {
    let status = cargo(args, envs);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn drain_table(table_name: &str, endpoint_url: Option<&str>, page_limit: Option<u32>) {
    step(&format!("Drain table {table_name}"));

    let page_limit = page_limit.map(|limit| limit.to_string());
    let mut envs = vec![("DRAIN_TABLE_NAME", table_name)];
    if let Some(url) = endpoint_url {
        envs.push(("AWS_ENDPOINT_URL", url));
    }
    if let Some(limit) = page_limit.as_deref() {
        envs.push(("DRAIN_PAGE_LIMIT", limit));
    }

    run_cargo_with_env(
        &[
            "run",
            "-p",
            "table_drain_lambda",
            "--bin",
            "drain_table",
            "--release",
        ],
        &envs,
    );
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
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
    for package in TEST_PACKAGES {
        step(&format!("Test {package}"));
        run_cargo(&["test", "-p", *package]);
    }
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Drain {
            table_name,
            endpoint_url,
            page_limit,
        } => {
            drain_table(&table_name, endpoint_url.as_deref(), page_limit);
        }
        Commands::Test => ci_test(),
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Test => ci_test(),
                CiJob::All => {
                    ci_check();
                    ci_test();
                }
            }
            eprintln!("\nCI job passed.");
        }
    }
}
