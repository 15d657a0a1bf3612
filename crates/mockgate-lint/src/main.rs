//! Mockgate fixture linter CLI
//!
//! Validates fixture files before tests load them into a scope.
//!
//! Usage:
//!   mockgate-lint <directory_or_file> [OPTIONS]

use clap::{Parser, ValueEnum};
use mockgate_lint::{fixture_files, lint_file, LintIssue, LintOptions, LintResult, Severity};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Mockgate Fixture Linter
#[derive(Parser, Debug)]
#[command(name = "mockgate-lint")]
#[command(author, version, about = "Validate Mockgate fixture files")]
struct Args {
    /// Path to a fixture file or a directory containing fixture files
    #[arg(required = true)]
    path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Only show errors (hide warnings)
    #[arg(short = 'e', long)]
    errors_only: bool,

    /// Strict mode - treat warnings as errors
    #[arg(short, long)]
    strict: bool,

    /// Accept `exact` URLs without scheme and host
    #[arg(long)]
    allow_relative: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let options = LintOptions {
        require_absolute_urls: !args.allow_relative,
    };

    let files = match collect_fixture_files(&args.path) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("{RED}Error:{RESET} cannot read {}: {e}", args.path.display());
            return ExitCode::from(2);
        }
    };

    let text = args.output == OutputFormat::Text;
    if text {
        println!("{BOLD}{CYAN}Mockgate Fixture Linter{RESET}");
        println!("{DIM}{RULE}{RESET}");
    }

    if files.is_empty() {
        if text {
            println!(
                "{YELLOW}Warning:{RESET} No fixture files found in {}",
                args.path.display()
            );
        }
        return ExitCode::SUCCESS;
    }

    if text {
        println!("{DIM}Scanning:{RESET} {CYAN}{}{RESET}", args.path.display());
        println!(
            "{DIM}Found:{RESET}    {BOLD}{}{RESET} fixture file(s)\n",
            files.len()
        );
    }

    let mut result = LintResult::new();
    for file in &files {
        result.merge(lint_file(file, &options));
    }

    match args.output {
        OutputFormat::Json => print_results_json(&result),
        OutputFormat::Text => print_results(&result, &args),
    }

    let failed = result.errors > 0 || (args.strict && result.warnings > 0);
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn collect_fixture_files(path: &Path) -> Result<Vec<PathBuf>, mockgate_lint::LintError> {
    if path.is_file() {
        // An explicitly named file is linted whatever its extension
        return Ok(vec![path.to_path_buf()]);
    }
    fixture_files(path)
}

fn print_results_json(result: &LintResult) {
    match serde_json::to_string_pretty(result) {
        Ok(output) => println!("{output}"),
        Err(e) => eprintln!("{RED}Error serializing results: {e}{RESET}"),
    }
}

fn print_results(result: &LintResult, args: &Args) {
    println!();

    if result.issues.is_empty() {
        println!("{GREEN}{BOLD}No issues found!{RESET}");
    } else {
        let mut issues_by_file: BTreeMap<&PathBuf, Vec<&LintIssue>> = BTreeMap::new();
        for issue in &result.issues {
            if args.errors_only && issue.severity != Severity::Error {
                continue;
            }
            issues_by_file.entry(&issue.file).or_default().push(issue);
        }

        for (file, issues) in issues_by_file {
            print_file_issues(file, &issues);
        }
    }

    println!("{DIM}{RULE}{RESET}");
    println!("{BOLD}{CYAN}Summary{RESET}");
    println!("{DIM}{RULE}{RESET}");
    println!(
        "  {DIM}Files checked:{RESET} {BOLD}{}{RESET}",
        result.files_checked
    );

    if result.errors > 0 {
        println!(
            "  {RED}Errors:{RESET}    {BOLD}{RED}{}{RESET}",
            result.errors
        );
    } else {
        println!("  {GREEN}Errors:{RESET}    {BOLD}{GREEN}0{RESET}");
    }

    if result.warnings > 0 {
        println!(
            "  {YELLOW}Warnings:{RESET}  {BOLD}{YELLOW}{}{RESET}",
            result.warnings
        );
    } else {
        println!("  {DIM}Warnings:{RESET}  {BOLD}0{RESET}");
    }

    println!();

    if result.errors == 0 && result.warnings == 0 {
        println!("{GREEN}{BOLD}All checks passed!{RESET}");
    } else if result.errors == 0 {
        println!("{YELLOW}{BOLD}Passed with warnings{RESET}");
    } else {
        println!("{RED}{BOLD}Linting failed with errors{RESET}");
    }
}

fn print_file_issues(file: &Path, issues: &[&LintIssue]) {
    let file_errors = issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .count();
    let file_warnings = issues.len() - file_errors;

    let status_indicator = if file_errors > 0 {
        format!("{RED}FAIL{RESET}")
    } else {
        format!("{YELLOW}WARN{RESET}")
    };

    let mut counts = Vec::new();
    if file_errors > 0 {
        counts.push(format!("{RED}{file_errors} error(s){RESET}"));
    }
    if file_warnings > 0 {
        counts.push(format!("{YELLOW}{file_warnings} warning(s){RESET}"));
    }
    let separator = format!("{DIM}, ");
    let counts = counts.join(separator.as_str());

    let file_name = file.file_name().unwrap_or_default().to_string_lossy();
    println!("{status_indicator} {BOLD}{CYAN}{file_name}{RESET} {DIM}({counts}{DIM}){RESET}");

    for issue in issues {
        let color = severity_color(issue.severity);
        let marker = format!("{color}|{RESET}");

        let location = issue
            .location
            .as_ref()
            .map(|l| format!("{DIM}[{RESET}{CYAN}{l}{RESET}{DIM}]{RESET} "))
            .unwrap_or_default();

        println!(
            "  {marker} {location}{BOLD}{color}{}{RESET}: {} {DIM}({color}{}{DIM}){RESET}",
            issue.severity.label(),
            issue.message,
            issue.code
        );

        if let Some(suggestion) = &issue.suggestion {
            println!("  {marker}   {GREEN}-> {suggestion}{RESET}");
        }
    }
    println!();
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
    }
}
