//! Human-readable output. Progress goes to stderr, results to stdout.

use lmi_core::{ModuleKind, ModuleStatus, ValidationResult};
use lmi_pipeline::{ModuleInfo, ModuleProgress, PipelineRun};

pub(crate) fn print_modules(modules: &[ModuleInfo]) {
    println!("{:<10} {:<30} {:<10} REASON", "MODULE", "NAME", "AVAILABLE");
    for module in modules {
        println!(
            "{:<10} {:<30} {:<10} {}",
            module.name,
            module.display_name,
            if module.available { "yes" } else { "no" },
            module.unavailability_reason.as_deref().unwrap_or("-"),
        );
    }
}

pub(crate) fn print_validation(kind: ModuleKind, validation: &ValidationResult) {
    if validation.is_valid() {
        println!("{kind}: inputs are valid");
        return;
    }
    eprintln!("{kind}: inputs are invalid");
    for error in validation.errors() {
        eprintln!("  {}: {}", error.field, error.message);
    }
}

pub(crate) fn print_progress(progress: &ModuleProgress) {
    eprintln!("[{}] {}", status_tag(progress.status), progress.message);
}

pub(crate) fn print_run(run: &PipelineRun) {
    println!("run:     {}", run.run_id);
    println!("topic:   {}", run.topic);
    println!("status:  {}", run.status);
    println!(
        "output:  {}",
        run.output_url.as_deref().unwrap_or("(not created)")
    );
    if let Some(folder) = run.output_folder_url.as_deref() {
        println!("folder:  {folder}");
    }

    println!();
    for progress in &run.progress {
        println!(
            "  {:<10} {:<10} {}",
            progress.name,
            progress.status.as_str(),
            progress.message
        );
        if let Some(result) = progress.result.as_ref() {
            for warning in &result.warnings {
                println!("  {:<10} {:<10} warning: {warning}", "", "");
            }
        }
    }

    if !run.errors.is_empty() {
        println!();
        println!("errors:");
        for error in &run.errors {
            println!("  - {error}");
        }
    }
}

fn status_tag(status: ModuleStatus) -> &'static str {
    match status {
        ModuleStatus::Pending => "pending",
        ModuleStatus::Running => "....",
        ModuleStatus::Completed => " ok ",
        ModuleStatus::Partial => "part",
        ModuleStatus::Failed => "FAIL",
    }
}
