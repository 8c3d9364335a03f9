//! Languages command: list the registry with toolchain status.

use coderun_core::{AvailabilityProber, ToolchainRegistry};

use crate::colors;

pub fn execute() {
    let registry = ToolchainRegistry::builtin();
    let prober = AvailabilityProber::new();

    println!("\n{}Supported languages{}", colors::BOLD, colors::RESET);
    println!("{}", "─".repeat(60));

    for profile in registry.profiles() {
        let kind = if profile.is_compiled() {
            "compiled"
        } else {
            "interpreted"
        };
        let status = match prober.missing_binary(profile) {
            None => format!("{}✓ available{}", colors::GREEN, colors::RESET),
            Some(binary) => format!("{}✗ missing `{}`{}", colors::RED, binary, colors::RESET),
        };
        println!(
            "  {}{:<11}{} {:<5} {}{:<11}{} {}",
            colors::CYAN,
            profile.id(),
            colors::RESET,
            profile.extension(),
            colors::DIM,
            kind,
            colors::RESET,
            status
        );
    }
    println!();
}
