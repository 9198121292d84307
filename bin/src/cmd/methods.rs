//! Methods command implementation.

use makro_portfolio::PortfolioMethod;
use makro_transform::{LegacyMethod, StandardizationMethod};

/// List the method names accepted in configuration files.
pub(crate) fn run() {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                     Available Methods                        ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Standardization (scoring.method):");
    println!("{}", "-".repeat(60));
    for method in StandardizationMethod::ALL {
        let marker = if method == StandardizationMethod::default() {
            " (default)"
        } else {
            ""
        };
        println!("  {method}{marker}");
    }
    println!();

    println!("Per-series standardization:");
    println!("{}", "-".repeat(60));
    for name in LegacyMethod::NAMES {
        println!("  {name}");
    }
    println!();

    println!("Allocation (portfolio.method):");
    println!("{}", "-".repeat(60));
    for method in PortfolioMethod::ALL {
        let marker = if method == PortfolioMethod::default() {
            " (default)"
        } else {
            ""
        };
        println!("  {method}{marker}");
    }
    println!();
}
