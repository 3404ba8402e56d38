//! The `codegate init` command.

use std::path::Path;

use anyhow::{Context, Result};

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("codegate.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("catalog").context("failed to create catalog directory")?;
    write_if_missing(Path::new("catalog/example.toml"), EXAMPLE_CATALOG)?;

    println!("\nNext steps:");
    println!("  1. Set ANTHROPIC_API_KEY or edit codegate.toml");
    println!("  2. Run: codegate validate --catalog catalog/example.toml");
    println!("  3. Run: codegate review --catalog catalog --task two-sum --file solution.rs");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# codegate configuration

default_provider = "anthropic"
default_model = "claude-sonnet-4-20250514"
temperature = 0.0
timeout_secs = 10
max_code_chars = 50000
data_dir = ".codegate"

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

# Offline reviewer that always returns the same assessment.
[providers.offline]
type = "mock"
"#;

const EXAMPLE_CATALOG: &str = r#"[catalog]
id = "example"
name = "Example Challenges"
description = "A couple of challenges to get started"
default_xp = 100

[[challenges]]
id = "two-sum"
title = "Two sum"
description = "Find two indices whose values add up to a target"
requirements = [
    "Return the indices of the two numbers that add up to the target",
    "Run in linear time",
    "Handle inputs with no solution without panicking",
]

[[challenges]]
id = "stale-cache"
title = "Stale reads after deploy"
description = "Users see outdated prices after every deploy. Find and fix the invalidation bug."
kind = "production_incident"
xp = 250
requirements = [
    "Invalidate cached prices when the catalog version changes",
    "Do not add more than one extra lookup per request",
]
"#;
