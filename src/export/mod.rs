//! Export an existing Prism customer as Terraform configuration
//!
//! Fetches every object through [`PrismApi`], renders `.tf` files plus an
//! `import.sh` that adopts the existing objects into Terraform state, and
//! writes them through the context's filesystem.

pub mod fetch;
pub mod generator;
pub mod naming;

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::client::PrismApi;
use crate::context::Context;

pub use fetch::{Inventory, fetch_all};
pub use generator::{GenerateOptions, GeneratedFile, Generator, extract_variables};

/// What one export produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportSummary {
    pub accounts: usize,
    pub permission_sets: usize,
    pub users: usize,
    pub groups: usize,
    pub memberships: usize,
    pub assignment_rows: usize,
    pub variables: usize,
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

pub struct Exporter<'a> {
    ctx: &'a Context,
    api: &'a dyn PrismApi,
    region: Option<String>,
}

impl<'a> Exporter<'a> {
    pub fn new(ctx: &'a Context, api: &'a dyn PrismApi) -> Self {
        Self {
            ctx,
            api,
            region: None,
        }
    }

    /// Region to pin in the generated provider block
    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    pub fn run(&self, output_dir: &Path) -> Result<ExportSummary> {
        self.run_at(output_dir, Utc::now())
    }

    pub fn run_at(&self, output_dir: &Path, generated_at: DateTime<Utc>) -> Result<ExportSummary> {
        let output = self.ctx.output.as_ref();

        self.ctx
            .fs
            .create_dir_all(output_dir)
            .context("Failed to create output directory")?;

        output.section("Fetching infrastructure data");
        let inventory = fetch_all(self.api, output)?;

        output.section("Generating Terraform files");
        let variables = extract_variables(&inventory);
        tracing::debug!(count = variables.len(), "extracted account variables");

        let generator = Generator::new()?;
        let files = generator.generate(
            &inventory,
            &variables,
            &GenerateOptions {
                generated_at,
                region: self.region.clone(),
            },
        )?;

        let mut written = Vec::with_capacity(files.len());
        for file in &files {
            let path = output_dir.join(file.name);
            self.ctx.fs.write(&path, &file.contents)?;
            if file.executable {
                self.ctx.fs.set_executable(&path)?;
            }
            output.dimmed(&format!("  Created: {}", path.display()));
            written.push(path);
        }

        Ok(ExportSummary {
            accounts: inventory.accounts.len(),
            permission_sets: inventory.permission_sets.len(),
            users: inventory.users.len(),
            groups: inventory.groups.len(),
            memberships: inventory
                .memberships
                .values()
                .filter(|members| !members.is_empty())
                .count(),
            assignment_rows: inventory.assignments.len(),
            variables: variables.len(),
            files: written,
            warnings: inventory.warnings,
        })
    }
}
