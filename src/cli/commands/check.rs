//! Check Command
//!
//! Verifies the fragment store and the LLM backend are reachable.

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::{ErrorCategory, FragmentFilter, LlmError, Result};

pub async fn run(ctx: &CommandContext, output: &Output) -> Result<()> {
    output.section("Fragment store");
    let fragments = ctx.store.query_fragments(&FragmentFilter::all()).await?;
    let documents: std::collections::HashSet<&str> =
        fragments.iter().map(|f| f.fragment.document_id.as_str()).collect();
    output.success(&format!(
        "{} fragments from {} documents in {}",
        fragments.len(),
        documents.len(),
        ctx.config.storage.database.display()
    ));

    output.section("LLM backend");
    let provider = &ctx.provider;
    if provider.health_check().await? {
        output.success(&format!("{} ({}) is reachable", provider.name(), provider.model()));
        Ok(())
    } else {
        output.error(&format!("{} ({}) is not reachable", provider.name(), provider.model()));
        Err(LlmError::with_provider(ErrorCategory::Network, "health check failed", provider.name()).into())
    }
}
