//! Read-only inspection of what the registry holds.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::registry::{Registry, RegistryStats};

#[derive(Debug, Serialize)]
pub struct ResourceSummary {
    pub uri: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RegistrySummary {
    pub stats: RegistryStats,
    pub tools: Vec<String>,
    pub resources: Vec<ResourceSummary>,
    pub prompts: Vec<String>,
}

impl RegistrySummary {
    pub fn of(registry: &Registry) -> Self {
        Self {
            stats: registry.stats(),
            tools: registry.all_tools().iter().map(|t| t.name.clone()).collect(),
            resources: registry
                .all_resources()
                .iter()
                .map(|r| ResourceSummary { uri: r.uri.clone(), name: r.name.clone() })
                .collect(),
            prompts: registry.all_prompts().iter().map(|p| p.name.clone()).collect(),
        }
    }
}

pub async fn summary(State(registry): State<Arc<Registry>>) -> Json<RegistrySummary> {
    tracing::debug!("registry summary requested");
    Json(RegistrySummary::of(&registry))
}
