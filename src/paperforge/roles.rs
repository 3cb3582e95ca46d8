//! The four fixed collaboration roles and their backend assignment.
//!
//! A role is static configuration, not an object: the four roles differ only
//! in system prompt, sampling temperature, and output ceiling, so they are
//! modeled as an enum plus a [`RoleConfig`] record. Which backend serves
//! which role is computed once per registry load by
//! [`RoleAssignments::compute`] and cached for the life of the process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::paperforge::registry::BackendRegistry;

/// One of the four fixed collaboration responsibilities.
///
/// The declaration order is load-bearing: round-robin assignment walks
/// [`Role::ALL`] in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    InformationCollector,
    ContentGenerator,
    QualityReviewer,
    StructureOptimizer,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::InformationCollector,
        Role::ContentGenerator,
        Role::QualityReviewer,
        Role::StructureOptimizer,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Role::InformationCollector => "information_collector",
            Role::ContentGenerator => "content_generator",
            Role::QualityReviewer => "quality_reviewer",
            Role::StructureOptimizer => "structure_optimizer",
        }
    }

    /// Static per-role configuration: persona, temperature, output ceiling.
    pub fn config(&self) -> &'static RoleConfig {
        match self {
            Role::InformationCollector => &COLLECTOR_CONFIG,
            Role::ContentGenerator => &GENERATOR_CONFIG,
            Role::QualityReviewer => &REVIEWER_CONFIG,
            Role::StructureOptimizer => &OPTIMIZER_CONFIG,
        }
    }
}

/// Sampling and persona configuration for one role.
pub struct RoleConfig {
    /// System-prompt persona injected ahead of every call for this role.
    pub description: &'static str,
    pub temperature: f64,
    pub max_tokens: u32,
}

static COLLECTOR_CONFIG: RoleConfig = RoleConfig {
    description: "You are an expert research interviewer. You analyze what \
                  is already known about a study, spot the gaps, and ask \
                  focused questions that draw out the missing details.",
    temperature: 0.7,
    max_tokens: 2000,
};

static GENERATOR_CONFIG: RoleConfig = RoleConfig {
    description: "You are an expert academic writer. You turn collected \
                  research information into rigorous, well-structured paper \
                  prose that meets scholarly standards.",
    temperature: 0.8,
    max_tokens: 4000,
};

static REVIEWER_CONFIG: RoleConfig = RoleConfig {
    description: "You are a strict academic peer reviewer. You examine paper \
                  content for logical, linguistic, and scholarly-convention \
                  problems and give concrete improvement advice.",
    temperature: 0.3,
    max_tokens: 3000,
};

static OPTIMIZER_CONFIG: RoleConfig = RoleConfig {
    description: "You are an expert in paper structure. You reorganize \
                  content for logical flow, coherence, and readability.",
    temperature: 0.5,
    max_tokens: 4000,
};

/// Cached role-to-backend mapping.
///
/// The mapping is total whenever at least one backend is registered: with a
/// single backend every role fans out to it, and with several backends role
/// *i* maps to `names[i % len]`, spreading the roles deterministically and
/// repeating backends once roles outnumber them. With zero backends the
/// mapping is empty and every dispatch fails with `NoBackendAvailable`.
#[derive(Clone, Debug, Default)]
pub struct RoleAssignments {
    mapping: HashMap<Role, String>,
}

impl RoleAssignments {
    /// Recompute the mapping from the registry's current contents.
    pub fn compute(registry: &BackendRegistry) -> Self {
        let names = registry.names();
        let mut mapping = HashMap::new();

        if names.is_empty() {
            return RoleAssignments { mapping };
        }

        if names.len() == 1 {
            for role in Role::ALL.iter() {
                mapping.insert(*role, names[0].clone());
            }
            return RoleAssignments { mapping };
        }

        for (i, role) in Role::ALL.iter().enumerate() {
            mapping.insert(*role, names[i % names.len()].clone());
        }
        RoleAssignments { mapping }
    }

    /// Backend name serving `role`, if any backend is registered at all.
    pub fn backend_for(&self, role: Role) -> Option<&str> {
        self.mapping.get(&role).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Role-key to backend-name view for diagnostics endpoints.
    pub fn as_map(&self) -> HashMap<&'static str, String> {
        self.mapping
            .iter()
            .map(|(role, backend)| (role.key(), backend.clone()))
            .collect()
    }
}
