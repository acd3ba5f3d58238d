use std::collections::HashSet;

use cosecha_config::Settings;
use cosecha_db::models::RoleCode;
use serde::Serialize;

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    pub max_users: u32,
    pub max_fields: u32,
}

#[derive(Debug, Clone)]
struct Plan {
    id: String,
    rank: u32,
    limits: PlanLimits,
}

/// Plan table and seat rules. Built once from configuration.
#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    /// Sorted lowest tier first.
    plans: Vec<Plan>,
    countable: HashSet<RoleCode>,
}

impl QuotaPolicy {
    pub fn from_settings(settings: &Settings) -> ServiceResult<Self> {
        let plans: Vec<Plan> = settings
            .plans
            .iter()
            .map(|(id, plan)| Plan {
                id: id.clone(),
                rank: plan.rank,
                limits: PlanLimits {
                    max_users: plan.max_users,
                    max_fields: plan.max_fields,
                },
            })
            .collect();

        let countable = settings
            .tenancy
            .countable_roles
            .iter()
            .map(|code| {
                code.parse::<RoleCode>()
                    .map_err(|e| ServiceError::Validation(e.to_string()))
            })
            .collect::<ServiceResult<HashSet<_>>>()?;

        Self::new(plans, countable)
    }

    fn new(mut plans: Vec<Plan>, mut countable: HashSet<RoleCode>) -> ServiceResult<Self> {
        if plans.is_empty() {
            return Err(ServiceError::Validation("no plans configured".to_string()));
        }
        if let Some(plan) = plans.iter().find(|p| p.limits.max_users == 0) {
            return Err(ServiceError::Validation(format!(
                "plan {} must allow at least one user",
                plan.id
            )));
        }
        plans.sort_by(|a, b| {
            (a.rank, a.limits.max_users, a.limits.max_fields, &a.id).cmp(&(
                b.rank,
                b.limits.max_users,
                b.limits.max_fields,
                &b.id,
            ))
        });
        // The owner never consumes a seat.
        countable.remove(&RoleCode::Owner);

        Ok(Self { plans, countable })
    }

    fn lowest(&self) -> &Plan {
        &self.plans[0]
    }

    /// Resolves a plan id, falling back to the lowest tier for unknown ids.
    pub fn resolve(&self, plan: &str) -> (&str, PlanLimits) {
        let found = self
            .plans
            .iter()
            .find(|p| p.id == plan)
            .unwrap_or_else(|| self.lowest());
        (found.id.as_str(), found.limits)
    }

    pub fn plan_limits(&self, plan: &str) -> PlanLimits {
        self.resolve(plan).1
    }

    pub fn is_known(&self, plan: &str) -> bool {
        self.plans.iter().any(|p| p.id == plan)
    }

    pub fn is_countable(&self, role: RoleCode) -> bool {
        self.countable.contains(&role)
    }
}
