//! Running budgets: the per-person/per-family deductible, out-of-pocket,
//! and combined-limit trackers a single plan evaluation spends from.
//!
//! Every budget enforces `used + available == cap` and `available >= 0` by
//! construction — [`GroupBudget::consume`] only ever subtracts up to what's
//! left, never less than zero.

use std::collections::HashMap;

use crate::config::marker::LimitGroupFamily;
use crate::ids::{CategoryId, CombinedLimitId, CoverageLevelId, GroupId, RegionId, StatusId};
use crate::money::Cents;

#[derive(Debug, Clone, Copy)]
pub struct GroupBudget {
    pub cap: Cents,
    pub available: Cents,
}

impl GroupBudget {
    pub fn new(cap: Cents) -> Self {
        GroupBudget { cap, available: cap }
    }

    pub fn unlimited() -> Self {
        GroupBudget { cap: Cents::MAX, available: Cents::MAX }
    }

    pub fn used(&self) -> Cents {
        self.cap.saturating_sub(self.available)
    }

    /// Consumes up to `amount`, clamped by what remains. Returns the
    /// amount actually consumed.
    pub fn consume(&mut self, amount: Cents) -> Cents {
        let actual = amount.min(self.available);
        self.available = self.available.saturating_sub(actual);
        actual
    }
}

/// The resolved group budgets for one limit-group family (e.g. a plan's
/// `personDeductibles`), scoped to one household member or the family as a
/// whole.
#[derive(Debug, Clone)]
pub struct GroupBudgets {
    groups: HashMap<GroupId, GroupBudget>,
}

pub struct LookupContext<'a> {
    pub regions: &'a std::collections::HashSet<RegionId>,
    pub statuses: &'a std::collections::HashSet<StatusId>,
    pub levels: &'a std::collections::HashSet<CoverageLevelId>,
    pub region: &'a RegionId,
    pub status: &'a StatusId,
    pub level: &'a CoverageLevelId,
}

impl GroupBudgets {
    pub fn from_family(family: &LimitGroupFamily, ctx: &LookupContext) -> Self {
        let groups = family
            .groups
            .iter()
            .map(|(group_id, group)| {
                let cap = group.amount_for(ctx.regions, ctx.statuses, ctx.levels, ctx.region, ctx.status, ctx.level);
                (group_id.clone(), GroupBudget::new(cap))
            })
            .collect();
        GroupBudgets { groups }
    }

    /// The budget backing `category`, via the family's category→group
    /// assignment. `None` when the family itself was never configured on
    /// the plan (the category simply isn't tracked by it).
    pub fn budget_for(&mut self, family: &LimitGroupFamily, category: &CategoryId) -> Option<&mut GroupBudget> {
        let group_id = family.category_group.get(category)?;
        self.groups.get_mut(group_id)
    }

    pub fn group(&self, group_id: &GroupId) -> Option<&GroupBudget> {
        self.groups.get(group_id)
    }
}

/// All running budgets for a single plan evaluation across a whole
/// household: per-person and family deductible/OOP group budgets, plus
/// person/family budgets for every configured combined limit.
pub struct PlanBudgets {
    pub person_deductible: Vec<GroupBudgets>,
    pub family_deductible: GroupBudgets,
    pub person_oop: Vec<GroupBudgets>,
    pub family_oop: GroupBudgets,
    pub person_combined: Vec<HashMap<CombinedLimitId, GroupBudget>>,
    pub family_combined: HashMap<CombinedLimitId, GroupBudget>,
}

impl PlanBudgets {
    pub fn new(
        plan: &crate::config::marker::PreparedPlan,
        combined_limits: &HashMap<CombinedLimitId, crate::config::marker::PreparedCombinedLimit>,
        member_count: usize,
        ctx: &LookupContext,
    ) -> Self {
        let person_deductible = (0..member_count).map(|_| GroupBudgets::from_family(&plan.person_deductibles, ctx)).collect();
        let family_deductible = GroupBudgets::from_family(&plan.family_deductibles, ctx);
        let person_oop = (0..member_count).map(|_| GroupBudgets::from_family(&plan.person_oop, ctx)).collect();
        let family_oop = GroupBudgets::from_family(&plan.family_oop, ctx);

        let person_combined = (0..member_count)
            .map(|_| {
                combined_limits
                    .iter()
                    .map(|(id, limit)| (id.clone(), GroupBudget::new(limit.person_reimburse_limit.unwrap_or(Cents::MAX))))
                    .collect()
            })
            .collect();
        let family_combined = combined_limits
            .iter()
            .map(|(id, limit)| (id.clone(), GroupBudget::new(limit.family_reimburse_limit.unwrap_or(Cents::MAX))))
            .collect();

        PlanBudgets { person_deductible, family_deductible, person_oop, family_oop, person_combined, family_combined }
    }
}
