//! Resolution helpers for the polymorphic "amount map" shapes.
//!
//! `amountMap`/`fundAmountMap` values can appear in one of three shapes in
//! the source JSON:
//!
//! 1. `coverageLevelId -> amount|null` (flat)
//! 2. `regionId -> coverageLevelId -> amount|null` (region-partitioned)
//! 3. `statusId -> coverageLevelId -> amount|null` (status-partitioned)
//!
//! `coverageLevelCostsPerPlan` (the premium table) is shaped differently:
//! status is always the leaf, with coverage level always the layer directly
//! above it and an optional region layer above that — `(regionId? ->)
//! coverageLevelId -> statusId -> premium|null`. It gets its own resolver
//! below, [`resolve_premium`], rather than reusing [`resolve_amount`].
//!
//! The nested `amountMap` shapes are structurally identical (`object ->
//! object -> number|null`), so a `#[serde(untagged)]` enum cannot reliably
//! tell them apart — serde would just accept whichever variant it tries
//! first. Instead these maps are kept as raw `serde_json::Value` through
//! deserialization and resolved at lookup time against the known
//! region/status id sets, mirroring the two-layer `resolveAmount(map,
//! region, status, coverageLevel)` lookup the configuration format
//! describes.

use std::collections::HashSet;

use serde_json::Value;

use crate::ids::{CoverageLevelId, RegionId, StatusId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MapShape {
    Flat,
    ByRegion,
    ByStatus,
}

/// Shape-detection order follows the configuration format's stated lookup
/// preference — region, then status, then direct (flat) — so a key set that
/// could coincidentally satisfy more than one interpretation resolves the
/// same way a two-layer `resolveAmount(map, region, status, coverageLevel)`
/// lookup would try them.
fn detect_shape(obj: &serde_json::Map<String, Value>, regions: &HashSet<RegionId>, statuses: &HashSet<StatusId>, coverage_levels: &HashSet<CoverageLevelId>) -> MapShape {
    let keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
    if keys.iter().all(|k| regions.contains(*k)) {
        return MapShape::ByRegion;
    }
    if keys.iter().all(|k| statuses.contains(*k)) {
        return MapShape::ByStatus;
    }
    if keys.iter().all(|k| coverage_levels.contains(*k)) {
        return MapShape::Flat;
    }
    // Ambiguous or malformed input (e.g. an empty map, or keys that match
    // none of the known id sets): fall back to treating it as flat, which
    // is what an empty object resolves to regardless of shape.
    MapShape::Flat
}

/// Looks up `amount` for a `(region, status, coverageLevel)` triple inside a
/// raw amount-map `Value`. Returns `None` both when the map has no entry for
/// the coverage level and when the JSON value at that entry is `null` — the
/// caller is expected to distinguish "not configured" from "explicitly zero"
/// only if that distinction matters to it, since both arrive as `None` here.
pub fn resolve_amount(
    map: &Value,
    regions: &HashSet<RegionId>,
    statuses: &HashSet<StatusId>,
    coverage_levels: &HashSet<CoverageLevelId>,
    region: &RegionId,
    status: &StatusId,
    coverage_level: &CoverageLevelId,
) -> Option<f64> {
    let obj = map.as_object()?;
    match detect_shape(obj, regions, statuses, coverage_levels) {
        MapShape::Flat => obj.get(coverage_level.as_str()).and_then(Value::as_f64),
        MapShape::ByRegion => obj
            .get(region.as_str())
            .and_then(Value::as_object)
            .and_then(|inner| inner.get(coverage_level.as_str()))
            .and_then(Value::as_f64),
        MapShape::ByStatus => obj
            .get(status.as_str())
            .and_then(Value::as_object)
            .and_then(|inner| inner.get(coverage_level.as_str()))
            .and_then(Value::as_f64),
    }
}

/// True if the map has *some* key for the given coverage level under any
/// region/status partition, even if the value stored there is `null`. Used
/// by the validator to tell "coverage level genuinely unconfigured" (an
/// error, per the configuration's stated preference) apart from "configured
/// as explicitly inapplicable."
pub fn has_entry_for_coverage_level(
    map: &Value,
    regions: &HashSet<RegionId>,
    statuses: &HashSet<StatusId>,
    coverage_levels: &HashSet<CoverageLevelId>,
    coverage_level: &CoverageLevelId,
) -> bool {
    let Some(obj) = map.as_object() else {
        return false;
    };
    match detect_shape(obj, regions, statuses, coverage_levels) {
        MapShape::Flat => obj.contains_key(coverage_level.as_str()),
        MapShape::ByRegion | MapShape::ByStatus => obj
            .values()
            .filter_map(Value::as_object)
            .any(|inner| inner.contains_key(coverage_level.as_str())),
    }
}

/// Shape of a `coverageLevelCostsPerPlan` entry: unlike the three
/// `amountMap` shapes above, a premium table always carries *two* levels —
/// employment status is always the leaf, coverage level is always the layer
/// directly above it — with an optional region layer above that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PremiumShape {
    Direct,
    ByRegion,
}

fn detect_premium_shape(obj: &serde_json::Map<String, Value>, regions: &HashSet<RegionId>) -> PremiumShape {
    if !obj.is_empty() && obj.keys().all(|k| regions.contains(k.as_str())) {
        PremiumShape::ByRegion
    } else {
        PremiumShape::Direct
    }
}

/// Looks up a premium at `(region, coverageLevel, status)`. A premium table
/// is never coverage-level-at-the-leaf like an `amountMap` — it's always
/// `(region? ->) coverageLevelId -> statusId -> premium|null` — so it needs
/// its own resolver rather than reusing [`resolve_amount`].
pub fn resolve_premium(map: &Value, regions: &HashSet<RegionId>, region: &RegionId, coverage_level: &CoverageLevelId, status: &StatusId) -> Option<f64> {
    let obj = map.as_object()?;
    let level_obj = match detect_premium_shape(obj, regions) {
        PremiumShape::ByRegion => obj.get(region.as_str())?.as_object()?.get(coverage_level.as_str())?.as_object()?,
        PremiumShape::Direct => obj.get(coverage_level.as_str())?.as_object()?,
    };
    level_obj.get(status.as_str()).and_then(Value::as_f64)
}

/// True if the premium table has *some* key for `(coverageLevel, status)`
/// under every region partition it declares (or directly, if it declares
/// none), even if the value stored there is `null`. Mirrors
/// [`has_entry_for_coverage_level`]'s "configured vs. genuinely missing"
/// distinction, but for the premium table's own shape.
pub fn has_premium_entry(map: &Value, regions: &HashSet<RegionId>, coverage_level: &CoverageLevelId, status: &StatusId) -> bool {
    let Some(obj) = map.as_object() else {
        return false;
    };
    let has_status = |level_obj: &serde_json::Map<String, Value>| level_obj.contains_key(status.as_str());
    match detect_premium_shape(obj, regions) {
        PremiumShape::Direct => obj.get(coverage_level.as_str()).and_then(Value::as_object).is_some_and(has_status),
        PremiumShape::ByRegion => obj
            .values()
            .filter_map(Value::as_object)
            .any(|region_obj| region_obj.get(coverage_level.as_str()).and_then(Value::as_object).is_some_and(has_status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids() -> (HashSet<RegionId>, HashSet<StatusId>, HashSet<CoverageLevelId>) {
        let regions = ["CA", "AZ"].iter().map(|s| RegionId::from(*s)).collect();
        let statuses = ["fullTime", "partTime"].iter().map(|s| StatusId::from(*s)).collect();
        let levels = ["employeeOnly", "family"].iter().map(|s| CoverageLevelId::from(*s)).collect();
        (regions, statuses, levels)
    }

    #[test]
    fn resolves_flat_shape() {
        let (regions, statuses, levels) = ids();
        let map = json!({ "employeeOnly": 100.0, "family": 300.0 });
        let amount = resolve_amount(
            &map,
            &regions,
            &statuses,
            &levels,
            &RegionId::from("CA"),
            &StatusId::from("fullTime"),
            &CoverageLevelId::from("family"),
        );
        assert_eq!(amount, Some(300.0));
    }

    #[test]
    fn resolves_by_region_shape() {
        let (regions, statuses, levels) = ids();
        let map = json!({
            "CA": { "employeeOnly": 100.0, "family": 300.0 },
            "AZ": { "employeeOnly": 90.0, "family": 250.0 },
        });
        let amount = resolve_amount(
            &map,
            &regions,
            &statuses,
            &levels,
            &RegionId::from("AZ"),
            &StatusId::from("fullTime"),
            &CoverageLevelId::from("employeeOnly"),
        );
        assert_eq!(amount, Some(90.0));
    }

    #[test]
    fn resolves_by_status_shape() {
        let (regions, statuses, levels) = ids();
        let map = json!({
            "fullTime": { "employeeOnly": 100.0 },
            "partTime": { "employeeOnly": 50.0 },
        });
        let amount = resolve_amount(
            &map,
            &regions,
            &statuses,
            &levels,
            &RegionId::from("CA"),
            &StatusId::from("partTime"),
            &CoverageLevelId::from("employeeOnly"),
        );
        assert_eq!(amount, Some(50.0));
    }

    #[test]
    fn missing_entry_is_none() {
        let (regions, statuses, levels) = ids();
        let map = json!({ "employeeOnly": 100.0 });
        let amount = resolve_amount(
            &map,
            &regions,
            &statuses,
            &levels,
            &RegionId::from("CA"),
            &StatusId::from("fullTime"),
            &CoverageLevelId::from("family"),
        );
        assert_eq!(amount, None);
    }

    #[test]
    fn resolves_premium_by_status_not_coverage_level() {
        let (regions, _, _) = ids();
        // Direct shape: coverageLevel -> status -> premium. Two statuses at
        // the same coverage level must resolve to different amounts.
        let map = json!({
            "employeeOnly": { "fullTime": 936.0, "partTime": 468.0 },
            "family": { "fullTime": 2100.0, "partTime": 1050.0 },
        });
        assert_eq!(
            resolve_premium(&map, &regions, &RegionId::from("CA"), &CoverageLevelId::from("employeeOnly"), &StatusId::from("fullTime")),
            Some(936.0)
        );
        assert_eq!(
            resolve_premium(&map, &regions, &RegionId::from("CA"), &CoverageLevelId::from("employeeOnly"), &StatusId::from("partTime")),
            Some(468.0)
        );
    }

    #[test]
    fn resolves_premium_by_region_then_status() {
        let (regions, _, _) = ids();
        let map = json!({
            "CA": { "employeeOnly": { "fullTime": 936.0 }, "family": { "fullTime": 2100.0 } },
            "AZ": { "employeeOnly": { "fullTime": 800.0 }, "family": { "fullTime": 1900.0 } },
        });
        assert_eq!(
            resolve_premium(&map, &regions, &RegionId::from("AZ"), &CoverageLevelId::from("employeeOnly"), &StatusId::from("fullTime")),
            Some(800.0)
        );
    }

    #[test]
    fn premium_missing_status_entry_is_none() {
        let (regions, _, _) = ids();
        let map = json!({ "employeeOnly": { "fullTime": 936.0 } });
        assert_eq!(
            resolve_premium(&map, &regions, &RegionId::from("CA"), &CoverageLevelId::from("employeeOnly"), &StatusId::from("partTime")),
            None
        );
    }

    #[test]
    fn has_premium_entry_checks_status_under_coverage_level() {
        let (regions, _, _) = ids();
        let map = json!({ "employeeOnly": { "fullTime": 936.0 } });
        assert!(has_premium_entry(&map, &regions, &CoverageLevelId::from("employeeOnly"), &StatusId::from("fullTime")));
        assert!(!has_premium_entry(&map, &regions, &CoverageLevelId::from("employeeOnly"), &StatusId::from("partTime")));
        assert!(!has_premium_entry(&map, &regions, &CoverageLevelId::from("family"), &StatusId::from("fullTime")));
    }
}
