//! Projection of hierarchy nodes and facility records onto org units

use chrono::NaiveDate;

use super::short_name::{default_short_name, short_name_for};
use crate::api::destination::OrgUnit;
use crate::api::registry::FacilityRecord;
use crate::hierarchy::{HierarchyTree, NodeId};

/// Values applied when the source does not provide them
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDefaults {
    /// Display name of the hierarchy root in the destination
    pub root_name: String,
    /// openingDate for hierarchy nodes and facilities without a year opened
    pub opening_date: NaiveDate,
}

impl Default for UnitDefaults {
    fn default() -> Self {
        Self {
            root_name: "Federal Ministry of Health".into(),
            opening_date: NaiveDate::from_ymd_opt(1980, 1, 1).unwrap_or_default(),
        }
    }
}

/// Org unit for a hierarchy node, addressed by `code = node.id`
pub fn hierarchy_unit(
    tree: &HierarchyTree,
    node: NodeId,
    parent_id: Option<String>,
    defaults: &UnitDefaults,
) -> OrgUnit {
    let data = tree.node(node);
    let name = if tree.is_root(node) {
        defaults.root_name.clone()
    } else {
        data.name.clone()
    };
    let short_name = default_short_name(&name);
    OrgUnit::new(name, short_name, data.id.clone(), defaults.opening_date).with_parent(parent_id)
}

/// Org unit for a facility, addressed by `code = national identifier`
pub fn facility_unit(
    record: &FacilityRecord,
    parent_id: Option<String>,
    defaults: &UnitDefaults,
) -> OrgUnit {
    let mut unit = OrgUnit::new(
        record.name.clone(),
        short_name_for(&record.name, record.short_name.as_deref()),
        record.national_identifier.clone(),
        record.year_opened.unwrap_or(defaults.opening_date),
    )
    .with_parent(parent_id);
    if let Some((lat, lng)) = record.coordinates {
        unit.latitude = Some(lat);
        unit.longitude = Some(lng);
    }
    unit.phone_number = record.phone_number.clone();
    unit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::TreeBuilder;
    use serde_json::json;

    #[test]
    fn test_root_uses_fixed_name() {
        let tree = TreeBuilder::new()
            .build(&json!([{"id": "1", "name": "Ethiopia", "sub": [
                {"id": "2", "name": "Afar Regional Health Bureau"}
            ]}]))
            .unwrap();
        let defaults = UnitDefaults::default();

        let root = hierarchy_unit(&tree, tree.root(), None, &defaults);
        assert_eq!(root.name, "Federal Ministry of Health");
        assert_eq!(root.short_name, "FMOH");
        assert_eq!(root.code, "1");
        assert!(root.parent_id.is_none());

        let region = hierarchy_unit(&tree, tree.find("2").unwrap(), Some("rootId".into()), &defaults);
        assert_eq!(region.short_name, "Afar RHB");
        assert_eq!(region.parent_id.as_deref(), Some("rootId"));
    }

    #[test]
    fn test_facility_projection() {
        let record = FacilityRecord {
            id: "9".into(),
            name: "Yekatit 12 Hospital".into(),
            coordinates: Some((9.04, 38.76)),
            admin_hierarchy_code: "12".into(),
            national_identifier: "ET-9".into(),
            year_opened: None,
            short_name: None,
            is_phcu: false,
            parent_phcu_id: None,
            phone_number: Some("+251111".into()),
        };
        let unit = facility_unit(&record, Some("p".into()), &UnitDefaults::default());
        assert_eq!(unit.short_name, "Yekatit 12 HSP");
        assert_eq!(unit.code, "ET-9");
        assert_eq!(unit.opening_date, NaiveDate::from_ymd_opt(1980, 1, 1).unwrap());
        assert_eq!(unit.latitude, Some(9.04));
        assert_eq!(unit.phone_number.as_deref(), Some("+251111"));
    }
}
