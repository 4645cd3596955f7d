//! Filter builder for DHIS2 metadata queries
//!
//! DHIS2 takes one `filter=<property>:<operator>:<value>` query parameter per
//! condition; multiple filters are combined with AND.

/// A single metadata filter condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq { property: String, value: String },
}

impl Filter {
    pub fn eq(property: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Eq {
            property: property.into(),
            value: value.into(),
        }
    }

    /// Render the value of a `filter=` query parameter
    pub fn to_param(&self) -> String {
        match self {
            Filter::Eq { property, value } => format!("{}:eq:{}", property, value),
        }
    }
}

/// Fields requested for every org unit lookup
pub const ORG_UNIT_FIELDS: &str = "id,name,shortName,code,openingDate,phoneNumber,parent[id]";

/// A complete org unit lookup: filters plus fixed paging/field options
#[derive(Debug, Clone, Default)]
pub struct OrgUnitQuery {
    filters: Vec<Filter>,
}

impl OrgUnitQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_code(code: &str) -> Self {
        Self::new().filter(Filter::eq("code", code))
    }

    pub fn by_name(name: &str, parent_id: Option<&str>) -> Self {
        let query = Self::new().filter(Filter::eq("name", name));
        match parent_id {
            Some(parent) => query.filter(Filter::eq("parent.id", parent)),
            None => query,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Query parameters ready for `reqwest::RequestBuilder::query`
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|f| ("filter".to_string(), f.to_param()))
            .collect();
        params.push(("fields".into(), ORG_UNIT_FIELDS.into()));
        params.push(("paging".into(), "false".into()));
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_rendering() {
        assert_eq!(Filter::eq("code", "ET-1").to_param(), "code:eq:ET-1");
        assert_eq!(Filter::eq("parent.id", "p1").to_param(), "parent.id:eq:p1");
    }

    #[test]
    fn test_name_query_with_parent() {
        let params = OrgUnitQuery::by_name("Bole Health Center", Some("p1")).to_params();
        let filters: Vec<_> = params
            .iter()
            .filter(|(k, _)| k == "filter")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(filters, vec!["name:eq:Bole Health Center", "parent.id:eq:p1"]);
        assert!(params.contains(&("paging".to_string(), "false".to_string())));
    }

    #[test]
    fn test_name_query_without_parent() {
        let params = OrgUnitQuery::by_name("Root", None).to_params();
        let filters: Vec<_> = params.iter().filter(|(k, _)| k == "filter").collect();
        assert_eq!(filters, vec![&("filter".to_string(), "name:eq:Root".to_string())]);
    }
}
