//! Registry listing filters and the flattened, one-row-per-requirement view.

use regex::{Regex, RegexBuilder};

use crate::domain::{Attributes, Registry, RequirementId, RequirementStatus};

/// Filter value meaning "no constraint".
pub const ALL: &str = "All";

/// Narrowing criteria for [`Workflow::list_registries`](crate::Workflow::list_registries).
///
/// Every field is optional; a missing field or the value `"All"` matches
/// everything. `owner` matches the registry owner exactly. `country`,
/// `template`, `client` and `jurisdiction` match exactly against the attribute
/// of that name (compared case-insensitively) on any requirement.
/// `text_query` matches case-insensitively anywhere in the registry name or
/// in any attribute value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryFilter {
    /// Exact match on the `Country` attribute.
    pub country: Option<String>,
    /// Exact match on the `Template` attribute.
    pub template: Option<String>,
    /// Exact match on the registry owner.
    pub owner: Option<String>,
    /// Exact match on the `Client` attribute.
    pub client: Option<String>,
    /// Exact match on the `Jurisdiction` attribute.
    pub jurisdiction: Option<String>,
    /// Case-insensitive substring search.
    pub text_query: Option<String>,
}

impl RegistryFilter {
    /// Compiles the filter into a matcher.
    #[must_use]
    pub fn matcher(&self) -> Matcher<'_> {
        let text = active(self.text_query.as_ref()).map(|query| {
            RegexBuilder::new(&regex::escape(query))
                .case_insensitive(true)
                .build()
                .expect("escaped literal is always a valid pattern")
        });
        Matcher { filter: self, text }
    }
}

/// A [`RegistryFilter`] ready to be applied.
#[derive(Debug)]
pub struct Matcher<'a> {
    filter: &'a RegistryFilter,
    text: Option<Regex>,
}

impl Matcher<'_> {
    /// Whether the registry passes every active criterion.
    #[must_use]
    pub fn matches(&self, registry: &Registry) -> bool {
        let filter = self.filter;

        if active(filter.owner.as_ref()).is_some_and(|owner| registry.owner() != owner) {
            return false;
        }

        let attribute_filters = [
            ("Country", &filter.country),
            ("Template", &filter.template),
            ("Client", &filter.client),
            ("Jurisdiction", &filter.jurisdiction),
        ];
        for (attribute, value) in attribute_filters {
            if let Some(value) = active(value.as_ref()) {
                let found = registry
                    .requirements()
                    .iter()
                    .any(|r| r.attribute_ignore_case(attribute) == Some(value));
                if !found {
                    return false;
                }
            }
        }

        self.text.as_ref().is_none_or(|text| {
            text.is_match(registry.name())
                || registry
                    .requirements()
                    .iter()
                    .flat_map(|r| r.attributes().values())
                    .any(|value| text.is_match(value))
        })
    }
}

fn active(value: Option<&String>) -> Option<&str> {
    value
        .map(String::as_str)
        .filter(|v| !v.is_empty() && *v != ALL)
}

/// One requirement, denormalised for tabular display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRow {
    /// Name of the owning registry.
    pub registry_name: String,
    /// Requirement id.
    pub requirement_id: RequirementId,
    /// Requirement owner.
    pub owner: String,
    /// Requirement status.
    pub status: RequirementStatus,
    /// Number of row- and cell-level comments on the requirement.
    pub comment_count: usize,
    /// The requirement's attributes.
    pub attributes: Attributes,
}

/// Produces one row per requirement across the given registries, in
/// registry order then requirement order.
pub fn flatten<'a>(registries: impl IntoIterator<Item = &'a Registry>) -> Vec<FlatRow> {
    registries
        .into_iter()
        .flat_map(|registry| {
            registry.requirements().iter().map(|requirement| FlatRow {
                registry_name: registry.name().to_string(),
                requirement_id: requirement.id().clone(),
                owner: requirement.owner().to_string(),
                status: requirement.status(),
                comment_count: requirement.comments().len(),
                attributes: requirement.attributes().clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use nonempty::NonEmpty;

    use super::*;
    use crate::domain::Prefix;

    fn registry(name: &str, owner: &str, rows: &[&[(&str, &str)]]) -> Registry {
        let rows: Vec<Attributes> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect()
            })
            .collect();
        Registry::import(
            name.to_string(),
            owner.to_string(),
            NonEmpty::from_vec(rows).unwrap(),
            &Prefix::default(),
            Utc::now(),
        )
    }

    fn sample() -> Vec<Registry> {
        vec![
            registry(
                "Chemicals US",
                "alice",
                &[&[("Country", "US"), ("Regulation", "OSHA 1910")]],
            ),
            registry(
                "Chemicals DE",
                "bob",
                &[&[("country", "DE"), ("Regulation", "ChemG 2024")]],
            ),
            registry("Safety JP", "alice", &[&[("Country", "JP")]]),
        ]
    }

    fn names(registries: &[Registry], filter: &RegistryFilter) -> Vec<String> {
        let matcher = filter.matcher();
        registries
            .iter()
            .filter(|r| matcher.matches(r))
            .map(|r| r.name().to_string())
            .collect()
    }

    #[test]
    fn empty_filter_matches_everything_in_order() {
        let registries = sample();
        assert_eq!(
            names(&registries, &RegistryFilter::default()),
            ["Chemicals US", "Chemicals DE", "Safety JP"]
        );
    }

    #[test]
    fn all_is_a_no_op() {
        let registries = sample();
        let filter = RegistryFilter {
            country: Some(ALL.to_string()),
            owner: Some(ALL.to_string()),
            ..RegistryFilter::default()
        };
        assert_eq!(names(&registries, &filter).len(), 3);
    }

    #[test]
    fn owner_and_attribute_filters_combine() {
        let registries = sample();
        let filter = RegistryFilter {
            owner: Some("alice".to_string()),
            country: Some("JP".to_string()),
            ..RegistryFilter::default()
        };
        assert_eq!(names(&registries, &filter), ["Safety JP"]);
    }

    #[test]
    fn attribute_key_is_case_insensitive_but_value_is_exact() {
        let registries = sample();
        let filter = RegistryFilter {
            country: Some("DE".to_string()),
            ..RegistryFilter::default()
        };
        assert_eq!(names(&registries, &filter), ["Chemicals DE"]);

        let filter = RegistryFilter {
            country: Some("de".to_string()),
            ..RegistryFilter::default()
        };
        assert!(names(&registries, &filter).is_empty());
    }

    #[test]
    fn text_query_searches_names_and_values_ignoring_case() {
        let registries = sample();
        let filter = RegistryFilter {
            text_query: Some("chemg".to_string()),
            ..RegistryFilter::default()
        };
        assert_eq!(names(&registries, &filter), ["Chemicals DE"]);

        let filter = RegistryFilter {
            text_query: Some("CHEMICALS".to_string()),
            ..RegistryFilter::default()
        };
        assert_eq!(names(&registries, &filter), ["Chemicals US", "Chemicals DE"]);
    }

    #[test]
    fn text_query_treats_metacharacters_literally() {
        let registries = sample();
        let filter = RegistryFilter {
            text_query: Some("osha.1910".to_string()),
            ..RegistryFilter::default()
        };
        assert!(names(&registries, &filter).is_empty());
    }

    #[test]
    fn flatten_emits_one_row_per_requirement() {
        let registries = vec![
            registry("Reg A", "alice", &[&[("Country", "US")], &[("Country", "DE")]]),
            registry("Reg B", "bob", &[&[("Country", "JP")]]),
        ];

        let rows = flatten(&registries);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].registry_name, "Reg A");
        assert_eq!(rows[1].requirement_id.to_string(), "REQ-002");
        assert_eq!(rows[2].registry_name, "Reg B");
        assert_eq!(rows[2].owner, "bob");
        assert_eq!(rows[2].status, RequirementStatus::Draft);
        assert_eq!(rows[2].comment_count, 0);
        assert_eq!(rows[2].attributes.get("Country").map(String::as_str), Some("JP"));
    }
}
