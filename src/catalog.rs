//! Metric catalog
//!
//! Display labels for the health and food-access columns, the metric set
//! behind the priority score, and the groups shown in the impact analysis.

use serde::{Deserialize, Serialize};

/// A metric column with its display label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricLabel {
    pub column: String,
    pub label: String,
}

impl MetricLabel {
    pub fn new(column: &str, label: &str) -> Self {
        Self {
            column: column.to_string(),
            label: label.to_string(),
        }
    }
}

/// A titled set of metrics averaged over the priority cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactGroup {
    pub title: String,
    pub entries: Vec<MetricLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricCatalog {
    /// Metrics offered for the map, ranking and summary views
    pub selectable: Vec<MetricLabel>,
    /// Metrics combined into the aggregate priority score
    pub priority_metrics: Vec<String>,
    pub impact_groups: Vec<ImpactGroup>,
}

impl Default for MetricCatalog {
    fn default() -> Self {
        let selectable = vec![
            MetricLabel::new("OBESITY_CrudePrev", "Obesity Prevalence"),
            MetricLabel::new("DIABETES_CrudePrev", "Diabetes Prevalence"),
            MetricLabel::new("BPHIGH_CrudePrev", "High Blood Pressure"),
            MetricLabel::new("PCT_LACCESS_POP15", "Population with Low Food Access"),
            MetricLabel::new("PCT_LACCESS_SNAP15", "SNAP Recipients with Low Food Access"),
        ];
        let priority_metrics = selectable.iter().map(|m| m.column.clone()).collect();

        let impact_groups = vec![
            ImpactGroup {
                title: "Food Access Impact".to_string(),
                entries: vec![
                    MetricLabel::new("PCT_LACCESS_POP15", "Low Access Population"),
                    MetricLabel::new("PCT_LACCESS_SNAP15", "SNAP Recipients"),
                    MetricLabel::new("PCT_LACCESS_LOWI15", "Low Income Access"),
                ],
            },
            ImpactGroup {
                title: "Demographic Impact".to_string(),
                entries: vec![
                    MetricLabel::new("PCT_LACCESS_SNAP15", "SNAP Recipients"),
                    MetricLabel::new("PCT_LACCESS_LOWI15", "Low Income"),
                    MetricLabel::new("PCT_LACCESS_SENIORS15", "Seniors"),
                    MetricLabel::new("PCT_LACCESS_WHITE15", "White Population"),
                    MetricLabel::new("PCT_LACCESS_BLACK15", "Black Population"),
                    MetricLabel::new("PCT_LACCESS_HISP15", "Hispanic Population"),
                ],
            },
            ImpactGroup {
                title: "Current Health Status".to_string(),
                entries: vec![
                    MetricLabel::new("OBESITY_CrudePrev", "Obesity Rate"),
                    MetricLabel::new("DIABETES_CrudePrev", "Diabetes Rate"),
                    MetricLabel::new("BPHIGH_CrudePrev", "High BP Rate"),
                ],
            },
        ];

        Self {
            selectable,
            priority_metrics,
            impact_groups,
        }
    }
}

impl MetricCatalog {
    /// Display label of a selectable metric, or the column name itself
    pub fn label<'a>(&'a self, column: &'a str) -> &'a str {
        self.selectable
            .iter()
            .find(|m| m.column == column)
            .map(|m| m.label.as_str())
            .unwrap_or(column)
    }

    pub fn is_selectable(&self, column: &str) -> bool {
        self.selectable.iter().any(|m| m.column == column)
    }

    /// The first selectable metric, used when none is chosen
    pub fn default_metric(&self) -> Option<&str> {
        self.selectable.first().map(|m| m.column.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let catalog = MetricCatalog::default();
        assert_eq!(catalog.label("DIABETES_CrudePrev"), "Diabetes Prevalence");
        assert_eq!(catalog.label("PCT_LACCESS_HISP15"), "PCT_LACCESS_HISP15");
        assert_eq!(catalog.default_metric(), Some("OBESITY_CrudePrev"));
    }

    #[test]
    fn test_priority_metrics_follow_selectable_order() {
        let catalog = MetricCatalog::default();
        assert_eq!(catalog.priority_metrics.len(), 5);
        assert_eq!(catalog.priority_metrics[0], "OBESITY_CrudePrev");
        assert_eq!(catalog.priority_metrics[4], "PCT_LACCESS_SNAP15");
        assert!(catalog.priority_metrics.iter().all(|m| catalog.is_selectable(m)));
    }
}
