use crate::output::{print_rows, OutputFormat};
use crate::translate::{Metric, MetricCategory};

fn category_name(category: MetricCategory) -> &'static str {
    match category {
        MetricCategory::Time => "time",
        MetricCategory::Network => "network",
        MetricCategory::Access => "access",
    }
}

pub(crate) fn rows() -> Vec<Vec<String>> {
    Metric::ALL
        .iter()
        .map(|m| {
            vec![
                m.key().to_string(),
                m.label().to_string(),
                category_name(m.category()).to_string(),
                m.display_name().unwrap_or_default().to_string(),
            ]
        })
        .collect()
}

/// List the metric vocabulary shared with the dashboard.
pub fn run(format: &OutputFormat) {
    print_rows(&["key", "label", "category", "display"], &rows(), format);
}
