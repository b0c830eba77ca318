use tracing::info;

use crate::chart::{ChartFamily, ChartKind};
use crate::error::SessionError;

/// Two-level menu state: the selected family and the chart within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Router {
    family: ChartFamily,
    chart: ChartKind,
}

impl Default for Router {
    fn default() -> Self {
        Self {
            family: ChartFamily::Relational,
            chart: ChartKind::Scatter,
        }
    }
}

impl Router {
    pub fn family(&self) -> ChartFamily {
        self.family
    }

    pub fn chart(&self) -> ChartKind {
        self.chart
    }

    /// Select a family; the chart resets to the family's first entry.
    pub fn select_family(&mut self, family: ChartFamily) {
        if family != self.family {
            self.family = family;
            self.chart = family.charts()[0];
            info!(family = family.title(), chart = %self.chart, "family selected");
        }
    }

    /// Select a chart and, with it, its family.
    pub fn select_chart(&mut self, chart: ChartKind) {
        self.family = chart.family();
        self.chart = chart;
        info!(chart = %chart, "chart selected");
    }

    pub fn select_family_by_name(&mut self, name: &str) -> Result<ChartFamily, SessionError> {
        let family =
            ChartFamily::parse(name).ok_or_else(|| SessionError::UnknownChart(name.to_string()))?;
        self.select_family(family);
        Ok(family)
    }

    pub fn select_chart_by_name(&mut self, name: &str) -> Result<ChartKind, SessionError> {
        let chart =
            ChartKind::parse(name).ok_or_else(|| SessionError::UnknownChart(name.to_string()))?;
        self.select_chart(chart);
        Ok(chart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_resets_chart() {
        let mut router = Router::default();
        router.select_family(ChartFamily::Matrix);
        assert_eq!(router.chart(), ChartKind::Heatmap);
    }

    #[test]
    fn test_same_family_keeps_chart() {
        let mut router = Router::default();
        router.select_chart(ChartKind::Line);
        router.select_family(ChartFamily::Relational);
        assert_eq!(router.chart(), ChartKind::Line);
    }

    #[test]
    fn test_chart_selects_family() {
        let mut router = Router::default();
        router.select_chart_by_name("violin").unwrap();
        assert_eq!(router.family(), ChartFamily::Categorical);
        assert!(router.select_chart_by_name("sankey").is_err());
    }
}
