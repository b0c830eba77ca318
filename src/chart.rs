use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartFamily {
    Relational,
    Distribution,
    Categorical,
    Regression,
    Matrix,
}

impl ChartFamily {
    pub const ALL: [ChartFamily; 5] = [
        ChartFamily::Relational,
        ChartFamily::Distribution,
        ChartFamily::Categorical,
        ChartFamily::Regression,
        ChartFamily::Matrix,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            ChartFamily::Relational => "Relational Plots",
            ChartFamily::Distribution => "Distribution Plots",
            ChartFamily::Categorical => "Categorical Plots",
            ChartFamily::Regression => "Regression Plots",
            ChartFamily::Matrix => "Matrix Plots",
        }
    }

    /// Charts offered under this family, in menu order.
    pub fn charts(&self) -> &'static [ChartKind] {
        use ChartKind::*;
        match self {
            ChartFamily::Relational => &[Scatter, Line, Relplot],
            ChartFamily::Distribution => &[Histogram, Kde, Ecdf, Displot, Rug],
            ChartFamily::Categorical => {
                &[Strip, Swarm, Box, Violin, Boxen, Point, Bar, Count, Catplot]
            }
            ChartFamily::Regression => &[Lmplot, Regplot, Residplot],
            ChartFamily::Matrix => &[Heatmap, Clustermap],
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let key = normalize(name);
        let key = key.strip_suffix("plots").or_else(|| key.strip_suffix("plot")).unwrap_or(&key);
        match key {
            "relational" | "rel" => Some(ChartFamily::Relational),
            "distribution" | "dist" | "dis" => Some(ChartFamily::Distribution),
            "categorical" | "cat" => Some(ChartFamily::Categorical),
            "regression" | "reg" => Some(ChartFamily::Regression),
            "matrix" => Some(ChartFamily::Matrix),
            _ => None,
        }
    }
}

impl fmt::Display for ChartFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// Every chart the application can draw. Dispatch on this enum is explicit;
/// there is no lookup by function name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Scatter,
    Line,
    Relplot,
    Histogram,
    Kde,
    Ecdf,
    Displot,
    Rug,
    Strip,
    Swarm,
    Box,
    Violin,
    Boxen,
    Point,
    Bar,
    Count,
    Catplot,
    Lmplot,
    Regplot,
    Residplot,
    Heatmap,
    Clustermap,
}

impl ChartKind {
    pub fn all() -> impl Iterator<Item = ChartKind> {
        ChartFamily::ALL
            .iter()
            .flat_map(|family| family.charts().iter().copied())
    }

    pub fn family(&self) -> ChartFamily {
        use ChartKind::*;
        match self {
            Scatter | Line | Relplot => ChartFamily::Relational,
            Histogram | Kde | Ecdf | Displot | Rug => ChartFamily::Distribution,
            Strip | Swarm | Box | Violin | Boxen | Point | Bar | Count | Catplot => {
                ChartFamily::Categorical
            }
            Lmplot | Regplot | Residplot => ChartFamily::Regression,
            Heatmap | Clustermap => ChartFamily::Matrix,
        }
    }

    /// Menu label.
    pub fn title(&self) -> &'static str {
        use ChartKind::*;
        match self {
            Scatter => "Scatter Plot",
            Line => "Line Plot",
            Relplot => "Relational Plot",
            Histogram => "Histogram",
            Kde => "KDE Plot",
            Ecdf => "ECDF Plot",
            Displot => "Distribution Plot",
            Rug => "Rug Plot",
            Strip => "Strip Plot",
            Swarm => "Swarm Plot",
            Box => "Box Plot",
            Violin => "Violin Plot",
            Boxen => "Boxen Plot",
            Point => "Point Plot",
            Bar => "Bar Plot",
            Count => "Count Plot",
            Catplot => "Categorical Plot",
            Lmplot => "LM Plot",
            Regplot => "Regression Plot",
            Residplot => "Residual Plot",
            Heatmap => "Heatmap",
            Clustermap => "Cluster Map",
        }
    }

    /// Name of the plotting function this chart maps onto.
    pub fn function_name(&self) -> &'static str {
        use ChartKind::*;
        match self {
            Scatter => "scatterplot",
            Line => "lineplot",
            Relplot => "relplot",
            Histogram => "histplot",
            Kde => "kdeplot",
            Ecdf => "ecdfplot",
            Displot => "displot",
            Rug => "rugplot",
            Strip => "stripplot",
            Swarm => "swarmplot",
            Box => "boxplot",
            Violin => "violinplot",
            Boxen => "boxenplot",
            Point => "pointplot",
            Bar => "barplot",
            Count => "countplot",
            Catplot => "catplot",
            Lmplot => "lmplot",
            Regplot => "regplot",
            Residplot => "residplot",
            Heatmap => "heatmap",
            Clustermap => "clustermap",
        }
    }

    /// Figure-level charts size themselves from facet height and aspect.
    pub fn is_figure_level(&self) -> bool {
        matches!(
            self,
            ChartKind::Relplot
                | ChartKind::Displot
                | ChartKind::Catplot
                | ChartKind::Lmplot
                | ChartKind::Clustermap
        )
    }

    /// Accepts the menu label, the function name, or the short name, in any
    /// case and with or without spaces.
    pub fn parse(name: &str) -> Option<Self> {
        let key = normalize(name);
        ChartKind::all().find(|kind| {
            let short = kind.short_name();
            key == short
                || key == normalize(kind.title())
                || key == normalize(kind.function_name())
                || key == format!("{}plot", short)
                || kind.aliases().contains(&key.as_str())
        })
    }

    pub fn short_name(&self) -> &'static str {
        use ChartKind::*;
        match self {
            Scatter => "scatter",
            Line => "line",
            Relplot => "relplot",
            Histogram => "histogram",
            Kde => "kde",
            Ecdf => "ecdf",
            Displot => "displot",
            Rug => "rug",
            Strip => "strip",
            Swarm => "swarm",
            Box => "box",
            Violin => "violin",
            Boxen => "boxen",
            Point => "point",
            Bar => "bar",
            Count => "count",
            Catplot => "catplot",
            Lmplot => "lmplot",
            Regplot => "regplot",
            Residplot => "residplot",
            Heatmap => "heatmap",
            Clustermap => "clustermap",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        use ChartKind::*;
        match self {
            Histogram => &["hist"],
            Relplot => &["relational"],
            Displot => &["distribution"],
            Catplot => &["categorical"],
            Lmplot => &["lm"],
            Regplot => &["regression"],
            Residplot => &["resid", "residual"],
            Clustermap => &["cluster"],
            _ => &[],
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Menu as printable text.
pub fn menu_text() -> String {
    let mut out = String::new();
    for family in ChartFamily::ALL {
        out.push_str(family.title());
        out.push('\n');
        for chart in family.charts() {
            out.push_str(&format!("  {:<11} {}\n", chart.short_name(), chart.title()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_chart_belongs_to_its_family() {
        for kind in ChartKind::all() {
            assert!(kind.family().charts().contains(&kind));
        }
        assert_eq!(ChartKind::all().count(), 22);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(ChartKind::parse("scatter"), Some(ChartKind::Scatter));
        assert_eq!(ChartKind::parse("scatterplot"), Some(ChartKind::Scatter));
        assert_eq!(ChartKind::parse("Scatter Plot"), Some(ChartKind::Scatter));
        assert_eq!(ChartKind::parse("histplot"), Some(ChartKind::Histogram));
        assert_eq!(ChartKind::parse("KDE"), Some(ChartKind::Kde));
        assert_eq!(ChartKind::parse("boxen_plot"), Some(ChartKind::Boxen));
        assert_eq!(ChartKind::parse("pie"), None);
    }

    #[test]
    fn test_parse_family() {
        assert_eq!(ChartFamily::parse("Matrix Plots"), Some(ChartFamily::Matrix));
        assert_eq!(ChartFamily::parse("categorical"), Some(ChartFamily::Categorical));
        assert_eq!(ChartFamily::parse("other"), None);
    }

    #[test]
    fn test_menu_lists_all_charts() {
        let text = menu_text();
        for kind in ChartKind::all() {
            assert!(text.contains(kind.title()));
        }
    }
}
