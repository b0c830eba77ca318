use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::debug;

use crate::chart::ChartKind;
use crate::ir::SceneGraph;
use crate::OutputFormat;

/// A rendered chart: the scene it was drawn from plus the encoded bytes.
#[derive(Debug, Clone)]
pub struct Figure {
    pub kind: ChartKind,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub scene: SceneGraph,
    pub bytes: Vec<u8>,
}

impl Figure {
    pub fn mime(&self) -> &'static str {
        match self.format {
            OutputFormat::Png => "image/png",
            OutputFormat::Svg => "image/svg+xml",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self.format {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
        }
    }
}

/// Most recent figure per chart kind. Last write wins; nothing is evicted.
#[derive(Debug, Default)]
pub struct SessionCache {
    figures: HashMap<ChartKind, Figure>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for the figure's chart kind.
    pub fn store(&mut self, figure: Figure) -> &Figure {
        debug!(chart = %figure.kind, bytes = figure.bytes.len(), "caching figure");
        match self.figures.entry(figure.kind) {
            Entry::Occupied(mut slot) => {
                slot.insert(figure);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(figure),
        }
    }

    pub fn get(&self, kind: ChartKind) -> Option<&Figure> {
        self.figures.get(&kind)
    }

    pub fn contains(&self, kind: ChartKind) -> bool {
        self.figures.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.figures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.figures.is_empty()
    }

    pub fn clear(&mut self) {
        self.figures.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn figure(kind: ChartKind, byte: u8) -> Figure {
        Figure {
            kind,
            format: OutputFormat::Png,
            width: 10,
            height: 10,
            scene: SceneGraph::new(10, 10),
            bytes: vec![byte],
        }
    }

    #[test]
    fn test_last_write_wins() {
        let mut cache = SessionCache::new();
        cache.store(figure(ChartKind::Scatter, 1));
        cache.store(figure(ChartKind::Scatter, 2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(ChartKind::Scatter).unwrap().bytes, vec![2]);
    }

    #[test]
    fn test_entries_are_per_kind() {
        let mut cache = SessionCache::new();
        cache.store(figure(ChartKind::Scatter, 1));
        cache.store(figure(ChartKind::Heatmap, 2));
        assert!(cache.contains(ChartKind::Heatmap));
        assert!(!cache.contains(ChartKind::Line));
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_mime() {
        let mut fig = figure(ChartKind::Box, 0);
        assert_eq!(fig.mime(), "image/png");
        fig.format = OutputFormat::Svg;
        assert_eq!(fig.extension(), "svg");
    }
}
