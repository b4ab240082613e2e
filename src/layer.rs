use crate::{geometry::Point2, polygon::Chain, structure::Color};

/// Consumer of the 2D polylines produced by a projection, typically a
/// vector drawing layer.
pub trait PolylineSink {
    fn add_chain(&mut self, chain: &[Point2], closed: bool, color: Color);
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColoredChain {
    pub chain: Chain,
    pub closed: bool,
    pub color: Color,
}

/// Polylines collected in memory, in the order they were emitted.
#[derive(Clone, Debug, Default)]
pub struct PolylineLayer {
    chains: Vec<ColoredChain>,
}

impl PolylineLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chains(&self) -> &[ColoredChain] {
        &self.chains
    }

    /// Chains that enclose an area, as needed for filling.
    pub fn closed_chains(&self) -> impl Iterator<Item = &ColoredChain> {
        self.chains.iter().filter(|chain| chain.closed)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn clear(&mut self) {
        self.chains.clear();
    }
}

impl PolylineSink for PolylineLayer {
    fn add_chain(&mut self, chain: &[Point2], closed: bool, color: Color) {
        self.chains.push(ColoredChain {
            chain: chain.to_vec(),
            closed,
            color,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_chains() {
        let mut layer = PolylineLayer::new();
        assert!(layer.is_empty());

        let chain = [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 0.0)];
        layer.add_chain(&chain, true, Color::new(0, 128, 0));
        layer.add_chain(&chain[..2], false, Color::default());

        assert_eq!(layer.len(), 2);
        assert_eq!(layer.closed_chains().count(), 1);
        assert_eq!(layer.chains()[0].color, Color::new(0, 128, 0));
        assert_eq!(layer.chains()[1].chain.len(), 2);

        layer.clear();
        assert!(layer.is_empty());
    }
}
