//! On-screen anchor coordinates of pin connections.
//!
//! The cache is keyed box -> pin -> link and is only valid for the
//! [`LayoutInputs`] it was built against. Any change to those inputs clears it
//! on the next [`GeometryCache::sync`]; lookups that miss degrade to "not drawn".

use crate::model::Link;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub left: f32,
    pub top: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCoords {
    pub left_point: Point,
    pub right_point: Point,
}

/// Bounding rect of a rendered pin row, as reported by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PinRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl PinRect {
    /// Anchors sit on the left and right edges at the vertical middle.
    pub fn anchors(&self) -> ConnectionCoords {
        let mid = self.top + self.height * 0.5;
        ConnectionCoords {
            left_point: Point { left: self.left, top: mid },
            right_point: Point {
                left: self.left + self.width,
                top: mid,
            },
        }
    }
}

/// Which endpoint starts the arrow when both sit at the same horizontal position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArrowTieBreak {
    #[default]
    FromIsStart,
    ToIsStart,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Arrow {
    pub link: String,
    pub start: Point,
    pub end: Point,
    /// Set when the visual start is the link's logical `to` endpoint.
    pub reversed: bool,
}

/// Everything the coordinates depend on besides the pins themselves.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutInputs {
    pub scroll_left: f32,
    pub scroll_top: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,
    pub expanded_pins: BTreeSet<(String, String)>,
    pub active_box: Option<String>,
    pub expanded_box: Option<String>,
    pub links_version: u64,
}

type PinMap = HashMap<String, HashMap<String, ConnectionCoords>>;

#[derive(Clone, Debug, Default)]
pub struct GeometryCache {
    connections: HashMap<String, PinMap>,
    built_for: Option<LayoutInputs>,
    version: u64,
    tie_break: ArrowTieBreak,
}

impl GeometryCache {
    pub fn new(tie_break: ArrowTieBreak) -> Self {
        GeometryCache {
            tie_break,
            ..Default::default()
        }
    }

    /// Bumps whenever recorded coordinates change or are dropped.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set_tie_break(&mut self, tie_break: ArrowTieBreak) {
        self.tie_break = tie_break;
    }

    pub fn is_current(&self, inputs: &LayoutInputs) -> bool {
        self.built_for.as_ref() == Some(inputs)
    }

    /// Clears the cache if `inputs` differ from the ones it was built for.
    /// Returns `true` when the host must re-measure pins.
    pub fn sync(&mut self, inputs: &LayoutInputs) -> bool {
        if self.is_current(inputs) {
            return false;
        }
        self.connections.clear();
        self.built_for = Some(inputs.clone());
        self.version = self.version.wrapping_add(1);
        tracing::debug!(version = self.version, "geometry invalidated");
        true
    }

    pub fn invalidate(&mut self) {
        self.connections.clear();
        self.built_for = None;
        self.version = self.version.wrapping_add(1);
    }

    pub fn record_connection(&mut self, box_name: &str, pin: &str, link: &str, coords: ConnectionCoords) {
        self.connections
            .entry(box_name.to_string())
            .or_default()
            .entry(pin.to_string())
            .or_default()
            .insert(link.to_string(), coords);
        self.version = self.version.wrapping_add(1);
    }

    pub fn record_pin_rect(&mut self, box_name: &str, pin: &str, link: &str, rect: PinRect) {
        self.record_connection(box_name, pin, link, rect.anchors());
    }

    pub fn connection(&self, box_name: &str, pin: &str, link: &str) -> Option<ConnectionCoords> {
        self.connections.get(box_name)?.get(pin)?.get(link).copied()
    }

    pub fn connection_count(&self) -> usize {
        self.connections
            .values()
            .flat_map(|pins| pins.values())
            .map(|links| links.len())
            .sum()
    }

    /// Arrows for every link whose both endpoints have been measured; the rest
    /// are skipped.
    pub fn arrows_for(&self, links: &[Link]) -> Vec<Arrow> {
        links.iter().filter_map(|l| self.arrow_for(l)).collect()
    }

    fn arrow_for(&self, link: &Link) -> Option<Arrow> {
        let from = self.connection(&link.from.box_name, &link.from.pin, &link.name)?;
        let to = self.connection(&link.to.box_name, &link.to.pin, &link.name)?;
        let fx = from.left_point.left;
        let tx = to.left_point.left;
        let reversed = if fx == tx {
            self.tie_break == ArrowTieBreak::ToIsStart
        } else {
            tx < fx
        };
        let (start, end) = if reversed { (to, from) } else { (from, to) };
        Some(Arrow {
            link: link.name.clone(),
            start: start.right_point,
            end: end.left_point,
            reversed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConnectionType, LinkEndpoint};

    fn link(name: &str, from: (&str, &str), to: (&str, &str)) -> Link {
        Link::new(
            name,
            LinkEndpoint::new(from.0, from.1, ConnectionType::Mq),
            LinkEndpoint::new(to.0, to.1, ConnectionType::Mq),
        )
    }

    fn rect(left: f32, top: f32) -> PinRect {
        PinRect { left, top, width: 100.0, height: 20.0 }
    }

    #[test]
    fn incomplete_pair_is_dropped() {
        let mut g = GeometryCache::default();
        let l = link("link1", ("boxA", "pin1"), ("boxB", "pin2"));
        g.record_pin_rect("boxA", "pin1", "link1", rect(0.0, 0.0));
        assert!(g.arrows_for(std::slice::from_ref(&l)).is_empty());
        g.record_pin_rect("boxB", "pin2", "link1", rect(300.0, 40.0));
        let arrows = g.arrows_for(&[l]);
        assert_eq!(arrows.len(), 1);
        assert_eq!(arrows[0].start, Point { left: 100.0, top: 10.0 });
        assert_eq!(arrows[0].end, Point { left: 300.0, top: 50.0 });
        assert!(!arrows[0].reversed);
    }

    #[test]
    fn leftmost_endpoint_starts_the_arrow() {
        let mut g = GeometryCache::default();
        let l = link("l", ("right", "out"), ("left", "in"));
        g.record_pin_rect("right", "out", "l", rect(500.0, 0.0));
        g.record_pin_rect("left", "in", "l", rect(10.0, 0.0));
        let a = &g.arrows_for(&[l])[0];
        assert!(a.reversed);
        assert_eq!(a.start.left, 110.0);
        assert_eq!(a.end.left, 500.0);
    }

    #[test]
    fn tie_break_policy() {
        let l = link("l", ("a", "out"), ("b", "in"));
        let mut g = GeometryCache::new(ArrowTieBreak::ToIsStart);
        g.record_pin_rect("a", "out", "l", rect(0.0, 0.0));
        g.record_pin_rect("b", "in", "l", rect(0.0, 100.0));
        assert!(g.arrows_for(std::slice::from_ref(&l))[0].reversed);
        g.set_tie_break(ArrowTieBreak::FromIsStart);
        assert!(!g.arrows_for(&[l])[0].reversed);
    }

    #[test]
    fn sync_clears_on_any_input_change() {
        let mut g = GeometryCache::default();
        let mut inputs = LayoutInputs::default();
        assert!(g.sync(&inputs));
        g.record_connection("a", "p", "l", ConnectionCoords::default());
        assert!(!g.sync(&inputs));
        assert_eq!(g.connection_count(), 1);

        inputs.scroll_top = 12.0;
        assert!(g.sync(&inputs));
        assert_eq!(g.connection_count(), 0);

        g.record_connection("a", "p", "l", ConnectionCoords::default());
        inputs.expanded_pins.insert(("a".into(), "p".into()));
        assert!(g.sync(&inputs));
        assert!(g.connection("a", "p", "l").is_none());

        inputs.links_version += 1;
        assert!(!g.is_current(&inputs));
    }

    #[test]
    fn overwrite_same_key() {
        let mut g = GeometryCache::default();
        g.record_pin_rect("a", "p", "l", rect(0.0, 0.0));
        g.record_pin_rect("a", "p", "l", rect(5.0, 0.0));
        assert_eq!(g.connection_count(), 1);
        assert_eq!(g.connection("a", "p", "l").unwrap().left_point.left, 5.0);
    }
}
