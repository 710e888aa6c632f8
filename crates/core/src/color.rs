use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::model::{NodeId, Tree};

/// A CSS color string, passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub String);

impl Color {
    pub const TRANSPARENT: &'static str = "rgba(0,0,0,0)";

    pub fn new(s: impl Into<String>) -> Self {
        Color(s.into())
    }

    pub fn transparent() -> Self {
        Color(Self::TRANSPARENT.to_string())
    }

    pub fn is_transparent(&self) -> bool {
        self.0 == Self::TRANSPARENT
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn default_palette() -> Vec<Color> {
    [
        "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
        "#bcbd22", "#17becf",
    ]
    .into_iter()
    .map(Color::new)
    .collect()
}

/// Colors remembered across recomputes and across charts that share a
/// palette. Single writer at a time: callers laying out several trees
/// against one memo must serialize access themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColorMemo {
    by_id: HashMap<String, Color>,
    cursor: usize,
}

impl ColorMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Color> {
        self.by_id.get(id)
    }

    pub fn insert(&mut self, id: impl Into<String>, color: Color) {
        self.by_id.insert(id.into(), color);
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// How many default palette picks have been made so far.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn next_default(&mut self, palette: &[Color]) -> Color {
        if palette.is_empty() {
            return Color::transparent();
        }
        let c = palette[self.cursor % palette.len()].clone();
        self.cursor += 1;
        c
    }
}

/// Resolved color per node, indexed by [`NodeId`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeColors(Vec<Color>);

impl NodeColors {
    pub fn get(&self, id: NodeId) -> &Color {
        &self.0[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Color)> {
        self.0.iter().enumerate().map(|(i, c)| (NodeId(i as u64), c))
    }
}

/// Pre-order color assignment: explicit color, then memo, then the
/// parent's color from the third level on, then the next palette entry
/// for the second level. The root gets no color of its own.
pub fn resolve_colors(
    tree: &Tree,
    explicit: &HashMap<String, Color>,
    palette: &[Color],
    memo: &mut ColorMemo,
) -> NodeColors {
    let mut colors = vec![Color::transparent(); tree.len()];
    for id in tree.preorder(tree.root) {
        let node = tree.node(id);
        let color = if let Some(c) = explicit.get(&node.key) {
            memo.insert(node.key.clone(), c.clone());
            c.clone()
        } else if let Some(c) = memo.get(&node.key) {
            c.clone()
        } else {
            match node.parent {
                Some(p) if tree.node(p).parent.is_some() => colors[p.index()].clone(),
                Some(_) => {
                    let c = memo.next_default(palette);
                    memo.insert(node.key.clone(), c.clone());
                    c
                }
                None => Color::transparent(),
            }
        };
        colors[id.index()] = color;
    }
    NodeColors(colors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, AggregateMode};
    use crate::builder::build;
    use crate::model::Record;

    fn sample() -> Tree {
        let records = [
            Record::new("R", "").with_value(0.0),
            Record::new("a", "R").with_value(5.0),
            Record::new("b", "R").with_value(3.0),
            Record::new("a1", "a").with_value(1.0),
            Record::new("a11", "a1").with_value(1.0),
        ];
        aggregate(build(&records, true).unwrap().tree, AggregateMode::Remainder).unwrap()
    }

    fn color_of<'a>(tree: &Tree, colors: &'a NodeColors, key: &str) -> &'a Color {
        colors.get(tree.find(key).unwrap())
    }

    #[test]
    fn second_level_cycles_and_deeper_levels_inherit() {
        let tree = sample();
        let palette = vec![Color::new("red"), Color::new("blue")];
        let mut memo = ColorMemo::new();
        let colors = resolve_colors(&tree, &HashMap::new(), &palette, &mut memo);

        assert!(color_of(&tree, &colors, "R").is_transparent());
        assert_eq!(color_of(&tree, &colors, "a").0, "red");
        assert_eq!(color_of(&tree, &colors, "b").0, "blue");
        assert_eq!(color_of(&tree, &colors, "a1").0, "red");
        assert_eq!(color_of(&tree, &colors, "a11").0, "red");
        assert_eq!(memo.cursor(), 2);
    }

    #[test]
    fn explicit_colors_win_and_are_remembered() {
        let tree = sample();
        let explicit = HashMap::from([("a1".to_string(), Color::new("green"))]);
        let mut memo = ColorMemo::new();
        let colors = resolve_colors(&tree, &explicit, &default_palette(), &mut memo);
        assert_eq!(color_of(&tree, &colors, "a1").0, "green");
        assert_eq!(color_of(&tree, &colors, "a11").0, "green");
        assert_eq!(memo.get("a1"), Some(&Color::new("green")));
    }

    #[test]
    fn stable_across_recomputes() {
        let tree = sample();
        let palette = default_palette();
        let mut memo = ColorMemo::new();
        let first = resolve_colors(&tree, &HashMap::new(), &palette, &mut memo);
        let second = resolve_colors(&tree, &HashMap::new(), &palette, &mut memo);
        assert_eq!(first, second);
        assert_eq!(memo.cursor(), 2);
    }

    #[test]
    fn shared_memo_continues_the_cycle() {
        let tree = sample();
        let palette = vec![Color::new("red"), Color::new("blue"), Color::new("gray")];
        let mut memo = ColorMemo::new();
        resolve_colors(&tree, &HashMap::new(), &palette, &mut memo);

        let other = build(&[Record::new("S", ""), Record::new("z", "S"), Record::new("a", "S")], false)
            .unwrap()
            .tree;
        let colors = resolve_colors(&other, &HashMap::new(), &palette, &mut memo);
        assert_eq!(colors.get(other.find("z").unwrap()).0, "gray");
        // same logical node as in the first chart
        assert_eq!(colors.get(other.find("a").unwrap()).0, "red");
    }

    #[test]
    fn empty_palette_is_transparent() {
        let tree = sample();
        let colors = resolve_colors(&tree, &HashMap::new(), &[], &mut ColorMemo::new());
        assert!(colors.iter().all(|(_, c)| c.is_transparent()));
    }
}
