//! Structural text persistence for forests.
//!
//! The format is a recursive tagged-tree text structure, one top-level
//! `<node>` or `<leaf>` per tree:
//!
//! ```text
//! <forest>
//!   <node score="f" testIndex="i" testThreshold="t"> <left/> <right/> </node>
//!   <leaf index="i" unmixed="0|1" label="i"?/>
//! </forest>
//! ```
//!
//! Only structure and decision parameters are stored; the leaf-index
//! table and the weakest-node cache are rebuilt after loading. Scores and
//! thresholds are written with `f64`'s shortest round-trip formatting, so
//! parsing reproduces them exactly. Malformed input is fatal; there is no
//! partial load.

use std::fmt::Write as _;
use std::str::FromStr;

use crate::forest::Forest;
use crate::tree::{NodeId, Tree};

/// Persistence errors: file I/O plus malformed or truncated structure.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected end of input while parsing {context}")]
    UnexpectedEnd { context: &'static str },
    #[error("missing required attribute: {0}")]
    MissingAttribute(&'static str),
    #[error("invalid value for {attribute}: {value:?}")]
    InvalidValue {
        attribute: &'static str,
        value: String,
    },
    #[error("unexpected input at byte {position}: expected {expected}")]
    UnexpectedToken {
        position: usize,
        expected: &'static str,
    },
}

/// Serializes a forest to its structural text form.
pub fn forest_to_text(forest: &Forest) -> String {
    let mut out = String::from("<forest>");
    for tree in &forest.trees {
        write_node(tree, tree.root(), &mut out);
    }
    out.push_str("</forest>");
    out
}

fn write_node(tree: &Tree, id: NodeId, out: &mut String) {
    let node = tree.node(id);
    match (node.left, node.right) {
        (Some(left), Some(right)) => {
            let _ = write!(
                out,
                "<node score=\"{}\" testIndex=\"{}\" testThreshold=\"{}\">",
                node.score, node.test_feature_index, node.test_threshold
            );
            write_node(tree, left, out);
            write_node(tree, right, out);
            out.push_str("</node>");
        }
        _ => {
            let _ = write!(
                out,
                "<leaf index=\"{}\" unmixed=\"{}\"",
                node.leaf_index, node.is_unmixed as u8
            );
            if node.is_unmixed {
                let _ = write!(out, " label=\"{}\"", node.unmixed_label);
            }
            out.push_str("/>");
        }
    }
}

/// Parses [`forest_to_text`] output back into a forest, rebuilding every
/// tree's derived leaf indices and weakest-node cache.
pub fn forest_from_text(text: &str) -> Result<Forest, ParseError> {
    let mut cur = Cursor::new(text);
    cur.expect("<forest>")?;
    let mut trees = Vec::new();
    while !cur.eat("</forest>") {
        if cur.at_end() {
            return Err(ParseError::UnexpectedEnd {
                context: "forest element list",
            });
        }
        let mut tree = Tree::new();
        let root = tree.root();
        parse_node(&mut cur, &mut tree, root)?;
        tree.compute_global_properties();
        trees.push(tree);
    }
    if !cur.at_end() {
        return Err(ParseError::UnexpectedToken {
            position: cur.pos,
            expected: "end of input",
        });
    }

    // The format carries no feature dimensionality; the largest tested
    // index bounds it from below.
    let feature_dim = trees
        .iter()
        .filter_map(Tree::max_test_feature_index)
        .max()
        .map_or(0, |m| m + 1);
    Ok(Forest { trees, feature_dim })
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Cursor { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let skipped = self
            .rest()
            .bytes()
            .take_while(u8::is_ascii_whitespace)
            .count();
        self.pos += skipped;
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &'static str) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                position: self.pos,
                expected: token,
            })
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos == self.input.len()
    }
}

/// `name="value"` pairs up to the closing `>` or `/>`; returns whether
/// the tag was self-closing.
fn parse_attributes<'a>(
    cur: &mut Cursor<'a>,
) -> Result<(Vec<(&'a str, &'a str)>, bool), ParseError> {
    let mut attrs = Vec::new();
    loop {
        if cur.eat("/>") {
            return Ok((attrs, true));
        }
        if cur.eat(">") {
            return Ok((attrs, false));
        }
        cur.skip_whitespace();
        let name_len = cur
            .rest()
            .bytes()
            .take_while(u8::is_ascii_alphanumeric)
            .count();
        if name_len == 0 {
            return Err(if cur.at_end() {
                ParseError::UnexpectedEnd { context: "tag" }
            } else {
                ParseError::UnexpectedToken {
                    position: cur.pos,
                    expected: "attribute name",
                }
            });
        }
        let name = &cur.rest()[..name_len];
        cur.pos += name_len;

        cur.expect("=")?;
        cur.expect("\"")?;
        let value_len = match cur.rest().find('"') {
            Some(len) => len,
            None => {
                return Err(ParseError::UnexpectedEnd {
                    context: "attribute value",
                })
            }
        };
        let value = &cur.rest()[..value_len];
        cur.pos += value_len + 1;
        attrs.push((name, value));
    }
}

fn attr<'a>(attrs: &[(&'a str, &'a str)], name: &'static str) -> Result<&'a str, ParseError> {
    attrs
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, v)| v)
        .ok_or(ParseError::MissingAttribute(name))
}

fn parse_attr<T: FromStr>(attrs: &[(&str, &str)], name: &'static str) -> Result<T, ParseError> {
    let value = attr(attrs, name)?;
    value.parse().map_err(|_| ParseError::InvalidValue {
        attribute: name,
        value: value.to_string(),
    })
}

fn parse_node(cur: &mut Cursor<'_>, tree: &mut Tree, id: NodeId) -> Result<(), ParseError> {
    if cur.eat("<leaf") {
        let (attrs, self_closing) = parse_attributes(cur)?;
        if !self_closing {
            return Err(ParseError::UnexpectedToken {
                position: cur.pos,
                expected: "self-closing leaf tag",
            });
        }
        // The stored index is only type-checked; dense indices are
        // reassigned after the whole tree is built.
        let _index: usize = parse_attr(&attrs, "index")?;
        let unmixed = match attr(&attrs, "unmixed")? {
            "0" => false,
            "1" => true,
            value => {
                return Err(ParseError::InvalidValue {
                    attribute: "unmixed",
                    value: value.to_string(),
                })
            }
        };
        let payload = if unmixed {
            Some(parse_attr::<usize>(&attrs, "label")?)
        } else {
            None
        };
        tree.set_leaf_payload(id, payload);
        Ok(())
    } else if cur.eat("<node") {
        let (attrs, self_closing) = parse_attributes(cur)?;
        if self_closing {
            return Err(ParseError::UnexpectedToken {
                position: cur.pos,
                expected: "two child elements",
            });
        }
        let score: f64 = parse_attr(&attrs, "score")?;
        let test_index: usize = parse_attr(&attrs, "testIndex")?;
        let test_threshold: f64 = parse_attr(&attrs, "testThreshold")?;
        let (left, right) = tree.split_node(id, score, test_index, test_threshold);
        parse_node(cur, tree, left)?;
        parse_node(cur, tree, right)?;
        cur.expect("</node>")?;
        Ok(())
    } else {
        Err(if cur.at_end() {
            ParseError::UnexpectedEnd {
                context: "tree element",
            }
        } else {
            ParseError::UnexpectedToken {
                position: cur.pos,
                expected: "<node> or <leaf>",
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{fit, ForestParamsBuilder};
    use crate::test_data::setup_four_clusters;
    use ndarray::array;

    const TWO_TREES: &str = "<forest>\
        <node score=\"1\" testIndex=\"0\" testThreshold=\"0.5\">\
        <leaf index=\"0\" unmixed=\"1\" label=\"0\"/>\
        <leaf index=\"1\" unmixed=\"1\" label=\"1\"/>\
        </node>\
        <leaf index=\"0\" unmixed=\"0\"/>\
        </forest>";

    #[test]
    fn test_canonical_text_round_trips_exactly() {
        let forest = forest_from_text(TWO_TREES).unwrap();
        assert_eq!(forest.n_trees(), 2);
        assert_eq!(forest.n_leaves(), 3);
        assert_eq!(forest.feature_dim(), 1);
        assert_eq!(forest_to_text(&forest), TWO_TREES);
    }

    #[test]
    fn test_loaded_forest_routes_by_threshold() {
        let forest = forest_from_text(TWO_TREES).unwrap();
        let low = forest.classify(array![0.2].view()).unwrap();
        let high = forest.classify(array![0.9].view()).unwrap();
        assert_eq!(low.to_vec(), vec![1.0, 0.0, 1.0]);
        assert_eq!(high.to_vec(), vec![0.0, 1.0, 1.0]);
        assert!(forest.is_unmixed(array![0.2].view(), 0));
        assert!(!forest.is_unmixed(array![0.2].view(), 1));
    }

    #[test]
    fn test_whitespace_between_elements_is_ignored() {
        let pretty = "<forest>\n  <node score=\"1\" testIndex=\"0\" testThreshold=\"0.5\">\n    <leaf index=\"0\" unmixed=\"1\" label=\"0\"/>\n    <leaf index=\"1\" unmixed=\"1\" label=\"1\"/>\n  </node>\n</forest>\n";
        let forest = forest_from_text(pretty).unwrap();
        assert_eq!(forest.n_trees(), 1);
        assert_eq!(forest.n_leaves(), 2);
    }

    #[test]
    fn test_trained_forest_round_trips() {
        let (x, y) = setup_four_clusters();
        let params = ForestParamsBuilder::new()
            .n_trees(3)
            .s_min(1.0)
            .t_max(20)
            .seed(31)
            .build();
        let forest = fit(x.view(), y.view(), 4, &params).unwrap();

        let text = forest_to_text(&forest);
        let reloaded = forest_from_text(&text).unwrap();

        assert_eq!(reloaded.n_trees(), forest.n_trees());
        assert_eq!(reloaded.leaves_per_tree(), forest.leaves_per_tree());
        assert_eq!(forest_to_text(&reloaded), text);
        for row in x.outer_iter() {
            assert_eq!(
                reloaded.classify(row).unwrap(),
                forest.classify(row).unwrap()
            );
        }
    }

    #[test]
    fn test_truncated_input_is_fatal() {
        let text = forest_to_text(&forest_from_text(TWO_TREES).unwrap());
        let truncated = &text[..text.len() - 12];
        assert!(forest_from_text(truncated).is_err());
    }

    #[test]
    fn test_missing_attribute() {
        let text = "<forest><leaf index=\"0\"/></forest>";
        assert!(matches!(
            forest_from_text(text),
            Err(ParseError::MissingAttribute("unmixed"))
        ));
    }

    #[test]
    fn test_unmixed_leaf_requires_label() {
        let text = "<forest><leaf index=\"0\" unmixed=\"1\"/></forest>";
        assert!(matches!(
            forest_from_text(text),
            Err(ParseError::MissingAttribute("label"))
        ));
    }

    #[test]
    fn test_invalid_values() {
        let text = "<forest><leaf index=\"zero\" unmixed=\"0\"/></forest>";
        assert!(matches!(
            forest_from_text(text),
            Err(ParseError::InvalidValue {
                attribute: "index",
                ..
            })
        ));

        let text = "<forest><leaf index=\"0\" unmixed=\"2\"/></forest>";
        assert!(matches!(
            forest_from_text(text),
            Err(ParseError::InvalidValue {
                attribute: "unmixed",
                ..
            })
        ));
    }

    #[test]
    fn test_trailing_garbage_is_rejected() {
        let text = "<forest><leaf index=\"0\" unmixed=\"0\"/></forest><leaf/>";
        assert!(matches!(
            forest_from_text(text),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_self_closing_node_is_rejected() {
        let text = "<forest><node score=\"0\" testIndex=\"0\" testThreshold=\"0\"/></forest>";
        assert!(matches!(
            forest_from_text(text),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }
}
