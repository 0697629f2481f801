//! Request path to route chain matching

use std::collections::BTreeMap;

use crate::model::{RouteNode, RouteTree};

#[derive(Debug)]
pub(crate) struct RouteMatch<'t> {
    /// Root first, deepest match last
    pub chain: Vec<&'t RouteNode>,
    pub params: BTreeMap<String, String>,
}

/// Match `path` against the tree. Routes are tried in declaration order;
/// the first branch that consumes the whole path wins.
pub(crate) fn match_path<'t>(tree: &'t RouteTree, path: &str) -> Option<RouteMatch<'t>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut params = BTreeMap::new();

    let root = tree.root();
    let rest = consume(&root.path, &segments, &mut params)?;

    let mut chain = vec![root];
    match descend(tree, &root.id, rest, &mut params) {
        Some(matched) => chain.extend(matched),
        None if rest.is_empty() => {}
        None => return None,
    }

    Some(RouteMatch { chain, params })
}

fn descend<'t>(
    tree: &'t RouteTree,
    parent_id: &str,
    rest: &[&str],
    params: &mut BTreeMap<String, String>,
) -> Option<Vec<&'t RouteNode>> {
    for node in tree.children(parent_id) {
        if node.index {
            if rest.is_empty() {
                return Some(vec![node]);
            }
            continue;
        }

        let mut local = params.clone();
        let Some(remaining) = consume(&node.path, rest, &mut local) else {
            continue;
        };

        if let Some(deeper) = descend(tree, &node.id, remaining, &mut local) {
            *params = local;
            let mut chain = vec![node];
            chain.extend(deeper);
            return Some(chain);
        }
        if remaining.is_empty() {
            *params = local;
            return Some(vec![node]);
        }
    }
    None
}

/// Consume the segments of `pattern` from the front of `segments`.
/// `:name` captures one segment, `*` captures the remainder.
fn consume<'s, 'p>(
    pattern: &str,
    segments: &'s [&'p str],
    params: &mut BTreeMap<String, String>,
) -> Option<&'s [&'p str]> {
    let mut rest = segments;

    for part in pattern.split('/').filter(|s| !s.is_empty()) {
        if part == "*" {
            let splat = rest.iter().map(|s| decode(s)).collect::<Vec<_>>().join("/");
            params.insert("*".to_string(), splat);
            return Some(&rest[rest.len()..]);
        }

        let (first, tail) = rest.split_first()?;
        if let Some(name) = part.strip_prefix(':') {
            params.insert(name.to_string(), decode(first));
        } else if !part.eq_ignore_ascii_case(first) {
            return None;
        }
        rest = tail;
    }

    Some(rest)
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}
