//! Per-method compressed radix tree.
//!
//! Every registered pattern is stored as a path of byte fragments. Static
//! children are indexed by their first byte and kept sorted by priority (the
//! number of routes reachable through them); a node has at most one wildcard
//! child, which always sits at the end of `children`.
//!
//! Lookup prefers static children. Whenever a static child is taken while a
//! wildcard sibling exists, the position is remembered so the walk can return
//! to the wildcard if the static branch dead-ends.

use crate::error::RouteError;
use crate::handler::HandlersChain;
use crate::params::Params;
use crate::path::unescape_value;
use http::Method;
use std::borrow::Cow;
use std::mem;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Static,
    Root,
    Param,
    CatchAll,
}

#[derive(Debug)]
pub(crate) struct Node {
    path: Vec<u8>,
    indices: Vec<u8>,
    wild_child: bool,
    kind: NodeKind,
    priority: u32,
    children: Vec<Node>,
    handlers: Option<HandlersChain>,
    full_path: Arc<str>,
}

/// Result of a lookup. `tsr` recommends redirecting to the same path with the
/// trailing slash added or removed.
#[derive(Debug, Default)]
pub(crate) struct NodeValue<'t> {
    pub(crate) handlers: Option<&'t HandlersChain>,
    pub(crate) full_path: Option<&'t Arc<str>>,
    pub(crate) tsr: bool,
}

struct SkippedNode<'t, 'p> {
    path: &'p [u8],
    node: &'t Node,
    params_count: usize,
}

/// Information about a registered route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub method: Method,
    pub path: String,
    pub handler: &'static str,
    pub handlers: usize,
}

impl Default for Node {
    fn default() -> Self {
        Self::with_full_path(Arc::from(""))
    }
}

impl Node {
    fn with_full_path(full_path: Arc<str>) -> Self {
        Self {
            path: Vec::new(),
            indices: Vec::new(),
            wild_child: false,
            kind: NodeKind::Static,
            priority: 0,
            children: Vec::new(),
            handlers: None,
            full_path,
        }
    }

    /// Adds a child, keeping the wildcard child (if any) at the end.
    /// Returns the position of the new child.
    fn add_child(&mut self, child: Node) -> usize {
        if self.wild_child && !self.children.is_empty() {
            let pos = self.children.len() - 1;
            self.children.insert(pos, child);
            pos
        } else {
            self.children.push(child);
            self.children.len() - 1
        }
    }

    /// Bumps the priority of the child at `pos` and moves it forward past
    /// lower-priority siblings. Returns its new position.
    fn increment_child_prio(&mut self, pos: usize) -> usize {
        self.children[pos].priority += 1;
        let prio = self.children[pos].priority;

        let mut new_pos = pos;
        while new_pos > 0 && self.children[new_pos - 1].priority < prio {
            self.children.swap(new_pos - 1, new_pos);
            new_pos -= 1;
        }

        if new_pos != pos {
            let index = self.indices.remove(pos);
            self.indices.insert(new_pos, index);
        }
        new_pos
    }

    /// Splits this node at byte `i`: the first `i` bytes stay here and the
    /// remainder moves into a single static child that takes over the old
    /// children and handlers.
    fn split_edge(&mut self, i: usize, full_path: Arc<str>) {
        let child = Node {
            path: self.path.split_off(i),
            indices: mem::take(&mut self.indices),
            wild_child: self.wild_child,
            kind: NodeKind::Static,
            priority: self.priority.saturating_sub(1),
            children: mem::take(&mut self.children),
            handlers: self.handlers.take(),
            full_path: Arc::clone(&self.full_path),
        };
        self.indices = vec![child.path[0]];
        self.children = vec![child];
        self.wild_child = false;
        self.full_path = full_path;
    }

    /// Registers `path` with `handlers`. Not safe for concurrent use.
    pub(crate) fn add_route(&mut self, path: &str, handlers: HandlersChain) -> Result<(), RouteError> {
        check_pattern(path)?;

        let full_path: Arc<str> = Arc::from(path);
        let mut path = path.as_bytes();
        self.priority += 1;

        // empty tree
        if self.path.is_empty() && self.children.is_empty() {
            self.insert_child(path, &full_path, handlers)?;
            self.kind = NodeKind::Root;
            return Ok(());
        }

        let mut parent_full_path_index = 0;
        let mut n = self;

        loop {
            let i = longest_common_prefix(path, &n.path);

            if i < n.path.len() {
                n.split_edge(i, prefix_of(&full_path, parent_full_path_index + i));
            }

            if i < path.len() {
                path = &path[i..];
                let c = path[0];

                // '/' after param
                if n.kind == NodeKind::Param && c == b'/' && n.children.len() == 1 {
                    parent_full_path_index += n.path.len();
                    n = &mut n.children[0];
                    n.priority += 1;
                    continue;
                }

                if let Some(pos) = n.indices.iter().position(|&index| index == c) {
                    parent_full_path_index += n.path.len();
                    let pos = n.increment_child_prio(pos);
                    n = &mut n.children[pos];
                    continue;
                }

                if c != b':' && c != b'*' && n.kind != NodeKind::CatchAll {
                    n.indices.push(c);
                    n.add_child(Node::with_full_path(Arc::clone(&full_path)));
                    let pos = n.increment_child_prio(n.indices.len() - 1);
                    n = &mut n.children[pos];
                } else if n.wild_child {
                    // the new wildcard must be the one already stored here
                    let last = n.children.len() - 1;
                    n = &mut n.children[last];
                    n.priority += 1;

                    if n.kind == NodeKind::CatchAll && n.path[..] == path[..] && n.handlers.is_some() {
                        return Err(RouteError::DuplicateRoute { path: full_path.to_string() });
                    }

                    let len = n.path.len();
                    if path.len() >= len
                        && n.path[..] == path[..len]
                        && n.kind != NodeKind::CatchAll
                        && (len >= path.len() || path[len] == b'/')
                    {
                        continue;
                    }

                    let segment = if n.kind == NodeKind::CatchAll {
                        path
                    } else {
                        path.split(|&b| b == b'/').next().unwrap_or(path)
                    };
                    let segment = String::from_utf8_lossy(segment);
                    let wildcard = String::from_utf8_lossy(&n.path);
                    let prefix = match full_path.find(segment.as_ref()) {
                        Some(idx) => format!("{}{}", &full_path[..idx], wildcard),
                        None => wildcard.to_string(),
                    };
                    return Err(RouteError::conflict(&*segment, &*full_path, &*wildcard, prefix.as_str()));
                }

                return n.insert_child(path, &full_path, handlers);
            }

            if n.handlers.is_some() {
                return Err(RouteError::DuplicateRoute { path: full_path.to_string() });
            }
            n.handlers = Some(handlers);
            n.full_path = full_path;
            return Ok(());
        }
    }

    fn insert_child(&mut self, mut path: &[u8], full_path: &Arc<str>, handlers: HandlersChain) -> Result<(), RouteError> {
        let mut n = self;

        while let Some((wildcard, i, valid)) = find_wildcard(path) {
            if !valid {
                return Err(RouteError::MultipleWildcards {
                    segment: String::from_utf8_lossy(wildcard).into_owned(),
                    path: full_path.to_string(),
                });
            }
            if wildcard.len() < 2 {
                return Err(RouteError::EmptyWildcardName { path: full_path.to_string() });
            }

            if wildcard[0] == b':' {
                if i > 0 {
                    n.path = path[..i].to_vec();
                    path = &path[i..];
                }

                let mut child = Node::with_full_path(Arc::clone(full_path));
                child.kind = NodeKind::Param;
                child.path = wildcard.to_vec();
                let pos = n.add_child(child);
                n.wild_child = true;
                n = &mut n.children[pos];
                n.priority += 1;

                // a static sub path starting with '/' follows the wildcard
                if wildcard.len() < path.len() {
                    path = &path[wildcard.len()..];
                    let mut child = Node::with_full_path(Arc::clone(full_path));
                    child.priority = 1;
                    let pos = n.add_child(child);
                    n = &mut n.children[pos];
                    continue;
                }

                n.handlers = Some(handlers);
                return Ok(());
            }

            // catch-all
            if i + wildcard.len() != path.len() {
                return Err(RouteError::CatchAllNotAtEnd { path: full_path.to_string() });
            }

            if n.path.last() == Some(&b'/') {
                let existing = n
                    .children
                    .first()
                    .map(|child| child.path.split(|&b| b == b'/').next().unwrap_or_default())
                    .unwrap_or_default();
                let existing = String::from_utf8_lossy(existing).into_owned();
                return Err(RouteError::CatchAllConflict {
                    segment: String::from_utf8_lossy(path).into_owned(),
                    path: full_path.to_string(),
                    prefix: format!("{}{}", String::from_utf8_lossy(&n.path), existing),
                    existing,
                });
            }

            if i == 0 || path[i - 1] != b'/' {
                return Err(RouteError::NoSlashBeforeCatchAll { path: full_path.to_string() });
            }
            let i = i - 1;
            n.path = path[..i].to_vec();

            // an empty catch-all node, holding the leaf that binds the value
            let mut child = Node::with_full_path(Arc::clone(full_path));
            child.kind = NodeKind::CatchAll;
            child.wild_child = true;
            let pos = n.add_child(child);
            n.indices = vec![b'/'];
            n = &mut n.children[pos];
            n.priority += 1;

            let mut leaf = Node::with_full_path(Arc::clone(full_path));
            leaf.kind = NodeKind::CatchAll;
            leaf.path = path[i..].to_vec();
            leaf.handlers = Some(handlers);
            leaf.priority = 1;
            n.children = vec![leaf];
            return Ok(());
        }

        n.path = path.to_vec();
        n.handlers = Some(handlers);
        n.full_path = Arc::clone(full_path);
        Ok(())
    }

    /// Looks up the handlers registered for `path`, appending wildcard values
    /// to `params` in pattern order.
    ///
    /// With `unescape`, parameter values are percent-decoded.
    pub(crate) fn get_value<'t>(&'t self, path: &str, params: &mut Params, unescape: bool) -> NodeValue<'t> {
        let mut value = NodeValue::default();
        let mut skipped: Vec<SkippedNode<'t, '_>> = Vec::new();
        let mut path = path.as_bytes();
        let mut n = self;
        // set when resuming from a skipped node, whose static children were already tried
        let mut resumed = false;

        'walk: loop {
            let only_wildcard = mem::take(&mut resumed);
            let prefix = &n.path[..];

            if path.len() > prefix.len() && path.starts_with(prefix) {
                let whole = path;
                path = &path[prefix.len()..];

                if !only_wildcard {
                    let first = path[0];
                    if let Some(i) = n.indices.iter().position(|&index| index == first) {
                        if n.wild_child {
                            skipped.push(SkippedNode { path: whole, node: n, params_count: params.len() });
                        }
                        n = &n.children[i];
                        continue 'walk;
                    }
                }

                if !n.wild_child {
                    if path != b"/" {
                        if let Some(back) = pop_skipped(&mut skipped, path) {
                            path = back.path;
                            n = back.node;
                            params.truncate(back.params_count);
                            resumed = true;
                            continue 'walk;
                        }
                    }

                    value.tsr = path == b"/" && n.handlers.is_some();
                    return value;
                }

                let Some(wildcard) = n.children.last() else {
                    return value;
                };
                n = wildcard;

                match n.kind {
                    NodeKind::Param => {
                        let end = path.iter().position(|&b| b == b'/').unwrap_or(path.len());
                        params.push(String::from_utf8_lossy(&n.path[1..]), decode_value(&path[..end], unescape));

                        if end < path.len() {
                            if let Some(child) = n.children.first() {
                                path = &path[end..];
                                n = child;
                                continue 'walk;
                            }
                            value.tsr = path.len() == end + 1;
                            return value;
                        }

                        if let Some(handlers) = &n.handlers {
                            value.handlers = Some(handlers);
                            value.full_path = Some(&n.full_path);
                            return value;
                        }

                        if let [child] = n.children.as_slice() {
                            value.tsr = (child.path == b"/" && child.handlers.is_some())
                                || (child.path.is_empty() && child.indices == b"/");
                        }
                        return value;
                    }
                    NodeKind::CatchAll => {
                        params.push(String::from_utf8_lossy(&n.path[2..]), decode_value(path, unescape));
                        value.handlers = n.handlers.as_ref();
                        value.full_path = Some(&n.full_path);
                        return value;
                    }
                    NodeKind::Static | NodeKind::Root => return value,
                }
            }

            if path == prefix {
                if n.handlers.is_none() && path != b"/" {
                    if let Some(back) = pop_skipped(&mut skipped, path) {
                        path = back.path;
                        n = back.node;
                        params.truncate(back.params_count);
                        resumed = true;
                        continue 'walk;
                    }
                }

                if let Some(handlers) = &n.handlers {
                    value.handlers = Some(handlers);
                    value.full_path = Some(&n.full_path);
                    return value;
                }

                // a wildcard child means a handle with a trailing slash exists
                if path == b"/" && n.wild_child && n.kind != NodeKind::Root {
                    value.tsr = true;
                    return value;
                }
                if path == b"/" && n.kind == NodeKind::Static {
                    value.tsr = true;
                    return value;
                }

                if let Some(i) = n.indices.iter().position(|&index| index == b'/') {
                    let child = &n.children[i];
                    value.tsr = (child.path.len() == 1 && child.handlers.is_some())
                        || (child.kind == NodeKind::CatchAll
                            && child.children.first().is_some_and(|leaf| leaf.handlers.is_some()));
                }
                return value;
            }

            // nothing found, maybe the route exists with an extra trailing slash
            value.tsr = path == b"/"
                || (prefix.len() == path.len() + 1
                    && prefix[path.len()] == b'/'
                    && path == &prefix[..prefix.len() - 1]
                    && n.handlers.is_some());

            if !value.tsr && path != b"/" {
                if let Some(back) = pop_skipped(&mut skipped, path) {
                    path = back.path;
                    n = back.node;
                    params.truncate(back.params_count);
                    resumed = true;
                    continue 'walk;
                }
            }

            return value;
        }
    }

    /// Case-insensitive (ASCII) lookup returning the registered spelling of
    /// `path`. With `fix_trailing_slash`, a missing or superfluous trailing
    /// slash is corrected too.
    pub(crate) fn find_case_insensitive_path(&self, path: &str, fix_trailing_slash: bool) -> Option<String> {
        let mut fixed = Vec::with_capacity(path.len() + 1);
        if self.find_case_insensitive_rec(path.as_bytes(), &mut fixed, fix_trailing_slash) {
            String::from_utf8(fixed).ok()
        } else {
            None
        }
    }

    fn find_case_insensitive_rec(&self, path: &[u8], fixed: &mut Vec<u8>, fix: bool) -> bool {
        let start = fixed.len();

        match self.kind {
            NodeKind::Param => {
                let end = path.iter().position(|&b| b == b'/').unwrap_or(path.len());
                if end == 0 {
                    return false;
                }
                fixed.extend_from_slice(&path[..end]);
                let rest = &path[end..];

                if rest.is_empty() {
                    if self.handlers.is_some() {
                        return true;
                    }
                    if fix {
                        if let [child] = self.children.as_slice() {
                            if child.path == b"/" && child.handlers.is_some() {
                                fixed.push(b'/');
                                return true;
                            }
                        }
                    }
                } else if let Some(child) = self.children.first() {
                    if child.find_case_insensitive_rec(rest, fixed, fix) {
                        return true;
                    }
                } else if fix && rest == b"/" && self.handlers.is_some() {
                    return true;
                }

                fixed.truncate(start);
                false
            }
            NodeKind::CatchAll if self.path.is_empty() => {
                self.children.first().is_some_and(|leaf| leaf.find_case_insensitive_rec(path, fixed, fix))
            }
            NodeKind::CatchAll => {
                if path.first() == Some(&b'/') {
                    fixed.extend_from_slice(path);
                    return true;
                }
                false
            }
            NodeKind::Static | NodeKind::Root => {
                let len = self.path.len();

                if path.len() < len {
                    // only the trailing slash is missing
                    if fix
                        && self.handlers.is_some()
                        && path.len() + 1 == len
                        && self.path[len - 1] == b'/'
                        && path.eq_ignore_ascii_case(&self.path[..len - 1])
                    {
                        fixed.extend_from_slice(&self.path);
                        return true;
                    }
                    return false;
                }

                if !path[..len].eq_ignore_ascii_case(&self.path) {
                    return false;
                }

                fixed.extend_from_slice(&self.path);
                let rest = &path[len..];

                if rest.is_empty() {
                    if self.handlers.is_some() {
                        return true;
                    }
                    if fix {
                        if let Some(i) = self.indices.iter().position(|&index| index == b'/') {
                            let child = &self.children[i];
                            if (child.path == b"/" && child.handlers.is_some())
                                || (child.kind == NodeKind::CatchAll
                                    && child.children.first().is_some_and(|leaf| leaf.handlers.is_some()))
                            {
                                fixed.push(b'/');
                                return true;
                            }
                        }
                    }
                    fixed.truncate(start);
                    return false;
                }

                let first = rest[0];
                for (i, index) in self.indices.iter().enumerate() {
                    if index.eq_ignore_ascii_case(&first) && self.children[i].find_case_insensitive_rec(rest, fixed, fix) {
                        return true;
                    }
                }

                if self.wild_child {
                    if let Some(wildcard) = self.children.last() {
                        if wildcard.find_case_insensitive_rec(rest, fixed, fix) {
                            return true;
                        }
                    }
                }

                // drop a superfluous trailing slash
                if fix && rest == b"/" && self.handlers.is_some() {
                    return true;
                }

                fixed.truncate(start);
                false
            }
        }
    }

    fn collect_routes(&self, method: &Method, routes: &mut Vec<RouteInfo>) {
        if let Some(handlers) = &self.handlers {
            routes.push(RouteInfo {
                method: method.clone(),
                path: self.full_path.to_string(),
                handler: handlers.last().map(|handler| handler.name()).unwrap_or_default(),
                handlers: handlers.len(),
            });
        }
        for child in &self.children {
            child.collect_routes(method, routes);
        }
    }
}

fn pop_skipped<'t, 'p>(skipped: &mut Vec<SkippedNode<'t, 'p>>, path: &[u8]) -> Option<SkippedNode<'t, 'p>> {
    while let Some(node) = skipped.pop() {
        if node.path.ends_with(path) {
            return Some(node);
        }
    }
    None
}

fn decode_value(raw: &[u8], unescape: bool) -> String {
    let raw = String::from_utf8_lossy(raw);
    if unescape {
        if let Cow::Owned(decoded) = unescape_value(&raw) {
            return decoded;
        }
    }
    raw.into_owned()
}

fn prefix_of(full_path: &str, len: usize) -> Arc<str> {
    let bytes = full_path.as_bytes();
    Arc::from(String::from_utf8_lossy(&bytes[..len.min(bytes.len())]).as_ref())
}

fn longest_common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Finds the first wildcard segment in `path`, returning it, its offset, and
/// whether its name is free of further `:` or `*`.
fn find_wildcard(path: &[u8]) -> Option<(&[u8], usize, bool)> {
    let start = path.iter().position(|&c| c == b':' || c == b'*')?;
    let mut valid = true;
    for (end, &c) in path[start + 1..].iter().enumerate() {
        match c {
            b'/' => return Some((&path[start..start + 1 + end], start, valid)),
            b':' | b'*' => valid = false,
            _ => {}
        }
    }
    Some((&path[start..], start, valid))
}

/// Validates every wildcard of a pattern before the tree is touched.
fn check_pattern(full_path: &str) -> Result<(), RouteError> {
    let bytes = full_path.as_bytes();
    let mut offset = 0;

    while let Some((wildcard, i, valid)) = find_wildcard(&bytes[offset..]) {
        if !valid {
            return Err(RouteError::MultipleWildcards {
                segment: String::from_utf8_lossy(wildcard).into_owned(),
                path: full_path.to_string(),
            });
        }
        if wildcard.len() < 2 {
            return Err(RouteError::EmptyWildcardName { path: full_path.to_string() });
        }
        let start = offset + i;
        if wildcard[0] == b'*' {
            if start + wildcard.len() != bytes.len() {
                return Err(RouteError::CatchAllNotAtEnd { path: full_path.to_string() });
            }
            if start == 0 || bytes[start - 1] != b'/' {
                return Err(RouteError::NoSlashBeforeCatchAll { path: full_path.to_string() });
            }
        }
        offset = start + wildcard.len();
    }
    Ok(())
}

/// Number of wildcards in a pattern.
pub(crate) fn count_params(path: &str) -> usize {
    path.bytes().filter(|&b| b == b':' || b == b'*').count()
}

/// One tree per HTTP method, created on first registration.
#[derive(Debug, Default)]
pub(crate) struct MethodTrees {
    trees: Vec<(Method, Node)>,
}

impl MethodTrees {
    pub(crate) fn get(&self, method: &Method) -> Option<&Node> {
        self.trees.iter().find(|(m, _)| m == method).map(|(_, root)| root)
    }

    pub(crate) fn get_or_insert(&mut self, method: &Method) -> &mut Node {
        let pos = match self.trees.iter().position(|(m, _)| m == method) {
            Some(pos) => pos,
            None => {
                self.trees.push((method.clone(), Node::default()));
                self.trees.len() - 1
            }
        };
        &mut self.trees[pos].1
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Method, &Node)> {
        self.trees.iter().map(|(method, root)| (method, root))
    }

    pub(crate) fn routes(&self) -> Vec<RouteInfo> {
        let mut routes = Vec::new();
        for (method, root) in &self.trees {
            root.collect_routes(method, &mut routes);
        }
        routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::handler::IntoHandlers;
    use proptest::prelude::*;

    fn fake_handler(_ctx: &mut Context) {}

    fn chain() -> HandlersChain {
        HandlersChain::from(fake_handler.into_handlers())
    }

    fn build(routes: &[&str]) -> Node {
        let mut tree = Node::default();
        for route in routes {
            tree.add_route(route, chain()).unwrap_or_else(|e| panic!("failed to insert {route}: {e}"));
        }
        tree
    }

    struct Request {
        path: &'static str,
        nil_handler: bool,
        route: &'static str,
        params: &'static [(&'static str, &'static str)],
    }

    fn req(path: &'static str, route: &'static str, params: &'static [(&'static str, &'static str)]) -> Request {
        Request { path, nil_handler: false, route, params }
    }

    fn miss(path: &'static str) -> Request {
        Request { path, nil_handler: true, route: "", params: &[] }
    }

    fn check_requests(tree: &Node, requests: &[Request], unescape: bool) {
        for request in requests {
            let mut params = Params::new();
            let value = tree.get_value(request.path, &mut params, unescape);

            if request.nil_handler {
                assert!(value.handlers.is_none(), "handle mismatch for route '{}': expected none", request.path);
                continue;
            }

            assert!(value.handlers.is_some(), "handle mismatch for route '{}': expected some", request.path);
            assert_eq!(value.full_path.map(|p| p.as_ref()), Some(request.route), "route mismatch for '{}'", request.path);

            let expected: Params = request.params.iter().copied().collect();
            assert_eq!(params, expected, "params mismatch for route '{}'", request.path);
        }
    }

    fn check_priorities(node: &Node) -> u32 {
        let mut prio = 0;
        for child in &node.children {
            prio += check_priorities(child);
        }
        if node.handlers.is_some() {
            prio += 1;
        }
        assert_eq!(node.priority, prio, "priority mismatch for node '{}'", String::from_utf8_lossy(&node.path));
        prio
    }

    #[test]
    fn test_count_params() {
        assert_eq!(count_params("/path/:param1/static/*catch-all"), 2);
        assert_eq!(count_params(&"/:param".repeat(256)), 256);
    }

    #[test]
    fn test_tree_add_and_get() {
        let routes = ["/hi", "/contact", "/co", "/c", "/a", "/ab", "/doc/", "/doc/go_faq.html", "/doc/go1.html", "/α", "/β"];
        let tree = build(&routes);

        check_requests(
            &tree,
            &[
                req("/a", "/a", &[]),
                miss("/"),
                req("/hi", "/hi", &[]),
                req("/contact", "/contact", &[]),
                req("/co", "/co", &[]),
                miss("/con"),
                miss("/cona"),
                miss("/no"),
                req("/ab", "/ab", &[]),
                req("/α", "/α", &[]),
                req("/β", "/β", &[]),
            ],
            false,
        );

        check_priorities(&tree);
    }

    #[test]
    fn test_tree_wildcard() {
        let routes = [
            "/",
            "/cmd/:tool/",
            "/cmd/:tool/:sub",
            "/cmd/whoami",
            "/cmd/whoami/root",
            "/cmd/whoami/root/",
            "/src/*filepath",
            "/search/",
            "/search/:query",
            "/search/gin-gonic",
            "/search/google",
            "/user_:name",
            "/user_:name/about",
            "/files/:dir/*filepath",
            "/doc/",
            "/doc/go_faq.html",
            "/doc/go1.html",
            "/info/:user/public",
            "/info/:user/project/:project",
            "/info/:user/project/golang",
            "/aa/*xx",
            "/ab/*xx",
            "/:cc",
            "/c1/:dd/e",
            "/c1/:dd/e1",
            "/:cc/cc",
            "/:cc/:dd/ee",
            "/:cc/:dd/:ee/ff",
            "/:cc/:dd/:ee/:ff/gg",
            "/:cc/:dd/:ee/:ff/:gg/hh",
            "/get/test/abc/",
            "/get/:param/abc/",
            "/something/:paramname/thirdthing",
            "/something/secondthing/test",
            "/get/abc",
            "/get/:param",
            "/get/abc/123abc",
            "/get/abc/:param",
            "/get/abc/123abc/xxx8",
            "/get/abc/123abc/:param",
            "/get/abc/123abc/xxx8/1234",
            "/get/abc/123abc/xxx8/:param",
            "/get/abc/123abc/xxx8/1234/ffas",
            "/get/abc/123abc/xxx8/1234/:param",
            "/get/abc/123abc/xxx8/1234/kkdd/12c",
            "/get/abc/123abc/xxx8/1234/kkdd/:param",
            "/get/abc/:param/test",
            "/get/abc/123abd/:param",
            "/get/abc/123abddd/:param",
            "/get/abc/123/:param",
            "/get/abc/123abg/:param",
            "/get/abc/123abf/:param",
            "/get/abc/123abfff/:param",
        ];
        let tree = build(&routes);

        check_requests(
            &tree,
            &[
                req("/", "/", &[]),
                miss("/cmd/test"),
                req("/cmd/test/", "/cmd/:tool/", &[("tool", "test")]),
                req("/cmd/test/3", "/cmd/:tool/:sub", &[("tool", "test"), ("sub", "3")]),
                miss("/cmd/who"),
                req("/cmd/who/", "/cmd/:tool/", &[("tool", "who")]),
                miss("/cmd/whoami/"),
                req("/cmd/whoami/r", "/cmd/:tool/:sub", &[("tool", "whoami"), ("sub", "r")]),
                req("/cmd/whoami", "/cmd/whoami", &[]),
                req("/cmd/whoami/root", "/cmd/whoami/root", &[]),
                req("/cmd/whoami/root/", "/cmd/whoami/root/", &[]),
                req("/src/", "/src/*filepath", &[("filepath", "/")]),
                req("/src/some/file.png", "/src/*filepath", &[("filepath", "/some/file.png")]),
                req("/search/", "/search/", &[]),
                req("/search/someth!ng+in+ünìcodé", "/search/:query", &[("query", "someth!ng+in+ünìcodé")]),
                req("/search/gin", "/search/:query", &[("query", "gin")]),
                req("/search/gin-gonic", "/search/gin-gonic", &[]),
                req("/search/google", "/search/google", &[]),
                req("/user_gopher", "/user_:name", &[("name", "gopher")]),
                req("/user_gopher/about", "/user_:name/about", &[("name", "gopher")]),
                req("/files/js/inc/framework.js", "/files/:dir/*filepath", &[("dir", "js"), ("filepath", "/inc/framework.js")]),
                req("/info/gordon/public", "/info/:user/public", &[("user", "gordon")]),
                req("/info/gordon/project/go", "/info/:user/project/:project", &[("user", "gordon"), ("project", "go")]),
                req("/info/gordon/project/golang", "/info/:user/project/golang", &[("user", "gordon")]),
                req("/aa/aa", "/aa/*xx", &[("xx", "/aa")]),
                req("/ab/ab", "/ab/*xx", &[("xx", "/ab")]),
                req("/a", "/:cc", &[("cc", "a")]),
                req("/all", "/:cc", &[("cc", "all")]),
                req("/d", "/:cc", &[("cc", "d")]),
                req("/ad", "/:cc", &[("cc", "ad")]),
                req("/dd", "/:cc", &[("cc", "dd")]),
                req("/dddaa", "/:cc", &[("cc", "dddaa")]),
                req("/aa", "/:cc", &[("cc", "aa")]),
                req("/aaa", "/:cc", &[("cc", "aaa")]),
                req("/aaa/cc", "/:cc/cc", &[("cc", "aaa")]),
                req("/ab", "/:cc", &[("cc", "ab")]),
                req("/abb", "/:cc", &[("cc", "abb")]),
                req("/abb/cc", "/:cc/cc", &[("cc", "abb")]),
                req("/allxxxx", "/:cc", &[("cc", "allxxxx")]),
                req("/alldd", "/:cc", &[("cc", "alldd")]),
                req("/all/cc", "/:cc/cc", &[("cc", "all")]),
                req("/a/cc", "/:cc/cc", &[("cc", "a")]),
                req("/c1/d/e", "/c1/:dd/e", &[("dd", "d")]),
                req("/c1/d/e1", "/c1/:dd/e1", &[("dd", "d")]),
                req("/c1/d/ee", "/:cc/:dd/ee", &[("cc", "c1"), ("dd", "d")]),
                req("/cc/cc", "/:cc/cc", &[("cc", "cc")]),
                req("/ccc/cc", "/:cc/cc", &[("cc", "ccc")]),
                req("/deedwjfs/cc", "/:cc/cc", &[("cc", "deedwjfs")]),
                req("/acllcc/cc", "/:cc/cc", &[("cc", "acllcc")]),
                req("/get/test/abc/", "/get/test/abc/", &[]),
                req("/get/te/abc/", "/get/:param/abc/", &[("param", "te")]),
                req("/get/testaa/abc/", "/get/:param/abc/", &[("param", "testaa")]),
                req("/get/xx/abc/", "/get/:param/abc/", &[("param", "xx")]),
                req("/get/tt/abc/", "/get/:param/abc/", &[("param", "tt")]),
                req("/get/a/abc/", "/get/:param/abc/", &[("param", "a")]),
                req("/get/t/abc/", "/get/:param/abc/", &[("param", "t")]),
                req("/get/aa/abc/", "/get/:param/abc/", &[("param", "aa")]),
                req("/get/abas/abc/", "/get/:param/abc/", &[("param", "abas")]),
                req("/something/secondthing/test", "/something/secondthing/test", &[]),
                req("/something/abcdad/thirdthing", "/something/:paramname/thirdthing", &[("paramname", "abcdad")]),
                req("/something/secondthingaaaa/thirdthing", "/something/:paramname/thirdthing", &[("paramname", "secondthingaaaa")]),
                req("/something/se/thirdthing", "/something/:paramname/thirdthing", &[("paramname", "se")]),
                req("/something/s/thirdthing", "/something/:paramname/thirdthing", &[("paramname", "s")]),
                req("/c/d/ee", "/:cc/:dd/ee", &[("cc", "c"), ("dd", "d")]),
                req("/c/d/e/ff", "/:cc/:dd/:ee/ff", &[("cc", "c"), ("dd", "d"), ("ee", "e")]),
                req("/c/d/e/f/gg", "/:cc/:dd/:ee/:ff/gg", &[("cc", "c"), ("dd", "d"), ("ee", "e"), ("ff", "f")]),
                req(
                    "/c/d/e/f/g/hh",
                    "/:cc/:dd/:ee/:ff/:gg/hh",
                    &[("cc", "c"), ("dd", "d"), ("ee", "e"), ("ff", "f"), ("gg", "g")],
                ),
                req("/cc/dd/ee/ff/gg/hh", "/:cc/:dd/:ee/:ff/:gg/hh", &[("cc", "cc"), ("dd", "dd"), ("ee", "ee"), ("ff", "ff"), ("gg", "gg")]),
                req("/get/abc", "/get/abc", &[]),
                req("/get/a", "/get/:param", &[("param", "a")]),
                req("/get/abz", "/get/:param", &[("param", "abz")]),
                req("/get/12a", "/get/:param", &[("param", "12a")]),
                req("/get/abcd", "/get/:param", &[("param", "abcd")]),
                req("/get/abc/123abc", "/get/abc/123abc", &[]),
                req("/get/abc/12", "/get/abc/:param", &[("param", "12")]),
                req("/get/abc/123ab", "/get/abc/:param", &[("param", "123ab")]),
                req("/get/abc/xyz", "/get/abc/:param", &[("param", "xyz")]),
                req("/get/abc/123abcddxx", "/get/abc/:param", &[("param", "123abcddxx")]),
                req("/get/abc/123abc/xxx8", "/get/abc/123abc/xxx8", &[]),
                req("/get/abc/123abc/x", "/get/abc/123abc/:param", &[("param", "x")]),
                req("/get/abc/123abc/xxx", "/get/abc/123abc/:param", &[("param", "xxx")]),
                req("/get/abc/123abc/abc", "/get/abc/123abc/:param", &[("param", "abc")]),
                req("/get/abc/123abc/xxx8xxas", "/get/abc/123abc/:param", &[("param", "xxx8xxas")]),
                req("/get/abc/123abc/xxx8/1234", "/get/abc/123abc/xxx8/1234", &[]),
                req("/get/abc/123abc/xxx8/1", "/get/abc/123abc/xxx8/:param", &[("param", "1")]),
                req("/get/abc/123abc/xxx8/123", "/get/abc/123abc/xxx8/:param", &[("param", "123")]),
                req("/get/abc/123abc/xxx8/78k", "/get/abc/123abc/xxx8/:param", &[("param", "78k")]),
                req("/get/abc/123abc/xxx8/1234xxxd", "/get/abc/123abc/xxx8/:param", &[("param", "1234xxxd")]),
                req("/get/abc/123abc/xxx8/1234/ffas", "/get/abc/123abc/xxx8/1234/ffas", &[]),
                req("/get/abc/123abc/xxx8/1234/f", "/get/abc/123abc/xxx8/1234/:param", &[("param", "f")]),
                req("/get/abc/123abc/xxx8/1234/ffa", "/get/abc/123abc/xxx8/1234/:param", &[("param", "ffa")]),
                req("/get/abc/123abc/xxx8/1234/kka", "/get/abc/123abc/xxx8/1234/:param", &[("param", "kka")]),
                req("/get/abc/123abc/xxx8/1234/ffas321", "/get/abc/123abc/xxx8/1234/:param", &[("param", "ffas321")]),
                req("/get/abc/123abc/xxx8/1234/kkdd/12c", "/get/abc/123abc/xxx8/1234/kkdd/12c", &[]),
                req("/get/abc/123abc/xxx8/1234/kkdd/1", "/get/abc/123abc/xxx8/1234/kkdd/:param", &[("param", "1")]),
                req("/get/abc/123abc/xxx8/1234/kkdd/12", "/get/abc/123abc/xxx8/1234/kkdd/:param", &[("param", "12")]),
                req("/get/abc/123abc/xxx8/1234/kkdd/12b", "/get/abc/123abc/xxx8/1234/kkdd/:param", &[("param", "12b")]),
                req("/get/abc/123abc/xxx8/1234/kkdd/34", "/get/abc/123abc/xxx8/1234/kkdd/:param", &[("param", "34")]),
                req("/get/abc/123abc/xxx8/1234/kkdd/12c2e3", "/get/abc/123abc/xxx8/1234/kkdd/:param", &[("param", "12c2e3")]),
                req("/get/abc/12/test", "/get/abc/:param/test", &[("param", "12")]),
                req("/get/abc/123abdd/test", "/get/abc/:param/test", &[("param", "123abdd")]),
                req("/get/abc/123abdddf/test", "/get/abc/:param/test", &[("param", "123abdddf")]),
                req("/get/abc/123ab/test", "/get/abc/:param/test", &[("param", "123ab")]),
                req("/get/abc/123abgg/test", "/get/abc/:param/test", &[("param", "123abgg")]),
                req("/get/abc/123abff/test", "/get/abc/:param/test", &[("param", "123abff")]),
                req("/get/abc/123abffff/test", "/get/abc/:param/test", &[("param", "123abffff")]),
                req("/get/abc/123abd/test", "/get/abc/123abd/:param", &[("param", "test")]),
                req("/get/abc/123abddd/test", "/get/abc/123abddd/:param", &[("param", "test")]),
                req("/get/abc/123/test22", "/get/abc/123/:param", &[("param", "test22")]),
                req("/get/abc/123abg/test", "/get/abc/123abg/:param", &[("param", "test")]),
                req("/get/abc/123abf/testss", "/get/abc/123abf/:param", &[("param", "testss")]),
                req("/get/abc/123abfff/te", "/get/abc/123abfff/:param", &[("param", "te")]),
            ],
            false,
        );

        check_priorities(&tree);
    }

    #[test]
    fn test_unescape_parameters() {
        let tree = build(&["/", "/cmd/:tool/:sub", "/src/*filepath", "/search/:query", "/files/:dir/*filepath", "/info/:user/project/:project", "/info/:user"]);

        check_requests(
            &tree,
            &[
                req("/", "/", &[]),
                req("/src/some/file.png", "/src/*filepath", &[("filepath", "/some/file.png")]),
                req("/src/some/file+test.png", "/src/*filepath", &[("filepath", "/some/file test.png")]),
                req("/src/some/file++++%%%%test.png", "/src/*filepath", &[("filepath", "/some/file++++%%%%test.png")]),
                req("/src/some/file%2Ftest.png", "/src/*filepath", &[("filepath", "/some/file/test.png")]),
                req("/search/someth!ng+in+ünìcodé", "/search/:query", &[("query", "someth!ng in ünìcodé")]),
                req("/info/gordon/project/go", "/info/:user/project/:project", &[("user", "gordon"), ("project", "go")]),
                req("/info/slash%2Fgordon", "/info/:user", &[("user", "slash/gordon")]),
                req("/info/slash%2Fgordon/project/Project%20%231", "/info/:user/project/:project", &[("user", "slash/gordon"), ("project", "Project #1")]),
                req("/info/slash%%%%", "/info/:user", &[("user", "slash%%%%")]),
                req("/info/slash%%%%2Fgordon/project/Project%%%%20%231", "/info/:user/project/:project", &[("user", "slash%%%%2Fgordon"), ("project", "Project%%%%20%231")]),
            ],
            true,
        );
    }

    fn conflicts(routes: &[(&str, bool)]) {
        let mut tree = Node::default();
        for &(route, conflict) in routes {
            let result = tree.add_route(route, chain());
            assert_eq!(result.is_err(), conflict, "unexpected result for route '{route}': {result:?}");
        }
    }

    #[test]
    fn test_tree_wildcard_conflict() {
        conflicts(&[
            ("/cmd/:tool/:sub", false),
            ("/cmd/vet", false),
            ("/foo/bar", false),
            ("/foo/:name", false),
            ("/foo/:names", true),
            ("/cmd/*path", true),
            ("/cmd/:badvar", true),
            ("/cmd/:tool/names", false),
            ("/cmd/:tool/:badsub/details", true),
            ("/src/*filepath", false),
            ("/src/:file", true),
            ("/src/static.json", true),
            ("/src/*filepathx", true),
            ("/src/", true),
            ("/src/foo/bar", true),
            ("/src1/", false),
            ("/src1/*filepath", true),
            ("/src2*filepath", true),
            ("/src2/*filepath", false),
            ("/search/:query", false),
            ("/search/valid", false),
            ("/user_:name", false),
            ("/user_x", false),
            ("/user_:name", true),
            ("/id:id", false),
            ("/id/:id", false),
        ]);
    }

    #[test]
    fn test_tree_child_conflict() {
        conflicts(&[
            ("/cmd/vet", false),
            ("/cmd/:tool", false),
            ("/cmd/:tool/:sub", false),
            ("/cmd/:tool/misc", false),
            ("/cmd/:tool/:othersub", true),
            ("/src/AUTHORS", false),
            ("/src/*filepath", true),
            ("/user_x", false),
            ("/user_:name", false),
            ("/id/:id", false),
            ("/id:id", false),
            ("/:id", false),
            ("/*filepath", true),
        ]);
    }

    #[test]
    fn test_tree_duplicate_path() {
        let mut tree = Node::default();
        for route in ["/", "/doc/", "/src/*filepath", "/search/:query", "/user_:name"] {
            assert_eq!(tree.add_route(route, chain()), Ok(()));
            assert_eq!(tree.add_route(route, chain()), Err(RouteError::DuplicateRoute { path: route.to_string() }));
        }
        // same position, different catch-all name
        assert!(matches!(tree.add_route("/src/*path", chain()), Err(RouteError::Conflict { .. })));

        check_requests(
            &tree,
            &[
                req("/", "/", &[]),
                req("/doc/", "/doc/", &[]),
                req("/src/some/file.png", "/src/*filepath", &[("filepath", "/some/file.png")]),
                req("/search/someth!ng+in+ünìcodé", "/search/:query", &[("query", "someth!ng+in+ünìcodé")]),
                req("/user_gopher", "/user_:name", &[("name", "gopher")]),
            ],
            false,
        );
    }

    #[test]
    fn test_invalid_patterns() {
        let mut tree = Node::default();
        for route in ["/user:", "/user:/", "/cmd/:/", "/src/*"] {
            assert_eq!(tree.add_route(route, chain()), Err(RouteError::EmptyWildcardName { path: route.to_string() }));
        }
        for route in ["/:foo:bar", "/:foo:bar/", "/:foo*bar"] {
            assert!(matches!(tree.add_route(route, chain()), Err(RouteError::MultipleWildcards { .. })));
        }
        assert_eq!(
            tree.add_route("/src/*filepath/x", chain()),
            Err(RouteError::CatchAllNotAtEnd { path: "/src/*filepath/x".to_string() })
        );
        assert_eq!(
            tree.add_route("/src2*filepath", chain()),
            Err(RouteError::NoSlashBeforeCatchAll { path: "/src2*filepath".to_string() })
        );
    }

    #[test]
    fn test_conflict_messages() {
        let mut tree = build(&["/cmd/:tool/:sub"]);
        let err = tree.add_route("/cmd/:badvar", chain()).err().map(|e| e.to_string());
        assert_eq!(
            err.as_deref(),
            Some("':badvar' in new path '/cmd/:badvar' conflicts with existing wildcard ':tool' in existing prefix '/cmd/:tool'")
        );

        let mut tree = build(&["/src/static.json"]);
        let err = tree.add_route("/src/*filepath", chain()).err().map(|e| e.to_string());
        assert_eq!(
            err.as_deref(),
            Some("catch-all wildcard '*filepath' in new path '/src/*filepath' conflicts with existing path segment 'static.json' in existing prefix '/src/static.json'")
        );
    }

    #[test]
    fn test_tree_trailing_slash_redirect() {
        let routes = [
            "/hi",
            "/b/",
            "/search/:query",
            "/cmd/:tool/",
            "/src/*filepath",
            "/x",
            "/x/y",
            "/y/",
            "/y/z",
            "/0/:id",
            "/0/:id/1",
            "/1/:id/",
            "/1/:id/2",
            "/aa",
            "/a/",
            "/admin",
            "/admin/:category",
            "/admin/:category/:page",
            "/doc",
            "/doc/go_faq.html",
            "/doc/go1.html",
            "/no/a",
            "/no/b",
            "/api/:page/:name",
            "/api/hello/:name/bar/",
            "/api/bar/:name",
            "/api/baz/foo",
            "/api/baz/foo/bar",
            "/blog/:p",
            "/posts/:b/:c",
            "/posts/b/:c/d/",
            "/vendor/:x/*y",
        ];
        let tree = build(&routes);

        let tsr_routes = [
            "/hi/",
            "/b",
            "/search/gopher/",
            "/cmd/vet",
            "/src",
            "/x/",
            "/y",
            "/0/go/",
            "/1/go",
            "/a",
            "/admin/",
            "/admin/config/",
            "/admin/config/permissions/",
            "/doc/",
            "/admin/static/",
            "/admin/cfg/",
            "/admin/cfg/users/",
            "/api/hello/x/bar",
            "/api/baz/foo/",
            "/api/baz/bax/",
            "/api/bar/huh/",
            "/api/baz/foo/bar/",
            "/api/world/abc/",
            "/blog/pp/",
            "/posts/b/c/d",
            "/vendor/x",
        ];
        for route in tsr_routes {
            let mut params = Params::new();
            let value = tree.get_value(route, &mut params, false);
            assert!(value.handlers.is_none(), "non-nil handler for TSR route '{route}'");
            assert!(value.tsr, "expected TSR recommendation for route '{route}'");
        }

        let no_tsr_routes = ["/", "/no", "/no/", "/_", "/_/", "/api", "/api/", "/api/hello/x/foo", "/api/baz/foo/bad", "/foo/p/p"];
        for route in no_tsr_routes {
            let mut params = Params::new();
            let value = tree.get_value(route, &mut params, false);
            assert!(value.handlers.is_none(), "non-nil handler for no-TSR route '{route}'");
            assert!(!value.tsr, "expected no TSR recommendation for route '{route}'");
        }
    }

    #[test]
    fn test_tree_root_trailing_slash_redirect() {
        let tree = build(&["/:test"]);
        let mut params = Params::new();
        let value = tree.get_value("/", &mut params, false);
        assert!(value.handlers.is_none());
        assert!(!value.tsr);
    }

    #[test]
    fn test_tree_find_case_insensitive_path() {
        let routes = [
            "/hi",
            "/b/",
            "/ABC/",
            "/search/:query",
            "/cmd/:tool/",
            "/src/*filepath",
            "/x",
            "/x/y",
            "/y/",
            "/y/z",
            "/0/:id",
            "/0/:id/1",
            "/1/:id/",
            "/1/:id/2",
            "/aa",
            "/a/",
            "/doc",
            "/doc/go_faq.html",
            "/doc/go1.html",
            "/doc/go/away",
            "/no/a",
            "/no/b",
            "/Π",
            "/u/apfêl/",
            "/w/♬",
        ];
        let tree = build(&routes);

        // every route must be found in its own spelling
        for route in routes {
            assert_eq!(tree.find_case_insensitive_path(route, true).as_deref(), Some(route), "route '{route}' not found");
            assert_eq!(tree.find_case_insensitive_path(route, false).as_deref(), Some(route), "route '{route}' not found");
        }

        let cases: [(&str, &str, bool, bool); 28] = [
            ("/HI", "/hi", true, false),
            ("/HI/", "/hi", true, true),
            ("/B", "/b/", true, true),
            ("/B/", "/b/", true, false),
            ("/abc", "/ABC/", true, true),
            ("/abc/", "/ABC/", true, false),
            ("/aBc", "/ABC/", true, true),
            ("/aBc/", "/ABC/", true, false),
            ("/abC", "/ABC/", true, true),
            ("/abC/", "/ABC/", true, false),
            ("/SEARCH/QUERY", "/search/QUERY", true, false),
            ("/SEARCH/QUERY/", "/search/QUERY", true, true),
            ("/CMD/TOOL/", "/cmd/TOOL/", true, false),
            ("/CMD/TOOL", "/cmd/TOOL/", true, true),
            ("/SRC/FILE/PATH", "/src/FILE/PATH", true, false),
            ("/x/Y", "/x/y", true, false),
            ("/x/Y/", "/x/y", true, true),
            ("/X/y", "/x/y", true, false),
            ("/X/y/", "/x/y", true, true),
            ("/X/Y", "/x/y", true, false),
            ("/X/Y/", "/x/y", true, true),
            ("/Y/", "/y/", true, false),
            ("/Y", "/y/", true, true),
            ("/Y/z", "/y/z", true, false),
            ("/Y/z/", "/y/z", true, true),
            ("/DOC/GO/AWAY", "/doc/go/away", true, false),
            ("/0/ID/1", "/0/ID/1", true, false),
            ("/1/ID/2/", "/1/ID/2", true, true),
        ];

        for (input, expected, found, slash) in cases {
            let fixed = tree.find_case_insensitive_path(input, true);
            assert_eq!(fixed.is_some(), found, "wrong result for '{input}'");
            if found {
                assert_eq!(fixed.as_deref(), Some(expected), "wrong fixed path for '{input}'");
            }

            let strict = tree.find_case_insensitive_path(input, false);
            if slash {
                assert!(strict.is_none(), "found '{input}' without trailing slash fixing");
            } else {
                assert_eq!(strict.as_deref(), Some(expected), "wrong strict result for '{input}'");
            }
        }

        assert_eq!(tree.find_case_insensitive_path("/NOPE", true), None);
        assert_eq!(tree.find_case_insensitive_path("/no", true), None);
    }

    #[test]
    fn test_routes_listing() {
        let tree = build(&["/a", "/b/:id", "/c/*rest"]);
        let mut trees = MethodTrees::default();
        *trees.get_or_insert(&Method::GET) = tree;

        let mut paths: Vec<String> = trees.routes().into_iter().map(|route| route.path).collect();
        paths.sort();
        assert_eq!(paths, ["/a", "/b/:id", "/c/*rest"]);
        assert!(trees.get(&Method::POST).is_none());
    }

    #[test]
    fn test_scenarios() {
        let tree = build(&["/users/:id", "/files/*path", "/foo", "/foo/bar", "/foo/baz"]);
        check_requests(
            &tree,
            &[
                req("/users/42", "/users/:id", &[("id", "42")]),
                req("/files/a/b/c.txt", "/files/*path", &[("path", "/a/b/c.txt")]),
                req("/foo/bar", "/foo/bar", &[]),
                miss("/foo/bax"),
            ],
            false,
        );
    }

    // a fixed pool of non-conflicting patterns, each paired with a path it must match
    const POOL: [(&str, &str); 12] = [
        ("/", "/"),
        ("/users", "/users"),
        ("/users/:id", "/users/7"),
        ("/users/:id/posts", "/users/7/posts"),
        ("/users/new", "/users/new"),
        ("/static/*filepath", "/static/css/site.css"),
        ("/api/v1/items", "/api/v1/items"),
        ("/api/v1/items/:item", "/api/v1/items/9"),
        ("/api/:version/health", "/api/v2/health"),
        ("/blog/:slug", "/blog/hello"),
        ("/blog/:slug/comments/:comment", "/blog/hello/comments/3"),
        ("/about", "/about"),
    ];

    fn lookup(tree: &Node, path: &str) -> (Option<String>, Params) {
        let mut params = Params::new();
        let value = tree.get_value(path, &mut params, false);
        let route = value.handlers.and(value.full_path).map(|p| p.to_string());
        if route.is_none() {
            params.clear();
        }
        (route, params)
    }

    proptest! {
        #[test]
        fn match_is_independent_of_registration_order(order in Just((0..POOL.len()).collect::<Vec<_>>()).prop_shuffle()) {
            let mut shuffled = Node::default();
            for &i in &order {
                prop_assert!(shuffled.add_route(POOL[i].0, chain()).is_ok());
            }
            let reference = build(&POOL.map(|(route, _)| route));

            for (_, path) in POOL {
                prop_assert_eq!(lookup(&shuffled, path), lookup(&reference, path));
            }
            for path in ["/users/7/other", "/api/v1/items/9/x", "/nope", "/blog", "/static"] {
                prop_assert_eq!(lookup(&shuffled, path), lookup(&reference, path));
            }
        }

        #[test]
        fn params_follow_pattern_order(a in "[a-z0-9]{1,8}", b in "[a-z0-9]{1,8}") {
            let tree = build(&["/blog/:slug/comments/:comment"]);
            let (_, params) = lookup(&tree, &format!("/blog/{a}/comments/{b}"));
            let keys: Vec<&str> = params.iter().map(|p| p.key.as_str()).collect();
            prop_assert_eq!(keys, vec!["slug", "comment"]);
            prop_assert_eq!(params.get("slug"), Some(a.as_str()));
            prop_assert_eq!(params.get("comment"), Some(b.as_str()));
        }
    }
}
