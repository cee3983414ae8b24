//! Route tables shared by the router benchmarks.

#[derive(Debug, Copy, Clone)]
pub struct RouteTable {
    name: &'static str,
    group: TestGroup,
    routes: &'static [(&'static str, &'static str)],
}

impl RouteTable {
    pub const fn new(name: &'static str, group: TestGroup, routes: &'static [(&'static str, &'static str)]) -> Self {
        Self { name, group, routes }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    /// `(method, pattern)` pairs.
    pub fn routes(&self) -> &'static [(&'static str, &'static str)] {
        self.routes
    }

    /// A concrete request path for every pattern: `:name` becomes `name` and
    /// `*name` becomes `name/x`.
    pub fn request_paths(&self) -> Vec<(&'static str, String)> {
        self.routes.iter().map(|&(method, pattern)| (method, sample_path(pattern))).collect()
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

fn sample_path(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|segment| match segment.as_bytes().first() {
            Some(b':') => segment[1..].to_string(),
            Some(b'*') => format!("{}/x", &segment[1..]),
            _ => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub static STATIC_ROUTES: RouteTable = RouteTable::new(
    "static",
    TestGroup::Small,
    &[
        ("GET", "/"),
        ("GET", "/cmd.html"),
        ("GET", "/code.html"),
        ("GET", "/contrib.html"),
        ("GET", "/docs.html"),
        ("GET", "/help.html"),
        ("GET", "/install.html"),
        ("GET", "/project.html"),
        ("GET", "/search.html"),
        ("GET", "/doc/articles/wiki/"),
        ("GET", "/doc/articles/wiki/edit.html"),
        ("GET", "/doc/articles/wiki/final.go"),
        ("GET", "/doc/codewalk/functions.xml"),
        ("GET", "/doc/codewalk/markov.xml"),
        ("GET", "/doc/devel/release.html"),
        ("GET", "/doc/gopher/frontpage.png"),
        ("GET", "/pkg/net/http/"),
        ("GET", "/pkg/net/http/cgi/"),
        ("GET", "/pkg/net/http/httptest/"),
        ("GET", "/pkg/net/url/"),
    ],
);

pub static PARSE_API: RouteTable = RouteTable::new(
    "parse",
    TestGroup::Normal,
    &[
        ("POST", "/1/classes/:className"),
        ("GET", "/1/classes/:className/:objectId"),
        ("PUT", "/1/classes/:className/:objectId"),
        ("GET", "/1/classes/:className"),
        ("DELETE", "/1/classes/:className/:objectId"),
        ("POST", "/1/users"),
        ("GET", "/1/login"),
        ("GET", "/1/users/:objectId"),
        ("PUT", "/1/users/:objectId"),
        ("GET", "/1/users"),
        ("DELETE", "/1/users/:objectId"),
        ("POST", "/1/requestPasswordReset"),
        ("POST", "/1/roles"),
        ("GET", "/1/roles/:objectId"),
        ("PUT", "/1/roles/:objectId"),
        ("GET", "/1/roles"),
        ("DELETE", "/1/roles/:objectId"),
        ("POST", "/1/files/:fileName"),
        ("POST", "/1/events/:eventName"),
        ("POST", "/1/push"),
        ("POST", "/1/installations"),
        ("GET", "/1/installations/:objectId"),
        ("PUT", "/1/installations/:objectId"),
        ("GET", "/1/installations"),
        ("DELETE", "/1/installations/:objectId"),
        ("POST", "/1/functions"),
    ],
);

pub static GITHUB_API: RouteTable = RouteTable::new(
    "github",
    TestGroup::Large,
    &[
        ("GET", "/authorizations"),
        ("GET", "/authorizations/:id"),
        ("POST", "/authorizations"),
        ("DELETE", "/authorizations/:id"),
        ("GET", "/applications/:client_id/tokens/:access_token"),
        ("DELETE", "/applications/:client_id/tokens"),
        ("DELETE", "/applications/:client_id/tokens/:access_token"),
        ("GET", "/events"),
        ("GET", "/repos/:owner/:repo/events"),
        ("GET", "/networks/:owner/:repo/events"),
        ("GET", "/orgs/:org/events"),
        ("GET", "/users/:user/received_events"),
        ("GET", "/users/:user/received_events/public"),
        ("GET", "/users/:user/events"),
        ("GET", "/users/:user/events/public"),
        ("GET", "/users/:user/events/orgs/:org"),
        ("GET", "/feeds"),
        ("GET", "/notifications"),
        ("GET", "/repos/:owner/:repo/notifications"),
        ("PUT", "/notifications"),
        ("PUT", "/repos/:owner/:repo/notifications"),
        ("GET", "/notifications/threads/:id"),
        ("GET", "/notifications/threads/:id/subscription"),
        ("PUT", "/notifications/threads/:id/subscription"),
        ("DELETE", "/notifications/threads/:id/subscription"),
        ("GET", "/repos/:owner/:repo/stargazers"),
        ("GET", "/users/:user/starred"),
        ("GET", "/user/starred"),
        ("GET", "/user/starred/:owner/:repo"),
        ("PUT", "/user/starred/:owner/:repo"),
        ("DELETE", "/user/starred/:owner/:repo"),
        ("GET", "/repos/:owner/:repo/subscribers"),
        ("GET", "/users/:user/subscriptions"),
        ("GET", "/user/subscriptions"),
        ("GET", "/repos/:owner/:repo/subscription"),
        ("PUT", "/repos/:owner/:repo/subscription"),
        ("DELETE", "/repos/:owner/:repo/subscription"),
        ("GET", "/users/:user/gists"),
        ("GET", "/gists"),
        ("GET", "/gists/:id"),
        ("POST", "/gists"),
        ("PUT", "/gists/:id/star"),
        ("DELETE", "/gists/:id/star"),
        ("GET", "/gists/:id/star"),
        ("POST", "/gists/:id/forks"),
        ("DELETE", "/gists/:id"),
        ("GET", "/repos/:owner/:repo/git/blobs/:sha"),
        ("POST", "/repos/:owner/:repo/git/blobs"),
        ("GET", "/repos/:owner/:repo/git/commits/:sha"),
        ("POST", "/repos/:owner/:repo/git/commits"),
        ("GET", "/repos/:owner/:repo/git/refs"),
        ("POST", "/repos/:owner/:repo/git/refs"),
        ("GET", "/repos/:owner/:repo/git/tags/:sha"),
        ("POST", "/repos/:owner/:repo/git/tags"),
        ("GET", "/repos/:owner/:repo/git/trees/:sha"),
        ("POST", "/repos/:owner/:repo/git/trees"),
        ("GET", "/issues"),
        ("GET", "/user/issues"),
        ("GET", "/orgs/:org/issues"),
        ("GET", "/repos/:owner/:repo/issues"),
        ("GET", "/repos/:owner/:repo/issues/:number"),
        ("POST", "/repos/:owner/:repo/issues"),
        ("GET", "/repos/:owner/:repo/assignees"),
        ("GET", "/repos/:owner/:repo/assignees/:assignee"),
        ("GET", "/repos/:owner/:repo/issues/:number/comments"),
        ("POST", "/repos/:owner/:repo/issues/:number/comments"),
        ("GET", "/repos/:owner/:repo/issues/:number/events"),
        ("GET", "/repos/:owner/:repo/labels"),
        ("GET", "/repos/:owner/:repo/labels/:name"),
        ("POST", "/repos/:owner/:repo/labels"),
        ("DELETE", "/repos/:owner/:repo/labels/:name"),
        ("GET", "/repos/:owner/:repo/milestones/:number/labels"),
        ("GET", "/repos/:owner/:repo/milestones"),
        ("GET", "/repos/:owner/:repo/milestones/:number"),
        ("POST", "/repos/:owner/:repo/milestones"),
        ("DELETE", "/repos/:owner/:repo/milestones/:number"),
        ("GET", "/emojis"),
        ("GET", "/gitignore/templates"),
        ("GET", "/gitignore/templates/:name"),
        ("POST", "/markdown"),
        ("POST", "/markdown/raw"),
        ("GET", "/meta"),
        ("GET", "/rate_limit"),
        ("GET", "/users/:user/orgs"),
        ("GET", "/user/orgs"),
        ("GET", "/orgs/:org"),
        ("GET", "/orgs/:org/members"),
        ("GET", "/orgs/:org/members/:user"),
        ("DELETE", "/orgs/:org/members/:user"),
        ("GET", "/orgs/:org/teams"),
        ("GET", "/teams/:id"),
        ("POST", "/orgs/:org/teams"),
        ("DELETE", "/teams/:id"),
        ("GET", "/repos/:owner/:repo/pulls"),
        ("GET", "/repos/:owner/:repo/pulls/:number"),
        ("POST", "/repos/:owner/:repo/pulls"),
        ("GET", "/repos/:owner/:repo/pulls/:number/commits"),
        ("GET", "/repos/:owner/:repo/pulls/:number/files"),
        ("GET", "/repos/:owner/:repo/pulls/:number/merge"),
        ("PUT", "/repos/:owner/:repo/pulls/:number/merge"),
        ("GET", "/user/repos"),
        ("GET", "/users/:user/repos"),
        ("GET", "/orgs/:org/repos"),
        ("GET", "/repositories"),
        ("POST", "/user/repos"),
        ("GET", "/repos/:owner/:repo"),
        ("DELETE", "/repos/:owner/:repo"),
        ("GET", "/repos/:owner/:repo/contributors"),
        ("GET", "/repos/:owner/:repo/languages"),
        ("GET", "/repos/:owner/:repo/tags"),
        ("GET", "/repos/:owner/:repo/branches"),
        ("GET", "/repos/:owner/:repo/branches/:branch"),
        ("GET", "/repos/:owner/:repo/contents/*path"),
        ("GET", "/search/repositories"),
        ("GET", "/search/code"),
        ("GET", "/search/issues"),
        ("GET", "/search/users"),
        ("GET", "/users/:user"),
        ("GET", "/user"),
        ("GET", "/users"),
        ("GET", "/user/emails"),
        ("POST", "/user/emails"),
        ("DELETE", "/user/emails"),
        ("GET", "/users/:user/followers"),
        ("GET", "/user/followers"),
        ("GET", "/users/:user/following"),
        ("GET", "/user/following"),
        ("GET", "/user/following/:user"),
        ("PUT", "/user/following/:user"),
        ("DELETE", "/user/following/:user"),
        ("GET", "/user/keys"),
        ("GET", "/user/keys/:id"),
        ("POST", "/user/keys"),
        ("DELETE", "/user/keys/:id"),
    ],
);

pub fn route_tables() -> [RouteTable; 3] {
    [STATIC_ROUTES, PARSE_API, GITHUB_API]
}
