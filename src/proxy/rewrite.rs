//! Root-relative link rewriting for HTML bodies
//!
//! A single textual pass over the document: `href="/..."`, `src="/..."` and
//! `action="/..."` (either quote) are pointed back through the proxy. The HTML is
//! never parsed, so absolute URLs, protocol-relative URLs (`//host/...`), `srcset`
//! lists, CSS `url()` and script-embedded URLs are left alone.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::Result;
use crate::proxy::target::InboundOrigin;

static ROOT_RELATIVE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:href|src|action)=["']/"#).expect("root-relative attribute pattern")
});

/// Rewrites root-relative links to `{inbound-scheme}://{inbound-host}/{target-origin}/...`
///
/// Only the target *origin* is kept: a root-relative path resolves against the
/// origin of the page, never against its path.
#[derive(Debug, Clone)]
pub struct LinkRewriter {
    prefix: String,
}

impl LinkRewriter {
    pub fn new(inbound: &InboundOrigin, target: &Url) -> Result<Self> {
        let prefix = format!(
            "{}/{}/",
            inbound.base()?,
            target.origin().ascii_serialization()
        );
        Ok(Self { prefix })
    }

    #[cfg(test)]
    fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn rewrite(&self, html: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut last = 0;

        for m in ROOT_RELATIVE_ATTR.find_iter(html) {
            // `//host/...` is protocol-relative, not root-relative
            if html[m.end()..].starts_with('/') {
                continue;
            }

            // Keep `attr="` and swap the leading slash for the prefix
            let slash = m.end() - 1;
            out.push_str(&html[last..slash]);
            out.push_str(&self.prefix);
            last = m.end();
        }

        out.push_str(&html[last..]);
        out
    }
}
