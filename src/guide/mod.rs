//! XMLTV guide passthrough
//!
//! The guide document is forwarded as-is except for `<icon src="...">`
//! attributes, which are rewritten to the image-proxy form when proxying is
//! enabled. The rewrite is a targeted substitution rather than an XML
//! round-trip: every byte outside the matched attributes must reach the
//! client untouched.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::utils::UrlUtils;

fn icon_pattern() -> &'static Regex {
    static ICON_RE: OnceLock<Regex> = OnceLock::new();
    ICON_RE.get_or_init(|| Regex::new(r#"<icon src="([^"]+)""#).expect("icon pattern is valid"))
}

/// Rewrite every `<icon src>` attribute to route through the image proxy
pub fn rewrite_icon_urls(xmltv: &str, proxy_base: &str) -> String {
    icon_pattern()
        .replace_all(xmltv, |caps: &Captures| {
            format!(
                "<icon src=\"{}/image-proxy/{}\"",
                proxy_base,
                UrlUtils::encode_component(&caps[1])
            )
        })
        .into_owned()
}
