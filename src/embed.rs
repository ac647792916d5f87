//! Embed URL preparation.
//!
//! Caption sync needs the embedded player to expose its JS API, use the
//! HTML5 player, play inline on mobile and keep the native fullscreen
//! button out of the way. [`normalize_embed_src`] rewrites a frame src so
//! all four flags are present.
//!
//! Presence checks are plain substring searches over the whole URL,
//! fragment included; the URL is never parsed into components. The `fs`
//! flag is special: any existing `fs=` assignment is honored as-is, only a
//! completely absent flag is filled in with `fs=0`.

struct QueryRequirement {
    probe: &'static str,
    append: &'static str,
}

const REQUIRED_QUERY: [QueryRequirement; 4] = [
    QueryRequirement {
        probe: "enablejsapi=1",
        append: "enablejsapi=1",
    },
    QueryRequirement {
        probe: "html5=1",
        append: "html5=1",
    },
    QueryRequirement {
        probe: "playsinline=1",
        append: "playsinline=1",
    },
    QueryRequirement {
        probe: "fs=",
        append: "fs=0",
    },
];

/// Returns `src` with every missing player flag appended to its query
/// string. A src that already carries all flags comes back unchanged.
#[must_use]
pub fn normalize_embed_src(src: &str) -> String {
    let mut out = src.to_owned();
    for requirement in &REQUIRED_QUERY {
        if !out.contains(requirement.probe) {
            out = append_query_pair(&out, requirement.append);
        }
    }
    out
}

fn append_query_pair(url: &str, pair: &str) -> String {
    let (base, fragment) = url
        .find('#')
        .map_or((url, ""), |index| url.split_at(index));
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{pair}{fragment}")
}
