use ammonia::Builder;
use std::sync::OnceLock;

static POLICY: OnceLock<Builder<'static>> = OnceLock::new();

/// Upper bound on clean passes per call.
const MAX_PASSES: usize = 16;

/// The allowlist shared by every enrichment task.
///
/// ammonia's defaults already match a user-generated-content policy:
/// formatting, headings, lists, tables, links and images survive; `script`
/// and `style` are dropped together with their contents; `on*` handlers,
/// `style` attributes and non-http(s)/mailto URLs are removed. Links are
/// additionally marked `nofollow`.
fn policy() -> &'static Builder<'static> {
    POLICY.get_or_init(|| {
        let mut builder = Builder::default();
        builder.link_rel(Some("nofollow noopener noreferrer"));
        builder
    })
}

/// Reduces arbitrary HTML to the safe subset.
///
/// Total and idempotent: `sanitize(&sanitize(x)) == sanitize(x)`. Plain text
/// passes through with only `&`, `<` and `>` escaped. Empty input yields an
/// empty string without touching the parser.
///
/// A single clean pass is not a fixpoint: html5ever re-nests misnested lists
/// and links when it reads the serialized tree back, and drops one leading
/// newline inside `<pre>` per parse. Cleaning repeats until the output stops
/// changing.
pub fn sanitize(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let mut current = policy().clean(html).to_string();
    for _ in 1..MAX_PASSES {
        let next = policy().clean(&current).to_string();
        if next == current {
            return current;
        }
        current = next;
    }

    tracing::debug!(passes = MAX_PASSES, "Sanitizer output still changing at pass limit");
    current
}
