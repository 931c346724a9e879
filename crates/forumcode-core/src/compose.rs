//! Markup snippets inserted by the post editor.

use crate::embed::EmbedKind;

/// Quote block for replying to a post, followed by an empty line for the reply.
pub fn quote_markup(user: &str, post_id: &str, text: &str) -> String {
    let user: String = user.chars().filter(|&c| c != '"' && c != ']').collect();
    let post_id: String = post_id.chars().filter(|&c| c != '"' && c != ']').collect();
    format!(
        "[quote user=\"{}\" post_id=\"{}\"]{}[/quote]\n\n",
        user.trim(),
        post_id.trim(),
        text.trim()
    )
}

pub fn embed_markup(kind: EmbedKind, id: &str) -> String {
    format!("[{0}]{1}[/{0}]", kind.as_str(), id.trim())
}

pub fn mention_markup(name: &str) -> String {
    format!("[mention]{}[/mention]", name.trim().trim_start_matches('@'))
}
