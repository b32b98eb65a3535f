//! Note link extraction
//!
//! Turns a note body into the ordered list of references it makes to notes of
//! the same store. The body is parsed as CommonMark, so link-looking text inside
//! code blocks or code spans is never reported.
//!
//! Recognised destinations:
//!
//! - `(#anchor)` - self reference, target is the owning note
//! - `(:/noteId)` and `(:/noteId#anchor)` - reference to another note
//!
//! Anything else (web URLs, `mailto:`, relative paths) is ignored, as are images.

use crate::models::{LinkPosition, NoteLink};
use pulldown_cmark::{Event, Parser, Tag, TagEnd};

/// Prefix of note-to-note link destinations
const NOTE_URL_PREFIX: &str = ":/";

/// Extract note references from `body`, in document order
///
/// `note_id` is the id of the note owning `body`; it is the target of
/// self references. Every occurrence is kept: two links to the same note
/// yield two entries told apart by their `position`.
///
/// # Examples
///
/// ```
/// use notegraph_core::utils::extract_note_links;
///
/// let links = extract_note_links("See [plan](:/abc#goals) and [top](#intro)", "self");
///
/// assert_eq!(links.len(), 2);
/// assert_eq!(links[0].note_id, "abc");
/// assert_eq!(links[0].element_id.as_deref(), Some("goals"));
/// assert_eq!(links[0].label.as_deref(), Some("plan"));
/// assert_eq!(links[1].note_id, "self");
/// ```
pub fn extract_note_links(body: &str, note_id: &str) -> Vec<NoteLink> {
    let mut links = Vec::new();
    let mut open: Option<NoteLink> = None;
    let mut label = String::new();

    for (event, range) in Parser::new(body).into_offset_iter() {
        match event {
            Event::Start(Tag::Link {
                dest_url, title, ..
            }) => {
                label.clear();
                open = resolve_target(&dest_url, note_id).map(|(target, element_id)| NoteLink {
                    note_id: target,
                    element_id,
                    link_type: non_empty(&title),
                    label: None,
                    position: LinkPosition::new(range.start, range.end),
                });
            }
            Event::Text(text) | Event::Code(text) if open.is_some() => label.push_str(&text),
            Event::End(TagEnd::Link) => {
                if let Some(mut link) = open.take() {
                    link.label = non_empty(&label);
                    links.push(link);
                }
            }
            _ => {}
        }
    }

    links
}

/// Split a link destination into (target note id, element id)
fn resolve_target(url: &str, note_id: &str) -> Option<(String, Option<String>)> {
    if let Some(anchor) = url.strip_prefix('#') {
        return Some((note_id.to_string(), non_empty(anchor)));
    }

    let reference = url.strip_prefix(NOTE_URL_PREFIX)?;
    let (target, element_id) = match reference.split_once('#') {
        Some((target, anchor)) => (target, non_empty(anchor)),
        None => (reference, None),
    };
    if target.is_empty() {
        return None;
    }
    Some((target.to_string(), element_id))
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
