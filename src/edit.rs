//! Editing operations.
//!
//! Every operation takes the current document by reference and returns the
//! replacement, ready for [`DocumentStore::replace`]. Section-specific work
//! is dispatched through the [`SectionRegistry`]. Rich text is sanitized on
//! the way in.
//!
//! [`DocumentStore::replace`]: crate::store::DocumentStore::replace

use std::ops::Range;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{BuiltinSection, CustomSection, ResumeData, SectionKey};
use crate::richtext::{sanitize_html, Command, RichText};
use crate::sections::{move_within, EntryField, SectionRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicsField {
    Name,
    ContactInfo,
    Note,
}

/// A rich-text field of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RichTarget {
    Others,
    Summary,
    WorkDetails(String),
    ProjectDetails(String),
    CustomContent(String),
}

pub fn set_basics_field(doc: &ResumeData, field: BasicsField, value: &str) -> ResumeData {
    let mut next = doc.clone();
    match field {
        BasicsField::Name => next.basics.name = value.to_string(),
        BasicsField::ContactInfo => next.basics.contact_info = value.to_string(),
        BasicsField::Note => {
            next.basics.note = Some(value.to_string()).filter(|v| !v.trim().is_empty())
        }
    }
    next
}

pub fn set_section_title(
    doc: &ResumeData,
    registry: &SectionRegistry,
    key: &SectionKey,
    title: &str,
) -> Result<ResumeData> {
    let mut next = doc.clone();
    registry.behavior(key).set_title(&mut next, key, title)?;
    Ok(next)
}

pub fn toggle_section_visibility(
    doc: &ResumeData,
    registry: &SectionRegistry,
    key: &SectionKey,
) -> Result<ResumeData> {
    let behavior = registry.behavior(key);
    let visible = behavior
        .view(doc, key)
        .ok_or_else(|| Error::UnknownSection(key.to_string()))?
        .visible;
    let mut next = doc.clone();
    behavior.set_visible(&mut next, key, !visible)?;
    Ok(next)
}

/// Append a placeholder entry; returns the new document and the entry id.
pub fn add_entry(
    doc: &ResumeData,
    registry: &SectionRegistry,
    section: BuiltinSection,
) -> Result<(ResumeData, String)> {
    let key = SectionKey::Builtin(section);
    let mut next = doc.clone();
    let id = registry.behavior(&key).add_entry(&mut next, &key)?;
    Ok((next, id))
}

pub fn remove_entry(
    doc: &ResumeData,
    registry: &SectionRegistry,
    section: BuiltinSection,
    id: &str,
) -> Result<ResumeData> {
    let key = SectionKey::Builtin(section);
    let mut next = doc.clone();
    registry.behavior(&key).remove_entry(&mut next, &key, id)?;
    Ok(next)
}

/// Overwrite one field of an existing entry. `Details` is sanitized.
pub fn update_entry(
    doc: &ResumeData,
    registry: &SectionRegistry,
    section: BuiltinSection,
    id: &str,
    field: EntryField,
    value: &str,
) -> Result<ResumeData> {
    let key = SectionKey::Builtin(section);
    let mut next = doc.clone();
    registry
        .behavior(&key)
        .update_entry(&mut next, &key, id, field, value)?;
    Ok(next)
}

/// Drag-reorder within an entry list.
pub fn move_entry(
    doc: &ResumeData,
    registry: &SectionRegistry,
    section: BuiltinSection,
    from: usize,
    to: usize,
) -> Result<ResumeData> {
    let key = SectionKey::Builtin(section);
    let mut next = doc.clone();
    registry.behavior(&key).move_entry(&mut next, &key, from, to)?;
    Ok(next)
}

/// Drag-reorder of whole sections.
pub fn move_section(doc: &ResumeData, from: usize, to: usize) -> Result<ResumeData> {
    let mut next = doc.clone();
    move_within(&mut next.section_order, from, to)?;
    Ok(next)
}

/// Add an empty, visible custom section at the end of the order.
pub fn add_custom_section(doc: &ResumeData, title: &str) -> (ResumeData, String) {
    let id = format!("custom-{}", Uuid::new_v4());
    let mut next = doc.clone();
    next.custom_sections.push(CustomSection {
        id: id.clone(),
        title: title.to_string(),
        content: String::new(),
        visible: true,
    });
    next.section_order.push(SectionKey::Custom(id.clone()));
    (next, id)
}

pub fn update_custom_section(
    doc: &ResumeData,
    id: &str,
    title: &str,
    content: &str,
) -> Result<ResumeData> {
    let mut next = doc.clone();
    let section = next
        .custom_section_mut(id)
        .ok_or_else(|| Error::UnknownSection(id.to_string()))?;
    section.title = title.to_string();
    section.content = sanitize_html(content);
    Ok(next)
}

/// Remove a custom section and its place in the order.
pub fn remove_custom_section(doc: &ResumeData, id: &str) -> Result<ResumeData> {
    let mut next = doc.clone();
    let before = next.custom_sections.len();
    next.custom_sections.retain(|c| c.id != id);
    if next.custom_sections.len() == before {
        return Err(Error::UnknownSection(id.to_string()));
    }
    next.section_order
        .retain(|k| !matches!(k, SectionKey::Custom(c) if c == id));
    Ok(next)
}

fn rich_slot<'d>(doc: &'d mut ResumeData, target: &RichTarget) -> Result<&'d mut String> {
    let missing = |section: &str, id: &str| Error::EntryNotFound {
        section: section.to_string(),
        id: id.to_string(),
    };
    match target {
        RichTarget::Others => Ok(&mut doc.others),
        RichTarget::Summary => Ok(&mut doc.summary),
        RichTarget::WorkDetails(id) => doc
            .work
            .iter_mut()
            .find(|w| &w.id == id)
            .map(|w| &mut w.details)
            .ok_or_else(|| missing("work", id)),
        RichTarget::ProjectDetails(id) => doc
            .projects
            .iter_mut()
            .find(|p| &p.id == id)
            .map(|p| &mut p.details)
            .ok_or_else(|| missing("projects", id)),
        RichTarget::CustomContent(id) => doc
            .custom_section_mut(id)
            .map(|c| &mut c.content)
            .ok_or_else(|| Error::UnknownSection(id.clone())),
    }
}

/// Store `html` in a rich-text field, sanitized.
pub fn set_rich_field(doc: &ResumeData, target: &RichTarget, html: &str) -> Result<ResumeData> {
    let mut next = doc.clone();
    *rich_slot(&mut next, target)? = sanitize_html(html);
    Ok(next)
}

/// Apply a formatting command to a character range of a rich-text field.
pub fn apply_rich_command(
    doc: &ResumeData,
    target: &RichTarget,
    range: Range<usize>,
    command: Command,
) -> Result<ResumeData> {
    let mut next = doc.clone();
    let slot = rich_slot(&mut next, target)?;
    let mut rich = RichText::from_html(slot);
    rich.apply(range, command)?;
    *slot = rich.to_html();
    Ok(next)
}
