//! Section registry.
//!
//! Every [`SectionKey`] resolves to one [`SectionBehavior`] that knows how to
//! read the section's title and visibility, render its entries and edit its
//! entry list. Builtin sections each get their own behaviour; all custom
//! sections share one. Renderer and editing code dispatch through the
//! registry and never match on key strings.

use std::collections::HashMap;
use std::marker::PhantomData;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{
    BuiltinSection, EducationItem, ProjectItem, ResumeData, SectionKey, WorkItem,
};
use crate::preview::{Element, TextSpan, Tone};
use crate::richtext::{sanitize_html, RichText};

/// Title and visibility as the renderer sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionView<'d> {
    pub title: &'d str,
    pub visible: bool,
}

/// Content of one non-splittable block, before the section heading is added.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEntry {
    pub id: String,
    pub elements: Vec<Element>,
    /// Space below the block in px.
    pub spacing_px: f32,
}

/// An editable field of a structured entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryField {
    School,
    Degree,
    Company,
    Position,
    Name,
    Role,
    StartDate,
    EndDate,
    Location,
    /// Rich-text HTML; sanitized on write.
    Details,
}

impl EntryField {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryField::School => "school",
            EntryField::Degree => "degree",
            EntryField::Company => "company",
            EntryField::Position => "position",
            EntryField::Name => "name",
            EntryField::Role => "role",
            EntryField::StartDate => "startDate",
            EntryField::EndDate => "endDate",
            EntryField::Location => "location",
            EntryField::Details => "details",
        }
    }
}

pub trait SectionBehavior: Send + Sync {
    /// `None` when the key does not resolve to a section in `doc`.
    fn view<'d>(&self, doc: &'d ResumeData, key: &SectionKey) -> Option<SectionView<'d>>;

    /// One entry per block, in display order.
    fn render(&self, doc: &ResumeData, key: &SectionKey) -> Vec<RenderedEntry>;

    fn set_title(&self, doc: &mut ResumeData, key: &SectionKey, title: &str) -> Result<()>;

    fn set_visible(&self, doc: &mut ResumeData, key: &SectionKey, visible: bool) -> Result<()>;

    /// Append a placeholder entry and return its id.
    fn add_entry(&self, _doc: &mut ResumeData, key: &SectionKey) -> Result<String> {
        Err(Error::NotAList(key.to_string()))
    }

    fn remove_entry(&self, _doc: &mut ResumeData, key: &SectionKey, _id: &str) -> Result<()> {
        Err(Error::NotAList(key.to_string()))
    }

    fn move_entry(
        &self,
        _doc: &mut ResumeData,
        key: &SectionKey,
        _from: usize,
        _to: usize,
    ) -> Result<()> {
        Err(Error::NotAList(key.to_string()))
    }

    /// Overwrite one field of the entry with `id`.
    fn update_entry(
        &self,
        _doc: &mut ResumeData,
        key: &SectionKey,
        _id: &str,
        _field: EntryField,
        _value: &str,
    ) -> Result<()> {
        Err(Error::NotAList(key.to_string()))
    }
}

pub struct SectionRegistry {
    builtin: HashMap<BuiltinSection, Box<dyn SectionBehavior>>,
    custom: Box<dyn SectionBehavior>,
}

impl Default for SectionRegistry {
    fn default() -> Self {
        let mut builtin: HashMap<BuiltinSection, Box<dyn SectionBehavior>> = HashMap::new();
        builtin.insert(
            BuiltinSection::Education,
            Box::new(EntryList::<EducationItem>::new()),
        );
        builtin.insert(BuiltinSection::Work, Box::new(EntryList::<WorkItem>::new()));
        builtin.insert(
            BuiltinSection::Projects,
            Box::new(EntryList::<ProjectItem>::new()),
        );
        builtin.insert(
            BuiltinSection::Others,
            Box::new(RichField(BuiltinSection::Others)),
        );
        builtin.insert(
            BuiltinSection::Summary,
            Box::new(RichField(BuiltinSection::Summary)),
        );
        Self {
            builtin,
            custom: Box::new(CustomSections),
        }
    }
}

impl SectionRegistry {
    /// Replace the behaviour of a builtin section.
    pub fn register(&mut self, section: BuiltinSection, behavior: Box<dyn SectionBehavior>) {
        self.builtin.insert(section, behavior);
    }

    pub fn behavior(&self, key: &SectionKey) -> &dyn SectionBehavior {
        match key {
            SectionKey::Builtin(b) => self
                .builtin
                .get(b)
                .map(|b| b.as_ref())
                .unwrap_or(self.custom.as_ref()),
            SectionKey::Custom(_) => self.custom.as_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry lists (education, work, projects)
// ---------------------------------------------------------------------------

/// A structured entry type stored as a list on the document.
trait Entry: Clone + Send + Sync + 'static {
    const SECTION: BuiltinSection;
    /// Space below each entry block in px.
    const SPACING_PX: f32;

    fn id(&self) -> &str;
    fn placeholder(id: String) -> Self;
    fn list(doc: &ResumeData) -> &Vec<Self>;
    fn list_mut(doc: &mut ResumeData) -> &mut Vec<Self>;
    fn elements(&self) -> Vec<Element>;
    /// `None` for fields this entry type does not have.
    fn field_mut(&mut self, field: EntryField) -> Option<&mut String>;
}

struct EntryList<E>(PhantomData<fn() -> E>);

impl<E> EntryList<E> {
    fn new() -> Self {
        Self(PhantomData)
    }
}

impl<E: Entry> SectionBehavior for EntryList<E> {
    fn view<'d>(&self, doc: &'d ResumeData, _key: &SectionKey) -> Option<SectionView<'d>> {
        let settings = doc.sections.get(E::SECTION);
        Some(SectionView {
            title: &settings.title,
            visible: settings.visible,
        })
    }

    fn render(&self, doc: &ResumeData, _key: &SectionKey) -> Vec<RenderedEntry> {
        E::list(doc)
            .iter()
            .map(|entry| RenderedEntry {
                id: entry.id().to_string(),
                elements: entry.elements(),
                spacing_px: E::SPACING_PX,
            })
            .collect()
    }

    fn set_title(&self, doc: &mut ResumeData, _key: &SectionKey, title: &str) -> Result<()> {
        doc.sections.get_mut(E::SECTION).title = title.to_string();
        Ok(())
    }

    fn set_visible(&self, doc: &mut ResumeData, _key: &SectionKey, visible: bool) -> Result<()> {
        doc.sections.get_mut(E::SECTION).visible = visible;
        Ok(())
    }

    fn add_entry(&self, doc: &mut ResumeData, _key: &SectionKey) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        E::list_mut(doc).push(E::placeholder(id.clone()));
        Ok(id)
    }

    fn remove_entry(&self, doc: &mut ResumeData, _key: &SectionKey, id: &str) -> Result<()> {
        let list = E::list_mut(doc);
        let before = list.len();
        list.retain(|e| e.id() != id);
        if list.len() == before {
            return Err(Error::EntryNotFound {
                section: E::SECTION.as_str().to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn move_entry(
        &self,
        doc: &mut ResumeData,
        _key: &SectionKey,
        from: usize,
        to: usize,
    ) -> Result<()> {
        move_within(E::list_mut(doc), from, to)
    }

    fn update_entry(
        &self,
        doc: &mut ResumeData,
        _key: &SectionKey,
        id: &str,
        field: EntryField,
        value: &str,
    ) -> Result<()> {
        let entry = E::list_mut(doc)
            .iter_mut()
            .find(|e| e.id() == id)
            .ok_or_else(|| Error::EntryNotFound {
                section: E::SECTION.as_str().to_string(),
                id: id.to_string(),
            })?;
        let slot = entry.field_mut(field).ok_or_else(|| Error::NoSuchField {
            section: E::SECTION.as_str().to_string(),
            field: field.as_str().to_string(),
        })?;
        *slot = match field {
            EntryField::Details => sanitize_html(value),
            _ => value.to_string(),
        };
        Ok(())
    }
}

/// Move `items[from]` so it ends up at index `to`.
pub(crate) fn move_within<T>(items: &mut Vec<T>, from: usize, to: usize) -> Result<()> {
    let len = items.len();
    if from >= len {
        return Err(Error::OutOfRange { index: from, len });
    }
    if to >= len {
        return Err(Error::OutOfRange { index: to, len });
    }
    let item = items.remove(from);
    items.insert(to, item);
    Ok(())
}

/// Left column title/subtitle with dates and location on the right.
fn dated_header(title: Vec<TextSpan>, subtitle: Option<&str>, start: &str, end: &str, location: &str) -> Element {
    let mut left = vec![title];
    if let Some(sub) = subtitle {
        left.push(vec![TextSpan::new(sub).tone(Tone::Body)]);
    }
    let right = vec![
        vec![TextSpan::new(format!("{start} - {end}")).tone(Tone::Ink)],
        vec![TextSpan::new(location).tone(Tone::Muted)],
    ];
    Element::Columns { left, right }
}

fn titled(primary: &str, secondary: &str) -> Vec<TextSpan> {
    let mut spans = vec![TextSpan::new(primary).bold().scale(1.15)];
    if !secondary.is_empty() {
        spans.push(TextSpan::new(format!(" - {secondary}")).bold().scale(1.15));
    }
    spans
}

impl Entry for EducationItem {
    const SECTION: BuiltinSection = BuiltinSection::Education;
    const SPACING_PX: f32 = 12.0;

    fn id(&self) -> &str {
        &self.id
    }

    fn placeholder(id: String) -> Self {
        Self {
            id,
            school: "New School".into(),
            degree: "Degree".into(),
            start_date: "2023".into(),
            end_date: "2024".into(),
            location: "City".into(),
        }
    }

    fn list(doc: &ResumeData) -> &Vec<Self> {
        &doc.education
    }

    fn list_mut(doc: &mut ResumeData) -> &mut Vec<Self> {
        &mut doc.education
    }

    fn elements(&self) -> Vec<Element> {
        vec![dated_header(
            vec![TextSpan::new(&self.school).bold().scale(1.15)],
            Some(&self.degree),
            &self.start_date,
            &self.end_date,
            &self.location,
        )]
    }

    fn field_mut(&mut self, field: EntryField) -> Option<&mut String> {
        match field {
            EntryField::School => Some(&mut self.school),
            EntryField::Degree => Some(&mut self.degree),
            EntryField::StartDate => Some(&mut self.start_date),
            EntryField::EndDate => Some(&mut self.end_date),
            EntryField::Location => Some(&mut self.location),
            _ => None,
        }
    }
}

impl Entry for WorkItem {
    const SECTION: BuiltinSection = BuiltinSection::Work;
    const SPACING_PX: f32 = 20.0;

    fn id(&self) -> &str {
        &self.id
    }

    fn placeholder(id: String) -> Self {
        Self {
            id,
            company: "New Company".into(),
            position: "Role".into(),
            start_date: "2023".into(),
            end_date: "Present".into(),
            location: "City".into(),
            details: "<ul><li>New Role Detail</li></ul>".into(),
        }
    }

    fn list(doc: &ResumeData) -> &Vec<Self> {
        &doc.work
    }

    fn list_mut(doc: &mut ResumeData) -> &mut Vec<Self> {
        &mut doc.work
    }

    fn elements(&self) -> Vec<Element> {
        vec![
            dated_header(
                titled(&self.company, &self.position),
                None,
                &self.start_date,
                &self.end_date,
                &self.location,
            ),
            Element::Rich(RichText::from_html(&self.details)),
        ]
    }

    fn field_mut(&mut self, field: EntryField) -> Option<&mut String> {
        match field {
            EntryField::Company => Some(&mut self.company),
            EntryField::Position => Some(&mut self.position),
            EntryField::StartDate => Some(&mut self.start_date),
            EntryField::EndDate => Some(&mut self.end_date),
            EntryField::Location => Some(&mut self.location),
            EntryField::Details => Some(&mut self.details),
            _ => None,
        }
    }
}

impl Entry for ProjectItem {
    const SECTION: BuiltinSection = BuiltinSection::Projects;
    const SPACING_PX: f32 = 20.0;

    fn id(&self) -> &str {
        &self.id
    }

    fn placeholder(id: String) -> Self {
        Self {
            id,
            name: "New Project".into(),
            role: "Role".into(),
            start_date: "2023".into(),
            end_date: "2024".into(),
            location: "City".into(),
            details: "<ul><li>Project Detail</li></ul>".into(),
        }
    }

    fn list(doc: &ResumeData) -> &Vec<Self> {
        &doc.projects
    }

    fn list_mut(doc: &mut ResumeData) -> &mut Vec<Self> {
        &mut doc.projects
    }

    fn elements(&self) -> Vec<Element> {
        vec![
            dated_header(
                titled(&self.name, &self.role),
                None,
                &self.start_date,
                &self.end_date,
                &self.location,
            ),
            Element::Rich(RichText::from_html(&self.details)),
        ]
    }

    fn field_mut(&mut self, field: EntryField) -> Option<&mut String> {
        match field {
            EntryField::Name => Some(&mut self.name),
            EntryField::Role => Some(&mut self.role),
            EntryField::StartDate => Some(&mut self.start_date),
            EntryField::EndDate => Some(&mut self.end_date),
            EntryField::Location => Some(&mut self.location),
            EntryField::Details => Some(&mut self.details),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Single rich-text fields (others, summary)
// ---------------------------------------------------------------------------

struct RichField(BuiltinSection);

impl RichField {
    fn html<'d>(&self, doc: &'d ResumeData) -> &'d str {
        match self.0 {
            BuiltinSection::Summary => &doc.summary,
            _ => &doc.others,
        }
    }
}

impl SectionBehavior for RichField {
    fn view<'d>(&self, doc: &'d ResumeData, _key: &SectionKey) -> Option<SectionView<'d>> {
        let settings = doc.sections.get(self.0);
        Some(SectionView {
            title: &settings.title,
            visible: settings.visible,
        })
    }

    fn render(&self, doc: &ResumeData, _key: &SectionKey) -> Vec<RenderedEntry> {
        rich_entry(self.0.as_str(), self.html(doc))
    }

    fn set_title(&self, doc: &mut ResumeData, _key: &SectionKey, title: &str) -> Result<()> {
        doc.sections.get_mut(self.0).title = title.to_string();
        Ok(())
    }

    fn set_visible(&self, doc: &mut ResumeData, _key: &SectionKey, visible: bool) -> Result<()> {
        doc.sections.get_mut(self.0).visible = visible;
        Ok(())
    }
}

fn rich_entry(id: &str, html: &str) -> Vec<RenderedEntry> {
    let rich = RichText::from_html(html);
    if rich.is_empty() {
        return Vec::new();
    }
    vec![RenderedEntry {
        id: id.to_string(),
        elements: vec![Element::Rich(rich)],
        spacing_px: 8.0,
    }]
}

// ---------------------------------------------------------------------------
// Custom sections
// ---------------------------------------------------------------------------

struct CustomSections;

impl CustomSections {
    fn id(key: &SectionKey) -> Result<&str> {
        match key {
            SectionKey::Custom(id) => Ok(id),
            SectionKey::Builtin(b) => Err(Error::UnknownSection(b.as_str().to_string())),
        }
    }
}

impl SectionBehavior for CustomSections {
    fn view<'d>(&self, doc: &'d ResumeData, key: &SectionKey) -> Option<SectionView<'d>> {
        let section = doc.custom_section(Self::id(key).ok()?)?;
        Some(SectionView {
            title: &section.title,
            visible: section.visible,
        })
    }

    fn render(&self, doc: &ResumeData, key: &SectionKey) -> Vec<RenderedEntry> {
        Self::id(key)
            .ok()
            .and_then(|id| doc.custom_section(id))
            .map(|section| rich_entry(&section.id, &section.content))
            .unwrap_or_default()
    }

    fn set_title(&self, doc: &mut ResumeData, key: &SectionKey, title: &str) -> Result<()> {
        let id = Self::id(key)?;
        let section = doc
            .custom_section_mut(id)
            .ok_or_else(|| Error::UnknownSection(id.to_string()))?;
        section.title = title.to_string();
        Ok(())
    }

    fn set_visible(&self, doc: &mut ResumeData, key: &SectionKey, visible: bool) -> Result<()> {
        let id = Self::id(key)?;
        let section = doc
            .custom_section_mut(id)
            .ok_or_else(|| Error::UnknownSection(id.to_string()))?;
        section.visible = visible;
        Ok(())
    }
}
