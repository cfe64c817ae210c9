//! The resume document.
//!
//! Field names serialize in camelCase so persisted documents keep the same
//! JSON shape across versions. Section identity is a tagged union
//! ([`SectionKey`]) rather than a bare string: the five builtin sections
//! have dedicated structured fields, anything else in `sectionOrder` names a
//! custom section by id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the fixed content categories with structured fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinSection {
    Education,
    Work,
    Projects,
    Others,
    Summary,
}

impl BuiltinSection {
    /// Canonical presentation order.
    pub const ALL: [BuiltinSection; 5] = [
        BuiltinSection::Education,
        BuiltinSection::Work,
        BuiltinSection::Projects,
        BuiltinSection::Others,
        BuiltinSection::Summary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BuiltinSection::Education => "education",
            BuiltinSection::Work => "work",
            BuiltinSection::Projects => "projects",
            BuiltinSection::Others => "others",
            BuiltinSection::Summary => "summary",
        }
    }

    pub fn from_key(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.as_str() == s)
    }

    /// Whether the section holds a list of entries (as opposed to one
    /// rich-text field).
    pub fn has_entries(self) -> bool {
        matches!(
            self,
            BuiltinSection::Education | BuiltinSection::Work | BuiltinSection::Projects
        )
    }
}

/// Identity of a section in the presentation order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SectionKey {
    Builtin(BuiltinSection),
    Custom(String),
}

impl SectionKey {
    /// The canonical builtin ordering.
    pub fn canonical_order() -> Vec<SectionKey> {
        BuiltinSection::ALL
            .into_iter()
            .map(SectionKey::Builtin)
            .collect()
    }

    pub fn as_str(&self) -> &str {
        match self {
            SectionKey::Builtin(b) => b.as_str(),
            SectionKey::Custom(id) => id,
        }
    }
}

impl From<String> for SectionKey {
    fn from(s: String) -> Self {
        match BuiltinSection::from_key(&s) {
            Some(b) => SectionKey::Builtin(b),
            None => SectionKey::Custom(s),
        }
    }
}

impl From<SectionKey> for String {
    fn from(key: SectionKey) -> Self {
        match key {
            SectionKey::Builtin(b) => b.as_str().to_string(),
            SectionKey::Custom(id) => id,
        }
    }
}

impl From<BuiltinSection> for SectionKey {
    fn from(b: BuiltinSection) -> Self {
        SectionKey::Builtin(b)
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Basics {
    #[serde(default)]
    pub name: String,
    /// Phone, email and city on one line.
    #[serde(default)]
    pub contact_info: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSettings {
    pub title: String,
    pub visible: bool,
}

impl SectionSettings {
    fn visible(title: &str) -> Self {
        Self {
            title: title.to_string(),
            visible: true,
        }
    }
}

/// Title and visibility of every builtin section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionSettingsMap {
    pub education: SectionSettings,
    pub work: SectionSettings,
    pub projects: SectionSettings,
    pub others: SectionSettings,
    pub summary: SectionSettings,
}

impl Default for SectionSettingsMap {
    fn default() -> Self {
        Self {
            education: SectionSettings::visible("Education"),
            work: SectionSettings::visible("Work & Internships"),
            projects: SectionSettings::visible("Projects"),
            others: SectionSettings::visible("Skills & Certificates"),
            summary: SectionSettings::visible("Summary"),
        }
    }
}

impl SectionSettingsMap {
    pub fn get(&self, section: BuiltinSection) -> &SectionSettings {
        match section {
            BuiltinSection::Education => &self.education,
            BuiltinSection::Work => &self.work,
            BuiltinSection::Projects => &self.projects,
            BuiltinSection::Others => &self.others,
            BuiltinSection::Summary => &self.summary,
        }
    }

    pub fn get_mut(&mut self, section: BuiltinSection) -> &mut SectionSettings {
        match section {
            BuiltinSection::Education => &mut self.education,
            BuiltinSection::Work => &mut self.work,
            BuiltinSection::Projects => &mut self.projects,
            BuiltinSection::Others => &mut self.others,
            BuiltinSection::Summary => &mut self.summary,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EducationItem {
    pub id: String,
    pub school: String,
    pub degree: String,
    pub start_date: String,
    pub end_date: String,
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkItem {
    pub id: String,
    pub company: String,
    pub position: String,
    pub start_date: String,
    pub end_date: String,
    pub location: String,
    /// Rich-text HTML.
    pub details: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectItem {
    pub id: String,
    pub name: String,
    pub role: String,
    pub start_date: String,
    pub end_date: String,
    pub location: String,
    /// Rich-text HTML.
    pub details: String,
}

/// A user-defined freeform section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomSection {
    pub id: String,
    pub title: String,
    /// Rich-text HTML.
    pub content: String,
    pub visible: bool,
}

/// The complete resume document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeData {
    #[serde(default)]
    pub basics: Basics,
    pub section_order: Vec<SectionKey>,
    #[serde(default)]
    pub sections: SectionSettingsMap,
    #[serde(default)]
    pub custom_sections: Vec<CustomSection>,
    #[serde(default)]
    pub education: Vec<EducationItem>,
    #[serde(default)]
    pub work: Vec<WorkItem>,
    #[serde(default)]
    pub projects: Vec<ProjectItem>,
    /// Rich-text HTML for skills, certificates, awards.
    #[serde(default)]
    pub others: String,
    /// Rich-text HTML personal summary.
    #[serde(default)]
    pub summary: String,
}

impl ResumeData {
    pub fn custom_section(&self, id: &str) -> Option<&CustomSection> {
        self.custom_sections.iter().find(|c| c.id == id)
    }

    pub fn custom_section_mut(&mut self, id: &str) -> Option<&mut CustomSection> {
        self.custom_sections.iter_mut().find(|c| c.id == id)
    }

    /// Base name for exported files.
    pub fn export_stem(&self) -> String {
        format!("{}_Resume", self.basics.name)
    }
}

impl Default for ResumeData {
    /// The sample resume a fresh workspace starts with.
    fn default() -> Self {
        Self {
            basics: Basics {
                name: "Alex Chen".to_string(),
                contact_info: "+1 555 010 0200 | alex.chen@example.com | Berlin".to_string(),
                note: None,
            },
            section_order: SectionKey::canonical_order(),
            sections: SectionSettingsMap::default(),
            custom_sections: Vec::new(),
            education: vec![
                EducationItem {
                    id: "edu-1".to_string(),
                    school: "Technical University".to_string(),
                    degree: "M.Sc. Computer Science".to_string(),
                    start_date: "Oct 2022".to_string(),
                    end_date: "Feb 2024".to_string(),
                    location: "Munich".to_string(),
                },
                EducationItem {
                    id: "edu-2".to_string(),
                    school: "State University".to_string(),
                    degree: "B.Sc. Computer Science".to_string(),
                    start_date: "Sep 2018".to_string(),
                    end_date: "Jun 2022".to_string(),
                    location: "Hamburg".to_string(),
                },
            ],
            work: vec![WorkItem {
                id: "work-1".to_string(),
                company: "Example Technologies".to_string(),
                position: "Product Manager Intern".to_string(),
                start_date: "Mar 2023".to_string(),
                end_date: "Jun 2023".to_string(),
                location: "Berlin".to_string(),
                details: "<ul>\
<li><b>Project management:</b> drove the core product line across brand, design and engineering, and reworked the cross-team meeting cadence after spotting process gaps</li>\
<li><b>Data analysis:</b> broke the category down into price band, feature and sales-rank metrics, scraped and cleaned market data and wrote the resulting market report</li>\
<li><b>Delivery:</b> shipped a co-branded product from packaging and feature definition through UI requirements to acceptance</li>\
</ul>"
                    .to_string(),
            }],
            projects: vec![ProjectItem {
                id: "proj-1".to_string(),
                name: "National Business Challenge".to_string(),
                role: "Core member".to_string(),
                start_date: "Mar 2022".to_string(),
                end_date: "Apr 2022".to_string(),
                location: "Hamburg".to_string(),
                details: "<ul>\
<li><b>Initiative:</b> recruited a three-person team and entered the consumer-brand track</li>\
<li><b>Organisation:</b> planned the schedule, split the work and ran the reviews to finish the proposal in two weeks</li>\
<li><b>Planning:</b> designed the user journey and slogan for the final pitch and reached the semi-finals</li>\
</ul>"
                    .to_string(),
            }],
            others: "<ul>\
<li><b>Skills:</b> design tools, office suites, AI-assisted workflows</li>\
<li><b>Certificates:</b> PMP</li>\
<li><b>Languages:</b> English (fluent), German (fluent)</li>\
</ul>"
                .to_string(),
            summary: "<ul>\
<li><b>Grounded:</b> solves problems first and pulls in whatever internal or external help a task needs</li>\
<li><b>Curious:</b> picks up new domains quickly and has started several projects from scratch</li>\
</ul>"
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_keys_serialize_as_strings() {
        let order = vec![
            SectionKey::Builtin(BuiltinSection::Work),
            SectionKey::Custom("custom-1".into()),
        ];
        let json = serde_json::to_string(&order).unwrap();
        assert_eq!(json, r#"["work","custom-1"]"#);
        let back: Vec<SectionKey> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, order);
    }

    #[test]
    fn default_document_has_canonical_order() {
        let doc = ResumeData::default();
        assert_eq!(doc.section_order, SectionKey::canonical_order());
        assert!(doc.sections.get(BuiltinSection::Summary).visible);
    }

    #[test]
    fn json_uses_camel_case() {
        let json = serde_json::to_value(ResumeData::default()).unwrap();
        assert!(json.get("sectionOrder").is_some());
        assert!(json.get("customSections").is_some());
        assert!(json["education"][0].get("startDate").is_some());
        assert!(json["basics"].get("contactInfo").is_some());
    }

    #[test]
    fn export_stem_uses_name() {
        let mut doc = ResumeData::default();
        doc.basics.name = "Li Bai".into();
        assert_eq!(doc.export_stem(), "Li Bai_Resume");
    }
}
