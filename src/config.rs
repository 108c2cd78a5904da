use indexmap::IndexMap;

use crate::datatype::DataType;
use crate::field::ValueDefinition;
use crate::project::Msbp;
use crate::result::{Error, Result};

/// Layout of one ATR1 record: the fields of every attribute, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeConfig {
    pub name: String,
    pub description: String,
    pub definitions: Vec<ValueDefinition>,
}

impl AttributeConfig {
    pub fn new(name: impl Into<String>, definitions: Vec<ValueDefinition>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            definitions,
        }
    }

    /// Fixed record size this layout implies; must agree with the section's
    /// `size_per_attribute` before the decoded path may be used.
    pub fn record_size(&self) -> u32 {
        self.definitions
            .iter()
            .map(|definition| definition.datatype.stream_size() as u32)
            .sum()
    }
}

/// One tag of one group, with its decoded parameter layout. An empty
/// `parameters` list means the config names the tag but does not describe its
/// payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TagDefinition {
    pub group_name: String,
    pub group_id: u16,
    pub tag_name: String,
    pub tag_index: u16,
    pub description: String,
    pub parameters: Vec<ValueDefinition>,
}

/// Tag schema of a title: the group id map plus every known tag definition.
#[derive(Debug, Clone)]
pub struct TagConfig {
    group_map: IndexMap<u16, String>,
    definitions: Vec<TagDefinition>,
    /// When set, a tag whose parameters fail to decode is re-read as an
    /// encoded fallback tag instead of surfacing the error.
    pub suppress_tag_errors: bool,
}

impl TagConfig {
    pub fn new(group_map: IndexMap<u16, String>, definitions: Vec<TagDefinition>) -> Self {
        Self {
            group_map,
            definitions,
            suppress_tag_errors: false,
        }
    }

    pub fn group_map(&self) -> &IndexMap<u16, String> {
        &self.group_map
    }

    pub fn definitions(&self) -> &[TagDefinition] {
        &self.definitions
    }

    pub fn definition_by_names(&self, group: &str, tag: &str) -> Result<&TagDefinition> {
        let group_id = self
            .group_map
            .iter()
            .find(|(_, name)| name.as_str() == group)
            .map(|(id, _)| *id)
            .ok_or_else(|| Error::UnknownTag {
                group: group.to_string(),
                tag: tag.to_string(),
            })?;

        self.definitions
            .iter()
            .find(|definition| definition.group_id == group_id && definition.tag_name == tag)
            .ok_or_else(|| Error::UnknownTag {
                group: group.to_string(),
                tag: tag.to_string(),
            })
    }

    /// Missing mappings are not fatal; tags without a definition fall back to
    /// their encoded form.
    pub fn definition_by_indexes(&self, group_id: u16, tag_index: u16) -> Option<&TagDefinition> {
        if !self.group_map.contains_key(&group_id) {
            return None;
        }
        self.definitions
            .iter()
            .find(|definition| definition.group_id == group_id && definition.tag_index == tag_index)
    }

    /// The universal group 0 every title defines: Ruby, Font, Size, Color and
    /// PageBreak.
    pub fn system() -> Self {
        let group = |tag_name: &str, tag_index: u16, parameters: Vec<ValueDefinition>| {
            TagDefinition {
                group_name: "System".to_string(),
                group_id: 0,
                tag_name: tag_name.to_string(),
                tag_index,
                description: String::new(),
                parameters,
            }
        };
        let definitions = vec![
            group("Ruby", 0, vec![ValueDefinition::new("rt", DataType::String)]),
            group("Font", 1, vec![ValueDefinition::new("face", DataType::String)]),
            group(
                "Size",
                2,
                vec![ValueDefinition::new("percent", DataType::Uint16)],
            ),
            group(
                "Color",
                3,
                vec![
                    ValueDefinition::new("r", DataType::Uint8),
                    ValueDefinition::new("g", DataType::Uint8),
                    ValueDefinition::new("b", DataType::Uint8),
                    ValueDefinition::new("a", DataType::Uint8),
                ],
            ),
            group("PageBreak", 4, Vec::new()),
        ];
        let mut group_map = IndexMap::new();
        group_map.insert(0, "System".to_string());
        Self::new(group_map, definitions)
    }
}

/// Caller-supplied schema of a title: attribute layouts keyed by name plus
/// the tag schema. Built programmatically from an [`Msbp`] or assembled from
/// an externally parsed config file.
#[derive(Debug, Clone, Default)]
pub struct TitleConfig {
    attribute_configs: IndexMap<String, AttributeConfig>,
    tag_config: Option<TagConfig>,
}

impl TitleConfig {
    pub fn new(attribute_configs: Vec<AttributeConfig>, tag_config: Option<TagConfig>) -> Self {
        Self {
            attribute_configs: attribute_configs
                .into_iter()
                .map(|config| (config.name.clone(), config))
                .collect(),
            tag_config,
        }
    }

    pub fn attribute_config(&self, name: &str) -> Option<&AttributeConfig> {
        self.attribute_configs.get(name)
    }

    pub fn attribute_configs(&self) -> impl Iterator<Item = &AttributeConfig> {
        self.attribute_configs.values()
    }

    pub fn tag_config(&self) -> Option<&TagConfig> {
        self.tag_config.as_ref()
    }

    /// Derives the schema from a project file: one tag definition per tag of
    /// every group, and one attribute config named after the project.
    pub fn from_msbp(project: &Msbp) -> Self {
        let tag_config = project.tag_groups().as_ref().map(|groups| {
            let group_map: IndexMap<u16, String> = groups
                .iter()
                .map(|group| (group.id, group.name.clone()))
                .collect();

            let mut definitions = Vec::new();
            for group in groups {
                for (tag_index, tag) in group.tags.iter().enumerate() {
                    let parameters = tag
                        .parameters
                        .iter()
                        .map(|parameter| ValueDefinition {
                            name: parameter.name.clone(),
                            description: String::new(),
                            datatype: parameter.datatype,
                            list_items: parameter.list_items.clone(),
                        })
                        .collect();
                    definitions.push(TagDefinition {
                        group_name: group.name.clone(),
                        group_id: group.id,
                        tag_name: tag.name.clone(),
                        tag_index: tag_index as u16,
                        description: String::new(),
                        parameters,
                    });
                }
            }
            TagConfig::new(group_map, definitions)
        });

        let attribute_configs = match project.attribute_definitions() {
            Some(attributes) => {
                let definitions = attributes
                    .iter()
                    .enumerate()
                    .map(|(index, attribute)| ValueDefinition {
                        name: attribute
                            .name
                            .clone()
                            .unwrap_or_else(|| format!("attribute_{index}")),
                        description: String::new(),
                        datatype: attribute.datatype,
                        list_items: attribute.list_items.clone(),
                    })
                    .collect();
                vec![AttributeConfig::new(project.name().clone(), definitions)]
            }
            None => Vec::new(),
        };

        Self::new(attribute_configs, tag_config)
    }
}
