use crate::config::TagConfig;
use crate::constants::TAG_PADDING_HEX;
use crate::field::{FieldMap, FieldValue};
use crate::result::{Error, Result};
use crate::tag::{ControlTag, DecodedTag, EncodedTag};

/// One piece of a message: a run of text or a control tag.
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePart {
    Text(String),
    Tag(ControlTag),
}

/// Editable sequence of text chunks and control tags making up one message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageText {
    parts: Vec<MessagePart>,
}

impl MessageText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(parts: Vec<MessagePart>) -> Self {
        Self { parts }
    }

    /// Parses a rendered message, splitting on bracketed tags. Decoded tag
    /// names require `config`.
    pub fn from_text(text: &str, config: Option<&TagConfig>) -> Result<Self> {
        let mut parts = Vec::new();
        let mut rest = text;
        while let Some(open) = rest.find('[') {
            let close = rest[open..].find(']').ok_or_else(|| Error::InvalidTagFormat {
                text: rest[open..].to_string(),
            })? + open;
            if open > 0 {
                parts.push(MessagePart::Text(rest[..open].to_string()));
            }
            let tag = ControlTag::from_text(&rest[open..=close], config)?;
            parts.push(MessagePart::Tag(tag));
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            parts.push(MessagePart::Text(rest.to_string()));
        }
        Ok(Self { parts })
    }

    /// The rendered message: text chunks verbatim, tags in bracketed form.
    pub fn text(&self) -> String {
        let mut rendered = String::new();
        for part in &self.parts {
            match part {
                MessagePart::Text(text) => rendered.push_str(text),
                MessagePart::Tag(tag) => rendered.push_str(&tag.to_text()),
            }
        }
        rendered
    }

    pub fn parts(&self) -> &[MessagePart] {
        &self.parts
    }

    pub fn tags(&self) -> impl Iterator<Item = &ControlTag> {
        self.parts.iter().filter_map(|part| match part {
            MessagePart::Tag(tag) => Some(tag),
            MessagePart::Text(_) => None,
        })
    }

    pub fn append_text(&mut self, text: impl Into<String>) {
        self.parts.push(MessagePart::Text(text.into()));
    }

    /// Appends an encoded tag. `parameters` are hex pairs; an odd list is
    /// padded with a trailing `CD`. Closing tags take no parameters.
    pub fn append_encoded_tag(
        &mut self,
        group_id: u16,
        tag_index: u16,
        parameters: &[&str],
        is_closing: bool,
    ) -> Result<()> {
        if is_closing {
            if !parameters.is_empty() {
                return Err(Error::InvalidTagFormat {
                    text: "closing tags carry no parameters".to_string(),
                });
            }
            self.parts
                .push(MessagePart::Tag(ControlTag::Encoded(EncodedTag::closing(
                    group_id, tag_index,
                ))));
            return Ok(());
        }

        if parameters.is_empty() {
            self.parts
                .push(MessagePart::Tag(ControlTag::Encoded(EncodedTag::new(
                    group_id, tag_index,
                ))));
            return Ok(());
        }

        let mut pairs = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            if parameter.len() != 2 || !parameter.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(Error::InvalidTagFormat {
                    text: parameter.to_string(),
                });
            }
            pairs.push(parameter.to_ascii_uppercase());
        }
        if pairs.len() % 2 == 1 {
            pairs.push(TAG_PADDING_HEX.to_string());
        }

        self.parts.push(MessagePart::Tag(ControlTag::Encoded(
            EncodedTag::with_parameters(group_id, tag_index, pairs),
        )));
        Ok(())
    }

    /// Appends a decoded tag, wrapping `parameters` into validated fields in
    /// definition order.
    pub fn append_decoded_tag(
        &mut self,
        config: &TagConfig,
        group_name: &str,
        tag_name: &str,
        parameters: &[(&str, FieldValue)],
        is_closing: bool,
    ) -> Result<()> {
        let definition = config.definition_by_names(group_name, tag_name)?;

        let tag = if is_closing {
            DecodedTag::closing(definition)
        } else if parameters.is_empty() {
            DecodedTag::new(definition, None)
        } else {
            let fields = FieldMap::from_values(parameters, &definition.parameters)?;
            DecodedTag::new(definition, Some(fields))
        };

        self.parts.push(MessagePart::Tag(ControlTag::Decoded(tag)));
        Ok(())
    }

    /// Appends a tag given its bracketed string form.
    pub fn append_tag_string(&mut self, tag: &str, config: Option<&TagConfig>) -> Result<()> {
        let tag = ControlTag::from_text(tag, config)?;
        self.parts.push(MessagePart::Tag(tag));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_splits_into_parts_and_renders_back() {
        let config = TagConfig::system();
        let text = "[System:Color r=\"255\" g=\"0\" b=\"0\" a=\"255\"]Red[/System:Color]\n";
        let message = MessageText::from_text(text, Some(&config)).unwrap();
        assert_eq!(message.parts().len(), 4);
        assert_eq!(message.text(), text);
    }

    #[test]
    fn builders_append_validated_tags() {
        let config = TagConfig::system();
        let mut message = MessageText::new();
        message.append_text("Hi ");
        message
            .append_decoded_tag(
                &config,
                "System",
                "Size",
                &[("percent", FieldValue::Uint16(120))],
                false,
            )
            .unwrap();
        message.append_encoded_tag(1, 0, &["01", "00", "00"], false).unwrap();
        assert_eq!(message.text(), "Hi [System:Size percent=\"120\"][1:0 01-00-00-CD]");
        assert_eq!(message.tags().count(), 2);

        let err = message.append_decoded_tag(
            &config,
            "System",
            "Size",
            &[("percent", FieldValue::Uint8(1))],
            false,
        );
        assert!(matches!(err, Err(Error::WrongValueType { .. })));
    }
}
