/*!
 * XML payloads for record creation
 *
 * The Table API accepts `<request><entry>...</entry></request>` where each
 * child of `entry` is one column of the new record.
 */

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{ProbeError, Result};

/// Ordered column values of a record to create
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDraft {
    fields: Vec<(String, String)>,
}

impl RecordDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// The demo incident submitted when no fields are given
    pub fn sample() -> Self {
        Self::new()
            .field("short_description", "The sky is falling!")
            .field("urgency", "2")
            .field("impact", "2")
    }

    /// Builder form of [`RecordDraft::set`]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a column; an existing column keeps its position
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Render the request body
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());

        write_event(&mut writer, Event::Start(BytesStart::new("request")))?;
        write_event(&mut writer, Event::Start(BytesStart::new("entry")))?;
        for (name, value) in &self.fields {
            if !is_element_name(name) {
                return Err(ProbeError::Payload(format!(
                    "'{}' is not a valid field name",
                    name
                )));
            }
            write_event(&mut writer, Event::Start(BytesStart::new(name.as_str())))?;
            write_event(&mut writer, Event::Text(BytesText::new(value)))?;
            write_event(&mut writer, Event::End(BytesEnd::new(name.as_str())))?;
        }
        write_event(&mut writer, Event::End(BytesEnd::new("entry")))?;
        write_event(&mut writer, Event::End(BytesEnd::new("request")))?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| ProbeError::Payload(format!("payload is not UTF-8: {}", e)))
    }
}

/// Parse a `name=value` assignment as given on the command line
pub fn parse_assignment(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((name, value)) if is_element_name(name.trim()) => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(ProbeError::Payload(format!(
            "expected FIELD=VALUE, got '{}'",
            raw
        ))),
    }
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| ProbeError::Payload(e.to_string()))
}

/// Column names as the Table API uses them: ASCII letters, digits and `_`,
/// not starting with a digit.
fn is_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
