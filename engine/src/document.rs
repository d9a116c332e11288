//! Resource documents carried by journal entries.
//!
//! The engine only needs a handful of facts about a document: its stable
//! `uid`, whether it describes a group or an individual, and the uids of a
//! group's members. Everything else is kept as opaque properties so it can
//! be written back unchanged.

use crate::{error::Result, Error, ICalCodec, ResourceDownloader, ServiceType, Uid};
use serde::{Deserialize, Serialize};

/// Whether a document describes a group or a single entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Individual,
    Group,
}

/// A single `NAME;PARAMS:value` property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
    pub value: String,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            value: value.into(),
        }
    }

    fn has_param(&self, param: &str) -> bool {
        self.params.iter().any(|p| p.eq_ignore_ascii_case(param))
    }
}

/// A decoded resource document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub uid: Uid,
    pub kind: DocumentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Member uids, only meaningful for groups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Uid>,
    /// Remaining properties in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,
    /// Downloaded photo, if the document referenced one by URL.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "photo_bytes")]
    pub photo: Option<Vec<u8>>,
}

/// Photos are stored base64 encoded.
mod photo_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(photo: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match photo {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(de::Error::custom))
            .transpose()
    }
}

impl Document {
    pub fn individual(uid: impl Into<Uid>, display_name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            kind: DocumentKind::Individual,
            display_name: Some(display_name.into()),
            members: Vec::new(),
            properties: Vec::new(),
            photo: None,
        }
    }

    pub fn group(uid: impl Into<Uid>, display_name: impl Into<String>, members: Vec<Uid>) -> Self {
        Self {
            uid: uid.into(),
            kind: DocumentKind::Group,
            display_name: Some(display_name.into()),
            members,
            properties: Vec::new(),
            photo: None,
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind == DocumentKind::Group
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }
}

/// Converts entry content to documents and back.
pub trait DocumentCodec {
    /// Decode every document in `content`.
    ///
    /// External references are resolved through `downloader` while parsing.
    fn decode(&self, content: &str, downloader: &dyn ResourceDownloader) -> Result<Vec<Document>>;

    fn encode(&self, document: &Document) -> String;
}

const MEMBER_PREFIX: &str = "urn:uuid:";
const PHOTO_ACCEPT: &str = "image/*";

/// Minimal vCard reader and writer.
///
/// Understands line folding, `UID`, `FN`, group markers (`KIND:group` and
/// `X-ADDRESSBOOKSERVER-KIND:group`), member lists and photos referenced by
/// URI. Other properties are carried through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct VCardCodec;

/// Split content into unfolded content lines.
///
/// Accepts CRLF and bare LF endings; blank lines are dropped.
pub(crate) fn unfold(content: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in content.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        match raw.chars().next() {
            Some(' ') | Some('\t') if !lines.is_empty() => {
                if let Some(last) = lines.last_mut() {
                    last.push_str(&raw[1..]);
                }
            }
            _ if raw.is_empty() => {}
            _ => lines.push(raw.to_string()),
        }
    }
    lines
}

/// Parse one `NAME;PARAMS:value` content line.
pub(crate) fn parse_line(line: &str) -> Result<Property> {
    let (head, value) = line
        .split_once(':')
        .ok_or_else(|| Error::Decode(format!("property without value: {}", line)))?;
    let mut parts = head.split(';');
    let name = parts.next().unwrap_or_default();
    // Strip an optional "item1." group prefix
    let name = name.rsplit('.').next().unwrap_or(name).to_ascii_uppercase();
    Ok(Property {
        name,
        params: parts.map(str::to_string).collect(),
        value: value.to_string(),
    })
}

/// Append one content line.
pub(crate) fn push_line(out: &mut String, name: &str, params: &[String], value: &str) {
    out.push_str(name);
    for param in params {
        out.push(';');
        out.push_str(param);
    }
    out.push(':');
    out.push_str(value);
    out.push_str("\r\n");
}

impl VCardCodec {
    fn is_photo_uri(property: &Property) -> bool {
        property.has_param("VALUE=uri")
            || property.value.starts_with("http://")
            || property.value.starts_with("https://")
    }

    fn build(properties: Vec<Property>, downloader: &dyn ResourceDownloader) -> Result<Document> {
        let mut uid = None;
        let mut kind = DocumentKind::Individual;
        let mut display_name = None;
        let mut members = Vec::new();
        let mut photo = None;
        let mut rest = Vec::new();

        for property in properties {
            match property.name.as_str() {
                "UID" => uid = Some(property.value),
                "FN" => display_name = Some(property.value),
                "KIND" | "X-ADDRESSBOOKSERVER-KIND" => {
                    if property.value.eq_ignore_ascii_case("group") {
                        kind = DocumentKind::Group;
                    }
                }
                "MEMBER" | "X-ADDRESSBOOKSERVER-MEMBER" => {
                    let member = property
                        .value
                        .strip_prefix(MEMBER_PREFIX)
                        .unwrap_or(&property.value);
                    members.push(member.to_string());
                }
                "PHOTO" if Self::is_photo_uri(&property) => {
                    photo = downloader.download(&property.value, PHOTO_ACCEPT);
                    rest.push(property);
                }
                _ => rest.push(property),
            }
        }

        let uid = uid
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Decode("vCard without UID".into()))?;

        Ok(Document {
            uid,
            kind,
            display_name,
            members,
            properties: rest,
            photo,
        })
    }
}

impl DocumentCodec for VCardCodec {
    fn decode(&self, content: &str, downloader: &dyn ResourceDownloader) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        let mut current: Option<Vec<Property>> = None;

        for line in unfold(content) {
            let property = parse_line(&line)?;
            let is_vcard = property.value.eq_ignore_ascii_case("VCARD");
            match property.name.as_str() {
                "BEGIN" if is_vcard => {
                    if current.is_some() {
                        return Err(Error::Decode("nested vCard".into()));
                    }
                    current = Some(Vec::new());
                }
                "END" if is_vcard => {
                    if let Some(properties) = current.take() {
                        documents.push(Self::build(properties, downloader)?);
                    }
                }
                _ => {
                    if let Some(properties) = current.as_mut() {
                        properties.push(property);
                    }
                }
            }
        }

        if current.is_some() {
            return Err(Error::Decode("unterminated vCard".into()));
        }
        Ok(documents)
    }

    fn encode(&self, document: &Document) -> String {
        let mut out = String::from("BEGIN:VCARD\r\n");
        let mut push =
            |name: &str, params: &[String], value: &str| push_line(&mut out, name, params, value);

        let version = document
            .properties
            .iter()
            .find(|p| p.name == "VERSION")
            .map_or("3.0", |p| p.value.as_str());
        push("VERSION", &[], version);
        push("UID", &[], &document.uid);
        if let Some(name) = &document.display_name {
            push("FN", &[], name);
        }
        if document.is_group() {
            push("X-ADDRESSBOOKSERVER-KIND", &[], "group");
            for member in &document.members {
                push(
                    "X-ADDRESSBOOKSERVER-MEMBER",
                    &[],
                    &format!("{}{}", MEMBER_PREFIX, member),
                );
            }
        }
        for property in document.properties.iter().filter(|p| p.name != "VERSION") {
            push(&property.name, &property.params, &property.value);
        }

        out.push_str("END:VCARD\r\n");
        out
    }
}

/// The codec for entries of a collection of `service_type`.
pub fn codec_for(service_type: ServiceType) -> &'static dyn DocumentCodec {
    match service_type {
        ServiceType::AddressBook => &VCardCodec,
        ServiceType::Calendar => &ICalCodec::EVENTS,
        ServiceType::Tasks => &ICalCodec::TASKS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoopDownloader;
    use std::cell::RefCell;

    struct RecordingDownloader {
        requested: RefCell<Vec<(String, String)>>,
        payload: Option<Vec<u8>>,
    }

    impl ResourceDownloader for RecordingDownloader {
        fn download(&self, url: &str, accept: &str) -> Option<Vec<u8>> {
            self.requested
                .borrow_mut()
                .push((url.to_string(), accept.to_string()));
            self.payload.clone()
        }
    }

    const CONTACT: &str = "BEGIN:VCARD\r\nVERSION:3.0\r\nUID:c-1\r\nFN:Alice Example\r\nTEL;TYPE=cell:+1 555\r\n 0100\r\nEND:VCARD\r\n";

    #[test]
    fn decode_individual() {
        let docs = VCardCodec.decode(CONTACT, &NoopDownloader).unwrap();
        assert_eq!(docs.len(), 1);

        let doc = &docs[0];
        assert_eq!(doc.uid, "c-1");
        assert_eq!(doc.kind, DocumentKind::Individual);
        assert_eq!(doc.display_name.as_deref(), Some("Alice Example"));

        let tel = doc.properties.iter().find(|p| p.name == "TEL").unwrap();
        assert_eq!(tel.value, "+1 5550100");
        assert_eq!(tel.params, vec!["TYPE=cell".to_string()]);
    }

    #[test]
    fn decode_group_members() {
        let content = "BEGIN:VCARD\nVERSION:4.0\nUID:g-1\nFN:Friends\nKIND:group\nMEMBER:urn:uuid:c-1\nMEMBER:urn:uuid:c-2\nEND:VCARD\n";
        let docs = VCardCodec.decode(content, &NoopDownloader).unwrap();

        assert!(docs[0].is_group());
        assert_eq!(docs[0].members, vec!["c-1".to_string(), "c-2".to_string()]);
    }

    #[test]
    fn decode_empty_and_multiple() {
        assert!(VCardCodec.decode("", &NoopDownloader).unwrap().is_empty());

        let two = format!("{}{}", CONTACT, CONTACT.replace("c-1", "c-2"));
        let docs = VCardCodec.decode(&two, &NoopDownloader).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].uid, "c-2");
    }

    #[test]
    fn decode_rejects_malformed_cards() {
        let missing_uid = "BEGIN:VCARD\r\nFN:Nobody\r\nEND:VCARD\r\n";
        assert!(matches!(
            VCardCodec.decode(missing_uid, &NoopDownloader),
            Err(Error::Decode(_))
        ));

        let unterminated = "BEGIN:VCARD\r\nUID:x\r\n";
        assert!(matches!(
            VCardCodec.decode(unterminated, &NoopDownloader),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn photo_urls_go_through_the_downloader() {
        let content = "BEGIN:VCARD\r\nUID:c-1\r\nPHOTO;VALUE=uri:https://example.com/a.jpg\r\nEND:VCARD\r\n";
        let downloader = RecordingDownloader {
            requested: RefCell::new(Vec::new()),
            payload: Some(vec![1, 2, 3]),
        };

        let docs = VCardCodec.decode(content, &downloader).unwrap();
        assert_eq!(docs[0].photo, Some(vec![1, 2, 3]));
        assert_eq!(
            downloader.requested.borrow().as_slice(),
            &[("https://example.com/a.jpg".to_string(), "image/*".to_string())]
        );
    }

    #[test]
    fn failed_photo_download_leaves_photo_empty() {
        let content = "BEGIN:VCARD\r\nUID:c-1\r\nPHOTO:http://example.com/a.jpg\r\nEND:VCARD\r\n";
        let downloader = RecordingDownloader {
            requested: RefCell::new(Vec::new()),
            payload: None,
        };

        let docs = VCardCodec.decode(content, &downloader).unwrap();
        assert_eq!(docs[0].photo, None);
        assert_eq!(downloader.requested.borrow().len(), 1);
    }

    #[test]
    fn encode_keeps_group_semantics() {
        let group = Document::group("g-1", "Friends", vec!["c-1".into()])
            .with_property(Property::new("NOTE", "close ones"));
        let encoded = VCardCodec.encode(&group);

        assert!(encoded.starts_with("BEGIN:VCARD\r\nVERSION:3.0\r\n"));
        assert!(encoded.contains("X-ADDRESSBOOKSERVER-MEMBER:urn:uuid:c-1\r\n"));

        let decoded = VCardCodec.decode(&encoded, &NoopDownloader).unwrap();
        assert_eq!(decoded[0].kind, DocumentKind::Group);
        assert_eq!(decoded[0].members, group.members);
        assert!(decoded[0]
            .properties
            .iter()
            .any(|p| p.name == "NOTE" && p.value == "close ones"));
    }

    #[test]
    fn codec_follows_the_service_type() {
        let event = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:ev-1\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

        let contacts = codec_for(ServiceType::AddressBook);
        assert_eq!(contacts.decode(CONTACT, &NoopDownloader).unwrap()[0].uid, "c-1");
        assert!(contacts.decode(event, &NoopDownloader).unwrap().is_empty());

        let events = codec_for(ServiceType::Calendar).decode(event, &NoopDownloader).unwrap();
        assert_eq!(events[0].uid, "ev-1");
        assert!(codec_for(ServiceType::Tasks)
            .encode(&events[0])
            .contains("BEGIN:VTODO\r\n"));
    }
}
