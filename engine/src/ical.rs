//! Minimal iCalendar codec for calendar and task journals.
//!
//! Each entry carries one `VCALENDAR` object. The codec picks out the
//! top-level components of one type (`VEVENT` for calendars, `VTODO` for
//! task lists) and keeps everything inside them, nested `VALARM`s included,
//! as opaque properties. Time zone definitions and calendar-level
//! properties are not kept; the writer emits a fresh `VCALENDAR` wrapper.

use crate::document::{parse_line, push_line, unfold};
use crate::{
    error::Result, Document, DocumentCodec, DocumentKind, Error, Property, ResourceDownloader,
};

const CALENDAR: &str = "VCALENDAR";
const PRODID: &str = "-//jsync//EN";

/// The component type a calendar journal stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarComponent {
    Event,
    Todo,
}

impl CalendarComponent {
    pub fn name(&self) -> &'static str {
        match self {
            CalendarComponent::Event => "VEVENT",
            CalendarComponent::Todo => "VTODO",
        }
    }
}

/// Reads and writes one component type inside `VCALENDAR` objects.
#[derive(Debug, Clone, Copy)]
pub struct ICalCodec {
    component: CalendarComponent,
}

impl ICalCodec {
    /// Codec for calendar journals.
    pub const EVENTS: ICalCodec = ICalCodec::new(CalendarComponent::Event);
    /// Codec for task list journals.
    pub const TASKS: ICalCodec = ICalCodec::new(CalendarComponent::Todo);

    pub const fn new(component: CalendarComponent) -> Self {
        Self { component }
    }

    pub fn component(&self) -> CalendarComponent {
        self.component
    }

    fn build(&self, properties: Vec<Property>) -> Result<Document> {
        let mut uid = None;
        let mut display_name = None;
        let mut rest = Vec::new();
        // Properties of nested components (VALARM) never name the parent
        let mut nesting = 0usize;

        for property in properties {
            match property.name.as_str() {
                "BEGIN" => nesting += 1,
                "END" => nesting = nesting.saturating_sub(1),
                "UID" if nesting == 0 => {
                    uid = Some(property.value);
                    continue;
                }
                "SUMMARY" if nesting == 0 => {
                    display_name = Some(property.value);
                    continue;
                }
                _ => {}
            }
            rest.push(property);
        }

        let uid = uid
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Decode(format!("{} without UID", self.component.name())))?;

        Ok(Document {
            uid,
            kind: DocumentKind::Individual,
            display_name,
            members: Vec::new(),
            properties: rest,
            photo: None,
        })
    }
}

impl DocumentCodec for ICalCodec {
    fn decode(&self, content: &str, _downloader: &dyn ResourceDownloader) -> Result<Vec<Document>> {
        let wanted = self.component.name();
        let mut documents: Vec<Document> = Vec::new();
        let mut open: Vec<String> = Vec::new();
        // Properties of the wanted component being read, and its depth
        let mut current: Option<(usize, Vec<Property>)> = None;

        for line in unfold(content) {
            let property = parse_line(&line)?;
            match property.name.as_str() {
                "BEGIN" => {
                    let name = property.value.to_ascii_uppercase();
                    if let Some((_, properties)) = current.as_mut() {
                        properties.push(property);
                    } else if name == wanted && open.iter().all(|c| c == CALENDAR) {
                        current = Some((open.len(), Vec::new()));
                    }
                    open.push(name);
                }
                "END" => {
                    let name = property.value.to_ascii_uppercase();
                    if open.pop().as_deref() != Some(name.as_str()) {
                        return Err(Error::Decode(format!("unexpected END:{}", name)));
                    }
                    match current.take() {
                        Some((depth, properties)) if depth == open.len() => {
                            let document = self.build(properties)?;
                            // Recurrence overrides repeat the master's UID
                            if documents.iter().any(|d| d.uid == document.uid) {
                                tracing::debug!(uid = %document.uid, "Skipping recurrence override");
                            } else {
                                documents.push(document);
                            }
                        }
                        Some((depth, mut properties)) => {
                            properties.push(property);
                            current = Some((depth, properties));
                        }
                        None => {}
                    }
                }
                _ => {
                    if let Some((_, properties)) = current.as_mut() {
                        properties.push(property);
                    }
                }
            }
        }

        if let Some(name) = open.last() {
            return Err(Error::Decode(format!("unterminated {}", name)));
        }
        Ok(documents)
    }

    fn encode(&self, document: &Document) -> String {
        let component = self.component.name();
        let mut out = String::new();
        let mut push =
            |name: &str, params: &[String], value: &str| push_line(&mut out, name, params, value);

        push("BEGIN", &[], CALENDAR);
        push("VERSION", &[], "2.0");
        push("PRODID", &[], PRODID);
        push("BEGIN", &[], component);
        push("UID", &[], &document.uid);
        if let Some(summary) = &document.display_name {
            push("SUMMARY", &[], summary);
        }
        for property in &document.properties {
            push(&property.name, &property.params, &property.value);
        }
        push("END", &[], component);
        push("END", &[], CALENDAR);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoopDownloader;

    const EVENT: &str = "BEGIN:VCALENDAR\r\n\
        VERSION:2.0\r\n\
        PRODID:-//Example//EN\r\n\
        BEGIN:VTIMEZONE\r\n\
        TZID:Europe/Berlin\r\n\
        END:VTIMEZONE\r\n\
        BEGIN:VEVENT\r\n\
        UID:ev-1\r\n\
        SUMMARY:Stand\r\n  up\r\n\
        DTSTART;TZID=Europe/Berlin:20240101T090000\r\n\
        BEGIN:VALARM\r\n\
        ACTION:DISPLAY\r\n\
        SUMMARY:Reminder\r\n\
        END:VALARM\r\n\
        END:VEVENT\r\n\
        END:VCALENDAR\r\n";

    fn decode(codec: &ICalCodec, content: &str) -> Result<Vec<Document>> {
        codec.decode(content, &NoopDownloader)
    }

    #[test]
    fn decode_event() {
        let docs = decode(&ICalCodec::EVENTS, EVENT).unwrap();
        assert_eq!(docs.len(), 1);

        let event = &docs[0];
        assert_eq!(event.uid, "ev-1");
        assert_eq!(event.kind, DocumentKind::Individual);
        assert_eq!(event.display_name.as_deref(), Some("Stand up"));
        assert_eq!(event.properties[0].name, "DTSTART");
        assert_eq!(event.properties[0].params, vec!["TZID=Europe/Berlin".to_string()]);
        // The alarm stays nested and keeps its own summary
        let names: Vec<_> = event.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["DTSTART", "BEGIN", "ACTION", "SUMMARY", "END"]);
    }

    #[test]
    fn decode_picks_only_its_component() {
        let todo = "BEGIN:VCALENDAR\nBEGIN:VTODO\nUID:t-1\nSUMMARY:Milk\nEND:VTODO\nEND:VCALENDAR\n";

        assert!(decode(&ICalCodec::EVENTS, todo).unwrap().is_empty());
        let tasks = decode(&ICalCodec::TASKS, todo).unwrap();
        assert_eq!(tasks[0].uid, "t-1");
        assert_eq!(tasks[0].display_name.as_deref(), Some("Milk"));

        // A vCard is no calendar object
        assert!(decode(&ICalCodec::TASKS, "BEGIN:VCARD\nUID:c-1\nEND:VCARD\n")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn recurrence_overrides_collapse_into_one_document() {
        let content = "BEGIN:VCALENDAR\n\
            BEGIN:VEVENT\nUID:ev-1\nRRULE:FREQ=WEEKLY\nEND:VEVENT\n\
            BEGIN:VEVENT\nUID:ev-1\nRECURRENCE-ID:20240108T090000Z\nEND:VEVENT\n\
            END:VCALENDAR\n";

        let docs = decode(&ICalCodec::EVENTS, content).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].properties, vec![Property::new("RRULE", "FREQ=WEEKLY")]);
    }

    #[test]
    fn decode_rejects_malformed_objects() {
        let missing_uid = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nSUMMARY:x\nEND:VEVENT\nEND:VCALENDAR\n";
        assert!(matches!(
            decode(&ICalCodec::EVENTS, missing_uid),
            Err(Error::Decode(_))
        ));

        let unterminated = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:ev-1\n";
        assert!(matches!(
            decode(&ICalCodec::EVENTS, unterminated),
            Err(Error::Decode(_))
        ));

        let crossed = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:ev-1\nEND:VCALENDAR\nEND:VEVENT\n";
        assert!(matches!(
            decode(&ICalCodec::EVENTS, crossed),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn encode_wraps_the_component() {
        let event = decode(&ICalCodec::EVENTS, EVENT).unwrap().remove(0);
        let encoded = ICalCodec::EVENTS.encode(&event);

        assert!(encoded.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
        assert!(encoded.contains("BEGIN:VEVENT\r\nUID:ev-1\r\nSUMMARY:Stand up\r\n"));
        assert!(encoded.ends_with("END:VALARM\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n"));
        assert_eq!(decode(&ICalCodec::EVENTS, &encoded).unwrap(), vec![event]);

        let task = ICalCodec::TASKS.encode(&Document::individual("t-1", "Milk"));
        assert!(task.contains("BEGIN:VTODO\r\nUID:t-1\r\nSUMMARY:Milk\r\nEND:VTODO\r\n"));
    }
}
