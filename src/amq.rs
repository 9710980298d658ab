//! Talk to the ActiveMQ Statistics Plugin
//!
//! The [statistics plugin](http://activemq.apache.org/statisticsplugin.html)
//! answers an empty message sent to a magic queue with a JMS map message.
//! Subscribing with `transformation: jms-map-xml` makes the broker render
//! that map as XML: a `<map>` of `<entry>` elements, where the first child
//! element's text is the key and each following element carries the value,
//! typed by its tag name (`string`, `int`, `long`, `double`). Any other
//! tag name fails the parse; guessing at types would report garbage as
//! broker health.

use std::fmt;
use std::io;
use std::process::Command;

use quick_xml::events::Event;
use quick_xml::Reader;

/// The queue that returns broker-wide statistics
pub const BROKER_STATS_DESTINATION: &str = "/queue/ActiveMQ.Statistics.Broker";

/// The subscribe header that makes the broker send map messages as XML
pub const MAP_TRANSFORMATION: (&str, &str) = ("transformation", "jms-map-xml");

/// The queue that returns statistics for one destination
pub fn queue_stats_destination(queue: &str) -> String {
    format!("/queue/ActiveMQ.Statistics.Destination.{}", queue)
}

/// The reply topic for this machine's requests
///
/// Scoped by hostname so several nagios hosts polling the same broker
/// don't read each other's replies.
pub fn reply_topic(hostname: &str) -> String {
    format!("/topic/nagios.statresults.{}", hostname)
}

/// This machine's hostname, as the `hostname` command reports it
pub fn local_hostname() -> io::Result<String> {
    let out = Command::new("hostname").output()?;
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_owned())
}

/// One typed value from a statistics map
#[derive(Debug, Clone, PartialEq)]
pub enum MapValue {
    Str(String),
    Int(i64),
    Double(f64),
}

impl fmt::Display for MapValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MapValue::Str(ref s) => write!(f, "{}", s),
            MapValue::Int(i) => write!(f, "{}", i),
            MapValue::Double(d) => {
                if d.fract() == 0.0 {
                    write!(f, "{:.1}", d)
                } else {
                    write!(f, "{}", d)
                }
            }
        }
    }
}

/// Errors decoding a statistics reply
#[derive(Debug)]
pub enum MapParseError {
    Xml(quick_xml::Error),
    /// An element whose name is not one of the map value types
    UnknownType(String),
    /// A numeric element whose text won't parse as its declared type
    BadNumber { kind: String, text: String },
    /// A key the caller needs that the reply doesn't have
    MissingKey(String),
    /// A key that exists but isn't the type the caller needs
    WrongType {
        key: String,
        expected: &'static str,
    },
}

impl fmt::Display for MapParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::MapParseError::*;
        match *self {
            Xml(ref e) => write!(f, "invalid statistics XML: {}", e),
            UnknownType(ref name) => write!(f, "unknown data type '{}'", name),
            BadNumber { ref kind, ref text } => {
                write!(f, "'{}' is not a valid {}", text, kind)
            }
            MissingKey(ref key) => write!(f, "missing '{}' in statistics reply", key),
            WrongType { ref key, expected } => {
                write!(f, "'{}' in statistics reply is not a {}", key, expected)
            }
        }
    }
}

impl From<quick_xml::Error> for MapParseError {
    fn from(e: quick_xml::Error) -> MapParseError {
        MapParseError::Xml(e)
    }
}

/// A decoded statistics map, in document order
///
/// Order matters to the cacti plugin, which dumps every pair as fetched.
#[derive(Debug, Default, PartialEq)]
pub struct StatsMap(Vec<(String, MapValue)>);

impl StatsMap {
    pub fn get(&self, key: &str) -> Option<&MapValue> {
        self.0
            .iter()
            .find(|&&(ref k, _)| k == key)
            .map(|&(_, ref v)| v)
    }

    /// An integer stat, with missing/mistyped keys reported by name
    pub fn get_i64(&self, key: &str) -> Result<i64, MapParseError> {
        match self.get(key) {
            Some(&MapValue::Int(i)) => Ok(i),
            Some(_) => Err(MapParseError::WrongType {
                key: key.to_owned(),
                expected: "number",
            }),
            None => Err(MapParseError::MissingKey(key.to_owned())),
        }
    }

    /// A numeric stat, accepting either integer or double encoding
    pub fn get_f64(&self, key: &str) -> Result<f64, MapParseError> {
        match self.get(key) {
            Some(&MapValue::Int(i)) => Ok(i as f64),
            Some(&MapValue::Double(d)) => Ok(d),
            Some(_) => Err(MapParseError::WrongType {
                key: key.to_owned(),
                expected: "number",
            }),
            None => Err(MapParseError::MissingKey(key.to_owned())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, MapValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, key: &str, value: MapValue) {
        match self.0.iter_mut().find(|&&mut (ref k, _)| k == key) {
            Some(&mut (_, ref mut slot)) => *slot = value,
            None => self.0.push((key.to_owned(), value)),
        }
    }
}

fn typed_value(kind: &str, text: &str) -> Result<MapValue, MapParseError> {
    match kind {
        "string" => Ok(MapValue::Str(text.to_owned())),
        "int" | "long" => text.parse().map(MapValue::Int).map_err(|_| {
            MapParseError::BadNumber {
                kind: kind.to_owned(),
                text: text.to_owned(),
            }
        }),
        "double" => text.parse().map(MapValue::Double).map_err(|_| {
            MapParseError::BadNumber {
                kind: kind.to_owned(),
                text: text.to_owned(),
            }
        }),
        other => Err(MapParseError::UnknownType(other.to_owned())),
    }
}

/// Decode a jms-map-xml document into a [`StatsMap`]
pub fn decode_map(xml: &str) -> Result<StatsMap, MapParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut map = StatsMap::default();
    let mut depth = 0usize;
    // the (tag, text) children of the entry being read
    let mut children: Vec<(String, String)> = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if depth == 3 {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    children.push((tag, String::new()));
                    text.clear();
                }
            }
            Event::Empty(e) => {
                if depth == 2 {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    children.push((tag, String::new()));
                }
            }
            Event::Text(t) => {
                if depth == 3 {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::End(_) => {
                if depth == 3 {
                    if let Some(last) = children.last_mut() {
                        last.1 = text.clone();
                    }
                    text.clear();
                } else if depth == 2 {
                    flush_entry(&mut map, &children)?;
                    children.clear();
                }
                depth -= 1;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(map)
}

/// The first child's text names the entry; every child supplies a typed
/// value for it, the last one winning. Entries without children are
/// skipped, matching what the broker never sends anyway.
fn flush_entry(
    map: &mut StatsMap,
    children: &[(String, String)],
) -> Result<(), MapParseError> {
    let key = match children.first() {
        Some(&(_, ref text)) => text.clone(),
        None => return Ok(()),
    };
    for &(ref kind, ref text) in children {
        map.insert(&key, typed_value(kind, text)?);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{decode_map, MapParseError, MapValue};

    fn queue_stats_xml() -> &'static str {
        r#"<map>
          <entry><string>destinationName</string><string>queue://foo.bar</string></entry>
          <entry><string>size</string><long>600</long></entry>
          <entry><string>memoryPercentUsage</string><int>42</int></entry>
          <entry><string>averageEnqueueTime</string><double>1234.5</double></entry>
        </map>"#
    }

    #[test]
    fn decodes_every_declared_type() {
        let map = decode_map(queue_stats_xml()).unwrap();
        assert_eq!(
            map.get("destinationName"),
            Some(&MapValue::Str("queue://foo.bar".to_owned()))
        );
        assert_eq!(map.get("size"), Some(&MapValue::Int(600)));
        assert_eq!(map.get("memoryPercentUsage"), Some(&MapValue::Int(42)));
        assert_eq!(
            map.get("averageEnqueueTime"),
            Some(&MapValue::Double(1234.5))
        );
    }

    #[test]
    fn keeps_document_order() {
        let map = decode_map(queue_stats_xml()).unwrap();
        let keys: Vec<&str> = map.iter().map(|&(ref k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            [
                "destinationName",
                "size",
                "memoryPercentUsage",
                "averageEnqueueTime"
            ]
        );
    }

    #[test]
    fn typed_accessors_name_whats_wrong() {
        let map = decode_map(queue_stats_xml()).unwrap();
        assert_eq!(map.get_i64("size").unwrap(), 600);
        assert_eq!(map.get_f64("averageEnqueueTime").unwrap(), 1234.5);

        match map.get_i64("enqueueCount").unwrap_err() {
            MapParseError::MissingKey(key) => assert_eq!(key, "enqueueCount"),
            other => panic!("expected MissingKey, got {:?}", other),
        }
        match map.get_i64("destinationName").unwrap_err() {
            MapParseError::WrongType { key, .. } => assert_eq!(key, "destinationName"),
            other => panic!("expected WrongType, got {:?}", other),
        }
    }

    #[test]
    fn unknown_type_tag_fails_the_parse() {
        let xml = r#"<map>
          <entry><string>size</string><decimal>600</decimal></entry>
        </map>"#;
        match decode_map(xml).unwrap_err() {
            MapParseError::UnknownType(name) => assert_eq!(name, "decimal"),
            other => panic!("expected UnknownType, got {:?}", other),
        }
    }

    #[test]
    fn garbage_number_fails_the_parse() {
        let xml = r#"<map>
          <entry><string>size</string><long>lots</long></entry>
        </map>"#;
        match decode_map(xml).unwrap_err() {
            MapParseError::BadNumber { kind, text } => {
                assert_eq!(kind, "long");
                assert_eq!(text, "lots");
            }
            other => panic!("expected BadNumber, got {:?}", other),
        }
    }

    #[test]
    fn double_values_always_show_a_decimal_point() {
        assert_eq!(MapValue::Double(42.0).to_string(), "42.0");
        assert_eq!(MapValue::Double(1.5).to_string(), "1.5");
        assert_eq!(MapValue::Int(42).to_string(), "42");
    }
}
